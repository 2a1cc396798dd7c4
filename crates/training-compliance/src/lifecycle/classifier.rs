use super::status::ComplianceStatus;
use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a record without an expiry date means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoExpiryPolicy {
    /// The credential never lapses and is active as soon as it exists.
    Permanent,
    /// The credential never lapses; it is `Completed` once completion is
    /// recorded and `Pending` before that.
    CompletionTracked,
}

impl FromStr for NoExpiryPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "permanent" => Ok(Self::Permanent),
            "completion_tracked" | "completion" => Ok(Self::CompletionTracked),
            other => Err(format!("unknown no-expiry policy '{other}'")),
        }
    }
}

impl fmt::Display for NoExpiryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent => write!(f, "permanent"),
            Self::CompletionTracked => write!(f, "completion_tracked"),
        }
    }
}

/// Dates and window feeding a single classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationInput {
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub warning_days: i64,
}

/// How an entity kind interprets its dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationProfile {
    /// Entities without a completion concept are active whenever unexpired.
    pub tracks_completion: bool,
    pub no_expiry: NoExpiryPolicy,
}

impl ClassificationProfile {
    pub const fn training_record(no_expiry: NoExpiryPolicy) -> Self {
        Self {
            tracks_completion: false,
            no_expiry,
        }
    }

    pub const fn employee_certificate(no_expiry: NoExpiryPolicy) -> Self {
        Self {
            tracks_completion: true,
            no_expiry,
        }
    }
}

/// Classify a credential on `today`.
///
/// Expiry is compared at day granularity: a credential whose expiry date is
/// today is already expired. The warning boundary is inclusive, so a record
/// exactly `warning_days` out is expiring soon.
pub fn classify(
    input: &ClassificationInput,
    today: NaiveDate,
    profile: ClassificationProfile,
) -> ComplianceStatus {
    let completed = input.completion_date.is_some();

    let Some(expiry) = input.expiry_date else {
        return match profile.no_expiry {
            NoExpiryPolicy::Permanent => ComplianceStatus::Active,
            NoExpiryPolicy::CompletionTracked if completed || !profile.tracks_completion => {
                ComplianceStatus::Completed
            }
            NoExpiryPolicy::CompletionTracked => ComplianceStatus::Pending,
        };
    };

    if expiry <= today {
        return ComplianceStatus::Expired;
    }

    if days_until(expiry, today) <= input.warning_days {
        return ComplianceStatus::ExpiringSoon;
    }

    if completed || !profile.tracks_completion {
        ComplianceStatus::Active
    } else {
        ComplianceStatus::Pending
    }
}

/// Whole days from `today` until `expiry`; negative once past.
pub fn days_until(expiry: NaiveDate, today: NaiveDate) -> i64 {
    (expiry - today).num_days()
}

/// Expiry implied by a validity period, clamped to the end of short months.
pub fn derive_expiry(anchor: NaiveDate, validity_months: Option<u32>) -> Option<NaiveDate> {
    let months = validity_months.filter(|months| *months > 0)?;
    anchor.checked_add_months(Months::new(months))
}

/// First day of the warning window for an expiry date, or `None` when the
/// window reaches past the calendar chrono can represent.
pub fn warning_starts_on(expiry: NaiveDate, warning_days: i64) -> Option<NaiveDate> {
    Duration::try_days(warning_days).and_then(|window| expiry.checked_sub_signed(window))
}
