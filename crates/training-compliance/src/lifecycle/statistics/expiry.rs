use super::ComplianceSnapshot;
use crate::lifecycle::classifier::days_until;
use crate::lifecycle::domain::{EmployeeId, TrainingRecordId, TrainingTypeId};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryBucket {
    Expired,
    Critical,
    Urgent,
    Warning,
}

impl ExpiryBucket {
    /// `None` once an expiry is more than 90 days out.
    pub fn for_days(days: i64) -> Option<Self> {
        match days {
            i64::MIN..=-1 => Some(Self::Expired),
            0..=7 => Some(Self::Critical),
            8..=30 => Some(Self::Urgent),
            31..=90 => Some(Self::Warning),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Expired => "Expired",
            Self::Critical => "Critical (0-7 days)",
            Self::Urgent => "Urgent (8-30 days)",
            Self::Warning => "Warning (31-90 days)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpiryEntry {
    pub record_id: TrainingRecordId,
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub training_type_id: TrainingTypeId,
    pub training_type_name: String,
    pub expiry_date: NaiveDate,
    pub days_until_expiry: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpiryBuckets {
    pub expired: Vec<ExpiryEntry>,
    pub critical: Vec<ExpiryEntry>,
    pub urgent: Vec<ExpiryEntry>,
    pub warning: Vec<ExpiryEntry>,
}

impl ExpiryBuckets {
    pub fn bucket(&self, bucket: ExpiryBucket) -> &[ExpiryEntry] {
        match bucket {
            ExpiryBucket::Expired => &self.expired,
            ExpiryBucket::Critical => &self.critical,
            ExpiryBucket::Urgent => &self.urgent,
            ExpiryBucket::Warning => &self.warning,
        }
    }

    pub fn total(&self) -> usize {
        self.expired.len() + self.critical.len() + self.urgent.len() + self.warning.len()
    }

    fn bucket_mut(&mut self, bucket: ExpiryBucket) -> &mut Vec<ExpiryEntry> {
        match bucket {
            ExpiryBucket::Expired => &mut self.expired,
            ExpiryBucket::Critical => &mut self.critical,
            ExpiryBucket::Urgent => &mut self.urgent,
            ExpiryBucket::Warning => &mut self.warning,
        }
    }
}

/// Groups the latest record per active employee and training type by days to expiry.
///
/// Superseded records are skipped so a renewed credential does not linger in
/// the expired bucket.
pub fn upcoming_expiries(snapshot: &ComplianceSnapshot, today: NaiveDate) -> ExpiryBuckets {
    let mut buckets = ExpiryBuckets::default();

    for training_type in &snapshot.training_types {
        let latest = snapshot.latest_records(training_type.id);
        for employee in snapshot.active_employees() {
            let Some(record) = latest.get(&employee.id) else {
                continue;
            };
            let Some(expiry_date) = record.expiry_date else {
                continue;
            };
            let days = days_until(expiry_date, today);
            let Some(bucket) = ExpiryBucket::for_days(days) else {
                continue;
            };

            buckets.bucket_mut(bucket).push(ExpiryEntry {
                record_id: record.id,
                employee_id: employee.id,
                employee_name: employee.name.clone(),
                training_type_id: training_type.id,
                training_type_name: training_type.name.clone(),
                expiry_date,
                days_until_expiry: days,
            });
        }
    }

    for bucket in [
        ExpiryBucket::Expired,
        ExpiryBucket::Critical,
        ExpiryBucket::Urgent,
        ExpiryBucket::Warning,
    ] {
        buckets
            .bucket_mut(bucket)
            .sort_by(|a, b| {
                a.days_until_expiry
                    .cmp(&b.days_until_expiry)
                    .then(a.record_id.cmp(&b.record_id))
            });
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_boundaries() {
        assert_eq!(ExpiryBucket::for_days(-1), Some(ExpiryBucket::Expired));
        assert_eq!(ExpiryBucket::for_days(0), Some(ExpiryBucket::Critical));
        assert_eq!(ExpiryBucket::for_days(7), Some(ExpiryBucket::Critical));
        assert_eq!(ExpiryBucket::for_days(8), Some(ExpiryBucket::Urgent));
        assert_eq!(ExpiryBucket::for_days(30), Some(ExpiryBucket::Urgent));
        assert_eq!(ExpiryBucket::for_days(31), Some(ExpiryBucket::Warning));
        assert_eq!(ExpiryBucket::for_days(90), Some(ExpiryBucket::Warning));
        assert_eq!(ExpiryBucket::for_days(91), None);
    }
}
