use super::domain::TrainingTypeId;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Numbering bucket: one counter per training type, issuer, and month.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceKey {
    pub training_type_id: TrainingTypeId,
    pub issuer: String,
    pub year: i32,
    pub month: u32,
}

impl SequenceKey {
    /// Normalizes the issuer and checks the period so equal buckets compare equal.
    pub fn new(
        training_type_id: TrainingTypeId,
        issuer: &str,
        year: i32,
        month: u32,
    ) -> Result<Self, SequenceError> {
        let issuer = issuer.trim().to_ascii_uppercase();
        if issuer.is_empty() {
            return Err(SequenceError::InvalidKey("issuer must not be blank".to_string()));
        }
        if !(1..=12).contains(&month) {
            return Err(SequenceError::InvalidKey(format!(
                "month {month} is outside 1..=12"
            )));
        }

        Ok(Self {
            training_type_id,
            issuer,
            year,
            month,
        })
    }

    pub fn for_date(
        training_type_id: TrainingTypeId,
        issuer: &str,
        date: NaiveDate,
    ) -> Result<Self, SequenceError> {
        Self::new(training_type_id, issuer, date.year(), date.month())
    }
}

/// Counter storage. `increment` must be a single atomic upsert-and-read.
pub trait SequenceStore: Send + Sync {
    /// Creates the bucket at zero when missing, then returns the incremented value.
    fn increment(&self, key: &SequenceKey) -> Result<u64, SequenceError>;
    fn current(&self, key: &SequenceKey) -> Result<Option<u64>, SequenceError>;
    /// Zeroes the bucket, creating it if needed.
    fn reset_for_new_period(&self, key: &SequenceKey) -> Result<(), SequenceError>;
    /// Steps the bucket back when `number` is still its last value. Returns
    /// whether the number went back into the bucket.
    fn release(&self, key: &SequenceKey, number: u64) -> Result<bool, SequenceError>;
}

/// A number taken from a bucket whose certificate is not committed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedNumber {
    pub key: SequenceKey,
    pub number: u64,
    pub certificate_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("invalid sequence key: {0}")]
    InvalidKey(String),
    #[error("sequence exhausted for {0:?}")]
    Exhausted(SequenceKey),
    #[error("sequence store unavailable: {0}")]
    Unavailable(String),
}

/// Issues human-readable certificate numbers backed by a `SequenceStore`.
pub struct CertificateNumberGenerator<S> {
    store: Arc<S>,
}

impl<S> Clone for CertificateNumberGenerator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SequenceStore> CertificateNumberGenerator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn next_number(
        &self,
        training_type_id: TrainingTypeId,
        issuer: &str,
        year: i32,
        month: u32,
    ) -> Result<u64, SequenceError> {
        let key = SequenceKey::new(training_type_id, issuer, year, month)?;
        self.store.increment(&key)
    }

    /// Formats `{ISSUER}-{CODE}-{YYYY}{MM}-{NNNN}` for the month of `issued_on`.
    pub fn next_certificate_number(
        &self,
        training_type_id: TrainingTypeId,
        type_code: &str,
        issuer: &str,
        issued_on: NaiveDate,
    ) -> Result<String, SequenceError> {
        self.reserve_certificate_number(training_type_id, type_code, issuer, issued_on)
            .map(|reserved| reserved.certificate_number)
    }

    /// Like `next_certificate_number`, keeping the bucket and raw number so a
    /// failed commit can hand the number back through `release`.
    pub fn reserve_certificate_number(
        &self,
        training_type_id: TrainingTypeId,
        type_code: &str,
        issuer: &str,
        issued_on: NaiveDate,
    ) -> Result<ReservedNumber, SequenceError> {
        let key = SequenceKey::for_date(training_type_id, issuer, issued_on)?;
        let number = self.store.increment(&key)?;
        let certificate_number = format_certificate_number(&key, type_code, number);
        Ok(ReservedNumber {
            key,
            number,
            certificate_number,
        })
    }

    pub fn release(&self, reserved: &ReservedNumber) -> Result<bool, SequenceError> {
        self.store.release(&reserved.key, reserved.number)
    }

    pub fn reset_for_new_period(
        &self,
        training_type_id: TrainingTypeId,
        issuer: &str,
        year: i32,
        month: u32,
    ) -> Result<(), SequenceError> {
        let key = SequenceKey::new(training_type_id, issuer, year, month)?;
        self.store.reset_for_new_period(&key)
    }
}

pub fn format_certificate_number(key: &SequenceKey, type_code: &str, number: u64) -> String {
    let code = type_code.trim().to_ascii_uppercase();
    format!(
        "{}-{}-{:04}{:02}-{:04}",
        key.issuer, code, key.year, key.month, number
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_normalizes_issuer() {
        let key = SequenceKey::new(TrainingTypeId(5), "  dgca ", 2025, 3).expect("valid key");
        assert_eq!(key.issuer, "DGCA");
    }

    #[test]
    fn key_rejects_blank_issuer_and_bad_month() {
        assert!(matches!(
            SequenceKey::new(TrainingTypeId(5), "   ", 2025, 3),
            Err(SequenceError::InvalidKey(_))
        ));
        assert!(matches!(
            SequenceKey::new(TrainingTypeId(5), "DGCA", 2025, 13),
            Err(SequenceError::InvalidKey(_))
        ));
    }

    #[test]
    fn certificate_number_is_zero_padded() {
        let key = SequenceKey::new(TrainingTypeId(5), "dgca", 2025, 3).expect("valid key");
        assert_eq!(
            format_certificate_number(&key, "fa", 7),
            "DGCA-FA-202503-0007"
        );
    }
}
