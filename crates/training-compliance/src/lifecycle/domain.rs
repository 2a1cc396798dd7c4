use super::classifier::{ClassificationInput, ClassificationProfile, NoExpiryPolicy};
use super::status::{
    CertificateStatus, ComplianceStatus, EmployeeCertificateStatus, TrainingRecordStatus,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($($name:ident),+ $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub u64);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )+
    };
}

entity_id!(
    EmployeeId,
    DepartmentId,
    ProviderId,
    TrainingTypeId,
    TrainingRecordId,
    CertificateId,
    CertificateTypeId,
    EmployeeCertificateId,
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    /// Human-facing staff number; may change over the employee's lifetime.
    pub employee_number: String,
    pub name: String,
    pub department_id: Option<DepartmentId>,
    pub is_active: bool,
}

/// Parameters a training type hands to the classifier and the statistics rollups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingType {
    pub id: TrainingTypeId,
    pub name: String,
    pub code: String,
    pub category: Option<String>,
    pub validity_months: Option<u32>,
    pub warning_period_days: Option<u32>,
    pub is_mandatory: bool,
    pub compliance_target_percentage: f64,
}

impl TrainingType {
    pub fn warning_days(&self, fallback: u32) -> i64 {
        i64::from(self.warning_period_days.unwrap_or(fallback))
    }

    pub fn is_safety_critical(&self) -> bool {
        self.category
            .as_deref()
            .map(|category| {
                let lowered = category.to_lowercase();
                lowered.contains("safety") || lowered.contains("security")
            })
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateType {
    pub id: CertificateTypeId,
    pub name: String,
    pub validity_months: Option<u32>,
    pub warning_days: Option<u32>,
}

impl CertificateType {
    pub fn warning_days(&self, fallback: u32) -> i64 {
        i64::from(self.warning_days.unwrap_or(fallback))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub id: TrainingRecordId,
    pub employee_id: EmployeeId,
    pub training_type_id: TrainingTypeId,
    pub provider_id: Option<ProviderId>,
    pub certificate_number: Option<String>,
    pub issue_date: NaiveDate,
    pub completion_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub status: TrainingRecordStatus,
    pub compliance_status: ComplianceStatus,
    pub score: Option<f64>,
    pub cost_cents: Option<i64>,
}

impl TrainingRecord {
    /// A record is created on completion, so the issue date stands in for a
    /// missing completion date.
    pub fn classification_input(&self, warning_days: i64) -> ClassificationInput {
        ClassificationInput {
            issue_date: Some(self.issue_date),
            expiry_date: self.expiry_date,
            completion_date: self.completion_date.or(Some(self.issue_date)),
            warning_days,
        }
    }

    pub fn classification_profile(policy: NoExpiryPolicy) -> ClassificationProfile {
        ClassificationProfile::training_record(policy)
    }

    /// Date the record became effective, used to pick the latest record.
    pub fn effective_date(&self) -> NaiveDate {
        self.completion_date.unwrap_or(self.issue_date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    Issued,
    InForce,
    RenewalDue,
    Lapsed,
    Superseded,
    Withdrawn,
}

impl LifecycleStage {
    pub const fn for_status(status: CertificateStatus) -> Self {
        match status {
            CertificateStatus::Draft => Self::Issued,
            CertificateStatus::Active => Self::InForce,
            CertificateStatus::ExpiringSoon => Self::RenewalDue,
            CertificateStatus::Expired => Self::Lapsed,
            CertificateStatus::Renewed => Self::Superseded,
            CertificateStatus::Revoked
            | CertificateStatus::Suspended
            | CertificateStatus::Cancelled => Self::Withdrawn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub training_record_id: TrainingRecordId,
    pub employee_id: EmployeeId,
    pub training_type_id: TrainingTypeId,
    pub certificate_number: String,
    pub issuer: String,
    pub issued_on: NaiveDate,
    pub expires_on: Option<NaiveDate>,
    pub status: CertificateStatus,
    pub lifecycle_stage: LifecycleStage,
    pub renewed_from_id: Option<CertificateId>,
    pub renewed_to_id: Option<CertificateId>,
    pub renewal_generation: u32,
}

impl Certificate {
    pub fn set_status(&mut self, status: CertificateStatus) {
        self.status = status;
        self.lifecycle_stage = LifecycleStage::for_status(status);
    }
}

/// Metadata for an uploaded certificate document; the bytes live elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateFile {
    pub path: String,
    pub original_name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeCertificate {
    pub id: EmployeeCertificateId,
    pub employee_id: EmployeeId,
    pub certificate_type_id: CertificateTypeId,
    pub issue_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub status: EmployeeCertificateStatus,
    #[serde(default)]
    pub certificate_files: Vec<CertificateFile>,
}

impl EmployeeCertificate {
    pub fn classification_input(&self, warning_days: i64) -> ClassificationInput {
        ClassificationInput {
            issue_date: self.issue_date,
            expiry_date: self.expiry_date,
            completion_date: self.completion_date,
            warning_days,
        }
    }

    pub fn file_count(&self) -> usize {
        self.certificate_files.len()
    }

    pub fn total_file_bytes(&self) -> u64 {
        self.certificate_files.iter().map(|file| file.size_bytes).sum()
    }
}
