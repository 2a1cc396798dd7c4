//! Compliance status vocabulary.
//!
//! `ComplianceStatus` is the superset every entity projects from. Training
//! records, certificates and employee certificates each persist a narrower
//! enum; the `From`/`TryFrom` impls below are the only sanctioned way to move
//! between the canonical status and those views.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Draft,
    Pending,
    Completed,
    Active,
    ExpiringSoon,
    Expired,
    Revoked,
    Suspended,
    Renewed,
    Cancelled,
}

impl ComplianceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Active => "Active",
            Self::ExpiringSoon => "Expiring Soon",
            Self::Expired => "Expired",
            Self::Revoked => "Revoked",
            Self::Suspended => "Suspended",
            Self::Renewed => "Renewed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Statuses set by an administrator rather than derived from dates.
    pub const fn is_administrative(self) -> bool {
        matches!(
            self,
            Self::Revoked | Self::Suspended | Self::Renewed | Self::Cancelled
        )
    }

    /// Whether the holder currently counts as trained.
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Active | Self::ExpiringSoon | Self::Completed)
    }
}

/// Persisted status of a training record: it is either in force or it is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingRecordStatus {
    Active,
    Expired,
}

impl TrainingRecordStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Expired => "Expired",
        }
    }
}

impl From<ComplianceStatus> for TrainingRecordStatus {
    fn from(status: ComplianceStatus) -> Self {
        match status {
            ComplianceStatus::Expired => Self::Expired,
            _ => Self::Active,
        }
    }
}

impl From<TrainingRecordStatus> for ComplianceStatus {
    fn from(status: TrainingRecordStatus) -> Self {
        match status {
            TrainingRecordStatus::Active => Self::Active,
            TrainingRecordStatus::Expired => Self::Expired,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Draft,
    Active,
    ExpiringSoon,
    Expired,
    Revoked,
    Suspended,
    Renewed,
    Cancelled,
}

impl CertificateStatus {
    pub const fn label(self) -> &'static str {
        ComplianceStatus::from_certificate(self).label()
    }

    /// Administrative moves permitted on a certificate. Date-driven moves
    /// (active, expiring soon, expired) go through propagation instead.
    pub fn can_transition_to(self, next: CertificateStatus) -> bool {
        use CertificateStatus::*;
        match (self, next) {
            (Draft | Active | ExpiringSoon | Expired, Revoked) => true,
            (Suspended, Revoked) => true,
            (Active | ExpiringSoon, Suspended) => true,
            (Suspended, Active) => true,
            (Draft | Active | ExpiringSoon | Suspended, Cancelled) => true,
            (Active | ExpiringSoon | Expired, Renewed) => true,
            _ => false,
        }
    }

    /// Date-driven propagation never overwrites these.
    pub const fn is_sticky(self) -> bool {
        matches!(
            self,
            Self::Revoked | Self::Suspended | Self::Renewed | Self::Cancelled
        )
    }
}

impl ComplianceStatus {
    const fn from_certificate(status: CertificateStatus) -> Self {
        match status {
            CertificateStatus::Draft => Self::Draft,
            CertificateStatus::Active => Self::Active,
            CertificateStatus::ExpiringSoon => Self::ExpiringSoon,
            CertificateStatus::Expired => Self::Expired,
            CertificateStatus::Revoked => Self::Revoked,
            CertificateStatus::Suspended => Self::Suspended,
            CertificateStatus::Renewed => Self::Renewed,
            CertificateStatus::Cancelled => Self::Cancelled,
        }
    }
}

impl From<CertificateStatus> for ComplianceStatus {
    fn from(status: CertificateStatus) -> Self {
        Self::from_certificate(status)
    }
}

impl From<ComplianceStatus> for CertificateStatus {
    fn from(status: ComplianceStatus) -> Self {
        match status {
            ComplianceStatus::Draft | ComplianceStatus::Pending => Self::Draft,
            ComplianceStatus::Completed | ComplianceStatus::Active => Self::Active,
            ComplianceStatus::ExpiringSoon => Self::ExpiringSoon,
            ComplianceStatus::Expired => Self::Expired,
            ComplianceStatus::Revoked => Self::Revoked,
            ComplianceStatus::Suspended => Self::Suspended,
            ComplianceStatus::Renewed => Self::Renewed,
            ComplianceStatus::Cancelled => Self::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeCertificateStatus {
    Pending,
    Completed,
    Active,
    ExpiringSoon,
    Expired,
}

impl EmployeeCertificateStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Active => "Active",
            Self::ExpiringSoon => "Expiring Soon",
            Self::Expired => "Expired",
        }
    }
}

impl From<EmployeeCertificateStatus> for ComplianceStatus {
    fn from(status: EmployeeCertificateStatus) -> Self {
        match status {
            EmployeeCertificateStatus::Pending => Self::Pending,
            EmployeeCertificateStatus::Completed => Self::Completed,
            EmployeeCertificateStatus::Active => Self::Active,
            EmployeeCertificateStatus::ExpiringSoon => Self::ExpiringSoon,
            EmployeeCertificateStatus::Expired => Self::Expired,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("status {status:?} has no {target} equivalent")]
pub struct StatusNarrowingError {
    pub status: ComplianceStatus,
    pub target: &'static str,
}

impl TryFrom<ComplianceStatus> for EmployeeCertificateStatus {
    type Error = StatusNarrowingError;

    fn try_from(status: ComplianceStatus) -> Result<Self, Self::Error> {
        match status {
            ComplianceStatus::Pending => Ok(Self::Pending),
            ComplianceStatus::Completed => Ok(Self::Completed),
            ComplianceStatus::Active => Ok(Self::Active),
            ComplianceStatus::ExpiringSoon => Ok(Self::ExpiringSoon),
            ComplianceStatus::Expired => Ok(Self::Expired),
            other => Err(StatusNarrowingError {
                status: other,
                target: "employee certificate",
            }),
        }
    }
}
