//! Certificate and training-record status lifecycle.
//!
//! Leaf to root: the date-window classifier, per-period certificate
//! numbering, the service that propagates record status to certificates, and
//! the statistics rollups that feed compliance dashboards.

pub mod classifier;
pub mod domain;
pub mod events;
pub mod repository;
pub mod sequence;
pub mod service;
pub mod statistics;
pub mod status;

#[cfg(test)]
mod tests;

pub use classifier::{classify, ClassificationInput, ClassificationProfile, NoExpiryPolicy};
pub use domain::{
    Certificate, CertificateFile, CertificateId, CertificateType, CertificateTypeId, Department,
    DepartmentId, Employee, EmployeeCertificate, EmployeeCertificateId, EmployeeId,
    LifecycleStage, ProviderId, TrainingRecord, TrainingRecordId, TrainingType, TrainingTypeId,
};
pub use events::{EmployeeEventSubscriber, EmployeeEvents, SubscriberError};
pub use repository::{Change, ChangeSet, LifecycleRepository, RepositoryError};
pub use sequence::{
    CertificateNumberGenerator, ReservedNumber, SequenceError, SequenceKey, SequenceStore,
};
pub use service::{
    CertificateAction, LifecycleError, LifecycleService, NewTrainingRecord, RenewalOutcome,
    SaveOutcome, SweepReport,
};
pub use statistics::{
    ComplianceSnapshot, ComplianceStats, RiskLevel, StatisticsConfig, StatisticsService,
    StatisticsStore, TrainingTypeStatistic,
};
pub use status::{
    CertificateStatus, ComplianceStatus, EmployeeCertificateStatus, TrainingRecordStatus,
};
