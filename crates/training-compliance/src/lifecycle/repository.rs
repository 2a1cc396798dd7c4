use super::domain::{
    Certificate, CertificateId, CertificateType, CertificateTypeId, Department, Employee,
    EmployeeCertificate, EmployeeCertificateId, EmployeeId, TrainingRecord, TrainingRecordId,
    TrainingType, TrainingTypeId,
};
use super::statistics::ComplianceSnapshot;

/// A single pending write inside a `ChangeSet`.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    UpsertEmployee(Employee),
    DeleteEmployee(EmployeeId),
    UpsertTrainingRecord(TrainingRecord),
    DeleteTrainingRecord(TrainingRecordId),
    UpsertCertificate(Certificate),
    DeleteCertificate(CertificateId),
    UpsertEmployeeCertificate(EmployeeCertificate),
}

/// Unit of work: repositories apply every change or none of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) -> &mut Self {
        self.changes.push(change);
        self
    }

    pub fn with(mut self, change: Change) -> Self {
        self.changes.push(change);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

/// Storage abstraction so the lifecycle service can be exercised in isolation.
pub trait LifecycleRepository: Send + Sync {
    fn employee(&self, id: EmployeeId) -> Result<Option<Employee>, RepositoryError>;
    fn employees(&self) -> Result<Vec<Employee>, RepositoryError>;
    fn departments(&self) -> Result<Vec<Department>, RepositoryError>;

    fn training_type(&self, id: TrainingTypeId) -> Result<Option<TrainingType>, RepositoryError>;
    fn training_types(&self) -> Result<Vec<TrainingType>, RepositoryError>;
    fn certificate_type(
        &self,
        id: CertificateTypeId,
    ) -> Result<Option<CertificateType>, RepositoryError>;

    fn training_record(
        &self,
        id: TrainingRecordId,
    ) -> Result<Option<TrainingRecord>, RepositoryError>;
    fn training_records(&self) -> Result<Vec<TrainingRecord>, RepositoryError>;
    fn records_for_employee(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Vec<TrainingRecord>, RepositoryError>;

    fn certificate(&self, id: CertificateId) -> Result<Option<Certificate>, RepositoryError>;
    fn certificate_for_record(
        &self,
        record_id: TrainingRecordId,
    ) -> Result<Option<Certificate>, RepositoryError>;

    fn employee_certificate(
        &self,
        id: EmployeeCertificateId,
    ) -> Result<Option<EmployeeCertificate>, RepositoryError>;
    fn employee_certificates_for(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Vec<EmployeeCertificate>, RepositoryError>;

    fn next_training_record_id(&self) -> Result<TrainingRecordId, RepositoryError>;
    fn next_certificate_id(&self) -> Result<CertificateId, RepositoryError>;

    /// Applies the whole change set atomically.
    fn apply(&self, changes: ChangeSet) -> Result<(), RepositoryError>;

    /// Consistent read of everything the statistics rollups need.
    fn snapshot(&self) -> Result<ComplianceSnapshot, RepositoryError> {
        Ok(ComplianceSnapshot {
            employees: self.employees()?,
            departments: self.departments()?,
            training_types: self.training_types()?,
            records: self.training_records()?,
        })
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_set_preserves_order() {
        let changes = ChangeSet::new()
            .with(Change::DeleteCertificate(CertificateId(2)))
            .with(Change::DeleteTrainingRecord(TrainingRecordId(1)));

        assert_eq!(changes.len(), 2);
        assert!(matches!(
            changes.changes()[0],
            Change::DeleteCertificate(CertificateId(2))
        ));
    }
}
