use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::lifecycle::domain::{
    Certificate, CertificateId, CertificateType, CertificateTypeId, Department, DepartmentId,
    Employee, EmployeeCertificate, EmployeeCertificateId, EmployeeId, TrainingRecord, TrainingRecordId,
    TrainingType, TrainingTypeId,
};
use crate::lifecycle::repository::{Change, ChangeSet, LifecycleRepository, RepositoryError};
use crate::lifecycle::statistics::{ComplianceSnapshot, StatisticsStore, TrainingTypeStatistic};

#[derive(Debug, Clone, Default)]
struct Tables {
    departments: BTreeMap<DepartmentId, Department>,
    employees: BTreeMap<EmployeeId, Employee>,
    training_types: BTreeMap<TrainingTypeId, TrainingType>,
    certificate_types: BTreeMap<CertificateTypeId, CertificateType>,
    records: BTreeMap<TrainingRecordId, TrainingRecord>,
    certificates: BTreeMap<CertificateId, Certificate>,
    employee_certificates: BTreeMap<EmployeeCertificateId, EmployeeCertificate>,
}

impl Tables {
    fn apply(&mut self, change: Change) -> Result<(), RepositoryError> {
        match change {
            Change::UpsertEmployee(employee) => {
                self.employees.insert(employee.id, employee);
            }
            Change::DeleteEmployee(id) => {
                let owns_records = self.records.values().any(|record| record.employee_id == id)
                    || self
                        .employee_certificates
                        .values()
                        .any(|certificate| certificate.employee_id == id);
                if owns_records {
                    return Err(RepositoryError::Constraint(format!(
                        "employee {id} is referenced by training records"
                    )));
                }
                self.employees.remove(&id).ok_or(RepositoryError::NotFound)?;
            }
            Change::UpsertTrainingRecord(record) => {
                if !self.employees.contains_key(&record.employee_id) {
                    return Err(RepositoryError::Constraint(format!(
                        "training record {} references missing employee {}",
                        record.id, record.employee_id
                    )));
                }
                if let Some(number) = &record.certificate_number {
                    let duplicate = self.records.values().any(|other| {
                        other.id != record.id && other.certificate_number.as_ref() == Some(number)
                    });
                    if duplicate {
                        return Err(RepositoryError::Conflict);
                    }
                }
                self.records.insert(record.id, record);
            }
            Change::DeleteTrainingRecord(id) => {
                if self
                    .certificates
                    .values()
                    .any(|certificate| certificate.training_record_id == id)
                {
                    return Err(RepositoryError::Constraint(format!(
                        "training record {id} still owns a certificate"
                    )));
                }
                self.records.remove(&id).ok_or(RepositoryError::NotFound)?;
            }
            Change::UpsertCertificate(certificate) => {
                if !self.records.contains_key(&certificate.training_record_id) {
                    return Err(RepositoryError::Constraint(format!(
                        "certificate {} references missing training record {}",
                        certificate.id, certificate.training_record_id
                    )));
                }
                let duplicate = self.certificates.values().any(|other| {
                    other.id != certificate.id
                        && (other.training_record_id == certificate.training_record_id
                            || other.certificate_number == certificate.certificate_number)
                });
                if duplicate {
                    return Err(RepositoryError::Conflict);
                }
                self.certificates.insert(certificate.id, certificate);
            }
            Change::DeleteCertificate(id) => {
                self.certificates
                    .remove(&id)
                    .ok_or(RepositoryError::NotFound)?;
            }
            Change::UpsertEmployeeCertificate(certificate) => {
                if !self.employees.contains_key(&certificate.employee_id) {
                    return Err(RepositoryError::Constraint(format!(
                        "employee certificate {} references missing employee {}",
                        certificate.id, certificate.employee_id
                    )));
                }
                self.employee_certificates
                    .insert(certificate.id, certificate);
            }
        }
        Ok(())
    }
}

/// Thread-safe store backing the service and tests.
///
/// `apply` stages the whole change set on a copy of the tables and swaps it
/// in only when every change succeeded.
#[derive(Debug, Clone, Default)]
pub struct InMemoryComplianceStore {
    tables: Arc<Mutex<Tables>>,
    statistics: Arc<Mutex<HashMap<TrainingTypeId, TrainingTypeStatistic>>>,
    next_record_id: Arc<AtomicU64>,
    next_certificate_id: Arc<AtomicU64>,
}

impl InMemoryComplianceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_department(&self, department: Department) {
        let mut guard = self.tables.lock().expect("store mutex poisoned");
        guard.departments.insert(department.id, department);
    }

    pub fn insert_employee(&self, employee: Employee) {
        let mut guard = self.tables.lock().expect("store mutex poisoned");
        guard.employees.insert(employee.id, employee);
    }

    pub fn insert_training_type(&self, training_type: TrainingType) {
        let mut guard = self.tables.lock().expect("store mutex poisoned");
        guard.training_types.insert(training_type.id, training_type);
    }

    pub fn insert_certificate_type(&self, certificate_type: CertificateType) {
        let mut guard = self.tables.lock().expect("store mutex poisoned");
        guard
            .certificate_types
            .insert(certificate_type.id, certificate_type);
    }

    /// Seeds a record as-is, bypassing classification.
    pub fn insert_training_record(&self, record: TrainingRecord) {
        let id = record.id.0;
        let mut guard = self.tables.lock().expect("store mutex poisoned");
        guard.records.insert(record.id, record);
        self.next_record_id.fetch_max(id, Ordering::SeqCst);
    }

    pub fn insert_certificate(&self, certificate: Certificate) {
        let id = certificate.id.0;
        let mut guard = self.tables.lock().expect("store mutex poisoned");
        guard.certificates.insert(certificate.id, certificate);
        self.next_certificate_id.fetch_max(id, Ordering::SeqCst);
    }

    pub fn insert_employee_certificate(&self, certificate: EmployeeCertificate) {
        let mut guard = self.tables.lock().expect("store mutex poisoned");
        guard
            .employee_certificates
            .insert(certificate.id, certificate);
    }

    pub fn certificates(&self) -> Vec<Certificate> {
        let guard = self.tables.lock().expect("store mutex poisoned");
        guard.certificates.values().cloned().collect()
    }

    fn read<T>(&self, read: impl FnOnce(&Tables) -> T) -> Result<T, RepositoryError> {
        let guard = self
            .tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))?;
        Ok(read(&guard))
    }
}

impl LifecycleRepository for InMemoryComplianceStore {
    fn employee(&self, id: EmployeeId) -> Result<Option<Employee>, RepositoryError> {
        self.read(|tables| tables.employees.get(&id).cloned())
    }

    fn employees(&self) -> Result<Vec<Employee>, RepositoryError> {
        self.read(|tables| tables.employees.values().cloned().collect())
    }

    fn departments(&self) -> Result<Vec<Department>, RepositoryError> {
        self.read(|tables| tables.departments.values().cloned().collect())
    }

    fn training_type(&self, id: TrainingTypeId) -> Result<Option<TrainingType>, RepositoryError> {
        self.read(|tables| tables.training_types.get(&id).cloned())
    }

    fn training_types(&self) -> Result<Vec<TrainingType>, RepositoryError> {
        self.read(|tables| tables.training_types.values().cloned().collect())
    }

    fn certificate_type(
        &self,
        id: CertificateTypeId,
    ) -> Result<Option<CertificateType>, RepositoryError> {
        self.read(|tables| tables.certificate_types.get(&id).cloned())
    }

    fn training_record(
        &self,
        id: TrainingRecordId,
    ) -> Result<Option<TrainingRecord>, RepositoryError> {
        self.read(|tables| tables.records.get(&id).cloned())
    }

    fn training_records(&self) -> Result<Vec<TrainingRecord>, RepositoryError> {
        self.read(|tables| tables.records.values().cloned().collect())
    }

    fn records_for_employee(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Vec<TrainingRecord>, RepositoryError> {
        self.read(|tables| {
            tables
                .records
                .values()
                .filter(|record| record.employee_id == employee_id)
                .cloned()
                .collect()
        })
    }

    fn certificate(&self, id: CertificateId) -> Result<Option<Certificate>, RepositoryError> {
        self.read(|tables| tables.certificates.get(&id).cloned())
    }

    fn certificate_for_record(
        &self,
        record_id: TrainingRecordId,
    ) -> Result<Option<Certificate>, RepositoryError> {
        self.read(|tables| {
            tables
                .certificates
                .values()
                .find(|certificate| certificate.training_record_id == record_id)
                .cloned()
        })
    }

    fn employee_certificate(
        &self,
        id: EmployeeCertificateId,
    ) -> Result<Option<EmployeeCertificate>, RepositoryError> {
        self.read(|tables| tables.employee_certificates.get(&id).cloned())
    }

    fn employee_certificates_for(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Vec<EmployeeCertificate>, RepositoryError> {
        self.read(|tables| {
            tables
                .employee_certificates
                .values()
                .filter(|certificate| certificate.employee_id == employee_id)
                .cloned()
                .collect()
        })
    }

    fn next_training_record_id(&self) -> Result<TrainingRecordId, RepositoryError> {
        Ok(TrainingRecordId(
            self.next_record_id.fetch_add(1, Ordering::SeqCst) + 1,
        ))
    }

    fn next_certificate_id(&self) -> Result<CertificateId, RepositoryError> {
        Ok(CertificateId(
            self.next_certificate_id.fetch_add(1, Ordering::SeqCst) + 1,
        ))
    }

    fn apply(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))?;

        let mut staged = guard.clone();
        for change in changes.into_changes() {
            staged.apply(change)?;
        }
        *guard = staged;
        Ok(())
    }

    fn snapshot(&self) -> Result<ComplianceSnapshot, RepositoryError> {
        self.read(|tables| ComplianceSnapshot {
            employees: tables.employees.values().cloned().collect(),
            departments: tables.departments.values().cloned().collect(),
            training_types: tables.training_types.values().cloned().collect(),
            records: tables.records.values().cloned().collect(),
        })
    }
}

impl StatisticsStore for InMemoryComplianceStore {
    fn fetch(
        &self,
        training_type_id: TrainingTypeId,
    ) -> Result<Option<TrainingTypeStatistic>, RepositoryError> {
        let guard = self
            .statistics
            .lock()
            .map_err(|_| RepositoryError::Unavailable("statistics mutex poisoned".to_string()))?;
        Ok(guard.get(&training_type_id).cloned())
    }

    fn store(&self, statistic: TrainingTypeStatistic) -> Result<(), RepositoryError> {
        let mut guard = self
            .statistics
            .lock()
            .map_err(|_| RepositoryError::Unavailable("statistics mutex poisoned".to_string()))?;
        guard.insert(statistic.training_type_id, statistic);
        Ok(())
    }
}
