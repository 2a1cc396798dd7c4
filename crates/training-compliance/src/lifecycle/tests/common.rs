use std::sync::Arc;

use chrono::{Duration, NaiveDate};

use crate::clock::FixedClock;
use crate::config::LifecycleConfig;
use crate::lifecycle::domain::{
    Certificate, CertificateId, CertificateType, CertificateTypeId, Department, DepartmentId,
    Employee, EmployeeCertificate, EmployeeCertificateId, EmployeeId, TrainingRecord,
    TrainingRecordId, TrainingType, TrainingTypeId,
};
use crate::lifecycle::repository::{
    Change, ChangeSet, LifecycleRepository, RepositoryError,
};
use crate::lifecycle::service::{LifecycleService, NewTrainingRecord};
use crate::lifecycle::statistics::{StatisticsConfig, StatisticsService};
use crate::lifecycle::status::{ComplianceStatus, EmployeeCertificateStatus, TrainingRecordStatus};
use crate::store::{InMemoryComplianceStore, InMemorySequenceStore};

pub(super) const FIRST_AID: TrainingTypeId = TrainingTypeId(1);
pub(super) const LEADERSHIP: TrainingTypeId = TrainingTypeId(2);
pub(super) const FORKLIFT: TrainingTypeId = TrainingTypeId(3);
pub(super) const OPERATIONS: DepartmentId = DepartmentId(10);
pub(super) const MAINTENANCE: DepartmentId = DepartmentId(20);
pub(super) const MEDICAL: CertificateTypeId = CertificateTypeId(1);

pub(super) type Service = LifecycleService<InMemoryComplianceStore, InMemorySequenceStore>;

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date")
}

pub(super) fn days(offset: i64) -> NaiveDate {
    today() + Duration::days(offset)
}

pub(super) fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::on(today()))
}

pub(super) fn first_aid() -> TrainingType {
    TrainingType {
        id: FIRST_AID,
        name: "First Aid".to_string(),
        code: "FA".to_string(),
        category: Some("Health & Safety".to_string()),
        validity_months: Some(24),
        warning_period_days: Some(30),
        is_mandatory: true,
        compliance_target_percentage: 90.0,
    }
}

pub(super) fn leadership() -> TrainingType {
    TrainingType {
        id: LEADERSHIP,
        name: "Leadership Essentials".to_string(),
        code: "LEAD".to_string(),
        category: Some("Development".to_string()),
        validity_months: None,
        warning_period_days: None,
        is_mandatory: false,
        compliance_target_percentage: 50.0,
    }
}

pub(super) fn forklift() -> TrainingType {
    TrainingType {
        id: FORKLIFT,
        name: "Forklift Operation".to_string(),
        code: "FLT".to_string(),
        category: None,
        validity_months: Some(36),
        warning_period_days: Some(60),
        is_mandatory: true,
        compliance_target_percentage: 100.0,
    }
}

pub(super) fn employee(id: u64, department: Option<DepartmentId>) -> Employee {
    Employee {
        id: EmployeeId(id),
        employee_number: format!("E-{id:03}"),
        name: format!("Employee {id}"),
        department_id: department,
        is_active: true,
    }
}

/// Two departments, four active employees, one inactive, three training types.
pub(super) fn seeded_store() -> Arc<InMemoryComplianceStore> {
    let store = Arc::new(InMemoryComplianceStore::new());
    store.insert_department(Department {
        id: OPERATIONS,
        name: "Operations".to_string(),
    });
    store.insert_department(Department {
        id: MAINTENANCE,
        name: "Maintenance".to_string(),
    });
    store.insert_employee(employee(1, Some(OPERATIONS)));
    store.insert_employee(employee(2, Some(OPERATIONS)));
    store.insert_employee(employee(3, Some(MAINTENANCE)));
    store.insert_employee(employee(4, None));
    store.insert_employee(Employee {
        is_active: false,
        ..employee(5, Some(MAINTENANCE))
    });
    store.insert_training_type(first_aid());
    store.insert_training_type(leadership());
    store.insert_training_type(forklift());
    store.insert_certificate_type(CertificateType {
        id: MEDICAL,
        name: "Occupational Medical".to_string(),
        validity_months: Some(12),
        warning_days: None,
    });
    store
}

pub(super) fn service(store: &Arc<InMemoryComplianceStore>, clock: Arc<FixedClock>) -> Service {
    LifecycleService::new(
        store.clone(),
        Arc::new(InMemorySequenceStore::new()),
        clock,
        LifecycleConfig::default(),
    )
}

pub(super) fn statistics(
    store: &Arc<InMemoryComplianceStore>,
    clock: Arc<FixedClock>,
) -> StatisticsService<InMemoryComplianceStore, InMemoryComplianceStore> {
    StatisticsService::new(
        store.clone(),
        store.clone(),
        clock,
        StatisticsConfig::default(),
    )
}

pub(super) fn completed(
    employee: u64,
    training_type_id: TrainingTypeId,
    issued: NaiveDate,
    expiry: Option<NaiveDate>,
) -> NewTrainingRecord {
    NewTrainingRecord {
        employee_id: EmployeeId(employee),
        training_type_id,
        provider_id: None,
        certificate_number: None,
        issue_date: issued,
        completion_date: Some(issued),
        expiry_date: expiry,
        score: None,
        cost_cents: None,
    }
}

/// A record stored with whatever status it was last saved with.
pub(super) fn stale_record(
    id: u64,
    employee: u64,
    training_type_id: TrainingTypeId,
    expiry: NaiveDate,
) -> TrainingRecord {
    TrainingRecord {
        id: TrainingRecordId(id),
        employee_id: EmployeeId(employee),
        training_type_id,
        provider_id: None,
        certificate_number: None,
        issue_date: expiry - Duration::days(700),
        completion_date: None,
        expiry_date: Some(expiry),
        status: TrainingRecordStatus::Active,
        compliance_status: ComplianceStatus::Active,
        score: None,
        cost_cents: None,
    }
}

pub(super) fn pending_employee_certificate(
    id: u64,
    employee: u64,
    completion: Option<NaiveDate>,
) -> EmployeeCertificate {
    EmployeeCertificate {
        id: EmployeeCertificateId(id),
        employee_id: EmployeeId(employee),
        certificate_type_id: MEDICAL,
        issue_date: completion,
        completion_date: completion,
        expiry_date: None,
        status: EmployeeCertificateStatus::Pending,
        certificate_files: Vec::new(),
    }
}

/// Delegates to the in-memory store but refuses any change set that writes a certificate.
pub(super) struct CertificateWritesUnavailable(pub Arc<InMemoryComplianceStore>);

impl LifecycleRepository for CertificateWritesUnavailable {
    fn employee(&self, id: EmployeeId) -> Result<Option<Employee>, RepositoryError> {
        self.0.employee(id)
    }

    fn employees(&self) -> Result<Vec<Employee>, RepositoryError> {
        self.0.employees()
    }

    fn departments(&self) -> Result<Vec<Department>, RepositoryError> {
        self.0.departments()
    }

    fn training_type(&self, id: TrainingTypeId) -> Result<Option<TrainingType>, RepositoryError> {
        self.0.training_type(id)
    }

    fn training_types(&self) -> Result<Vec<TrainingType>, RepositoryError> {
        self.0.training_types()
    }

    fn certificate_type(
        &self,
        id: CertificateTypeId,
    ) -> Result<Option<CertificateType>, RepositoryError> {
        self.0.certificate_type(id)
    }

    fn training_record(
        &self,
        id: TrainingRecordId,
    ) -> Result<Option<TrainingRecord>, RepositoryError> {
        self.0.training_record(id)
    }

    fn training_records(&self) -> Result<Vec<TrainingRecord>, RepositoryError> {
        self.0.training_records()
    }

    fn records_for_employee(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Vec<TrainingRecord>, RepositoryError> {
        self.0.records_for_employee(employee_id)
    }

    fn certificate(&self, id: CertificateId) -> Result<Option<Certificate>, RepositoryError> {
        self.0.certificate(id)
    }

    fn certificate_for_record(
        &self,
        record_id: TrainingRecordId,
    ) -> Result<Option<Certificate>, RepositoryError> {
        self.0.certificate_for_record(record_id)
    }

    fn employee_certificate(
        &self,
        id: EmployeeCertificateId,
    ) -> Result<Option<EmployeeCertificate>, RepositoryError> {
        self.0.employee_certificate(id)
    }

    fn employee_certificates_for(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Vec<EmployeeCertificate>, RepositoryError> {
        self.0.employee_certificates_for(employee_id)
    }

    fn next_training_record_id(&self) -> Result<TrainingRecordId, RepositoryError> {
        self.0.next_training_record_id()
    }

    fn next_certificate_id(&self) -> Result<CertificateId, RepositoryError> {
        self.0.next_certificate_id()
    }

    fn apply(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        if changes
            .changes()
            .iter()
            .any(|change| matches!(change, Change::UpsertCertificate(_)))
        {
            return Err(RepositoryError::Unavailable(
                "certificate table locked".to_string(),
            ));
        }
        self.0.apply(changes)
    }
}
