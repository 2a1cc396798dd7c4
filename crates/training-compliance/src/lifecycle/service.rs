use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::classifier::{classify, derive_expiry, ClassificationProfile};
use super::domain::{
    Certificate, CertificateId, Employee, EmployeeCertificate, EmployeeCertificateId, EmployeeId,
    LifecycleStage, ProviderId, TrainingRecord, TrainingRecordId, TrainingType, TrainingTypeId,
};
use super::events::EmployeeEvents;
use super::repository::{Change, ChangeSet, LifecycleRepository, RepositoryError};
use super::sequence::{CertificateNumberGenerator, ReservedNumber, SequenceError, SequenceStore};
use super::status::{
    CertificateStatus, ComplianceStatus, EmployeeCertificateStatus, StatusNarrowingError,
    TrainingRecordStatus,
};
use crate::clock::Clock;
use crate::config::LifecycleConfig;

/// Input for a freshly completed training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrainingRecord {
    pub employee_id: EmployeeId,
    pub training_type_id: TrainingTypeId,
    #[serde(default)]
    pub provider_id: Option<ProviderId>,
    #[serde(default)]
    pub certificate_number: Option<String>,
    pub issue_date: NaiveDate,
    #[serde(default)]
    pub completion_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub cost_cents: Option<i64>,
}

impl NewTrainingRecord {
    fn into_record(self, id: TrainingRecordId) -> TrainingRecord {
        TrainingRecord {
            id,
            employee_id: self.employee_id,
            training_type_id: self.training_type_id,
            provider_id: self.provider_id,
            certificate_number: self.certificate_number,
            issue_date: self.issue_date,
            completion_date: self.completion_date,
            expiry_date: self.expiry_date,
            status: TrainingRecordStatus::Active,
            compliance_status: ComplianceStatus::Active,
            score: self.score,
            cost_cents: self.cost_cents,
        }
    }
}

/// Result of persisting a training record together with its certificate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveOutcome {
    pub record: TrainingRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Certificate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<TrainingRecordStatus>,
    pub certificate_updated: bool,
}

impl SaveOutcome {
    pub fn status_changed(&self) -> bool {
        self.previous_status
            .map(|previous| previous != self.record.status)
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenewalOutcome {
    pub previous: Certificate,
    pub renewed: Certificate,
    pub record: TrainingRecord,
}

/// Tally of one `update_expired_records` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub reclassified: usize,
    pub expired: usize,
    pub certificates_updated: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateAction {
    Revoke,
    Suspend,
    Reinstate,
    Cancel,
}

impl CertificateAction {
    pub const fn target(self) -> CertificateStatus {
        match self {
            Self::Revoke => CertificateStatus::Revoked,
            Self::Suspend => CertificateStatus::Suspended,
            Self::Reinstate => CertificateStatus::Active,
            Self::Cancel => CertificateStatus::Cancelled,
        }
    }
}

/// Error raised by the lifecycle service.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("employee {0} not found")]
    EmployeeNotFound(EmployeeId),
    #[error("employee {0} already exists")]
    EmployeeExists(EmployeeId),
    #[error("employee {employee_id} still owns {records} training record(s) or certificate(s)")]
    EmployeeHasRecords {
        employee_id: EmployeeId,
        records: usize,
    },
    #[error("training type {0} not found")]
    TrainingTypeNotFound(TrainingTypeId),
    #[error("training record {0} not found")]
    TrainingRecordNotFound(TrainingRecordId),
    #[error("certificate {0} not found")]
    CertificateNotFound(CertificateId),
    #[error("employee certificate {0} not found")]
    EmployeeCertificateNotFound(EmployeeCertificateId),
    #[error("training record {0} already has a certificate")]
    CertificateExists(TrainingRecordId),
    #[error("certificate number {0} is already in use")]
    CertificateNumberInUse(String),
    #[error("certificate {certificate_id} is not held by employee {employee_id}")]
    RenewalHolderMismatch {
        certificate_id: CertificateId,
        employee_id: EmployeeId,
    },
    #[error("certificate cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        from: CertificateStatus,
        to: CertificateStatus,
    },
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error(transparent)]
    Narrowing(#[from] StatusNarrowingError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Keeps training records, their certificates, and employee certificates in
/// step with the calendar.
///
/// Status flows one way, from a training record to its certificate. Every
/// write that touches both goes through a single `ChangeSet`.
pub struct LifecycleService<R, Q> {
    repository: Arc<R>,
    numbers: CertificateNumberGenerator<Q>,
    clock: Arc<dyn Clock>,
    config: LifecycleConfig,
    events: EmployeeEvents,
    // Held from the conflict checks through the commit of a new certificate.
    issuance: Mutex<()>,
}

impl<R, Q> LifecycleService<R, Q>
where
    R: LifecycleRepository + 'static,
    Q: SequenceStore + 'static,
{
    pub fn new(
        repository: Arc<R>,
        sequences: Arc<Q>,
        clock: Arc<dyn Clock>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            repository,
            numbers: CertificateNumberGenerator::new(sequences),
            clock,
            config,
            events: EmployeeEvents::default(),
            issuance: Mutex::new(()),
        }
    }

    pub fn with_events(mut self, events: EmployeeEvents) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn numbers(&self) -> &CertificateNumberGenerator<Q> {
        &self.numbers
    }

    pub fn register_employee(&self, employee: Employee) -> Result<Employee, LifecycleError> {
        if self.repository.employee(employee.id)?.is_some() {
            return Err(LifecycleError::EmployeeExists(employee.id));
        }

        self.repository
            .apply(ChangeSet::new().with(Change::UpsertEmployee(employee.clone())))?;
        self.events.employee_created(&employee);
        Ok(employee)
    }

    pub fn update_employee(&self, employee: Employee) -> Result<Employee, LifecycleError> {
        let previous = self
            .repository
            .employee(employee.id)?
            .ok_or(LifecycleError::EmployeeNotFound(employee.id))?;

        self.repository
            .apply(ChangeSet::new().with(Change::UpsertEmployee(employee.clone())))?;
        if previous.employee_number != employee.employee_number {
            self.events
                .employee_id_changed(&employee, &previous.employee_number);
        }
        Ok(employee)
    }

    /// Employees that still own records cannot be deleted.
    pub fn delete_employee(&self, employee_id: EmployeeId) -> Result<Employee, LifecycleError> {
        let employee = self
            .repository
            .employee(employee_id)?
            .ok_or(LifecycleError::EmployeeNotFound(employee_id))?;

        let owned = self.repository.records_for_employee(employee_id)?.len()
            + self.repository.employee_certificates_for(employee_id)?.len();
        if owned > 0 {
            warn!(%employee_id, owned, "refusing to delete employee with records");
            return Err(LifecycleError::EmployeeHasRecords {
                employee_id,
                records: owned,
            });
        }

        self.repository
            .apply(ChangeSet::new().with(Change::DeleteEmployee(employee_id)))?;
        self.events.employee_deleted(&employee);
        Ok(employee)
    }

    /// Allocate an id for a completed training and save it.
    pub fn record_training(&self, input: NewTrainingRecord) -> Result<SaveOutcome, LifecycleError> {
        let id = self.repository.next_training_record_id()?;
        self.save_training_record(input.into_record(id))
    }

    /// Re-derive the record's status and push it to the linked certificate.
    pub fn save_training_record(
        &self,
        mut record: TrainingRecord,
    ) -> Result<SaveOutcome, LifecycleError> {
        if self.repository.employee(record.employee_id)?.is_none() {
            return Err(LifecycleError::EmployeeNotFound(record.employee_id));
        }
        let training_type = self.training_type(record.training_type_id)?;

        if record.expiry_date.is_none() {
            record.expiry_date = derive_expiry(record.effective_date(), training_type.validity_months);
        }

        let status = self.classify_record(&record, &training_type);
        record.compliance_status = status;
        record.status = TrainingRecordStatus::from(status);

        let previous_status = self
            .repository
            .training_record(record.id)?
            .map(|stored| stored.status);

        self.commit_record(record, previous_status)
    }

    pub fn mark_as_expired(
        &self,
        record_id: TrainingRecordId,
    ) -> Result<SaveOutcome, LifecycleError> {
        self.force_status(record_id, ComplianceStatus::Expired)
    }

    pub fn mark_as_active(&self, record_id: TrainingRecordId) -> Result<SaveOutcome, LifecycleError> {
        self.force_status(record_id, ComplianceStatus::Active)
    }

    /// Reclassify every record whose stored status is stale.
    ///
    /// Each record commits in its own unit of work, so one failing write does
    /// not hold back the rest. Running the sweep twice changes nothing.
    pub fn update_expired_records(&self) -> Result<SweepReport, LifecycleError> {
        let records = self.repository.training_records()?;
        let mut report = SweepReport {
            examined: records.len(),
            ..SweepReport::default()
        };

        let mut types: HashMap<TrainingTypeId, TrainingType> = HashMap::new();
        for mut record in records {
            let cached = types.get(&record.training_type_id).cloned();
            let training_type = match cached {
                Some(found) => found,
                None => match self.repository.training_type(record.training_type_id)? {
                    Some(found) => {
                        types.insert(found.id, found.clone());
                        found
                    }
                    None => {
                        warn!(record_id = %record.id, training_type_id = %record.training_type_id, "skipping record with unknown training type");
                        report.failures += 1;
                        continue;
                    }
                },
            };

            let status = self.classify_record(&record, &training_type);
            if status == record.compliance_status {
                continue;
            }

            let previous_status = Some(record.status);
            debug!(record_id = %record.id, from = ?record.compliance_status, to = ?status, "reclassifying training record");
            record.compliance_status = status;
            record.status = TrainingRecordStatus::from(status);

            match self.commit_record(record, previous_status) {
                Ok(outcome) => {
                    report.reclassified += 1;
                    if outcome.record.status == TrainingRecordStatus::Expired
                        && outcome.status_changed()
                    {
                        report.expired += 1;
                    }
                    if outcome.certificate_updated {
                        report.certificates_updated += 1;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "expiry sweep failed to persist record");
                    report.failures += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            reclassified = report.reclassified,
            expired = report.expired,
            certificates_updated = report.certificates_updated,
            failures = report.failures,
            "expiry sweep finished"
        );
        Ok(report)
    }

    /// Reclassify an employee certificate against its certificate type's window.
    pub fn refresh_employee_certificate(
        &self,
        id: EmployeeCertificateId,
    ) -> Result<EmployeeCertificate, LifecycleError> {
        let mut certificate = self
            .repository
            .employee_certificate(id)?
            .ok_or(LifecycleError::EmployeeCertificateNotFound(id))?;
        let certificate_type = self.repository.certificate_type(certificate.certificate_type_id)?;

        let warning_days = certificate_type
            .as_ref()
            .map(|ty| ty.warning_days(self.config.certificate_warning_days))
            .unwrap_or_else(|| i64::from(self.config.certificate_warning_days));

        if certificate.expiry_date.is_none() {
            let anchor = certificate.completion_date.or(certificate.issue_date);
            let validity = certificate_type.as_ref().and_then(|ty| ty.validity_months);
            certificate.expiry_date = anchor.and_then(|anchor| derive_expiry(anchor, validity));
        }

        let status = classify(
            &certificate.classification_input(warning_days),
            self.clock.today(),
            ClassificationProfile::employee_certificate(self.config.no_expiry_policy),
        );
        certificate.status = EmployeeCertificateStatus::try_from(status)?;

        self.repository.apply(
            ChangeSet::new().with(Change::UpsertEmployeeCertificate(certificate.clone())),
        )?;
        Ok(certificate)
    }

    /// Issue the certificate for a training record, numbering it within the
    /// issuer's month of the record's issue date.
    pub fn issue_certificate(
        &self,
        record_id: TrainingRecordId,
        issuer: &str,
    ) -> Result<Certificate, LifecycleError> {
        let _issuing = self.issuance_lock()?;
        let mut record = self
            .repository
            .training_record(record_id)?
            .ok_or(LifecycleError::TrainingRecordNotFound(record_id))?;
        if self.repository.certificate_for_record(record_id)?.is_some() {
            return Err(LifecycleError::CertificateExists(record_id));
        }
        self.ensure_employee(record.employee_id)?;
        let training_type = self.training_type(record.training_type_id)?;

        let (certificate, reserved) =
            self.build_certificate(&record, &training_type, issuer, None)?;
        let mut changes = ChangeSet::new();
        if record.certificate_number.is_none() {
            record.certificate_number = Some(certificate.certificate_number.clone());
            changes.push(Change::UpsertTrainingRecord(record));
        }
        changes.push(Change::UpsertCertificate(certificate.clone()));
        self.commit_numbered(changes, &reserved)?;

        info!(
            certificate_id = %certificate.id,
            number = %certificate.certificate_number,
            "issued certificate"
        );
        Ok(certificate)
    }

    /// Replace a certificate with one backed by a new training record.
    ///
    /// The old certificate is marked renewed and both ends of the chain are
    /// linked in the same change set as the new record.
    pub fn renew_certificate(
        &self,
        certificate_id: CertificateId,
        renewal: NewTrainingRecord,
        issuer: Option<&str>,
    ) -> Result<RenewalOutcome, LifecycleError> {
        let _issuing = self.issuance_lock()?;
        let mut previous = self
            .repository
            .certificate(certificate_id)?
            .ok_or(LifecycleError::CertificateNotFound(certificate_id))?;
        if !previous
            .status
            .can_transition_to(CertificateStatus::Renewed)
        {
            return Err(LifecycleError::InvalidTransition {
                from: previous.status,
                to: CertificateStatus::Renewed,
            });
        }
        if renewal.employee_id != previous.employee_id {
            return Err(LifecycleError::RenewalHolderMismatch {
                certificate_id,
                employee_id: renewal.employee_id,
            });
        }

        self.ensure_employee(renewal.employee_id)?;
        if let Some(number) = &renewal.certificate_number {
            self.ensure_number_free(number)?;
        }

        let training_type = self.training_type(renewal.training_type_id)?;
        let mut record = renewal.into_record(self.repository.next_training_record_id()?);
        if record.expiry_date.is_none() {
            record.expiry_date = derive_expiry(record.effective_date(), training_type.validity_months);
        }
        let status = self.classify_record(&record, &training_type);
        record.compliance_status = status;
        record.status = TrainingRecordStatus::from(status);

        let issuer = issuer.unwrap_or(previous.issuer.as_str()).to_string();
        let (renewed, reserved) =
            self.build_certificate(&record, &training_type, &issuer, Some(&previous))?;
        if record.certificate_number.is_none() {
            record.certificate_number = Some(renewed.certificate_number.clone());
        }

        previous.set_status(CertificateStatus::Renewed);
        previous.renewed_to_id = Some(renewed.id);

        let changes = ChangeSet::new()
            .with(Change::UpsertTrainingRecord(record.clone()))
            .with(Change::UpsertCertificate(renewed.clone()))
            .with(Change::UpsertCertificate(previous.clone()));
        self.commit_numbered(changes, &reserved)?;

        info!(
            from = %previous.id,
            to = %renewed.id,
            generation = renewed.renewal_generation,
            "renewed certificate"
        );
        Ok(RenewalOutcome {
            previous,
            renewed,
            record,
        })
    }

    pub fn transition_certificate(
        &self,
        certificate_id: CertificateId,
        action: CertificateAction,
    ) -> Result<Certificate, LifecycleError> {
        let mut certificate = self
            .repository
            .certificate(certificate_id)?
            .ok_or(LifecycleError::CertificateNotFound(certificate_id))?;

        let mut target = action.target();
        if action == CertificateAction::Reinstate {
            // Reinstated certificates pick the date-driven status back up.
            if let Some(record) = self.repository.training_record(certificate.training_record_id)? {
                target = CertificateStatus::from(record.compliance_status);
            }
        }

        if !certificate.status.can_transition_to(action.target()) {
            return Err(LifecycleError::InvalidTransition {
                from: certificate.status,
                to: action.target(),
            });
        }

        certificate.set_status(target);
        self.repository
            .apply(ChangeSet::new().with(Change::UpsertCertificate(certificate.clone())))?;
        info!(%certificate_id, ?action, status = ?certificate.status, "certificate transitioned");
        Ok(certificate)
    }

    /// Deletes a training record and the certificate it owns together.
    pub fn delete_training_record(
        &self,
        record_id: TrainingRecordId,
    ) -> Result<TrainingRecord, LifecycleError> {
        let record = self
            .repository
            .training_record(record_id)?
            .ok_or(LifecycleError::TrainingRecordNotFound(record_id))?;

        let mut changes = ChangeSet::new();
        if let Some(certificate) = self.repository.certificate_for_record(record_id)? {
            changes.push(Change::DeleteCertificate(certificate.id));
        }
        changes.push(Change::DeleteTrainingRecord(record_id));
        self.repository.apply(changes)?;
        Ok(record)
    }

    fn training_type(&self, id: TrainingTypeId) -> Result<TrainingType, LifecycleError> {
        self.repository
            .training_type(id)?
            .ok_or(LifecycleError::TrainingTypeNotFound(id))
    }

    fn classify_record(&self, record: &TrainingRecord, training_type: &TrainingType) -> ComplianceStatus {
        let input =
            record.classification_input(training_type.warning_days(self.config.default_warning_days));
        classify(
            &input,
            self.clock.today(),
            TrainingRecord::classification_profile(self.config.no_expiry_policy),
        )
    }

    fn force_status(
        &self,
        record_id: TrainingRecordId,
        status: ComplianceStatus,
    ) -> Result<SaveOutcome, LifecycleError> {
        let mut record = self
            .repository
            .training_record(record_id)?
            .ok_or(LifecycleError::TrainingRecordNotFound(record_id))?;

        let previous_status = Some(record.status);
        record.compliance_status = status;
        record.status = TrainingRecordStatus::from(status);
        self.commit_record(record, previous_status)
    }

    fn commit_record(
        &self,
        record: TrainingRecord,
        previous_status: Option<TrainingRecordStatus>,
    ) -> Result<SaveOutcome, LifecycleError> {
        let mut changes = ChangeSet::new().with(Change::UpsertTrainingRecord(record.clone()));

        let linked = self.repository.certificate_for_record(record.id)?;
        let propagated = linked
            .as_ref()
            .and_then(|certificate| propagate_status(certificate, &record));
        if let Some(updated) = &propagated {
            changes.push(Change::UpsertCertificate(updated.clone()));
        }

        self.repository.apply(changes)?;

        let certificate_updated = propagated.is_some();
        Ok(SaveOutcome {
            record,
            certificate: propagated.or(linked),
            previous_status,
            certificate_updated,
        })
    }

    fn issuance_lock(&self) -> Result<MutexGuard<'_, ()>, LifecycleError> {
        self.issuance.lock().map_err(|_| {
            LifecycleError::Repository(RepositoryError::Unavailable(
                "issuance mutex poisoned".to_string(),
            ))
        })
    }

    fn ensure_employee(&self, employee_id: EmployeeId) -> Result<(), LifecycleError> {
        match self.repository.employee(employee_id)? {
            Some(_) => Ok(()),
            None => Err(LifecycleError::EmployeeNotFound(employee_id)),
        }
    }

    fn ensure_number_free(&self, number: &str) -> Result<(), LifecycleError> {
        let taken = self
            .repository
            .training_records()?
            .iter()
            .any(|record| record.certificate_number.as_deref() == Some(number));
        if taken {
            return Err(LifecycleError::CertificateNumberInUse(number.to_string()));
        }
        Ok(())
    }

    /// Applies a change set that carries a freshly numbered certificate. A
    /// rejected commit hands the number back so the period stays gapless.
    fn commit_numbered(
        &self,
        changes: ChangeSet,
        reserved: &ReservedNumber,
    ) -> Result<(), LifecycleError> {
        let Err(err) = self.repository.apply(changes) else {
            return Ok(());
        };

        match self.numbers.release(reserved) {
            Ok(true) => {}
            Ok(false) => warn!(
                number = %reserved.certificate_number,
                "certificate number could not be returned to its sequence"
            ),
            Err(release_err) => warn!(error = %release_err, "failed to release certificate number"),
        }
        Err(err.into())
    }

    fn build_certificate(
        &self,
        record: &TrainingRecord,
        training_type: &TrainingType,
        issuer: &str,
        renewed_from: Option<&Certificate>,
    ) -> Result<(Certificate, ReservedNumber), LifecycleError> {
        let id = self.repository.next_certificate_id()?;
        let reserved = self.numbers.reserve_certificate_number(
            training_type.id,
            &training_type.code,
            issuer,
            record.issue_date,
        )?;
        let status = CertificateStatus::from(record.compliance_status);

        let certificate = Certificate {
            id,
            training_record_id: record.id,
            employee_id: record.employee_id,
            training_type_id: record.training_type_id,
            certificate_number: reserved.certificate_number.clone(),
            issuer: issuer.trim().to_string(),
            issued_on: record.issue_date,
            expires_on: record.expiry_date,
            status,
            lifecycle_stage: LifecycleStage::for_status(status),
            renewed_from_id: renewed_from.map(|previous| previous.id),
            renewed_to_id: None,
            renewal_generation: renewed_from
                .map(|previous| previous.renewal_generation + 1)
                .unwrap_or(0),
        };
        Ok((certificate, reserved))
    }
}

/// The certificate as it should look after its record was saved, or `None`
/// when nothing changes. Administrative statuses are never overwritten.
pub fn propagate_status(certificate: &Certificate, record: &TrainingRecord) -> Option<Certificate> {
    if certificate.status.is_sticky() {
        return None;
    }

    let status = CertificateStatus::from(record.compliance_status);
    if certificate.status == status && certificate.expires_on == record.expiry_date {
        return None;
    }

    let mut updated = certificate.clone();
    updated.set_status(status);
    updated.expires_on = record.expiry_date;
    Some(updated)
}
