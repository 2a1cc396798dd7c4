use crate::infra::ComplianceState;
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use std::sync::Arc;
use training_compliance::clock::FixedClock;
use training_compliance::config::LifecycleConfig;
use training_compliance::error::AppError;
use training_compliance::lifecycle::classifier::days_until;
use training_compliance::lifecycle::statistics::ExpiryBucket;
use training_compliance::lifecycle::{
    classify, CertificateStatus, CertificateType, CertificateTypeId, ClassificationInput,
    ClassificationProfile, ComplianceStatus, Department, DepartmentId, Employee,
    EmployeeCertificate, EmployeeCertificateId, EmployeeCertificateStatus, EmployeeId,
    NewTrainingRecord, TrainingRecord, TrainingRecordId, TrainingRecordStatus, TrainingType,
    TrainingTypeId,
};
use training_compliance::store::InMemoryComplianceStore;

const FIRST_AID: TrainingTypeId = TrainingTypeId(1);
const DANGEROUS_GOODS: TrainingTypeId = TrainingTypeId(2);
const LEADERSHIP: TrainingTypeId = TrainingTypeId(3);
const FORKLIFT: TrainingTypeId = TrainingTypeId(4);
const OCCUPATIONAL_MEDICAL: CertificateTypeId = CertificateTypeId(1);

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the reporting date (defaults to today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Issuer used when numbering the demo certificates.
    #[arg(long, default_value = "HSE")]
    pub(crate) issuer: String,
}

#[derive(Args, Debug)]
pub(crate) struct ClassifyArgs {
    /// Expiry date (YYYY-MM-DD); omit for open-ended credentials
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) expiry: Option<NaiveDate>,
    /// Issue date (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) issued: Option<NaiveDate>,
    /// Completion date (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) completed: Option<NaiveDate>,
    /// Warning window in days (defaults to the configured window)
    #[arg(long)]
    pub(crate) warning_days: Option<u32>,
    /// Classify as an employee certificate instead of a training record
    #[arg(long)]
    pub(crate) employee_certificate: bool,
    /// Evaluation date (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) fn run_classify(args: ClassifyArgs) -> Result<(), AppError> {
    let config = LifecycleConfig::from_env()?;
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    let (default_warning, profile) = if args.employee_certificate {
        (
            config.certificate_warning_days,
            ClassificationProfile::employee_certificate(config.no_expiry_policy),
        )
    } else {
        (
            config.default_warning_days,
            ClassificationProfile::training_record(config.no_expiry_policy),
        )
    };
    let warning_days = args.warning_days.unwrap_or(default_warning);

    let input = ClassificationInput {
        issue_date: args.issued,
        expiry_date: args.expiry,
        completion_date: args.completed,
        warning_days: i64::from(warning_days),
    };
    let status = classify(&input, today, profile);

    println!("Status as of {today}: {}", status.label());
    match args.expiry {
        Some(expiry) => println!(
            "- expires {expiry} ({} days) | warning window {warning_days} days",
            days_until(expiry, today)
        ),
        None => println!(
            "- no expiry date | open-ended policy {}",
            config.no_expiry_policy
        ),
    }
    println!(
        "- training record view: {} | certificate view: {}",
        TrainingRecordStatus::from(status).label(),
        CertificateStatus::from(status).label()
    );

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { today, issuer } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    let store = Arc::new(InMemoryComplianceStore::new());
    seed_dataset(&store, today);
    let state = ComplianceState::new(
        store,
        Arc::new(FixedClock::on(today)),
        LifecycleConfig::default(),
    );

    println!("Training compliance demo (as of {today})");

    let report = state.lifecycle.update_expired_records()?;
    println!(
        "- Expiry sweep: {} records examined | {} reclassified | {} newly expired | {} failures",
        report.examined, report.reclassified, report.expired, report.failures
    );

    println!("\nCertificates issued");
    let mut expiring_certificate = None;
    for record_id in [TrainingRecordId(1), TrainingRecordId(2), TrainingRecordId(7)] {
        let certificate = state.lifecycle.issue_certificate(record_id, &issuer)?;
        println!(
            "  - {} for employee {} -> {}",
            certificate.certificate_number,
            certificate.employee_id,
            certificate.status.label()
        );
        if certificate.status == CertificateStatus::ExpiringSoon && expiring_certificate.is_none() {
            expiring_certificate = Some(certificate);
        }
    }

    if let Some(previous) = expiring_certificate {
        let renewal = state.lifecycle.renew_certificate(
            previous.id,
            NewTrainingRecord {
                employee_id: previous.employee_id,
                training_type_id: previous.training_type_id,
                provider_id: None,
                certificate_number: None,
                issue_date: today,
                completion_date: Some(today),
                expiry_date: None,
                score: Some(91.0),
                cost_cents: Some(8_500),
            },
            None,
        )?;
        println!(
            "  - renewed {} -> {} (generation {}, expires {})",
            renewal.previous.certificate_number,
            renewal.renewed.certificate_number,
            renewal.renewed.renewal_generation,
            renewal
                .renewed
                .expires_on
                .map(|date| date.to_string())
                .unwrap_or_else(|| "never".to_string())
        );
    }

    println!("\nEmployee certificates");
    for id in [EmployeeCertificateId(1), EmployeeCertificateId(2)] {
        let certificate = state.lifecycle.refresh_employee_certificate(id)?;
        println!(
            "  - #{} employee {} -> {} ({} files)",
            certificate.id,
            certificate.employee_id,
            certificate.status.label(),
            certificate.file_count()
        );
    }

    println!("\nCompliance by training type (highest priority first)");
    for statistic in state.statistics.refresh_all()? {
        let stats = statistic.stats;
        println!(
            "  - {}: {:.2}% compliant | {} active / {} expiring / {} expired / {} untrained | risk {} | priority {}",
            stats.training_type_name,
            stats.compliance_rate,
            stats.active,
            stats.expiring,
            stats.expired,
            stats.untrained,
            stats.risk_level.label(),
            stats.priority_score
        );
    }

    println!("\nFirst aid by department");
    for department in state.statistics.department_compliance(FIRST_AID)? {
        println!(
            "  - {}: {}/{} trained ({:.2}%) | target {}",
            department.department_name,
            department.trained_employees,
            department.total_employees,
            department.compliance_rate,
            if department.target_met { "met" } else { "missed" }
        );
    }

    println!("\nCompliance by category");
    for category in state.statistics.category_compliance()? {
        println!(
            "  - {}: {} types ({} mandatory) | {:.2}% across {} assignments",
            category.category,
            category.training_types,
            category.mandatory_types,
            category.compliance_rate,
            category.total_assignments
        );
    }

    let expiries = state.statistics.upcoming_expiries()?;
    println!("\nUpcoming expiries ({} total)", expiries.total());
    for bucket in [
        ExpiryBucket::Expired,
        ExpiryBucket::Critical,
        ExpiryBucket::Urgent,
        ExpiryBucket::Warning,
    ] {
        let entries = expiries.bucket(bucket);
        if entries.is_empty() {
            continue;
        }
        println!("  {}", bucket.label());
        for entry in entries {
            println!(
                "    - {} | {} | {} ({} days)",
                entry.employee_name,
                entry.training_type_name,
                entry.expiry_date,
                entry.days_until_expiry
            );
        }
    }

    Ok(())
}

/// Loads a small ground-handling workforce with records spread across every
/// expiry bucket. Stored statuses are left stale so the first sweep has work.
pub(crate) fn seed_dataset(store: &InMemoryComplianceStore, today: NaiveDate) {
    for (id, name) in [
        (1, "Ramp Operations"),
        (2, "Maintenance"),
        (3, "Cabin Services"),
    ] {
        store.insert_department(Department {
            id: DepartmentId(id),
            name: name.to_string(),
        });
    }

    let staff = [
        (1, "Avery Quinn", Some(1), true),
        (2, "Jordan Blake", Some(1), true),
        (3, "Riley Chen", Some(2), true),
        (4, "Sam Ortiz", Some(2), true),
        (5, "Morgan Lee", Some(3), true),
        (6, "Casey Patel", Some(3), true),
        (7, "Taylor Brooks", None, true),
        (8, "Drew Hayes", Some(1), false),
    ];
    for (id, name, department, is_active) in staff {
        store.insert_employee(Employee {
            id: EmployeeId(id),
            employee_number: format!("GH-{id:04}"),
            name: name.to_string(),
            department_id: department.map(DepartmentId),
            is_active,
        });
    }

    store.insert_training_type(TrainingType {
        id: FIRST_AID,
        name: "First Aid".to_string(),
        code: "FA".to_string(),
        category: Some("Health & Safety".to_string()),
        validity_months: Some(24),
        warning_period_days: Some(30),
        is_mandatory: true,
        compliance_target_percentage: 90.0,
    });
    store.insert_training_type(TrainingType {
        id: DANGEROUS_GOODS,
        name: "Dangerous Goods Awareness".to_string(),
        code: "DG".to_string(),
        category: Some("Security".to_string()),
        validity_months: Some(24),
        warning_period_days: Some(60),
        is_mandatory: true,
        compliance_target_percentage: 95.0,
    });
    store.insert_training_type(TrainingType {
        id: LEADERSHIP,
        name: "Team Leadership".to_string(),
        code: "LEAD".to_string(),
        category: Some("Development".to_string()),
        validity_months: None,
        warning_period_days: None,
        is_mandatory: false,
        compliance_target_percentage: 50.0,
    });
    store.insert_training_type(TrainingType {
        id: FORKLIFT,
        name: "Forklift Operation".to_string(),
        code: "FLT".to_string(),
        category: None,
        validity_months: Some(36),
        warning_period_days: Some(30),
        is_mandatory: true,
        compliance_target_percentage: 100.0,
    });
    store.insert_certificate_type(CertificateType {
        id: OCCUPATIONAL_MEDICAL,
        name: "Occupational Medical".to_string(),
        validity_months: Some(12),
        warning_days: None,
    });

    // (id, employee, type, issued days ago, expires in days, score, cost in cents)
    let records: [(u64, u64, TrainingTypeId, i64, Option<i64>, Option<f64>, Option<i64>); 12] = [
        (1, 1, FIRST_AID, 600, Some(130), Some(92.0), Some(9_500)),
        (2, 2, FIRST_AID, 710, Some(20), Some(78.5), Some(9_500)),
        (3, 3, FIRST_AID, 740, Some(-10), None, Some(9_500)),
        (4, 4, FIRST_AID, 400, Some(330), Some(88.0), Some(9_500)),
        (5, 5, FIRST_AID, 725, Some(5), Some(81.0), Some(9_500)),
        (6, 1, DANGEROUS_GOODS, 650, Some(80), None, Some(21_000)),
        (7, 2, DANGEROUS_GOODS, 690, Some(40), None, Some(21_000)),
        (8, 6, DANGEROUS_GOODS, 800, Some(-70), None, Some(21_000)),
        (9, 3, LEADERSHIP, 200, None, Some(95.0), Some(45_000)),
        (10, 4, FORKLIFT, 1000, Some(95), None, Some(30_000)),
        (11, 7, FORKLIFT, 1090, Some(0), None, Some(30_000)),
        (12, 8, FIRST_AID, 800, Some(-30), None, Some(9_500)),
    ];
    for (id, employee, training_type_id, issued_ago, expires_in, score, cost_cents) in records {
        let issue_date = today - Duration::days(issued_ago);
        store.insert_training_record(TrainingRecord {
            id: TrainingRecordId(id),
            employee_id: EmployeeId(employee),
            training_type_id,
            provider_id: None,
            certificate_number: None,
            issue_date,
            completion_date: Some(issue_date),
            expiry_date: expires_in.map(|days| today + Duration::days(days)),
            status: TrainingRecordStatus::Active,
            compliance_status: ComplianceStatus::Active,
            score,
            cost_cents,
        });
    }

    store.insert_employee_certificate(EmployeeCertificate {
        id: EmployeeCertificateId(1),
        employee_id: EmployeeId(1),
        certificate_type_id: OCCUPATIONAL_MEDICAL,
        issue_date: Some(today - Duration::days(300)),
        completion_date: Some(today - Duration::days(300)),
        expiry_date: None,
        status: EmployeeCertificateStatus::Pending,
        certificate_files: Vec::new(),
    });
    store.insert_employee_certificate(EmployeeCertificate {
        id: EmployeeCertificateId(2),
        employee_id: EmployeeId(2),
        certificate_type_id: OCCUPATIONAL_MEDICAL,
        issue_date: None,
        completion_date: None,
        expiry_date: None,
        status: EmployeeCertificateStatus::Pending,
        certificate_files: Vec::new(),
    });
}
