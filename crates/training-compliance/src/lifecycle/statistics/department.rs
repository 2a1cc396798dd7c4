use super::compliance::percentage;
use super::{record_standing, ComplianceSnapshot, StatisticsConfig};
use crate::lifecycle::domain::{DepartmentId, TrainingType};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentCompliance {
    pub department_id: DepartmentId,
    pub department_name: String,
    pub total_employees: usize,
    pub trained_employees: usize,
    pub compliance_rate: f64,
    pub target_met: bool,
}

/// Per-department share of active employees holding a valid record of the type.
///
/// Departments without active employees are listed with a zero rate; employees
/// without a department are left out.
pub fn department_compliance(
    training_type: &TrainingType,
    snapshot: &ComplianceSnapshot,
    config: &StatisticsConfig,
    today: NaiveDate,
) -> Vec<DepartmentCompliance> {
    let latest = snapshot.latest_records(training_type.id);

    let mut tallies: BTreeMap<DepartmentId, (usize, usize)> = snapshot
        .departments
        .iter()
        .map(|department| (department.id, (0, 0)))
        .collect();

    for employee in snapshot.active_employees() {
        let Some(department_id) = employee.department_id else {
            continue;
        };
        let trained = latest
            .get(&employee.id)
            .map(|record| record_standing(record, training_type, config, today).is_valid())
            .unwrap_or(false);

        let entry = tallies.entry(department_id).or_insert((0, 0));
        entry.0 += 1;
        if trained {
            entry.1 += 1;
        }
    }

    tallies
        .into_iter()
        .map(|(department_id, (total_employees, trained_employees))| {
            let department_name = snapshot
                .departments
                .iter()
                .find(|department| department.id == department_id)
                .map(|department| department.name.clone())
                .unwrap_or_else(|| format!("Department {department_id}"));
            let compliance_rate = percentage(trained_employees, total_employees);

            DepartmentCompliance {
                department_id,
                department_name,
                total_employees,
                trained_employees,
                compliance_rate,
                target_met: compliance_rate >= training_type.compliance_target_percentage,
            }
        })
        .collect()
}
