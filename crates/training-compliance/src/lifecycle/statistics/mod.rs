//! Compliance rollups per training type, department and category, plus the
//! cached statistics read-model.

mod cache;
mod category;
mod compliance;
mod department;
mod expiry;

pub use cache::{StatisticsService, StatisticsStore, TrainingTypeStatistic};
pub use category::{category_compliance, CategoryCompliance, UNCATEGORIZED};
pub use compliance::{
    compute_compliance_stats, priority_score, risk_level, round2, ComplianceStats, RiskLevel,
};
pub use department::{department_compliance, DepartmentCompliance};
pub use expiry::{upcoming_expiries, ExpiryBucket, ExpiryBuckets, ExpiryEntry};

use super::classifier::{classify, NoExpiryPolicy};
use super::domain::{
    Department, Employee, EmployeeId, TrainingRecord, TrainingType, TrainingTypeId,
};
use super::status::ComplianceStatus;
use crate::config::LifecycleConfig;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Point-in-time copy of the entities the rollups read.
#[derive(Debug, Clone, Default)]
pub struct ComplianceSnapshot {
    pub employees: Vec<Employee>,
    pub departments: Vec<Department>,
    pub training_types: Vec<TrainingType>,
    pub records: Vec<TrainingRecord>,
}

impl ComplianceSnapshot {
    pub fn training_type(&self, id: TrainingTypeId) -> Option<&TrainingType> {
        self.training_types.iter().find(|ty| ty.id == id)
    }

    pub fn active_employees(&self) -> impl Iterator<Item = &Employee> {
        self.employees.iter().filter(|employee| employee.is_active)
    }

    /// Most recent record per employee for one training type.
    pub(crate) fn latest_records(
        &self,
        training_type_id: TrainingTypeId,
    ) -> HashMap<EmployeeId, &TrainingRecord> {
        let mut latest: HashMap<EmployeeId, &TrainingRecord> = HashMap::new();
        for record in self
            .records
            .iter()
            .filter(|record| record.training_type_id == training_type_id)
        {
            latest
                .entry(record.employee_id)
                .and_modify(|current| {
                    if recency_key(record) > recency_key(*current) {
                        *current = record;
                    }
                })
                .or_insert(record);
        }
        latest
    }
}

fn recency_key(record: &TrainingRecord) -> (NaiveDate, NaiveDate, u64) {
    (
        record.expiry_date.unwrap_or(NaiveDate::MAX),
        record.effective_date(),
        record.id.0,
    )
}

/// Knobs the rollups share with the lifecycle service.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsConfig {
    pub default_warning_days: u32,
    pub no_expiry_policy: NoExpiryPolicy,
    pub priority_base_score: u32,
    pub ttl_minutes: i64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self::from(&LifecycleConfig::default())
    }
}

impl From<&LifecycleConfig> for StatisticsConfig {
    fn from(config: &LifecycleConfig) -> Self {
        Self {
            default_warning_days: config.default_warning_days,
            no_expiry_policy: config.no_expiry_policy,
            priority_base_score: config.priority_base_score,
            ttl_minutes: config.statistics_ttl_minutes,
        }
    }
}

/// Status of a record as of `today`, recomputed rather than read from storage.
pub(crate) fn record_standing(
    record: &TrainingRecord,
    training_type: &TrainingType,
    config: &StatisticsConfig,
    today: NaiveDate,
) -> ComplianceStatus {
    let input = record.classification_input(training_type.warning_days(config.default_warning_days));
    classify(
        &input,
        today,
        TrainingRecord::classification_profile(config.no_expiry_policy),
    )
}
