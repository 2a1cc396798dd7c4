use super::{record_standing, ComplianceSnapshot, StatisticsConfig};
use crate::lifecycle::domain::{TrainingType, TrainingTypeId};
use crate::lifecycle::status::ComplianceStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const MANDATORY_WEIGHT: u32 = 30;
const EXPIRED_WEIGHT: u32 = 5;
const EXPIRING_WEIGHT: u32 = 3;
const SAFETY_WEIGHT: u32 = 20;
const PRIORITY_CAP: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

/// Compliance rollup for one training type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceStats {
    pub training_type_id: TrainingTypeId,
    pub training_type_name: String,
    pub is_mandatory: bool,
    pub total_employees: usize,
    pub active: usize,
    pub expiring: usize,
    pub expired: usize,
    /// Active employees with no record of this type at all.
    pub untrained: usize,
    pub compliance_rate: f64,
    pub risk_level: RiskLevel,
    pub priority_score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
    pub total_cost_cents: i64,
}

/// Roll up one training type over the active workforce.
///
/// Each active employee counts once, by the standing of their most recent
/// record. Permanent credentials count as active.
pub fn compute_compliance_stats(
    training_type: &TrainingType,
    snapshot: &ComplianceSnapshot,
    config: &StatisticsConfig,
    today: NaiveDate,
) -> ComplianceStats {
    let latest = snapshot.latest_records(training_type.id);

    let mut total_employees = 0;
    let mut active = 0;
    let mut expiring = 0;
    let mut expired = 0;
    let mut untrained = 0;

    for employee in snapshot.active_employees() {
        total_employees += 1;
        match latest.get(&employee.id) {
            Some(record) => match record_standing(record, training_type, config, today) {
                ComplianceStatus::Active | ComplianceStatus::Completed => active += 1,
                ComplianceStatus::ExpiringSoon => expiring += 1,
                ComplianceStatus::Expired => expired += 1,
                _ => untrained += 1,
            },
            None => untrained += 1,
        }
    }

    let records_of_type = || {
        snapshot
            .records
            .iter()
            .filter(|record| record.training_type_id == training_type.id)
    };

    let scores: Vec<f64> = records_of_type().filter_map(|record| record.score).collect();
    let average_score = if scores.is_empty() {
        None
    } else {
        Some(round2(scores.iter().sum::<f64>() / scores.len() as f64))
    };
    let total_cost_cents = records_of_type()
        .filter_map(|record| record.cost_cents)
        .sum();

    let compliance_rate = percentage(active, total_employees);
    let risk_level = risk_level(training_type.is_mandatory, compliance_rate);
    let priority_score = priority_score(
        config.priority_base_score,
        training_type.is_mandatory,
        expired,
        expiring,
        training_type.is_safety_critical(),
    );

    ComplianceStats {
        training_type_id: training_type.id,
        training_type_name: training_type.name.clone(),
        is_mandatory: training_type.is_mandatory,
        total_employees,
        active,
        expiring,
        expired,
        untrained,
        compliance_rate,
        risk_level,
        priority_score,
        average_score,
        total_cost_cents,
    }
}

/// Non-mandatory training never raises risk above `Low`.
pub fn risk_level(is_mandatory: bool, compliance_rate: f64) -> RiskLevel {
    if !is_mandatory {
        return RiskLevel::Low;
    }

    if compliance_rate >= 95.0 {
        RiskLevel::Low
    } else if compliance_rate >= 80.0 {
        RiskLevel::Medium
    } else if compliance_rate >= 60.0 {
        RiskLevel::High
    } else {
        RiskLevel::Critical
    }
}

pub fn priority_score(
    base: u32,
    is_mandatory: bool,
    expired: usize,
    expiring: usize,
    safety_critical: bool,
) -> u32 {
    let mut score = u64::from(base);
    if is_mandatory {
        score += u64::from(MANDATORY_WEIGHT);
    }
    score += u64::from(EXPIRED_WEIGHT) * expired as u64;
    score += u64::from(EXPIRING_WEIGHT) * expiring as u64;
    if safety_critical {
        score += u64::from(SAFETY_WEIGHT);
    }
    score.min(u64::from(PRIORITY_CAP)) as u32
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}
