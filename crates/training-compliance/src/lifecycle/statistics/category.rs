use super::compliance::{compute_compliance_stats, percentage};
use super::{ComplianceSnapshot, StatisticsConfig};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

pub const UNCATEGORIZED: &str = "uncategorized";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryCompliance {
    pub category: String,
    pub training_types: usize,
    pub mandatory_types: usize,
    pub total_assignments: usize,
    pub active: usize,
    pub expiring: usize,
    pub expired: usize,
    pub compliance_rate: f64,
}

/// Sums per-type rollups by category (case-insensitive, trimmed).
pub fn category_compliance(
    snapshot: &ComplianceSnapshot,
    config: &StatisticsConfig,
    today: NaiveDate,
) -> Vec<CategoryCompliance> {
    let mut categories: BTreeMap<String, CategoryCompliance> = BTreeMap::new();

    for training_type in &snapshot.training_types {
        let key = training_type
            .category
            .as_deref()
            .map(|category| category.trim().to_lowercase())
            .filter(|category| !category.is_empty())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());

        let stats = compute_compliance_stats(training_type, snapshot, config, today);
        let entry = categories
            .entry(key.clone())
            .or_insert_with(|| CategoryCompliance {
                category: key,
                ..CategoryCompliance::default()
            });

        entry.training_types += 1;
        if training_type.is_mandatory {
            entry.mandatory_types += 1;
        }
        entry.total_assignments += stats.total_employees;
        entry.active += stats.active;
        entry.expiring += stats.expiring;
        entry.expired += stats.expired;
    }

    categories
        .into_values()
        .map(|mut entry| {
            entry.compliance_rate = percentage(entry.active, entry.total_assignments);
            entry
        })
        .collect()
}
