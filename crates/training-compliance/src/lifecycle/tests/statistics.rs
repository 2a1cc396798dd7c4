use super::common::*;
use crate::lifecycle::domain::{EmployeeId, TrainingRecordId};
use crate::lifecycle::statistics::{
    compute_compliance_stats, ComplianceSnapshot, ExpiryBucket, RiskLevel, StatisticsConfig,
    StatisticsService,
};
use crate::store::InMemoryComplianceStore;
use chrono::Duration;
use std::sync::Arc;

/// First aid: employee 1 current, 2 expiring, 3 lapsed, 4 never trained.
fn first_aid_roster() -> Arc<InMemoryComplianceStore> {
    let store = seeded_store();
    store.insert_training_record(stale_record(1, 1, FIRST_AID, days(200)));
    store.insert_training_record(stale_record(2, 2, FIRST_AID, days(10)));
    store.insert_training_record(stale_record(3, 3, FIRST_AID, days(-5)));
    store.insert_training_record(stale_record(4, 5, FIRST_AID, days(-50)));
    store
}

#[test]
fn compliance_counts_each_active_employee_once() {
    let store = first_aid_roster();
    let statistics = statistics(&store, clock());

    let stats = statistics.refresh(FIRST_AID).expect("stats compute").stats;

    assert_eq!(stats.total_employees, 4);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.expiring, 1);
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.untrained, 1);
    assert_eq!(stats.compliance_rate, 25.0);
    assert_eq!(stats.risk_level, RiskLevel::Critical);
    // mandatory + one expired + one expiring + safety category
    assert_eq!(stats.priority_score, 58);
}

#[test]
fn latest_record_decides_the_employee_standing() {
    let store = first_aid_roster();
    let mut renewed = stale_record(5, 3, FIRST_AID, days(700));
    renewed.issue_date = days(-2);
    store.insert_training_record(renewed);
    let statistics = statistics(&store, clock());

    let stats = statistics.refresh(FIRST_AID).expect("stats compute").stats;

    assert_eq!(stats.active, 2);
    assert_eq!(stats.expired, 0);
    assert_eq!(stats.compliance_rate, 50.0);
}

#[test]
fn empty_workforce_reports_zero_compliance() {
    let snapshot = ComplianceSnapshot {
        training_types: vec![first_aid()],
        ..ComplianceSnapshot::default()
    };

    let stats =
        compute_compliance_stats(&first_aid(), &snapshot, &StatisticsConfig::default(), today());

    assert_eq!(stats.total_employees, 0);
    assert_eq!(stats.compliance_rate, 0.0);
    assert_eq!(stats.risk_level, RiskLevel::Critical);
}

#[test]
fn optional_training_never_raises_risk() {
    let store = seeded_store();
    let statistics = statistics(&store, clock());

    let stats = statistics.refresh(LEADERSHIP).expect("stats compute").stats;

    assert_eq!(stats.compliance_rate, 0.0);
    assert_eq!(stats.risk_level, RiskLevel::Low);
    assert_eq!(stats.priority_score, 0);
}

#[test]
fn departments_compare_against_the_type_target() {
    let store = first_aid_roster();
    let statistics = statistics(&store, clock());

    let departments = statistics
        .department_compliance(FIRST_AID)
        .expect("departments compute");

    assert_eq!(departments.len(), 2);
    let operations = &departments[0];
    assert_eq!(operations.department_id, OPERATIONS);
    assert_eq!(operations.total_employees, 2);
    assert_eq!(operations.trained_employees, 2);
    assert_eq!(operations.compliance_rate, 100.0);
    assert!(operations.target_met);

    let maintenance = &departments[1];
    assert_eq!(maintenance.department_id, MAINTENANCE);
    assert_eq!(maintenance.total_employees, 1);
    assert_eq!(maintenance.trained_employees, 0);
    assert!(!maintenance.target_met);
}

#[test]
fn categories_roll_up_by_normalized_name() {
    let store = first_aid_roster();
    let statistics = statistics(&store, clock());

    let categories = statistics.category_compliance().expect("categories compute");
    let names: Vec<&str> = categories
        .iter()
        .map(|category| category.category.as_str())
        .collect();
    assert_eq!(names, vec!["development", "health & safety", "uncategorized"]);

    let safety = &categories[1];
    assert_eq!(safety.training_types, 1);
    assert_eq!(safety.mandatory_types, 1);
    assert_eq!(safety.total_assignments, 4);
    assert_eq!(safety.active, 1);
    assert_eq!(safety.compliance_rate, 25.0);
}

#[test]
fn upcoming_expiries_land_in_day_buckets() {
    let store = first_aid_roster();
    store.insert_training_record(stale_record(6, 4, FORKLIFT, days(7)));
    store.insert_training_record(stale_record(7, 1, FORKLIFT, days(45)));
    let statistics = statistics(&store, clock());

    let buckets = statistics.upcoming_expiries().expect("expiries compute");

    let ids = |bucket: ExpiryBucket| -> Vec<TrainingRecordId> {
        buckets.bucket(bucket).iter().map(|entry| entry.record_id).collect()
    };
    assert_eq!(ids(ExpiryBucket::Expired), vec![TrainingRecordId(3)]);
    assert_eq!(ids(ExpiryBucket::Critical), vec![TrainingRecordId(6)]);
    assert_eq!(ids(ExpiryBucket::Urgent), vec![TrainingRecordId(2)]);
    assert_eq!(ids(ExpiryBucket::Warning), vec![TrainingRecordId(7)]);
    assert_eq!(buckets.total(), 4);
    assert_eq!(buckets.critical[0].employee_id, EmployeeId(4));
}

#[test]
fn cached_statistics_are_served_until_the_ttl_lapses() {
    let store = first_aid_roster();
    let clock = clock();
    let statistics = statistics(&store, clock.clone());

    let first = statistics.stats_for(FIRST_AID).expect("stats compute");
    assert_eq!(first.stats.active, 1);

    let mut retrained = stale_record(8, 4, FIRST_AID, days(500));
    retrained.issue_date = days(-1);
    store.insert_training_record(retrained);

    clock.advance(Duration::minutes(59));
    let cached = statistics.stats_for(FIRST_AID).expect("stats served");
    assert_eq!(cached, first);

    clock.advance(Duration::minutes(1));
    let recomputed = statistics.stats_for(FIRST_AID).expect("stats recompute");
    assert_eq!(recomputed.stats.active, 2);
    assert!(recomputed.calculated_at > first.calculated_at);
}

#[test]
fn extreme_ttl_settings_do_not_break_the_cache() {
    let store = first_aid_roster();
    let clock = clock();

    let long_lived = StatisticsService::new(
        store.clone(),
        store.clone(),
        clock.clone(),
        StatisticsConfig {
            ttl_minutes: i64::MAX,
            ..StatisticsConfig::default()
        },
    );
    let first = long_lived.refresh(FIRST_AID).expect("stats compute");
    clock.advance(Duration::days(30));
    assert_eq!(long_lived.stats_for(FIRST_AID).expect("stats served"), first);

    let uncached = StatisticsService::new(
        store.clone(),
        store.clone(),
        clock.clone(),
        StatisticsConfig {
            ttl_minutes: -10,
            ..StatisticsConfig::default()
        },
    );
    let stale = uncached.refresh(FIRST_AID).expect("stats compute");
    clock.advance(Duration::seconds(1));
    let recomputed = uncached.stats_for(FIRST_AID).expect("stats recompute");
    assert!(recomputed.calculated_at > stale.calculated_at);
}

#[test]
fn refresh_all_orders_by_priority() {
    let store = first_aid_roster();
    let statistics = statistics(&store, clock());

    let refreshed = statistics.refresh_all().expect("stats compute");

    assert_eq!(refreshed.len(), 3);
    assert_eq!(refreshed[0].training_type_id, FIRST_AID);
    assert_eq!(refreshed[1].training_type_id, FORKLIFT);
    assert_eq!(refreshed[2].training_type_id, LEADERSHIP);
}
