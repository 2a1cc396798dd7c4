use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use training_compliance::clock::Clock;
use training_compliance::config::LifecycleConfig;
use training_compliance::lifecycle::{LifecycleService, StatisticsConfig, StatisticsService};
use training_compliance::store::{InMemoryComplianceStore, InMemorySequenceStore};

pub(crate) type ComplianceLifecycle = LifecycleService<InMemoryComplianceStore, InMemorySequenceStore>;
pub(crate) type ComplianceStatistics =
    StatisticsService<InMemoryComplianceStore, InMemoryComplianceStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Services behind the `/api/v1` routes, all sharing one store and clock.
#[derive(Clone)]
pub(crate) struct ComplianceState {
    pub(crate) lifecycle: Arc<ComplianceLifecycle>,
    pub(crate) statistics: Arc<ComplianceStatistics>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl ComplianceState {
    pub(crate) fn new(
        store: Arc<InMemoryComplianceStore>,
        clock: Arc<dyn Clock>,
        config: LifecycleConfig,
    ) -> Self {
        let statistics = StatisticsService::new(
            store.clone(),
            store.clone(),
            clock.clone(),
            StatisticsConfig::from(&config),
        );
        let lifecycle = LifecycleService::new(
            store,
            Arc::new(InMemorySequenceStore::new()),
            clock.clone(),
            config,
        );

        Self {
            lifecycle: Arc::new(lifecycle),
            statistics: Arc::new(statistics),
            clock,
        }
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn deserialize_optional_date<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_trims_and_reports_bad_input() {
        assert_eq!(
            parse_date(" 2025-03-01 "),
            Ok(NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date"))
        );
        let err = parse_date("03/01/2025").expect_err("slash dates rejected");
        assert!(err.contains("YYYY-MM-DD"));
    }
}
