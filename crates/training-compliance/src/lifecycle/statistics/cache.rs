use super::category::{category_compliance, CategoryCompliance};
use super::compliance::{compute_compliance_stats, ComplianceStats};
use super::department::{department_compliance, DepartmentCompliance};
use super::expiry::{upcoming_expiries, ExpiryBuckets};
use super::StatisticsConfig;
use crate::clock::Clock;
use crate::config::MAX_STATISTICS_TTL_MINUTES;
use crate::lifecycle::domain::TrainingTypeId;
use crate::lifecycle::repository::{LifecycleRepository, RepositoryError};
use crate::lifecycle::service::LifecycleError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Cached statistics row for one training type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingTypeStatistic {
    pub training_type_id: TrainingTypeId,
    pub stats: ComplianceStats,
    pub calculated_at: DateTime<Utc>,
}

impl TrainingTypeStatistic {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age = now.signed_duration_since(self.calculated_at);
        age >= Duration::zero() && age < ttl
    }
}

pub trait StatisticsStore: Send + Sync {
    fn fetch(
        &self,
        training_type_id: TrainingTypeId,
    ) -> Result<Option<TrainingTypeStatistic>, RepositoryError>;
    fn store(&self, statistic: TrainingTypeStatistic) -> Result<(), RepositoryError>;
}

/// Read side of the compliance dashboard: cached per-type rollups plus live
/// department, category and expiry views.
pub struct StatisticsService<R, S> {
    repository: Arc<R>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: StatisticsConfig,
}

impl<R, S> StatisticsService<R, S>
where
    R: LifecycleRepository + 'static,
    S: StatisticsStore + 'static,
{
    pub fn new(
        repository: Arc<R>,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        config: StatisticsConfig,
    ) -> Self {
        Self {
            repository,
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &StatisticsConfig {
        &self.config
    }

    fn ttl(&self) -> Duration {
        Duration::minutes(self.config.ttl_minutes.clamp(0, MAX_STATISTICS_TTL_MINUTES))
    }

    /// Cached stats when fresh, otherwise a recomputation that refreshes the cache.
    pub fn stats_for(
        &self,
        training_type_id: TrainingTypeId,
    ) -> Result<TrainingTypeStatistic, LifecycleError> {
        let now = self.clock.now();
        if let Some(cached) = self.store.fetch(training_type_id)? {
            if cached.is_fresh(now, self.ttl()) {
                debug!(%training_type_id, "serving cached training type statistics");
                return Ok(cached);
            }
        }

        self.refresh(training_type_id)
    }

    pub fn refresh(
        &self,
        training_type_id: TrainingTypeId,
    ) -> Result<TrainingTypeStatistic, LifecycleError> {
        let snapshot = self.repository.snapshot()?;
        let training_type = snapshot
            .training_type(training_type_id)
            .ok_or(LifecycleError::TrainingTypeNotFound(training_type_id))?;

        let now = self.clock.now();
        let stats =
            compute_compliance_stats(training_type, &snapshot, &self.config, now.date_naive());
        let statistic = TrainingTypeStatistic {
            training_type_id,
            stats,
            calculated_at: now,
        };
        self.store.store(statistic.clone())?;
        debug!(
            %training_type_id,
            compliance_rate = statistic.stats.compliance_rate,
            "recomputed training type statistics"
        );
        Ok(statistic)
    }

    /// Recomputes every training type from a single snapshot.
    pub fn refresh_all(&self) -> Result<Vec<TrainingTypeStatistic>, LifecycleError> {
        let snapshot = self.repository.snapshot()?;
        let now = self.clock.now();

        let mut refreshed = Vec::with_capacity(snapshot.training_types.len());
        for training_type in &snapshot.training_types {
            let statistic = TrainingTypeStatistic {
                training_type_id: training_type.id,
                stats: compute_compliance_stats(
                    training_type,
                    &snapshot,
                    &self.config,
                    now.date_naive(),
                ),
                calculated_at: now,
            };
            self.store.store(statistic.clone())?;
            refreshed.push(statistic);
        }

        refreshed.sort_by(|a, b| {
            b.stats
                .priority_score
                .cmp(&a.stats.priority_score)
                .then(a.training_type_id.cmp(&b.training_type_id))
        });
        Ok(refreshed)
    }

    pub fn department_compliance(
        &self,
        training_type_id: TrainingTypeId,
    ) -> Result<Vec<DepartmentCompliance>, LifecycleError> {
        let snapshot = self.repository.snapshot()?;
        let training_type = snapshot
            .training_type(training_type_id)
            .ok_or(LifecycleError::TrainingTypeNotFound(training_type_id))?;
        Ok(department_compliance(
            training_type,
            &snapshot,
            &self.config,
            self.clock.today(),
        ))
    }

    pub fn category_compliance(&self) -> Result<Vec<CategoryCompliance>, LifecycleError> {
        let snapshot = self.repository.snapshot()?;
        Ok(category_compliance(
            &snapshot,
            &self.config,
            self.clock.today(),
        ))
    }

    pub fn upcoming_expiries(&self) -> Result<ExpiryBuckets, LifecycleError> {
        let snapshot = self.repository.snapshot()?;
        Ok(upcoming_expiries(&snapshot, self.clock.today()))
    }
}
