use crate::cli::ServeArgs;
use crate::demo::seed_dataset;
use crate::infra::{AppState, ComplianceLifecycle, ComplianceState};
use crate::routes::with_compliance_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use training_compliance::clock::{Clock, SystemClock};
use training_compliance::config::{AppConfig, AppEnvironment};
use training_compliance::error::AppError;
use training_compliance::store::InMemoryComplianceStore;
use training_compliance::telemetry;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemoryComplianceStore::new());
    if config.environment == AppEnvironment::Development {
        seed_dataset(&store, clock.today());
        info!("seeded demo workforce");
    }

    let sweep_interval = Duration::from_secs(config.lifecycle.sweep_interval_secs);
    let state = ComplianceState::new(store, clock, config.lifecycle.clone());
    spawn_expiry_sweep(state.lifecycle.clone(), sweep_interval);

    let app = with_compliance_routes(state)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "training compliance service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Runs the expiry sweep on a fixed interval. A zero interval disables it.
fn spawn_expiry_sweep(lifecycle: Arc<ComplianceLifecycle>, every: Duration) {
    if every.is_zero() {
        info!("scheduled expiry sweep disabled");
        return;
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let lifecycle = lifecycle.clone();
            match tokio::task::spawn_blocking(move || lifecycle.update_expired_records()).await {
                Ok(Ok(report)) if report.failures > 0 => {
                    warn!(failures = report.failures, "expiry sweep finished with failures")
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!(error = %err, "expiry sweep failed"),
                Err(err) => warn!(error = %err, "expiry sweep task aborted"),
            }
        }
    });
}
