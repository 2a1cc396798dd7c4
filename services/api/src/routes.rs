use crate::infra::{deserialize_optional_date, AppState, ComplianceState};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use training_compliance::clock::Clock;
use training_compliance::error::AppError;
use training_compliance::lifecycle::classifier::{days_until, warning_starts_on};
use training_compliance::lifecycle::sequence::format_certificate_number;
use training_compliance::lifecycle::statistics::{
    CategoryCompliance, DepartmentCompliance, ExpiryBuckets,
};
use training_compliance::lifecycle::{
    classify, Certificate, ClassificationInput, ClassificationProfile, ComplianceStatus,
    LifecycleError, NewTrainingRecord, SaveOutcome, SequenceKey, SequenceStore, SweepReport,
    TrainingRecordId, TrainingTypeId, TrainingTypeStatistic,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ClassificationSubject {
    #[default]
    TrainingRecord,
    EmployeeCertificate,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClassifyRequest {
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) issue_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) expiry_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) completion_date: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) warning_days: Option<u32>,
    #[serde(default)]
    pub(crate) subject: ClassificationSubject,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassifyResponse {
    pub(crate) status: ComplianceStatus,
    pub(crate) label: &'static str,
    pub(crate) today: NaiveDate,
    pub(crate) warning_days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) days_until_expiry: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) warning_starts_on: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatisticsQuery {
    #[serde(default)]
    pub(crate) refresh: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssueCertificateRequest {
    pub(crate) issuer: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NextSequenceRequest {
    pub(crate) training_type_id: TrainingTypeId,
    pub(crate) issuer: String,
    pub(crate) year: i32,
    pub(crate) month: u32,
    #[serde(default)]
    pub(crate) type_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NextSequenceResponse {
    pub(crate) number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) certificate_number: Option<String>,
}

pub(crate) fn compliance_router(state: ComplianceState) -> Router {
    Router::new()
        .route("/api/v1/classify", post(classify_endpoint))
        .route("/api/v1/training-records", post(record_training_endpoint))
        .route("/api/v1/training-records/sweep", post(sweep_endpoint))
        .route(
            "/api/v1/training-records/:id/certificate",
            post(issue_certificate_endpoint),
        )
        .route(
            "/api/v1/training-types/:id/statistics",
            get(statistics_endpoint),
        )
        .route(
            "/api/v1/training-types/:id/departments",
            get(departments_endpoint),
        )
        .route("/api/v1/categories", get(categories_endpoint))
        .route("/api/v1/expiries", get(expiries_endpoint))
        .route("/api/v1/sequences/next", post(next_sequence_endpoint))
        .with_state(state)
}

pub(crate) fn with_compliance_routes(state: ComplianceState) -> Router {
    compliance_router(state)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn classify_endpoint(
    State(state): State<ComplianceState>,
    Json(payload): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let config = state.lifecycle.config();
    let (default_warning, profile) = match payload.subject {
        ClassificationSubject::TrainingRecord => (
            config.default_warning_days,
            ClassificationProfile::training_record(config.no_expiry_policy),
        ),
        ClassificationSubject::EmployeeCertificate => (
            config.certificate_warning_days,
            ClassificationProfile::employee_certificate(config.no_expiry_policy),
        ),
    };
    let warning_days = payload.warning_days.unwrap_or(default_warning);
    let today = payload.today.unwrap_or_else(|| state.clock.today());

    if let (Some(issue), Some(expiry)) = (payload.issue_date, payload.expiry_date) {
        if expiry < issue {
            return Err(AppError::Validation(format!(
                "expiry date {expiry} precedes issue date {issue}"
            )));
        }
    }

    let warning_start = match payload.expiry_date {
        Some(expiry) => Some(
            warning_starts_on(expiry, i64::from(warning_days)).ok_or_else(|| {
                AppError::Validation(format!(
                    "warning window of {warning_days} days reaches past the supported calendar"
                ))
            })?,
        ),
        None => None,
    };

    let input = ClassificationInput {
        issue_date: payload.issue_date,
        expiry_date: payload.expiry_date,
        completion_date: payload.completion_date,
        warning_days: i64::from(warning_days),
    };
    let status = classify(&input, today, profile);

    Ok(Json(ClassifyResponse {
        status,
        label: status.label(),
        today,
        warning_days,
        days_until_expiry: payload.expiry_date.map(|expiry| days_until(expiry, today)),
        warning_starts_on: warning_start,
    }))
}

pub(crate) async fn record_training_endpoint(
    State(state): State<ComplianceState>,
    Json(payload): Json<NewTrainingRecord>,
) -> Result<(StatusCode, Json<SaveOutcome>), AppError> {
    let outcome = state.lifecycle.record_training(payload)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub(crate) async fn issue_certificate_endpoint(
    State(state): State<ComplianceState>,
    Path(record_id): Path<TrainingRecordId>,
    Json(payload): Json<IssueCertificateRequest>,
) -> Result<(StatusCode, Json<Certificate>), AppError> {
    let certificate = state
        .lifecycle
        .issue_certificate(record_id, &payload.issuer)?;
    Ok((StatusCode::CREATED, Json(certificate)))
}

pub(crate) async fn sweep_endpoint(
    State(state): State<ComplianceState>,
) -> Result<Json<SweepReport>, AppError> {
    Ok(Json(state.lifecycle.update_expired_records()?))
}

pub(crate) async fn statistics_endpoint(
    State(state): State<ComplianceState>,
    Path(training_type_id): Path<TrainingTypeId>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<TrainingTypeStatistic>, AppError> {
    let statistic = if query.refresh {
        state.statistics.refresh(training_type_id)?
    } else {
        state.statistics.stats_for(training_type_id)?
    };
    Ok(Json(statistic))
}

pub(crate) async fn departments_endpoint(
    State(state): State<ComplianceState>,
    Path(training_type_id): Path<TrainingTypeId>,
) -> Result<Json<Vec<DepartmentCompliance>>, AppError> {
    Ok(Json(
        state.statistics.department_compliance(training_type_id)?,
    ))
}

pub(crate) async fn categories_endpoint(
    State(state): State<ComplianceState>,
) -> Result<Json<Vec<CategoryCompliance>>, AppError> {
    Ok(Json(state.statistics.category_compliance()?))
}

pub(crate) async fn expiries_endpoint(
    State(state): State<ComplianceState>,
) -> Result<Json<ExpiryBuckets>, AppError> {
    Ok(Json(state.statistics.upcoming_expiries()?))
}

pub(crate) async fn next_sequence_endpoint(
    State(state): State<ComplianceState>,
    Json(payload): Json<NextSequenceRequest>,
) -> Result<Json<NextSequenceResponse>, AppError> {
    let NextSequenceRequest {
        training_type_id,
        issuer,
        year,
        month,
        type_code,
    } = payload;

    let key = SequenceKey::new(training_type_id, &issuer, year, month)
        .map_err(LifecycleError::from)?;
    let number = state
        .lifecycle
        .numbers()
        .store()
        .increment(&key)
        .map_err(LifecycleError::from)?;
    let certificate_number = type_code.map(|code| format_certificate_number(&key, &code, number));

    Ok(Json(NextSequenceResponse {
        number,
        certificate_number,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::seed_dataset;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tower::ServiceExt;
    use training_compliance::clock::FixedClock;
    use training_compliance::config::LifecycleConfig;
    use training_compliance::store::InMemoryComplianceStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date")
    }

    fn build_router() -> Router {
        let store = Arc::new(InMemoryComplianceStore::new());
        seed_dataset(&store, today());
        let state = ComplianceState::new(
            store,
            Arc::new(FixedClock::on(today())),
            LifecycleConfig::default(),
        );
        with_compliance_routes(state)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("router dispatch");
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("json")
        };
        (status, payload)
    }

    fn post_json(uri: &str, payload: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&payload).expect("serialize payload"),
            ))
            .expect("request")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn classify_reports_the_warning_window() {
        let router = build_router();

        let (status, payload) = send(
            &router,
            post_json(
                "/api/v1/classify",
                json!({ "expiry_date": "2025-06-30", "warning_days": 30 }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["status"], json!("expiring_soon"));
        assert_eq!(payload["days_until_expiry"], json!(15));
        assert_eq!(payload["warning_starts_on"], json!("2025-05-31"));
    }

    #[tokio::test]
    async fn classify_rejects_expiry_before_issue() {
        let router = build_router();

        let (status, payload) = send(
            &router,
            post_json(
                "/api/v1/classify",
                json!({ "issue_date": "2025-06-01", "expiry_date": "2025-01-01" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(payload["error"]
            .as_str()
            .expect("error message")
            .contains("precedes"));
    }

    #[tokio::test]
    async fn classify_rejects_an_oversized_warning_window() {
        let router = build_router();

        let (status, payload) = send(
            &router,
            post_json(
                "/api/v1/classify",
                json!({ "expiry_date": "2025-06-30", "warning_days": 4_294_967_295u64 }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(payload["error"]
            .as_str()
            .expect("error message")
            .contains("warning window"));
    }

    #[tokio::test]
    async fn unknown_training_type_statistics_is_not_found() {
        let router = build_router();

        let (status, _) = send(&router, get_request("/api/v1/training-types/999/statistics")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn statistics_and_departments_for_seeded_type() {
        let router = build_router();

        let (status, payload) = send(&router, get_request("/api/v1/training-types/1/statistics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["stats"]["training_type_id"], json!(1));
        assert!(payload["stats"]["total_employees"].as_u64().expect("count") > 0);

        let (status, payload) = send(&router, get_request("/api/v1/training-types/1/departments")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!payload.as_array().expect("department list").is_empty());
    }

    #[tokio::test]
    async fn recorded_training_can_be_certified() {
        let router = build_router();

        let (status, saved) = send(
            &router,
            post_json(
                "/api/v1/training-records",
                json!({
                    "employee_id": 1,
                    "training_type_id": 1,
                    "issue_date": "2025-06-10",
                    "completion_date": "2025-06-10"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let record_id = saved["record"]["id"].as_u64().expect("record id");

        let uri = format!("/api/v1/training-records/{record_id}/certificate");
        let (status, certificate) =
            send(&router, post_json(&uri, json!({ "issuer": "hse" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(certificate["certificate_number"]
            .as_str()
            .expect("number")
            .starts_with("HSE-FA-202506-"));

        let (status, _) = send(&router, post_json(&uri, json!({ "issuer": "hse" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn sequence_endpoint_counts_per_bucket() {
        let router = build_router();
        let request = || {
            post_json(
                "/api/v1/sequences/next",
                json!({
                    "training_type_id": 5,
                    "issuer": "DGCA",
                    "year": 2025,
                    "month": 3,
                    "type_code": "rsi"
                }),
            )
        };

        let (_, first) = send(&router, request()).await;
        let (_, second) = send(&router, request()).await;

        assert_eq!(first["number"], json!(1));
        assert_eq!(second["number"], json!(2));
        assert_eq!(second["certificate_number"], json!("DGCA-RSI-202503-0002"));

        let (status, _) = send(
            &router,
            post_json(
                "/api/v1/sequences/next",
                json!({ "training_type_id": 5, "issuer": " ", "year": 2025, "month": 3 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn sweep_is_idempotent_over_http() {
        let router = build_router();

        let (status, first) = send(
            &router,
            post_json("/api/v1/training-records/sweep", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["failures"], json!(0));

        let (_, second) = send(
            &router,
            post_json("/api/v1/training-records/sweep", json!({})),
        )
        .await;
        assert_eq!(second["reclassified"], json!(0));
    }

    #[tokio::test]
    async fn expiries_and_categories_are_listed() {
        let router = build_router();

        let (status, expiries) = send(&router, get_request("/api/v1/expiries")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(expiries.get("expired").is_some());
        assert!(expiries.get("critical").is_some());

        let (status, categories) = send(&router, get_request("/api/v1/categories")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!categories.as_array().expect("category list").is_empty());
    }

    #[tokio::test]
    async fn readiness_reflects_the_flag() {
        let readiness = Arc::new(AtomicBool::new(false));
        let app_state = AppState {
            readiness: readiness.clone(),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        let router = build_router().layer(Extension(app_state));

        let (status, payload) = send(&router, get_request("/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload["status"], json!("initializing"));

        readiness.store(true, std::sync::atomic::Ordering::Release);
        let (status, _) = send(&router, get_request("/ready")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, payload) = send(&router, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["status"], json!("ok"));
    }
}
