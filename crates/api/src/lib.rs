//! Wetland Alerts API Server
//!
//! REST API and WebSocket server for threshold alerts, the alert lifecycle
//! and per-user notifications.

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod auth;
pub mod config;
mod error;
mod rate_limit;
mod routes;

pub use auth::{CurrentActor, USER_ID_HEADER, USER_ROLE_HEADER};
pub use crate::config::{LoggingConfig, ServerConfig, ServiceConfig, StorageConfig};
pub use error::{ApiError, ErrorResponse};
pub use rate_limit::{BucketConfig, RateLimitConfig};

use alerting::{AlertLedger, ThresholdSweep};
use broadcast::BroadcastRegistry;
use notifier::{FanOut, Inbox, NotificationDispatcher, WorkerPool};
use storage::{AlertStore, Repository, SqliteRepository, TelemetryStore, UserDirectory};

/// Application state shared across handlers
pub struct AppState {
    pub ledger: Arc<AlertLedger>,
    pub sweep: Arc<ThresholdSweep>,
    pub inbox: Inbox,
    pub registry: BroadcastRegistry,
    pub telemetry: Arc<dyn TelemetryStore>,
    pub directory: Arc<dyn UserDirectory>,
    /// Prometheus renderer, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Wire the pipeline over one store. The returned pool drains once
    /// every handle to the state is dropped.
    pub fn new<S>(store: Arc<S>, config: &ServiceConfig) -> (Self, WorkerPool)
    where
        S: AlertStore + TelemetryStore + UserDirectory + 'static,
    {
        let registry = BroadcastRegistry::spawn(config.broadcast.clone());
        let fanout = Arc::new(FanOut::new(store.clone(), store.clone()));
        let (dispatcher, pool) = NotificationDispatcher::spawn(config.notifier.clone(), fanout);

        let ledger = Arc::new(AlertLedger::new(
            store.clone(),
            &config.alerting,
            dispatcher,
            registry.clone(),
        ));
        let sweep = Arc::new(ThresholdSweep::new(
            ledger.clone(),
            store.clone(),
            registry.clone(),
            config.alerting.sweep_window(),
        ));

        let state = Self {
            ledger,
            sweep,
            inbox: Inbox::new(store.clone()),
            registry,
            telemetry: store.clone(),
            directory: store,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        };
        (state, pool)
    }

    /// Build state over the configured store
    pub async fn from_config(config: &ServiceConfig) -> anyhow::Result<(Self, WorkerPool)> {
        match &config.storage.database_url {
            Some(url) => {
                let store = SqliteRepository::connect(url, config.storage.max_connections).await?;
                Ok(Self::new(Arc::new(store), config))
            }
            None => {
                warn!("No database_url configured, alerts will not survive a restart");
                Ok(Self::new(Arc::new(Repository::new()), config))
            }
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub database: ComponentHealth,
    pub broadcast: ComponentHealth,
}

/// Individual component health
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub count: Option<u64>,
}

impl ComponentHealth {
    fn from_result<E: std::fmt::Display>(result: Result<u64, E>) -> Self {
        match result {
            Ok(count) => Self {
                status: "ok".to_string(),
                count: Some(count),
            },
            Err(e) => {
                warn!("Health probe failed: {}", e);
                Self {
                    status: "unavailable".to_string(),
                    count: None,
                }
            }
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Create the application router
pub fn create_router(
    state: Arc<AppState>,
    server: &ServerConfig,
    rate_limit: &RateLimitConfig,
) -> Router {
    let sweep = with_limit(
        Router::new().route(
            "/api/v1/alerts/check-thresholds",
            post(routes::alerts::check_thresholds),
        ),
        "sweep",
        &rate_limit.sweep,
    );
    let telemetry = with_limit(
        Router::new().route(
            "/api/v1/telemetry",
            post(routes::telemetry::ingest_reading),
        ),
        "telemetry",
        &rate_limit.telemetry,
    );

    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            "/api/v1/alerts",
            get(routes::alerts::list_alerts).post(routes::alerts::create_alert),
        )
        .route("/api/v1/alerts/stats/summary", get(routes::alerts::get_summary))
        .route("/api/v1/alerts/:id", get(routes::alerts::get_alert))
        .route("/api/v1/alerts/:id/acknowledge", put(routes::alerts::acknowledge_alert))
        .route("/api/v1/alerts/:id/resolve", put(routes::alerts::resolve_alert))
        .route("/api/v1/notifications", get(routes::notifications::list_notifications))
        .route("/api/v1/notifications/:id/read", put(routes::notifications::mark_read))
        .route("/ws/events", get(routes::ws::events))
        .merge(sweep)
        .merge(telemetry)
        .layer(cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn with_limit(
    router: Router<Arc<AppState>>,
    group: &str,
    bucket: &rate_limit::BucketConfig,
) -> Router<Arc<AppState>> {
    match rate_limit::create_governor_config(bucket) {
        Some(governor) => router.layer(rate_limit::governor_layer(governor)),
        None => {
            warn!("Rate limiting disabled for {}: invalid settings {:?}", group, bucket);
            router
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let database = ComponentHealth::from_result(state.telemetry.reading_count().await);
    let observers = state.registry.observer_count().await.map(|n| n as u64);
    let broadcast = ComponentHealth::from_result(observers);
    let healthy = database.is_ok() && broadcast.is_ok();

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus { database, broadcast },
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Prometheus scrape endpoint
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed".to_string()),
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level: Level = config.level.parse()?;
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);

    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Run the server until Ctrl-C, then drain queued fan-out
pub async fn run_server(
    config: ServiceConfig,
    metrics: Option<PrometheusHandle>,
) -> anyhow::Result<()> {
    let (state, pool) = AppState::from_config(&config).await?;
    let state = match metrics {
        Some(handle) => state.with_metrics(handle),
        None => state,
    };
    let state = Arc::new(state);

    let schedule: Option<JoinHandle<()>> = config
        .alerting
        .sweep_interval()
        .map(|interval| state.sweep.clone().spawn_schedule(interval));

    let app = create_router(state, &config.server, &config.rate_limit);

    info!("Starting API server on {}", config.server.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(schedule) = schedule {
        schedule.abort();
        let _ = schedule.await;
    }
    info!("Server stopped, draining notification fan-out");
    pool.join().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use storage::{NotificationFilter, Role};
    use tower::ServiceExt;

    fn test_app() -> (Router, Arc<Repository>) {
        let repo = Arc::new(Repository::new());
        let config = ServiceConfig::default();
        let (state, _pool) = AppState::new(repo.clone(), &config);
        let router = create_router(Arc::new(state), &config.server, &config.rate_limit);
        (router, repo)
    }

    fn request(
        method: Method,
        uri: &str,
        actor: Option<(i64, &str)>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((user_id, role)) = actor {
            builder = builder
                .header(USER_ID_HEADER, user_id.to_string())
                .header(USER_ROLE_HEADER, role);
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    const ADMIN: Option<(i64, &str)> = Some((1, "admin"));
    const COMMUNITY: Option<(i64, &str)> = Some((9, "community_member"));

    fn critical_alert() -> Value {
        json!({
            "title": "Oil sheen",
            "message": "Sheen reported at the north outfall",
            "category": "critical",
            "severity": "high",
            "wetland_id": 2
        })
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = test_app();
        let (status, body) = send(&app, request(Method::GET, "/api/v1/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"]["database"]["count"], 0);
    }

    #[tokio::test]
    async fn test_missing_actor_is_unauthenticated() {
        let (app, _) = test_app();
        let (status, body) = send(&app, request(Method::GET, "/api/v1/alerts", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthenticated");

        let unknown_role = request(Method::GET, "/api/v1/alerts", Some((1, "superuser")), None);
        let (status, _) = send(&app, unknown_role).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_community_member_cannot_create() {
        let (app, _) = test_app();
        let req = request(Method::POST, "/api/v1/alerts", COMMUNITY, Some(critical_alert()));
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "forbidden");
    }

    #[tokio::test]
    async fn test_create_and_visibility() {
        let (app, _) = test_app();
        let req = request(Method::POST, "/api/v1/alerts", ADMIN, Some(critical_alert()));
        let (status, alert) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(alert["category"], "critical");
        assert_eq!(alert["active"], true);
        let id = alert["id"].as_i64().unwrap();

        let uri = format!("/api/v1/alerts/{}", id);
        let (status, body) = send(&app, request(Method::GET, &uri, COMMUNITY, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");

        let (status, _) = send(&app, request(Method::GET, &uri, ADMIN, None)).await;
        assert_eq!(status, StatusCode::OK);

        let req = request(Method::GET, "/api/v1/alerts", COMMUNITY, None);
        let (status, list) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (app, _) = test_app();
        let mut bad = critical_alert();
        bad["category"] = json!("emergency");
        let req = request(Method::POST, "/api/v1/alerts", ADMIN, Some(bad));
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "validation_error");

        let (status, body) = send(
            &app,
            request(Method::GET, "/api/v1/alerts?severity=extreme", ADMIN, None),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "validation_error");
    }

    #[tokio::test]
    async fn test_acknowledge_and_resolve() {
        let (app, _) = test_app();
        let req = request(Method::PUT, "/api/v1/alerts/77/acknowledge", ADMIN, None);
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let req = request(Method::POST, "/api/v1/alerts", ADMIN, Some(critical_alert()));
        let (_, alert) = send(&app, req).await;
        let id = alert["id"].as_i64().unwrap();

        let uri = format!("/api/v1/alerts/{}/acknowledge", id);
        let (status, _) = send(&app, request(Method::PUT, &uri, COMMUNITY, None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, acked) = send(&app, request(Method::PUT, &uri, ADMIN, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(acked["acknowledged_by"], 1);

        let uri = format!("/api/v1/alerts/{}/resolve", id);
        let (status, resolved) = send(&app, request(Method::PUT, &uri, ADMIN, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resolved["active"], false);
        assert!(resolved["resolved_at"].is_string());
    }

    #[tokio::test]
    async fn test_telemetry_then_threshold_check() {
        let (app, repo) = test_app();
        for temperature in [36.0, 37.0] {
            let reading = json!({
                "wetland_id": 1,
                "timestamp": chrono::Utc::now(),
                "temperature": temperature
            });
            let req = request(Method::POST, "/api/v1/telemetry", None, Some(reading));
            let (status, report) = send(&app, req).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(report["anomalies"][0], "High Temperature");
        }

        let (status, body) = send(
            &app,
            request(Method::POST, "/api/v1/alerts/check-thresholds", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["created"], 1);
        assert_eq!(body["suppressed"], 1);
        assert_eq!(body["message"], "Checked thresholds, created 1 alerts");
        assert_eq!(repo.reading_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_notifications_are_private() {
        let (app, repo) = test_app();
        repo.upsert_user(2, Role::Researcher).await.unwrap();
        send(&app, request(Method::POST, "/api/v1/alerts", ADMIN, Some(critical_alert()))).await;

        // Fan-out runs in the background
        let mut mine = Vec::new();
        for _ in 0..100 {
            mine = repo.list_notifications(2, &NotificationFilter::default()).await.unwrap();
            if !mine.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(mine.len(), 1);

        let uri = format!("/api/v1/notifications/{}/read", mine[0].id);
        let (status, _) = send(&app, request(Method::PUT, &uri, ADMIN, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let req = request(Method::PUT, &uri, Some((2, "researcher")), None);
        let (status, read) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(read["is_read"], true);

        let (status, unread) = send(
            &app,
            request(
                Method::GET,
                "/api/v1/notifications?is_read=false",
                Some((2, "researcher")),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unread.as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn test_sweep_endpoint_is_rate_limited() {
        let (app, _) = test_app();
        let mut statuses = Vec::new();
        for _ in 0..8 {
            let req = request(Method::POST, "/api/v1/alerts/check-thresholds", None, None);
            statuses.push(send(&app, req).await.0);
        }
        assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn test_sensor_fleet_burst_is_stored() {
        let (app, repo) = test_app();
        for wetland_id in 1..=50 {
            let reading = json!({
                "wetland_id": wetland_id,
                "timestamp": chrono::Utc::now(),
                "ph": 7.1
            });
            let req = request(Method::POST, "/api/v1/telemetry", None, Some(reading));
            let (status, _) = send(&app, req).await;
            assert_eq!(status, StatusCode::OK, "reading from wetland {}", wetland_id);
        }
        assert_eq!(repo.reading_count().await.unwrap(), 50);

        // Ingest does not drain the sweep bucket
        let req = request(Method::POST, "/api/v1/alerts/check-thresholds", None, None);
        assert_eq!(send(&app, req).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let (app, _) = test_app();
        let response = app
            .oneshot(request(Method::GET, "/metrics", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
