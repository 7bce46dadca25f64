//! API router

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;

use super::modules::billing::{self, BillingState};
use super::modules::health::{self, HealthState};
use super::modules::metrics::{self, MetricsState};
use super::modules::sessions::{self, SessionsState};
use crate::application::services::{PollingWalletGuard, SessionCommandFacade, StopReasonStore};
use crate::application::SharedSessionRegistry;
use crate::domain::RepositoryProvider;

/// Everything the HTTP surface reads from.
#[derive(Clone)]
pub struct ApiState {
    pub repos: Arc<dyn RepositoryProvider>,
    pub session_registry: SharedSessionRegistry,
    pub facade: Arc<SessionCommandFacade>,
    pub stop_reasons: Arc<StopReasonStore>,
    pub polling_guard: Arc<PollingWalletGuard>,
    pub db: Option<DatabaseConnection>,
    pub prometheus: Option<PrometheusHandle>,
}

/// Create the API router with all routes
pub fn create_api_router(state: ApiState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .with_state(HealthState {
            db: state.db.clone(),
            session_registry: state.session_registry.clone(),
            started_at: Arc::new(Instant::now()),
        });

    let billing_routes = Router::new()
        .route("/evaluate/{id_tag}", post(billing::evaluate))
        .with_state(BillingState {
            guard: state.polling_guard.clone(),
        });

    let session_routes = Router::new()
        .route("/start", post(sessions::start_session))
        .route("/stop", post(sessions::stop_session))
        .with_state(SessionsState {
            facade: state.facade.clone(),
            stop_reasons: state.stop_reasons.clone(),
            repos: state.repos.clone(),
        });

    let mut router = Router::new()
        .merge(health_routes)
        .nest("/api/billing", billing_routes)
        .nest("/api/sessions", session_routes);

    if let Some(handle) = state.prometheus {
        router = router.merge(
            Router::new()
                .route("/metrics", get(metrics::prometheus_metrics))
                .with_state(MetricsState { handle }),
        );
    }

    router
        .layer(middleware::from_fn(metrics::http_metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::testing::{
        FakeReachability, FakeTariffs, FakeWallet, RecordingCommands, RecordingNotifier,
    };
    use crate::application::services::{SessionCostLedger, WalletStopDispatcher, STOP_BY_SERVER};
    use crate::application::SessionRegistry;
    use crate::domain::{ChargingTransaction, ConnectorRef, TransactionRepository};
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::notifications::create_event_bus;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        storage: Arc<InMemoryStorage>,
        commands: Arc<RecordingCommands>,
        stop_reasons: Arc<StopReasonStore>,
    }

    fn harness(reachability: FakeReachability) -> Harness {
        let storage = Arc::new(InMemoryStorage::new());
        let commands = Arc::new(RecordingCommands::default());
        let stop_reasons = Arc::new(StopReasonStore::new());
        let events = create_event_bus();
        let facade = Arc::new(SessionCommandFacade::new(
            commands.clone(),
            Arc::new(reachability),
            Arc::new(RecordingNotifier::default()),
        ));
        let stopper = Arc::new(WalletStopDispatcher::new(
            facade.clone(),
            stop_reasons.clone(),
            events.clone(),
            std::time::Duration::from_secs(60),
        ));
        let guard = Arc::new(PollingWalletGuard::new(
            storage.clone(),
            Arc::new(SessionCostLedger::new(storage.clone())),
            Arc::new(FakeTariffs::default()),
            Arc::new(FakeWallet::new(dec!(100), dec!(8))),
            stopper,
            events,
        ));
        let router = create_api_router(ApiState {
            repos: storage.clone(),
            session_registry: SessionRegistry::shared(),
            facade,
            stop_reasons: stop_reasons.clone(),
            polling_guard: guard,
            db: None,
            prometheus: None,
        });
        Harness {
            router,
            storage,
            commands,
            stop_reasons,
        }
    }

    async fn call(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn health_reports_in_memory_storage() {
        let h = harness(FakeReachability::default());
        let (status, body) = call(h.router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"]["status"], "memory");
    }

    #[tokio::test]
    async fn evaluate_account_without_sessions_is_idle() {
        let h = harness(FakeReachability::default());
        let (status, body) = call(h.router, "POST", "/api/billing/evaluate/TAG-001", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["outcome"], "idle");
    }

    #[tokio::test]
    async fn start_on_unknown_charger_is_refused() {
        let h = harness(FakeReachability::default());
        let (status, body) = call(
            h.router,
            "POST",
            "/api/sessions/start",
            Some(serde_json::json!({"chargeBoxId": "CP404", "idTag": "TAG"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Cannot start charging. Device is not registered.");
        assert!(h.commands.starts().is_empty());
    }

    #[tokio::test]
    async fn operator_stop_is_tagged_as_server_stop() {
        let h = harness(FakeReachability::default());
        h.storage
            .save(ChargingTransaction::new(5, ConnectorRef::new("CP001", 1), "TAG", Utc::now()))
            .await
            .unwrap();

        let (status, _) = call(
            h.router.clone(),
            "POST",
            "/api/sessions/stop",
            Some(serde_json::json!({"transactionId": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(h.commands.stopped_ids(), vec![5]);
        assert_eq!(h.stop_reasons.take(5).as_deref(), Some(STOP_BY_SERVER));

        let (status, _) = call(
            h.router,
            "POST",
            "/api/sessions/stop",
            Some(serde_json::json!({"transactionId": 6})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
