//! Billing engine runtime.
//!
//! Provides [`ServerHandle`] that encapsulates the full server lifecycle:
//! storage, migrations, OCPP WebSocket endpoint, wallet guards, scheduler,
//! REST API, metrics, and graceful shutdown.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::commands::{create_command_sender, OcppCommandGateway, SharedCommandSender};
use crate::application::handlers::OcppServices;
use crate::application::ports::{
    ChargePointCommandPort, ReachabilityPort, ScheduleProvider, UserNotifier,
};
use crate::application::services::{
    poll_interval, LastEnergyCache, PollingGuardConfig, PollingWalletGuard, ScheduleRunner,
    ScheduledChargingService, SessionCommandFacade, SessionCostLedger, SessionLifecycle,
    StopReasonStore, StreamingWalletGuard, TelemetryIngress, WalletGuardRunner,
    WalletStopDispatcher,
};
use crate::application::session::{SessionRegistry, SharedSessionRegistry};
use crate::config::AppConfig;
use crate::domain::RepositoryProvider;
use crate::infrastructure::{
    init_database, DatabaseConfig, InMemoryStorage, SeaOrmRepositoryProvider,
    StaticScheduleProvider, StaticTariffProvider, StaticWalletProvider,
};
use crate::interfaces::{create_api_router, ApiState, OcppServer};
use crate::notifications::{create_event_bus, SharedEventBus};
use crate::shared::{ComputeOnceCache, ShutdownCoordinator, ShutdownSignal};

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the billing engine.
pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running billing engine.
///
/// ```rust,no_run
/// use texnouz_billing::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    pub event_bus: SharedEventBus,
    pub repos: Arc<dyn RepositoryProvider>,
    pub session_registry: SharedSessionRegistry,
    pub command_sender: SharedCommandSender,
    pub polling_guard: Arc<PollingWalletGuard>,
    /// Wallet table backing both guards; balances can be adjusted live
    pub wallets: Arc<StaticWalletProvider>,
    pub schedules: Arc<StaticScheduleProvider>,
    pub config: AppConfig,

    db: Option<DatabaseConnection>,
    shutdown: ShutdownCoordinator,
    ws_task: JoinHandle<()>,
    api_task: JoinHandle<()>,
    background: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Start the billing engine with the given options.
    ///
    /// 1. Install the Prometheus recorder
    /// 2. Open storage (SQLite with migrations, or in-memory)
    /// 3. Wire guards, lifecycle, telemetry, and scheduler
    /// 4. Start the OCPP WebSocket endpoint and the REST API
    /// 5. Start the polling wallet guard and schedule runners
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let app_cfg = opts.config;
        app_cfg.validate()?;

        info!("Starting Texnouz billing engine...");
        let prometheus = prometheus_handle();

        // ── Storage ────────────────────────────────────────────
        let (repos, db): (Arc<dyn RepositoryProvider>, Option<DatabaseConnection>) =
            if app_cfg.database.in_memory {
                warn!("Using in-memory storage; billing state is lost on restart");
                (Arc::new(InMemoryStorage::new()), None)
            } else {
                let db = init_database(&DatabaseConfig {
                    url: app_cfg.database.url.clone(),
                    run_migrations: opts.auto_migrate,
                })
                .await?;
                (Arc::new(SeaOrmRepositoryProvider::new(db.clone())), Some(db))
            };

        // ── Event bus, sessions, commands ──────────────────────
        let event_bus = create_event_bus();
        let session_registry = SessionRegistry::shared();
        let command_sender = create_command_sender(
            session_registry.clone(),
            app_cfg.commands.response_timeout(),
        );

        let commands: Arc<dyn ChargePointCommandPort> =
            Arc::new(OcppCommandGateway::new(command_sender.clone()));
        let reachability: Arc<dyn ReachabilityPort> = session_registry.clone();
        let notifier: Arc<dyn UserNotifier> = event_bus.clone();
        let facade = Arc::new(SessionCommandFacade::new(
            commands,
            reachability.clone(),
            notifier.clone(),
        ));

        // ── Providers ──────────────────────────────────────────
        let billing = &app_cfg.billing;
        let providers = &app_cfg.providers;
        let tariffs = Arc::new(
            StaticTariffProvider::new(providers.tariffs.clone())
                .with_fallback(providers.default_tariff.clone()),
        );
        let wallets = Arc::new(StaticWalletProvider::new(providers.wallet_snapshots()));
        let schedules = Arc::new(StaticScheduleProvider::new(providers.schedules.clone()));
        info!(
            "Providers: {} wallets, {} tariff tables, {} schedules",
            providers.wallets.len(),
            providers.tariffs.len(),
            providers.schedules.len()
        );

        // ── Billing services ───────────────────────────────────
        let stop_reasons = Arc::new(StopReasonStore::with_ttl(billing.stop_reason_ttl()));
        let last_energy: Arc<LastEnergyCache> =
            Arc::new(ComputeOnceCache::with_ttl(billing.energy_cache_ttl()));
        let stopper = Arc::new(WalletStopDispatcher::new(
            facade.clone(),
            stop_reasons.clone(),
            event_bus.clone(),
            billing.stop_cooldown(),
        ));
        let ledger = Arc::new(SessionCostLedger::new(repos.clone()));

        let polling_guard = Arc::new(
            PollingWalletGuard::new(
                repos.clone(),
                ledger.clone(),
                tariffs,
                wallets.clone(),
                stopper.clone(),
                event_bus.clone(),
            )
            .with_config(PollingGuardConfig {
                floor_threshold: billing.floor_threshold,
                clock: billing.clock(),
            }),
        );
        let streaming_guard = Arc::new(
            StreamingWalletGuard::new(
                repos.clone(),
                wallets.clone(),
                stopper.clone(),
                last_energy.clone(),
            )
            .with_tax_percent(billing.flat_tax_percent),
        );
        let lifecycle = Arc::new(
            SessionLifecycle::new(
                repos.clone(),
                ledger,
                stop_reasons.clone(),
                last_energy.clone(),
                stopper,
                event_bus.clone(),
            )
            .with_polling_guard(polling_guard.clone()),
        );
        let telemetry = Arc::new(TelemetryIngress::new(
            repos.clone(),
            streaming_guard,
            event_bus.clone(),
        ));
        let scheduler = Arc::new(
            ScheduledChargingService::new(
                repos.clone(),
                facade.clone(),
                reachability,
                notifier,
                stop_reasons.clone(),
                billing.clock(),
            )
            .with_tolerance(chrono::Duration::seconds(billing.schedule_tolerance_secs)),
        );

        // ── Shutdown coordinator ───────────────────────────────
        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        // ── Background tasks ───────────────────────────────────
        let schedule_provider: Arc<dyn ScheduleProvider> = schedules.clone();
        let background = vec![
            WalletGuardRunner::new(
                polling_guard.clone(),
                stop_reasons.clone(),
                last_energy,
                poll_interval(billing.poll_interval_secs),
            )
            .start(shutdown_signal.clone()),
            ScheduleRunner::new(
                scheduler,
                schedule_provider,
                Duration::from_secs(billing.schedule_interval_secs.max(1)),
            )
            .start(shutdown_signal.clone()),
        ];

        // ── OCPP WebSocket server ──────────────────────────────
        let services = OcppServices {
            registry: session_registry.clone(),
            lifecycle,
            telemetry,
            command_sender: command_sender.clone(),
            event_bus: event_bus.clone(),
            heartbeat_interval_secs: app_cfg.server.heartbeat_interval,
        };
        let ws_server = OcppServer::new(app_cfg.server.ws_address(), services)
            .with_shutdown(shutdown_signal.clone());

        // ── REST API server ────────────────────────────────────
        let api_router = create_api_router(ApiState {
            repos: repos.clone(),
            session_registry: session_registry.clone(),
            facade,
            stop_reasons,
            polling_guard: polling_guard.clone(),
            db: db.clone(),
            prometheus,
        });

        let api_addr = app_cfg.server.api_address();
        let listener = tokio::net::TcpListener::bind(&api_addr).await?;
        info!("REST API server listening on http://{}", api_addr);

        let api_shutdown = shutdown_signal.clone();
        let api_server = axum::serve(listener, api_router).with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("🛑 REST API server received shutdown signal");
        });

        // ── Spawn server tasks ─────────────────────────────────
        let ws_task = tokio::spawn(async move {
            if let Err(e) = ws_server.run().await {
                error!("WebSocket server error: {}", e);
            }
        });
        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        info!("🚀 All servers started.");

        Ok(Self {
            event_bus,
            repos,
            session_registry,
            command_sender,
            polling_guard,
            wallets,
            schedules,
            config: app_cfg,
            db,
            shutdown,
            ws_task,
            api_task,
            background,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown (non-blocking).
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the server to fully stop after shutdown has been triggered.
    pub async fn wait(self) {
        info!("⏳ Waiting for server tasks to complete...");
        let timeout = Duration::from_secs(self.shutdown.timeout_secs());

        let servers = async {
            if let Err(e) = self.ws_task.await {
                error!("WebSocket server task panicked: {}", e);
            }
            if let Err(e) = self.api_task.await {
                error!("REST API server task panicked: {}", e);
            }
            for task in self.background {
                if let Err(e) = task.await {
                    error!("Background task panicked: {}", e);
                }
            }
        };
        if tokio::time::timeout(timeout, servers).await.is_err() {
            warn!("Shutdown timed out after {}s", timeout.as_secs());
        }

        if let Some(db) = self.db {
            match db.close().await {
                Ok(()) => info!("✅ Database connection closed"),
                Err(e) => warn!("Error closing database connection: {}", e),
            }
        }

        info!("👋 Texnouz billing engine shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down billing engine...");
        self.trigger_shutdown();
        self.wait().await;
    }

    /// Check if the server is still running.
    pub fn is_running(&self) -> bool {
        !self.ws_task.is_finished() || !self.api_task.is_finished()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// The global recorder can only be installed once per process; restarts
/// within the same process reuse it.
fn prometheus_handle() -> Option<PrometheusHandle> {
    static PROM_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();
    PROM_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("📊 Prometheus metrics recorder installed");
                Some(handle)
            }
            Err(e) => {
                warn!("Prometheus recorder unavailable, /metrics disabled: {}", e);
                None
            }
        })
        .clone()
}

/// Initialize tracing (logging) from the application config.
///
/// Call this once at process startup (before [`ServerHandle::start`]).
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
