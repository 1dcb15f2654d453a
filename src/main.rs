//! Zcash x402 facilitator entrypoint.
//!
//! Wires together the lifecycle store, the Zcash node RPC client, the
//! blockchain monitor's scan/mempool/reorg loops, the webhook dispatcher,
//! the scheduled sweeps, and the facilitator-standard HTTP surface, all
//! under one shared shutdown signal.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `HOST`, `PORT`, `NETWORK`, `NODE_RPC_*`, `DATABASE_URL`,
//!   `FACILITATOR_SIGNING_SECRET` configure the service (see [`config`])
//! - `OTEL_EXPORTER_OTLP_*` enables OpenTelemetry export when built with
//!   the `telemetry` feature

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::Method;
use dotenvy::dotenv;
use tower_http::cors;
use tower_http::trace::TraceLayer;

use zcash_x402_facilitator::chain::NodeRpcClient;
use zcash_x402_facilitator::config::Config;
use zcash_x402_facilitator::http::{self, AppState};
use zcash_x402_facilitator::jobs::{self, AutoSettleSweep, ExpirySweep, JobIntervals, ReverifySweep};
use zcash_x402_facilitator::monitor::{self, BlockScanner, MonitorConfig, ScanConfig};
use zcash_x402_facilitator::sig_down::SigDown;
use zcash_x402_facilitator::store::{CursorStore, PaymentStore, TxStore};
use zcash_x402_facilitator::webhook::WebhookDispatcher;

#[cfg(feature = "telemetry")]
fn init_telemetry() -> Option<zcash_x402_facilitator::telemetry::Telemetry> {
    Some(zcash_x402_facilitator::telemetry::Telemetry::new())
}

#[cfg(not(feature = "telemetry"))]
fn init_telemetry() -> Option<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    None
}

const WEBHOOK_DISPATCH_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let _telemetry = init_telemetry();

    let config = Config::load()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .connect(config.database_url())
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let rpc: Arc<dyn zcash_x402_facilitator::chain::ZcashRpcClient> = Arc::new(NodeRpcClient::new(
        config.node_rpc_url(),
        config.node_rpc_user(),
        config.node_rpc_password(),
    )?);

    let payments = PaymentStore::new(pool.clone());
    let transactions = TxStore::new(pool.clone());
    let cursor_store = CursorStore::new(pool.clone());
    let (events_tx, _events_rx) = monitor::channel();

    let sig_down = SigDown::try_new()?;
    let cancel = sig_down.cancellation_token();

    let scanner = Arc::new(BlockScanner::new(
        rpc.clone(),
        payments.clone(),
        transactions.clone(),
        events_tx.clone(),
        ScanConfig {
            max_blocks_per_scan: config.max_blocks_per_scan(),
            required_confirmations: config.required_confirmations(),
        },
    ));

    let monitor_config = MonitorConfig {
        block_scan_interval: Duration::from_secs(config.scan_interval_seconds()),
        mempool_scan_interval: Duration::from_secs(config.mempool_interval_seconds()),
        reorg_safety_depth: config.reorg_safety_depth() as i32,
    };
    let monitor_task = tokio::spawn(monitor::run(
        rpc.clone(),
        payments.clone(),
        transactions.clone(),
        cursor_store,
        events_tx.clone(),
        scanner.clone(),
        monitor_config,
        cancel.clone(),
    ));

    let webhook_store = zcash_x402_facilitator::webhook::WebhookStore::new(pool.clone());
    let dispatcher = Arc::new(WebhookDispatcher::new(
        webhook_store,
        config.webhook_backoff_schedule_seconds().to_vec(),
    ));
    let dispatcher_task = tokio::spawn(dispatcher.run(WEBHOOK_DISPATCH_INTERVAL, cancel.clone()));

    let expiry = Arc::new(ExpirySweep::new(pool.clone(), payments.clone()));
    let auto_settle = Arc::new(AutoSettleSweep::new(
        pool.clone(),
        rpc.clone(),
        payments.clone(),
        transactions.clone(),
        config.required_confirmations(),
    ));
    let reverify = Arc::new(ReverifySweep::new(
        pool.clone(),
        rpc.clone(),
        payments.clone(),
        transactions.clone(),
        Duration::from_secs(config.scan_interval_seconds()),
    ));
    let jobs_task = tokio::spawn(jobs::run(
        expiry,
        auto_settle,
        reverify,
        JobIntervals::default(),
        cancel.clone(),
    ));

    let app_state = AppState {
        payments,
        transactions,
        network: config.network(),
        signing_secret: config.facilitator_signing_secret().to_string(),
        scanner,
    };
    let http_router = Router::new().merge(http::routes(app_state)).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
    );
    let http_router = Router::new()
        .merge(http_router)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::new(config.host(), config.port());
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|e| {
        tracing::error!("failed to bind to {addr}: {e}");
        std::process::exit(1);
    });
    tracing::info!("facilitator listening on http://{addr}");

    let shutdown_cancel = cancel.clone();
    axum::serve(listener, http_router)
        .with_graceful_shutdown(async move { shutdown_cancel.cancelled().await })
        .await?;

    monitor_task.abort();
    dispatcher_task.abort();
    jobs_task.abort();

    Ok(())
}
