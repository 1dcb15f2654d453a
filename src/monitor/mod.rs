//! The blockchain monitor: watches the configured Zcash node for payments
//! matching open [`crate::store::PaymentIntent`]s (spec §4.2).

pub mod cursor;
pub mod events;
pub mod matcher;
pub mod mempool;
pub mod reorg;
pub mod scan;

pub use cursor::Cursor;
pub use events::{channel, MonitorEvent};
pub use mempool::MempoolScanner;
pub use reorg::ReorgHandler;
pub use scan::{BlockScanner, ScanConfig};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::chain::ZcashRpcClient;
use crate::error::TransientError;
use crate::store::{CursorStore, PaymentStore, TxStore};

/// Tuning knobs for the monitor's three independent loops (spec §4.2,
/// `MonitorConfig`).
pub struct MonitorConfig {
    pub block_scan_interval: Duration,
    pub mempool_scan_interval: Duration,
    pub reorg_safety_depth: i32,
}

/// Wires the block scanner, mempool scanner, and reorg handler together and
/// drives all three until `cancel` fires. The block scanner runs the reorg
/// check after every tick that observes a new tip.
///
/// `scanner` is constructed by the caller (rather than here) so its
/// `scan_payment_intent` force-scan operation can also be shared with the
/// HTTP surface, against the same in-flight state.
pub async fn run(
    rpc: Arc<dyn ZcashRpcClient>,
    payments: PaymentStore,
    transactions: TxStore,
    cursor_store: CursorStore,
    events: broadcast::Sender<MonitorEvent>,
    scanner: Arc<BlockScanner>,
    config: MonitorConfig,
    cancel: CancellationToken,
) -> Result<(), TransientError> {
    let cursor = Cursor::recover(cursor_store, rpc.as_ref()).await?;

    let reorg_handler = Arc::new(ReorgHandler::new(
        rpc.clone(),
        payments.clone(),
        transactions.clone(),
        events.clone(),
        config.reorg_safety_depth,
    ));

    let mempool_scanner = Arc::new(MempoolScanner::new(rpc.clone(), payments, transactions, events));

    let block_task = tokio::spawn(run_block_loop(
        scanner,
        reorg_handler,
        rpc,
        cursor,
        config.block_scan_interval,
        cancel.clone(),
    ));
    let mempool_task = mempool_scanner.run(config.mempool_scan_interval, cancel.clone());

    tokio::join!(async { let _ = block_task.await; }, mempool_task);
    Ok(())
}

/// The block-scan loop, with the reorg check interleaved after each tick
/// that observes a new chain tip (spec §4.2: "run the reorg check whenever
/// the tip height changes, before trusting newly-scanned heights").
async fn run_block_loop(
    scanner: Arc<BlockScanner>,
    reorg_handler: Arc<ReorgHandler>,
    rpc: Arc<dyn ZcashRpcClient>,
    mut cursor: Cursor,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("monitor shutting down");
                return;
            }
            _ = ticker.tick() => {
                match rpc.get_block_count().await {
                    Ok(tip) => {
                        if let Err(error) = reorg_handler.check(tip as i32, &mut cursor).await {
                            tracing::warn!(%error, "reorg check failed");
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, "failed to fetch tip height for reorg check");
                    }
                }
                if let Err(error) = scanner.scan_once_external(&mut cursor).await {
                    tracing::warn!(%error, "block scan tick failed, will retry next interval");
                }
            }
        }
    }
}
