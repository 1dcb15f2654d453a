//! Scheduled sweeps wrapping the lifecycle store and monitor (spec §4.5).
//! Each is a `tokio::time::interval`-driven loop under the shared
//! `CancellationToken`, guarded by a Postgres advisory lock so only one
//! running instance of the service executes a given tick.

pub mod advisory_lock;
pub mod auto_settle;
pub mod expiry;
pub mod reverify;

pub use auto_settle::AutoSettleSweep;
pub use expiry::ExpirySweep;
pub use reverify::ReverifySweep;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Cadences for the three sweeps (spec §4.5); the webhook retry driver's
/// own interval lives with [`crate::webhook::WebhookDispatcher`].
pub struct JobIntervals {
    pub expiry_sweep: Duration,
    pub auto_settle_sweep: Duration,
    pub reverify_sweep: Duration,
}

impl Default for JobIntervals {
    fn default() -> Self {
        Self {
            expiry_sweep: Duration::from_secs(60),
            auto_settle_sweep: Duration::from_secs(5 * 60),
            reverify_sweep: Duration::from_secs(2 * 60),
        }
    }
}

/// Spawns and drives all three sweeps until `cancel` fires.
pub async fn run(
    expiry: Arc<ExpirySweep>,
    auto_settle: Arc<AutoSettleSweep>,
    reverify: Arc<ReverifySweep>,
    intervals: JobIntervals,
    cancel: CancellationToken,
) {
    tokio::join!(
        expiry.run(intervals.expiry_sweep, cancel.clone()),
        auto_settle.run(intervals.auto_settle_sweep, cancel.clone()),
        reverify.run(intervals.reverify_sweep, cancel),
    );
}
