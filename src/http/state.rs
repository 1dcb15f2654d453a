//! Shared application state threaded through the facilitator-standard HTTP
//! handlers via `axum::extract::State`.

use std::sync::Arc;

use crate::config::ZcashNetwork;
use crate::monitor::BlockScanner;
use crate::store::{PaymentStore, TxStore};

#[derive(Clone)]
pub struct AppState {
    pub payments: PaymentStore,
    pub transactions: TxStore,
    pub network: ZcashNetwork,
    pub signing_secret: String,
    pub scanner: Arc<BlockScanner>,
}
