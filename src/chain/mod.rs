//! Zcash node JSON-RPC client (spec §4.2 "Node access").

pub mod rpc;
pub mod types;

pub use rpc::{NodeRpcClient, ZcashRpcClient};
