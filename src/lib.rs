//! Core of a Zcash HTTP 402 payment facilitator.
//!
//! A merchant protects a resource; a client receives a 402 challenge; this
//! facilitator issues a signed payment requirement, observes the Zcash
//! blockchain to detect a matching broadcast transaction, tracks
//! confirmations, settles the payment, and notifies the merchant via signed
//! webhooks.
//!
//! # Modules
//!
//! - [`protocol`] — issue/decode/validate 402 challenges and payment
//!   authorizations; transparent-address signature verification.
//! - [`chain`] — the Zcash node JSON-RPC client the monitor depends on.
//! - [`monitor`] — block scan, mempool scan, and reorg-handling loops.
//! - [`store`] — the durable payment-intent / transaction-record lifecycle
//!   store and its state machine.
//! - [`webhook`] — signed, retried webhook delivery.
//! - [`jobs`] — scheduled sweeps (expiry, auto-settle, re-verification).
//! - [`http`] — the facilitator-standard HTTP surface.
//! - [`config`], [`error`], [`money`], [`timestamp`] — ambient support types.

pub mod chain;
pub mod config;
pub mod error;
pub mod http;
pub mod jobs;
pub mod money;
pub mod monitor;
pub mod protocol;
pub mod sig_down;
pub mod store;
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod timestamp;
pub mod webhook;

pub use error::FacilitatorError;
