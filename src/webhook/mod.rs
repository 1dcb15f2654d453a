//! Signed, retried webhook delivery to merchant endpoints (spec §4.4).

pub mod dispatcher;
pub mod models;
pub mod signer;
pub mod store;

pub use dispatcher::WebhookDispatcher;
pub use models::{DeliveryState, WebhookDelivery};
pub use store::WebhookStore;
