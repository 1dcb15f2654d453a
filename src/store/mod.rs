//! The durable lifecycle store: PaymentIntent/TxRecord persistence, the
//! state-machine CAS, and the monitor cursor (spec §3, §4.3).

pub mod cursor_store;
pub mod models;
pub mod payments;
pub mod transactions;

pub use cursor_store::CursorStore;
pub use models::{is_valid_transition, MonitorCursor, PaymentIntent, PaymentState, TxRecord, TxStatus};
pub use payments::{PaymentStore, TransitionPatch, WebhookEventType};
pub use transactions::TxStore;
