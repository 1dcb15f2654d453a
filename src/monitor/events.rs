//! The monitor's in-process event stream (spec §4.2 "Events").

use tokio::sync::broadcast;
use uuid::Uuid;

/// Events the monitor publishes as it observes the chain. Consumers
/// subscribe via a buffered broadcast channel (spec §4.2, §5 "Backpressure").
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    PaymentDetected { payment_intent_id: Uuid, txid: String },
    PaymentConfirmed { payment_intent_id: Uuid, confirmations: i32 },
    TransactionLost { payment_intent_id: Uuid, txid: String },
    ReorgHandled { new_tip: i32 },
    Error { message: String },
}

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Creates the broadcast sender/receiver pair the monitor loops publish on
/// and other components (observability, the webhook engine) subscribe to.
pub fn channel() -> (broadcast::Sender<MonitorEvent>, broadcast::Receiver<MonitorEvent>) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}
