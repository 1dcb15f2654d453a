//! The facilitator-standard HTTP surface (spec §6).

pub mod handlers;
pub mod state;

pub use handlers::routes;
pub use state::AppState;
