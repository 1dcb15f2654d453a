//! The x402-over-Zcash protocol engine: challenge issuance, authorization
//! decoding, and validation (spec §4.1).

pub mod address;
pub mod challenge;
pub mod signature;
pub mod types;
pub mod validate;

pub use types::{
    Authorization, AuthorizationPayload, ChallengeRecord, PaymentRequirements,
    PaymentRequiredBody, PaymentResponseBody, Scheme, ShieldedAuthorizationPayload,
    TransparentAuthorizationPayload,
};
pub use validate::InvalidReason;
