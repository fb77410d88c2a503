pub mod account;
pub mod agent;
pub mod call;
pub mod outbound;

pub use account::Account;
pub use agent::{Agent, Availability};
pub use call::{Call, CallStatus, ROOM_PREFIX};
pub use outbound::{AttemptStatus, OutboundAttempt};

/// A status string read from storage that no variant matches
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);
