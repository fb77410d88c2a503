//! Distribution domain - round-robin delivery of inbound calls to agents
//!
//! Architecture:
//!   webhook → activity → machine decides → commands applied to store/provider
//!
//! The caller's conference join spawns one dialing task per call; every
//! other webhook is a short request/response exchange.

pub mod activities;
pub mod commands;
pub mod events;
pub mod machines;
pub mod models;
pub mod types;
pub mod urls;

// Re-export commonly used types
pub use commands::DistributionCommand;
pub use events::{ConferenceEvent, ConferenceEventKind, LegStatusEvent};
pub use types::{DistributionError, DistributionOutcome};
pub use urls::WebhookUrls;
