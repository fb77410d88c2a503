// Round Robin Line - API Core
//
// This crate answers an inbound telephone line, parks each caller in a
// holding conference and rings the account's agents one at a time until
// someone accepts.
//
// Business logic lives in domains/distribution; the server module only
// translates provider webhooks to activity calls.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
