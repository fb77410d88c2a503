//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod poll;
pub mod postgres_store;
pub mod test_dependencies;
pub mod traits;

pub use deps::{ActiveCallGuard, ActiveCalls, ServerDeps, TwilioAdapter};
pub use poll::{poll_until, PollOutcome, PollSchedule};
pub use postgres_store::PostgresCallStore;
pub use test_dependencies::{
    fast_settings, InMemoryCallStore, MockTelephonyClient, TestDependencies,
};
pub use traits::*;
