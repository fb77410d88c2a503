//! Test fixtures: one account on the line with a three-agent roster.

use roundrobin_core::domains::distribution::models::AttemptStatus;
use roundrobin_core::kernel::{BaseCallStore, InMemoryCallStore};

pub const ACCOUNT_ID: &str = "acct-1";
pub const LINE_NUMBER: &str = "+15550000000";
pub const CALLER_SID: &str = "CA-caller";

pub const AGENT_1: &str = "agent-1";
pub const AGENT_2: &str = "agent-2";
pub const AGENT_3: &str = "agent-3";
pub const AGENT_1_PHONE: &str = "+15550001111";
pub const AGENT_2_PHONE: &str = "+15550002222";
pub const AGENT_3_PHONE: &str = "+15550003333";

/// Account with three agents in priority order 1, 2, 3
pub fn three_agent_store(max_retries: Option<i32>) -> InMemoryCallStore {
    InMemoryCallStore::new()
        .with_account(ACCOUNT_ID, LINE_NUMBER, max_retries)
        .with_agent(ACCOUNT_ID, AGENT_1, AGENT_1_PHONE, 1)
        .with_agent(ACCOUNT_ID, AGENT_2, AGENT_2_PHONE, 2)
        .with_agent(ACCOUNT_ID, AGENT_3, AGENT_3_PHONE, 3)
}

pub fn single_agent_store() -> InMemoryCallStore {
    InMemoryCallStore::new()
        .with_account(ACCOUNT_ID, LINE_NUMBER, Some(1))
        .with_agent(ACCOUNT_ID, AGENT_1, AGENT_1_PHONE, 1)
}

pub fn empty_roster_store() -> InMemoryCallStore {
    InMemoryCallStore::new().with_account(ACCOUNT_ID, LINE_NUMBER, Some(1))
}

/// Record an agent leg for the caller and move it to `status`
pub async fn seed_attempt(
    store: &InMemoryCallStore,
    leg_sid: &str,
    agent_id: &str,
    status: AttemptStatus,
) {
    use roundrobin_core::domains::distribution::models::OutboundAttempt;

    store
        .record_attempt(&OutboundAttempt::initiated(
            ACCOUNT_ID, CALLER_SID, leg_sid, "+15559999999", agent_id,
        ))
        .await
        .expect("Failed to record attempt");
    if status != AttemptStatus::Initiated {
        store
            .advance_attempt_status(ACCOUNT_ID, CALLER_SID, leg_sid, status)
            .await
            .expect("Failed to advance attempt");
    }
}
