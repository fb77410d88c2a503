// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Distribution decisions live in domains/distribution and only reach the
// outside world through these seams.
//
// Naming convention: Base* for trait names (e.g., BaseCallStore)

use anyhow::Result;
use async_trait::async_trait;
use twilio::VoiceResponse;

use crate::domains::distribution::models::{
    Account, Agent, AttemptStatus, Availability, Call, CallStatus, OutboundAttempt,
};

// =============================================================================
// Call Record Store Trait (Infrastructure - single source of truth)
// =============================================================================

/// Durable, account-scoped records for calls, their outbound attempts and agents.
///
/// Every invocation coordinates only through this store. Conditional writes
/// (`create_call_if_absent`, `advance_*`, `claim_agent_joined`) report whether
/// they took effect so callers can act exactly once.
#[async_trait]
pub trait BaseCallStore: Send + Sync {
    async fn find_account(&self, account_id: &str) -> Result<Option<Account>>;

    /// Account whose inbound line is `number`
    async fn find_account_by_number(&self, number: &str) -> Result<Option<Account>>;

    /// Roster ordered by priority
    async fn list_agents(&self, account_id: &str) -> Result<Vec<Agent>>;

    async fn find_agent(&self, account_id: &str, agent_id: &str) -> Result<Option<Agent>>;

    /// Returns false when the agent does not exist
    async fn set_agent_availability(
        &self,
        account_id: &str,
        agent_id: &str,
        availability: Availability,
    ) -> Result<bool>;

    /// Create the call record unless one exists. Returns true if created.
    async fn create_call_if_absent(
        &self,
        account_id: &str,
        call_sid: &str,
        status: CallStatus,
    ) -> Result<bool>;

    async fn find_call(&self, account_id: &str, call_sid: &str) -> Result<Option<Call>>;

    /// Apply `next` if the call exists and the transition is allowed
    async fn advance_call_status(
        &self,
        account_id: &str,
        call_sid: &str,
        next: CallStatus,
    ) -> Result<bool>;

    /// Set "an agent has joined" unless already set. Returns true for the winner only.
    async fn claim_agent_joined(
        &self,
        account_id: &str,
        call_sid: &str,
        agent_id: &str,
    ) -> Result<bool>;

    async fn record_attempt(&self, attempt: &OutboundAttempt) -> Result<()>;

    async fn find_attempt(
        &self,
        account_id: &str,
        call_sid: &str,
        leg_sid: &str,
    ) -> Result<Option<OutboundAttempt>>;

    /// Attempts of a call in the order they were placed
    async fn list_attempts(&self, account_id: &str, call_sid: &str)
        -> Result<Vec<OutboundAttempt>>;

    /// Apply `next` if the attempt exists and the transition is allowed
    async fn advance_attempt_status(
        &self,
        account_id: &str,
        call_sid: &str,
        leg_sid: &str,
        next: AttemptStatus,
    ) -> Result<bool>;

    /// Cheap round trip for health checks
    async fn ping(&self) -> Result<()>;
}

// =============================================================================
// Telephony Control Trait (Infrastructure - outbound call control)
// =============================================================================

/// Everything needed to place one outbound leg
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialRequest {
    pub to: String,
    pub from: String,
    /// Fetched when the callee answers; returns the voice document for the leg
    pub answer_url: String,
    pub status_callback_url: String,
    pub events: Vec<String>,
}

#[async_trait]
pub trait BaseTelephonyClient: Send + Sync {
    /// Place an outbound call. Returns the provider's leg id.
    async fn dial(&self, request: DialRequest) -> Result<String>;

    /// Stop a leg that is queued or ringing
    async fn cancel_leg(&self, leg_sid: &str) -> Result<()>;

    /// End a leg that has been answered
    async fn hangup_leg(&self, leg_sid: &str) -> Result<()>;

    /// Replace what a live leg is doing with a new voice document
    async fn push_voice_document(&self, leg_sid: &str, document: &VoiceResponse) -> Result<()>;
}
