use crate::domains::distribution::models::AttemptStatus;

/// State changes and provider actions decided by the distribution machines.
///
/// Each command touches only the fields its writer owns, so commands from
/// concurrent invocations can interleave on the same records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionCommand {
    /// Stop a live leg whose caller already left. `answered` legs are hung up
    /// instead of canceled.
    StopLeg {
        call_sid: String,
        leg_sid: String,
        answered: bool,
    },

    MarkAgentAvailable { agent_id: String },

    MirrorAttemptStatus {
        call_sid: String,
        leg_sid: String,
        status: AttemptStatus,
    },

    MarkCallerLeft { call_sid: String },

    /// Cancel every non-terminal attempt of the call, optionally sparing the winning agent
    CancelPendingAttempts {
        call_sid: String,
        except_agent: Option<String>,
    },

    /// Caller entered the holding conference; starts dialing when this is the first report
    MarkCallConnected { call_sid: String },

    ClaimAgentJoined { call_sid: String, agent_id: String },
}
