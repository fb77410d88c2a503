use serde::Serialize;

/// How a distribution run ended. Every variant is a normal termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionOutcome {
    /// Admission window elapsed before the caller reached the holding conference
    CallerDidNotJoin,
    CallerEnded,
    AgentJoined,
    /// All rounds exhausted; the caller was sent the apology message
    NoAgentAvailable,
    /// The process is shutting down; waits were interrupted
    Interrupted,
}

impl DistributionOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            DistributionOutcome::CallerDidNotJoin => "Caller did not join",
            DistributionOutcome::CallerEnded => "Caller ended",
            DistributionOutcome::AgentJoined => "Agent joined",
            DistributionOutcome::NoAgentAvailable => "No agents connected",
            DistributionOutcome::Interrupted => "Distribution interrupted",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error("no account found for number {0}")]
    AccountNotFoundForNumber(String),

    #[error("call {0} is already being distributed")]
    AlreadyRunning(String),

    #[error("account {0} has no agents")]
    EmptyRoster(String),

    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error("call {0} not found")]
    CallNotFound(String),

    #[error("agent {0} not found")]
    AgentNotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
