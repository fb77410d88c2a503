//! Distribution activities - business logic behind every webhook
//!
//! Activities read records, ask the machines what to do, and apply the
//! resulting commands. Routes only translate HTTP to and from these calls.

mod accept_call;
mod admit_caller;
mod apply_commands;
mod cancel_attempts;
mod distribute;
mod greet_caller;
mod ingest_events;

pub use accept_call::{confirm_agent, prompt_agent, AgentConfirmation, AgentPrompt};
pub use admit_caller::admit_caller;
pub use apply_commands::{apply_command, apply_commands};
pub use cancel_attempts::{
    cancel_pending_attempts, cancel_unanswered_attempts, end_agent_attempts, stop_leg,
};
pub use distribute::{
    distribute_call, handle_call, run_distribution, start_distribution_task, AGENT_LEG_EVENTS,
    NO_AGENT_APOLOGY,
};
pub use greet_caller::greet_caller;
pub use ingest_events::{ingest_conference_event, ingest_leg_status};
