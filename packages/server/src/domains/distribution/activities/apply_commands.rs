//! Executing the commands returned by the distribution machines

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use super::cancel_attempts::{cancel_pending_attempts, end_agent_attempts, stop_leg};
use super::distribute::start_distribution_task;
use crate::domains::distribution::commands::DistributionCommand;
use crate::domains::distribution::models::{Availability, CallStatus};
use crate::kernel::ServerDeps;

/// Apply every command in order. A failing command is logged and does not
/// stop the ones after it.
pub async fn apply_commands(
    account_id: &str,
    commands: &[DistributionCommand],
    deps: &Arc<ServerDeps>,
) {
    for command in commands {
        if let Err(e) = apply_command(account_id, command, deps).await {
            warn!(account_id, command = ?command, error = %e, "Failed to apply command");
        }
    }
}

pub async fn apply_command(
    account_id: &str,
    command: &DistributionCommand,
    deps: &Arc<ServerDeps>,
) -> Result<()> {
    let store = deps.store.as_ref();

    match command {
        DistributionCommand::StopLeg {
            call_sid,
            leg_sid,
            answered,
        } => {
            stop_leg(account_id, call_sid, leg_sid, *answered, deps).await?;
        }

        DistributionCommand::MarkAgentAvailable { agent_id } => {
            if !store
                .set_agent_availability(account_id, agent_id, Availability::Available)
                .await?
            {
                debug!(agent_id = %agent_id, "Unknown agent, availability unchanged");
            }
        }

        DistributionCommand::MirrorAttemptStatus {
            call_sid,
            leg_sid,
            status,
        } => {
            if !store
                .advance_attempt_status(account_id, call_sid, leg_sid, *status)
                .await?
            {
                debug!(leg_sid = %leg_sid, status = %status, "Attempt status not advanced");
            }
        }

        DistributionCommand::MarkCallerLeft { call_sid } => {
            if store
                .advance_call_status(account_id, call_sid, CallStatus::CallerLeft)
                .await?
            {
                info!(call_sid = %call_sid, "Caller left");
            }
        }

        DistributionCommand::CancelPendingAttempts {
            call_sid,
            except_agent,
        } => {
            cancel_pending_attempts(account_id, call_sid, except_agent.as_deref(), deps).await?;
        }

        DistributionCommand::MarkCallConnected { call_sid } => {
            if store
                .advance_call_status(account_id, call_sid, CallStatus::Connected)
                .await?
            {
                info!(call_sid = %call_sid, "Caller joined the conference, starting distribution");
                start_distribution_task(account_id, call_sid, deps);
            } else {
                debug!(call_sid = %call_sid, "Call already connected, not starting again");
            }
        }

        DistributionCommand::ClaimAgentJoined { call_sid, agent_id } => {
            if store
                .claim_agent_joined(account_id, call_sid, agent_id)
                .await?
            {
                info!(call_sid = %call_sid, agent_id = %agent_id, "Agent joined the conference");
                cancel_pending_attempts(account_id, call_sid, Some(agent_id), deps).await?;
                return Ok(());
            }

            let winner = store
                .find_call(account_id, call_sid)
                .await?
                .and_then(|call| call.joined_agent_id);
            match winner {
                Some(winner) if winner != *agent_id => {
                    warn!(
                        call_sid = %call_sid,
                        agent_id = %agent_id,
                        winner = %winner,
                        "Second agent reached an answered call, ending their leg"
                    );
                    end_agent_attempts(account_id, call_sid, agent_id, deps).await?;
                }
                _ => debug!(call_sid = %call_sid, agent_id = %agent_id, "Duplicate join report"),
            }
        }
    }

    Ok(())
}
