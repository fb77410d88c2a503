//! Stopping outbound agent legs

use anyhow::Result;
use tracing::{info, warn};

use crate::domains::distribution::models::{AttemptStatus, OutboundAttempt};
use crate::kernel::ServerDeps;

/// Cancel every non-terminal attempt for a call, sparing `except_agent`'s legs.
///
/// Provider failures are logged and skipped; a record is only marked
/// `canceled` once the provider accepted the request. Returns how many
/// attempts were marked.
pub async fn cancel_pending_attempts(
    account_id: &str,
    call_sid: &str,
    except_agent: Option<&str>,
    deps: &ServerDeps,
) -> Result<usize> {
    let attempts = deps.store.list_attempts(account_id, call_sid).await?;

    let mut canceled = 0;
    for attempt in attempts
        .iter()
        .filter(|a| !a.status.is_terminal())
        .filter(|a| except_agent != Some(a.agent_id.as_str()))
    {
        if stop_attempt(attempt, deps).await? {
            canceled += 1;
        }
    }

    if canceled > 0 {
        info!(call_sid, canceled, "Canceled pending agent legs");
    }
    Ok(canceled)
}

/// Cancel attempts that were never answered, leaving answered legs to the
/// confirmation path. Used when the winner cannot be known.
pub async fn cancel_unanswered_attempts(
    account_id: &str,
    call_sid: &str,
    deps: &ServerDeps,
) -> Result<usize> {
    let attempts = deps.store.list_attempts(account_id, call_sid).await?;

    let mut canceled = 0;
    for attempt in attempts
        .iter()
        .filter(|a| !a.status.is_terminal() && a.status != AttemptStatus::Answered)
    {
        if stop_attempt(attempt, deps).await? {
            canceled += 1;
        }
    }
    Ok(canceled)
}

/// Hang up every live leg dialed to one agent for this call
pub async fn end_agent_attempts(
    account_id: &str,
    call_sid: &str,
    agent_id: &str,
    deps: &ServerDeps,
) -> Result<usize> {
    let attempts = deps.store.list_attempts(account_id, call_sid).await?;

    let mut ended = 0;
    for attempt in attempts
        .iter()
        .filter(|a| !a.status.is_terminal() && a.agent_id == agent_id)
    {
        if stop_attempt(attempt, deps).await? {
            ended += 1;
        }
    }
    Ok(ended)
}

/// Stop one leg reported live after its caller left.
///
/// The record is read back so a leg already known to be answered is hung up;
/// a leg with no record is still stopped at the provider.
pub async fn stop_leg(
    account_id: &str,
    call_sid: &str,
    leg_sid: &str,
    answered: bool,
    deps: &ServerDeps,
) -> Result<bool> {
    match deps.store.find_attempt(account_id, call_sid, leg_sid).await? {
        Some(attempt) if attempt.status.is_terminal() => Ok(false),
        Some(mut attempt) => {
            if answered {
                attempt.status = AttemptStatus::Answered;
            }
            info!(
                leg_sid,
                agent_id = %attempt.agent_id,
                "Stopping agent leg for a caller who already left"
            );
            stop_attempt(&attempt, deps).await
        }
        None => {
            warn!(
                leg_sid,
                call_sid,
                "No attempt recorded for live agent leg, stopping it anyway"
            );
            stop_provider_leg(leg_sid, answered, deps).await;
            Ok(false)
        }
    }
}

async fn stop_attempt(attempt: &OutboundAttempt, deps: &ServerDeps) -> Result<bool> {
    let answered = attempt.status == AttemptStatus::Answered;
    if !stop_provider_leg(&attempt.id, answered, deps).await {
        return Ok(false);
    }

    deps.store
        .advance_attempt_status(
            &attempt.account_id,
            &attempt.call_id,
            &attempt.id,
            AttemptStatus::Canceled,
        )
        .await
}

/// Returns whether the provider accepted the request
async fn stop_provider_leg(leg_sid: &str, answered: bool, deps: &ServerDeps) -> bool {
    // An answered leg can no longer be canceled, only completed
    let result = if answered {
        deps.telephony.hangup_leg(leg_sid).await
    } else {
        deps.telephony.cancel_leg(leg_sid).await
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(leg_sid, error = %e, "Failed to stop agent leg");
            false
        }
    }
}
