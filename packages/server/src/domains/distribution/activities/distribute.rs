//! Round-robin dialing for a single inbound call.
//!
//! One run per caller leg: admit the caller, then walk the roster in
//! priority order for up to `max_retries` rounds, ringing one agent at a time
//! until someone accepts, the caller leaves, or the rounds run out.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, warn};
use twilio::VoiceResponse;

use super::admit_caller::admit_caller;
use super::cancel_attempts::{cancel_pending_attempts, cancel_unanswered_attempts};
use crate::domains::distribution::machines::{check_progress, decide_dial, DialDecision};
use crate::domains::distribution::models::{Account, Agent, Call, OutboundAttempt};
use crate::domains::distribution::types::{DistributionError, DistributionOutcome};
use crate::kernel::{poll_until, DialRequest, PollOutcome, PollSchedule, ServerDeps};

/// Leg events requested for every agent leg
pub const AGENT_LEG_EVENTS: [&str; 4] = ["initiated", "ringing", "answered", "completed"];

pub const NO_AGENT_APOLOGY: &str = "Sorry, no one was available to take your call. Goodbye.";

/// Resolve the account that owns `inbound_number` and run distribution for the call.
///
/// Unlike the conference-triggered task, this refuses to start for an
/// account without agents.
pub async fn handle_call(
    call_sid: &str,
    inbound_number: &str,
    deps: &ServerDeps,
) -> Result<DistributionOutcome, DistributionError> {
    let account = deps
        .store
        .find_account_by_number(inbound_number)
        .await?
        .ok_or_else(|| DistributionError::AccountNotFoundForNumber(inbound_number.to_string()))?;

    if deps.store.list_agents(&account.id).await?.is_empty() {
        return Err(DistributionError::EmptyRoster(account.id));
    }

    run_distribution(&account, call_sid, deps).await
}

/// Admission followed by the dialing loop. At most one run per call at a time.
pub async fn run_distribution(
    account: &Account,
    call_sid: &str,
    deps: &ServerDeps,
) -> Result<DistributionOutcome, DistributionError> {
    let Some(_claim) = deps.active_calls.try_claim(&account.id, call_sid) else {
        return Err(DistributionError::AlreadyRunning(call_sid.to_string()));
    };

    if let Some(outcome) = admit_caller(&account.id, call_sid, deps).await? {
        return Ok(outcome);
    }
    Ok(distribute_call(account, call_sid, deps).await?)
}

/// Spawn the dialing pipeline for a call onto the server's task tracker.
///
/// Callers must make sure this happens once per call; the conference join
/// handler does so by spawning only when its conditional update wins.
pub fn start_distribution_task(account_id: &str, call_sid: &str, deps: &Arc<ServerDeps>) {
    let task_deps = deps.clone();
    let account_id = account_id.to_string();
    let call_sid = call_sid.to_string();

    deps.tasks.spawn(async move {
        match run_for_account_id(&account_id, &call_sid, &task_deps).await {
            Ok(outcome) => {
                info!(call_sid = %call_sid, outcome = ?outcome, "{}", outcome.message())
            }
            Err(DistributionError::AlreadyRunning(_)) => {
                debug!(call_sid = %call_sid, "Distribution already running for call")
            }
            Err(e) => error!(call_sid = %call_sid, error = %e, "Distribution failed"),
        }
    });
}

async fn run_for_account_id(
    account_id: &str,
    call_sid: &str,
    deps: &ServerDeps,
) -> Result<DistributionOutcome, DistributionError> {
    let account = deps
        .store
        .find_account(account_id)
        .await?
        .ok_or_else(|| DistributionError::AccountNotFound(account_id.to_string()))?;

    run_distribution(&account, call_sid, deps).await
}

/// The dialing loop proper. The caller is assumed to be in the conference.
///
/// If the loop fails part way, legs still ringing are canceled before the
/// error is returned.
pub async fn distribute_call(
    account: &Account,
    call_sid: &str,
    deps: &ServerDeps,
) -> Result<DistributionOutcome> {
    let result = dial_roster(account, call_sid, deps).await;

    if let Err(e) = &result {
        warn!(account_id = %account.id, call_sid, error = %e, "Round robin aborted");
        match cancel_unanswered_attempts(&account.id, call_sid, deps).await {
            Ok(canceled) => info!(call_sid, canceled, "Canceled ringing legs after abort"),
            Err(cleanup_err) => {
                warn!(call_sid, error = %cleanup_err, "Failed to cancel legs after abort")
            }
        }
    }
    result
}

async fn dial_roster(
    account: &Account,
    call_sid: &str,
    deps: &ServerDeps,
) -> Result<DistributionOutcome> {
    let rounds = account.rounds(deps.settings.default_max_retries);
    let roster = deps.store.list_agents(&account.id).await?;
    let room = Call::room_for(call_sid);

    info!(
        account_id = %account.id,
        call_sid,
        rounds,
        agents = roster.len(),
        "Starting round robin"
    );
    if roster.is_empty() {
        warn!(account_id = %account.id, "Account has no agents");
    }

    for round in 1..=rounds {
        debug!(call_sid, round, "Starting round");

        for listed in &roster {
            if deps.shutdown.is_cancelled() {
                return finish(DistributionOutcome::Interrupted, account, call_sid, deps).await;
            }

            let call = deps.store.find_call(&account.id, call_sid).await?;

            // Availability changes while the round runs; always use the latest
            let Some(agent) = deps.store.find_agent(&account.id, &listed.id).await? else {
                debug!(agent_id = %listed.id, "Agent removed from roster, skipping");
                continue;
            };

            match decide_dial(call.as_ref(), &agent) {
                DialDecision::Stop(outcome) => {
                    return finish(outcome, account, call_sid, deps).await;
                }
                DialDecision::Skip => {
                    info!(agent_id = %agent.id, "Agent is in a conference, skipping");
                    continue;
                }
                DialDecision::Dial => {}
            }

            if let Err(e) = dial_agent(account, call_sid, &room, &agent, deps).await {
                warn!(agent_id = %agent.id, error = %e, "Failed to dial agent, moving on");
                continue;
            }

            match wait_for_accept(&account.id, call_sid, deps).await? {
                PollOutcome::Ready(outcome) => {
                    return finish(outcome, account, call_sid, deps).await;
                }
                PollOutcome::Cancelled => {
                    return finish(DistributionOutcome::Interrupted, account, call_sid, deps).await;
                }
                PollOutcome::TimedOut => {
                    debug!(agent_id = %agent.id, "No answer within ring wait");
                }
            }
        }
    }

    finish(DistributionOutcome::NoAgentAvailable, account, call_sid, deps).await
}

/// Place an outbound leg to `agent` and record the attempt
async fn dial_agent(
    account: &Account,
    call_sid: &str,
    room: &str,
    agent: &Agent,
    deps: &ServerDeps,
) -> Result<String> {
    let request = DialRequest {
        to: agent.phone_number.clone(),
        from: account.twilio_number.clone(),
        answer_url: deps.urls.agent_prompt(room, &agent.id, &account.id, 0),
        status_callback_url: deps.urls.agent_leg_status(&agent.id, &account.id, call_sid),
        events: AGENT_LEG_EVENTS.iter().map(|e| e.to_string()).collect(),
    };

    let leg_sid = deps.telephony.dial(request).await?;
    info!(agent_id = %agent.id, leg_sid = %leg_sid, "Dialing agent");

    let attempt = OutboundAttempt::initiated(
        &account.id,
        call_sid,
        &leg_sid,
        &agent.phone_number,
        &agent.id,
    );
    if let Err(e) = deps.store.record_attempt(&attempt).await {
        // Nothing could ever cancel an unrecorded leg
        if let Err(cancel_err) = deps.telephony.cancel_leg(&leg_sid).await {
            warn!(leg_sid = %leg_sid, error = %cancel_err, "Failed to cancel unrecorded leg");
        }
        return Err(e);
    }

    Ok(leg_sid)
}

async fn wait_for_accept(
    account_id: &str,
    call_sid: &str,
    deps: &ServerDeps,
) -> Result<PollOutcome<DistributionOutcome>> {
    let store = deps.store.as_ref();
    let schedule = PollSchedule::new(deps.settings.poll_interval, deps.settings.agent_ring_wait);

    poll_until(schedule, &deps.shutdown, move || async move {
        let call = store.find_call(account_id, call_sid).await?;
        Ok(check_progress(call.as_ref()))
    })
    .await
}

/// Side effects owed to the call once the loop has decided how it ends
async fn finish(
    outcome: DistributionOutcome,
    account: &Account,
    call_sid: &str,
    deps: &ServerDeps,
) -> Result<DistributionOutcome> {
    match outcome {
        DistributionOutcome::CallerEnded | DistributionOutcome::AgentJoined => {
            let winner = deps
                .store
                .find_call(&account.id, call_sid)
                .await?
                .and_then(|call| call.joined_agent_id);
            cancel_pending_attempts(&account.id, call_sid, winner.as_deref(), deps).await?;
        }
        DistributionOutcome::NoAgentAvailable => {
            cancel_pending_attempts(&account.id, call_sid, None, deps).await?;
            apologize(call_sid, deps).await;
        }
        DistributionOutcome::CallerDidNotJoin | DistributionOutcome::Interrupted => {}
    }

    info!(call_sid, outcome = ?outcome, "Distribution finished");
    Ok(outcome)
}

async fn apologize(call_sid: &str, deps: &ServerDeps) {
    let document = VoiceResponse::new().say(NO_AGENT_APOLOGY).hangup();
    if let Err(e) = deps.telephony.push_voice_document(call_sid, &document).await {
        warn!(call_sid, error = %e, "Failed to play apology to caller");
    }
}
