//! Agent side of a call: the accept prompt and the keypress that follows.
//!
//! Both webhooks are stateless; room, agent, account and the retry counter
//! come back to us in the query string of the URLs we handed out.

use anyhow::Result;
use tracing::{info, warn};
use twilio::{Conference, Gather, VoiceResponse};

use super::greet_caller::MISSING_INFORMATION;
use crate::common::{non_empty, same_number};
use crate::domains::distribution::models::{Availability, Call};
use crate::kernel::ServerDeps;

const TOO_MANY_ATTEMPTS: &str = "Too many failed attempts. Goodbye.";
const INVALID_INPUT: &str = "Invalid input.";
const SYSTEM_ERROR: &str = "System error occurred. Goodbye.";
const VERIFICATION_FAILED: &str = "Verification failed.";
const VERIFICATION_FAILED_FINAL: &str = "Verification failed. Goodbye.";
const CALLER_ALREADY_LEFT: &str = "The caller has already left. Goodbye.";
const ALREADY_ANSWERED: &str = "This call has already been answered. Goodbye.";
const CONNECTING: &str = "Connecting you now.";

/// Query parameters of the prompt URL
#[derive(Debug, Clone, Default)]
pub struct AgentPrompt {
    pub room: Option<String>,
    pub agent_id: Option<String>,
    pub account_id: Option<String>,
    pub retry: u32,
}

/// Query parameters of the confirm URL plus the gathered input
#[derive(Debug, Clone, Default)]
pub struct AgentConfirmation {
    pub room: Option<String>,
    pub agent_id: Option<String>,
    pub account_id: Option<String>,
    pub retry: u32,
    pub digits: Option<String>,
    /// Caller id presented on the agent leg
    pub from: Option<String>,
}

/// Correlation data every agent webhook needs
struct AgentLeg<'a> {
    room: &'a str,
    call_sid: &'a str,
    agent_id: &'a str,
    account_id: &'a str,
}

impl<'a> AgentLeg<'a> {
    fn parse(
        room: Option<&'a str>,
        agent_id: Option<&'a str>,
        account_id: Option<&'a str>,
    ) -> Option<Self> {
        let room = non_empty(room)?;
        Some(Self {
            room,
            call_sid: Call::sid_from_room(room)?,
            agent_id: non_empty(agent_id)?,
            account_id: non_empty(account_id)?,
        })
    }
}

fn goodbye(message: &str) -> VoiceResponse {
    VoiceResponse::new().say(message).hangup()
}

/// Re-prompt the agent, or end the leg once the retry bound is reached
fn retry_or_end(
    leg: &AgentLeg<'_>,
    retry: u32,
    message: &str,
    final_message: &str,
    deps: &ServerDeps,
) -> VoiceResponse {
    if retry >= deps.settings.max_prompt_retries {
        return goodbye(final_message);
    }
    VoiceResponse::new().say(message).redirect(deps.urls.agent_prompt(
        leg.room,
        leg.agent_id,
        leg.account_id,
        retry + 1,
    ))
}

/// Ask an answering agent to press the accept digit
pub fn prompt_agent(prompt: &AgentPrompt, deps: &ServerDeps) -> VoiceResponse {
    let Some(leg) = AgentLeg::parse(
        prompt.room.as_deref(),
        prompt.agent_id.as_deref(),
        prompt.account_id.as_deref(),
    ) else {
        warn!(prompt = ?prompt, "Agent prompt without correlation data");
        return goodbye(MISSING_INFORMATION);
    };

    if prompt.retry >= deps.settings.max_prompt_retries {
        info!(agent_id = leg.agent_id, retry = prompt.retry, "Agent ran out of prompts");
        return goodbye(TOO_MANY_ATTEMPTS);
    }

    let settings = &deps.settings;
    VoiceResponse::new()
        .gather(Gather {
            num_digits: 1,
            timeout_secs: settings.gather_timeout_secs,
            action: deps.urls.agent_confirm(
                leg.room,
                leg.agent_id,
                leg.account_id,
                prompt.retry,
            ),
            prompt: Some(format!("Press {} to accept the call.", settings.accept_digit)),
        })
        // Reached only when the gather times out without input
        .redirect(deps.urls.agent_prompt(
            leg.room,
            leg.agent_id,
            leg.account_id,
            prompt.retry + 1,
        ))
}

/// Validate the agent's keypress and bridge them into the caller's conference
pub async fn confirm_agent(
    confirmation: &AgentConfirmation,
    deps: &ServerDeps,
) -> Result<VoiceResponse> {
    let Some(leg) = AgentLeg::parse(
        confirmation.room.as_deref(),
        confirmation.agent_id.as_deref(),
        confirmation.account_id.as_deref(),
    ) else {
        warn!("Agent confirmation without correlation data");
        return Ok(goodbye(MISSING_INFORMATION));
    };
    let retry = confirmation.retry;

    if non_empty(confirmation.digits.as_deref()) != Some(deps.settings.accept_digit.as_str()) {
        info!(agent_id = leg.agent_id, retry, "Agent pressed the wrong key");
        return Ok(retry_or_end(&leg, retry, INVALID_INPUT, TOO_MANY_ATTEMPTS, deps));
    }

    let store = deps.store.as_ref();
    let account = store.find_account(leg.account_id).await?;
    let agent = store.find_agent(leg.account_id, leg.agent_id).await?;
    let call = store.find_call(leg.account_id, leg.call_sid).await?;
    let (Some(account), Some(_agent), Some(call)) = (account, agent, call) else {
        warn!(
            account_id = leg.account_id,
            agent_id = leg.agent_id,
            call_sid = leg.call_sid,
            "Agent confirmation for unknown records"
        );
        return Ok(goodbye(SYSTEM_ERROR));
    };

    // Agent legs are always placed from the account's line
    let verified = confirmation
        .from
        .as_deref()
        .is_some_and(|from| same_number(from, &account.twilio_number));
    if !verified {
        warn!(
            agent_id = leg.agent_id,
            from = ?confirmation.from,
            "Agent leg caller id does not match the account line"
        );
        return Ok(retry_or_end(
            &leg,
            retry,
            VERIFICATION_FAILED,
            VERIFICATION_FAILED_FINAL,
            deps,
        ));
    }

    if call.caller_left() {
        info!(call_sid = leg.call_sid, "Agent accepted after the caller left");
        return Ok(goodbye(CALLER_ALREADY_LEFT));
    }

    if call
        .joined_agent_id
        .as_deref()
        .is_some_and(|winner| winner != leg.agent_id)
    {
        info!(
            call_sid = leg.call_sid,
            agent_id = leg.agent_id,
            "Agent accepted a call another agent already took"
        );
        return Ok(goodbye(ALREADY_ANSWERED));
    }

    store
        .set_agent_availability(leg.account_id, leg.agent_id, Availability::InConference)
        .await?;
    info!(call_sid = leg.call_sid, agent_id = leg.agent_id, "Agent accepted, bridging");

    Ok(VoiceResponse::new().say(CONNECTING).conference(Conference {
        room: leg.room.to_string(),
        participant_label: Some(leg.agent_id.to_string()),
        start_conference_on_enter: true,
        end_conference_on_exit: true,
        status_callback: deps.urls.conference_events(leg.call_sid, leg.account_id),
        wait_url: deps.settings.agent_hold_music_url.clone(),
    }))
}
