//! Voice document for an inbound caller

use anyhow::Result;
use tracing::{info, warn};
use twilio::{Conference, VoiceResponse};

use crate::common::non_empty;
use crate::domains::distribution::models::{Call, CallStatus};
use crate::kernel::ServerDeps;

pub const MISSING_INFORMATION: &str = "Missing required information. Goodbye.";
pub const HOLD_GREETING: &str = "Please hold while we connect you.";
const ACCOUNT_NOT_FOUND: &str = "Account not found. Goodbye.";

/// Greet the caller and park them in their own holding conference.
///
/// The conference reports membership changes back to us; the caller's join
/// event is what starts dialing agents.
pub async fn greet_caller(
    call_sid: Option<&str>,
    inbound_number: Option<&str>,
    deps: &ServerDeps,
) -> Result<VoiceResponse> {
    let (Some(call_sid), Some(inbound_number)) = (non_empty(call_sid), non_empty(inbound_number))
    else {
        warn!("Inbound call without CallSid or To");
        return Ok(VoiceResponse::new().say(MISSING_INFORMATION).hangup());
    };

    let Some(account) = deps.store.find_account_by_number(inbound_number).await? else {
        warn!(inbound_number, "No account for inbound number");
        return Ok(VoiceResponse::new().say(ACCOUNT_NOT_FOUND).hangup());
    };

    if deps
        .store
        .create_call_if_absent(&account.id, call_sid, CallStatus::Initiated)
        .await?
    {
        info!(account_id = %account.id, call_sid, "Inbound call");
    }

    Ok(VoiceResponse::new()
        .say(HOLD_GREETING)
        .conference(Conference {
            room: Call::room_for(call_sid),
            participant_label: None,
            start_conference_on_enter: true,
            end_conference_on_exit: true,
            status_callback: deps.urls.conference_events(call_sid, &account.id),
            wait_url: deps.settings.caller_hold_music_url.clone(),
        }))
}
