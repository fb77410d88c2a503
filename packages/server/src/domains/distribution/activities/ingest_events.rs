//! Provider callbacks: correlate with stored records, decide, apply

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use super::apply_commands::apply_commands;
use crate::domains::distribution::commands::DistributionCommand;
use crate::domains::distribution::events::{ConferenceEvent, LegStatusEvent};
use crate::domains::distribution::machines::{decide_conference_event, decide_leg_status};
use crate::kernel::ServerDeps;

/// Handle a leg status callback. Returns the commands that were applied.
pub async fn ingest_leg_status(
    event: &LegStatusEvent,
    deps: &Arc<ServerDeps>,
) -> Result<Vec<DistributionCommand>> {
    // Agent legs report against the caller's call; the caller leg is its own call
    let call_sid = match (&event.agent_id, &event.parent_call_sid) {
        (Some(_), parent) => parent.as_deref(),
        (None, _) => Some(event.leg_sid.as_str()),
    };
    let call = match call_sid {
        Some(sid) => deps.store.find_call(&event.account_id, sid).await?,
        None => None,
    };

    let commands = decide_leg_status(event, call.as_ref());
    debug!(
        leg_sid = %event.leg_sid,
        status = %event.status,
        agent_leg = event.is_agent_leg(),
        commands = commands.len(),
        "Leg status received"
    );

    apply_commands(&event.account_id, &commands, deps).await;
    Ok(commands)
}

/// Handle a conference membership callback. Returns the commands that were applied.
pub async fn ingest_conference_event(
    event: &ConferenceEvent,
    deps: &Arc<ServerDeps>,
) -> Result<Vec<DistributionCommand>> {
    let call = deps
        .store
        .find_call(&event.account_id, &event.call_sid)
        .await?;

    let commands = decide_conference_event(event, call.as_ref());
    debug!(
        call_sid = %event.call_sid,
        kind = ?event.kind,
        label = ?event.participant_label,
        commands = commands.len(),
        "Conference event received"
    );

    apply_commands(&event.account_id, &commands, deps).await;
    Ok(commands)
}
