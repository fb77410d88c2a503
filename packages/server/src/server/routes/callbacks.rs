//! Provider status callbacks. Acknowledged with 200 unless correlation is missing.

use axum::{
    extract::{Extension, Form, Query},
    http::StatusCode,
};
use serde::Deserialize;

use crate::common::non_empty;
use crate::domains::distribution::activities::{ingest_conference_event, ingest_leg_status};
use crate::domains::distribution::events::{ConferenceEvent, ConferenceEventKind, LegStatusEvent};
use crate::server::app::AxumAppState;

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub account_id: Option<String>,
    /// Agent id, present on agent leg callbacks only
    pub user_id: Option<String>,
    /// Caller leg the callback relates to
    pub call_sid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusCallbackForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConferenceCallbackForm {
    #[serde(rename = "StatusCallbackEvent")]
    pub event: Option<String>,
    #[serde(rename = "ParticipantLabel")]
    pub participant_label: Option<String>,
}

fn owned(value: Option<&str>) -> Option<String> {
    non_empty(value).map(str::to_string)
}

/// POST /callbacks/status - leg status for agent legs and the caller leg
pub async fn status_callback_handler(
    Extension(state): Extension<AxumAppState>,
    Query(query): Query<CallbackQuery>,
    form: Option<Form<StatusCallbackForm>>,
) -> (StatusCode, &'static str) {
    let form = form.map(|Form(form)| form).unwrap_or_default();

    let (Some(account_id), Some(leg_sid)) = (
        owned(query.account_id.as_deref()),
        owned(form.call_sid.as_deref()),
    ) else {
        tracing::warn!(query = ?query, "Status callback without account or call sid");
        return (StatusCode::BAD_REQUEST, "Missing required parameters");
    };

    let event = LegStatusEvent {
        account_id,
        leg_sid,
        status: owned(form.call_status.as_deref()).unwrap_or_default(),
        agent_id: owned(query.user_id.as_deref()),
        parent_call_sid: owned(query.call_sid.as_deref()),
    };

    if let Err(e) = ingest_leg_status(&event, &state.deps).await {
        tracing::error!(leg_sid = %event.leg_sid, error = %e, "Failed to process status callback");
    }
    (StatusCode::OK, "OK")
}

/// POST /callbacks/conference - membership changes in a holding conference
pub async fn conference_callback_handler(
    Extension(state): Extension<AxumAppState>,
    Query(query): Query<CallbackQuery>,
    form: Option<Form<ConferenceCallbackForm>>,
) -> (StatusCode, &'static str) {
    let form = form.map(|Form(form)| form).unwrap_or_default();

    let (Some(account_id), Some(call_sid)) = (
        owned(query.account_id.as_deref()),
        owned(query.call_sid.as_deref()),
    ) else {
        tracing::warn!(query = ?query, "Conference callback without account or call sid");
        return (StatusCode::BAD_REQUEST, "Missing required parameters");
    };

    let event = ConferenceEvent {
        account_id,
        call_sid,
        kind: ConferenceEventKind::from_provider(form.event.as_deref().unwrap_or_default()),
        participant_label: owned(form.participant_label.as_deref()),
    };

    if let Err(e) = ingest_conference_event(&event, &state.deps).await {
        tracing::error!(call_sid = %event.call_sid, error = %e, "Failed to process conference callback");
    }
    (StatusCode::OK, "OK")
}
