//! Voice webhooks: every handler answers with a TwiML document

use axum::{
    extract::{Extension, Form, Query},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use twilio::VoiceResponse;

use crate::domains::distribution::activities::{
    confirm_agent, greet_caller, prompt_agent, AgentConfirmation, AgentPrompt,
};
use crate::server::app::AxumAppState;

const FALLBACK_TWIML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Say>Error. Goodbye.</Say><Hangup/></Response>";

/// Form fields Twilio posts to voice webhooks
#[derive(Debug, Default, Deserialize)]
pub struct VoiceForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "To")]
    pub to: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "Digits")]
    pub digits: Option<String>,
}

/// Correlation carried on agent leg URLs
#[derive(Debug, Default, Deserialize)]
pub struct AgentLegQuery {
    pub room: Option<String>,
    pub user_id: Option<String>,
    pub account_id: Option<String>,
    pub retry: Option<String>,
}

impl AgentLegQuery {
    /// Unparseable counters restart at zero
    fn retry(&self) -> u32 {
        self.retry
            .as_deref()
            .and_then(|r| r.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// Render a voice document, falling back to a fixed goodbye if rendering fails
pub fn twiml_response(document: &VoiceResponse) -> Response {
    let body = match document.to_xml() {
        Ok(xml) => xml,
        Err(e) => {
            tracing::error!(error = %e, "Failed to render voice document");
            FALLBACK_TWIML.to_string()
        }
    };
    (StatusCode::OK, [(CONTENT_TYPE, "application/xml")], body).into_response()
}

fn error_response() -> Response {
    twiml_response(&VoiceResponse::new().say("Error. Goodbye.").hangup())
}

/// POST /voice/inbound - greet the caller and park them in a conference
pub async fn inbound_call_handler(
    Extension(state): Extension<AxumAppState>,
    form: Option<Form<VoiceForm>>,
) -> Response {
    let form = form.map(|Form(form)| form).unwrap_or_default();

    match greet_caller(form.call_sid.as_deref(), form.to.as_deref(), &state.deps).await {
        Ok(document) => twiml_response(&document),
        Err(e) => {
            tracing::error!(call_sid = ?form.call_sid, error = %e, "Inbound call failed");
            error_response()
        }
    }
}

/// GET|POST /voice/agent/prompt - ask an answering agent to accept
pub async fn agent_prompt_handler(
    Extension(state): Extension<AxumAppState>,
    Query(query): Query<AgentLegQuery>,
) -> Response {
    let retry = query.retry();
    let prompt = AgentPrompt {
        room: query.room,
        agent_id: query.user_id,
        account_id: query.account_id,
        retry,
    };
    twiml_response(&prompt_agent(&prompt, &state.deps))
}

/// POST /voice/agent/confirm - process the agent's keypress
pub async fn agent_confirm_handler(
    Extension(state): Extension<AxumAppState>,
    Query(query): Query<AgentLegQuery>,
    form: Option<Form<VoiceForm>>,
) -> Response {
    let form = form.map(|Form(form)| form).unwrap_or_default();
    let retry = query.retry();
    let confirmation = AgentConfirmation {
        room: query.room,
        agent_id: query.user_id,
        account_id: query.account_id,
        retry,
        digits: form.digits,
        from: form.from,
    };

    match confirm_agent(&confirmation, &state.deps).await {
        Ok(document) => twiml_response(&document),
        Err(e) => {
            tracing::error!(
                agent_id = ?confirmation.agent_id,
                error = %e,
                "Agent confirmation failed"
            );
            error_response()
        }
    }
}
