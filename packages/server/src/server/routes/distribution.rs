use axum::{
    extract::{Extension, Form},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::common::non_empty;
use crate::domains::distribution::activities::handle_call;
use crate::domains::distribution::types::{DistributionError, DistributionOutcome};
use crate::server::app::AxumAppState;
use crate::server::routes::voice::VoiceForm;

#[derive(Debug, Serialize)]
pub struct DistributionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<DistributionOutcome>,
    message: String,
}

impl DistributionResponse {
    fn finished(outcome: DistributionOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            message: outcome.message().to_string(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            outcome: None,
            message: message.into(),
        }
    }
}

/// POST /distribution/start - run admission and round robin for a call, in-request
///
/// Blocks until the run ends; every normal termination answers 200 with the outcome.
pub async fn distribution_start_handler(
    Extension(state): Extension<AxumAppState>,
    form: Option<Form<VoiceForm>>,
) -> (StatusCode, Json<DistributionResponse>) {
    let form = form.map(|Form(form)| form).unwrap_or_default();

    let (Some(call_sid), Some(inbound_number)) =
        (non_empty(form.call_sid.as_deref()), non_empty(form.to.as_deref()))
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(DistributionResponse::failed("Missing CallSid or To")),
        );
    };

    match handle_call(call_sid, inbound_number, &state.deps).await {
        Ok(outcome) => (StatusCode::OK, Json(DistributionResponse::finished(outcome))),
        Err(e @ DistributionError::AccountNotFoundForNumber(_))
        | Err(e @ DistributionError::EmptyRoster(_)) => {
            tracing::warn!(call_sid, error = %e, "Cannot distribute call");
            (StatusCode::NOT_FOUND, Json(DistributionResponse::failed(e.to_string())))
        }
        Err(e @ DistributionError::AlreadyRunning(_)) => {
            (StatusCode::CONFLICT, Json(DistributionResponse::failed(e.to_string())))
        }
        Err(e) => {
            tracing::error!(call_sid, error = %e, "Distribution failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DistributionResponse::failed("Internal error")),
            )
        }
    }
}
