use serde::{Deserialize, Serialize};

/// Call resource as returned by the Calls API (subset)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResource {
    pub sid: String,
    pub status: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
}

/// Parameters for placing an outbound call
#[derive(Debug, Clone)]
pub struct CreateCall {
    pub to: String,
    pub from: String,
    /// Fetched by Twilio once the callee answers; must return TwiML
    pub url: String,
    pub status_callback: String,
    /// e.g. `initiated`, `ringing`, `answered`, `completed`
    pub status_callback_events: Vec<String>,
}

impl CreateCall {
    pub(crate) fn form_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("To", self.to.clone()),
            ("From", self.from.clone()),
            ("Url", self.url.clone()),
            ("Method", "POST".to_string()),
            ("StatusCallback", self.status_callback.clone()),
            ("StatusCallbackMethod", "POST".to_string()),
        ];
        // Twilio expects the parameter repeated once per event
        for event in &self.status_callback_events {
            params.push(("StatusCallbackEvent", event.clone()));
        }
        params
    }
}

/// Modification applied to a live call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallUpdate {
    /// Stop a call that is still queued or ringing
    Cancel,
    /// Hang up a call that is in progress
    Complete,
    /// Replace the call's current instructions with a TwiML document
    Twiml(String),
}

impl CallUpdate {
    pub(crate) fn form_params(&self) -> Vec<(&'static str, String)> {
        match self {
            CallUpdate::Cancel => vec![("Status", "canceled".to_string())],
            CallUpdate::Complete => vec![("Status", "completed".to_string())],
            CallUpdate::Twiml(twiml) => vec![("Twiml", twiml.clone())],
        }
    }
}
