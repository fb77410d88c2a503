// Thin client for the Twilio Programmable Voice REST API.
//
// Only the verbs a call distributor needs are covered: place an outbound
// call and update an in-flight call (cancel it or replace its TwiML).

pub mod models;
pub mod twiml;

use reqwest::{header, Client};

pub use crate::models::{CallResource, CallUpdate, CreateCall};
pub use crate::twiml::{Conference, Gather, VoiceResponse};

pub const DEFAULT_API_BASE: &str = "https://api.twilio.com";

#[derive(Debug, thiserror::Error)]
pub enum TwilioError {
    #[error("request to Twilio failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Twilio returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to build voice response: {0}")]
    Twiml(String),
}

#[derive(Debug, Clone)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: String,
    pub api_base: String,
}

impl TwilioOptions {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point the client at another host (regional edge, or a mock server in tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Clone)]
pub struct TwilioService {
    options: TwilioOptions,
    client: Client,
}

impl TwilioService {
    pub fn new(options: TwilioOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.options.api_base, self.options.account_sid
        )
    }

    fn call_url(&self, call_sid: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls/{}.json",
            self.options.api_base, self.options.account_sid, call_sid
        )
    }

    /// Place an outbound call. Returns the provider's call resource (its `sid` is the leg id).
    pub async fn create_call(&self, call: &CreateCall) -> Result<CallResource, TwilioError> {
        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&call.form_params())
            .send()
            .await?;

        parse_call_response(response).await
    }

    /// Modify a live call: cancel/complete it, or replace what it is currently executing.
    pub async fn update_call(
        &self,
        call_sid: &str,
        update: &CallUpdate,
    ) -> Result<CallResource, TwilioError> {
        let response = self
            .client
            .post(self.call_url(call_sid))
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&update.form_params())
            .send()
            .await?;

        parse_call_response(response).await
    }
}

async fn parse_call_response(response: reqwest::Response) -> Result<CallResource, TwilioError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, body = %body, "Twilio returned an error");
        return Err(TwilioError::Api {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response.json::<CallResource>().await?)
}
