//! Webhook URLs handed to the provider.
//!
//! Correlation data (account, agent, parent call, retry counter) travels in
//! the query string so every callback can be handled without session state.

use anyhow::{Context, Result};
use url::Url;

pub const INBOUND_PATH: &str = "/voice/inbound";
pub const DISTRIBUTION_START_PATH: &str = "/distribution/start";
pub const AGENT_PROMPT_PATH: &str = "/voice/agent/prompt";
pub const AGENT_CONFIRM_PATH: &str = "/voice/agent/confirm";
pub const STATUS_CALLBACK_PATH: &str = "/callbacks/status";
pub const CONFERENCE_CALLBACK_PATH: &str = "/callbacks/conference";

#[derive(Debug, Clone)]
pub struct WebhookUrls {
    base: Url,
}

impl WebhookUrls {
    pub fn new(public_base_url: &str) -> Result<Self> {
        let base = Url::parse(public_base_url)
            .with_context(|| format!("invalid public base url: {}", public_base_url))?;
        Ok(Self { base })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> String {
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{}{}", prefix, path));
        url.set_query(None);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
        url.into()
    }

    /// Answer URL for an agent leg: asks the agent to accept
    pub fn agent_prompt(&self, room: &str, agent_id: &str, account_id: &str, retry: u32) -> String {
        let retry = retry.to_string();
        self.endpoint(
            AGENT_PROMPT_PATH,
            &[
                ("room", room),
                ("user_id", agent_id),
                ("account_id", account_id),
                ("retry", retry.as_str()),
            ],
        )
    }

    /// Gather action: where the agent's digit is posted
    pub fn agent_confirm(
        &self,
        room: &str,
        agent_id: &str,
        account_id: &str,
        retry: u32,
    ) -> String {
        let retry = retry.to_string();
        self.endpoint(
            AGENT_CONFIRM_PATH,
            &[
                ("room", room),
                ("user_id", agent_id),
                ("account_id", account_id),
                ("retry", retry.as_str()),
            ],
        )
    }

    /// Status callback for an agent leg dialed on behalf of `call_sid`
    pub fn agent_leg_status(&self, agent_id: &str, account_id: &str, call_sid: &str) -> String {
        self.endpoint(
            STATUS_CALLBACK_PATH,
            &[
                ("user_id", agent_id),
                ("account_id", account_id),
                ("call_sid", call_sid),
            ],
        )
    }

    /// Status callback to configure on the inbound line itself (caller legs)
    pub fn caller_leg_status(&self, account_id: &str) -> String {
        self.endpoint(STATUS_CALLBACK_PATH, &[("account_id", account_id)])
    }

    /// Conference event callback for the caller's holding conference
    pub fn conference_events(&self, call_sid: &str, account_id: &str) -> String {
        self.endpoint(
            CONFERENCE_CALLBACK_PATH,
            &[("call_sid", call_sid), ("account_id", account_id)],
        )
    }
}
