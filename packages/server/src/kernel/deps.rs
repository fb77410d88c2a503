//! Server dependencies for distribution activities (using traits for testability)
//!
//! This module provides the central dependency container used by every
//! webhook handler and by the long-lived dialing task.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use twilio::{CallUpdate, CreateCall, TwilioService, VoiceResponse};

use crate::config::DistributionSettings;
use crate::domains::distribution::urls::WebhookUrls;
use crate::kernel::{BaseCallStore, BaseTelephonyClient, DialRequest};

// =============================================================================
// TwilioService Adapter (implements BaseTelephonyClient trait)
// =============================================================================

/// Wrapper around TwilioService that implements BaseTelephonyClient trait
pub struct TwilioAdapter(pub Arc<TwilioService>);

impl TwilioAdapter {
    pub fn new(service: Arc<TwilioService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseTelephonyClient for TwilioAdapter {
    async fn dial(&self, request: DialRequest) -> Result<String> {
        let call = self
            .0
            .create_call(&CreateCall {
                to: request.to,
                from: request.from,
                url: request.answer_url,
                status_callback: request.status_callback_url,
                status_callback_events: request.events,
            })
            .await?;
        Ok(call.sid)
    }

    async fn cancel_leg(&self, leg_sid: &str) -> Result<()> {
        self.0.update_call(leg_sid, &CallUpdate::Cancel).await?;
        Ok(())
    }

    async fn hangup_leg(&self, leg_sid: &str) -> Result<()> {
        self.0.update_call(leg_sid, &CallUpdate::Complete).await?;
        Ok(())
    }

    async fn push_voice_document(&self, leg_sid: &str, document: &VoiceResponse) -> Result<()> {
        let twiml = document.to_xml()?;
        self.0
            .update_call(leg_sid, &CallUpdate::Twiml(twiml))
            .await?;
        Ok(())
    }
}

// =============================================================================
// Active calls
// =============================================================================

/// Calls with a distribution run in this process
#[derive(Clone, Default)]
pub struct ActiveCalls {
    inner: Arc<Mutex<HashSet<(String, String)>>>,
}

impl ActiveCalls {
    /// Claim a call for one run; `None` when a run already owns it.
    /// The claim is released when the guard drops.
    pub fn try_claim(&self, account_id: &str, call_sid: &str) -> Option<ActiveCallGuard> {
        let key = (account_id.to_string(), call_sid.to_string());
        let mut calls = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if !calls.insert(key.clone()) {
            return None;
        }
        Some(ActiveCallGuard {
            calls: self.clone(),
            key,
        })
    }

    pub fn contains(&self, account_id: &str, call_sid: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(account_id.to_string(), call_sid.to_string()))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct ActiveCallGuard {
    calls: ActiveCalls,
    key: (String, String),
}

impl Drop for ActiveCallGuard {
    fn drop(&mut self) {
        self.calls
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to handlers and the dialing task
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn BaseCallStore>,
    pub telephony: Arc<dyn BaseTelephonyClient>,
    pub urls: WebhookUrls,
    pub settings: DistributionSettings,
    /// Cancelled on shutdown; interrupts every in-flight wait
    pub shutdown: CancellationToken,
    /// Background dialing tasks, awaited on shutdown
    pub tasks: TaskTracker,
    pub active_calls: ActiveCalls,
}

impl ServerDeps {
    pub fn new(
        store: Arc<dyn BaseCallStore>,
        telephony: Arc<dyn BaseTelephonyClient>,
        urls: WebhookUrls,
        settings: DistributionSettings,
    ) -> Self {
        Self {
            store,
            telephony,
            urls,
            settings,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
            active_calls: ActiveCalls::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_call_claim_is_exclusive_until_dropped() {
        let calls = ActiveCalls::default();

        let claim = calls.try_claim("acct", "CA1");
        assert!(claim.is_some());
        assert!(calls.try_claim("acct", "CA1").is_none());
        assert!(calls.try_claim("acct", "CA2").is_some());
        assert!(calls.contains("acct", "CA1"));

        drop(claim);
        assert!(!calls.contains("acct", "CA1"));
        assert!(calls.try_claim("acct", "CA1").is_some());
    }
}
