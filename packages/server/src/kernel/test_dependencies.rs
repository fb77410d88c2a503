// TestDependencies - in-memory store and mock telephony for testing
//
// Provides doubles that can be injected into ServerDeps for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use twilio::VoiceResponse;

use super::{BaseCallStore, BaseTelephonyClient, DialRequest, ServerDeps};
use crate::config::DistributionSettings;
use crate::domains::distribution::models::{
    Account, Agent, AttemptStatus, Availability, Call, CallStatus, OutboundAttempt,
};
use crate::domains::distribution::urls::WebhookUrls;

// =============================================================================
// In-memory Call Store
// =============================================================================

type Key = (String, String);

fn key(a: &str, b: &str) -> Key {
    (a.to_string(), b.to_string())
}

#[derive(Default)]
struct StoreState {
    accounts: HashMap<String, Account>,
    agents: HashMap<Key, Agent>,
    calls: HashMap<Key, Call>,
    /// (account, call) -> attempts in the order they were recorded
    attempts: HashMap<Key, Vec<OutboundAttempt>>,
}

/// Call store backed by a mutex-guarded map, with the same conditional semantics as Postgres
#[derive(Default)]
pub struct InMemoryCallStore {
    state: Mutex<StoreState>,
    call_reads_fail: AtomicBool,
}

impl InMemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, id: &str, twilio_number: &str, max_retries: Option<i32>) -> Self {
        self.state.lock().unwrap().accounts.insert(
            id.to_string(),
            Account {
                id: id.to_string(),
                name: Some(format!("Account {}", id)),
                twilio_number: twilio_number.to_string(),
                max_retries,
            },
        );
        self
    }

    pub fn with_agent(self, account_id: &str, agent_id: &str, phone: &str, priority: i32) -> Self {
        self.state.lock().unwrap().agents.insert(
            key(account_id, agent_id),
            Agent {
                account_id: account_id.to_string(),
                id: agent_id.to_string(),
                phone_number: phone.to_string(),
                priority,
                status: Availability::Available,
            },
        );
        self
    }

    /// Make `find_call` return an error until switched back
    pub fn fail_call_reads(&self, fail: bool) {
        self.call_reads_fail.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of a call record
    pub fn call(&self, account_id: &str, call_sid: &str) -> Option<Call> {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(&key(account_id, call_sid))
            .cloned()
    }

    pub fn agent(&self, account_id: &str, agent_id: &str) -> Option<Agent> {
        self.state
            .lock()
            .unwrap()
            .agents
            .get(&key(account_id, agent_id))
            .cloned()
    }

    pub fn attempts(&self, account_id: &str, call_sid: &str) -> Vec<OutboundAttempt> {
        self.state
            .lock()
            .unwrap()
            .attempts
            .get(&key(account_id, call_sid))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl BaseCallStore for InMemoryCallStore {
    async fn find_account(&self, account_id: &str) -> Result<Option<Account>> {
        Ok(self.state.lock().unwrap().accounts.get(account_id).cloned())
    }

    async fn find_account_by_number(&self, number: &str) -> Result<Option<Account>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .accounts
            .values()
            .find(|a| a.twilio_number == number)
            .cloned())
    }

    async fn list_agents(&self, account_id: &str) -> Result<Vec<Agent>> {
        let mut agents: Vec<Agent> = self
            .state
            .lock()
            .unwrap()
            .agents
            .values()
            .filter(|a| a.account_id == account_id)
            .cloned()
            .collect();
        agents.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(agents)
    }

    async fn find_agent(&self, account_id: &str, agent_id: &str) -> Result<Option<Agent>> {
        Ok(self.agent(account_id, agent_id))
    }

    async fn set_agent_availability(
        &self,
        account_id: &str,
        agent_id: &str,
        availability: Availability,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.agents.get_mut(&key(account_id, agent_id)) {
            Some(agent) => {
                agent.status = availability;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_call_if_absent(
        &self,
        account_id: &str,
        call_sid: &str,
        status: CallStatus,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let k = key(account_id, call_sid);
        if state.calls.contains_key(&k) {
            return Ok(false);
        }
        state.calls.insert(k, Call::new(account_id, call_sid, status));
        Ok(true)
    }

    async fn find_call(&self, account_id: &str, call_sid: &str) -> Result<Option<Call>> {
        if self.call_reads_fail.load(Ordering::SeqCst) {
            return Err(anyhow!("call store unavailable"));
        }
        Ok(self.call(account_id, call_sid))
    }

    async fn advance_call_status(
        &self,
        account_id: &str,
        call_sid: &str,
        next: CallStatus,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.calls.get_mut(&key(account_id, call_sid)) {
            Some(call) if call.status.can_transition_to(next) => {
                call.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn claim_agent_joined(
        &self,
        account_id: &str,
        call_sid: &str,
        agent_id: &str,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.calls.get_mut(&key(account_id, call_sid)) {
            Some(call) if !call.agent_joined => {
                call.agent_joined = true;
                call.joined_agent_id = Some(agent_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_attempt(&self, attempt: &OutboundAttempt) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let attempts = state
            .attempts
            .entry(key(&attempt.account_id, &attempt.call_id))
            .or_default();
        if !attempts.iter().any(|a| a.id == attempt.id) {
            attempts.push(attempt.clone());
        }
        Ok(())
    }

    async fn find_attempt(
        &self,
        account_id: &str,
        call_sid: &str,
        leg_sid: &str,
    ) -> Result<Option<OutboundAttempt>> {
        Ok(self
            .attempts(account_id, call_sid)
            .into_iter()
            .find(|a| a.id == leg_sid))
    }

    async fn list_attempts(
        &self,
        account_id: &str,
        call_sid: &str,
    ) -> Result<Vec<OutboundAttempt>> {
        Ok(self.attempts(account_id, call_sid))
    }

    async fn advance_attempt_status(
        &self,
        account_id: &str,
        call_sid: &str,
        leg_sid: &str,
        next: AttemptStatus,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let attempt = state
            .attempts
            .get_mut(&key(account_id, call_sid))
            .and_then(|attempts| attempts.iter_mut().find(|a| a.id == leg_sid));
        match attempt {
            Some(attempt) if attempt.status.can_transition_to(next) => {
                attempt.status = next;
                attempt.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Mock Telephony Client
// =============================================================================

pub struct MockTelephonyClient {
    next_leg: AtomicUsize,
    dials: Mutex<Vec<(String, DialRequest)>>,
    canceled: Mutex<Vec<String>>,
    hung_up: Mutex<Vec<String>>,
    pushed: Mutex<Vec<(String, String)>>,
    failing_numbers: Mutex<HashSet<String>>,
    fail_cancels: Mutex<bool>,
}

impl MockTelephonyClient {
    pub fn new() -> Self {
        Self {
            next_leg: AtomicUsize::new(1),
            dials: Mutex::new(Vec::new()),
            canceled: Mutex::new(Vec::new()),
            hung_up: Mutex::new(Vec::new()),
            pushed: Mutex::new(Vec::new()),
            failing_numbers: Mutex::new(HashSet::new()),
            fail_cancels: Mutex::new(false),
        }
    }

    /// Make every dial to `number` fail
    pub fn fail_dials_to(self, number: &str) -> Self {
        self.failing_numbers
            .lock()
            .unwrap()
            .insert(number.to_string());
        self
    }

    pub fn fail_cancels(self) -> Self {
        *self.fail_cancels.lock().unwrap() = true;
        self
    }

    /// (leg sid, request) for every successful dial, in order
    pub fn dials(&self) -> Vec<(String, DialRequest)> {
        self.dials.lock().unwrap().clone()
    }

    pub fn dialed_numbers(&self) -> Vec<String> {
        self.dials().into_iter().map(|(_, r)| r.to).collect()
    }

    pub fn canceled(&self) -> Vec<String> {
        self.canceled.lock().unwrap().clone()
    }

    pub fn hung_up(&self) -> Vec<String> {
        self.hung_up.lock().unwrap().clone()
    }

    /// (leg sid, rendered TwiML) for every pushed voice document
    pub fn pushed(&self) -> Vec<(String, String)> {
        self.pushed.lock().unwrap().clone()
    }
}

impl Default for MockTelephonyClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseTelephonyClient for MockTelephonyClient {
    async fn dial(&self, request: DialRequest) -> Result<String> {
        if self.failing_numbers.lock().unwrap().contains(&request.to) {
            return Err(anyhow!("dial to {} rejected", request.to));
        }
        let leg_sid = format!("CA-leg-{}", self.next_leg.fetch_add(1, Ordering::SeqCst));
        self.dials.lock().unwrap().push((leg_sid.clone(), request));
        Ok(leg_sid)
    }

    async fn cancel_leg(&self, leg_sid: &str) -> Result<()> {
        if *self.fail_cancels.lock().unwrap() {
            return Err(anyhow!("cancel of {} rejected", leg_sid));
        }
        self.canceled.lock().unwrap().push(leg_sid.to_string());
        Ok(())
    }

    async fn hangup_leg(&self, leg_sid: &str) -> Result<()> {
        self.hung_up.lock().unwrap().push(leg_sid.to_string());
        Ok(())
    }

    async fn push_voice_document(&self, leg_sid: &str, document: &VoiceResponse) -> Result<()> {
        let twiml = document.to_xml()?;
        self.pushed
            .lock()
            .unwrap()
            .push((leg_sid.to_string(), twiml));
        Ok(())
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

pub const TEST_BASE_URL: &str = "https://voice.test";

/// Settings with every wait shrunk to milliseconds
pub fn fast_settings() -> DistributionSettings {
    DistributionSettings {
        caller_join_timeout: Duration::from_millis(200),
        agent_ring_wait: Duration::from_millis(150),
        poll_interval: Duration::from_millis(10),
        ..DistributionSettings::default()
    }
}

pub struct TestDependencies {
    pub store: Arc<InMemoryCallStore>,
    pub telephony: Arc<MockTelephonyClient>,
    pub settings: DistributionSettings,
}

impl TestDependencies {
    pub fn new(store: InMemoryCallStore) -> Self {
        Self {
            store: Arc::new(store),
            telephony: Arc::new(MockTelephonyClient::new()),
            settings: fast_settings(),
        }
    }

    pub fn with_telephony(mut self, telephony: MockTelephonyClient) -> Self {
        self.telephony = Arc::new(telephony);
        self
    }

    pub fn with_settings(mut self, settings: DistributionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn server_deps(&self) -> Arc<ServerDeps> {
        Arc::new(ServerDeps::new(
            self.store.clone(),
            self.telephony.clone(),
            WebhookUrls::new(TEST_BASE_URL).expect("test base url is valid"),
            self.settings.clone(),
        ))
    }
}
