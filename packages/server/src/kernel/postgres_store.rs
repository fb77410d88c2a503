//! Postgres-backed call record store

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::domains::distribution::models::{
    Account, Agent, AttemptStatus, Availability, Call, CallStatus, OutboundAttempt,
};
use crate::kernel::BaseCallStore;

#[derive(Clone)]
pub struct PostgresCallStore {
    pool: PgPool,
}

impl PostgresCallStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BaseCallStore for PostgresCallStore {
    async fn find_account(&self, account_id: &str) -> Result<Option<Account>> {
        Account::find_by_id(account_id, &self.pool).await
    }

    async fn find_account_by_number(&self, number: &str) -> Result<Option<Account>> {
        Account::find_by_number(number, &self.pool).await
    }

    async fn list_agents(&self, account_id: &str) -> Result<Vec<Agent>> {
        Agent::list_for_account(account_id, &self.pool).await
    }

    async fn find_agent(&self, account_id: &str, agent_id: &str) -> Result<Option<Agent>> {
        Agent::find(account_id, agent_id, &self.pool).await
    }

    async fn set_agent_availability(
        &self,
        account_id: &str,
        agent_id: &str,
        availability: Availability,
    ) -> Result<bool> {
        Agent::set_availability(account_id, agent_id, availability, &self.pool).await
    }

    async fn create_call_if_absent(
        &self,
        account_id: &str,
        call_sid: &str,
        status: CallStatus,
    ) -> Result<bool> {
        Call::new(account_id, call_sid, status)
            .insert_if_absent(&self.pool)
            .await
    }

    async fn find_call(&self, account_id: &str, call_sid: &str) -> Result<Option<Call>> {
        Call::find(account_id, call_sid, &self.pool).await
    }

    async fn advance_call_status(
        &self,
        account_id: &str,
        call_sid: &str,
        next: CallStatus,
    ) -> Result<bool> {
        Call::advance_status(account_id, call_sid, next, &self.pool).await
    }

    async fn claim_agent_joined(
        &self,
        account_id: &str,
        call_sid: &str,
        agent_id: &str,
    ) -> Result<bool> {
        Call::claim_agent_joined(account_id, call_sid, agent_id, &self.pool).await
    }

    async fn record_attempt(&self, attempt: &OutboundAttempt) -> Result<()> {
        attempt.insert(&self.pool).await
    }

    async fn find_attempt(
        &self,
        account_id: &str,
        call_sid: &str,
        leg_sid: &str,
    ) -> Result<Option<OutboundAttempt>> {
        OutboundAttempt::find(account_id, call_sid, leg_sid, &self.pool).await
    }

    async fn list_attempts(
        &self,
        account_id: &str,
        call_sid: &str,
    ) -> Result<Vec<OutboundAttempt>> {
        OutboundAttempt::list_for_call(account_id, call_sid, &self.pool).await
    }

    async fn advance_attempt_status(
        &self,
        account_id: &str,
        call_sid: &str,
        leg_sid: &str,
        next: AttemptStatus,
    ) -> Result<bool> {
        OutboundAttempt::advance_status(account_id, call_sid, leg_sid, next, &self.pool).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
