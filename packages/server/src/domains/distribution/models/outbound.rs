use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::UnknownStatus;

/// Status of one dialed agent leg, mirrored from provider status callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptStatus {
    Initiated,
    Ringing,
    Answered,
    Completed,
    NoAnswer,
    Busy,
    Failed,
    Canceled,
}

impl AttemptStatus {
    pub const ALL: [AttemptStatus; 8] = [
        AttemptStatus::Initiated,
        AttemptStatus::Ringing,
        AttemptStatus::Answered,
        AttemptStatus::Completed,
        AttemptStatus::NoAnswer,
        AttemptStatus::Busy,
        AttemptStatus::Failed,
        AttemptStatus::Canceled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AttemptStatus::Completed
                | AttemptStatus::NoAnswer
                | AttemptStatus::Busy
                | AttemptStatus::Failed
                | AttemptStatus::Canceled
        )
    }

    fn rank(self) -> u8 {
        match self {
            AttemptStatus::Initiated => 0,
            AttemptStatus::Ringing => 1,
            AttemptStatus::Answered => 2,
            _ => 3,
        }
    }

    /// Terminal states never change; otherwise only forward moves are accepted
    pub fn can_transition_to(self, next: AttemptStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn predecessors(next: AttemptStatus) -> Vec<AttemptStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }

    /// Map a provider `CallStatus` value. `None` for values with no counterpart.
    pub fn from_provider(status: &str) -> Option<Self> {
        match status {
            "queued" | "initiated" => Some(AttemptStatus::Initiated),
            "ringing" => Some(AttemptStatus::Ringing),
            "in-progress" | "answered" => Some(AttemptStatus::Answered),
            "completed" => Some(AttemptStatus::Completed),
            "no-answer" => Some(AttemptStatus::NoAnswer),
            "busy" => Some(AttemptStatus::Busy),
            "failed" => Some(AttemptStatus::Failed),
            "canceled" => Some(AttemptStatus::Canceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttemptStatus::Initiated => "initiated",
            AttemptStatus::Ringing => "ringing",
            AttemptStatus::Answered => "answered",
            AttemptStatus::Completed => "completed",
            AttemptStatus::NoAnswer => "no-answer",
            AttemptStatus::Busy => "busy",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Canceled => "canceled",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for AttemptStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.to_string() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl TryFrom<String> for AttemptStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One outbound leg placed to an agent on behalf of a call. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboundAttempt {
    pub account_id: String,
    pub call_id: String,
    /// Provider call sid of the agent leg
    pub id: String,
    pub to_number: String,
    pub agent_id: String,
    #[sqlx(try_from = "String")]
    pub status: AttemptStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutboundAttempt {
    pub fn initiated(
        account_id: &str,
        call_sid: &str,
        leg_sid: &str,
        to_number: &str,
        agent_id: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            account_id: account_id.to_string(),
            call_id: call_sid.to_string(),
            id: leg_sid.to_string(),
            to_number: to_number.to_string(),
            agent_id: agent_id.to_string(),
            status: AttemptStatus::Initiated,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<()> {
        sqlx::query(
            "INSERT INTO outbound_attempts
                (account_id, call_id, id, to_number, agent_id, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (account_id, call_id, id) DO NOTHING",
        )
        .bind(&self.account_id)
        .bind(&self.call_id)
        .bind(&self.id)
        .bind(&self.to_number)
        .bind(&self.agent_id)
        .bind(self.status.to_string())
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn find(
        account_id: &str,
        call_sid: &str,
        leg_sid: &str,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM outbound_attempts WHERE account_id = $1 AND call_id = $2 AND id = $3",
        )
        .bind(account_id)
        .bind(call_sid)
        .bind(leg_sid)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn list_for_call(
        account_id: &str,
        call_sid: &str,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM outbound_attempts
             WHERE account_id = $1 AND call_id = $2
             ORDER BY created_at ASC",
        )
        .bind(account_id)
        .bind(call_sid)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Apply `next` if the transition table allows it. Returns true if the row changed.
    pub async fn advance_status(
        account_id: &str,
        call_sid: &str,
        leg_sid: &str,
        next: AttemptStatus,
        pool: &PgPool,
    ) -> Result<bool> {
        let allowed: Vec<String> = AttemptStatus::predecessors(next)
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let result = sqlx::query(
            "UPDATE outbound_attempts SET status = $4, updated_at = now()
             WHERE account_id = $1 AND call_id = $2 AND id = $3 AND status = ANY($5)",
        )
        .bind(account_id)
        .bind(call_sid)
        .bind(leg_sid)
        .bind(next.to_string())
        .bind(&allowed)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
