use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::UnknownStatus;

/// Prefix of every holding conference; the suffix is the caller leg's call sid
pub const ROOM_PREFIX: &str = "conf-";

/// Lifecycle of an inbound caller session.
///
/// Moves forward only (`waiting` → `initiated` → `connected`); `caller_left`
/// is reachable from every state and is never left again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Waiting,
    Initiated,
    Connected,
    CallerLeft,
}

impl CallStatus {
    pub const ALL: [CallStatus; 4] = [
        CallStatus::Waiting,
        CallStatus::Initiated,
        CallStatus::Connected,
        CallStatus::CallerLeft,
    ];

    fn rank(self) -> u8 {
        match self {
            CallStatus::Waiting => 0,
            CallStatus::Initiated => 1,
            CallStatus::Connected => 2,
            CallStatus::CallerLeft => 3,
        }
    }

    pub fn can_transition_to(self, next: CallStatus) -> bool {
        match (self, next) {
            (CallStatus::CallerLeft, _) => false,
            (_, CallStatus::CallerLeft) => true,
            (current, next) => next.rank() > current.rank(),
        }
    }

    /// States from which `next` may be entered
    pub fn predecessors(next: CallStatus) -> Vec<CallStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallStatus::Waiting => write!(f, "waiting"),
            CallStatus::Initiated => write!(f, "initiated"),
            CallStatus::Connected => write!(f, "connected"),
            CallStatus::CallerLeft => write!(f, "caller_left"),
        }
    }
}

impl std::str::FromStr for CallStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(CallStatus::Waiting),
            "initiated" => Ok(CallStatus::Initiated),
            "connected" => Ok(CallStatus::Connected),
            "caller_left" => Ok(CallStatus::CallerLeft),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for CallStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One inbound caller session, keyed by the caller leg's call sid
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Call {
    pub account_id: String,
    pub id: String,
    #[sqlx(try_from = "String")]
    pub status: CallStatus,
    pub agent_joined: bool,
    /// Agent that won the call, set together with `agent_joined`
    pub joined_agent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Call {
    pub fn new(account_id: &str, call_sid: &str, status: CallStatus) -> Self {
        Self {
            account_id: account_id.to_string(),
            id: call_sid.to_string(),
            status,
            agent_joined: false,
            joined_agent_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn room_for(call_sid: &str) -> String {
        format!("{}{}", ROOM_PREFIX, call_sid)
    }

    /// Recover the caller leg sid from a conference room name
    pub fn sid_from_room(room: &str) -> Option<&str> {
        room.strip_prefix(ROOM_PREFIX).filter(|sid| !sid.is_empty())
    }

    pub fn caller_left(&self) -> bool {
        self.status == CallStatus::CallerLeft
    }

    pub async fn find(account_id: &str, call_sid: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM calls WHERE account_id = $1 AND id = $2")
            .bind(account_id)
            .bind(call_sid)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Insert unless a record for this call sid already exists. Returns true if inserted.
    pub async fn insert_if_absent(&self, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO calls (account_id, id, status, agent_joined, created_at)
             VALUES ($1, $2, $3, false, $4)
             ON CONFLICT (account_id, id) DO NOTHING",
        )
        .bind(&self.account_id)
        .bind(&self.id)
        .bind(self.status.to_string())
        .bind(self.created_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Move to `next` if the current status allows it. Returns true if the row changed.
    pub async fn advance_status(
        account_id: &str,
        call_sid: &str,
        next: CallStatus,
        pool: &PgPool,
    ) -> Result<bool> {
        let allowed: Vec<String> = CallStatus::predecessors(next)
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let result = sqlx::query(
            "UPDATE calls SET status = $3
             WHERE account_id = $1 AND id = $2 AND status = ANY($4)",
        )
        .bind(account_id)
        .bind(call_sid)
        .bind(next.to_string())
        .bind(&allowed)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Set "an agent has joined" for the first claimant only
    pub async fn claim_agent_joined(
        account_id: &str,
        call_sid: &str,
        agent_id: &str,
        pool: &PgPool,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE calls SET agent_joined = true, joined_agent_id = $3
             WHERE account_id = $1 AND id = $2 AND agent_joined = false",
        )
        .bind(account_id)
        .bind(call_sid)
        .bind(agent_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_moves_forward() {
        assert!(CallStatus::Waiting.can_transition_to(CallStatus::Initiated));
        assert!(CallStatus::Waiting.can_transition_to(CallStatus::Connected));
        assert!(CallStatus::Initiated.can_transition_to(CallStatus::Connected));
        assert!(!CallStatus::Connected.can_transition_to(CallStatus::Initiated));
        assert!(!CallStatus::Connected.can_transition_to(CallStatus::Connected));
    }

    #[test]
    fn caller_left_is_a_sink() {
        for status in CallStatus::ALL {
            assert!(!CallStatus::CallerLeft.can_transition_to(status));
        }
        assert!(CallStatus::Waiting.can_transition_to(CallStatus::CallerLeft));
        assert!(CallStatus::Connected.can_transition_to(CallStatus::CallerLeft));
        assert_eq!(
            CallStatus::predecessors(CallStatus::CallerLeft),
            vec![CallStatus::Waiting, CallStatus::Initiated, CallStatus::Connected]
        );
    }

    #[test]
    fn room_name_round_trips_sid() {
        assert_eq!(Call::room_for("CA123"), "conf-CA123");
        assert_eq!(Call::sid_from_room("conf-CA123"), Some("CA123"));
        assert_eq!(Call::sid_from_room("conf-"), None);
        assert_eq!(Call::sid_from_room("lobby"), None);
    }
}
