use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::UnknownStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    InConference,
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Availability::Available => write!(f, "available"),
            Availability::InConference => write!(f, "in_conference"),
        }
    }
}

impl std::str::FromStr for Availability {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Availability::Available),
            "in_conference" => Ok(Availability::InConference),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for Availability {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Person on an account's roster. `priority` defines dialing order (lowest first).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Agent {
    pub account_id: String,
    pub id: String,
    pub phone_number: String,
    pub priority: i32,
    #[sqlx(try_from = "String")]
    pub status: Availability,
}

impl Agent {
    pub fn is_available(&self) -> bool {
        self.status == Availability::Available
    }

    /// Roster ordered by priority, ties broken by id so the order is stable
    pub async fn list_for_account(account_id: &str, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM agents WHERE account_id = $1 ORDER BY priority ASC, id ASC",
        )
        .bind(account_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find(account_id: &str, agent_id: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM agents WHERE account_id = $1 AND id = $2")
            .bind(account_id)
            .bind(agent_id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Returns false when the agent does not exist
    pub async fn set_availability(
        account_id: &str,
        agent_id: &str,
        availability: Availability,
        pool: &PgPool,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE agents SET status = $3 WHERE account_id = $1 AND id = $2")
                .bind(account_id)
                .bind(agent_id)
                .bind(availability.to_string())
                .execute(pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }
}
