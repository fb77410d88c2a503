use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Tenant owning an inbound line and an agent roster. Read-only to distribution.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: String,
    pub name: Option<String>,
    /// Inbound line in E.164 form, exactly as the provider reports it in `To`
    pub twilio_number: String,
    pub max_retries: Option<i32>,
}

impl Account {
    /// Rounds over the roster; negative values are treated as zero
    pub fn rounds(&self, default: u32) -> u32 {
        self.max_retries
            .map(|n| n.max(0) as u32)
            .unwrap_or(default)
    }

    pub async fn find_by_id(id: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_number(number: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM accounts WHERE twilio_number = $1 LIMIT 1")
            .bind(number)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }
}
