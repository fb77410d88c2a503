use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Public origin the provider reaches our webhooks on (e.g. https://voice.example.org)
    pub public_base_url: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_api_base: Option<String>,
    pub distribution: DistributionSettings,
}

/// Timing and policy knobs for call distribution
#[derive(Debug, Clone)]
pub struct DistributionSettings {
    /// How long admission waits for the caller to show up in the holding conference
    pub caller_join_timeout: Duration,
    /// How long each agent gets to accept before the next agent is dialed
    pub agent_ring_wait: Duration,
    /// Interval at which the call record is re-read while waiting
    pub poll_interval: Duration,
    pub accept_digit: String,
    /// Number of re-prompts an agent gets before the leg is ended
    pub max_prompt_retries: u32,
    /// Rounds over the roster when the account does not set its own
    pub default_max_retries: u32,
    pub gather_timeout_secs: u32,
    pub caller_hold_music_url: Option<String>,
    pub agent_hold_music_url: Option<String>,
}

impl Default for DistributionSettings {
    fn default() -> Self {
        Self {
            caller_join_timeout: Duration::from_secs(20),
            agent_ring_wait: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            accept_digit: "1".to_string(),
            max_prompt_retries: 2,
            default_max_retries: 3,
            gather_timeout_secs: 5,
            caller_hold_music_url: Some(
                "http://twimlets.com/holdmusic?Bucket=com.twilio.music.electronica".to_string(),
            ),
            agent_hold_music_url: Some(
                "http://twimlets.com/holdmusic?Bucket=com.twilio.music.ambient".to_string(),
            ),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .context("PUBLIC_BASE_URL must be set")?
                .trim_end_matches('/')
                .to_string(),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID")
                .context("TWILIO_ACCOUNT_SID must be set")?,
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN")
                .context("TWILIO_AUTH_TOKEN must be set")?,
            twilio_api_base: env::var("TWILIO_API_BASE").ok(),
            distribution: DistributionSettings::from_env()?,
        })
    }
}

impl DistributionSettings {
    /// Read overrides from the environment, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            caller_join_timeout: Duration::from_secs(parse_var(
                "CALLER_JOIN_TIMEOUT_SECS",
                defaults.caller_join_timeout.as_secs(),
            )?),
            agent_ring_wait: Duration::from_secs(parse_var(
                "AGENT_RING_WAIT_SECS",
                defaults.agent_ring_wait.as_secs(),
            )?),
            poll_interval: Duration::from_millis(parse_var(
                "POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )?),
            accept_digit: env::var("ACCEPT_DIGIT").unwrap_or(defaults.accept_digit),
            max_prompt_retries: parse_var("MAX_PROMPT_RETRIES", defaults.max_prompt_retries)?,
            default_max_retries: parse_var("DEFAULT_MAX_RETRIES", defaults.default_max_retries)?,
            gather_timeout_secs: parse_var("GATHER_TIMEOUT_SECS", defaults.gather_timeout_secs)?,
            caller_hold_music_url: env::var("CALLER_HOLD_MUSIC_URL")
                .ok()
                .or(defaults.caller_hold_music_url),
            agent_hold_music_url: env::var("AGENT_HOLD_MUSIC_URL")
                .ok()
                .or(defaults.agent_hold_music_url),
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}
