use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Reminders are disabled when unset.
    pub telegram_token: Option<String>,
    pub telegram_api_url: String,
    pub reminder_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("HABITS_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("HABITS_JWT_SECRET is unset or still a placeholder");
        }

        let port: u16 = lookup("HABITS_PORT")
            .unwrap_or_else(|| "8000".into())
            .parse()
            .context("HABITS_PORT must be a port number")?;

        let interval_secs: u64 = lookup("HABITS_REMINDER_INTERVAL_SECS")
            .unwrap_or_else(|| "60".into())
            .parse()
            .context("HABITS_REMINDER_INTERVAL_SECS must be a whole number of seconds")?;
        if interval_secs == 0 {
            bail!("HABITS_REMINDER_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            jwt_secret,
            db_path: lookup("HABITS_DB_PATH").unwrap_or_else(|| "habits.db".into()).into(),
            host: lookup("HABITS_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            telegram_token: lookup("TELEGRAM_TOKEN").filter(|t| !t.is_empty()),
            telegram_api_url: lookup("TELEGRAM_API_URL")
                .unwrap_or_else(|| habit_reminders::telegram::DEFAULT_API_URL.into()),
            reminder_interval: Duration::from_secs(interval_secs),
        })
    }
}
