use crate::error::{Error, Result};
use chrono_tz::Tz;
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub telegram_bot_token: String,
    /// IANA zone all wall-clock decisions are made in.
    pub timezone: Tz,
    pub birthday_today_at: (u32, u32),
    pub birthday_upcoming_at: (u32, u32),
    pub birthday_upcoming_days: u64,
    pub interview_lead_minutes: i64,
    pub reminder_window_secs: i64,
    pub poll_interval_secs: u64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let timezone: Tz = env::var("APP_TZ")
            .unwrap_or_else(|_| "Europe/Kyiv".to_string())
            .parse()
            .map_err(|e| Error::Config(format!("Invalid APP_TZ: {}", e)))?;

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            telegram_bot_token: get_env("TELEGRAM_BOT_TOKEN")?,
            timezone,
            birthday_today_at: get_trigger_time("BIRTHDAY_TODAY_AT", (9, 0))?,
            birthday_upcoming_at: get_trigger_time("BIRTHDAY_UPCOMING_AT", (12, 0))?,
            birthday_upcoming_days: get_env_or("BIRTHDAY_UPCOMING_DAYS", 7)?,
            interview_lead_minutes: get_env_or("INTERVIEW_LEAD_MINUTES", 60)?,
            reminder_window_secs: get_env_or("REMINDER_WINDOW_SECS", 45)?,
            poll_interval_secs: get_env_or("POLL_INTERVAL_SECS", 30)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

/// "HH:MM" trigger times for the daily jobs.
fn get_trigger_time(name: &str, default: (u32, u32)) -> Result<(u32, u32)> {
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };
    parse_trigger_time(&raw).ok_or_else(|| {
        Error::Config(format!("Invalid value for {}: expected HH:MM, got {}", name, raw))
    })
}

fn parse_trigger_time(raw: &str) -> Option<(u32, u32)> {
    let (h, m) = raw.split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_time_parsing() {
        assert_eq!(parse_trigger_time("09:00"), Some((9, 0)));
        assert_eq!(parse_trigger_time("23:59"), Some((23, 59)));
        assert_eq!(parse_trigger_time("24:00"), None);
        assert_eq!(parse_trigger_time("12:60"), None);
        assert_eq!(parse_trigger_time("noon"), None);
    }
}
