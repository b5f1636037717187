use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

// CONFIGURATION STRUCTS
// Built once at startup and handed to every component by reference.

pub const DEFAULT_TICKERS: &[&str] = &["TSLA", "MSFT", "AAPL", "NVDA", "CELH"];
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Serialize, Debug, Clone)]
pub struct TelegramConfig {
    #[serde(skip_serializing)]
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String, // e.g., "https://api.telegram.org"
}

#[derive(Serialize, Debug, Clone)]
pub struct MonitorConfig {
    pub tickers: Vec<String>,
    pub lookback_days: u32, // e.g., 60 days of history
    pub interval: String,   // e.g., "1h", "1d"
    pub ma_window: usize,   // e.g., 150 samples
    pub ticker_delay: Duration,
    pub cycle_delay: Duration,
    pub chart_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tickers: DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
            lookback_days: 60,
            interval: "1h".to_string(),
            ma_window: 150,
            ticker_delay: Duration::from_secs(5),
            cycle_delay: Duration::from_secs(3600),
            chart_dir: PathBuf::from("."),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub monitor: MonitorConfig,
}

impl AppConfig {
    /// Loads `.env` from the working directory (if present) and builds the
    /// configuration from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env file loaded: {}", e);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        let chat_id = lookup("TELEGRAM_CHAT_ID").unwrap_or_default();

        // Credentials are not validated, sends will simply be rejected upstream.
        if bot_token.is_empty() {
            log::warn!("TELEGRAM_BOT_TOKEN is not set, notifications will fail");
        }
        if chat_id.is_empty() {
            log::warn!("TELEGRAM_CHAT_ID is not set, notifications will fail");
        }

        let mut monitor = MonitorConfig::default();

        if let Some(raw) = lookup("MONITOR_TICKERS") {
            let tickers = parse_tickers(&raw);
            if !tickers.is_empty() {
                monitor.tickers = tickers;
            }
        }

        if let Some(raw) = lookup("MONITOR_CYCLE_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("MONITOR_CYCLE_SECS must be a number of seconds, got {:?}", raw))?;
            monitor.cycle_delay = Duration::from_secs(secs);
        }

        Ok(Self {
            telegram: TelegramConfig {
                bot_token,
                chat_id,
                api_base: TELEGRAM_API_BASE.to_string(),
            },
            monitor,
        })
    }
}

fn parse_tickers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_setup() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        let monitor = &config.monitor;

        assert_eq!(monitor.tickers, vec!["TSLA", "MSFT", "AAPL", "NVDA", "CELH"]);
        assert_eq!(monitor.lookback_days, 60);
        assert_eq!(monitor.interval, "1h");
        assert_eq!(monitor.ma_window, 150);
        assert_eq!(monitor.ticker_delay, Duration::from_secs(5));
        assert_eq!(monitor.cycle_delay, Duration::from_secs(3600));
        assert_eq!(monitor.chart_dir, PathBuf::from("."));
        assert_eq!(config.telegram.api_base, TELEGRAM_API_BASE);
    }

    #[test]
    fn missing_credentials_are_not_fatal() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.telegram.bot_token.is_empty());
        assert!(config.telegram.chat_id.is_empty());
    }

    #[test]
    fn reads_credentials_and_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_CHAT_ID", "-10042"),
            ("MONITOR_TICKERS", " amd, ,googl ,"),
            ("MONITOR_CYCLE_SECS", "900"),
        ]))
        .unwrap();

        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.chat_id, "-10042");
        assert_eq!(config.monitor.tickers, vec!["AMD", "GOOGL"]);
        assert_eq!(config.monitor.cycle_delay, Duration::from_secs(900));
    }

    #[test]
    fn blank_ticker_override_keeps_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("MONITOR_TICKERS", " , ")])).unwrap();
        assert_eq!(config.monitor.tickers.len(), DEFAULT_TICKERS.len());
    }

    #[test]
    fn rejects_non_numeric_cycle() {
        let err = AppConfig::from_lookup(lookup_from(&[("MONITOR_CYCLE_SECS", "hourly")]));
        assert!(err.is_err());
    }

    #[test]
    fn token_is_not_serialized() {
        let config = AppConfig::from_lookup(lookup_from(&[("TELEGRAM_BOT_TOKEN", "secret")])).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
