use dotenv::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub commit_max_attempts: u32,
    pub commit_backoff_ms: u64,
    pub leaderboard_cache_ttl_secs: u64,
    pub default_page_size: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            commit_max_attempts: parse_var("TALLY_COMMIT_MAX_ATTEMPTS", 5),
            commit_backoff_ms: parse_var("TALLY_COMMIT_BACKOFF_MS", 10),
            leaderboard_cache_ttl_secs: parse_var("TALLY_LEADERBOARD_CACHE_TTL_SECS", 60),
            default_page_size: parse_var("TALLY_DEFAULT_PAGE_SIZE", 100),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

/// Tunables the service is constructed with.
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    /// Attempts per operation when commits hit a concurrent writer; at least 1.
    pub commit_max_attempts: u32,
    /// Backoff before the second attempt; doubles on each further attempt.
    pub commit_backoff: Duration,
    pub leaderboard_cache_ttl: Duration,
    pub default_page_size: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            commit_max_attempts: 5,
            commit_backoff: Duration::from_millis(10),
            leaderboard_cache_ttl: Duration::from_secs(60),
            default_page_size: 100,
        }
    }
}

impl From<&Config> for LedgerSettings {
    fn from(config: &Config) -> Self {
        LedgerSettings {
            commit_max_attempts: config.commit_max_attempts.max(1),
            commit_backoff: Duration::from_millis(config.commit_backoff_ms),
            leaderboard_cache_ttl: Duration::from_secs(config.leaderboard_cache_ttl_secs),
            default_page_size: config.default_page_size.max(1),
        }
    }
}
