use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Runtime settings, loaded from CLI flags or `LOGSTREAM_*` environment
/// variables (flags win).
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Centralized log collector and search service", long_about = None)]
pub struct Settings {
    /// Admin API key required in the X-Admin-Key header (empty = open access)
    #[arg(long, env = "LOGSTREAM_ADMIN_KEY", default_value = "")]
    pub admin_key: String,

    /// SQLite database file path
    #[arg(long, env = "LOGSTREAM_DB_PATH", default_value = "/data/logstream.db")]
    pub db_path: PathBuf,

    /// Delete log entries older than this many days
    #[arg(long, env = "LOGSTREAM_LOG_RETENTION_DAYS", default_value = "7")]
    pub log_retention_days: i64,

    /// Aggressively purge when the database file exceeds this size
    #[arg(long, env = "LOGSTREAM_MAX_DB_SIZE_MB", default_value = "2048")]
    pub max_db_size_mb: u64,

    /// Retention loop period in seconds
    #[arg(long, env = "LOGSTREAM_RETENTION_CHECK_INTERVAL_SECONDS", default_value = "3600")]
    pub retention_check_interval_seconds: u64,

    /// Per-subscriber SSE delivery cap, lines per second
    #[arg(long, env = "LOGSTREAM_SSE_MAX_LINES_PER_SECOND", default_value = "50")]
    pub sse_max_lines_per_second: u32,

    /// Comma-separated extra secret scrub regexes
    #[arg(long, env = "LOGSTREAM_EXTRA_SCRUB_PATTERNS", default_value = "")]
    pub extra_scrub_patterns: String,

    /// Container inventory poll period in seconds
    #[arg(long, env = "LOGSTREAM_CONTAINER_POLL_INTERVAL_SECONDS", default_value = "10")]
    pub container_poll_interval_seconds: u64,

    /// HTTP listen port
    #[arg(long, env = "LOGSTREAM_HTTP_PORT", default_value = "8080")]
    pub http_port: u16,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Self::parse();
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_retention_days < 1 {
            return Err(ConfigError::InvalidConfig(
                "LOG_RETENTION_DAYS must be at least 1".to_string(),
            ));
        }
        if self.max_db_size_mb < 1 {
            return Err(ConfigError::InvalidConfig(
                "MAX_DB_SIZE_MB must be at least 1".to_string(),
            ));
        }
        if self.retention_check_interval_seconds < 1 {
            return Err(ConfigError::InvalidConfig(
                "RETENTION_CHECK_INTERVAL_SECONDS must be at least 1".to_string(),
            ));
        }
        if self.sse_max_lines_per_second < 1 {
            return Err(ConfigError::InvalidConfig(
                "SSE_MAX_LINES_PER_SECOND must be at least 1".to_string(),
            ));
        }
        if self.container_poll_interval_seconds < 1 {
            return Err(ConfigError::InvalidConfig(
                "CONTAINER_POLL_INTERVAL_SECONDS must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.retention_check_interval_seconds)
    }

    #[must_use]
    pub fn container_poll_interval(&self) -> Duration {
        Duration::from_secs(self.container_poll_interval_seconds)
    }

    /// Delay between delivered SSE events for one subscriber.
    #[must_use]
    pub fn sse_pace(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.sse_max_lines_per_second))
    }

    #[must_use]
    pub fn max_db_size_bytes(&self) -> u64 {
        self.max_db_size_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Settings {
        Settings {
            admin_key: String::new(),
            db_path: PathBuf::from("/tmp/test.db"),
            log_retention_days: 7,
            max_db_size_mb: 2048,
            retention_check_interval_seconds: 3600,
            sse_max_lines_per_second: 50,
            extra_scrub_patterns: String::new(),
            container_poll_interval_seconds: 10,
            http_port: 8080,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_zero_retention_days_rejected() {
        let mut settings = base();
        settings.log_retention_days = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_sse_rate_rejected() {
        let mut settings = base();
        settings.sse_max_lines_per_second = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_sse_pace() {
        let mut settings = base();
        settings.sse_max_lines_per_second = 50;
        assert_eq!(settings.sse_pace(), Duration::from_millis(20));
    }
}
