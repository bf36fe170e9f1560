use std::env;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub test_before_acquire: bool,
}

/// Results feed and settlement cycle configuration
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    pub results_url: String,
    pub results_api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub fetch_retries: u32,
    pub interval_secs: u64,
    pub max_concurrency: usize,
    pub audit_log_dir: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub settlement: SettlementConfig,
    pub log_level: String,
    pub log_format: String,
    pub environment: String,
}

/// Shortest accepted cycle period; the feed provider rate-limits below this.
const MIN_INTERVAL_SECS: u64 = 10;

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = parse_var::<u32>("DATABASE_MAX_CONNECTIONS").unwrap_or(10);
        let acquire_timeout_secs = parse_var::<u64>("DATABASE_ACQUIRE_TIMEOUT_SECS").unwrap_or(30);
        let idle_timeout_secs = parse_var::<u64>("DATABASE_IDLE_TIMEOUT_SECS").unwrap_or(600); // 10 minutes
        let max_lifetime_secs = parse_var::<u64>("DATABASE_MAX_LIFETIME_SECS").unwrap_or(1800); // 30 minutes
        let test_before_acquire = parse_var::<bool>("DATABASE_TEST_BEFORE_ACQUIRE").unwrap_or(true);

        let config = Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
            test_before_acquire,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if self.acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Get idle timeout as Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/settlement".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            test_before_acquire: true,
        }
    }
}

impl SettlementConfig {
    /// Create settlement config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let results_url = env::var("RESULTS_API_URL")
            .map_err(|_| "RESULTS_API_URL environment variable is required")?;

        let results_api_key = env::var("RESULTS_API_KEY").ok().filter(|k| !k.is_empty());

        let defaults = Self::default();
        let config = Self {
            results_url,
            results_api_key,
            request_timeout_secs: parse_var("RESULTS_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),
            fetch_retries: parse_var("RESULTS_FETCH_RETRIES").unwrap_or(defaults.fetch_retries),
            interval_secs: parse_var("SETTLEMENT_INTERVAL_SECS").unwrap_or(defaults.interval_secs),
            max_concurrency: parse_var("SETTLEMENT_MAX_CONCURRENCY")
                .unwrap_or(defaults.max_concurrency),
            audit_log_dir: env::var("AUDIT_LOG_DIR").unwrap_or(defaults.audit_log_dir),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.results_url.starts_with("http://") && !self.results_url.starts_with("https://") {
            return Err(format!("Invalid RESULTS_API_URL: {}", self.results_url));
        }

        if self.request_timeout_secs == 0 {
            return Err("RESULTS_TIMEOUT_SECS must be greater than 0".to_string());
        }

        if self.interval_secs < MIN_INTERVAL_SECS {
            return Err(format!(
                "SETTLEMENT_INTERVAL_SECS must be at least {}",
                MIN_INTERVAL_SECS
            ));
        }

        if self.max_concurrency == 0 {
            return Err("SETTLEMENT_MAX_CONCURRENCY must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get cycle interval as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Get per-request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            results_url: "http://localhost:8080/v3/results".to_string(),
            results_api_key: None,
            request_timeout_secs: 15,
            fetch_retries: 2,
            interval_secs: 300,
            max_concurrency: 8,
            audit_log_dir: "./logs".to_string(),
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;
        let settlement = SettlementConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string());

        let log_format = env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "text".to_string());

        let environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string());

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        let valid_log_formats = ["text", "json"];
        if !valid_log_formats.contains(&log_format.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_FORMAT: {}. Must be one of: {:?}",
                log_format, valid_log_formats
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        Ok(Self {
            database,
            settlement,
            log_level: log_level.to_lowercase(),
            log_format: log_format.to_lowercase(),
            environment: environment.to_lowercase(),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            settlement: SettlementConfig::default(),
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            environment: "development".to_string(),
        }
    }
}
