use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_NUM_USERS: u64 = 100_000;
pub const DEFAULT_MESSAGES_PER_USER: u64 = 2;
pub const DEFAULT_REPORT_INTERVAL_MS: u64 = 5_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid number of users {0:?}: expected a positive integer")]
    InvalidUserCount(String),
    #[error("messages per user must be positive")]
    ZeroMessagesPerUser,
    #[error("report interval must be positive")]
    ZeroReportInterval,
    #[error("max in-flight cap must be positive")]
    ZeroMaxInFlight,
    #[error("endpoint URL is empty")]
    EmptyEndpoint,
}

/// Parse the positional user count. Missing means the default.
/// The whole argument must be a positive integer: `"12abc"` and `"1.5"` are
/// rejected rather than truncated.
pub fn parse_user_count(arg: Option<&str>) -> Result<u64, ConfigError> {
    let Some(raw) = arg else {
        return Ok(DEFAULT_NUM_USERS);
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidUserCount(raw.to_string())),
    }
}

/// Immutable parameters of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub num_users: u64,
    pub messages_per_user: u64,
    /// Base URL of the message store; `/message` is appended.
    pub endpoint_url: String,
    /// Per-request timeout. None leaves requests unbounded.
    pub request_timeout_ms: Option<u64>,
    /// Optional cap on simultaneous sends. None fires everything at once.
    pub max_in_flight: Option<usize>,
    pub report_interval_ms: u64,
    /// Seed for template selection; addressing never depends on it.
    pub seed: Option<u64>,
}

impl SimulationConfig {
    pub fn new(num_users: u64) -> Self {
        Self {
            num_users,
            messages_per_user: DEFAULT_MESSAGES_PER_USER,
            endpoint_url: DEFAULT_API_URL.to_string(),
            request_timeout_ms: None,
            max_in_flight: None,
            report_interval_ms: DEFAULT_REPORT_INTERVAL_MS,
            seed: None,
        }
    }

    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = url.into();
        self
    }

    pub fn with_messages_per_user(mut self, n: u64) -> Self {
        self.messages_per_user = n;
        self
    }

    pub fn with_max_in_flight(mut self, cap: Option<usize>) -> Self {
        self.max_in_flight = cap;
        self
    }

    pub fn with_report_interval_ms(mut self, ms: u64) -> Self {
        self.report_interval_ms = ms;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_request_timeout_ms(mut self, ms: Option<u64>) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    pub fn total_messages(&self) -> u64 {
        self.num_users.saturating_mul(self.messages_per_user)
    }

    /// Highest number of sends that can be in flight at once.
    pub fn peak_concurrency(&self) -> u64 {
        match self.max_in_flight {
            Some(cap) => (cap as u64).min(self.total_messages()),
            None => self.total_messages(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_users == 0 {
            return Err(ConfigError::InvalidUserCount("0".into()));
        }
        if self.messages_per_user == 0 {
            return Err(ConfigError::ZeroMessagesPerUser);
        }
        if self.report_interval_ms == 0 {
            return Err(ConfigError::ZeroReportInterval);
        }
        if self.max_in_flight == Some(0) {
            return Err(ConfigError::ZeroMaxInFlight);
        }
        if self.endpoint_url.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        Ok(())
    }
}

/// Optional TOML file; every field overrides the built-in default and is
/// itself overridden by explicit command-line flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationFile {
    pub num_users: Option<u64>,
    pub messages_per_user: Option<u64>,
    pub endpoint_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub max_in_flight: Option<usize>,
    pub report_interval_ms: Option<u64>,
    pub seed: Option<u64>,
}

impl SimulationFile {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let file: SimulationFile = toml::from_str(&contents)?;
        Ok(file)
    }

    pub fn apply(&self, mut config: SimulationConfig) -> SimulationConfig {
        if let Some(n) = self.num_users {
            config.num_users = n;
        }
        if let Some(n) = self.messages_per_user {
            config.messages_per_user = n;
        }
        if let Some(url) = &self.endpoint_url {
            config.endpoint_url = url.clone();
        }
        if self.request_timeout_ms.is_some() {
            config.request_timeout_ms = self.request_timeout_ms;
        }
        if self.max_in_flight.is_some() {
            config.max_in_flight = self.max_in_flight;
        }
        if let Some(ms) = self.report_interval_ms {
            config.report_interval_ms = ms;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config
    }
}
