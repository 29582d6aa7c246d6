//! Configuration for a ticket sale run and its JSON persistence

use crate::{Error, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Upper bound on concurrently running customers
pub const MAX_CUSTOMERS: u64 = 1024;

fn default_customer_count() -> u32 {
    2
}

fn default_retrieval_amount() -> u32 {
    1
}

/// Ticket sale configuration
///
/// Field names on disk follow the legacy document layout, so files written
/// by older front-ends load unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Lifetime cap on released tickets
    #[serde(rename = "maxTicketCapacity")]
    pub max_ticket_capacity: u32,

    /// Tickets the vendor tries to release per batch
    #[serde(rename = "totalTicketCapacity")]
    pub release_batch_size: u32,

    /// Pause between vendor releases, in milliseconds
    #[serde(rename = "ticketReleaseRate")]
    pub release_interval_ms: u64,

    /// Pause between customer retrieval attempts, in milliseconds
    #[serde(rename = "ticketRetrievalRate")]
    pub retrieval_interval_ms: u64,

    /// Number of customer threads
    #[serde(rename = "customerCount", default = "default_customer_count")]
    pub customer_count: u32,

    /// Tickets each customer asks for per attempt
    #[serde(rename = "retrievalAmount", default = "default_retrieval_amount")]
    pub retrieval_amount: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_ticket_capacity: 100,
            release_batch_size: 10,
            release_interval_ms: 500,
            retrieval_interval_ms: 1000,
            customer_count: default_customer_count(),
            retrieval_amount: default_retrieval_amount(),
        }
    }
}

impl Config {
    /// Check every field against the default rule set
    pub fn validate(&self) -> Result<()> {
        ConfigValidator::default().validate(self)
    }

    pub fn release_interval(&self) -> Duration {
        Duration::from_millis(self.release_interval_ms)
    }

    pub fn retrieval_interval(&self) -> Duration {
        Duration::from_millis(self.retrieval_interval_ms)
    }

    /// Look up a field by its on-disk key
    pub fn get(&self, key: &str) -> Option<u64> {
        match key {
            "maxTicketCapacity" => Some(self.max_ticket_capacity as u64),
            "totalTicketCapacity" => Some(self.release_batch_size as u64),
            "ticketReleaseRate" => Some(self.release_interval_ms),
            "ticketRetrievalRate" => Some(self.retrieval_interval_ms),
            "customerCount" => Some(self.customer_count as u64),
            "retrievalAmount" => Some(self.retrieval_amount as u64),
            _ => None,
        }
    }
}

/// Validation rule
pub enum ValidationRule {
    /// Strictly greater than zero
    Positive,
    Range { min: u64, max: u64 },
    Custom(Box<dyn Fn(&Config) -> Result<()> + Send + Sync>),
}

impl std::fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationRule::Positive => write!(f, "Positive"),
            ValidationRule::Range { min, max } => {
                write!(f, "Range {{ min: {}, max: {} }}", min, max)
            }
            ValidationRule::Custom(_) => write!(f, "Custom(<closure>)"),
        }
    }
}

/// Configuration validator
#[derive(Debug)]
pub struct ConfigValidator {
    /// Rules, checked in insertion order
    rules: Vec<(String, ValidationRule)>,
}

impl ConfigValidator {
    /// Create a validator with no rules
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a validation rule for a field key
    pub fn add_rule(&mut self, key: &str, rule: ValidationRule) {
        self.rules.push((key.to_string(), rule));
    }

    /// Validate configuration, reporting the first violated rule
    pub fn validate(&self, config: &Config) -> Result<()> {
        for (key, rule) in &self.rules {
            if let ValidationRule::Custom(validator) = rule {
                validator(config)?;
                continue;
            }

            let value = config
                .get(key)
                .ok_or_else(|| Error::InvalidConfig(format!("Unknown key '{}'", key)))?;

            match rule {
                ValidationRule::Positive => {
                    if value == 0 {
                        return Err(Error::InvalidConfig(format!(
                            "'{}' must be a positive integer",
                            key
                        )));
                    }
                }
                ValidationRule::Range { min, max } => {
                    if value < *min || value > *max {
                        return Err(Error::InvalidConfig(format!(
                            "'{}' must be between {} and {}",
                            key, min, max
                        )));
                    }
                }
                ValidationRule::Custom(_) => {}
            }
        }

        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        let mut validator = Self::new();
        validator.add_rule("maxTicketCapacity", ValidationRule::Positive);
        validator.add_rule("totalTicketCapacity", ValidationRule::Positive);
        validator.add_rule("ticketReleaseRate", ValidationRule::Positive);
        validator.add_rule("ticketRetrievalRate", ValidationRule::Positive);
        validator.add_rule(
            "customerCount",
            ValidationRule::Range {
                min: 1,
                max: MAX_CUSTOMERS,
            },
        );
        validator.add_rule("retrievalAmount", ValidationRule::Positive);
        validator
    }
}

/// JSON file holding the last saved configuration
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a configuration file is present
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Validate and write `config` as pretty-printed JSON
    pub fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)?;
        info!("Configuration saved to {}", self.path.display());
        Ok(())
    }

    /// Read and validate the stored configuration
    pub fn load(&self) -> Result<Config> {
        let content = fs::read_to_string(&self.path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", self.path.display());
        Ok(config)
    }

    /// Load the stored configuration, treating any failure as "nothing saved"
    pub fn load_or_none(&self) -> Option<Config> {
        if !self.exists() {
            return None;
        }

        match self.load() {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(
                    "Ignoring configuration in {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_PATH)
    }
}
