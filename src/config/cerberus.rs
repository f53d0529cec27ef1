//! Abuse-detection rule configuration.
//!
//! Rules are loaded from the JSON file named by `CERBERUS_RULES_FILE`, or fall
//! back to the built-in set (one IP login rule, two ASN error-rate rules).
//! Every rule is validated before any window is built; a bad rule aborts
//! startup rather than running with a wrong bucket count.

use serde::{Deserialize, Serialize};
use std::{collections::HashSet, env, fs, path::PathBuf, time::Duration};
use thiserror::Error;

/// ASN excluded from the default network rules
pub const DEFAULT_IGNORED_ASN: &str = "27725";

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("rule name must not be empty")]
    EmptyRuleName,

    #[error("duplicate rule name: {0}")]
    DuplicateRule(String),

    #[error("rule {rule}: tick interval must be greater than zero")]
    ZeroTick { rule: String },

    #[error("rule {rule}: window size must be greater than zero")]
    EmptyWindow { rule: String },

    #[error("rule {rule}: window size {size}s is not a multiple of tick {tick}s")]
    UnevenWindow { rule: String, size: u64, tick: u64 },

    #[error("rule {rule}: {field} must be within [0, 1], got {value}")]
    InvalidRate {
        rule: String,
        field: &'static str,
        value: f64,
    },

    #[error("rule {rule}: dedup ttl must be greater than zero")]
    ZeroDedupTtl { rule: String },

    #[error("queue capacity must be greater than zero")]
    ZeroQueueCapacity,

    #[error("display interval must be greater than zero")]
    ZeroDisplayInterval,

    #[error("failed to read rules file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse rules file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What a rule's counters are keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    Ip,
    Asn,
}

impl RuleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleScope::Ip => "ip",
            RuleScope::Asn => "asn",
        }
    }
}

/// Sliding window span and tick, both in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub size: u64,
    pub tick: u64,
}

impl WindowSpec {
    /// Number of ring-buffer slots, rejecting spans that do not divide evenly
    pub fn bucket_count(&self, rule: &str) -> Result<usize, ConfigError> {
        if self.tick == 0 {
            return Err(ConfigError::ZeroTick {
                rule: rule.to_string(),
            });
        }
        if self.size == 0 {
            return Err(ConfigError::EmptyWindow {
                rule: rule.to_string(),
            });
        }
        if self.size % self.tick != 0 {
            return Err(ConfigError::UnevenWindow {
                rule: rule.to_string(),
                size: self.size,
                tick: self.tick,
            });
        }
        Ok((self.size / self.tick) as usize)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick)
    }
}

/// Thresholds of a rule's firing policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerSpec {
    /// Mostly-login traffic that mostly fails
    LoginAnomaly {
        min_requests: u32,
        min_login_rate: f64,
        min_login_error_rate: f64,
    },
    /// Any traffic with a high unauthorized ratio
    ErrorRate { min_requests: u32, min_error_rate: f64 },
}

impl TriggerSpec {
    fn validate(&self, rule: &str) -> Result<(), ConfigError> {
        let rates: Vec<(&'static str, f64)> = match self {
            TriggerSpec::LoginAnomaly {
                min_login_rate,
                min_login_error_rate,
                ..
            } => vec![
                ("min_login_rate", *min_login_rate),
                ("min_login_error_rate", *min_login_error_rate),
            ],
            TriggerSpec::ErrorRate { min_error_rate, .. } => {
                vec![("min_error_rate", *min_error_rate)]
            }
        };

        for (field, value) in rates {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidRate {
                    rule: rule.to_string(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

fn default_dedup_ttl() -> u64 {
    600
}

/// One configured detection rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub scope: RuleScope,
    pub window: WindowSpec,
    pub trigger: TriggerSpec,
    /// Subject keys the rule never counts
    #[serde(default)]
    pub ignored: Vec<String>,
    /// Seconds a fired incident stays suppressed without new evidence
    #[serde(default = "default_dedup_ttl")]
    pub dedup_ttl: u64,
}

impl RuleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyRuleName);
        }
        self.window.bucket_count(&self.name)?;
        if self.dedup_ttl == 0 {
            return Err(ConfigError::ZeroDedupTtl {
                rule: self.name.clone(),
            });
        }
        self.trigger.validate(&self.name)
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl)
    }
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_display_interval() -> u64 {
    5
}

/// Full rule set plus engine-wide tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CerberusConfig {
    pub rules: Vec<RuleConfig>,
    /// Capacity of each per-classification ingestion queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Seconds between window diagnostics
    #[serde(default = "default_display_interval")]
    pub display_interval: u64,
}

impl Default for CerberusConfig {
    fn default() -> Self {
        let ignored = vec![DEFAULT_IGNORED_ASN.to_string()];

        Self {
            rules: vec![
                RuleConfig {
                    name: "ip".to_string(),
                    scope: RuleScope::Ip,
                    window: WindowSpec { size: 600, tick: 5 },
                    trigger: TriggerSpec::LoginAnomaly {
                        min_requests: 15,
                        min_login_rate: 0.9,
                        min_login_error_rate: 0.9,
                    },
                    ignored: Vec::new(),
                    dedup_ttl: default_dedup_ttl(),
                },
                RuleConfig {
                    name: "asn-low".to_string(),
                    scope: RuleScope::Asn,
                    window: WindowSpec { size: 300, tick: 5 },
                    trigger: TriggerSpec::ErrorRate {
                        min_requests: 30,
                        min_error_rate: 0.8,
                    },
                    ignored: ignored.clone(),
                    dedup_ttl: default_dedup_ttl(),
                },
                RuleConfig {
                    name: "asn-high".to_string(),
                    scope: RuleScope::Asn,
                    window: WindowSpec { size: 30, tick: 1 },
                    trigger: TriggerSpec::ErrorRate {
                        min_requests: 30,
                        min_error_rate: 0.8,
                    },
                    ignored,
                    dedup_ttl: default_dedup_ttl(),
                },
            ],
            queue_capacity: default_queue_capacity(),
            display_interval: default_display_interval(),
        }
    }
}

impl CerberusConfig {
    /// Load rules from `CERBERUS_RULES_FILE` when set, otherwise use the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = match env::var("CERBERUS_RULES_FILE") {
            Ok(path) if !path.is_empty() => Self::from_file(PathBuf::from(path))?,
            _ => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io { path, source })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.display_interval == 0 {
            return Err(ConfigError::ZeroDisplayInterval);
        }

        let mut names = HashSet::new();
        for rule in &self.rules {
            rule.validate()?;
            if !names.insert(rule.name.as_str()) {
                return Err(ConfigError::DuplicateRule(rule.name.clone()));
            }
        }
        Ok(())
    }

    pub fn display_interval(&self) -> Duration {
        Duration::from_secs(self.display_interval)
    }
}
