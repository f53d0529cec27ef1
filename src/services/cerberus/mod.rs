//! Cerberus, the inline abuse-detection engine.
//!
//! Each configured rule owns a [`Window`] of sliding counters keyed by IP or
//! ASN and a [`Trigger`] that evaluates those counters on every tick.
//! [`Cerberus::analyze`] fans a classified request out to every rule whose
//! ignore-list does not contain the subject.

pub mod action;
pub mod jenkins;
pub mod trigger;
pub mod window;

pub use action::*;
pub use jenkins::*;
pub use trigger::*;
pub use window::*;

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use thiserror::Error;
use tracing::info;

use crate::{
    config::{CerberusConfig, ConfigError, RuleConfig, RuleScope},
    services::metrics::AppMetrics,
};

#[derive(Debug, Error)]
pub enum CerberusError {
    #[error("cerberus must be started before analyzing traffic")]
    NotStarted,

    #[error("cerberus is already started")]
    AlreadyStarted,

    #[error("invalid rule: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Window(#[from] WindowError),
}

struct Rule {
    scope: RuleScope,
    window: Window,
    ignored: HashSet<String>,
}

/// Owns every rule's window for the life of the process
pub struct Cerberus {
    rules: Vec<Rule>,
    queue_capacity: usize,
    display_interval: Duration,
    metrics: Option<AppMetrics>,
    started: AtomicBool,
}

impl Cerberus {
    pub fn new(queue_capacity: usize, display_interval: Duration) -> Self {
        Self {
            rules: Vec::new(),
            queue_capacity,
            display_interval,
            metrics: None,
            started: AtomicBool::new(false),
        }
    }

    pub fn with_metrics(mut self, metrics: AppMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build every configured rule, asking `action_for` for each rule's action
    pub fn from_config<F>(
        config: &CerberusConfig,
        metrics: Option<AppMetrics>,
        mut action_for: F,
    ) -> Result<Self, CerberusError>
    where
        F: FnMut(&RuleConfig) -> Arc<dyn Action>,
    {
        config.validate()?;

        let mut cerberus = Self::new(config.queue_capacity, config.display_interval());
        cerberus.metrics = metrics;
        for rule in &config.rules {
            let action = action_for(rule);
            cerberus.add_rule(rule, action)?;
        }
        Ok(cerberus)
    }

    /// Register a rule; only allowed before [`Cerberus::start`]
    pub fn add_rule(&mut self, rule: &RuleConfig, action: Arc<dyn Action>) -> Result<(), CerberusError> {
        if self.started.load(Ordering::SeqCst) {
            return Err(CerberusError::AlreadyStarted);
        }
        rule.validate()?;
        if self.rules.iter().any(|r| r.window.name() == rule.name) {
            return Err(ConfigError::DuplicateRule(rule.name.clone()).into());
        }

        let mut trigger = Trigger::new(rule, action);
        if let Some(metrics) = &self.metrics {
            trigger = trigger.with_metrics(metrics.clone());
        }

        let mut window = Window::new(
            rule,
            Arc::new(trigger),
            self.queue_capacity,
            self.display_interval,
        )?;
        if let Some(metrics) = &self.metrics {
            window = window.with_metrics(metrics.clone());
        }

        info!(
            rule = %rule.name,
            scope = rule.scope.as_str(),
            window_seconds = rule.window.size,
            tick_seconds = rule.window.tick,
            ignored = rule.ignored.len(),
            "Rule registered"
        );

        self.rules.push(Rule {
            scope: rule.scope,
            window,
            ignored: rule.ignored.iter().cloned().collect(),
        });
        Ok(())
    }

    /// Start every window's background tasks
    pub fn start(&self) -> Result<(), CerberusError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CerberusError::AlreadyStarted);
        }
        for rule in &self.rules {
            rule.window.start()?;
        }
        info!(rules = self.rules.len(), "Cerberus started");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Count one request against every rule that does not ignore its subject
    pub async fn analyze(
        &self,
        ip: &str,
        asn: &str,
        is_login: bool,
        is_unauthorized: bool,
    ) -> Result<(), CerberusError> {
        if !self.is_started() {
            return Err(CerberusError::NotStarted);
        }

        for rule in &self.rules {
            let subject = match rule.scope {
                RuleScope::Ip => ip,
                RuleScope::Asn => asn,
            };
            if rule.ignored.contains(subject) {
                continue;
            }
            rule.window
                .increment(subject, is_login, is_unauthorized)
                .await?;
        }
        Ok(())
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.window.name()).collect()
    }

    /// Window backing the rule called `name`
    pub fn window(&self, name: &str) -> Option<&Window> {
        self.rules
            .iter()
            .find(|r| r.window.name() == name)
            .map(|r| &r.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NoopAction;

    #[async_trait]
    impl Action for NoopAction {
        async fn send(&self, _rule: &str, _subject: &str, _incident: &Incident) -> Result<(), ActionError> {
            Ok(())
        }
    }

    fn noop(_: &RuleConfig) -> Arc<dyn Action> {
        Arc::new(NoopAction)
    }

    #[tokio::test]
    async fn test_analyze_before_start_is_rejected() {
        let cerberus = Cerberus::from_config(&CerberusConfig::default(), None, noop).unwrap();

        assert!(matches!(
            cerberus.analyze("10.0.0.1", "15169", true, true).await,
            Err(CerberusError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let cerberus = Cerberus::from_config(&CerberusConfig::default(), None, noop).unwrap();

        cerberus.start().unwrap();
        assert!(matches!(cerberus.start(), Err(CerberusError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_add_rule_after_start_is_rejected() {
        let config = CerberusConfig::default();
        let mut cerberus = Cerberus::new(16, Duration::from_secs(5));
        cerberus.start().unwrap();

        assert!(matches!(
            cerberus.add_rule(&config.rules[0], Arc::new(NoopAction)),
            Err(CerberusError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let config = CerberusConfig::default();
        let mut cerberus = Cerberus::new(16, Duration::from_secs(5));
        cerberus.add_rule(&config.rules[0], Arc::new(NoopAction)).unwrap();

        assert!(matches!(
            cerberus.add_rule(&config.rules[0], Arc::new(NoopAction)),
            Err(CerberusError::Config(ConfigError::DuplicateRule(_)))
        ));
        assert_eq!(cerberus.rule_names(), vec!["ip"]);
    }

    #[test]
    fn test_uneven_rule_rejected() {
        let mut rule = CerberusConfig::default().rules.remove(0);
        rule.window.size = 601;
        let mut cerberus = Cerberus::new(16, Duration::from_secs(5));

        assert!(matches!(
            cerberus.add_rule(&rule, Arc::new(NoopAction)),
            Err(CerberusError::Config(ConfigError::UnevenWindow { .. }))
        ));
    }

    #[test]
    fn test_zero_display_interval_rejected() {
        let rule = CerberusConfig::default().rules.remove(0);
        let mut cerberus = Cerberus::new(16, Duration::ZERO);

        assert!(matches!(
            cerberus.add_rule(&rule, Arc::new(NoopAction)),
            Err(CerberusError::Config(ConfigError::ZeroDisplayInterval))
        ));
        assert!(cerberus.rule_names().is_empty());
    }
}
