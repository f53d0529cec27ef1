//! Side effects of a fired rule.

use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{error, info};

use super::{jenkins::JenkinsClient, trigger::Incident};
use crate::{
    config::RuleScope,
    services::riemann::{Event, EventSink},
};

pub const ALERT_SERVICE: &str = "cerberus.alert";
pub const ALERT_HOST: &str = "cerberus";

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("jenkins request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("jenkins job {job} returned status {status}")]
    Status { job: String, status: u16 },

    #[error("invalid jenkins url: {0}")]
    Url(#[from] url::ParseError),
}

/// Capability invoked by a trigger when its rule fires
#[async_trait]
pub trait Action: Send + Sync {
    async fn send(&self, rule: &str, subject: &str, incident: &Incident) -> Result<(), ActionError>;
}

/// Alert event published for every fired rule
pub fn alert_event(rule: &str, subject: &str) -> Event {
    Event {
        service: ALERT_SERVICE.to_string(),
        description: format!("Rule {} triggered for {}", rule, subject),
        metric: 1,
        state: "error".to_string(),
        host: ALERT_HOST.to_string(),
        tags: Vec::new(),
        ttl: Some(Duration::from_secs(60)),
        attributes: HashMap::from([
            ("name".to_string(), rule.to_string()),
            ("ip-asn".to_string(), subject.to_string()),
        ]),
    }
}

/// Publishes an alert then asks Jenkins to block the subject.
///
/// Without a Jenkins client the block is only logged.
pub struct BlockAction {
    scope: RuleScope,
    jenkins: Option<JenkinsClient>,
    sink: Arc<dyn EventSink>,
}

impl BlockAction {
    pub fn new(scope: RuleScope, jenkins: Option<JenkinsClient>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            scope,
            jenkins,
            sink,
        }
    }
}

#[async_trait]
impl Action for BlockAction {
    async fn send(&self, rule: &str, subject: &str, incident: &Incident) -> Result<(), ActionError> {
        if let Err(e) = self.sink.send_event(&alert_event(rule, subject)).await {
            error!(rule = %rule, subject = %subject, error = %e, "Failed to publish alert");
        }

        let Some(jenkins) = &self.jenkins else {
            info!(rule = %rule, subject = %subject, scope = self.scope.as_str(), "Dry run, block skipped");
            return Ok(());
        };

        match self.scope {
            RuleScope::Ip => jenkins.block_ip(subject).await,
            RuleScope::Asn => jenkins.block_asn(subject, incident).await,
        }
    }
}
