//! Rule evaluation and alert deduplication.

use moka::sync::Cache;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{action::Action, window::Aggregate};
use crate::{
    config::{RuleConfig, TriggerSpec},
    services::metrics::AppMetrics,
};

/// Upper bound on subjects remembered per rule
const DEDUP_CAPACITY: u64 = 100_000;

/// Firing policy of a rule
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerPolicy {
    LoginAnomaly {
        min_requests: u32,
        min_login_rate: f64,
        min_login_error_rate: f64,
    },
    ErrorRate {
        min_requests: u32,
        min_error_rate: f64,
    },
}

/// A qualifying observation; `fence` identifies the incident for dedup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Incident {
    pub fence: i64,
    pub total: u64,
    pub failed: u64,
}

impl Incident {
    /// Share of the window's requests that counted as failures
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        ratio(self.failed, self.total)
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    part as f64 / whole as f64
}

impl From<&TriggerSpec> for TriggerPolicy {
    fn from(spec: &TriggerSpec) -> Self {
        match *spec {
            TriggerSpec::LoginAnomaly {
                min_requests,
                min_login_rate,
                min_login_error_rate,
            } => TriggerPolicy::LoginAnomaly {
                min_requests,
                min_login_rate,
                min_login_error_rate,
            },
            TriggerSpec::ErrorRate {
                min_requests,
                min_error_rate,
            } => TriggerPolicy::ErrorRate {
                min_requests,
                min_error_rate,
            },
        }
    }
}

impl TriggerPolicy {
    pub fn evaluate(&self, aggregate: &Aggregate) -> Option<Incident> {
        let total = aggregate.total();

        match *self {
            TriggerPolicy::LoginAnomaly {
                min_requests,
                min_login_rate,
                min_login_error_rate,
            } => {
                let login_error = u64::from(aggregate.login_error);
                if total == 0 || login_error == 0 || total < u64::from(min_requests) {
                    return None;
                }
                let login_total = aggregate.login_total();
                if ratio(login_total, total) < min_login_rate
                    || ratio(login_error, login_total) < min_login_error_rate
                {
                    return None;
                }
                Some(Incident {
                    fence: aggregate.last_login_error,
                    total,
                    failed: login_error,
                })
            }
            TriggerPolicy::ErrorRate {
                min_requests,
                min_error_rate,
            } => {
                let errors = u64::from(aggregate.total_error);
                if total == 0 || errors == 0 || total < u64::from(min_requests) {
                    return None;
                }
                if ratio(errors, total) < min_error_rate {
                    return None;
                }
                Some(Incident {
                    fence: aggregate.last_error,
                    total,
                    failed: errors,
                })
            }
        }
    }
}

/// Evaluates a rule on every tick and dispatches its action once per incident
pub struct Trigger {
    rule: String,
    policy: TriggerPolicy,
    dedup: Cache<String, i64>,
    action: Arc<dyn Action>,
    metrics: Option<AppMetrics>,
}

impl Trigger {
    pub fn new(rule: &RuleConfig, action: Arc<dyn Action>) -> Self {
        Self {
            rule: rule.name.clone(),
            policy: TriggerPolicy::from(&rule.trigger),
            dedup: Cache::builder()
                .max_capacity(DEDUP_CAPACITY)
                .time_to_live(rule.dedup_ttl())
                .build(),
            action,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: AppMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn policy(&self) -> &TriggerPolicy {
        &self.policy
    }

    fn dedup_key(&self, subject: &str) -> String {
        format!("{}{}", self.rule, subject)
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_trigger(&self.rule, outcome);
        }
    }

    /// Evaluate `aggregate` and, on a new incident, spawn the action.
    ///
    /// Returns true when a dispatch was started. The caller never waits for
    /// the action to finish.
    pub fn handle(self: &Arc<Self>, subject: &str, aggregate: &Aggregate) -> bool {
        let Some(incident) = self.policy.evaluate(aggregate) else {
            return false;
        };

        if let Some(fired) = self.dedup.get(&self.dedup_key(subject)) {
            if fired >= incident.fence {
                debug!(rule = %self.rule, subject = %subject, "Incident already reported");
                self.record("suppressed");
                return false;
            }
        }

        warn!(
            rule = %self.rule,
            subject = %subject,
            total = incident.total,
            failed = incident.failed,
            "Rule triggered"
        );

        let trigger = Arc::clone(self);
        let subject = subject.to_string();
        tokio::spawn(async move {
            trigger.dispatch(subject, incident).await;
        });
        true
    }

    async fn dispatch(&self, subject: String, incident: Incident) {
        match self.action.send(&self.rule, &subject, &incident).await {
            Ok(()) => {
                self.dedup.insert(self.dedup_key(&subject), incident.fence);
                self.record("dispatched");
            }
            Err(e) => {
                error!(rule = %self.rule, subject = %subject, error = %e, "Action failed");
                self.record("failed");
            }
        }
    }
}
