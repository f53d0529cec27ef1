//! Fakes shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use cerberus_relay::{
    AppMetrics, AppState, AsnResolver, CerberusConfig, Event, EventSink, MetricRelay,
    MetricsConfig, SinkError,
    services::{
        Cerberus,
        asn::{AsnError, MemoryAsnCache, TxtResolver},
        cerberus::{Action, ActionError, Incident},
    },
};
use parking_lot::Mutex;
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Event sink that keeps every event, or fails every send
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<Event>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send_event(&self, event: &Event) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::ConnectTimeout("127.0.0.1:5555".to_string()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// DNS stand-in answering every TXT query with the same records
pub struct StaticTxt {
    answers: Vec<String>,
    pub queries: Mutex<Vec<String>>,
}

impl StaticTxt {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().len()
    }
}

#[async_trait]
impl TxtResolver for StaticTxt {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, AsnError> {
        self.queries.lock().push(name.to_string());
        Ok(self.answers.clone())
    }
}

/// Action that records calls and fails the first `failures` of them
#[derive(Default)]
pub struct RecordingAction {
    pub calls: Mutex<Vec<(String, String)>>,
    failures: AtomicUsize,
}

impl RecordingAction {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(failures),
        }
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(_, s)| s.clone()).collect()
    }
}

#[async_trait]
impl Action for RecordingAction {
    async fn send(&self, rule: &str, subject: &str, _incident: &Incident) -> Result<(), ActionError> {
        self.calls.lock().push((rule.to_string(), subject.to_string()));
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ActionError::Status {
                job: "RiemannAlertIps".to_string(),
                status: 503,
            });
        }
        Ok(())
    }
}

pub const GOOGLE_RECORD: &str = "15169 | 8.8.8.0/24 | US | arin | 1992-12-01";

/// Wired and started services around the given fakes
pub struct Harness {
    pub state: AppState,
    pub sink: Arc<RecordingSink>,
    pub dns: Arc<StaticTxt>,
    pub action: Arc<RecordingAction>,
}

pub fn harness(sink: RecordingSink, credentials: Option<(String, String)>) -> Harness {
    let sink = Arc::new(sink);
    let dns = Arc::new(StaticTxt::new(&[GOOGLE_RECORD]));
    let action = Arc::new(RecordingAction::default());
    let metrics = AppMetrics::new().unwrap();

    let resolver = AsnResolver::new(
        dns.clone(),
        Arc::new(MemoryAsnCache::new()),
        Duration::from_secs(3600),
    )
    .with_metrics(metrics.clone());

    let recorder = action.clone();
    let cerberus = Cerberus::from_config(&CerberusConfig::default(), Some(metrics.clone()), |_| {
        recorder.clone() as Arc<dyn Action>
    })
    .unwrap();
    cerberus.start().unwrap();

    let relay = MetricRelay::new(sink.clone(), Arc::new(resolver), Arc::new(cerberus));

    Harness {
        state: AppState {
            relay: Arc::new(relay),
            metrics,
            metrics_config: MetricsConfig::default(),
            credentials,
        },
        sink,
        dns,
        action,
    }
}
