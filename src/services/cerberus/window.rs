//! Per-rule sliding-window counters.
//!
//! A [`Window`] keeps, for every subject key, four running totals and four
//! ring buffers of `bucket_count` slots recording what each tick added. Every
//! tick the cursor advances, the trigger sees the pre-eviction aggregate and
//! the slot under the cursor is subtracted and cleared. Keys whose totals
//! reach zero are dropped.
//!
//! Increments travel through four bounded queues (one per classification)
//! drained by a single consumer task, so the hot path never contends with the
//! aging step for more than one map update.

use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use thiserror::Error;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, info};

use super::trigger::Trigger;
use crate::{
    config::{ConfigError, RuleConfig},
    services::metrics::AppMetrics,
};

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("window {0} is already started")]
    AlreadyStarted(String),

    #[error("window {0} is no longer accepting events")]
    Closed(String),
}

/// Which of the four counters an event lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Ok,
    Error,
    LoginOk,
    LoginError,
}

impl Classification {
    pub fn from_flags(is_login: bool, is_unauthorized: bool) -> Self {
        match (is_login, is_unauthorized) {
            (true, true) => Classification::LoginError,
            (true, false) => Classification::LoginOk,
            (false, true) => Classification::Error,
            (false, false) => Classification::Ok,
        }
    }
}

/// Snapshot of one key's live counters handed to the trigger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub total_ok: u32,
    pub total_error: u32,
    /// Fence of the most recent error of any kind
    pub last_error: i64,
    pub login_ok: u32,
    pub login_error: u32,
    /// Fence of the most recent failed login
    pub last_login_error: i64,
}

impl Aggregate {
    pub fn total(&self) -> u64 {
        u64::from(self.total_ok) + u64::from(self.total_error)
    }

    pub fn login_total(&self) -> u64 {
        u64::from(self.login_ok) + u64::from(self.login_error)
    }
}

struct KeyCounters {
    total_ok: u32,
    total_error: u32,
    login_ok: u32,
    login_error: u32,
    last_error: i64,
    last_login_error: i64,
    total_ok_buckets: Vec<u32>,
    total_error_buckets: Vec<u32>,
    login_ok_buckets: Vec<u32>,
    login_error_buckets: Vec<u32>,
}

impl KeyCounters {
    fn new(buckets: usize) -> Self {
        Self {
            total_ok: 0,
            total_error: 0,
            login_ok: 0,
            login_error: 0,
            last_error: 0,
            last_login_error: 0,
            total_ok_buckets: vec![0; buckets],
            total_error_buckets: vec![0; buckets],
            login_ok_buckets: vec![0; buckets],
            login_error_buckets: vec![0; buckets],
        }
    }

    fn aggregate(&self) -> Aggregate {
        Aggregate {
            total_ok: self.total_ok,
            total_error: self.total_error,
            last_error: self.last_error,
            login_ok: self.login_ok,
            login_error: self.login_error,
            last_login_error: self.last_login_error,
        }
    }

    /// Drop the slot at `index`; returns false once nothing is left
    fn evict(&mut self, index: usize) -> bool {
        self.total_ok -= self.total_ok_buckets[index];
        self.total_error -= self.total_error_buckets[index];
        if self.total_ok == 0 && self.total_error == 0 {
            return false;
        }

        self.login_ok -= self.login_ok_buckets[index];
        self.login_error -= self.login_error_buckets[index];

        self.total_ok_buckets[index] = 0;
        self.total_error_buckets[index] = 0;
        self.login_ok_buckets[index] = 0;
        self.login_error_buckets[index] = 0;
        true
    }
}

/// The counter map and ring cursor of one window, without any scheduling
pub struct SlidingCounters {
    bucket_count: usize,
    index: usize,
    keys: HashMap<String, KeyCounters>,
    last_fence: i64,
}

impl SlidingCounters {
    pub fn new(bucket_count: usize) -> Self {
        Self {
            bucket_count: bucket_count.max(1),
            index: 0,
            keys: HashMap::new(),
            last_fence: 0,
        }
    }

    /// Fences are strictly increasing so two errors never share one
    fn next_fence(&mut self, now_ms: i64) -> i64 {
        self.last_fence = now_ms.max(self.last_fence + 1);
        self.last_fence
    }

    /// Record one event for `key` at wall-clock time `now_ms`
    pub fn increment(&mut self, key: &str, class: Classification, now_ms: i64) {
        let fence = match class {
            Classification::Error | Classification::LoginError => self.next_fence(now_ms),
            _ => 0,
        };

        let index = self.index;
        let buckets = self.bucket_count;
        let counters = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| KeyCounters::new(buckets));

        match class {
            Classification::Ok => {
                counters.total_ok += 1;
                counters.total_ok_buckets[index] += 1;
            }
            Classification::Error => {
                counters.total_error += 1;
                counters.total_error_buckets[index] += 1;
                counters.last_error = fence;
            }
            Classification::LoginOk => {
                counters.total_ok += 1;
                counters.login_ok += 1;
                counters.total_ok_buckets[index] += 1;
                counters.login_ok_buckets[index] += 1;
            }
            Classification::LoginError => {
                counters.total_error += 1;
                counters.login_error += 1;
                counters.total_error_buckets[index] += 1;
                counters.login_error_buckets[index] += 1;
                counters.last_error = fence;
                counters.last_login_error = fence;
            }
        }
    }

    /// Advance one tick.
    ///
    /// Returns every key's aggregate as it stood before the oldest bucket
    /// was evicted.
    pub fn step(&mut self) -> Vec<(String, Aggregate)> {
        self.index = (self.index + 1) % self.bucket_count;
        let index = self.index;

        let mut snapshot = Vec::with_capacity(self.keys.len());
        self.keys.retain(|key, counters| {
            snapshot.push((key.clone(), counters.aggregate()));
            counters.evict(index)
        });
        snapshot
    }

    pub fn aggregate(&self, key: &str) -> Option<Aggregate> {
        self.keys.get(key).map(KeyCounters::aggregate)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    #[cfg(test)]
    fn bucket_sums(&self, key: &str) -> Option<[u32; 4]> {
        self.keys.get(key).map(|c| {
            [
                c.total_ok_buckets.iter().sum(),
                c.total_error_buckets.iter().sum(),
                c.login_ok_buckets.iter().sum(),
                c.login_error_buckets.iter().sum(),
            ]
        })
    }
}

struct Senders {
    ok: mpsc::Sender<String>,
    error: mpsc::Sender<String>,
    login_ok: mpsc::Sender<String>,
    login_error: mpsc::Sender<String>,
}

struct Receivers {
    ok: mpsc::Receiver<String>,
    error: mpsc::Receiver<String>,
    login_ok: mpsc::Receiver<String>,
    login_error: mpsc::Receiver<String>,
}

/// A rule's sliding window with its background consumer, ticker and display
pub struct Window {
    name: String,
    tick: Duration,
    display_interval: Duration,
    counters: Arc<Mutex<SlidingCounters>>,
    senders: Senders,
    receivers: Mutex<Option<Receivers>>,
    trigger: Arc<Trigger>,
    metrics: Option<AppMetrics>,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Window {
    /// Build a window for `rule`; the bucket count must divide evenly
    pub fn new(
        rule: &RuleConfig,
        trigger: Arc<Trigger>,
        queue_capacity: usize,
        display_interval: Duration,
    ) -> Result<Self, ConfigError> {
        let bucket_count = rule.window.bucket_count(&rule.name)?;
        if queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if display_interval.is_zero() {
            return Err(ConfigError::ZeroDisplayInterval);
        }

        let (ok_tx, ok_rx) = mpsc::channel(queue_capacity);
        let (error_tx, error_rx) = mpsc::channel(queue_capacity);
        let (login_ok_tx, login_ok_rx) = mpsc::channel(queue_capacity);
        let (login_error_tx, login_error_rx) = mpsc::channel(queue_capacity);

        Ok(Self {
            name: rule.name.clone(),
            tick: rule.window.tick_interval(),
            display_interval,
            counters: Arc::new(Mutex::new(SlidingCounters::new(bucket_count))),
            senders: Senders {
                ok: ok_tx,
                error: error_tx,
                login_ok: login_ok_tx,
                login_error: login_error_tx,
            },
            receivers: Mutex::new(Some(Receivers {
                ok: ok_rx,
                error: error_rx,
                login_ok: login_ok_rx,
                login_error: login_error_rx,
            })),
            trigger,
            metrics: None,
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn with_metrics(mut self, metrics: AppMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue one event for `key`, waiting while the queue is full
    pub async fn increment(
        &self,
        key: &str,
        is_login: bool,
        is_unauthorized: bool,
    ) -> Result<(), WindowError> {
        let sender = match Classification::from_flags(is_login, is_unauthorized) {
            Classification::Ok => &self.senders.ok,
            Classification::Error => &self.senders.error,
            Classification::LoginOk => &self.senders.login_ok,
            Classification::LoginError => &self.senders.login_error,
        };

        sender
            .send(key.to_string())
            .await
            .map_err(|_| WindowError::Closed(self.name.clone()))
    }

    /// Aggregate currently held for `key`
    pub fn aggregate(&self, key: &str) -> Option<Aggregate> {
        self.counters.lock().aggregate(key)
    }

    /// Number of live subject keys
    pub fn key_count(&self) -> usize {
        self.counters.lock().len()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Spawn the consumer, ticker and display tasks
    pub fn start(&self) -> Result<(), WindowError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(WindowError::AlreadyStarted(self.name.clone()));
        }
        let receivers = self
            .receivers
            .lock()
            .take()
            .ok_or_else(|| WindowError::AlreadyStarted(self.name.clone()))?;

        let consumer = tokio::spawn(consume(receivers, Arc::clone(&self.counters)));

        let ticker = {
            let name = self.name.clone();
            let tick = self.tick;
            let counters = Arc::clone(&self.counters);
            let trigger = Arc::clone(&self.trigger);
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + tick, tick);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    let snapshot = counters.lock().step();
                    debug!(window = %name, keys = snapshot.len(), "Window tick");
                    for (key, aggregate) in snapshot {
                        trigger.handle(&key, &aggregate);
                    }
                }
            })
        };

        let display = {
            let name = self.name.clone();
            let period = self.display_interval;
            let counters = Arc::clone(&self.counters);
            let metrics = self.metrics.clone();
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    let keys = counters.lock().len();
                    info!(window = %name, keys, "Window status");
                    if let Some(metrics) = &metrics {
                        metrics.set_window_keys(&name, keys);
                    }
                }
            })
        };

        self.tasks.lock().extend([consumer, ticker, display]);
        info!(window = %self.name, tick_seconds = self.tick.as_secs(), "Window started");
        Ok(())
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

async fn consume(mut rx: Receivers, counters: Arc<Mutex<SlidingCounters>>) {
    loop {
        let (key, class) = tokio::select! {
            Some(key) = rx.ok.recv() => (key, Classification::Ok),
            Some(key) = rx.error.recv() => (key, Classification::Error),
            Some(key) = rx.login_ok.recv() => (key, Classification::LoginOk),
            Some(key) = rx.login_error.recv() => (key, Classification::LoginError),
            else => break,
        };
        counters.lock().increment(&key, class, now_millis());
    }
}
