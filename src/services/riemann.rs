//! Riemann event publishing over TCP.
//!
//! Events are encoded as Riemann protobuf messages and framed with a 4-byte
//! big-endian length prefix. The server acknowledges every frame with a `Msg`
//! carrying `ok` or an `error` string.

use async_trait::async_trait;
use prost::Message;
use std::{collections::HashMap, time::Duration};
use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::Mutex,
};
use tracing::{debug, warn};

use crate::config::RiemannConfig;

/// Upper bound on an acknowledgement frame; real acks are a handful of bytes
const MAX_ACK_LEN: usize = 1024 * 1024;

/// Errors raised while publishing to the event store
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("connection to {address} failed: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[error("connection to {0} timed out")]
    ConnectTimeout(String),

    #[error("no acknowledgement from {0} in time")]
    AckTimeout(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid acknowledgement: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("acknowledgement frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("event rejected: {0}")]
    Rejected(String),
}

/// A monitoring event as forwarded to the event store
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub service: String,
    pub description: String,
    pub metric: i64,
    pub state: String,
    pub host: String,
    pub tags: Vec<String>,
    pub ttl: Option<Duration>,
    pub attributes: HashMap<String, String>,
}

/// Destination for monitoring events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send_event(&self, event: &Event) -> Result<(), SinkError>;
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoMsg {
    #[prost(bool, optional, tag = "2")]
    pub ok: Option<bool>,
    #[prost(string, optional, tag = "3")]
    pub error: Option<String>,
    #[prost(message, repeated, tag = "6")]
    pub events: Vec<ProtoEvent>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoEvent {
    #[prost(int64, optional, tag = "1")]
    pub time: Option<i64>,
    #[prost(string, optional, tag = "2")]
    pub state: Option<String>,
    #[prost(string, optional, tag = "3")]
    pub service: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub host: Option<String>,
    #[prost(string, optional, tag = "5")]
    pub description: Option<String>,
    #[prost(string, repeated, tag = "7")]
    pub tags: Vec<String>,
    #[prost(float, optional, tag = "8")]
    pub ttl: Option<f32>,
    #[prost(message, repeated, tag = "9")]
    pub attributes: Vec<ProtoAttribute>,
    #[prost(sint64, optional, tag = "13")]
    pub metric_sint64: Option<i64>,
    #[prost(float, optional, tag = "15")]
    pub metric_f: Option<f32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoAttribute {
    #[prost(string, required, tag = "1")]
    pub key: String,
    #[prost(string, optional, tag = "2")]
    pub value: Option<String>,
}

impl Event {
    fn to_proto(&self) -> ProtoEvent {
        let mut attributes: Vec<ProtoAttribute> = self
            .attributes
            .iter()
            .map(|(key, value)| ProtoAttribute {
                key: key.clone(),
                value: Some(value.clone()),
            })
            .collect();
        // Stable wire output regardless of map iteration order
        attributes.sort_by(|a, b| a.key.cmp(&b.key));

        ProtoEvent {
            time: Some(chrono::Utc::now().timestamp()),
            state: Some(self.state.clone()),
            service: Some(self.service.clone()),
            host: Some(self.host.clone()),
            description: Some(self.description.clone()),
            tags: self.tags.clone(),
            ttl: self.ttl.map(|ttl| ttl.as_secs_f32()),
            attributes,
            metric_sint64: Some(self.metric),
            metric_f: Some(self.metric as f32),
        }
    }
}

/// Encode a single event as a length-prefixed Riemann frame
pub fn encode_frame(event: &Event) -> Vec<u8> {
    let msg = ProtoMsg {
        ok: None,
        error: None,
        events: vec![event.to_proto()],
    };
    let body = msg.encode_to_vec();

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    frame
}

/// TCP client for a Riemann server
///
/// The connection is opened lazily and shared by all callers. A failed send
/// drops the connection, reconnects once and resends before giving up.
pub struct RiemannClient {
    address: String,
    connect_timeout: Duration,
    io_timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl RiemannClient {
    pub fn new(config: &RiemannConfig) -> Self {
        Self {
            address: config.address.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_seconds),
            io_timeout: Duration::from_secs(config.io_timeout_seconds),
            stream: Mutex::new(None),
        }
    }

    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    /// Open the connection eagerly so startup fails fast on a bad address
    pub async fn connect(&self) -> Result<(), SinkError> {
        let stream = self.open().await?;
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn open(&self) -> Result<TcpStream, SinkError> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address)).await
        {
            Ok(Ok(stream)) => {
                debug!(address = %self.address, "Connected to Riemann");
                Ok(stream)
            }
            Ok(Err(source)) => Err(SinkError::Connect {
                address: self.address.clone(),
                source,
            }),
            Err(_) => Err(SinkError::ConnectTimeout(self.address.clone())),
        }
    }

    /// One write/ack round trip, bounded by the I/O timeout
    async fn exchange(&self, stream: &mut TcpStream, frame: &[u8]) -> Result<(), SinkError> {
        tokio::time::timeout(self.io_timeout, Self::round_trip(stream, frame))
            .await
            .map_err(|_| SinkError::AckTimeout(self.address.clone()))?
    }

    async fn round_trip(stream: &mut TcpStream, frame: &[u8]) -> Result<(), SinkError> {
        stream.write_all(frame).await?;

        let len = stream.read_u32().await? as usize;
        if len > MAX_ACK_LEN {
            return Err(SinkError::FrameTooLarge(len));
        }
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await?;

        let ack = ProtoMsg::decode(body.as_slice())?;
        match (ack.ok, ack.error) {
            (_, Some(error)) if !error.is_empty() => Err(SinkError::Rejected(error)),
            (Some(false), _) => Err(SinkError::Rejected("server returned ok=false".into())),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl EventSink for RiemannClient {
    async fn send_event(&self, event: &Event) -> Result<(), SinkError> {
        let frame = encode_frame(event);
        let mut guard = self.stream.lock().await;

        if let Some(stream) = guard.as_mut() {
            match self.exchange(stream, &frame).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(address = %self.address, error = %e, "Riemann send failed, reconnecting");
                    *guard = None;
                }
            }
        }

        let mut stream = self.open().await?;
        let result = self.exchange(&mut stream, &frame).await;
        if result.is_ok() {
            *guard = Some(stream);
        }
        result
    }
}
