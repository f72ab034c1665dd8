//! Envelope validation for inbound webhook messages.
//!
//! # Responsibilities
//! - Check the producer, event type, timestamp and payload, in that order
//! - Extract a validated `Envelope`
//!
//! # Design Decisions
//! - Fail fast: the first failing check decides the error
//! - Header names are matched case-insensitively, values exactly
//! - The payload is never inspected here

use std::collections::HashMap;

use thiserror::Error;

/// Product token the upstream webhook relay sends as `User-Agent`.
pub const EXPECTED_USER_AGENT: &str = "Robot-Gitee-Access";

pub const USER_AGENT_HEADER: &str = "User-Agent";
pub const EVENT_TYPE_HEADER: &str = "X-Gitee-Event";
pub const TIMESTAMP_HEADER: &str = "X-Gitee-Timestamp";

/// A message as delivered by the transport: headers plus opaque body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage {
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl RawMessage {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert_header(name, value);
        self
    }

    pub fn insert_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Why a message was rejected.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("unexpected webhook message: missing or wrong User-Agent header")]
    MissingOrWrongUserAgent,

    #[error("unexpected webhook message: missing X-Gitee-Event header")]
    MissingEventType,

    #[error("unexpected webhook message: missing X-Gitee-Timestamp header")]
    MissingDedupeToken,

    #[error("unexpected webhook message: the payload is empty")]
    EmptyPayload,
}

impl EnvelopeError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingOrWrongUserAgent => "user_agent",
            Self::MissingEventType => "event_type",
            Self::MissingDedupeToken => "dedupe_token",
            Self::EmptyPayload => "empty_payload",
        }
    }
}

/// A validated inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    event_type: String,
    dedupe_token: String,
    payload: Vec<u8>,
}

impl Envelope {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Opaque correlation id taken from the timestamp header.
    pub fn dedupe_token(&self) -> &str {
        &self.dedupe_token
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Validate a transport message and extract its envelope.
pub fn validate(message: RawMessage) -> Result<Envelope, EnvelopeError> {
    if message.header(USER_AGENT_HEADER) != Some(EXPECTED_USER_AGENT) {
        return Err(EnvelopeError::MissingOrWrongUserAgent);
    }

    let event_type = match message.header(EVENT_TYPE_HEADER) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => return Err(EnvelopeError::MissingEventType),
    };

    let dedupe_token = match message.header(TIMESTAMP_HEADER) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => return Err(EnvelopeError::MissingDedupeToken),
    };

    if message.body().is_empty() {
        return Err(EnvelopeError::EmptyPayload);
    }

    Ok(Envelope {
        event_type,
        dedupe_token,
        payload: message.body,
    })
}
