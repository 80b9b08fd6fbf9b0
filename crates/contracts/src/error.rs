//! Layered error definitions
//!
//! Categorized by source: config / protocol / wire / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Protocol Errors =====
    /// Event subtype outside the fixed vocabulary
    #[error("protocol violation: invalid event type '{event_type}', expected 'play_start' or 'reset'")]
    ProtocolViolation { event_type: String },

    // ===== Wire Errors =====
    /// Inbound payload could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Outbound message could not be encoded
    #[error("encode error for '{kind}': {message}")]
    Encode { kind: String, message: String },

    // ===== Sink Errors =====
    /// Pose persistence error
    #[error("pose sink '{sink_name}' error: {message}")]
    PoseSink { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create protocol violation error
    pub fn protocol_violation(event_type: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            event_type: event_type.into(),
        }
    }

    /// Create encode error
    pub fn encode(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create pose sink error
    pub fn pose_sink(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PoseSink {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}

/// Wire decode failures
///
/// Every variant means the datagram is dropped; none of them is fatal.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Datagram is not valid UTF-8
    #[error("payload is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Datagram is not a well-formed JSON envelope
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Envelope lacks a field required by its declared type
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    /// Payload does not match the shape of its declared subtype
    #[error("invalid '{kind}' payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Short label for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Utf8(_) => "utf8",
            Self::Malformed(_) => "malformed",
            Self::MissingField { .. } => "missing_field",
            Self::InvalidPayload { .. } => "invalid_payload",
        }
    }
}
