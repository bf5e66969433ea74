//! Common error types used across the workspace.
//!
//! Each failure family from the radio link has its own typed error so callers
//! can match on exactly what went wrong. Layers above wrap these via `#[from]`.

/// Invalid field values on an outbound [`RfCommand`](crate::rf_command::RfCommand).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// The code payload is empty.
    #[error("command code must not be empty")]
    EmptyCode,

    /// The code contains the field separator and would corrupt the frame.
    #[error("command code must not contain ','")]
    SeparatorInCode,

    /// The protocol number is outside the range the firmware understands.
    #[error("protocol {0} is outside 1..=6")]
    ProtocolOutOfRange(u8),

    /// A zero repeat count would transmit nothing.
    #[error("repeat count must be positive")]
    ZeroRepeat,
}

/// A malformed inbound notification payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not valid UTF-8 text.
    #[error("payload is not valid UTF-8")]
    NotUtf8,

    /// The payload was empty after trimming.
    #[error("payload is empty")]
    Empty,

    /// The compact form did not have exactly three fields.
    #[error("expected 3 comma-separated fields, got {0}")]
    FieldCount(usize),

    /// The structured form could not be parsed as a key/value record.
    #[error("malformed structured payload: {0}")]
    Structured(String),

    /// The `raw` code field is missing or empty.
    #[error("raw code is empty")]
    EmptyRaw,

    /// The frequency field is missing or zero.
    #[error("frequency is missing or zero")]
    MissingFrequency,

    /// The protocol field is missing or zero.
    #[error("protocol is missing or zero")]
    MissingProtocol,

    /// The protocol field is not a small positive integer.
    #[error("protocol {0:?} is not a valid number")]
    InvalidProtocol(String),
}

/// The link-layer connection or service discovery failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("connection failed: {reason}")]
pub struct ConnectError {
    /// Human-readable reason reported by the radio stack.
    pub reason: String,
}

impl ConnectError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A command write was not accepted by the peripheral stack.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("write rejected: {reason}")]
pub struct WriteError {
    /// Human-readable reason reported by the radio stack.
    pub reason: String,
}

impl WriteError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Peripheral discovery could not be started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("discovery failed: {reason}")]
pub struct DiscoveryError {
    /// Human-readable reason reported by the radio stack.
    pub reason: String,
}

impl DiscoveryError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Radio access is not available to this process.
///
/// Resolved by the user (grant permission, plug in an adapter), never by the
/// core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    /// The OS refused access to the radio.
    #[error("radio permission denied")]
    Denied,

    /// No radio adapter is present or powered.
    #[error("no radio adapter available")]
    AdapterUnavailable,
}

/// Domain invariant violations on user-supplied records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// An alias must not be blank.
    #[error("alias must not be empty")]
    EmptyAlias,

    /// A saved code index does not exist.
    #[error("no saved code at position {0}")]
    UnknownPosition(usize),

    /// The embedded command is not encodable.
    #[error("invalid command")]
    Command(#[from] EncodingError),
}

/// Failure reported by a persistence collaborator.
#[derive(Debug, thiserror::Error)]
#[error("storage error")]
pub struct StorageError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

impl StorageError {
    /// Box any error as a storage failure.
    #[must_use]
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(err))
    }
}
