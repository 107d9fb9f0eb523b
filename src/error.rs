//! Error types for Chat Gate.

/// Top-level error type for the gate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Responder error: {0}")]
    Responder(#[from] ResponderError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Malformed administrative commands. Reported back to the operator as a
/// usage string; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Missing approval argument")]
    MissingArgument,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Unknown duration unit: {0}")]
    UnknownUnit(String),

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Amount is too large")]
    AmountTooLarge,

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("No target: reply to a message or pass +<phone>")]
    MissingTarget,
}

/// Failures of the assisted-conversation collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ResponderError {
    #[error("Responder is not configured")]
    Unavailable,

    #[error("Responder {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Unexpected faults inside an in-memory store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{store} lock poisoned")]
    Poisoned { store: &'static str },
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// Result type alias for the gate.
pub type Result<T> = std::result::Result<T, Error>;
