//! Error taxonomy shared by the property store, the command surface and the
//! Home Assistant client.

use thiserror::Error;

use crate::mpris::Property;

/// Result type used throughout the bridge.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Get/Set on a name that is not declared for the interface.
    #[error("unknown property '{name}' on {interface}")]
    UnknownProperty { interface: &'static str, name: String },

    #[error("property {0} is read-only")]
    ReadOnlyProperty(Property),

    /// The incoming value could not be converted to the declared type.
    #[error("cannot store {found} in {property} (expected {expected})")]
    TypeCoercion {
        property: Property,
        expected: &'static str,
        found: &'static str,
    },

    /// A capability flag gating the command is false.
    #[error("{command} is not allowed ({flag} is false)")]
    OperationNotAllowed {
        command: &'static str,
        flag: Property,
    },

    #[error("{0} is not supported")]
    UnsupportedOperation(&'static str),

    #[error("invalid value for {command}: {reason}")]
    InvalidValue {
        command: &'static str,
        reason: String,
    },

    #[error("unknown media player state '{0}'")]
    UnknownState(String),

    #[error("player has not been registered yet")]
    PlayerNotRegistered,

    #[error("entity '{0}' not found")]
    EntityNotFound(String),

    #[error("multiple entities match '{name}': {matches}")]
    AmbiguousEntity { name: String, matches: String },

    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error result returned by the Home Assistant websocket API.
    #[error("Home Assistant error {code}: {message}")]
    HomeAssistant { code: String, message: String },

    #[error("authentication with Home Assistant failed: {0}")]
    AuthFailed(String),

    #[error("unexpected message from Home Assistant: {0}")]
    UnexpectedMessage(String),

    #[error("request timeout")]
    Timeout,

    #[error("connection closed")]
    ConnectionClosed,
}
