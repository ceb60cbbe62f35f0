use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for Lightbridge operations
pub type Result<T> = std::result::Result<T, LightbridgeError>;

/// Uniqueness constraint that rejected a new directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    /// Composite `name_mac` key
    Key,
    Mac,
    Ip,
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictField::Key => f.write_str("key"),
            ConflictField::Mac => f.write_str("mac"),
            ConflictField::Ip => f.write_str("ip"),
        }
    }
}

/// Errors that can occur when operating on the device directory
#[derive(Error, Debug)]
pub enum LightbridgeError {
    /// A device with the same key, MAC or IP is already registered
    #[error("'{key}' already exists, field: '{field}'")]
    Conflict {
        /// Composite key of the rejected device
        key: String,
        field: ConflictField,
    },

    /// The lookup string resolved to no device
    #[error("{0} is not registered as a device")]
    NotFound(String),

    /// The name is shared by several devices; look up by IP or composite key instead
    #[error("'{name}' matches several devices: {}", .keys.join(", "))]
    AmbiguousName { name: String, keys: Vec<String> },

    /// A replacement device name was blank
    #[error("Invalid device name: '{0}'")]
    InvalidName(String),

    /// The device answered a command with a negative acknowledgement
    #[error("{target} could not be {action}")]
    CommandFailed { target: String, action: &'static str },

    /// Writing or reading the directory snapshot failed
    #[error("Snapshot I/O error on {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot could not be encoded or decoded
    #[error("Snapshot format error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Device protocol failure that was not absorbed into a degraded entry
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<figment::Error> for LightbridgeError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Errors reported by the device protocol collaborator
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Socket-level failure (refused, reset, unreachable)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device did not answer in time
    #[error("Request timeout")]
    Timeout,

    /// The message could not be delivered or was rejected
    #[error("Message error: {0}")]
    Message(String),

    /// The device reported an error condition
    #[error("Device error: {0}")]
    Device(String),

    /// Network discovery failed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Invalid or unexpected response from the device
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProtocolError {
    /// Returns `true` for connection-level failures worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout)
    }
}
