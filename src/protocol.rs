use crate::error::ProtocolError;
use crate::types::{Color, Device, DeviceKey, DeviceState};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// Capability surface of the wire-level device protocol
///
/// Implementations own UDP discovery and the binary control messages. Every
/// call may fail; [`ProtocolError::is_transient`] decides whether the
/// [`RetryingClient`](crate::RetryingClient) tries again.
#[async_trait]
pub trait DeviceProtocol: Send + Sync {
    /// Broadcast a discovery probe and collect answers until `timeout` elapses
    async fn discover(&self, timeout: Duration) -> Result<BTreeMap<DeviceKey, Device>, ProtocolError>;

    /// Read the live state of the device at `ip`
    async fn query_state(&self, ip: &str) -> Result<DeviceState, ProtocolError>;

    /// Switch the device on; `false` means the device refused
    async fn turn_on(&self, ip: &str) -> Result<bool, ProtocolError>;

    /// Switch the device off; `false` means the device refused
    async fn turn_off(&self, ip: &str) -> Result<bool, ProtocolError>;

    /// Set all color channels at once
    async fn set_color(&self, color: Color, ip: &str) -> Result<bool, ProtocolError>;
}
