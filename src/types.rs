use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Composite directory key (`name + "_" + mac`)
pub type DeviceKey = String;

/// Identity record of a controllable device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    /// Display name, not required to be unique
    pub name: String,

    /// Hardware address
    pub mac: String,

    /// Dotted-quad IPv4 address
    pub ip: String,
}

impl Device {
    pub fn new(name: impl Into<String>, mac: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mac: mac.into(),
            ip: ip.into(),
        }
    }
}

/// RGB plus warm-white and cool-white channel values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub warm_white: u8,
    pub cool_white: u8,
}

impl Color {
    pub fn new(red: u8, green: u8, blue: u8, warm_white: u8, cool_white: u8) -> Self {
        Self {
            red,
            green,
            blue,
            warm_white,
            cool_white,
        }
    }
}

/// Attributes observed by a live protocol query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub on: bool,

    #[serde(flatten)]
    pub color: Color,

    /// Active mode (e.g. "color", "white", "pattern")
    #[serde(default)]
    pub mode: Option<String>,

    /// Active built-in pattern
    #[serde(default)]
    pub pattern: Option<String>,

    #[serde(default)]
    pub speed: u8,

    /// Controller model byte
    #[serde(default)]
    pub device_type: u8,

    /// Controller-specific options
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

/// A directory entry: identity plus whatever is known about live state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DeviceEntry {
    /// Identity only
    Device { device: Device },

    /// Identity with the last successfully queried state
    #[serde(rename_all = "camelCase")]
    WithState {
        device: Device,
        state: DeviceState,
        queried_at: DateTime<Utc>,
    },

    /// Identity with the message of the last failed query
    WithError { device: Device, message: String },
}

impl DeviceEntry {
    pub fn device(&self) -> &Device {
        match self {
            DeviceEntry::Device { device }
            | DeviceEntry::WithState { device, .. }
            | DeviceEntry::WithError { device, .. } => device,
        }
    }

    pub fn into_device(self) -> Device {
        match self {
            DeviceEntry::Device { device }
            | DeviceEntry::WithState { device, .. }
            | DeviceEntry::WithError { device, .. } => device,
        }
    }

    /// Cached state, if the last query succeeded
    pub fn state(&self) -> Option<&DeviceState> {
        match self {
            DeviceEntry::WithState { state, .. } => Some(state),
            _ => None,
        }
    }

    /// Error message of the last failed query
    pub fn message(&self) -> Option<&str> {
        match self {
            DeviceEntry::WithError { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Identity-only view of this entry
    pub fn identity(&self) -> DeviceEntry {
        DeviceEntry::Device {
            device: self.device().clone(),
        }
    }

    /// Same variant carrying a different identity
    pub(crate) fn with_device(self, device: Device) -> DeviceEntry {
        match self {
            DeviceEntry::Device { .. } => DeviceEntry::Device { device },
            DeviceEntry::WithState {
                state, queried_at, ..
            } => DeviceEntry::WithState {
                device,
                state,
                queried_at,
            },
            DeviceEntry::WithError { message, .. } => DeviceEntry::WithError { device, message },
        }
    }
}

impl From<Device> for DeviceEntry {
    fn from(device: Device) -> Self {
        DeviceEntry::Device { device }
    }
}

/// Device identity paired with freshly queried state, returned by device commands
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceWithState {
    pub device: Device,
    pub state: DeviceState,
}

/// Per-device outcome of merging a discovery result into the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    pub device: Device,
    pub added: bool,

    /// Empty when added, the failure reason otherwise
    pub message: String,
}

/// Ordered map of results with the time it was produced
#[derive(Debug, Clone, Serialize)]
pub struct DeviceListing<T> {
    pub timestamp: DateTime<Utc>,
    pub devices: BTreeMap<DeviceKey, T>,
}

impl<T> DeviceListing<T> {
    pub fn new(devices: BTreeMap<DeviceKey, T>) -> Self {
        Self {
            timestamp: Utc::now(),
            devices,
        }
    }
}
