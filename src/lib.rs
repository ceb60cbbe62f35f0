//! Device directory and control bridge for networked RGB light controllers
//!
//! This library keeps a persisted registry of controllable devices and
//! reconciles it with an unreliable device protocol. It provides:
//!
//! - A directory indexed by composite key (`name_mac`), MAC, IP and name,
//!   with uniqueness enforced on key, MAC and IP
//! - Full-snapshot persistence to a JSON file after every mutation
//! - Discovery merge with per-device conflict reporting
//! - Cached live state with per-read freshness control
//! - Retries with fixed or exponential backoff on transient protocol failures
//!
//! The wire protocol itself is supplied by the caller through the
//! [`DeviceProtocol`] trait.
//!
//! # Quick Start
//!
//! ```no_run
//! use lightbridge::{Color, DeviceProtocol, Lightbridge, LightbridgeConfig};
//! use std::sync::Arc;
//!
//! async fn run(protocol: Arc<dyn DeviceProtocol>) -> lightbridge::Result<()> {
//!     let config = LightbridgeConfig::load(Some("lightbridge.toml".as_ref()))?;
//!     let bridge = Lightbridge::open(&config, protocol).await?;
//!
//!     // Cached state where available, live queries for the rest
//!     let listing = bridge.devices(true, true).await;
//!     for (key, entry) in &listing.devices {
//!         println!("{}: {:?}", key, entry.state());
//!     }
//!
//!     // Devices resolve by IP or by name
//!     bridge.set_color("192.168.1.40", Color::new(255, 80, 0, 0, 0)).await?;
//!     bridge.rename_device("192.168.1.40", "porch").await?;
//!     bridge.turn_off("porch").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Bridge**: service-level operations and bootstrap
//! - **Directory**: lock-guarded indices, lookup resolution, cache application
//! - **Discovery**: merging discovered devices into the directory
//! - **Client**: retry policy around the device protocol
//! - **Snapshot**: scoped reads and writes of the device file
//! - **Types**: identity, state and entry types

mod bridge;
mod cache;
mod client;
mod config;
mod directory;
mod discovery;
mod error;
mod lookup;
mod protocol;
mod snapshot;
mod types;

// Public exports
pub use bridge::Lightbridge;
pub use client::{RetryPolicy, RetryingClient};
pub use config::{DiscoveryConfig, LightbridgeConfig, PersistenceConfig, RetryConfig};
pub use directory::DeviceDirectory;
pub use discovery::reconcile;
pub use error::{ConflictField, LightbridgeError, ProtocolError, Result};
pub use lookup::{build_key, classify_lookup_key, LookupKey};
pub use protocol::DeviceProtocol;
pub use types::{
    Color, Device, DeviceEntry, DeviceKey, DeviceListing, DeviceState, DeviceWithState,
    DiscoveredDevice,
};
