use crate::client::{RetryPolicy, RetryingClient};
use crate::config::LightbridgeConfig;
use crate::directory::DeviceDirectory;
use crate::discovery::reconcile;
use crate::error::{LightbridgeError, Result};
use crate::lookup::build_key;
use crate::protocol::DeviceProtocol;
use crate::types::{Color, Device, DeviceEntry, DeviceKey, DeviceListing, DeviceWithState, DiscoveredDevice};
use std::sync::Arc;

/// Entry point for the service layer
///
/// `Lightbridge` owns the device directory and the retrying protocol client,
/// and exposes every operation a front end needs: discovery, directory
/// reads and edits, and the live device commands.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use lightbridge::{DeviceProtocol, Lightbridge, LightbridgeConfig};
/// # async fn run(protocol: Arc<dyn DeviceProtocol>) -> lightbridge::Result<()> {
/// let config = LightbridgeConfig::load(None)?;
/// let bridge = Lightbridge::open(&config, protocol).await?;
///
/// let report = bridge.discover_devices().await?;
/// for (key, outcome) in &report.devices {
///     println!("{}: added={} {}", key, outcome.added, outcome.message);
/// }
///
/// bridge.turn_on("kitchen").await?;
/// # Ok(())
/// # }
/// ```
pub struct Lightbridge {
    directory: DeviceDirectory,
    client: RetryingClient,
}

impl Lightbridge {
    /// Open the directory configured in `config`.
    ///
    /// Without an existing device file, an initial discovery runs first; only
    /// once it succeeds is an empty snapshot written and every answering
    /// device registered. Individual conflicts in that pass are logged. A
    /// failed discovery is returned and leaves no file behind, so the next
    /// start discovers again.
    pub async fn open(config: &LightbridgeConfig, protocol: Arc<dyn DeviceProtocol>) -> Result<Self> {
        config.validate()?;

        let client = RetryingClient::new(
            protocol,
            RetryPolicy::from(&config.retry),
            config.discovery.timeout(),
        );
        let directory = DeviceDirectory::open(config.persistence.location.clone(), client.clone()).await?;
        let bridge = Self { directory, client };

        if !bridge.directory.was_restored() {
            let discovered = bridge.client.discover().await?;
            bridge.directory.clear().await?;
            reconcile(&bridge.directory, discovered).await;
        }

        Ok(bridge)
    }

    pub fn directory(&self) -> &DeviceDirectory {
        &self.directory
    }

    /// Run discovery and merge the result, reporting each device's outcome
    pub async fn discover_devices(&self) -> Result<DeviceListing<DiscoveredDevice>> {
        let discovered = self.client.discover().await?;
        Ok(DeviceListing::new(reconcile(&self.directory, discovered).await))
    }

    pub async fn device(&self, ip_or_name: &str, include_state: bool, use_cache: bool) -> Result<DeviceEntry> {
        self.directory.get(ip_or_name, include_state, use_cache).await
    }

    pub async fn devices(&self, include_state: bool, use_cache: bool) -> DeviceListing<DeviceEntry> {
        DeviceListing::new(self.directory.list(include_state, use_cache).await)
    }

    pub async fn delete_device(&self, ip_or_name: &str) -> Result<Device> {
        self.directory.remove(ip_or_name).await
    }

    pub async fn rename_device(&self, ip_or_name: &str, new_name: &str) -> Result<DeviceKey> {
        self.directory.rename(ip_or_name, new_name).await
    }

    pub async fn turn_on(&self, ip_or_name: &str) -> Result<DeviceWithState> {
        let device = self.resolve(ip_or_name).await?;
        let acked = self.client.turn_on(&device.ip).await?;
        confirm(ip_or_name, "turned on", acked)?;
        self.refresh(device).await
    }

    pub async fn turn_off(&self, ip_or_name: &str) -> Result<DeviceWithState> {
        let device = self.resolve(ip_or_name).await?;
        let acked = self.client.turn_off(&device.ip).await?;
        confirm(ip_or_name, "turned off", acked)?;
        self.refresh(device).await
    }

    pub async fn set_color(&self, ip_or_name: &str, color: Color) -> Result<DeviceWithState> {
        let device = self.resolve(ip_or_name).await?;
        let acked = self.client.set_color(color, &device.ip).await?;
        confirm(&format!("{} color", ip_or_name), "changed", acked)?;
        self.refresh(device).await
    }

    /// Query the live state of one device.
    ///
    /// Unlike [`device`](Self::device), a failed query is returned as an
    /// error (the entry is still marked with the failure).
    pub async fn device_state(&self, ip_or_name: &str) -> Result<DeviceWithState> {
        let device = self.resolve(ip_or_name).await?;
        self.refresh(device).await
    }

    async fn resolve(&self, ip_or_name: &str) -> Result<Device> {
        Ok(self.directory.get(ip_or_name, false, false).await?.into_device())
    }

    /// Query `device` once and cache the outcome in the directory
    async fn refresh(&self, device: Device) -> Result<DeviceWithState> {
        let key = build_key(&device);
        let outcome = self.client.query_state(&device.ip).await;
        self.directory.record_query(&key, device.clone(), &outcome).await;

        Ok(DeviceWithState {
            device,
            state: outcome?,
        })
    }
}

fn confirm(target: &str, action: &'static str, acked: bool) -> Result<()> {
    if acked {
        return Ok(());
    }
    tracing::warn!("{} could not be {}", target, action);
    Err(LightbridgeError::CommandFailed {
        target: target.to_string(),
        action,
    })
}
