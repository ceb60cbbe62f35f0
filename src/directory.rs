use crate::cache::{self, CacheDecision};
use crate::client::RetryingClient;
use crate::error::{ConflictField, LightbridgeError, ProtocolError, Result};
use crate::lookup::{build_key, classify_lookup_key, LookupKey};
use crate::snapshot;
use crate::types::{Device, DeviceEntry, DeviceKey, DeviceState};
use chrono::Utc;
use futures_util::future::join_all;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Primary map and its lookup indices, always updated together under one lock
#[derive(Default)]
struct Indices {
    by_key: BTreeMap<DeviceKey, DeviceEntry>,
    key_by_mac: HashMap<String, DeviceKey>,
    key_by_ip: HashMap<String, DeviceKey>,
    /// Names may repeat, so each name maps to every key carrying it
    keys_by_name: HashMap<String, BTreeSet<DeviceKey>>,
}

impl Indices {
    fn check_unique(&self, key: &str, device: &Device) -> Result<()> {
        let field = if self.by_key.contains_key(key) {
            ConflictField::Key
        } else if self.key_by_mac.contains_key(&device.mac) {
            ConflictField::Mac
        } else if self.key_by_ip.contains_key(&device.ip) {
            ConflictField::Ip
        } else {
            return Ok(());
        };

        Err(LightbridgeError::Conflict {
            key: key.to_string(),
            field,
        })
    }

    fn insert(&mut self, key: DeviceKey, entry: DeviceEntry) {
        let device = entry.device();
        self.key_by_mac.insert(device.mac.clone(), key.clone());
        self.key_by_ip.insert(device.ip.clone(), key.clone());
        self.keys_by_name
            .entry(device.name.clone())
            .or_default()
            .insert(key.clone());
        self.by_key.insert(key, entry);
    }

    fn remove(&mut self, key: &str) -> Option<DeviceEntry> {
        let entry = self.by_key.remove(key)?;
        let device = entry.device();
        self.key_by_mac.remove(&device.mac);
        self.key_by_ip.remove(&device.ip);
        if let Some(keys) = self.keys_by_name.get_mut(&device.name) {
            keys.remove(key);
            if keys.is_empty() {
                self.keys_by_name.remove(&device.name);
            }
        }
        Some(entry)
    }

    fn clear(&mut self) {
        self.by_key.clear();
        self.key_by_mac.clear();
        self.key_by_ip.clear();
        self.keys_by_name.clear();
    }

    /// Resolve an `ip_or_name` lookup string to a composite key.
    ///
    /// Address-shaped strings only consult the IP index. Names that match
    /// nothing are tried as a literal composite key.
    fn resolve(&self, ip_or_name: &str) -> Result<DeviceKey> {
        let not_found = || LightbridgeError::NotFound(ip_or_name.to_string());
        if ip_or_name.trim().is_empty() {
            return Err(not_found());
        }

        match classify_lookup_key(ip_or_name) {
            LookupKey::Ip(ip) => self.key_by_ip.get(ip).cloned().ok_or_else(not_found),
            LookupKey::Name(name) => match self.keys_by_name.get(name) {
                Some(keys) if keys.len() > 1 => Err(LightbridgeError::AmbiguousName {
                    name: name.to_string(),
                    keys: keys.iter().cloned().collect(),
                }),
                Some(keys) => keys.first().cloned().ok_or_else(not_found),
                None if self.by_key.contains_key(name) => Ok(name.to_string()),
                None => Err(not_found()),
            },
        }
    }

    fn lookup(&self, ip_or_name: &str) -> Result<(DeviceKey, &DeviceEntry)> {
        let key = self.resolve(ip_or_name)?;
        let entry = self
            .by_key
            .get(&key)
            .ok_or_else(|| LightbridgeError::NotFound(ip_or_name.to_string()))?;
        Ok((key, entry))
    }
}

/// Persisted, multi-indexed directory of registered devices
///
/// Every entry is reachable by composite key, MAC, IP and name. Mutations
/// take the write lock, update all indices, and rewrite the snapshot file
/// before releasing it. Live state queries run without holding the lock.
pub struct DeviceDirectory {
    path: PathBuf,
    client: RetryingClient,
    indices: RwLock<Indices>,
    restored: bool,
}

impl DeviceDirectory {
    /// Open the directory backed by the snapshot at `path`.
    ///
    /// An existing snapshot seeds the directory and all indices; without one
    /// the directory starts empty and [`was_restored`](Self::was_restored)
    /// reports `false`.
    pub async fn open(path: impl Into<PathBuf>, client: RetryingClient) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(LightbridgeError::Config("device file cannot be blank".to_string()));
        }

        let mut indices = Indices::default();
        let restored = match snapshot::load(&path).await? {
            Some(devices) => {
                for (stored_key, device) in devices {
                    let key = build_key(&device);
                    if key != stored_key {
                        tracing::warn!("Snapshot key {} does not match device, using {}", stored_key, key);
                    }
                    match indices.check_unique(&key, &device) {
                        Ok(()) => indices.insert(key, device.into()),
                        Err(e) => tracing::warn!("Skipping snapshot entry: {}", e),
                    }
                }
                tracing::info!("Restored {} devices from {}", indices.by_key.len(), path.display());
                true
            }
            None => {
                tracing::info!("No device file at {}, starting empty", path.display());
                false
            }
        };

        Ok(Self {
            path,
            client,
            indices: RwLock::new(indices),
            restored,
        })
    }

    /// Whether the directory was seeded from an existing snapshot
    pub fn was_restored(&self) -> bool {
        self.restored
    }

    /// Location of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.indices.read().await.by_key.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.indices.read().await.by_key.is_empty()
    }

    /// Register a device.
    ///
    /// Fails with [`LightbridgeError::Conflict`] if its key, MAC or IP is
    /// already taken, leaving the directory unchanged.
    pub async fn add(&self, device: Device) -> Result<DeviceKey> {
        let key = build_key(&device);
        let mut indices = self.indices.write().await;

        indices.check_unique(&key, &device)?;
        tracing::info!("added device {} -> {}", key, device.ip);
        indices.insert(key.clone(), device.into());

        self.persist(&indices).await?;
        Ok(key)
    }

    /// Unregister the device `ip_or_name` resolves to and return it
    pub async fn remove(&self, ip_or_name: &str) -> Result<Device> {
        let mut indices = self.indices.write().await;

        let key = indices.resolve(ip_or_name)?;
        let entry = indices
            .remove(&key)
            .ok_or_else(|| LightbridgeError::NotFound(ip_or_name.to_string()))?;
        tracing::info!("removed device {}", key);

        self.persist(&indices).await?;
        Ok(entry.into_device())
    }

    /// Give a device a new name, which also gives it a new composite key.
    ///
    /// IP and MAC are kept, and so is any cached state or error.
    pub async fn rename(&self, ip_or_name: &str, new_name: &str) -> Result<DeviceKey> {
        if new_name.trim().is_empty() {
            return Err(LightbridgeError::InvalidName(new_name.to_string()));
        }

        let mut indices = self.indices.write().await;

        let old_key = indices.resolve(ip_or_name)?;
        let old_entry = indices
            .remove(&old_key)
            .ok_or_else(|| LightbridgeError::NotFound(ip_or_name.to_string()))?;

        let old_device = old_entry.device();
        let renamed = Device {
            name: new_name.to_string(),
            mac: old_device.mac.clone(),
            ip: old_device.ip.clone(),
        };
        let new_key = build_key(&renamed);
        tracing::info!("Renaming {} to {}", old_key, new_key);
        indices.insert(new_key.clone(), old_entry.with_device(renamed));

        self.persist(&indices).await?;
        Ok(new_key)
    }

    /// Look up one device, applying the cache policy to its state.
    ///
    /// A failed live query is not an error: the entry degrades to
    /// [`DeviceEntry::WithError`] and is returned.
    pub async fn get(&self, ip_or_name: &str, include_state: bool, use_cache: bool) -> Result<DeviceEntry> {
        let (key, entry) = {
            let indices = self.indices.read().await;
            let (key, entry) = indices.lookup(ip_or_name)?;
            (key, entry.clone())
        };

        Ok(self.resolve_state(&key, entry, include_state, use_cache).await)
    }

    /// All devices in key order, applying the cache policy to each one.
    ///
    /// Live queries run concurrently; an unreachable device degrades its own
    /// entry without affecting the rest.
    pub async fn list(&self, include_state: bool, use_cache: bool) -> BTreeMap<DeviceKey, DeviceEntry> {
        let entries: Vec<(DeviceKey, DeviceEntry)> = {
            let indices = self.indices.read().await;
            indices
                .by_key
                .iter()
                .map(|(key, entry)| (key.clone(), entry.clone()))
                .collect()
        };

        let resolved = join_all(entries.into_iter().map(|(key, entry)| async move {
            let entry = self.resolve_state(&key, entry, include_state, use_cache).await;
            (key, entry)
        }))
        .await;

        resolved.into_iter().collect()
    }

    /// Remove every device and persist an empty snapshot
    pub async fn clear(&self) -> Result<()> {
        let mut indices = self.indices.write().await;
        indices.clear();
        tracing::info!("cleared devices");
        self.persist(&indices).await
    }

    async fn resolve_state(
        &self,
        key: &str,
        entry: DeviceEntry,
        include_state: bool,
        use_cache: bool,
    ) -> DeviceEntry {
        match cache::plan(&entry, include_state, use_cache) {
            CacheDecision::Strip => entry.identity(),
            CacheDecision::Serve => entry,
            CacheDecision::Query => {
                let device = entry.into_device();
                let outcome = self.client.query_state(&device.ip).await;
                self.record_query(key, device, &outcome).await
            }
        }
    }

    /// Store the outcome of a live query against the entry at `key`.
    ///
    /// The result is only cached if the entry still carries the same
    /// identity; a device renamed or removed meanwhile is left alone.
    pub(crate) async fn record_query(
        &self,
        key: &str,
        device: Device,
        outcome: &std::result::Result<DeviceState, ProtocolError>,
    ) -> DeviceEntry {
        let entry = match outcome {
            Ok(state) => DeviceEntry::WithState {
                device,
                state: state.clone(),
                queried_at: Utc::now(),
            },
            Err(e) => {
                tracing::error!("While querying device state for {}: {}", key, e);
                DeviceEntry::WithError {
                    device,
                    message: e.to_string(),
                }
            }
        };

        let mut indices = self.indices.write().await;
        match indices.by_key.get_mut(key) {
            Some(stored) if stored.device() == entry.device() => *stored = entry.clone(),
            _ => tracing::debug!("{} changed during state query, result not cached", key),
        }

        entry
    }

    async fn persist(&self, indices: &Indices) -> Result<()> {
        let devices = indices.by_key.iter().map(|(key, entry)| (key, entry.device()));
        if let Err(e) = snapshot::store(&self.path, devices).await {
            tracing::error!("Failed to persist device directory: {}", e);
            return Err(e);
        }
        Ok(())
    }
}
