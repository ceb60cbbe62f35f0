//! Full-snapshot persistence of directory identities.
//!
//! The file holds a JSON object mapping composite keys to `{name, mac, ip}`
//! records and is rewritten in full on every mutation.

use crate::error::{LightbridgeError, Result};
use crate::types::{Device, DeviceKey};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Read a snapshot. Returns `None` when no file exists at `path`.
pub async fn load(path: &Path) -> Result<Option<BTreeMap<DeviceKey, Device>>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(persist_error(path, e)),
    };

    let devices: BTreeMap<DeviceKey, Device> = serde_json::from_slice(&bytes)?;
    tracing::debug!("Loaded {} devices from {}", devices.len(), path.display());
    Ok(Some(devices))
}

/// Replace the snapshot at `path` with `devices`.
///
/// The file handle is closed on every exit path; write and sync failures
/// are reported as [`LightbridgeError::Persist`].
pub async fn store<'a, I>(path: &Path, devices: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a DeviceKey, &'a Device)>,
{
    let snapshot: BTreeMap<&DeviceKey, &Device> = devices.into_iter().collect();
    let json = serde_json::to_vec_pretty(&snapshot)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| persist_error(path, e))?;
    }

    let mut file = File::create(path).await.map_err(|e| persist_error(path, e))?;
    file.write_all(&json).await.map_err(|e| persist_error(path, e))?;
    file.sync_all().await.map_err(|e| persist_error(path, e))?;

    tracing::debug!("Persisted {} devices to {}", snapshot.len(), path.display());
    Ok(())
}

fn persist_error(path: &Path, source: std::io::Error) -> LightbridgeError {
    LightbridgeError::Persist {
        path: path.to_path_buf(),
        source,
    }
}
