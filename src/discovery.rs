use crate::directory::DeviceDirectory;
use crate::error::LightbridgeError;
use crate::lookup::build_key;
use crate::types::{Device, DeviceKey, DiscoveredDevice};
use std::collections::BTreeMap;

/// Merge freshly discovered devices into the directory.
///
/// Devices are registered one at a time in ascending key order. A conflict
/// or persistence failure is recorded against that device and the merge
/// moves on, so the report always covers every discovered device. The
/// report is keyed by composite key.
pub async fn reconcile(
    directory: &DeviceDirectory,
    discovered: BTreeMap<DeviceKey, Device>,
) -> BTreeMap<DeviceKey, DiscoveredDevice> {
    let mut report = BTreeMap::new();

    for (_discovery_key, device) in discovered {
        let key = build_key(&device);
        let outcome = match directory.add(device.clone()).await {
            Ok(_) => DiscoveredDevice {
                device,
                added: true,
                message: String::new(),
            },
            Err(e) => {
                match &e {
                    LightbridgeError::Conflict { .. } => {
                        tracing::warn!("While discovering devices: {}", e)
                    }
                    _ => tracing::error!("While discovering devices: {}", e),
                }
                DiscoveredDevice {
                    device,
                    added: false,
                    message: e.to_string(),
                }
            }
        };
        // the same device reported twice keeps its first outcome
        report.entry(key).or_insert(outcome);
    }

    let added = report.values().filter(|d| d.added).count();
    tracing::info!("Discovery merged {} of {} devices", added, report.len());
    report
}
