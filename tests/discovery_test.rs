// Integration tests for discovery reconciliation.

mod common;

use common::{open_directory, FakeProtocol};
use lightbridge::{reconcile, Device};
use std::collections::BTreeMap;

fn discovered(devices: &[Device]) -> BTreeMap<String, Device> {
    devices.iter().map(|d| (d.mac.clone(), d.clone())).collect()
}

#[tokio::test]
async fn test_conflicting_device_does_not_block_others() {
    let dir = tempfile::tempdir().unwrap();
    let directory = open_directory(&dir.path().join("devices.json"), FakeProtocol::new()).await;
    let existing = Device::new("c", "CC:CC", "10.0.0.3");
    directory.add(existing.clone()).await.unwrap();

    let a = Device::new("a", "AA:AA", "10.0.0.1");
    let b = Device::new("b", "CC:CC", "10.0.0.2");
    let d = Device::new("d", "DD:DD", "10.0.0.4");

    let report = reconcile(&directory, discovered(&[a.clone(), b.clone(), d.clone()])).await;

    assert_eq!(report.len(), 3);
    assert!(report["a_AA:AA"].added);
    assert!(report["d_DD:DD"].added);

    let rejected = &report["b_CC:CC"];
    assert!(!rejected.added);
    assert_eq!(rejected.device, b);
    assert!(rejected.message.contains("field: 'mac'"), "{}", rejected.message);
    assert!(report["a_AA:AA"].message.is_empty());

    let keys: Vec<_> = directory.list(false, false).await.into_keys().collect();
    assert_eq!(keys, vec!["a_AA:AA", "c_CC:CC", "d_DD:DD"]);
    assert_eq!(
        directory.get("10.0.0.3", false, false).await.unwrap().device(),
        &existing
    );
}

#[tokio::test]
async fn test_rediscovery_reports_every_device_as_known() {
    let dir = tempfile::tempdir().unwrap();
    let directory = open_directory(&dir.path().join("devices.json"), FakeProtocol::new()).await;
    let devices = [
        Device::new("a", "AA:AA", "10.0.0.1"),
        Device::new("b", "BB:BB", "10.0.0.2"),
    ];

    let first = reconcile(&directory, discovered(&devices)).await;
    let second = reconcile(&directory, discovered(&devices)).await;

    assert!(first.values().all(|outcome| outcome.added));
    assert!(second.values().all(|outcome| !outcome.added));
    assert!(second.values().all(|outcome| outcome.message.contains("field: 'key'")));
    assert_eq!(directory.len().await, 2);
}

#[tokio::test]
async fn test_empty_discovery_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let directory = open_directory(&dir.path().join("devices.json"), FakeProtocol::new()).await;

    let report = reconcile(&directory, BTreeMap::new()).await;

    assert!(report.is_empty());
    assert!(directory.is_empty().await);
}

#[tokio::test]
async fn test_persist_failure_is_reported_per_device() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("state");
    let directory = open_directory(&blocker.join("devices.json"), FakeProtocol::new()).await;
    std::fs::write(&blocker, "").unwrap();

    let a = Device::new("a", "AA:AA", "10.0.0.1");
    let b = Device::new("b", "BB:BB", "10.0.0.2");
    let report = reconcile(&directory, discovered(&[a, b])).await;

    assert_eq!(report.len(), 2);
    for (key, outcome) in &report {
        assert!(!outcome.added, "{key} reported as added");
        assert!(outcome.message.starts_with("Snapshot I/O error"), "{}", outcome.message);
    }
    // both were attempted and stay registered in memory
    assert_eq!(directory.len().await, 2);
}
