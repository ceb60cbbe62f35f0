#![allow(dead_code)]
// Scripted in-memory device protocol shared by the integration tests.

use async_trait::async_trait;
use lightbridge::{
    Color, Device, DeviceDirectory, DeviceKey, DeviceProtocol, DeviceState, ProtocolError,
    RetryPolicy, RetryingClient,
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Failure to inject into the next call
#[derive(Debug, Clone, Copy)]
pub enum Fail {
    /// Connection refused, retried by the client
    Transient,
    /// Device rejected the message, never retried
    Permanent,
}

impl Fail {
    fn to_error(self) -> ProtocolError {
        match self {
            Fail::Transient => ProtocolError::Io(io::Error::from(io::ErrorKind::ConnectionRefused)),
            Fail::Permanent => ProtocolError::Message("checksum mismatch".into()),
        }
    }
}

#[derive(Default)]
pub struct FakeProtocol {
    discovered: Mutex<BTreeMap<DeviceKey, Device>>,
    discover_calls: AtomicUsize,
    power: Mutex<HashMap<String, bool>>,
    colors: Mutex<HashMap<String, Color>>,
    unreachable: Mutex<HashSet<String>>,
    query_failures: Mutex<HashMap<String, VecDeque<Fail>>>,
    queries: Mutex<HashMap<String, usize>>,
    nack: AtomicBool,
    discovery_down: AtomicBool,
    gate: Mutex<Option<QueryGate>>,
}

/// Holds state queries until released
#[derive(Clone, Default)]
pub struct QueryGate {
    /// Signalled each time a query reaches the gate
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl FakeProtocol {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Devices answering the next discovery probes, keyed by MAC
    pub fn set_discovered(&self, devices: &[Device]) {
        *self.discovered.lock().unwrap() = devices
            .iter()
            .map(|d| (d.mac.clone(), d.clone()))
            .collect();
    }

    /// Every query to `ip` times out
    pub fn set_unreachable(&self, ip: &str) {
        self.unreachable.lock().unwrap().insert(ip.to_string());
    }

    /// Fail the next queries to `ip` in order, then answer normally
    pub fn fail_queries(&self, ip: &str, failures: &[Fail]) {
        self.query_failures
            .lock()
            .unwrap()
            .entry(ip.to_string())
            .or_default()
            .extend(failures.iter().copied());
    }

    /// Answer commands with a negative acknowledgement
    pub fn refuse_commands(&self) {
        self.nack.store(true, Ordering::SeqCst);
    }

    /// Every discovery probe fails
    pub fn fail_discovery(&self) {
        self.discovery_down.store(true, Ordering::SeqCst);
    }

    /// Park state queries at a gate until the caller releases them
    pub fn hold_queries(&self) -> QueryGate {
        let gate = QueryGate::default();
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Let queries through again without waiting
    pub fn open_gate(&self) {
        *self.gate.lock().unwrap() = None;
    }

    pub fn queries(&self, ip: &str) -> usize {
        self.queries.lock().unwrap().get(ip).copied().unwrap_or(0)
    }

    pub fn discover_calls(&self) -> usize {
        self.discover_calls.load(Ordering::SeqCst)
    }

    fn state_of(&self, ip: &str) -> DeviceState {
        DeviceState {
            on: self.power.lock().unwrap().get(ip).copied().unwrap_or(false),
            color: self.colors.lock().unwrap().get(ip).copied().unwrap_or_default(),
            mode: Some("color".into()),
            pattern: None,
            speed: 16,
            device_type: 0x33,
            options: BTreeMap::new(),
        }
    }
}

#[async_trait]
impl DeviceProtocol for FakeProtocol {
    async fn discover(&self, _timeout: Duration) -> Result<BTreeMap<DeviceKey, Device>, ProtocolError> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        if self.discovery_down.load(Ordering::SeqCst) {
            return Err(ProtocolError::Discovery("no broadcast route".into()));
        }
        Ok(self.discovered.lock().unwrap().clone())
    }

    async fn query_state(&self, ip: &str) -> Result<DeviceState, ProtocolError> {
        *self.queries.lock().unwrap().entry(ip.to_string()).or_default() += 1;

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }

        if self.unreachable.lock().unwrap().contains(ip) {
            return Err(ProtocolError::Timeout);
        }
        let scripted = self
            .query_failures
            .lock()
            .unwrap()
            .get_mut(ip)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(fail) => Err(fail.to_error()),
            None => Ok(self.state_of(ip)),
        }
    }

    async fn turn_on(&self, ip: &str) -> Result<bool, ProtocolError> {
        if self.nack.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.power.lock().unwrap().insert(ip.to_string(), true);
        Ok(true)
    }

    async fn turn_off(&self, ip: &str) -> Result<bool, ProtocolError> {
        if self.nack.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.power.lock().unwrap().insert(ip.to_string(), false);
        Ok(true)
    }

    async fn set_color(&self, color: Color, ip: &str) -> Result<bool, ProtocolError> {
        if self.nack.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.colors.lock().unwrap().insert(ip.to_string(), color);
        Ok(true)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn client(protocol: Arc<FakeProtocol>) -> RetryingClient {
    RetryingClient::new(
        protocol,
        RetryPolicy::fixed(3, Duration::from_millis(1)),
        Duration::from_millis(10),
    )
}

pub async fn open_directory(path: &Path, protocol: Arc<FakeProtocol>) -> DeviceDirectory {
    init_tracing();
    DeviceDirectory::open(path, client(protocol)).await.unwrap()
}

pub fn lamp() -> Device {
    Device::new("lamp", "AA:BB", "10.0.0.2")
}
