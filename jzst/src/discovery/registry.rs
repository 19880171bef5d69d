use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;

use crate::protocol::constants::CONTROL_PORT;

/// A peer seen on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub ip: IpAddr,
    pub platform: String,
    pub control_port: u16,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, ip: IpAddr, platform: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ip,
            platform: platform.into(),
            control_port: CONTROL_PORT,
        }
    }
}

/// Observer notified the first time a device is sighted.
pub trait DeviceObserver: Send + Sync + 'static {
    fn on_device_found(&self, device: &DeviceInfo);
}

impl<F> DeviceObserver for F
where
    F: Fn(&DeviceInfo) + Send + Sync + 'static,
{
    fn on_device_found(&self, device: &DeviceInfo) {
        self(device)
    }
}

/// No-op observer for callers that only poll [`DeviceRegistry::snapshot`].
impl DeviceObserver for () {
    fn on_device_found(&self, _device: &DeviceInfo) {}
}

/// Known devices keyed by IP. The last beacon for an IP replaces the entry.
pub struct DeviceRegistry {
    devices: Mutex<HashMap<IpAddr, DeviceInfo>>,
    observer: Box<dyn DeviceObserver>,
}

impl DeviceRegistry {
    pub fn new(observer: impl DeviceObserver) -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
            observer: Box::new(observer),
        }
    }

    /// Upserts `device`. The observer fires, outside the lock, only when the
    /// IP was not known before. Returns whether the device was new.
    pub fn register(&self, device: DeviceInfo) -> bool {
        let is_new = {
            let mut devices = self.devices.lock().unwrap_or_else(|e| e.into_inner());
            devices.insert(device.ip, device.clone()).is_none()
        };
        if is_new {
            tracing::debug!(ip = %device.ip, name = %device.name, "device_found");
            self.observer.on_device_found(&device);
        }
        is_new
    }

    /// Point-in-time copy of all known devices.
    pub fn snapshot(&self) -> Vec<DeviceInfo> {
        self.devices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn get(&self, ip: IpAddr) -> Option<DeviceInfo> {
        self.devices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&ip)
            .cloned()
    }
}
