use std::sync::Arc;

use zbus::zvariant::OwnedObjectPath;

use crate::{Property, core::device::NetworkDevice};

/// Peer table keyed by supplicant object path.
///
/// The registry is the sole owner of [`NetworkDevice`] values; everything
/// else holds non-owning `Arc` clones. Removal cancels the device's
/// monitoring token.
#[derive(Debug, Clone)]
pub(crate) struct DeviceRegistry {
    devices: Property<Vec<Arc<NetworkDevice>>>,
}

impl DeviceRegistry {
    pub(crate) fn new() -> Self {
        Self {
            devices: Property::new(Vec::new()),
        }
    }

    /// The reactive view handed to the service surface.
    pub(crate) fn view(&self) -> Property<Vec<Arc<NetworkDevice>>> {
        self.devices.clone()
    }

    /// Inserts a device unless its path is already present.
    pub(crate) fn insert(&self, device: Arc<NetworkDevice>) -> bool {
        let mut devices = self.devices.get();
        if devices
            .iter()
            .any(|known| known.object_path == device.object_path)
        {
            return false;
        }

        devices.push(device);
        self.devices.set(devices);
        true
    }

    pub(crate) fn remove(&self, path: &OwnedObjectPath) -> Option<Arc<NetworkDevice>> {
        let mut devices = self.devices.get();
        let index = devices
            .iter()
            .position(|device| device.object_path == *path)?;
        let removed = devices.remove(index);
        self.devices.set(devices);

        if let Some(token) = removed.cancellation_token.as_ref() {
            token.cancel();
        }

        Some(removed)
    }

    pub(crate) fn by_path(&self, path: &OwnedObjectPath) -> Option<Arc<NetworkDevice>> {
        self.devices
            .get()
            .iter()
            .find(|device| device.object_path == *path)
            .cloned()
    }

    /// Scans for a MAC address; the first match wins.
    pub(crate) fn find(&self, address: &str) -> Option<Arc<NetworkDevice>> {
        self.devices
            .get()
            .iter()
            .find(|device| device.address.get() == address)
            .cloned()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<NetworkDevice>> {
        self.devices.get()
    }

    /// Empties the table, cancelling every device's monitor.
    pub(crate) fn clear(&self) -> Vec<Arc<NetworkDevice>> {
        let devices = self.devices.get();
        self.devices.set(Vec::new());

        for device in &devices {
            if let Some(token) = device.cancellation_token.as_ref() {
                token.cancel();
            }
        }

        devices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> OwnedObjectPath {
        OwnedObjectPath::try_from(raw.to_owned()).unwrap()
    }

    #[test]
    fn insert_rejects_duplicate_paths() {
        let registry = DeviceRegistry::new();

        assert!(registry.insert(NetworkDevice::with_address("/peers/1", "aa:aa:aa:aa:aa:aa")));
        assert!(!registry.insert(NetworkDevice::with_address("/peers/1", "bb:bb:bb:bb:bb:bb")));
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn find_matches_first_address() {
        let registry = DeviceRegistry::new();
        registry.insert(NetworkDevice::with_address("/peers/1", "aa:aa:aa:aa:aa:aa"));
        registry.insert(NetworkDevice::with_address("/peers/2", "bb:bb:bb:bb:bb:bb"));

        let found = registry.find("bb:bb:bb:bb:bb:bb").unwrap();
        assert_eq!(found.object_path, path("/peers/2"));

        assert!(registry.find("cc:cc:cc:cc:cc:cc").is_none());
    }

    #[test]
    fn remove_returns_the_evicted_device() {
        let registry = DeviceRegistry::new();
        registry.insert(NetworkDevice::with_address("/peers/1", "aa:aa:aa:aa:aa:aa"));

        let removed = registry.remove(&path("/peers/1")).unwrap();
        assert_eq!(removed.address.get(), "aa:aa:aa:aa:aa:aa");
        assert!(registry.snapshot().is_empty());
        assert!(registry.remove(&path("/peers/1")).is_none());
    }

    #[test]
    fn clear_empties_the_table() {
        let registry = DeviceRegistry::new();
        registry.insert(NetworkDevice::with_address("/peers/1", "aa:aa:aa:aa:aa:aa"));
        registry.insert(NetworkDevice::with_address("/peers/2", "bb:bb:bb:bb:bb:bb"));

        let cleared = registry.clear();
        assert_eq!(cleared.len(), 2);
        assert!(registry.snapshot().is_empty());
    }
}
