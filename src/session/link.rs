use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use zbus::zvariant::OwnedObjectPath;

use crate::{core::device::NetworkDevice, error::Error};

/// Outward supplicant operations the session performs.
///
/// The production implementation wraps the wpa_supplicant D-Bus proxies
/// ([`WpaLink`](crate::supplicant::WpaLink)); tests substitute a recording
/// double so the state machine can be driven without a bus.
#[async_trait]
pub(crate) trait SupplicantLink: Send + Sync {
    /// Creates the manager proxy, subscribes its signals and runs interface
    /// selection. Returns whether a P2P interface was adopted.
    async fn establish(&self, create_missing: bool) -> Result<bool, Error>;

    /// Drops every proxy and signal subscription.
    async fn reset(&self);

    /// Whether a P2P device proxy is usable.
    fn is_ready(&self) -> bool;

    /// Kernel name of the adopted management interface.
    fn management_ifname(&self) -> Option<String>;

    /// Whether `path` is the adopted management interface.
    fn is_management_interface(&self, path: &OwnedObjectPath) -> bool;

    /// Applies the selection policy to a newly reported interface.
    /// Returns whether it was adopted.
    async fn adopt_interface(&self, path: &OwnedObjectPath) -> Result<bool, Error>;

    /// Builds a live device model for a peer path.
    async fn create_device(&self, path: &OwnedObjectPath) -> Result<Arc<NetworkDevice>, Error>;

    /// Peers the supplicant already reports on the adopted interface.
    async fn known_peers(&self) -> Vec<OwnedObjectPath>;

    async fn find(&self, timeout: Duration) -> Result<(), Error>;

    async fn stop_find(&self) -> Result<(), Error>;

    async fn connect(&self, peer: &OwnedObjectPath) -> Result<(), Error>;

    async fn cancel(&self) -> Result<(), Error>;

    async fn flush(&self) -> Result<(), Error>;

    /// Pushes hostname and WPS primary device type to the supplicant.
    async fn set_device_configuration(
        &self,
        name: &str,
        wps_device_type: &str,
    ) -> Result<(), Error>;

    /// Publishes the WFD information element payload.
    async fn publish_wfd_ies(&self, ies: &[u8]) -> Result<(), Error>;

    /// Creates the group interface and non-delegated group P2P proxies.
    /// Posts `GroupInterfaceReady` once the group ifname is resolved.
    async fn attach_group(
        &self,
        group_path: &OwnedObjectPath,
        iface_path: &OwnedObjectPath,
    ) -> Result<(), Error>;

    /// Releases the group proxies.
    async fn detach_group(&self);

    /// Issues `Disconnect` on the group P2P device.
    async fn group_disconnect(&self) -> Result<(), Error>;
}
