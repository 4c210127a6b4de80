pub(crate) mod types;

use std::{
    net::Ipv4Addr,
    sync::{Arc, Weak},
};

use derive_more::Debug;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use zbus::zvariant::OwnedObjectPath;

pub use types::{DeviceParams, LiveDeviceParams};
use types::DeviceProperties;

use crate::{
    Property,
    error::Error,
    proxy::peer::PeerProxy,
    traits::Reactive,
    types::{
        MiracastEvent,
        device::{DeviceRole, DeviceState},
    },
};

/// A remote P2P peer known to the supplicant.
///
/// Owned by the device registry; the session keeps a non-owning `Arc` clone
/// of the entry it is currently connecting to. All connection controls go
/// through [`MiracastService`](crate::MiracastService), never the device.
#[derive(Debug, Clone)]
pub struct NetworkDevice {
    #[debug(skip)]
    pub(crate) cancellation_token: Option<CancellationToken>,

    /// D-Bus object path for this peer.
    pub object_path: OwnedObjectPath,

    /// Colon-hex MAC address of the peer.
    pub address: Property<String>,

    /// Friendly name advertised by the peer.
    pub name: Property<String>,

    /// Role the peer's group assigned to the local endpoint.
    pub role: Property<DeviceRole>,

    /// IPv4 address of the peer inside the group, once addressed.
    pub ipv4: Property<Option<Ipv4Addr>>,

    /// Connection state of the peer.
    pub state: Property<DeviceState>,
}

impl PartialEq for NetworkDevice {
    fn eq(&self, other: &Self) -> bool {
        self.object_path == other.object_path
    }
}

impl Reactive for NetworkDevice {
    type Error = Error;
    type Context<'a> = DeviceParams<'a>;
    type LiveContext<'a> = LiveDeviceParams<'a>;

    async fn get(context: Self::Context<'_>) -> Result<Self, Self::Error> {
        let peer_proxy = PeerProxy::new(context.connection, context.path.clone()).await?;
        let props = Self::fetch_properties(&peer_proxy).await;

        Ok(Self::from_properties(context.path, props, None))
    }

    async fn get_live(context: Self::LiveContext<'_>) -> Result<Arc<Self>, Self::Error> {
        let peer_proxy = PeerProxy::new(context.connection, context.path.clone()).await?;
        let props = Self::fetch_properties(&peer_proxy).await;
        let token = context.cancellation_token.child_token();
        let device = Arc::new(Self::from_properties(context.path, props, Some(token.clone())));

        spawn_monitor(
            peer_proxy,
            Arc::downgrade(&device),
            token,
            context.notifier_tx.clone(),
        );

        Ok(device)
    }
}

impl NetworkDevice {
    async fn fetch_properties(peer_proxy: &PeerProxy<'_>) -> DeviceProperties {
        let (name, address) = tokio::join!(peer_proxy.device_name(), peer_proxy.device_address());

        DeviceProperties {
            name: name.unwrap_or_else(|error| {
                warn!(error = %error, "cannot fetch peer name");
                String::new()
            }),
            address: address.map(|raw| mac_string(&raw)).unwrap_or_default(),
        }
    }

    fn from_properties(
        object_path: OwnedObjectPath,
        props: DeviceProperties,
        cancellation_token: Option<CancellationToken>,
    ) -> Self {
        Self {
            cancellation_token,
            object_path,
            address: Property::new(props.address),
            name: Property::new(props.name),
            role: Property::new(DeviceRole::Unknown),
            ipv4: Property::new(None),
            state: Property::new(DeviceState::Idle),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_address(path: &str, address: &str) -> Arc<Self> {
        let object_path = OwnedObjectPath::try_from(path.to_owned())
            .unwrap_or_else(|_| OwnedObjectPath::default());

        Arc::new(Self::from_properties(
            object_path,
            DeviceProperties {
                name: String::new(),
                address: address.to_owned(),
            },
            None,
        ))
    }
}

fn spawn_monitor(
    peer_proxy: PeerProxy<'static>,
    weak_device: Weak<NetworkDevice>,
    cancellation_token: CancellationToken,
    notifier_tx: broadcast::Sender<MiracastEvent>,
) {
    tokio::spawn(async move {
        let mut name_changed = peer_proxy.receive_device_name_changed().await;

        loop {
            let Some(device) = weak_device.upgrade() else {
                return;
            };

            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    debug!("peer monitoring cancelled for {}", device.object_path);
                    return;
                }
                Some(change) = name_changed.next() => {
                    if let Ok(value) = change.get().await {
                        device.name.set(value);
                        let _ = notifier_tx
                            .send(MiracastEvent::DeviceChanged(device.object_path.clone()));
                    }
                }
                else => {
                    debug!("peer property streams ended for {}", device.object_path);
                    return;
                }
            }
        }
    });
}

pub(crate) fn mac_string(raw: &[u8]) -> String {
    raw.iter()
        .map(|octet| format!("{octet:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_string_formats_colon_hex() {
        assert_eq!(
            mac_string(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            "aa:bb:cc:dd:ee:ff"
        );
    }

    #[test]
    fn mac_string_pads_low_octets() {
        assert_eq!(mac_string(&[0x00, 0x01, 0x0a]), "00:01:0a");
    }

    #[test]
    fn devices_compare_by_object_path() {
        let first = NetworkDevice::with_address("/peers/1", "aa:bb:cc:dd:ee:ff");
        let second = NetworkDevice::with_address("/peers/1", "11:22:33:44:55:66");
        let third = NetworkDevice::with_address("/peers/2", "aa:bb:cc:dd:ee:ff");

        assert_eq!(*first, *second);
        assert_ne!(*first, *third);
    }
}
