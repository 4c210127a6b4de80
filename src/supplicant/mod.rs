//! Production supplicant link over the wpa_supplicant D-Bus API.
//!
//! [`WpaLink`] owns every supplicant proxy: the manager, the adopted P2P
//! management interface, and the transient group proxies. Supplicant
//! signals are pumped into the session channel as [`SessionEvent`]s; the
//! link itself never touches connection state.

mod monitoring;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zbus::{
    Connection,
    zvariant::{OwnedObjectPath, Value},
};

use crate::{
    core::device::{LiveDeviceParams, NetworkDevice},
    error::Error,
    proxy::{interface::InterfaceProxy, manager::SupplicantProxy, p2p_device::P2PDeviceProxy},
    selector::{self, InterfaceCandidate},
    session::{events::SessionEvent, link::SupplicantLink},
    traits::Reactive,
    types::MiracastEvent,
};
use monitoring::{spawn_manager_signals, spawn_p2p_signals};

pub(crate) struct WpaLinkParams {
    pub connection: Connection,
    pub events_tx: mpsc::UnboundedSender<SessionEvent>,
    pub notifier_tx: broadcast::Sender<MiracastEvent>,
    pub cancellation_token: CancellationToken,
    pub dedicated_interface: Option<String>,
}

#[derive(Default)]
struct LinkState {
    manager: Option<SupplicantProxy<'static>>,
    manager_token: Option<CancellationToken>,
    iface_path: Option<OwnedObjectPath>,
    ifname: Option<String>,
    p2p: Option<P2PDeviceProxy<'static>>,
    p2p_token: Option<CancellationToken>,
    group_iface_path: Option<OwnedObjectPath>,
    group_p2p: Option<P2PDeviceProxy<'static>>,
}

pub(crate) struct WpaLink {
    connection: Connection,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    notifier_tx: broadcast::Sender<MiracastEvent>,
    cancellation_token: CancellationToken,
    dedicated_interface: Option<String>,
    state: Mutex<LinkState>,
}

impl WpaLink {
    pub(crate) fn new(params: WpaLinkParams) -> Self {
        Self {
            connection: params.connection,
            events_tx: params.events_tx,
            notifier_tx: params.notifier_tx,
            cancellation_token: params.cancellation_token,
            dedicated_interface: params.dedicated_interface,
            state: Mutex::new(LinkState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn manager(&self) -> Result<SupplicantProxy<'static>, Error> {
        if let Some(manager) = self.lock().manager.clone() {
            return Ok(manager);
        }

        let manager = SupplicantProxy::new(&self.connection).await?;
        let signal_token = self.cancellation_token.child_token();
        {
            let mut state = self.lock();
            state.manager = Some(manager.clone());
            state.manager_token = Some(signal_token.clone());
        }
        spawn_manager_signals(manager.clone(), self.events_tx.clone(), signal_token);

        Ok(manager)
    }

    async fn candidate(&self, path: &OwnedObjectPath) -> Result<InterfaceCandidate, Error> {
        let iface = InterfaceProxy::new(&self.connection, path.clone()).await?;
        let ifname = iface.ifname().await.unwrap_or_default();
        let p2p_capable = iface
            .capabilities()
            .await
            .map(|capabilities| selector::p2p_capable(&capabilities))
            .unwrap_or(false);

        Ok(InterfaceCandidate {
            path: path.clone(),
            ifname,
            p2p_capable,
        })
    }

    async fn adopt(&self, candidate: &InterfaceCandidate) -> Result<(), Error> {
        let p2p = P2PDeviceProxy::new(&self.connection, candidate.path.clone()).await?;
        let signal_token = self.cancellation_token.child_token();
        {
            let mut state = self.lock();
            state.iface_path = Some(candidate.path.clone());
            state.ifname = Some(candidate.ifname.clone());
            state.p2p = Some(p2p.clone());
            state.p2p_token = Some(signal_token.clone());
        }
        spawn_p2p_signals(p2p, self.events_tx.clone(), signal_token);

        info!(
            ifname = %candidate.ifname,
            path = %candidate.path,
            "adopted p2p management interface"
        );
        Ok(())
    }

    fn p2p(&self, operation: &'static str) -> Result<P2PDeviceProxy<'static>, Error> {
        self.lock()
            .p2p
            .clone()
            .ok_or(Error::NoP2pDevice { operation })
    }

    fn group_p2p(&self, operation: &'static str) -> Result<P2PDeviceProxy<'static>, Error> {
        self.lock()
            .group_p2p
            .clone()
            .ok_or(Error::NoP2pDevice { operation })
    }
}

#[async_trait]
impl SupplicantLink for WpaLink {
    async fn establish(&self, create_missing: bool) -> Result<bool, Error> {
        let manager = self.manager().await?;
        let interfaces = manager.interfaces().await?;

        let mut candidates = Vec::with_capacity(interfaces.len());
        for path in &interfaces {
            match self.candidate(path).await {
                Ok(candidate) => candidates.push(candidate),
                Err(error) => warn!(error = %error, path = %path, "cannot inspect interface"),
            }
        }

        if let Some(selected) = selector::select(&candidates, self.dedicated_interface.as_deref())
        {
            self.adopt(selected).await?;
            return Ok(true);
        }

        if create_missing && let Some(name) = self.dedicated_interface.clone() {
            let ifname_value = Value::from(name.as_str());
            let driver_value = Value::from("nl80211");
            let mut args: HashMap<&str, &Value<'_>> = HashMap::new();
            args.insert("Ifname", &ifname_value);
            args.insert("Driver", &driver_value);

            // Adoption follows the InterfaceAdded signal on success; a
            // failure re-runs selection so a pre-existing interface can
            // still be picked up.
            if let Err(error) = manager.create_interface(args).await {
                warn!(error = %error, ifname = %name, "cannot create dedicated p2p interface");
                let _ = self.events_tx.send(SessionEvent::InterfaceCreationFailed);
            }
        }

        Ok(false)
    }

    async fn reset(&self) {
        let mut state = self.lock();
        if let Some(token) = state.manager_token.take() {
            token.cancel();
        }
        if let Some(token) = state.p2p_token.take() {
            token.cancel();
        }
        *state = LinkState::default();
        debug!("supplicant link reset");
    }

    fn is_ready(&self) -> bool {
        self.lock().p2p.is_some()
    }

    fn management_ifname(&self) -> Option<String> {
        self.lock().ifname.clone()
    }

    fn is_management_interface(&self, path: &OwnedObjectPath) -> bool {
        self.lock().iface_path.as_ref() == Some(path)
    }

    async fn adopt_interface(&self, path: &OwnedObjectPath) -> Result<bool, Error> {
        if self.is_ready() {
            return Ok(false);
        }

        let candidate = self.candidate(path).await?;
        if !selector::eligible(&candidate, self.dedicated_interface.as_deref()) {
            return Ok(false);
        }

        self.adopt(&candidate).await?;
        Ok(true)
    }

    async fn create_device(&self, path: &OwnedObjectPath) -> Result<Arc<NetworkDevice>, Error> {
        NetworkDevice::get_live(LiveDeviceParams {
            connection: &self.connection,
            path: path.clone(),
            cancellation_token: &self.cancellation_token,
            notifier_tx: &self.notifier_tx,
        })
        .await
    }

    async fn known_peers(&self) -> Vec<OwnedObjectPath> {
        let Ok(p2p) = self.p2p("list peers") else {
            return Vec::new();
        };

        p2p.peers().await.unwrap_or_default()
    }

    async fn find(&self, timeout: Duration) -> Result<(), Error> {
        let p2p = self.p2p("find")?;

        let timeout_value = Value::from(i32::try_from(timeout.as_secs()).unwrap_or(i32::MAX));
        let mut args: HashMap<&str, &Value<'_>> = HashMap::new();
        args.insert("Timeout", &timeout_value);

        p2p.find(args).await?;
        Ok(())
    }

    async fn stop_find(&self) -> Result<(), Error> {
        self.p2p("stop find")?.stop_find().await?;
        Ok(())
    }

    async fn connect(&self, peer: &OwnedObjectPath) -> Result<(), Error> {
        let p2p = self.p2p("connect")?;

        let peer_value = Value::from(peer.clone().into_inner());
        let wps_method_value = Value::from("pbc");
        let mut args: HashMap<&str, &Value<'_>> = HashMap::new();
        args.insert("peer", &peer_value);
        args.insert("wps_method", &wps_method_value);

        p2p.connect(args).await?;
        Ok(())
    }

    async fn cancel(&self) -> Result<(), Error> {
        self.p2p("cancel")?.cancel().await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        self.p2p("flush")?.flush().await?;
        Ok(())
    }

    async fn set_device_configuration(
        &self,
        name: &str,
        wps_device_type: &str,
    ) -> Result<(), Error> {
        let p2p = self.p2p("set device configuration")?;

        let name_value = Value::from(name);
        let device_type_value = Value::from(wps_type_bytes(wps_device_type));
        let mut config: HashMap<&str, Value<'_>> = HashMap::new();
        config.insert("DeviceName", name_value);
        config.insert("PrimaryDeviceType", device_type_value);

        p2p.set_p2p_device_config(config).await?;
        Ok(())
    }

    async fn publish_wfd_ies(&self, ies: &[u8]) -> Result<(), Error> {
        let manager = self.manager().await?;
        manager.set_wfd_ies(ies).await?;
        Ok(())
    }

    async fn attach_group(
        &self,
        group_path: &OwnedObjectPath,
        iface_path: &OwnedObjectPath,
    ) -> Result<(), Error> {
        let iface = InterfaceProxy::new(&self.connection, iface_path.clone()).await?;
        let group_p2p = P2PDeviceProxy::new(&self.connection, iface_path.clone()).await?;

        {
            let mut state = self.lock();
            state.group_iface_path = Some(iface_path.clone());
            state.group_p2p = Some(group_p2p);
        }
        debug!(group = %group_path, iface = %iface_path, "attached group proxies");

        let events_tx = self.events_tx.clone();
        let iface_path = iface_path.clone();
        tokio::spawn(async move {
            match iface.ifname().await {
                Ok(ifname) => {
                    let _ = events_tx.send(SessionEvent::GroupInterfaceReady {
                        iface_path,
                        ifname,
                    });
                }
                Err(error) => {
                    warn!(error = %error, iface = %iface_path, "cannot resolve group ifname");
                }
            }
        });

        Ok(())
    }

    async fn detach_group(&self) {
        let mut state = self.lock();
        state.group_iface_path = None;
        state.group_p2p = None;
    }

    async fn group_disconnect(&self) -> Result<(), Error> {
        self.group_p2p("disconnect group")?.disconnect().await?;
        Ok(())
    }
}

fn wps_type_bytes(wps_device_type: &str) -> Vec<u8> {
    (0..wps_device_type.len())
        .step_by(2)
        .filter_map(|index| wps_device_type.get(index..index + 2))
        .filter_map(|pair| u8::from_str_radix(pair, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wps_type_bytes_decodes_the_hex_string() {
        assert_eq!(
            wps_type_bytes("000A0050F2040005"),
            [0x00, 0x0A, 0x00, 0x50, 0xF2, 0x04, 0x00, 0x05]
        );
    }

    #[test]
    fn wps_type_bytes_ignores_trailing_garbage() {
        assert_eq!(wps_type_bytes("00ZZ01"), [0x00, 0x01]);
        assert!(wps_type_bytes("").is_empty());
    }
}
