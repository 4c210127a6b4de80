//! The connection session: a single task owning the `current_device`
//! lifecycle.
//!
//! Every supplicant, DHCP, hostname and lifecycle occurrence reaches this
//! task as a [`SessionEvent`]; user requests arrive as [`SessionCommand`]s
//! with oneshot replies. Nothing else advances device state. Events that
//! belong to a previous attempt are dropped by identity checks (object
//! paths, attempt counters, scan epochs) before they can touch the live
//! connection context.

pub(crate) mod events;
pub(crate) mod link;
#[cfg(test)]
mod tests;

use std::{net::Ipv4Addr, sync::Arc, time::Duration};

use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zbus::zvariant::OwnedObjectPath;

use crate::{
    Property,
    core::{device::NetworkDevice, group::ActiveGroup},
    dhcp::{Dhcp, DhcpEndpoint, DhcpEvent},
    driver::DriverControl,
    error::Error,
    firmware::FirmwareLoader,
    registry::DeviceRegistry,
    types::{
        CONNECT_TIMEOUT, Capability, MiracastEvent, MiracastMode,
        device::{Chassis, DeviceRole, DeviceState},
        ie,
    },
};
use events::{SessionCommand, SessionEvent};
use link::SupplicantLink;

pub(crate) struct SessionParams {
    pub link: Arc<dyn SupplicantLink>,
    pub dhcp: Arc<dyn Dhcp>,
    pub driver: Arc<dyn DriverControl>,
    pub firmware: Option<Arc<dyn FirmwareLoader>>,
    pub firmware_gated: bool,
    pub firmware_ifname: String,
    pub registry: DeviceRegistry,
    pub notifier_tx: broadcast::Sender<MiracastEvent>,
    pub events_tx: mpsc::UnboundedSender<SessionEvent>,
    pub running: Property<bool>,
    pub scanning: Property<bool>,
    pub capabilities: Property<Vec<Capability>>,
    pub local_address: Property<Option<Ipv4Addr>>,
}

pub(crate) struct Session {
    link: Arc<dyn SupplicantLink>,
    dhcp: Arc<dyn Dhcp>,
    driver: Arc<dyn DriverControl>,
    firmware: Option<Arc<dyn FirmwareLoader>>,
    firmware_gated: bool,
    firmware_ifname: String,
    registry: DeviceRegistry,
    notifier_tx: broadcast::Sender<MiracastEvent>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,

    running: Property<bool>,
    scanning: Property<bool>,
    capabilities: Property<Vec<Capability>>,
    local_address: Property<Option<Ipv4Addr>>,

    current: Option<Arc<NetworkDevice>>,
    group: Option<ActiveGroup>,
    dhcp_endpoint: Option<Box<dyn DhcpEndpoint>>,
    connect_attempt: u64,
    connect_timer: Option<JoinHandle<()>>,
    scan_epoch: u64,
    hostname: String,
    chassis: Chassis,
    device_config_synced: bool,
    published_ies: Option<Vec<u8>>,
}

impl Session {
    pub(crate) fn new(params: SessionParams) -> Self {
        Self {
            link: params.link,
            dhcp: params.dhcp,
            driver: params.driver,
            firmware: params.firmware,
            firmware_gated: params.firmware_gated,
            firmware_ifname: params.firmware_ifname,
            registry: params.registry,
            notifier_tx: params.notifier_tx,
            events_tx: params.events_tx,
            running: params.running,
            scanning: params.scanning,
            capabilities: params.capabilities,
            local_address: params.local_address,
            current: None,
            group: None,
            dhcp_endpoint: None,
            connect_attempt: 0,
            connect_timer: None,
            scan_epoch: 0,
            hostname: String::new(),
            chassis: Chassis::Other,
            device_config_synced: false,
            published_ies: None,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
        mut event_rx: mpsc::UnboundedReceiver<SessionEvent>,
        cancellation_token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    self.teardown_link("service released").await;
                    return;
                }
                Some(command) = cmd_rx.recv() => self.handle_command(command).await,
                Some(event) = event_rx.recv() => self.handle_event(event).await,
                else => {
                    debug!("session channels closed");
                    return;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect { address, reply } => {
                let _ = reply.send(self.connect(&address).await);
            }
            SessionCommand::Disconnect { address, reply } => {
                let _ = reply.send(self.disconnect(&address).await);
            }
            SessionCommand::Scan { timeout, reply } => {
                let _ = reply.send(self.scan(timeout).await);
            }
            SessionCommand::SetCapabilities {
                capabilities,
                reply,
            } => {
                let _ = reply.send(self.set_capabilities(capabilities).await);
            }
        }
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ServiceAppeared => self.on_service_appeared().await,
            SessionEvent::ServiceVanished => self.teardown_link("supplicant vanished").await,
            SessionEvent::HostnameChanged { hostname, chassis } => {
                self.on_hostname_changed(hostname, chassis).await;
            }
            SessionEvent::InterfaceAdded(path) => self.on_interface_added(path).await,
            SessionEvent::InterfaceRemoved(path) => self.on_interface_removed(path).await,
            SessionEvent::InterfaceCreationFailed => self.on_interface_creation_failed().await,
            SessionEvent::PeerFound(path) => self.on_peer_found(path).await,
            SessionEvent::PeerLost(path) => self.on_peer_lost(path).await,
            SessionEvent::GoNegotiationSuccess {
                peer,
                frequencies,
                wps_method,
            } => {
                info!(
                    peer = %peer,
                    ?frequencies,
                    wps_method = %wps_method,
                    "go negotiation succeeded"
                );
            }
            SessionEvent::GoNegotiationFailure { peer, status } => {
                self.on_negotiation_failure(&peer, status).await;
            }
            SessionEvent::PeerConnectFailed { reason } => {
                self.on_peer_connect_failed(&reason).await;
            }
            SessionEvent::GroupStarted {
                group_path,
                iface_path,
                role,
            } => self.on_group_started(group_path, iface_path, role).await,
            SessionEvent::GroupInterfaceReady { iface_path, ifname } => {
                self.on_group_interface_ready(&iface_path, ifname).await;
            }
            SessionEvent::GroupFinished {
                group_path,
                iface_path,
            } => self.on_group_finished(&group_path, &iface_path).await,
            SessionEvent::GroupRequest { peer } => {
                debug!(peer = %peer, "ignoring incoming group request; sink mode unsupported");
            }
            SessionEvent::Dhcp { attempt, event } => self.on_dhcp_event(attempt, event).await,
            SessionEvent::ConnectTimeout { attempt } => self.on_connect_timeout(attempt).await,
            SessionEvent::ScanDone { epoch } => {
                if epoch == self.scan_epoch {
                    self.set_scanning(false);
                }
            }
        }
    }

    async fn connect(&mut self, address: &str) -> Result<(), Error> {
        if !self.link.is_ready() {
            return Err(Error::NoP2pDevice {
                operation: "connect",
            });
        }
        if self.current.is_some() {
            return Err(Error::ConnectionInProgress);
        }
        let Some(device) = self.registry.find(address) else {
            return Err(Error::UnknownDevice {
                operation: "connect",
                address: address.to_owned(),
            });
        };

        if let Err(error) = self.link.stop_find().await {
            warn!(error = %error, "cannot stop find before connect");
        }
        self.set_scanning(false);

        self.current = Some(device.clone());
        self.set_state(&device, DeviceState::Association);
        self.connect_attempt += 1;
        self.arm_connect_timer();

        if let Err(error) = self.link.connect(&device.object_path).await {
            warn!(error = %error, peer = %device.object_path, "connect request failed");
            self.fail_attempt().await;
        }

        Ok(())
    }

    async fn disconnect(&mut self, address: &str) -> Result<(), Error> {
        let Some(device) = self.registry.find(address) else {
            return Err(Error::UnknownDevice {
                operation: "disconnect",
                address: address.to_owned(),
            });
        };

        let is_current = self
            .current
            .as_ref()
            .is_some_and(|current| current.object_path == device.object_path);
        let state = device.state.get();
        if !is_current || !state.is_grouped() {
            return Err(Error::InvalidState {
                operation: "disconnect",
                state,
            });
        }

        if let Err(error) = self.link.group_disconnect().await {
            warn!(error = %error, "group disconnect failed");
            self.fail_attempt().await;
        }

        Ok(())
    }

    async fn scan(&mut self, timeout: Duration) -> Result<(), Error> {
        if !self.link.is_ready() {
            return Err(Error::NoP2pDevice { operation: "scan" });
        }

        self.link.find(timeout).await?;

        self.scan_epoch += 1;
        let epoch = self.scan_epoch;
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            sleep(timeout).await;
            let _ = events_tx.send(SessionEvent::ScanDone { epoch });
        });

        self.set_scanning(true);
        Ok(())
    }

    async fn set_capabilities(&mut self, capabilities: Vec<Capability>) -> Result<(), Error> {
        if capabilities == self.capabilities.get() {
            return Ok(());
        }

        self.capabilities.set(capabilities);
        self.republish_ies().await;
        Ok(())
    }

    async fn on_service_appeared(&mut self) {
        if self.link.is_ready() {
            return;
        }

        if self.firmware_gated
            && let Some(loader) = self.firmware.clone()
            && loader.is_needed(&self.firmware_ifname).await
        {
            if let Err(source) = loader.load(&self.firmware_ifname).await {
                let error = Error::FirmwareLoad {
                    ifname: self.firmware_ifname.clone(),
                    source,
                };
                error!(error = %error, "firmware load failed; waiting for the supplicant to reappear");
                return;
            }
            info!(ifname = %self.firmware_ifname, "firmware loaded");
        }

        match self.link.establish(true).await {
            Ok(true) => self.on_interface_ready().await,
            Ok(false) => debug!("no p2p-capable interface available yet"),
            Err(error) => error!(error = %error, "cannot establish supplicant link"),
        }
    }

    async fn on_interface_added(&mut self, path: OwnedObjectPath) {
        if self.running.get() {
            return;
        }

        match self.link.adopt_interface(&path).await {
            Ok(true) => self.on_interface_ready().await,
            Ok(false) => debug!(path = %path, "interface not eligible"),
            Err(error) => warn!(error = %error, path = %path, "cannot inspect interface"),
        }
    }

    async fn on_interface_creation_failed(&mut self) {
        if self.running.get() {
            return;
        }

        // The dedicated interface may already exist; adopt it instead.
        match self.link.establish(false).await {
            Ok(true) => self.on_interface_ready().await,
            Ok(false) => debug!("interface creation failed and nothing to adopt"),
            Err(error) => error!(error = %error, "cannot re-run interface selection"),
        }
    }

    async fn on_interface_removed(&mut self, path: OwnedObjectPath) {
        if !self.link.is_management_interface(&path) {
            return;
        }

        self.teardown_link("management interface removed").await;
    }

    async fn on_interface_ready(&mut self) {
        if self.running.get() {
            return;
        }

        if let Err(error) = self.link.flush().await {
            warn!(error = %error, "cannot flush peer cache");
        }
        self.sync_device_configuration().await;
        self.device_config_synced = true;

        self.published_ies = None;
        self.republish_ies().await;

        for path in self.link.known_peers().await {
            self.on_peer_found(path).await;
        }

        self.running.set(true);
        self.notify(MiracastEvent::RunningChanged(true));
    }

    async fn on_hostname_changed(&mut self, hostname: String, chassis: Chassis) {
        if hostname == self.hostname && chassis == self.chassis {
            return;
        }

        self.hostname = hostname;
        self.chassis = chassis;

        if self.device_config_synced {
            self.sync_device_configuration().await;
        }
    }

    async fn on_peer_found(&mut self, path: OwnedObjectPath) {
        if self.registry.by_path(&path).is_some() {
            return;
        }

        match self.link.create_device(&path).await {
            Ok(device) => {
                if self.registry.insert(device.clone()) {
                    self.notify(MiracastEvent::DeviceFound(device));
                }
            }
            Err(error) => warn!(error = %error, path = %path, "cannot create device for peer"),
        }
    }

    async fn on_peer_lost(&mut self, path: OwnedObjectPath) {
        if self.registry.remove(&path).is_none() {
            return;
        }

        let is_current = self
            .current
            .as_ref()
            .is_some_and(|current| current.object_path == path);
        if is_current && self.group.is_some() {
            // group_finished completes the teardown; removal alone never
            // advances state.
            if let Err(error) = self.link.group_disconnect().await {
                warn!(error = %error, "group disconnect after peer loss failed");
            }
        }

        self.notify(MiracastEvent::DeviceLost(path));
    }

    async fn on_negotiation_failure(&mut self, peer: &OwnedObjectPath, status: i32) {
        let Some(device) = self.current.clone() else {
            return;
        };
        if device.object_path != *peer {
            debug!(peer = %peer, "negotiation failure for a previous attempt");
            return;
        }
        if !matches!(
            device.state.get(),
            DeviceState::Association | DeviceState::Configuration
        ) {
            return;
        }

        warn!(status, peer = %peer, "go negotiation failed");
        self.fail_attempt().await;
    }

    async fn on_peer_connect_failed(&mut self, reason: &str) {
        let Some(device) = self.current.clone() else {
            return;
        };
        if !matches!(
            device.state.get(),
            DeviceState::Association | DeviceState::Configuration
        ) {
            return;
        }

        warn!(reason, peer = %device.object_path, "peer connection failed");
        self.fail_attempt().await;
    }

    async fn on_group_started(
        &mut self,
        group_path: OwnedObjectPath,
        iface_path: OwnedObjectPath,
        role: DeviceRole,
    ) {
        let Some(device) = self.current.clone() else {
            debug!(group = %group_path, "group started without a connection attempt");
            return;
        };
        if device.state.get() != DeviceState::Association {
            debug!(group = %group_path, "group started in unexpected state");
            return;
        }

        device.role.set(role);

        if let Err(error) = self.link.attach_group(&group_path, &iface_path).await {
            warn!(error = %error, group = %group_path, "cannot attach group");
            self.fail_attempt().await;
            return;
        }

        self.group = Some(ActiveGroup {
            group_path,
            iface_path,
            ifname: String::new(),
        });
        self.set_state(&device, DeviceState::Configuration);
    }

    async fn on_group_interface_ready(&mut self, iface_path: &OwnedObjectPath, ifname: String) {
        let Some(device) = self.current.clone() else {
            return;
        };
        if device.state.get() != DeviceState::Configuration {
            return;
        }
        {
            let Some(group) = self.group.as_mut() else {
                return;
            };
            if group.iface_path != *iface_path {
                debug!(iface = %iface_path, "interface ready for a previous group");
                return;
            }
            group.ifname = ifname.clone();
        }

        self.miracast(MiracastMode::Source).await;

        let (dhcp_tx, dhcp_rx) = mpsc::unbounded_channel();
        let (role, started) = match device.role.get() {
            DeviceRole::GroupOwner => ("server", self.dhcp.start_server(&ifname, dhcp_tx).await),
            _ => ("client", self.dhcp.start_client(&ifname, dhcp_tx).await),
        };

        match started {
            Ok(endpoint) => {
                self.dhcp_endpoint = Some(endpoint);
                spawn_dhcp_forwarder(dhcp_rx, self.events_tx.clone(), self.connect_attempt);
            }
            Err(source) => {
                let error = Error::DhcpStart {
                    role,
                    ifname,
                    source,
                };
                error!(error = %error, "cannot start dhcp endpoint on group interface");
                self.fail_attempt().await;
            }
        }
    }

    async fn on_dhcp_event(&mut self, attempt: u64, event: DhcpEvent) {
        if attempt != self.connect_attempt {
            debug!("dhcp event for a previous attempt");
            return;
        }
        let Some(device) = self.current.clone() else {
            return;
        };
        if device.state.get() != DeviceState::Configuration {
            debug!(state = %device.state.get(), "dhcp event outside configuration");
            return;
        }

        match event {
            DhcpEvent::AddressAssigned { local, remote } => {
                device.ipv4.set(Some(remote));
                self.local_address.set(Some(local));
                self.cancel_connect_timer();
                self.set_state(&device, DeviceState::Connected);
                self.republish_ies().await;
            }
            DhcpEvent::Terminated => {
                warn!(peer = %device.object_path, "dhcp terminated during configuration");
                if let Err(error) = self.link.group_disconnect().await {
                    warn!(error = %error, "group disconnect after dhcp termination failed");
                }
                self.fail_attempt().await;
            }
        }
    }

    async fn on_connect_timeout(&mut self, attempt: u64) {
        if attempt != self.connect_attempt {
            return;
        }
        let Some(device) = self.current.clone() else {
            return;
        };

        match device.state.get() {
            DeviceState::Association => {
                warn!(peer = %device.object_path, "connection attempt timed out");
                if let Err(error) = self.link.cancel().await {
                    warn!(error = %error, "cannot cancel connection attempt");
                }
                self.fail_attempt().await;
            }
            _ => debug!("connect timeout ignored; addressing owns the clock"),
        }
    }

    async fn on_group_finished(
        &mut self,
        group_path: &OwnedObjectPath,
        iface_path: &OwnedObjectPath,
    ) {
        let Some(active) = self.group.clone() else {
            debug!(group = %group_path, "group finished with no active group");
            return;
        };
        if active.group_path != *group_path && active.iface_path != *iface_path {
            debug!(group = %group_path, "group finished for a previous group");
            return;
        }

        self.release_group_context().await;

        if let Some(device) = self.current.take() {
            self.miracast(MiracastMode::Off).await;
            self.set_state(&device, DeviceState::Disconnected);
        }

        self.republish_ies().await;
    }

    /// Ends the attempt in Failure, releasing the whole connection context.
    async fn fail_attempt(&mut self) {
        let had_group = self.group.is_some();
        self.release_group_context().await;

        if had_group {
            self.miracast(MiracastMode::Off).await;
        }

        if let Some(device) = self.current.take() {
            self.set_state(&device, DeviceState::Failure);
        }

        self.republish_ies().await;
    }

    /// Drops the group proxies and the DHCP endpoint, disarming the
    /// connect clock.
    async fn release_group_context(&mut self) {
        self.cancel_connect_timer();
        if self.group.take().is_some() {
            self.link.detach_group().await;
        }
        self.dhcp_endpoint = None;
        self.local_address.set(None);
    }

    async fn teardown_link(&mut self, reason: &str) {
        info!(reason, "resetting supplicant link");

        self.release_group_context().await;

        if let Some(device) = self.current.take() {
            self.miracast(MiracastMode::Off).await;
            self.set_state(&device, DeviceState::Disconnected);
        }

        for device in self.registry.clear() {
            self.notify(MiracastEvent::DeviceLost(device.object_path.clone()));
        }

        self.link.reset().await;
        self.device_config_synced = false;
        self.published_ies = None;
        self.set_scanning(false);

        if self.running.get() {
            self.running.set(false);
            self.notify(MiracastEvent::RunningChanged(false));
        }
    }

    async fn sync_device_configuration(&mut self) {
        let wps_device_type = self.chassis.wps_device_type();
        if let Err(error) = self
            .link
            .set_device_configuration(&self.hostname, &wps_device_type)
            .await
        {
            warn!(error = %error, "cannot sync device configuration");
        }
    }

    async fn republish_ies(&mut self) {
        let session_available = self
            .current
            .as_ref()
            .is_none_or(|device| device.state.get() != DeviceState::Connected);
        let ies = ie::encode_ies(&self.capabilities.get(), session_available);

        if self.published_ies.as_deref() == Some(ies.as_slice()) {
            return;
        }
        if !self.link.is_ready() {
            return;
        }

        match self.link.publish_wfd_ies(&ies).await {
            Ok(()) => self.published_ies = Some(ies),
            Err(error) => warn!(error = %error, "cannot publish wfd information element"),
        }
    }

    async fn miracast(&self, mode: MiracastMode) {
        let Some(ifname) = self.link.management_ifname() else {
            return;
        };

        if let Err(error) = self.driver.miracast_mode(&ifname, mode).await {
            warn!(error = %error, ifname = %ifname, "driver private command failed");
        }
    }

    fn arm_connect_timer(&mut self) {
        self.cancel_connect_timer();

        let attempt = self.connect_attempt;
        let events_tx = self.events_tx.clone();
        self.connect_timer = Some(tokio::spawn(async move {
            sleep(CONNECT_TIMEOUT).await;
            let _ = events_tx.send(SessionEvent::ConnectTimeout { attempt });
        }));
    }

    fn cancel_connect_timer(&mut self) {
        if let Some(timer) = self.connect_timer.take() {
            timer.abort();
        }
    }

    fn set_scanning(&mut self, scanning: bool) {
        if self.scanning.get() != scanning {
            self.scanning.set(scanning);
            self.notify(MiracastEvent::ScanningChanged(scanning));
        }
    }

    fn set_state(&self, device: &Arc<NetworkDevice>, state: DeviceState) {
        device.state.set(state);
        self.notify(MiracastEvent::DeviceStateChanged {
            path: device.object_path.clone(),
            state,
        });
    }

    fn notify(&self, event: MiracastEvent) {
        let _ = self.notifier_tx.send(event);
    }
}

fn spawn_dhcp_forwarder(
    mut dhcp_rx: mpsc::UnboundedReceiver<DhcpEvent>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    attempt: u64,
) {
    tokio::spawn(async move {
        while let Some(event) = dhcp_rx.recv().await {
            if events_tx.send(SessionEvent::Dhcp { attempt, event }).is_err() {
                return;
            }
        }
    });
}
