use std::{
    net::Ipv4Addr,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use zbus::zvariant::OwnedObjectPath;

use super::{
    Session, SessionParams,
    events::{SessionCommand, SessionEvent},
    link::SupplicantLink,
};
use crate::{
    Property,
    core::device::NetworkDevice,
    dhcp::{Dhcp, DhcpEndpoint, DhcpEvent},
    driver::DriverControl,
    error::Error,
    registry::DeviceRegistry,
    types::{
        Capability, MiracastEvent, MiracastMode,
        device::{Chassis, DeviceRole, DeviceState},
    },
};

const PEER_PATH: &str = "/peers/0";
const PEER_ADDRESS: &str = "aa:bb:cc:dd:ee:ff";
const GROUP_PATH: &str = "/groups/0";
const GROUP_IFACE_PATH: &str = "/ifaces/7";
const GROUP_IFNAME: &str = "p2p-wlan0-0";

fn path(raw: &str) -> OwnedObjectPath {
    OwnedObjectPath::try_from(raw.to_owned()).unwrap()
}

#[derive(Default)]
struct MockLink {
    ready: AtomicBool,
    peers: Mutex<Vec<(OwnedObjectPath, String)>>,
    calls: Mutex<Vec<String>>,
    published: Mutex<Vec<Vec<u8>>>,
    device_configs: Mutex<Vec<(String, String)>>,
}

impl MockLink {
    fn with_peer(peer_path: &str, address: &str) -> Arc<Self> {
        let link = Self::default();
        link.peers
            .lock()
            .unwrap()
            .push((path(peer_path), address.to_owned()));
        Arc::new(link)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.into());
    }

    fn count(&self, call: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|recorded| recorded.as_str() == call)
            .count()
    }

    fn published(&self) -> Vec<Vec<u8>> {
        self.published.lock().unwrap().clone()
    }

    fn device_configs(&self) -> Vec<(String, String)> {
        self.device_configs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SupplicantLink for MockLink {
    async fn establish(&self, _create_missing: bool) -> Result<bool, Error> {
        self.record("establish");
        self.ready.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn reset(&self) {
        self.record("reset");
        self.ready.store(false, Ordering::SeqCst);
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn management_ifname(&self) -> Option<String> {
        self.is_ready().then(|| String::from("p2p0"))
    }

    fn is_management_interface(&self, _path: &OwnedObjectPath) -> bool {
        false
    }

    async fn adopt_interface(&self, _path: &OwnedObjectPath) -> Result<bool, Error> {
        self.record("adopt_interface");
        Ok(false)
    }

    async fn create_device(&self, device_path: &OwnedObjectPath) -> Result<Arc<NetworkDevice>, Error> {
        let peers = self.peers.lock().unwrap();
        let (found_path, address) = peers
            .iter()
            .find(|(known, _)| known == device_path)
            .ok_or(Error::NoP2pDevice {
                operation: "create device",
            })?;

        Ok(NetworkDevice::with_address(found_path.as_str(), address))
    }

    async fn known_peers(&self) -> Vec<OwnedObjectPath> {
        self.peers
            .lock()
            .unwrap()
            .iter()
            .map(|(known, _)| known.clone())
            .collect()
    }

    async fn find(&self, _timeout: Duration) -> Result<(), Error> {
        self.record("find");
        Ok(())
    }

    async fn stop_find(&self) -> Result<(), Error> {
        self.record("stop_find");
        Ok(())
    }

    async fn connect(&self, peer: &OwnedObjectPath) -> Result<(), Error> {
        self.record(format!("connect:{peer}"));
        Ok(())
    }

    async fn cancel(&self) -> Result<(), Error> {
        self.record("cancel");
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        self.record("flush");
        Ok(())
    }

    async fn set_device_configuration(
        &self,
        name: &str,
        wps_device_type: &str,
    ) -> Result<(), Error> {
        self.device_configs
            .lock()
            .unwrap()
            .push((name.to_owned(), wps_device_type.to_owned()));
        Ok(())
    }

    async fn publish_wfd_ies(&self, ies: &[u8]) -> Result<(), Error> {
        self.published.lock().unwrap().push(ies.to_vec());
        Ok(())
    }

    async fn attach_group(
        &self,
        group_path: &OwnedObjectPath,
        _iface_path: &OwnedObjectPath,
    ) -> Result<(), Error> {
        self.record(format!("attach_group:{group_path}"));
        Ok(())
    }

    async fn detach_group(&self) {
        self.record("detach_group");
    }

    async fn group_disconnect(&self) -> Result<(), Error> {
        self.record("group_disconnect");
        Ok(())
    }
}

struct MockEndpoint {
    alive: Arc<AtomicUsize>,
}

impl DhcpEndpoint for MockEndpoint {
    fn local_address(&self) -> Option<Ipv4Addr> {
        None
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        self.alive.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MockDhcp {
    servers: Mutex<Vec<String>>,
    clients: Mutex<Vec<String>>,
    alive: Arc<AtomicUsize>,
    event_tx: Mutex<Option<mpsc::UnboundedSender<DhcpEvent>>>,
}

impl MockDhcp {
    fn endpoint(&self, events: mpsc::UnboundedSender<DhcpEvent>) -> Box<dyn DhcpEndpoint> {
        self.alive.fetch_add(1, Ordering::SeqCst);
        *self.event_tx.lock().unwrap() = Some(events);
        Box::new(MockEndpoint {
            alive: self.alive.clone(),
        })
    }

    fn endpoints_alive(&self) -> usize {
        self.alive.load(Ordering::SeqCst)
    }

    fn send(&self, event: DhcpEvent) {
        let guard = self.event_tx.lock().unwrap();
        guard.as_ref().expect("no dhcp endpoint started").send(event).unwrap();
    }
}

#[async_trait]
impl Dhcp for MockDhcp {
    async fn start_server(
        &self,
        ifname: &str,
        events: mpsc::UnboundedSender<DhcpEvent>,
    ) -> Result<Box<dyn DhcpEndpoint>, Box<dyn std::error::Error + Send + Sync>> {
        self.servers.lock().unwrap().push(ifname.to_owned());
        Ok(self.endpoint(events))
    }

    async fn start_client(
        &self,
        ifname: &str,
        events: mpsc::UnboundedSender<DhcpEvent>,
    ) -> Result<Box<dyn DhcpEndpoint>, Box<dyn std::error::Error + Send + Sync>> {
        self.clients.lock().unwrap().push(ifname.to_owned());
        Ok(self.endpoint(events))
    }
}

#[derive(Default)]
struct MockDriver {
    commands: Mutex<Vec<(String, MiracastMode)>>,
}

#[async_trait]
impl DriverControl for MockDriver {
    async fn miracast_mode(&self, ifname: &str, mode: MiracastMode) -> Result<(), Error> {
        self.commands
            .lock()
            .unwrap()
            .push((ifname.to_owned(), mode));
        Ok(())
    }
}

struct Harness {
    link: Arc<MockLink>,
    dhcp: Arc<MockDhcp>,
    driver: Arc<MockDriver>,
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    notifier_rx: broadcast::Receiver<MiracastEvent>,
    registry: DeviceRegistry,
    local_address: Property<Option<Ipv4Addr>>,
    scanning: Property<bool>,
    cancellation_token: CancellationToken,
}

impl Harness {
    fn with_peer() -> Self {
        Self::build(MockLink::with_peer(PEER_PATH, PEER_ADDRESS))
    }

    fn build(link: Arc<MockLink>) -> Self {
        let dhcp = Arc::new(MockDhcp::default());
        let driver = Arc::new(MockDriver::default());
        let registry = DeviceRegistry::new();
        let (notifier_tx, notifier_rx) = broadcast::channel(100);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events_tx, event_rx) = mpsc::unbounded_channel();
        let cancellation_token = CancellationToken::new();
        let local_address = Property::new(None);
        let scanning = Property::new(false);

        let session = Session::new(SessionParams {
            link: link.clone(),
            dhcp: dhcp.clone(),
            driver: driver.clone(),
            firmware: None,
            firmware_gated: false,
            firmware_ifname: String::from("p2p0"),
            registry: registry.clone(),
            notifier_tx,
            events_tx: events_tx.clone(),
            running: Property::new(false),
            scanning: scanning.clone(),
            capabilities: Property::new(vec![Capability::Source]),
            local_address: local_address.clone(),
        });
        tokio::spawn(session.run(cmd_rx, event_rx, cancellation_token.clone()));

        Self {
            link,
            dhcp,
            driver,
            cmd_tx,
            events_tx,
            notifier_rx,
            registry,
            local_address,
            scanning,
            cancellation_token,
        }
    }

    fn send(&self, event: SessionEvent) {
        self.events_tx.send(event).unwrap();
    }

    async fn bring_up(&mut self) {
        self.send(SessionEvent::HostnameChanged {
            hostname: String::from("living-room"),
            chassis: Chassis::Laptop,
        });
        self.send(SessionEvent::ServiceAppeared);
        self.await_event(|event| matches!(event, MiracastEvent::RunningChanged(true)))
            .await;
    }

    async fn connect(&self, address: &str) -> Result<(), Error> {
        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Connect {
                address: address.to_owned(),
                reply,
            })
            .unwrap();
        reply_rx.await.unwrap()
    }

    async fn disconnect(&self, address: &str) -> Result<(), Error> {
        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Disconnect {
                address: address.to_owned(),
                reply,
            })
            .unwrap();
        reply_rx.await.unwrap()
    }

    async fn scan(&self, timeout: Duration) -> Result<(), Error> {
        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Scan { timeout, reply })
            .unwrap();
        reply_rx.await.unwrap()
    }

    async fn set_capabilities(&self, capabilities: Vec<Capability>) -> Result<(), Error> {
        let (reply, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::SetCapabilities { capabilities, reply })
            .unwrap();
        reply_rx.await.unwrap()
    }

    async fn await_event(&mut self, mut matches: impl FnMut(&MiracastEvent) -> bool) {
        tokio::time::timeout(Duration::from_secs(120), async {
            loop {
                let event = self.notifier_rx.recv().await.expect("notifier closed");
                if matches(&event) {
                    return;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    async fn await_state(&mut self, want: DeviceState) {
        self.await_event(|event| {
            matches!(event, MiracastEvent::DeviceStateChanged { state, .. } if *state == want)
        })
        .await;
    }

    /// Drives the happy path up to Connected as group owner.
    async fn establish_connected(&mut self) {
        self.bring_up().await;
        self.connect(PEER_ADDRESS).await.unwrap();
        self.await_state(DeviceState::Association).await;

        self.send(SessionEvent::GroupStarted {
            group_path: path(GROUP_PATH),
            iface_path: path(GROUP_IFACE_PATH),
            role: DeviceRole::GroupOwner,
        });
        self.await_state(DeviceState::Configuration).await;

        self.send(SessionEvent::GroupInterfaceReady {
            iface_path: path(GROUP_IFACE_PATH),
            ifname: String::from(GROUP_IFNAME),
        });
        wait_for(|| self.dhcp.endpoints_alive() == 1).await;

        self.dhcp.send(DhcpEvent::AddressAssigned {
            local: Ipv4Addr::new(192, 168, 7, 1),
            remote: Ipv4Addr::new(192, 168, 7, 2),
        });
        self.await_state(DeviceState::Connected).await;
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test(start_paused = true)]
async fn happy_path_as_group_owner() {
    let mut harness = Harness::with_peer();
    harness.establish_connected().await;

    let device = harness.registry.find(PEER_ADDRESS).unwrap();
    assert_eq!(device.state.get(), DeviceState::Connected);
    assert_eq!(device.ipv4.get(), Some(Ipv4Addr::new(192, 168, 7, 2)));
    assert_eq!(
        harness.local_address.get(),
        Some(Ipv4Addr::new(192, 168, 7, 1))
    );

    assert_eq!(harness.link.count("stop_find"), 1);
    assert_eq!(harness.link.count(&format!("connect:{PEER_PATH}")), 1);
    assert_eq!(
        harness.dhcp.servers.lock().unwrap().as_slice(),
        [GROUP_IFNAME]
    );
    assert!(
        harness
            .driver
            .commands
            .lock()
            .unwrap()
            .contains(&(String::from("p2p0"), MiracastMode::Source))
    );

    // Busy bit cleared once connected.
    let published = harness.link.published();
    assert_eq!(
        published.last().unwrap().as_slice(),
        [0x00, 0x00, 0x06, 0x00, 0x00, 0x1C, 0x44, 0x00, 0x32]
    );
    assert_eq!(
        published.first().unwrap().as_slice(),
        [0x00, 0x00, 0x06, 0x00, 0x10, 0x1C, 0x44, 0x00, 0x32]
    );

    // The connect clock is disarmed; nothing fires after the deadline.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(device.state.get(), DeviceState::Connected);
    assert_eq!(harness.link.count("cancel"), 0);
}

#[tokio::test(start_paused = true)]
async fn connect_times_out_in_association() {
    let mut harness = Harness::with_peer();
    harness.bring_up().await;
    harness.connect(PEER_ADDRESS).await.unwrap();
    harness.await_state(DeviceState::Association).await;

    // No group ever starts; the 30 s clock expires.
    harness.await_state(DeviceState::Failure).await;

    assert_eq!(harness.link.count("cancel"), 1);

    // current_device is cleared, so a fresh attempt is accepted.
    harness.connect(PEER_ADDRESS).await.unwrap();
    harness.await_state(DeviceState::Association).await;
}

#[tokio::test(start_paused = true)]
async fn peer_lost_mid_group_tears_down_via_group_finished() {
    let mut harness = Harness::with_peer();
    harness.establish_connected().await;

    harness.send(SessionEvent::PeerLost(path(PEER_PATH)));
    harness
        .await_event(|event| matches!(event, MiracastEvent::DeviceLost(_)))
        .await;

    assert_eq!(harness.link.count("group_disconnect"), 1);
    assert!(harness.registry.find(PEER_ADDRESS).is_none());

    harness.send(SessionEvent::GroupFinished {
        group_path: path(GROUP_PATH),
        iface_path: path(GROUP_IFACE_PATH),
    });
    harness.await_state(DeviceState::Disconnected).await;

    assert_eq!(harness.dhcp.endpoints_alive(), 0);
    assert_eq!(harness.link.count("detach_group"), 1);
    assert!(
        harness
            .driver
            .commands
            .lock()
            .unwrap()
            .contains(&(String::from("p2p0"), MiracastMode::Off))
    );
    assert_eq!(harness.local_address.get(), None);

    // Session availability advertised again.
    assert_eq!(
        harness.link.published().last().unwrap().as_slice(),
        [0x00, 0x00, 0x06, 0x00, 0x10, 0x1C, 0x44, 0x00, 0x32]
    );
}

#[tokio::test(start_paused = true)]
async fn dhcp_termination_in_configuration_fails_the_attempt() {
    let mut harness = Harness::with_peer();
    harness.bring_up().await;
    harness.connect(PEER_ADDRESS).await.unwrap();
    harness.await_state(DeviceState::Association).await;

    harness.send(SessionEvent::GroupStarted {
        group_path: path(GROUP_PATH),
        iface_path: path(GROUP_IFACE_PATH),
        role: DeviceRole::Client,
    });
    harness.await_state(DeviceState::Configuration).await;

    harness.send(SessionEvent::GroupInterfaceReady {
        iface_path: path(GROUP_IFACE_PATH),
        ifname: String::from(GROUP_IFNAME),
    });
    wait_for(|| harness.dhcp.endpoints_alive() == 1).await;
    assert_eq!(
        harness.dhcp.clients.lock().unwrap().as_slice(),
        [GROUP_IFNAME]
    );

    harness.dhcp.send(DhcpEvent::Terminated);
    harness.await_state(DeviceState::Failure).await;

    assert_eq!(harness.link.count("group_disconnect"), 1);
    assert_eq!(harness.dhcp.endpoints_alive(), 0);

    // The trailing GroupFinished from the requested disconnect finds an
    // already-released context and stays quiet.
    harness.send(SessionEvent::GroupFinished {
        group_path: path(GROUP_PATH),
        iface_path: path(GROUP_IFACE_PATH),
    });
    harness.connect(PEER_ADDRESS).await.unwrap();
    harness.await_state(DeviceState::Association).await;
}

#[tokio::test(start_paused = true)]
async fn device_configuration_carries_chassis_wps_type() {
    let mut harness = Harness::with_peer();
    harness.send(SessionEvent::HostnameChanged {
        hostname: String::from("pocket"),
        chassis: Chassis::Handset,
    });
    harness.send(SessionEvent::ServiceAppeared);
    harness
        .await_event(|event| matches!(event, MiracastEvent::RunningChanged(true)))
        .await;

    assert_eq!(
        harness.link.device_configs().last().unwrap(),
        &(String::from("pocket"), String::from("000A0050F2040005"))
    );

    // A later hostname change re-issues the configuration sync.
    harness.send(SessionEvent::HostnameChanged {
        hostname: String::from("pocket-2"),
        chassis: Chassis::Handset,
    });
    wait_for(|| harness.link.device_configs().len() == 2).await;

    // Dual-role capabilities flip the device-type bits in the IE.
    harness
        .set_capabilities(vec![Capability::Source, Capability::Sink])
        .await
        .unwrap();
    wait_for(|| {
        harness.link.published().last().map(|ies| ies[4]) == Some(0x13)
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn equal_capabilities_do_not_republish() {
    let mut harness = Harness::with_peer();
    harness.bring_up().await;

    let initial = harness.link.published().len();
    harness
        .set_capabilities(vec![Capability::Source])
        .await
        .unwrap();
    harness
        .set_capabilities(vec![Capability::Source])
        .await
        .unwrap();
    assert_eq!(harness.link.published().len(), initial);

    harness.set_capabilities(vec![Capability::Sink]).await.unwrap();
    assert_eq!(harness.link.published().len(), initial + 1);
    harness.set_capabilities(vec![Capability::Sink]).await.unwrap();
    assert_eq!(harness.link.published().len(), initial + 1);
}

#[tokio::test(start_paused = true)]
async fn preconditions_are_rejected_without_side_effects() {
    let mut harness = Harness::with_peer();

    // Nothing works before the link is up.
    assert!(matches!(
        harness.connect(PEER_ADDRESS).await,
        Err(Error::NoP2pDevice { .. })
    ));

    harness.bring_up().await;

    assert!(matches!(
        harness.connect("00:00:00:00:00:00").await,
        Err(Error::UnknownDevice { .. })
    ));
    assert!(matches!(
        harness.disconnect("00:00:00:00:00:00").await,
        Err(Error::UnknownDevice { .. })
    ));
    // Known but idle peer cannot be disconnected.
    assert!(matches!(
        harness.disconnect(PEER_ADDRESS).await,
        Err(Error::InvalidState { .. })
    ));

    harness.connect(PEER_ADDRESS).await.unwrap();
    harness.await_state(DeviceState::Association).await;
    assert!(matches!(
        harness.connect(PEER_ADDRESS).await,
        Err(Error::ConnectionInProgress)
    ));

    assert_eq!(harness.link.count(&format!("connect:{PEER_PATH}")), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_after_teardown_is_rejected() {
    let mut harness = Harness::with_peer();
    harness.establish_connected().await;

    harness.disconnect(PEER_ADDRESS).await.unwrap();
    assert_eq!(harness.link.count("group_disconnect"), 1);

    harness.send(SessionEvent::GroupFinished {
        group_path: path(GROUP_PATH),
        iface_path: path(GROUP_IFACE_PATH),
    });
    harness.await_state(DeviceState::Disconnected).await;

    assert!(matches!(
        harness.disconnect(PEER_ADDRESS).await,
        Err(Error::InvalidState { .. })
    ));
    assert_eq!(harness.link.count("group_disconnect"), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_events_are_ignored() {
    let mut harness = Harness::with_peer();
    harness.establish_connected().await;
    let device = harness.registry.find(PEER_ADDRESS).unwrap();

    // A finished signal for some other group does not touch the session.
    harness.send(SessionEvent::GroupFinished {
        group_path: path("/groups/9"),
        iface_path: path("/ifaces/9"),
    });
    // A negotiation failure for a stale peer is dropped too.
    harness.send(SessionEvent::GoNegotiationFailure {
        peer: path("/peers/9"),
        status: 5,
    });
    // Timeout events from a previous attempt carry a stale counter.
    harness.send(SessionEvent::ConnectTimeout { attempt: 0 });

    harness.send(SessionEvent::GroupRequest {
        peer: path("/peers/9"),
    });

    wait_for(|| device.state.get() == DeviceState::Connected).await;
    assert_eq!(harness.dhcp.endpoints_alive(), 1);
    assert_eq!(harness.link.count("detach_group"), 0);
}

#[tokio::test(start_paused = true)]
async fn go_negotiation_failure_fails_the_attempt() {
    let mut harness = Harness::with_peer();
    harness.bring_up().await;
    harness.connect(PEER_ADDRESS).await.unwrap();
    harness.await_state(DeviceState::Association).await;

    harness.send(SessionEvent::GoNegotiationFailure {
        peer: path(PEER_PATH),
        status: 7,
    });
    harness.await_state(DeviceState::Failure).await;

    // Failure is terminal for the attempt; the timer never fires later.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.link.count("cancel"), 0);
}

#[tokio::test(start_paused = true)]
async fn scan_flips_scanning_until_the_timeout() {
    let mut harness = Harness::with_peer();
    harness.bring_up().await;

    harness.scan(Duration::from_secs(10)).await.unwrap();
    harness
        .await_event(|event| matches!(event, MiracastEvent::ScanningChanged(true)))
        .await;
    assert!(harness.scanning.get());
    assert_eq!(harness.link.count("find"), 1);

    harness
        .await_event(|event| matches!(event, MiracastEvent::ScanningChanged(false)))
        .await;
    assert!(!harness.scanning.get());
}

#[tokio::test(start_paused = true)]
async fn supplicant_vanishing_forces_disconnected() {
    let mut harness = Harness::with_peer();
    harness.establish_connected().await;

    harness.send(SessionEvent::ServiceVanished);
    harness.await_state(DeviceState::Disconnected).await;
    harness
        .await_event(|event| matches!(event, MiracastEvent::RunningChanged(false)))
        .await;

    assert!(harness.registry.snapshot().is_empty());
    assert_eq!(harness.dhcp.endpoints_alive(), 0);
    assert_eq!(harness.link.count("reset"), 1);
}

#[tokio::test(start_paused = true)]
async fn peer_found_event_announces_ready_devices() {
    let mut harness = Harness::build(Arc::new(MockLink::default()));
    harness.bring_up().await;

    harness
        .link
        .peers
        .lock()
        .unwrap()
        .push((path("/peers/5"), String::from("11:22:33:44:55:66")));
    harness.send(SessionEvent::PeerFound(path("/peers/5")));
    harness
        .await_event(|event| matches!(event, MiracastEvent::DeviceFound(_)))
        .await;

    assert!(harness.registry.find("11:22:33:44:55:66").is_some());

    // Duplicate reports do not create a second entry.
    harness.send(SessionEvent::PeerFound(path("/peers/5")));
    wait_for(|| harness.registry.snapshot().len() == 1).await;
}
