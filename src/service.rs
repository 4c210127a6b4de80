use std::{env, net::Ipv4Addr, sync::Arc, time::Duration};

use derive_more::Debug;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument};
use zbus::Connection;

use crate::{
    Property,
    core::device::NetworkDevice,
    dhcp::Dhcp,
    driver::{DriverControl, WpaCliDriver},
    error::Error,
    firmware::{self, FirmwareLoader},
    monitoring::SupplicantWatcher,
    registry::DeviceRegistry,
    session::{
        Session, SessionParams,
        events::{SessionCommand, SessionEvent},
    },
    supplicant::{WpaLink, WpaLinkParams},
    traits::ServiceMonitoring,
    types::{
        Capability, DEDICATED_P2P_INTERFACE_ENV, DEFAULT_P2P_INTERFACE, MiracastEvent,
    },
};

/// Collaborators and environment configuration for [`MiracastService`].
#[derive(Debug)]
pub struct MiracastParams {
    /// DHCP endpoint factory for group interfaces.
    #[debug(skip)]
    pub dhcp: Arc<dyn Dhcp>,
    /// Driver private command transport.
    #[debug(skip)]
    pub driver: Arc<dyn DriverControl>,
    /// Optional firmware loader consulted before promotion.
    #[debug(skip)]
    pub firmware: Option<Arc<dyn FirmwareLoader>>,
    /// Dedicated P2P interface name to adopt or create.
    pub dedicated_interface: Option<String>,
    /// Whether startup waits for a firmware load.
    pub need_firmware: bool,
}

impl MiracastParams {
    /// Builds params from the `AETHERCAST_*` environment with the default
    /// driver transport and no firmware loader.
    pub fn from_env(dhcp: Arc<dyn Dhcp>) -> Self {
        Self {
            dhcp,
            driver: Arc::new(WpaCliDriver),
            firmware: None,
            dedicated_interface: env::var(DEDICATED_P2P_INTERFACE_ENV)
                .ok()
                .filter(|name| !name.is_empty()),
            need_firmware: firmware::gated_by_env(),
        }
    }
}

struct SessionHandle {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    session_token: CancellationToken,
}

/// Wi-Fi P2P connection management for Miracast sources.
///
/// Drives peer discovery, group negotiation, addressing and WFD IE
/// publication on top of a wpa_supplicant instance. Upper layers observe
/// state through the public [`Property`] fields and the event stream from
/// [`subscribe`](Self::subscribe).
#[derive(Debug)]
pub struct MiracastService {
    #[debug(skip)]
    cancellation_token: CancellationToken,
    #[debug(skip)]
    notifier_tx: broadcast::Sender<MiracastEvent>,
    #[debug(skip)]
    dhcp: Arc<dyn Dhcp>,
    #[debug(skip)]
    driver: Arc<dyn DriverControl>,
    #[debug(skip)]
    firmware: Option<Arc<dyn FirmwareLoader>>,
    #[debug(skip)]
    runtime: Mutex<Option<SessionHandle>>,
    #[debug(skip)]
    registry: DeviceRegistry,
    dedicated_interface: Option<String>,
    need_firmware: bool,

    /// Known peers (live).
    pub devices: Property<Vec<Arc<NetworkDevice>>>,
    /// Whether a scan is in progress.
    pub scanning: Property<bool>,
    /// Whether a P2P management interface is adopted and configured.
    pub running: Property<bool>,
    /// Advertised capability set.
    pub capabilities: Property<Vec<Capability>>,
    /// Local address on the group interface, while connected.
    pub local_address: Property<Option<Ipv4Addr>>,
}

impl MiracastService {
    /// Creates the service. No bus access happens until [`setup`](Self::setup).
    pub fn new(params: MiracastParams) -> Self {
        let registry = DeviceRegistry::new();
        let (notifier_tx, _) = broadcast::channel::<MiracastEvent>(100);

        Self {
            cancellation_token: CancellationToken::new(),
            notifier_tx,
            dhcp: params.dhcp,
            driver: params.driver,
            firmware: params.firmware,
            runtime: Mutex::new(None),
            devices: registry.view(),
            registry,
            dedicated_interface: params.dedicated_interface,
            need_firmware: params.need_firmware,
            scanning: Property::new(false),
            running: Property::new(false),
            capabilities: Property::new(vec![Capability::Source]),
            local_address: Property::new(None),
        }
    }

    /// Subscribes to upper-layer notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<MiracastEvent> {
        self.notifier_tx.subscribe()
    }

    /// Acquires the system bus and arms the supplicant watcher.
    ///
    /// Idempotent; a failed bus acquisition leaves the service inert and
    /// may be retried.
    ///
    /// # Errors
    /// Returns error if the system bus is unreachable or the name watcher
    /// cannot be registered.
    #[instrument(skip(self), err)]
    pub async fn setup(&self) -> Result<(), Error> {
        let mut runtime = self.runtime.lock().await;
        if runtime.is_some() {
            return Ok(());
        }

        let connection = Connection::system().await.map_err(|err| {
            error!(error = %err, "cannot acquire the system bus");
            Error::ServiceInitialization(Box::new(err))
        })?;

        let session_token = self.cancellation_token.child_token();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<SessionCommand>();
        let (events_tx, event_rx) = mpsc::unbounded_channel::<SessionEvent>();

        let link = Arc::new(WpaLink::new(WpaLinkParams {
            connection: connection.clone(),
            events_tx: events_tx.clone(),
            notifier_tx: self.notifier_tx.clone(),
            cancellation_token: session_token.clone(),
            dedicated_interface: self.dedicated_interface.clone(),
        }));

        let session = Session::new(SessionParams {
            link,
            dhcp: self.dhcp.clone(),
            driver: self.driver.clone(),
            firmware: self.firmware.clone(),
            firmware_gated: self.need_firmware,
            firmware_ifname: self
                .dedicated_interface
                .clone()
                .unwrap_or_else(|| DEFAULT_P2P_INTERFACE.to_owned()),
            registry: self.registry.clone(),
            notifier_tx: self.notifier_tx.clone(),
            events_tx: events_tx.clone(),
            running: self.running.clone(),
            scanning: self.scanning.clone(),
            capabilities: self.capabilities.clone(),
            local_address: self.local_address.clone(),
        });
        tokio::spawn(session.run(cmd_rx, event_rx, session_token.clone()));

        let watcher = SupplicantWatcher::new(connection, events_tx, session_token.clone());
        if let Err(error) = watcher.start_monitoring().await {
            session_token.cancel();
            return Err(error);
        }

        *runtime = Some(SessionHandle {
            cmd_tx,
            session_token,
        });
        Ok(())
    }

    /// Tears everything down: the current device is forced through
    /// Disconnected, proxies and watchers are released.
    #[instrument(skip(self))]
    pub async fn release(&self) {
        let mut runtime = self.runtime.lock().await;
        if let Some(handle) = runtime.take() {
            handle.session_token.cancel();
        }
    }

    /// Starts a peer scan for the given duration.
    ///
    /// # Errors
    /// Returns error if the service is not set up or no P2P interface is
    /// adopted.
    #[instrument(skip(self), fields(timeout_secs = timeout.as_secs()), err)]
    pub async fn scan(&self, timeout: Duration) -> Result<(), Error> {
        self.command("scan", |reply| SessionCommand::Scan { timeout, reply })
            .await
    }

    /// Starts a connection attempt to the peer with the given MAC address.
    ///
    /// The attempt itself is asynchronous: progress arrives as
    /// [`MiracastEvent::DeviceStateChanged`] notifications.
    ///
    /// # Errors
    /// Returns error if another attempt is active, the address is unknown,
    /// or no P2P interface is adopted.
    #[instrument(skip(self), err)]
    pub async fn connect(&self, address: &str) -> Result<(), Error> {
        let address = address.to_owned();
        self.command("connect", |reply| SessionCommand::Connect { address, reply })
            .await
    }

    /// Disconnects the peer with the given MAC address.
    ///
    /// # Errors
    /// Returns error if the address is unknown or the peer is not in an
    /// active group.
    #[instrument(skip(self), err)]
    pub async fn disconnect(&self, address: &str) -> Result<(), Error> {
        let address = address.to_owned();
        self.command("disconnect", |reply| SessionCommand::Disconnect {
            address,
            reply,
        })
        .await
    }

    /// Reconfigures the advertised capability set, republishing the WFD IE
    /// when it actually changes.
    ///
    /// # Errors
    /// Returns error if the service is not set up.
    #[instrument(skip(self), err)]
    pub async fn set_capabilities(&self, capabilities: Vec<Capability>) -> Result<(), Error> {
        self.command("set capabilities", |reply| SessionCommand::SetCapabilities {
            capabilities,
            reply,
        })
        .await
    }

    /// The advertised capability set.
    pub fn capabilities(&self) -> Vec<Capability> {
        self.capabilities.get()
    }

    /// Snapshot of the known peers.
    pub fn devices(&self) -> Vec<Arc<NetworkDevice>> {
        self.devices.get()
    }

    /// Local address on the group interface, while connected.
    pub fn local_address(&self) -> Option<Ipv4Addr> {
        self.local_address.get()
    }

    /// Whether a P2P management interface is adopted and configured.
    pub fn running(&self) -> bool {
        self.running.get()
    }

    /// Whether a scan is in progress.
    pub fn scanning(&self) -> bool {
        self.scanning.get()
    }

    async fn command<F>(&self, operation: &'static str, build: F) -> Result<(), Error>
    where
        F: FnOnce(oneshot::Sender<Result<(), Error>>) -> SessionCommand,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        {
            let runtime = self.runtime.lock().await;
            let Some(handle) = runtime.as_ref() else {
                return Err(Error::NotRunning { operation });
            };
            handle
                .cmd_tx
                .send(build(reply_tx))
                .map_err(|_| Error::NotRunning { operation })?;
        }

        reply_rx
            .await
            .map_err(|_| Error::NotRunning { operation })?
    }
}

impl Drop for MiracastService {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
