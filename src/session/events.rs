use std::time::Duration;

use tokio::sync::oneshot;
use zbus::zvariant::OwnedObjectPath;

use crate::{
    dhcp::DhcpEvent,
    error::Error,
    types::{
        Capability,
        device::{Chassis, DeviceRole},
    },
};

/// User requests, answered through a oneshot so precondition failures
/// surface to the caller without side effects.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Connect {
        address: String,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    Disconnect {
        address: String,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    Scan {
        timeout: Duration,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    SetCapabilities {
        capabilities: Vec<Capability>,
        reply: oneshot::Sender<Result<(), Error>>,
    },
}

/// Everything the outside world reports to the session.
///
/// The session run loop is the only place device state advances; every
/// event is identity-checked against the live attempt before dispatch.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    ServiceAppeared,
    ServiceVanished,
    HostnameChanged {
        hostname: String,
        chassis: Chassis,
    },
    InterfaceAdded(OwnedObjectPath),
    InterfaceRemoved(OwnedObjectPath),
    InterfaceCreationFailed,
    PeerFound(OwnedObjectPath),
    PeerLost(OwnedObjectPath),
    GoNegotiationSuccess {
        peer: OwnedObjectPath,
        frequencies: Vec<i32>,
        wps_method: String,
    },
    GoNegotiationFailure {
        peer: OwnedObjectPath,
        status: i32,
    },
    PeerConnectFailed {
        reason: String,
    },
    GroupStarted {
        group_path: OwnedObjectPath,
        iface_path: OwnedObjectPath,
        role: DeviceRole,
    },
    GroupInterfaceReady {
        iface_path: OwnedObjectPath,
        ifname: String,
    },
    GroupFinished {
        group_path: OwnedObjectPath,
        iface_path: OwnedObjectPath,
    },
    GroupRequest {
        peer: OwnedObjectPath,
    },
    Dhcp {
        attempt: u64,
        event: DhcpEvent,
    },
    ConnectTimeout {
        attempt: u64,
    },
    ScanDone {
        epoch: u64,
    },
}
