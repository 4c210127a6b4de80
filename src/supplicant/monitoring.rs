//! Signal pumps translating supplicant signals into session events.

use std::collections::HashMap;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use zbus::zvariant::{OwnedObjectPath, OwnedValue};

use crate::{
    proxy::{manager::SupplicantProxy, p2p_device::P2PDeviceProxy},
    session::events::SessionEvent,
    types::device::DeviceRole,
};

pub(super) fn spawn_manager_signals(
    manager: SupplicantProxy<'static>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    cancellation_token: CancellationToken,
) {
    tokio::spawn(async move {
        let mut interface_added = match manager.receive_interface_added().await {
            Ok(stream) => stream,
            Err(error) => {
                warn!(error = %error, "cannot subscribe to InterfaceAdded");
                return;
            }
        };
        let mut interface_removed = match manager.receive_interface_removed().await {
            Ok(stream) => stream,
            Err(error) => {
                warn!(error = %error, "cannot subscribe to InterfaceRemoved");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    debug!("manager signal pump cancelled");
                    return;
                }
                Some(added) = interface_added.next() => {
                    if let Ok(args) = added.args() {
                        let _ = events_tx.send(SessionEvent::InterfaceAdded(args.path));
                    }
                }
                Some(removed) = interface_removed.next() => {
                    if let Ok(args) = removed.args() {
                        let _ = events_tx.send(SessionEvent::InterfaceRemoved(args.path));
                    }
                }
                else => {
                    debug!("manager signal streams ended");
                    return;
                }
            }
        }
    });
}

#[allow(clippy::cognitive_complexity)]
pub(super) fn spawn_p2p_signals(
    p2p: P2PDeviceProxy<'static>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    cancellation_token: CancellationToken,
) {
    tokio::spawn(async move {
        let (
            device_found,
            device_lost,
            negotiation_success,
            negotiation_failure,
            negotiation_request,
            group_started,
            group_finished,
            formation_failure,
        ) = tokio::join!(
            p2p.receive_device_found(),
            p2p.receive_device_lost(),
            p2p.receive_go_negotiation_success(),
            p2p.receive_go_negotiation_failure(),
            p2p.receive_go_negotiation_request(),
            p2p.receive_group_started(),
            p2p.receive_group_finished(),
            p2p.receive_group_formation_failure(),
        );

        let (
            Ok(mut device_found),
            Ok(mut device_lost),
            Ok(mut negotiation_success),
            Ok(mut negotiation_failure),
            Ok(mut negotiation_request),
            Ok(mut group_started),
            Ok(mut group_finished),
            Ok(mut formation_failure),
        ) = (
            device_found,
            device_lost,
            negotiation_success,
            negotiation_failure,
            negotiation_request,
            group_started,
            group_finished,
            formation_failure,
        )
        else {
            warn!("cannot subscribe to p2p device signals");
            return;
        };

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    debug!("p2p signal pump cancelled");
                    return;
                }
                Some(signal) = device_found.next() => {
                    if let Ok(args) = signal.args() {
                        let _ = events_tx.send(SessionEvent::PeerFound(args.path));
                    }
                }
                Some(signal) = device_lost.next() => {
                    if let Ok(args) = signal.args() {
                        let _ = events_tx.send(SessionEvent::PeerLost(args.path));
                    }
                }
                Some(signal) = negotiation_success.next() => {
                    if let Ok(args) = signal.args() {
                        let properties = args.properties;
                        if let Some(peer) = path_prop(&properties, "peer_object") {
                            let _ = events_tx.send(SessionEvent::GoNegotiationSuccess {
                                peer,
                                frequencies: i32_list_prop(&properties, "frequency_list"),
                                wps_method: str_prop(&properties, "wps_method")
                                    .unwrap_or_default(),
                            });
                        }
                    }
                }
                Some(signal) = negotiation_failure.next() => {
                    if let Ok(args) = signal.args() {
                        let properties = args.properties;
                        let Some(peer) = path_prop(&properties, "peer_object") else {
                            debug!("negotiation failure without peer object");
                            continue;
                        };
                        let _ = events_tx.send(SessionEvent::GoNegotiationFailure {
                            peer,
                            status: i32_prop(&properties, "status").unwrap_or_default(),
                        });
                    }
                }
                Some(signal) = negotiation_request.next() => {
                    if let Ok(args) = signal.args() {
                        let _ = events_tx.send(SessionEvent::GroupRequest { peer: args.path });
                    }
                }
                Some(signal) = group_started.next() => {
                    if let Ok(args) = signal.args() {
                        let properties = args.properties;
                        let group = path_prop(&properties, "group_object");
                        let iface = path_prop(&properties, "interface_object");
                        let (Some(group_path), Some(iface_path)) = (group, iface) else {
                            warn!("group started without group or interface object");
                            continue;
                        };
                        let role = str_prop(&properties, "role")
                            .as_deref()
                            .map(DeviceRole::from)
                            .unwrap_or(DeviceRole::Unknown);
                        let _ = events_tx.send(SessionEvent::GroupStarted {
                            group_path,
                            iface_path,
                            role,
                        });
                    }
                }
                Some(signal) = group_finished.next() => {
                    if let Ok(args) = signal.args() {
                        let properties = args.properties;
                        let group = path_prop(&properties, "group_object");
                        let iface = path_prop(&properties, "interface_object");
                        let (Some(group_path), Some(iface_path)) = (group, iface) else {
                            warn!("group finished without group or interface object");
                            continue;
                        };
                        let _ = events_tx.send(SessionEvent::GroupFinished {
                            group_path,
                            iface_path,
                        });
                    }
                }
                Some(signal) = formation_failure.next() => {
                    if let Ok(args) = signal.args() {
                        let _ = events_tx.send(SessionEvent::PeerConnectFailed {
                            reason: args.reason,
                        });
                    }
                }
                else => {
                    debug!("p2p signal streams ended");
                    return;
                }
            }
        }
    });
}

fn path_prop(
    properties: &HashMap<String, OwnedValue>,
    key: &str,
) -> Option<OwnedObjectPath> {
    properties
        .get(key)
        .and_then(|value| OwnedObjectPath::try_from(value.clone()).ok())
}

fn str_prop(properties: &HashMap<String, OwnedValue>, key: &str) -> Option<String> {
    properties
        .get(key)
        .and_then(|value| String::try_from(value.clone()).ok())
}

fn i32_prop(properties: &HashMap<String, OwnedValue>, key: &str) -> Option<i32> {
    properties
        .get(key)
        .and_then(|value| i32::try_from(value.clone()).ok())
}

fn i32_list_prop(properties: &HashMap<String, OwnedValue>, key: &str) -> Vec<i32> {
    properties
        .get(key)
        .and_then(|value| Vec::<i32>::try_from(value.clone()).ok())
        .unwrap_or_default()
}
