//! Miracast type definitions.

/// Peer device type definitions
pub mod device;
/// Wi-Fi Display information element encoding
pub mod ie;

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use zbus::zvariant::OwnedObjectPath;

use crate::core::device::NetworkDevice;
use device::DeviceState;

pub(crate) const SUPPLICANT_SERVICE: &str = "fi.w1.wpa_supplicant1";

/// Environment variable naming a dedicated P2P interface to adopt or create.
pub const DEDICATED_P2P_INTERFACE_ENV: &str = "AETHERCAST_DEDICATED_P2P_INTERFACE";
/// Environment variable gating startup on a firmware load (`"1"` enables).
pub const NEED_FIRMWARE_ENV: &str = "AETHERCAST_NEED_FIRMWARE";

/// Interface name used for firmware loading when none is configured.
pub const DEFAULT_P2P_INTERFACE: &str = "p2p0";

/// How long a connection attempt may sit without an established group.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Roles this endpoint can advertise in the WFD information element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    /// Streams media out to a remote display.
    #[serde(rename = "source")]
    Source,
    /// Renders media streamed by a remote source.
    #[serde(rename = "sink")]
    Sink,
}

/// Argument of the `MIRACAST <n>` driver private command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiracastMode {
    /// Miracast disabled.
    Off,
    /// Acting as a Miracast source.
    Source,
    /// Acting as a Miracast sink.
    Sink,
}

impl MiracastMode {
    pub(crate) fn as_command(self) -> &'static str {
        match self {
            Self::Off => "MIRACAST 0",
            Self::Source => "MIRACAST 1",
            Self::Sink => "MIRACAST 2",
        }
    }
}

/// Notifications delivered to upper layers via [`MiracastService::subscribe`].
///
/// [`MiracastService::subscribe`]: crate::MiracastService::subscribe
#[derive(Debug, Clone)]
pub enum MiracastEvent {
    /// A peer finished its initial property fetch and joined the registry.
    DeviceFound(Arc<NetworkDevice>),
    /// A peer disappeared from the supplicant.
    DeviceLost(OwnedObjectPath),
    /// A peer's properties changed.
    DeviceChanged(OwnedObjectPath),
    /// A peer's connection state advanced.
    DeviceStateChanged {
        /// Object path of the peer.
        path: OwnedObjectPath,
        /// The state it entered.
        state: DeviceState,
    },
    /// Scan activity started or stopped.
    ScanningChanged(bool),
    /// The P2P management interface became usable or went away.
    RunningChanged(bool),
}
