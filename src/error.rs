use crate::types::device::DeviceState;

/// Miracast service errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// D-Bus communication error.
    #[error("dbus error: {0}")]
    Dbus(#[from] zbus::Error),

    /// Service initialization failed.
    #[error("cannot initialize miracast service")]
    ServiceInitialization(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// API called while the service is not set up.
    #[error("cannot {operation}: service is not running")]
    NotRunning {
        /// The operation that was requested.
        operation: &'static str,
    },

    /// No P2P-capable interface has been adopted yet.
    #[error("cannot {operation}: no p2p device available")]
    NoP2pDevice {
        /// The operation that requires the P2P device.
        operation: &'static str,
    },

    /// A connection attempt is already in flight.
    #[error("cannot connect: another connection attempt is active")]
    ConnectionInProgress,

    /// The address does not belong to any known peer.
    #[error("cannot {operation}: unknown device {address}")]
    UnknownDevice {
        /// The operation that was requested.
        operation: &'static str,
        /// The address that failed to resolve.
        address: String,
    },

    /// The current device is in the wrong state for the operation.
    #[error("cannot {operation} while device is {state}")]
    InvalidState {
        /// The operation that was requested.
        operation: &'static str,
        /// The state the current device is in.
        state: DeviceState,
    },

    /// An outward operation failed.
    #[error("cannot {operation}")]
    OperationFailed {
        /// The operation that failed.
        operation: &'static str,
        /// Underlying error that caused the failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Firmware could not be loaded for the P2P interface.
    #[error("cannot load firmware for {ifname}")]
    FirmwareLoad {
        /// Interface the firmware was requested for.
        ifname: String,
        /// Underlying loader error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A DHCP endpoint could not be started.
    #[error("cannot start dhcp {role} on {ifname}")]
    DhcpStart {
        /// `server` or `client`.
        role: &'static str,
        /// Group interface name.
        ifname: String,
        /// Underlying endpoint error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
