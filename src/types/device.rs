use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

/// Connection state of a peer device.
///
/// `Disconnected` and `Failure` are terminal for a given attempt; the
/// session drops its current-device reference on entering either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    /// Known but not part of a connection attempt.
    Idle,
    /// `Connect` issued, waiting for a group.
    Association,
    /// Group established, addressing in progress.
    Configuration,
    /// Addressed and streaming-ready.
    Connected,
    /// Attempt ended by an orderly teardown.
    Disconnected,
    /// Attempt ended by an error or timeout.
    Failure,
}

impl DeviceState {
    /// Whether the device takes part in an active group.
    pub fn is_grouped(self) -> bool {
        matches!(self, Self::Configuration | Self::Connected)
    }
}

impl Display for DeviceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Association => write!(f, "association"),
            Self::Configuration => write!(f, "configuration"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Role of an endpoint within a P2P group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceRole {
    /// Acts as the AP-equivalent of the group; runs the DHCP server.
    GroupOwner,
    /// Joined someone else's group; runs a DHCP client.
    Client,
    /// Not part of a group.
    Unknown,
}

impl From<&str> for DeviceRole {
    fn from(s: &str) -> Self {
        match s {
            "GO" => Self::GroupOwner,
            "client" => Self::Client,
            _ => Self::Unknown,
        }
    }
}

impl Display for DeviceRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::GroupOwner => write!(f, "GO"),
            Self::Client => write!(f, "client"),
            Self::Unknown => write!(f, ""),
        }
    }
}

const WPS_OUI: &str = "0050F204";
const WPS_CATEGORY_COMPUTER: &str = "0001";
const WPS_CATEGORY_TELEPHONE: &str = "000A";

/// Host chassis as reported by hostnamed.
///
/// Drives the WPS primary device type advertised in P2P frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chassis {
    /// Phone-style device.
    Handset,
    /// Virtual machine guest.
    Vm,
    /// Container guest.
    Container,
    /// Server machine.
    Server,
    /// Laptop machine.
    Laptop,
    /// Desktop machine.
    Desktop,
    /// Tablet device.
    Tablet,
    /// Smartwatch device.
    Watch,
    /// Anything hostnamed did not classify.
    Other,
}

impl From<&str> for Chassis {
    fn from(s: &str) -> Self {
        match s {
            "handset" => Self::Handset,
            "vm" => Self::Vm,
            "container" => Self::Container,
            "server" => Self::Server,
            "laptop" => Self::Laptop,
            "desktop" => Self::Desktop,
            "tablet" => Self::Tablet,
            "watch" => Self::Watch,
            _ => Self::Other,
        }
    }
}

impl Chassis {
    fn category(self) -> &'static str {
        match self {
            Self::Handset => WPS_CATEGORY_TELEPHONE,
            _ => WPS_CATEGORY_COMPUTER,
        }
    }

    fn subcategory(self) -> &'static str {
        match self {
            Self::Handset => "0005",
            Self::Vm | Self::Container => "0001",
            Self::Server => "0002",
            Self::Laptop => "0005",
            Self::Desktop => "0006",
            Self::Tablet => "0009",
            Self::Watch => "00FF",
            Self::Other => "0000",
        }
    }

    /// 16-hex-digit WPS primary device type: `category || OUI || subcategory`.
    pub fn wps_device_type(self) -> String {
        format!("{}{}{}", self.category(), WPS_OUI, self.subcategory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_from_str_maps_supplicant_values() {
        assert_eq!(DeviceRole::from("GO"), DeviceRole::GroupOwner);
        assert_eq!(DeviceRole::from("client"), DeviceRole::Client);
        assert_eq!(DeviceRole::from(""), DeviceRole::Unknown);
        assert_eq!(DeviceRole::from("owner"), DeviceRole::Unknown);
    }

    #[test]
    fn chassis_from_str_maps_hostnamed_values() {
        assert_eq!(Chassis::from("handset"), Chassis::Handset);
        assert_eq!(Chassis::from("laptop"), Chassis::Laptop);
        assert_eq!(Chassis::from("convertible"), Chassis::Other);
        assert_eq!(Chassis::from(""), Chassis::Other);
    }

    #[test]
    fn handset_reports_telephone_device_type() {
        assert_eq!(Chassis::Handset.wps_device_type(), "000A0050F2040005");
    }

    #[test]
    fn computer_chassis_report_computer_device_type() {
        assert_eq!(Chassis::Laptop.wps_device_type(), "00010050F2040005");
        assert_eq!(Chassis::Desktop.wps_device_type(), "00010050F2040006");
        assert_eq!(Chassis::Server.wps_device_type(), "00010050F2040002");
        assert_eq!(Chassis::Tablet.wps_device_type(), "00010050F2040009");
        assert_eq!(Chassis::Watch.wps_device_type(), "00010050F20400FF");
        assert_eq!(Chassis::Vm.wps_device_type(), "00010050F2040001");
        assert_eq!(Chassis::Other.wps_device_type(), "00010050F2040000");
    }

    #[test]
    fn grouped_states() {
        assert!(DeviceState::Configuration.is_grouped());
        assert!(DeviceState::Connected.is_grouped());
        assert!(!DeviceState::Association.is_grouped());
        assert!(!DeviceState::Failure.is_grouped());
    }
}
