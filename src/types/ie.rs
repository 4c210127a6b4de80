//! Wi-Fi Display information element encoding.
//!
//! The WFD IE is a concatenation of length-tagged subelements carried in
//! beacon and probe frames. Only the Device Information subelement is
//! published: the device-type bits, the session-availability bit, the RTSP
//! control port and the maximum throughput. All multi-byte fields are
//! big-endian.

use super::Capability;

const SUBELEMENT_DEVICE_INFORMATION: u8 = 0x00;
const DEVICE_INFORMATION_LENGTH: u16 = 6;

const DEVICE_TYPE_MASK: u16 = 0x0003;
const SESSION_AVAILABLE: u16 = 0x0010;

/// RTSP session-management control port (WFD default).
const CONTROL_PORT: u16 = 7236;
/// Advertised maximum average throughput, in Mbps.
const MAX_THROUGHPUT: u16 = 50;

/// Device type bits of the Device Information bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WfdDeviceType {
    /// Source only.
    Source = 0b00,
    /// Primary sink.
    PrimarySink = 0b01,
    /// Secondary sink.
    SecondarySink = 0b10,
    /// Source and primary sink.
    DualRole = 0b11,
}

impl WfdDeviceType {
    /// Maps the configured capability set to the advertised device type.
    ///
    /// An empty set advertises Source; this endpoint never acts as a pure
    /// listener.
    pub fn from_capabilities(capabilities: &[Capability]) -> Self {
        let source = capabilities.contains(&Capability::Source);
        let sink = capabilities.contains(&Capability::Sink);

        match (source, sink) {
            (true, true) => Self::DualRole,
            (false, true) => Self::PrimarySink,
            _ => Self::Source,
        }
    }
}

/// Device Information subelement of the WFD IE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInformation {
    /// Advertised device type.
    pub device_type: WfdDeviceType,
    /// Whether new WFD sessions are accepted.
    pub session_available: bool,
}

impl DeviceInformation {
    /// Builds the subelement for a capability set and availability flag.
    pub fn new(capabilities: &[Capability], session_available: bool) -> Self {
        Self {
            device_type: WfdDeviceType::from_capabilities(capabilities),
            session_available,
        }
    }

    fn bitmap(&self) -> u16 {
        let mut field = (self.device_type as u16) & DEVICE_TYPE_MASK;
        if self.session_available {
            field |= SESSION_AVAILABLE;
        }
        field
    }

    /// Serializes the subelement: id, 16-bit length, then the body.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(3 + DEVICE_INFORMATION_LENGTH as usize);
        bytes.push(SUBELEMENT_DEVICE_INFORMATION);
        bytes.extend_from_slice(&DEVICE_INFORMATION_LENGTH.to_be_bytes());
        bytes.extend_from_slice(&self.bitmap().to_be_bytes());
        bytes.extend_from_slice(&CONTROL_PORT.to_be_bytes());
        bytes.extend_from_slice(&MAX_THROUGHPUT.to_be_bytes());
        bytes
    }
}

/// Encodes the full WFD IE payload for the given capability set.
pub fn encode_ies(capabilities: &[Capability], session_available: bool) -> Vec<u8> {
    DeviceInformation::new(capabilities, session_available).encode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_capability_maps_to_source_type() {
        assert_eq!(
            WfdDeviceType::from_capabilities(&[Capability::Source]),
            WfdDeviceType::Source
        );
    }

    #[test]
    fn sink_capability_maps_to_primary_sink() {
        assert_eq!(
            WfdDeviceType::from_capabilities(&[Capability::Sink]),
            WfdDeviceType::PrimarySink
        );
    }

    #[test]
    fn both_capabilities_map_to_dual_role() {
        assert_eq!(
            WfdDeviceType::from_capabilities(&[Capability::Source, Capability::Sink]),
            WfdDeviceType::DualRole
        );
    }

    #[test]
    fn empty_capabilities_default_to_source() {
        assert_eq!(WfdDeviceType::from_capabilities(&[]), WfdDeviceType::Source);
    }

    #[test]
    fn device_information_encodes_source_available() {
        let bytes = encode_ies(&[Capability::Source], true);

        assert_eq!(
            bytes,
            [0x00, 0x00, 0x06, 0x00, 0x10, 0x1C, 0x44, 0x00, 0x32]
        );
    }

    #[test]
    fn device_information_encodes_busy_dual_role() {
        let bytes = encode_ies(&[Capability::Source, Capability::Sink], false);

        assert_eq!(
            bytes,
            [0x00, 0x00, 0x06, 0x00, 0x03, 0x1C, 0x44, 0x00, 0x32]
        );
    }

    #[test]
    fn control_port_and_throughput_are_big_endian() {
        let bytes = encode_ies(&[Capability::Source], true);

        assert_eq!(u16::from_be_bytes([bytes[5], bytes[6]]), 7236);
        assert_eq!(u16::from_be_bytes([bytes[7], bytes[8]]), 50);
    }

    #[test]
    fn encoding_is_deterministic() {
        let first = encode_ies(&[Capability::Source], true);
        let second = encode_ies(&[Capability::Source], true);

        assert_eq!(first, second);
    }
}
