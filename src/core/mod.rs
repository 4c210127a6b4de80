/// Peer device model
pub mod device;
/// Active group record
pub mod group;
