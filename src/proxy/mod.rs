pub(crate) mod hostname;
pub(crate) mod interface;
pub(crate) mod manager;
pub(crate) mod p2p_device;
pub(crate) mod peer;
