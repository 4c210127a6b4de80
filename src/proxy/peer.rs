#![allow(missing_docs)]
use zbus::{Result, proxy, zvariant::OwnedObjectPath};

#[proxy(
    interface = "fi.w1.wpa_supplicant1.Peer",
    default_service = "fi.w1.wpa_supplicant1"
)]
pub(crate) trait Peer {
    #[zbus(property)]
    fn device_name(&self) -> Result<String>;

    #[zbus(property)]
    fn device_address(&self) -> Result<Vec<u8>>;

    #[zbus(property)]
    fn groups(&self) -> Result<Vec<OwnedObjectPath>>;
}
