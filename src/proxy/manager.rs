#![allow(missing_docs)]
use std::collections::HashMap;

use zbus::{
    Result, proxy,
    zvariant::{OwnedObjectPath, Value},
};

#[proxy(
    interface = "fi.w1.wpa_supplicant1",
    default_service = "fi.w1.wpa_supplicant1",
    default_path = "/fi/w1/wpa_supplicant1"
)]
pub(crate) trait Supplicant {
    async fn create_interface(&self, args: HashMap<&str, &Value<'_>>) -> Result<OwnedObjectPath>;

    async fn get_interface(&self, ifname: &str) -> Result<OwnedObjectPath>;

    async fn remove_interface(&self, path: &OwnedObjectPath) -> Result<()>;

    #[zbus(property)]
    fn interfaces(&self) -> Result<Vec<OwnedObjectPath>>;

    #[zbus(property, name = "WFDIEs")]
    fn wfd_ies(&self) -> Result<Vec<u8>>;

    #[zbus(property, name = "WFDIEs")]
    fn set_wfd_ies(&self, ies: &[u8]) -> Result<()>;

    #[zbus(signal)]
    async fn interface_added(
        &self,
        path: OwnedObjectPath,
        properties: HashMap<String, zbus::zvariant::OwnedValue>,
    ) -> Result<()>;

    #[zbus(signal)]
    async fn interface_removed(&self, path: OwnedObjectPath) -> Result<()>;
}
