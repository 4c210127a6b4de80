#![allow(missing_docs)]
use std::collections::HashMap;

use zbus::{Result, proxy, zvariant::OwnedValue};

#[proxy(
    interface = "fi.w1.wpa_supplicant1.Interface",
    default_service = "fi.w1.wpa_supplicant1"
)]
pub(crate) trait Interface {
    #[zbus(property)]
    fn ifname(&self) -> Result<String>;

    #[zbus(property)]
    fn driver(&self) -> Result<String>;

    #[zbus(property)]
    fn state(&self) -> Result<String>;

    #[zbus(property)]
    fn capabilities(&self) -> Result<HashMap<String, OwnedValue>>;
}
