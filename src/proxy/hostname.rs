#![allow(missing_docs)]
use zbus::{Result, proxy};

#[proxy(
    interface = "org.freedesktop.hostname1",
    default_service = "org.freedesktop.hostname1",
    default_path = "/org/freedesktop/hostname1"
)]
pub(crate) trait Hostname {
    #[zbus(property)]
    fn hostname(&self) -> Result<String>;

    #[zbus(property)]
    fn static_hostname(&self) -> Result<String>;

    #[zbus(property)]
    fn pretty_hostname(&self) -> Result<String>;

    #[zbus(property)]
    fn chassis(&self) -> Result<String>;
}
