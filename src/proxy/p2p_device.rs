#![allow(missing_docs)]
use std::collections::HashMap;

use zbus::{
    Result, proxy,
    zvariant::{OwnedObjectPath, OwnedValue, Value},
};

#[proxy(
    interface = "fi.w1.wpa_supplicant1.Interface.P2PDevice",
    default_service = "fi.w1.wpa_supplicant1"
)]
pub(crate) trait P2PDevice {
    async fn find(&self, args: HashMap<&str, &Value<'_>>) -> Result<()>;

    async fn stop_find(&self) -> Result<()>;

    async fn connect(&self, args: HashMap<&str, &Value<'_>>) -> Result<String>;

    async fn cancel(&self) -> Result<()>;

    async fn flush(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    #[zbus(property)]
    fn peers(&self) -> Result<Vec<OwnedObjectPath>>;

    #[zbus(property, name = "P2PDeviceConfig")]
    fn p2p_device_config(&self) -> Result<HashMap<String, OwnedValue>>;

    #[zbus(property, name = "P2PDeviceConfig")]
    fn set_p2p_device_config(&self, config: HashMap<&str, Value<'_>>) -> Result<()>;

    #[zbus(signal)]
    async fn device_found(&self, path: OwnedObjectPath) -> Result<()>;

    #[zbus(signal)]
    async fn device_lost(&self, path: OwnedObjectPath) -> Result<()>;

    #[zbus(signal, name = "GONegotiationSuccess")]
    async fn go_negotiation_success(
        &self,
        properties: HashMap<String, OwnedValue>,
    ) -> Result<()>;

    #[zbus(signal, name = "GONegotiationFailure")]
    async fn go_negotiation_failure(
        &self,
        properties: HashMap<String, OwnedValue>,
    ) -> Result<()>;

    #[zbus(signal, name = "GONegotiationRequest")]
    async fn go_negotiation_request(
        &self,
        path: OwnedObjectPath,
        dev_passwd_id: u16,
        device_go_intent: u8,
    ) -> Result<()>;

    #[zbus(signal)]
    async fn group_started(&self, properties: HashMap<String, OwnedValue>) -> Result<()>;

    #[zbus(signal)]
    async fn group_finished(&self, properties: HashMap<String, OwnedValue>) -> Result<()>;

    #[zbus(signal)]
    async fn group_formation_failure(&self, reason: String) -> Result<()>;
}
