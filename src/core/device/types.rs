use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use zbus::{Connection, zvariant::OwnedObjectPath};

use crate::types::MiracastEvent;

#[doc(hidden)]
pub struct DeviceParams<'a> {
    pub connection: &'a Connection,
    pub path: OwnedObjectPath,
}

#[doc(hidden)]
pub struct LiveDeviceParams<'a> {
    pub connection: &'a Connection,
    pub path: OwnedObjectPath,
    pub cancellation_token: &'a CancellationToken,
    pub(crate) notifier_tx: &'a broadcast::Sender<MiracastEvent>,
}

pub(crate) struct DeviceProperties {
    pub name: String,
    pub address: String,
}
