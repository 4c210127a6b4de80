//! Driver private command seam.
//!
//! Miracast-capable drivers take a plain ASCII `MIRACAST <n>` private
//! command on the management interface. The default implementation routes
//! it through `wpa_cli driver`, the ioctl-equivalent available without
//! raw socket access. A failed command is reported to the caller; the
//! session logs it as a warning and carries on.

use async_trait::async_trait;
use tokio::process::Command;

use crate::{error::Error, types::MiracastMode};

/// Issues driver private commands on a network interface.
#[async_trait]
pub trait DriverControl: Send + Sync {
    /// Switches the driver's Miracast mode on `ifname`.
    ///
    /// # Errors
    /// Returns error if the command could not be delivered or the driver
    /// rejected it.
    async fn miracast_mode(&self, ifname: &str, mode: MiracastMode) -> Result<(), Error>;
}

/// Default [`DriverControl`] shelling out to `wpa_cli <ifname> driver`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WpaCliDriver;

#[async_trait]
impl DriverControl for WpaCliDriver {
    async fn miracast_mode(&self, ifname: &str, mode: MiracastMode) -> Result<(), Error> {
        let output = Command::new("wpa_cli")
            .arg("-i")
            .arg(ifname)
            .arg("driver")
            .arg(mode.as_command())
            .output()
            .await
            .map_err(|err| Error::OperationFailed {
                operation: "issue driver private command",
                source: Box::new(err),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(Error::OperationFailed {
                operation: "issue driver private command",
                source: stderr.into(),
            });
        }

        Ok(())
    }
}
