//! Firmware loader collaborator seam.
//!
//! Some radios need alternate firmware before the P2P interface exists.
//! When `AETHERCAST_NEED_FIRMWARE=1` and a loader is supplied, supplicant
//! promotion waits for a successful load; a failed load keeps the service
//! dormant until the supplicant name reappears.

use std::env;

use async_trait::async_trait;

use crate::types::NEED_FIRMWARE_ENV;

/// Loads device firmware for a P2P interface.
#[async_trait]
pub trait FirmwareLoader: Send + Sync {
    /// Whether `ifname` actually needs a firmware load on this host.
    async fn is_needed(&self, ifname: &str) -> bool;

    /// Performs the load, resolving once the firmware is active.
    ///
    /// # Errors
    /// Returns error if the firmware could not be applied.
    async fn load(&self, ifname: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Whether the environment gates startup on a firmware load.
pub(crate) fn gated_by_env() -> bool {
    env::var(NEED_FIRMWARE_ENV).is_ok_and(|value| value == "1")
}
