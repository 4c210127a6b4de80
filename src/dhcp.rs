//! DHCP collaborator seam.
//!
//! Addressing over the group interface is owned by the embedding daemon:
//! a [`Dhcp`] factory starts a server (when the local endpoint is group
//! owner) or a client endpoint on the group ifname and reports progress
//! through an event channel. Exactly one endpoint is alive while a group
//! is configured or connected; dropping the handle tears the endpoint down.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Progress reported by a DHCP endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpEvent {
    /// Both sides of the group link are addressed.
    AddressAssigned {
        /// Address assigned to the local endpoint.
        local: Ipv4Addr,
        /// Address of the remote peer.
        remote: Ipv4Addr,
    },
    /// The endpoint gave up or its lease ended.
    Terminated,
}

/// A running DHCP server or client bound to a group interface.
///
/// Dropping the handle stops the endpoint.
pub trait DhcpEndpoint: Send + Sync {
    /// The local address, once assigned.
    fn local_address(&self) -> Option<Ipv4Addr>;
}

/// Factory for DHCP endpoints on group interfaces.
#[async_trait]
pub trait Dhcp: Send + Sync {
    /// Starts a DHCP server on `ifname` (group-owner role).
    ///
    /// # Errors
    /// Returns error if the endpoint cannot be brought up.
    async fn start_server(
        &self,
        ifname: &str,
        events: mpsc::UnboundedSender<DhcpEvent>,
    ) -> Result<Box<dyn DhcpEndpoint>, Box<dyn std::error::Error + Send + Sync>>;

    /// Starts a DHCP client on `ifname` (client role).
    ///
    /// # Errors
    /// Returns error if the endpoint cannot be brought up.
    async fn start_client(
        &self,
        ifname: &str,
        events: mpsc::UnboundedSender<DhcpEvent>,
    ) -> Result<Box<dyn DhcpEndpoint>, Box<dyn std::error::Error + Send + Sync>>;
}
