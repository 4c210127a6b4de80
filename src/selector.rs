//! Interface selection policy.
//!
//! The manager reports candidate interface paths; the policy picks the one
//! to adopt. A configured dedicated interface name is the only acceptable
//! match when present; otherwise the first interface whose driver
//! advertises P2P capability wins.

use std::collections::HashMap;

use zbus::zvariant::{OwnedObjectPath, OwnedValue};

#[derive(Debug, Clone)]
pub(crate) struct InterfaceCandidate {
    pub path: OwnedObjectPath,
    pub ifname: String,
    pub p2p_capable: bool,
}

/// Whether the interface capabilities advertise P2P operation.
pub(crate) fn p2p_capable(capabilities: &HashMap<String, OwnedValue>) -> bool {
    capabilities
        .get("Modes")
        .and_then(|value| Vec::<String>::try_from(value.clone()).ok())
        .is_some_and(|modes| modes.iter().any(|mode| mode == "p2p"))
}

pub(crate) fn eligible(candidate: &InterfaceCandidate, dedicated: Option<&str>) -> bool {
    match dedicated {
        Some(name) => candidate.ifname == name,
        None => candidate.p2p_capable,
    }
}

pub(crate) fn select<'a>(
    candidates: &'a [InterfaceCandidate],
    dedicated: Option<&str>,
) -> Option<&'a InterfaceCandidate> {
    candidates
        .iter()
        .find(|candidate| eligible(candidate, dedicated))
}
