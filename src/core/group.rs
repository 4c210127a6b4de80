use zbus::zvariant::OwnedObjectPath;

/// The P2P group currently joined or owned.
///
/// Exists only between `GroupStarted` and `GroupFinished`; at most one group
/// is active at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveGroup {
    /// Object path of the group itself.
    pub group_path: OwnedObjectPath,
    /// Object path of the group's network interface.
    pub iface_path: OwnedObjectPath,
    /// Kernel name of the group interface, once resolved.
    pub ifname: String,
}
