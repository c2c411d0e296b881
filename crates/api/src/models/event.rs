use super::bundle::Bundle;
use super::service::ServiceReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleEventKind {
    Installed,
    Resolved,
    Starting,
    Started,
    Stopping,
    Stopped,
    Updated,
    Unresolved,
    Uninstalled,
    LazyActivation,
}

/// A bundle lifecycle change. `origin` is the bundle whose context caused it;
/// for installs that is the installer.
#[derive(Debug, Clone)]
pub struct BundleEvent {
    pub kind: BundleEventKind,
    pub bundle: Bundle,
    pub origin: Bundle,
}

impl BundleEvent {
    pub fn new(kind: BundleEventKind, bundle: Bundle, origin: Bundle) -> Self {
        Self {
            kind,
            bundle,
            origin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceEventKind {
    Registered,
    Modified,
    ModifiedEndmatch,
    Unregistering,
}

#[derive(Debug, Clone)]
pub struct ServiceEvent {
    pub kind: ServiceEventKind,
    pub reference: ServiceReference,
}
