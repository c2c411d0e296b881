use crate::error::ApiResult;
use crate::hooks::HookRegistry;
use crate::models::{Bundle, BundleId, InstallInfo};

/// The slice of the module runtime that the isolation layer drives.
///
/// Implementations deliver lifecycle events through [`BundleRuntime::hooks`]
/// synchronously, on the calling thread. `install` therefore fires the
/// INSTALLED event before it returns.
pub trait BundleRuntime: Send + Sync {
    fn bundles(&self) -> Vec<Bundle>;

    fn bundle(&self, id: BundleId) -> Option<Bundle>;

    /// Install a bundle on behalf of `origin`.
    fn install(&self, origin: BundleId, info: &InstallInfo) -> ApiResult<Bundle>;

    fn uninstall(&self, id: BundleId) -> ApiResult<()>;

    fn start(&self, id: BundleId) -> ApiResult<()>;

    fn hooks(&self) -> &HookRegistry;
}
