pub mod bundle;
pub mod capability;
pub mod event;
pub mod service;
pub mod version;

pub use bundle::*;
pub use capability::*;
pub use event::*;
pub use service::*;
pub use version::*;
