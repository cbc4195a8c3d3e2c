//! Project descriptor, discovery, and lazy first-touch initialization.

pub mod descriptor;
pub mod discovery;
pub mod lazy_init;

pub use descriptor::ProjectDescriptor;
pub use discovery::ProjectDiscovery;
pub use lazy_init::LazyProjectInitializer;
