//! Process-wide resource sampling, independent of the multi-tenant health
//! monitor (this module watches the current process; `tenant::health`
//! watches other tenant processes).

pub mod resource;

pub use resource::{ResourceMonitor, ResourceSnapshot};
