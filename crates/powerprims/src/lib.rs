//! Local and remote control of CPU topology, frequency, energy and tasks.
//!
//! Every hardware module is reached through a façade that behaves the same
//! whether it drives this machine or a remote one served by `powerprims
//! serve`.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP byte streams
//! - [`frame`]: length-prefixed typed message envelopes
//! - [`rpc`]: serial remote calls, dispatch and connection supervision
//! - [`hw`]: topology, cpufreq, energy and task modules

/// Re-export transport types.
pub mod transport {
    pub use powerprims_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use powerprims_frame::*;
}

/// Re-export rpc types.
pub mod rpc {
    pub use powerprims_rpc::*;
}

/// Re-export hardware modules.
pub mod hw {
    pub use powerprims_hw::*;
}

pub use powerprims_hw::{cpufreq, energy, task, topology, LocalConfig, ModuleSet};
