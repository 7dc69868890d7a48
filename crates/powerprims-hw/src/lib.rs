//! Hardware control modules with local and remote back ends.
//!
//! Each module ([`topology`], [`cpufreq`], [`energy`], [`task`]) defines a
//! trait implemented twice: a local façade that reads and writes sysfs and
//! procfs, and a remote façade that forwards every operation over a
//! [`powerprims_rpc::Channel`]. The module's handler serves the remote
//! façade from a local one, and [`ModuleSet`] assembles the handlers of a
//! server into a dispatch table.
//!
//! ```no_run
//! use powerprims_hw::{topology, LocalConfig};
//!
//! let local = topology::local(&LocalConfig::default())?;
//! println!("{} cpus", local.layout().cpus().len());
//!
//! let channel = powerprims_rpc::connect("node7:9000")?;
//! let remote = topology::remote(channel)?;
//! println!("{} remote cpus", remote.layout().cpus().len());
//! # Ok::<(), powerprims_hw::HwError>(())
//! ```

pub mod config;
pub mod cpufreq;
pub mod energy;
pub mod error;
pub mod modules;
pub mod task;
pub mod topology;

mod msr;
mod sched;
mod spinner;
mod sysfs;
mod wire;

#[cfg(test)]
mod testing;

pub use config::LocalConfig;
pub use error::{HwError, Result};
pub use modules::ModuleSet;
