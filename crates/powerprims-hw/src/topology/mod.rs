//! CPU topology: packages, physical cores, virtual cores, hotplug and idle
//! levels.

mod handler;
mod local;
pub mod messages;
mod remote;

use std::sync::Arc;

use powerprims_rpc::Channel;
use serde::{Deserialize, Serialize};

use crate::config::LocalConfig;
use crate::error::{HwError, Result};

pub use handler::TopologyHandler;
pub use local::LocalTopology;
pub use remote::RemoteTopology;

/// Capability domain of the topology messages.
pub const DOMAIN: &str = "topology";

/// CPU package identifier.
pub type CpuId = u32;
/// Physical core identifier, unique within its CPU.
pub type PhysicalCoreId = u32;
/// Virtual core (hardware thread) identifier, unique on the machine.
pub type VirtualCoreId = u32;

/// Where a virtual core sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VirtualCoreCoordinates {
    pub cpu: CpuId,
    pub physical_core: PhysicalCoreId,
    pub virtual_core: VirtualCoreId,
}

/// The machine's layout, ordered by virtual core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyMap {
    coordinates: Vec<VirtualCoreCoordinates>,
}

impl TopologyMap {
    pub fn from_coordinates(mut coordinates: Vec<VirtualCoreCoordinates>) -> Self {
        coordinates.sort_by_key(|c| c.virtual_core);
        coordinates.dedup_by_key(|c| c.virtual_core);
        Self { coordinates }
    }

    pub fn coordinates(&self) -> &[VirtualCoreCoordinates] {
        &self.coordinates
    }

    pub fn into_coordinates(self) -> Vec<VirtualCoreCoordinates> {
        self.coordinates
    }

    /// CPU identifiers, sorted.
    pub fn cpus(&self) -> Vec<CpuId> {
        let mut cpus: Vec<_> = self.coordinates.iter().map(|c| c.cpu).collect();
        cpus.sort_unstable();
        cpus.dedup();
        cpus
    }

    pub fn virtual_cores(&self) -> Vec<VirtualCoreId> {
        self.coordinates.iter().map(|c| c.virtual_core).collect()
    }

    /// Physical cores of `cpu`, sorted.
    pub fn physical_cores(&self, cpu: CpuId) -> Vec<PhysicalCoreId> {
        let mut cores: Vec<_> = self
            .coordinates
            .iter()
            .filter(|c| c.cpu == cpu)
            .map(|c| c.physical_core)
            .collect();
        cores.sort_unstable();
        cores.dedup();
        cores
    }

    pub fn virtual_cores_of_cpu(&self, cpu: CpuId) -> Vec<VirtualCoreId> {
        self.coordinates
            .iter()
            .filter(|c| c.cpu == cpu)
            .map(|c| c.virtual_core)
            .collect()
    }

    pub fn virtual_cores_of_physical_core(
        &self,
        cpu: CpuId,
        physical_core: PhysicalCoreId,
    ) -> Vec<VirtualCoreId> {
        self.coordinates
            .iter()
            .filter(|c| c.cpu == cpu && c.physical_core == physical_core)
            .map(|c| c.virtual_core)
            .collect()
    }

    pub fn coordinates_of(&self, virtual_core: VirtualCoreId) -> Option<VirtualCoreCoordinates> {
        self.coordinates
            .iter()
            .find(|c| c.virtual_core == virtual_core)
            .copied()
    }

    pub fn contains(&self, virtual_core: VirtualCoreId) -> bool {
        self.coordinates_of(virtual_core).is_some()
    }

    /// Lowest-numbered virtual core of `cpu`.
    pub fn first_virtual_core(&self, cpu: CpuId) -> Option<VirtualCoreId> {
        self.virtual_cores_of_cpu(cpu).into_iter().min()
    }

    /// One virtual core for each physical core, the lowest-numbered one.
    pub fn one_virtual_per_physical(&self) -> Vec<VirtualCoreId> {
        let mut seen = Vec::new();
        self.coordinates
            .iter()
            .filter(|c| {
                let key = (c.cpu, c.physical_core);
                if seen.contains(&key) {
                    false
                } else {
                    seen.push(key);
                    true
                }
            })
            .map(|c| c.virtual_core)
            .collect()
    }

    pub fn num_physical_cores(&self) -> usize {
        self.one_virtual_per_physical().len()
    }
}

/// Snapshot of one idle level (C-state) of a virtual core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleLevelInfo {
    pub virtual_core: VirtualCoreId,
    pub level: u32,
    pub name: String,
    pub desc: String,
    /// Whether the level can be disabled at all.
    pub enableable: bool,
    pub enabled: bool,
    /// Exit latency in microseconds.
    pub exit_latency: u32,
    /// Power consumed while in this level, in milliwatts.
    pub power: u32,
    /// Microseconds spent in this level since boot.
    pub absolute_time: u64,
    /// Times this level was entered since boot.
    pub absolute_count: u64,
    /// Microseconds spent in this level since the last reset.
    pub time: u64,
    /// Times this level was entered since the last reset.
    pub count: u64,
}

/// Hotplug, idle-level and clock modulation state of a virtual core,
/// captured for rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualCoreRollbackPoint {
    pub virtual_core: VirtualCoreId,
    pub hot_plugged: bool,
    /// `(level, enabled)` for every enableable idle level.
    pub idle_levels: Vec<(u32, bool)>,
    /// Duty cycle in percent, `None` without clock modulation.
    pub clock_modulation: Option<f64>,
}

/// Topology operations, identical for local and remote machines.
pub trait Topology: Send + Sync {
    /// Layout of the machine, captured when the façade was built.
    fn layout(&self) -> &TopologyMap;

    fn cpu_vendor_id(&self, cpu: CpuId) -> Result<String>;
    fn cpu_family(&self, cpu: CpuId) -> Result<String>;
    fn cpu_model(&self, cpu: CpuId) -> Result<String>;

    fn is_hot_pluggable(&self, virtual_core: VirtualCoreId) -> Result<bool>;

    /// A core that cannot be hot-plugged is always plugged.
    fn is_hot_plugged(&self, virtual_core: VirtualCoreId) -> Result<bool>;

    /// No-op on cores that cannot be hot-plugged.
    fn hot_plug(&self, virtual_core: VirtualCoreId) -> Result<()>;

    /// No-op on cores that cannot be hot-plugged.
    fn hot_unplug(&self, virtual_core: VirtualCoreId) -> Result<()>;

    /// Idle level identifiers of a virtual core, sorted.
    fn idle_levels(&self, virtual_core: VirtualCoreId) -> Result<Vec<u32>>;

    fn idle_level(&self, virtual_core: VirtualCoreId, level: u32) -> Result<IdleLevelInfo>;

    /// Returns `false` when the level cannot be enabled or disabled.
    fn set_idle_level_enabled(
        &self,
        virtual_core: VirtualCoreId,
        level: u32,
        enabled: bool,
    ) -> Result<bool>;

    /// Restart the relative time and count of an idle level.
    fn reset_idle_level(&self, virtual_core: VirtualCoreId, level: u32) -> Result<()>;

    /// Keep each virtual core busy until [`reset_utilization`](Self::reset_utilization).
    fn maximize_utilization(&self, virtual_cores: &[VirtualCoreId]) -> Result<()>;

    /// Release cores loaded by [`maximize_utilization`](Self::maximize_utilization).
    /// Cores that are not loaded are ignored.
    fn reset_utilization(&self, virtual_cores: &[VirtualCoreId]) -> Result<()>;

    /// Microseconds the virtual core spent idle since the façade was built
    /// or since the last [`reset_idle_time`](Self::reset_idle_time).
    fn idle_time(&self, virtual_core: VirtualCoreId) -> Result<u64>;

    fn reset_idle_time(&self, virtual_core: VirtualCoreId) -> Result<()>;

    fn has_clock_modulation(&self, virtual_core: VirtualCoreId) -> Result<bool>;

    /// Duty cycles in percent, ascending and ending with 100. Empty without
    /// clock modulation.
    fn clock_modulation_values(&self, virtual_core: VirtualCoreId) -> Result<Vec<f64>>;

    /// Current duty cycle in percent; 100 means unmodulated.
    fn clock_modulation(&self, virtual_core: VirtualCoreId) -> Result<f64>;

    /// Returns `false` when `value` is not one of the supported duty cycles.
    fn set_clock_modulation(&self, virtual_core: VirtualCoreId, value: f64) -> Result<bool>;

    fn rollback_point(&self, virtual_core: VirtualCoreId) -> Result<VirtualCoreRollbackPoint> {
        let mut idle_levels = Vec::new();
        for level in self.idle_levels(virtual_core)? {
            let info = self.idle_level(virtual_core, level)?;
            if info.enableable {
                idle_levels.push((level, info.enabled));
            }
        }
        let clock_modulation = if self.has_clock_modulation(virtual_core)? {
            Some(self.clock_modulation(virtual_core)?)
        } else {
            None
        };
        Ok(VirtualCoreRollbackPoint {
            virtual_core,
            hot_plugged: self.is_hot_plugged(virtual_core)?,
            idle_levels,
            clock_modulation,
        })
    }

    fn rollback(&self, point: &VirtualCoreRollbackPoint) -> Result<()> {
        let vc = point.virtual_core;
        if point.hot_plugged {
            self.hot_plug(vc)?;
        }
        for &(level, enabled) in &point.idle_levels {
            if !self.set_idle_level_enabled(vc, level, enabled)? {
                return Err(HwError::Rollback(format!(
                    "idle level {level} of virtual core {vc} cannot be {}",
                    if enabled { "enabled" } else { "disabled" }
                )));
            }
        }
        if let Some(value) = point.clock_modulation {
            if !self.set_clock_modulation(vc, value)? {
                return Err(HwError::Rollback(format!(
                    "clock modulation {value}% unsupported on virtual core {vc}"
                )));
            }
        }
        if !point.hot_plugged {
            self.hot_unplug(vc)?;
        }
        Ok(())
    }

    /// Plug every hot-pluggable virtual core. Returns how many are online.
    fn plug_all(&self) -> Result<usize> {
        let mut online = 0;
        for vc in self.layout().virtual_cores() {
            self.hot_plug(vc)?;
            if self.is_hot_plugged(vc)? {
                online += 1;
            }
        }
        Ok(online)
    }
}

/// Topology of this machine.
pub fn local(config: &LocalConfig) -> Result<Box<dyn Topology>> {
    Ok(Box::new(LocalTopology::new(config)?))
}

/// Topology of the machine behind `channel`.
pub fn remote(channel: Arc<Channel>) -> Result<Box<dyn Topology>> {
    Ok(Box::new(RemoteTopology::new(channel)?))
}

/// Release a façade obtained from [`local`] or [`remote`].
pub fn release(topology: Box<dyn Topology>) {
    drop(topology);
}
