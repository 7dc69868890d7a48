//! Frequency domains, governors and boosting.

mod handler;
mod local;
pub mod messages;
mod remote;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use powerprims_rpc::Channel;
use serde::{Deserialize, Serialize};

use crate::config::LocalConfig;
use crate::error::{HwError, Result};
use crate::topology::VirtualCoreId;

pub use handler::CpuFreqHandler;
pub use local::LocalCpuFreq;
pub use remote::RemoteCpuFreq;

/// Capability domain of the frequency messages.
pub const DOMAIN: &str = "cpufreq";

/// Frequency domain identifier.
pub type DomainId = u32;
/// Frequency in kHz.
pub type Frequency = u32;
/// Voltage in volts.
pub type Voltage = f64;

/// Frequency scaling governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Governor {
    Conservative,
    Ondemand,
    Userspace,
    Powersave,
    Performance,
    Interactive,
    Schedutil,
}

impl Governor {
    pub const ALL: [Governor; 7] = [
        Governor::Conservative,
        Governor::Ondemand,
        Governor::Userspace,
        Governor::Powersave,
        Governor::Performance,
        Governor::Interactive,
        Governor::Schedutil,
    ];

    /// Name used by the kernel.
    pub fn name(self) -> &'static str {
        match self {
            Governor::Conservative => "conservative",
            Governor::Ondemand => "ondemand",
            Governor::Userspace => "userspace",
            Governor::Powersave => "powersave",
            Governor::Performance => "performance",
            Governor::Interactive => "interactive",
            Governor::Schedutil => "schedutil",
        }
    }

    /// Whether the governor honors `scaling_min_freq`/`scaling_max_freq`.
    pub fn has_bounds(self) -> bool {
        matches!(
            self,
            Governor::Ondemand | Governor::Conservative | Governor::Performance | Governor::Powersave
        )
    }
}

impl fmt::Display for Governor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Governor {
    type Err = HwError;

    fn from_str(s: &str) -> Result<Self> {
        Governor::ALL
            .into_iter()
            .find(|g| g.name() == s)
            .ok_or_else(|| HwError::Unsupported(format!("governor {s}")))
    }
}

/// A set of virtual cores that always run at the same frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    pub virtual_cores: Vec<VirtualCoreId>,
}

impl Domain {
    pub fn contains(&self, virtual_core: VirtualCoreId) -> bool {
        self.virtual_cores.contains(&virtual_core)
    }
}

/// Average voltage of a domain at one frequency with `virtual_cores` of its
/// cores fully loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageTableEntry {
    pub virtual_cores: u32,
    pub frequency: Frequency,
    pub voltage: Voltage,
}

/// How each voltage table entry is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoltageSampling {
    /// Readings averaged per entry, at least one is taken.
    pub samples: u32,
    /// Pause before each reading.
    pub interval: Duration,
}

impl Default for VoltageSampling {
    fn default() -> Self {
        Self {
            samples: 5,
            interval: Duration::from_secs(3),
        }
    }
}

/// Governor and frequency (or bounds) of a domain, captured for rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRollbackPoint {
    pub domain: DomainId,
    pub governor: Governor,
    /// Userspace frequency, meaningful with [`Governor::Userspace`].
    pub frequency: Frequency,
    /// Governor bounds, for governors that have them.
    pub bounds: Option<(Frequency, Frequency)>,
}

/// Frequency operations, identical for local and remote machines.
pub trait CpuFreq: Send + Sync {
    /// Frequency domains, captured when the façade was built.
    fn domains(&self) -> &[Domain];

    /// Sorted ascending, turbo frequency excluded.
    fn available_frequencies(&self, domain: DomainId) -> Result<Vec<Frequency>>;
    fn available_governors(&self, domain: DomainId) -> Result<Vec<Governor>>;
    fn current_frequency(&self, domain: DomainId) -> Result<Frequency>;

    /// Frequency set through the userspace governor, 0 under any other
    /// governor.
    fn current_frequency_userspace(&self, domain: DomainId) -> Result<Frequency>;

    /// Returns `false` unless the userspace governor is active and the
    /// frequency is available.
    fn set_frequency_userspace(&self, domain: DomainId, frequency: Frequency) -> Result<bool>;

    /// `None` when the kernel reports a governor this crate does not know.
    fn current_governor(&self, domain: DomainId) -> Result<Option<Governor>>;

    /// Returns `false` when the governor is not available.
    fn set_governor(&self, domain: DomainId, governor: Governor) -> Result<bool>;

    fn hardware_frequency_bounds(&self, domain: DomainId) -> Result<(Frequency, Frequency)>;

    /// `None` when the current governor has no bounds.
    fn current_governor_bounds(&self, domain: DomainId) -> Result<Option<(Frequency, Frequency)>>;

    /// Returns `false` when the current governor has no bounds, a bound is
    /// not an available frequency, or `lower > upper`.
    fn set_governor_bounds(
        &self,
        domain: DomainId,
        lower: Frequency,
        upper: Frequency,
    ) -> Result<bool>;

    /// Transition latency in nanoseconds, when reported.
    fn transition_latency(&self, domain: DomainId) -> Result<Option<u32>>;

    /// 0 when the voltage cannot be read.
    fn current_voltage(&self, domain: DomainId) -> Result<Voltage>;

    /// Voltage at every available frequency with 0 up to all cores of the
    /// domain loaded, one core per physical core when `only_physical_cores`.
    /// Sorted by loaded cores, then frequency. Governor settings are rolled
    /// back afterwards. Empty when the userspace governor is unavailable.
    fn voltage_table(
        &self,
        domain: DomainId,
        only_physical_cores: bool,
        sampling: &VoltageSampling,
    ) -> Result<Vec<VoltageTableEntry>>;

    fn is_boosting_supported(&self) -> Result<bool>;
    fn is_boosting_enabled(&self) -> Result<bool>;
    fn enable_boosting(&self) -> Result<()>;
    fn disable_boosting(&self) -> Result<()>;

    fn domain(&self, domain: DomainId) -> Option<&Domain> {
        self.domains().iter().find(|d| d.id == domain)
    }

    /// Domain containing `virtual_core`.
    fn domain_of(&self, virtual_core: VirtualCoreId) -> Option<&Domain> {
        self.domains().iter().find(|d| d.contains(virtual_core))
    }

    /// Domains containing at least one of `virtual_cores`, each once.
    fn domains_of(&self, virtual_cores: &[VirtualCoreId]) -> Vec<&Domain> {
        self.domains()
            .iter()
            .filter(|d| virtual_cores.iter().any(|&vc| d.contains(vc)))
            .collect()
    }

    /// Domains whose virtual cores are all among `virtual_cores`.
    fn domains_complete(&self, virtual_cores: &[VirtualCoreId]) -> Vec<&Domain> {
        self.domains()
            .iter()
            .filter(|d| d.virtual_cores.iter().all(|vc| virtual_cores.contains(vc)))
            .collect()
    }

    fn is_governor_available(&self, domain: DomainId, governor: Governor) -> Result<bool> {
        Ok(self.available_governors(domain)?.contains(&governor))
    }

    fn set_highest_frequency_userspace(&self, domain: DomainId) -> Result<bool> {
        match self.available_frequencies(domain)?.last() {
            Some(&frequency) => self.set_frequency_userspace(domain, frequency),
            None => Ok(false),
        }
    }

    fn set_lowest_frequency_userspace(&self, domain: DomainId) -> Result<bool> {
        match self.available_frequencies(domain)?.first() {
            Some(&frequency) => self.set_frequency_userspace(domain, frequency),
            None => Ok(false),
        }
    }

    fn rollback_point(&self, domain: DomainId) -> Result<DomainRollbackPoint> {
        let governor = self.current_governor(domain)?.ok_or_else(|| {
            HwError::Rollback(format!("domain {domain} runs an unknown governor"))
        })?;
        let (frequency, bounds) = if governor == Governor::Userspace {
            (self.current_frequency_userspace(domain)?, None)
        } else {
            (0, self.current_governor_bounds(domain)?)
        };
        Ok(DomainRollbackPoint {
            domain,
            governor,
            frequency,
            bounds,
        })
    }

    fn rollback_points(&self) -> Result<Vec<DomainRollbackPoint>> {
        self.domains()
            .iter()
            .map(|d| self.rollback_point(d.id))
            .collect()
    }

    fn rollback(&self, point: &DomainRollbackPoint) -> Result<()> {
        let domain = point.domain;
        if !self.set_governor(domain, point.governor)? {
            return Err(HwError::Rollback(format!(
                "domain {domain} cannot use governor {}",
                point.governor
            )));
        }
        if point.governor == Governor::Userspace {
            if !self.set_frequency_userspace(domain, point.frequency)? {
                return Err(HwError::Rollback(format!(
                    "domain {domain} cannot run at {} kHz",
                    point.frequency
                )));
            }
        } else if let Some((lower, upper)) = point.bounds {
            if !self.set_governor_bounds(domain, lower, upper)? {
                return Err(HwError::Rollback(format!(
                    "domain {domain} cannot use bounds {lower}-{upper} kHz"
                )));
            }
        }
        Ok(())
    }
}

/// Frequency control of this machine.
pub fn local(config: &LocalConfig) -> Result<Box<dyn CpuFreq>> {
    Ok(Box::new(LocalCpuFreq::new(config)?))
}

/// Frequency control of the machine behind `channel`.
pub fn remote(channel: Arc<Channel>) -> Result<Box<dyn CpuFreq>> {
    Ok(Box::new(RemoteCpuFreq::new(channel)?))
}

/// Release a façade obtained from [`local`] or [`remote`].
pub fn release(cpufreq: Box<dyn CpuFreq>) {
    drop(cpufreq);
}
