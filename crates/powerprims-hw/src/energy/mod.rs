//! Energy counters per CPU package.

mod handler;
mod local;
pub mod messages;
mod remote;

use std::ops::{Add, AddAssign, Sub};
use std::sync::Arc;

use powerprims_rpc::Channel;
use serde::{Deserialize, Serialize};

use crate::config::LocalConfig;
use crate::error::{HwError, Result};
use crate::topology::CpuId;

pub use handler::EnergyHandler;
pub use local::LocalEnergy;
pub use remote::RemoteEnergy;

/// Capability domain of the energy messages.
pub const DOMAIN: &str = "energy";

pub type Joules = f64;

/// Energy consumed by one CPU package and its parts since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JoulesCpu {
    /// Whole package.
    pub cpu: Joules,
    /// Cores only.
    pub cores: Joules,
    /// Integrated graphics.
    pub graphic: Joules,
    /// Memory attached to the package.
    pub dram: Joules,
}

impl Add for JoulesCpu {
    type Output = JoulesCpu;

    fn add(self, rhs: JoulesCpu) -> JoulesCpu {
        JoulesCpu {
            cpu: self.cpu + rhs.cpu,
            cores: self.cores + rhs.cores,
            graphic: self.graphic + rhs.graphic,
            dram: self.dram + rhs.dram,
        }
    }
}

impl AddAssign for JoulesCpu {
    fn add_assign(&mut self, rhs: JoulesCpu) {
        *self = *self + rhs;
    }
}

impl Sub for JoulesCpu {
    type Output = JoulesCpu;

    fn sub(self, rhs: JoulesCpu) -> JoulesCpu {
        JoulesCpu {
            cpu: self.cpu - rhs.cpu,
            cores: self.cores - rhs.cores,
            graphic: self.graphic - rhs.graphic,
            dram: self.dram - rhs.dram,
        }
    }
}

/// Which CPUs have counters and which parts they measure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterCpusInfo {
    pub cpus: Vec<CpuId>,
    pub has_cores: bool,
    pub has_graphic: bool,
    pub has_dram: bool,
}

/// Energy operations, identical for local and remote machines.
pub trait Energy: Send + Sync {
    /// Counter capabilities, captured when the façade was built.
    fn info(&self) -> &CounterCpusInfo;

    /// Energy of every part of `cpu` since the last reset. Parts without a
    /// counter read 0.
    fn joules_components(&self, cpu: CpuId) -> Result<JoulesCpu>;

    /// Restart every counter from zero.
    fn reset(&self) -> Result<()>;

    fn cpus(&self) -> &[CpuId] {
        &self.info().cpus
    }

    fn has_joules_cores(&self) -> bool {
        self.info().has_cores
    }

    fn has_joules_graphic(&self) -> bool {
        self.info().has_graphic
    }

    fn has_joules_dram(&self) -> bool {
        self.info().has_dram
    }

    fn joules_cpu(&self, cpu: CpuId) -> Result<Joules> {
        Ok(self.joules_components(cpu)?.cpu)
    }

    fn joules_cores(&self, cpu: CpuId) -> Result<Joules> {
        Ok(self.joules_components(cpu)?.cores)
    }

    fn joules_graphic(&self, cpu: CpuId) -> Result<Joules> {
        Ok(self.joules_components(cpu)?.graphic)
    }

    fn joules_dram(&self, cpu: CpuId) -> Result<Joules> {
        Ok(self.joules_components(cpu)?.dram)
    }

    /// Sum over all CPUs, one read per CPU.
    fn joules_components_all(&self) -> Result<JoulesCpu> {
        self.cpus()
            .iter()
            .try_fold(JoulesCpu::default(), |total, &cpu| {
                Ok(total + self.joules_components(cpu)?)
            })
    }

    fn joules_cpu_all(&self) -> Result<Joules> {
        Ok(self.joules_components_all()?.cpu)
    }

    fn joules_cores_all(&self) -> Result<Joules> {
        Ok(self.joules_components_all()?.cores)
    }

    fn joules_graphic_all(&self) -> Result<Joules> {
        Ok(self.joules_components_all()?.graphic)
    }

    fn joules_dram_all(&self) -> Result<Joules> {
        Ok(self.joules_components_all()?.dram)
    }
}

/// Energy counters of this machine.
pub fn local(config: &LocalConfig) -> Result<Box<dyn Energy>> {
    Ok(Box::new(LocalEnergy::new(config)?))
}

/// Energy counters of the machine behind `channel`.
pub fn remote(channel: Arc<Channel>) -> Result<Box<dyn Energy>> {
    Ok(Box::new(RemoteEnergy::new(channel)?))
}

/// Release a façade obtained from [`local`] or [`remote`].
pub fn release(energy: Box<dyn Energy>) {
    drop(energy);
}

fn check_cpu(info: &CounterCpusInfo, cpu: CpuId) -> Result<()> {
    if info.cpus.contains(&cpu) {
        Ok(())
    } else {
        Err(HwError::UnknownCpu(cpu))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Counts calls; CPU `n` reports `n + 1` joules on every part.
    struct Fixed {
        info: CounterCpusInfo,
        calls: Mutex<usize>,
    }

    impl Energy for Fixed {
        fn info(&self) -> &CounterCpusInfo {
            &self.info
        }

        fn joules_components(&self, cpu: CpuId) -> Result<JoulesCpu> {
            check_cpu(&self.info, cpu)?;
            *self.calls.lock().unwrap() += 1;
            let j = f64::from(cpu + 1);
            Ok(JoulesCpu {
                cpu: j,
                cores: j,
                graphic: 0.0,
                dram: j,
            })
        }

        fn reset(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn aggregates_read_each_cpu_once() {
        let energy = Fixed {
            info: CounterCpusInfo {
                cpus: vec![0, 1, 2],
                has_cores: true,
                has_graphic: false,
                has_dram: true,
            },
            calls: Mutex::new(0),
        };

        let total = energy.joules_components_all().unwrap();
        assert_eq!(total.cpu, 6.0);
        assert_eq!(total.graphic, 0.0);
        assert_eq!(*energy.calls.lock().unwrap(), 3);

        assert_eq!(energy.joules_dram(1).unwrap(), 2.0);
        assert!(matches!(energy.joules_cpu(5), Err(HwError::UnknownCpu(5))));
        assert!(energy.has_joules_dram() && !energy.has_joules_graphic());
    }

    #[test]
    fn joules_arithmetic() {
        let a = JoulesCpu {
            cpu: 10.0,
            cores: 6.0,
            graphic: 1.0,
            dram: 2.0,
        };
        let b = JoulesCpu {
            cpu: 4.0,
            cores: 2.0,
            graphic: 0.5,
            dram: 1.0,
        };
        assert_eq!((a - b).cores, 4.0);
        let mut c = b;
        c += b;
        assert_eq!(c.cpu, 8.0);
        assert_eq!(a + JoulesCpu::default(), a);
    }
}
