use std::path::{Path, PathBuf};
use std::thread;

use tracing::{debug, warn};

use super::{
    CpuFreq, Domain, DomainId, Frequency, Governor, Voltage, VoltageSampling, VoltageTableEntry,
};
use crate::config::LocalConfig;
use crate::error::{HwError, Result};
use crate::msr::{Msr, MSR_PERF_STATUS};
use crate::spinner::Spinners;
use crate::sysfs;
use crate::topology::{LocalTopology, Topology, TopologyMap, VirtualCoreId};

/// Volts per unit of the PERF_STATUS voltage field (2^-13).
const VOLTAGE_UNIT: f64 = 1.0 / 8192.0;

struct LocalDomain {
    domain: Domain,
    /// `cpuN/cpufreq` of every virtual core in the domain.
    paths: Vec<PathBuf>,
    frequencies: Vec<Frequency>,
    governors: Vec<Governor>,
    /// Registers of the first virtual core.
    msr: Msr,
}

impl LocalDomain {
    fn load(domain: Domain, config: &LocalConfig) -> Result<Self> {
        let paths: Vec<PathBuf> = domain
            .virtual_cores
            .iter()
            .map(|&vc| config.virtual_core_dir(vc).join("cpufreq"))
            .collect();
        let (first, &first_core) = paths
            .first()
            .cloned()
            .zip(domain.virtual_cores.first())
            .ok_or_else(|| HwError::Unsupported(format!("empty frequency domain {}", domain.id)))?;

        let frequencies = read_frequencies(&first)?;
        let governors = sysfs::read_first_line(&first.join("scaling_available_governors"))?
            .split_whitespace()
            .filter_map(|name| name.parse().ok())
            .collect();

        Ok(Self {
            domain,
            paths,
            frequencies,
            governors,
            msr: Msr::new(config, first_core),
        })
    }

    fn first_path(&self) -> &Path {
        // `load` refuses empty domains.
        &self.paths[0]
    }

    fn read<T>(&self, attribute: &str) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        sysfs::read_value(&self.first_path().join(attribute))
    }

    /// Write `value` to `attribute` of every virtual core in the domain.
    fn write_all(&self, attribute: &str, value: impl std::fmt::Display + Copy) -> Result<()> {
        for path in &self.paths {
            sysfs::write_value(&path.join(attribute), value)?;
        }
        Ok(())
    }

    fn governor(&self) -> Result<Option<Governor>> {
        let name = sysfs::read_first_line(&self.first_path().join("scaling_governor"))?;
        Ok(name.trim().parse().ok())
    }
}

/// Available frequencies, sorted, with the turbo frequency removed.
fn read_frequencies(cpufreq_dir: &Path) -> Result<Vec<Frequency>> {
    let available = cpufreq_dir.join("scaling_available_frequencies");
    let time_in_state = cpufreq_dir.join("stats/time_in_state");

    let mut frequencies: Vec<Frequency> = if available.is_file() {
        sysfs::read_values(&available)?
    } else if time_in_state.is_file() {
        let contents = std::fs::read_to_string(&time_in_state)
            .map_err(|err| HwError::io("read", &time_in_state, err))?;
        contents
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(|token| {
                token
                    .parse()
                    .map_err(|err| HwError::parse(&time_in_state, token, err))
            })
            .collect::<Result<_>>()?
    } else {
        Vec::new()
    };

    if frequencies.is_empty() {
        return Err(HwError::Unsupported(format!(
            "no frequencies listed in {}",
            cpufreq_dir.display()
        )));
    }

    frequencies.sort_unstable();
    frequencies.dedup();
    // Intel lists turbo mode as the nominal maximum plus 1 MHz, e.g. 2401000.
    if frequencies.len() > 1 && is_turbo(frequencies[frequencies.len() - 1]) {
        frequencies.pop();
    }
    Ok(frequencies)
}

fn is_turbo(frequency: Frequency) -> bool {
    frequency.to_string().chars().nth(3) == Some('1')
}

/// Frequency control through `cpuN/cpufreq`.
pub struct LocalCpuFreq {
    domains: Vec<Domain>,
    local: Vec<LocalDomain>,
    boost_file: PathBuf,
    layout: TopologyMap,
    /// Load generators of voltage table measurements.
    spinners: Spinners,
}

impl LocalCpuFreq {
    pub fn new(config: &LocalConfig) -> Result<Self> {
        let topology = LocalTopology::new(config)?;
        Self::with_topology(config, &topology)
    }

    pub fn with_topology(config: &LocalConfig, topology: &dyn Topology) -> Result<Self> {
        let boost_file = config.cpu_dir().join("cpufreq/boost");
        let layout = topology.layout().clone();
        let virtual_cores = layout.virtual_cores();

        let Some(&first) = virtual_cores.first() else {
            return Ok(Self::empty(boost_file, layout));
        };
        if !config.virtual_core_dir(first).join("cpufreq").is_dir() {
            warn!("no cpufreq interface, frequency domains unavailable");
            return Ok(Self::empty(boost_file, layout));
        }

        let group_file = if config
            .virtual_core_dir(first)
            .join("cpufreq/freqdomain_cpus")
            .is_file()
        {
            "freqdomain_cpus"
        } else {
            "related_cpus"
        };

        let mut groups: Vec<Vec<u32>> = Vec::new();
        for &vc in &virtual_cores {
            let file = config.virtual_core_dir(vc).join("cpufreq").join(group_file);
            if !file.is_file() {
                continue;
            }
            let group = sysfs::read_cpu_list(&file)?;
            if !group.is_empty() && !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups.sort();

        let mut local = Vec::with_capacity(groups.len());
        for (id, virtual_cores) in groups.into_iter().enumerate() {
            let domain = Domain {
                id: id as DomainId,
                virtual_cores,
            };
            local.push(LocalDomain::load(domain, config)?);
        }

        debug!(domains = local.len(), "read frequency domains");
        Ok(Self {
            domains: local.iter().map(|d| d.domain.clone()).collect(),
            local,
            boost_file,
            layout,
            spinners: Spinners::default(),
        })
    }

    fn empty(boost_file: PathBuf, layout: TopologyMap) -> Self {
        Self {
            domains: Vec::new(),
            local: Vec::new(),
            boost_file,
            layout,
            spinners: Spinners::default(),
        }
    }

    fn get(&self, domain: DomainId) -> Result<&LocalDomain> {
        self.local
            .iter()
            .find(|d| d.domain.id == domain)
            .ok_or(HwError::UnknownDomain(domain))
    }

    /// Append one entry per frequency with `loaded` cores spinning.
    fn measure_voltages(
        &self,
        d: &LocalDomain,
        loaded: &[VirtualCoreId],
        sampling: &VoltageSampling,
        table: &mut Vec<VoltageTableEntry>,
    ) -> Result<()> {
        self.spinners.start(loaded)?;
        let samples = sampling.samples.max(1);
        for &frequency in &d.frequencies {
            d.write_all("scaling_setspeed", frequency)?;
            let mut sum = 0.0;
            for _ in 0..samples {
                thread::sleep(sampling.interval);
                sum += self.current_voltage(d.domain.id)?;
            }
            table.push(VoltageTableEntry {
                virtual_cores: loaded.len() as u32,
                frequency,
                voltage: sum / f64::from(samples),
            });
        }
        self.spinners.stop(loaded);
        Ok(())
    }
}

impl CpuFreq for LocalCpuFreq {
    fn domains(&self) -> &[Domain] {
        &self.domains
    }

    fn available_frequencies(&self, domain: DomainId) -> Result<Vec<Frequency>> {
        Ok(self.get(domain)?.frequencies.clone())
    }

    fn available_governors(&self, domain: DomainId) -> Result<Vec<Governor>> {
        Ok(self.get(domain)?.governors.clone())
    }

    fn current_frequency(&self, domain: DomainId) -> Result<Frequency> {
        self.get(domain)?.read("scaling_cur_freq")
    }

    fn current_frequency_userspace(&self, domain: DomainId) -> Result<Frequency> {
        let d = self.get(domain)?;
        if d.governor()? == Some(Governor::Userspace) {
            d.read("scaling_setspeed")
        } else {
            Ok(0)
        }
    }

    fn set_frequency_userspace(&self, domain: DomainId, frequency: Frequency) -> Result<bool> {
        let d = self.get(domain)?;
        if d.governor()? != Some(Governor::Userspace) || !d.frequencies.contains(&frequency) {
            return Ok(false);
        }
        d.write_all("scaling_setspeed", frequency)?;
        debug!(domain, frequency, "frequency set");
        Ok(true)
    }

    fn current_governor(&self, domain: DomainId) -> Result<Option<Governor>> {
        self.get(domain)?.governor()
    }

    fn set_governor(&self, domain: DomainId, governor: Governor) -> Result<bool> {
        let d = self.get(domain)?;
        if !d.governors.contains(&governor) {
            return Ok(false);
        }
        d.write_all("scaling_governor", governor)?;
        debug!(domain, %governor, "governor set");
        Ok(true)
    }

    fn hardware_frequency_bounds(&self, domain: DomainId) -> Result<(Frequency, Frequency)> {
        let d = self.get(domain)?;
        Ok((d.read("cpuinfo_min_freq")?, d.read("cpuinfo_max_freq")?))
    }

    fn current_governor_bounds(&self, domain: DomainId) -> Result<Option<(Frequency, Frequency)>> {
        let d = self.get(domain)?;
        match d.governor()? {
            Some(governor) if governor.has_bounds() => Ok(Some((
                d.read("scaling_min_freq")?,
                d.read("scaling_max_freq")?,
            ))),
            _ => Ok(None),
        }
    }

    fn set_governor_bounds(
        &self,
        domain: DomainId,
        lower: Frequency,
        upper: Frequency,
    ) -> Result<bool> {
        let d = self.get(domain)?;
        let bounded = d.governor()?.is_some_and(Governor::has_bounds);
        if !bounded
            || lower > upper
            || !d.frequencies.contains(&lower)
            || !d.frequencies.contains(&upper)
        {
            return Ok(false);
        }
        d.write_all("scaling_min_freq", lower)?;
        d.write_all("scaling_max_freq", upper)?;
        debug!(domain, lower, upper, "governor bounds set");
        Ok(true)
    }

    fn transition_latency(&self, domain: DomainId) -> Result<Option<u32>> {
        let d = self.get(domain)?;
        let file = d.first_path().join("cpuinfo_transition_latency");
        if file.is_file() {
            Ok(Some(sysfs::read_value(&file)?))
        } else {
            Ok(None)
        }
    }

    fn current_voltage(&self, domain: DomainId) -> Result<Voltage> {
        let d = self.get(domain)?;
        if !d.msr.available() {
            return Ok(0.0);
        }
        let raw = d.msr.read_bits(MSR_PERF_STATUS, 47, 32)?;
        Ok(raw as f64 * VOLTAGE_UNIT)
    }

    fn voltage_table(
        &self,
        domain: DomainId,
        only_physical_cores: bool,
        sampling: &VoltageSampling,
    ) -> Result<Vec<VoltageTableEntry>> {
        let d = self.get(domain)?;
        let cores: Vec<VirtualCoreId> = if only_physical_cores {
            self.layout
                .one_virtual_per_physical()
                .into_iter()
                .filter(|&vc| d.domain.contains(vc))
                .collect()
        } else {
            d.domain.virtual_cores.clone()
        };

        let point = self.rollback_point(domain)?;
        if !self.set_governor(domain, Governor::Userspace)? {
            return Ok(Vec::new());
        }

        let mut table = Vec::new();
        let measured = (0..=cores.len())
            .try_for_each(|n| self.measure_voltages(d, &cores[..n], sampling, &mut table));
        self.spinners.stop(&cores);
        self.rollback(&point)?;
        measured?;

        debug!(domain, entries = table.len(), "voltage table measured");
        Ok(table)
    }

    fn is_boosting_supported(&self) -> Result<bool> {
        Ok(self.boost_file.is_file())
    }

    fn is_boosting_enabled(&self) -> Result<bool> {
        if !self.boost_file.is_file() {
            return Ok(false);
        }
        Ok(sysfs::read_value::<u32>(&self.boost_file)? != 0)
    }

    fn enable_boosting(&self) -> Result<()> {
        sysfs::write_value(&self.boost_file, 1)
    }

    fn disable_boosting(&self) -> Result<()> {
        sysfs::write_value(&self.boost_file, 0)
    }
}
