use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use super::{check_cpu, CounterCpusInfo, Energy, Joules, JoulesCpu};
use crate::config::LocalConfig;
use crate::error::{HwError, Result};
use crate::sysfs;
use crate::topology::{CpuId, LocalTopology, Topology};

const MICROJOULES_PER_JOULE: f64 = 1_000_000.0;

/// Refresh pause when no zone reports its power limit.
const FALLBACK_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// One powercap zone, accumulated across counter wraparounds.
///
/// A wrap between two reads is only seen once, so the counter must be read
/// at least once per wrapping interval.
#[derive(Debug)]
struct Counter {
    energy_file: PathBuf,
    range: u64,
    last: u64,
    joules: Joules,
    /// Time to wrap at the zone's power limit, when the zone has one.
    wrapping_interval: Option<Duration>,
}

impl Counter {
    fn open(zone: &Path) -> Result<Self> {
        let energy_file = zone.join("energy_uj");
        let range = sysfs::read_value(&zone.join("max_energy_range_uj"))?;
        let last = sysfs::read_value(&energy_file)?;
        Ok(Self {
            energy_file,
            range,
            last,
            joules: 0.0,
            wrapping_interval: wrapping_interval(zone, range),
        })
    }

    fn read(&mut self) -> Result<Joules> {
        let now: u64 = sysfs::read_value(&self.energy_file)?;
        self.joules += wrapping_delta(self.last, now, self.range) as f64 / MICROJOULES_PER_JOULE;
        self.last = now;
        Ok(self.joules)
    }

    fn reset(&mut self) -> Result<()> {
        self.last = sysfs::read_value(&self.energy_file)?;
        self.joules = 0.0;
        Ok(())
    }
}

/// `range` microjoules over the zone's largest power limit in microwatts.
fn wrapping_interval(zone: &Path, range: u64) -> Option<Duration> {
    ["constraint_0_max_power_uw", "constraint_0_power_limit_uw"]
        .iter()
        .filter_map(|name| sysfs::read_value::<u64>(&zone.join(name)).ok())
        .find(|&power| power > 0)
        .map(|power| Duration::from_secs_f64(range as f64 / power as f64))
}

/// Microjoules between two raw readings of a counter that wraps at `range`.
fn wrapping_delta(last: u64, now: u64, range: u64) -> u64 {
    if now >= last {
        now - last
    } else {
        range.saturating_sub(last) + now
    }
}

#[derive(Debug)]
struct CpuCounters {
    cpu: CpuId,
    package: Counter,
    cores: Option<Counter>,
    graphic: Option<Counter>,
    dram: Option<Counter>,
}

impl CpuCounters {
    fn read(&mut self) -> Result<JoulesCpu> {
        Ok(JoulesCpu {
            cpu: self.package.read()?,
            cores: read_optional(&mut self.cores)?,
            graphic: read_optional(&mut self.graphic)?,
            dram: read_optional(&mut self.dram)?,
        })
    }

    fn counters(&self) -> impl Iterator<Item = &Counter> {
        [&self.cores, &self.graphic, &self.dram]
            .into_iter()
            .flatten()
            .chain([&self.package])
    }

    fn reset(&mut self) -> Result<()> {
        self.package.reset()?;
        for counter in [&mut self.cores, &mut self.graphic, &mut self.dram]
            .into_iter()
            .flatten()
        {
            counter.reset()?;
        }
        Ok(())
    }
}

fn read_optional(counter: &mut Option<Counter>) -> Result<Joules> {
    counter.as_mut().map_or(Ok(0.0), Counter::read)
}

type SharedCounters = Arc<Mutex<Vec<CpuCounters>>>;

/// Read every counter once, folding any wrap since the previous read into
/// the totals.
fn refresh(counters: &SharedCounters) {
    let mut counters = counters.lock().unwrap_or_else(PoisonError::into_inner);
    for counter in counters.iter_mut() {
        if let Err(err) = counter.read() {
            warn!(cpu = counter.cpu, error = %err, "energy refresh failed");
        }
    }
}

/// Background thread reading the counters often enough to see every wrap.
/// Stopped and joined on drop.
#[derive(Debug)]
struct Refresher {
    stop: mpsc::Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl Refresher {
    fn spawn(counters: SharedCounters, interval: Duration) -> Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let join = thread::Builder::new()
            .name("powerprims-energy".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => refresh(&counters),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|source| HwError::Spawn {
                name: "energy refresher",
                source,
            })?;
        Ok(Self {
            stop,
            join: Some(join),
        })
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        let _ = self.stop.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Energy counters from the `intel-rapl` powercap zones.
#[derive(Debug)]
pub struct LocalEnergy {
    info: CounterCpusInfo,
    counters: SharedCounters,
    refresh_interval: Duration,
    _refresher: Refresher,
}

impl LocalEnergy {
    pub fn new(config: &LocalConfig) -> Result<Self> {
        let topology = LocalTopology::new(config)?;
        Self::with_topology(config, &topology)
    }

    pub fn with_topology(config: &LocalConfig, topology: &dyn Topology) -> Result<Self> {
        let zones = package_zones(&config.powercap_dir())?;

        let mut counters = Vec::new();
        for cpu in topology.layout().cpus() {
            let zone = zones
                .iter()
                .find(|(package, _)| *package == cpu)
                .map(|(_, zone)| zone)
                .ok_or_else(|| HwError::Unsupported(format!("no RAPL zone for cpu {cpu}")))?;
            counters.push(open_cpu(cpu, zone)?);
        }

        let info = CounterCpusInfo {
            cpus: counters.iter().map(|c| c.cpu).collect(),
            has_cores: !counters.is_empty() && counters.iter().all(|c| c.cores.is_some()),
            has_graphic: !counters.is_empty() && counters.iter().all(|c| c.graphic.is_some()),
            has_dram: !counters.is_empty() && counters.iter().all(|c| c.dram.is_some()),
        };

        let refresh_interval = config.energy_refresh_interval.unwrap_or_else(|| {
            counters
                .iter()
                .flat_map(CpuCounters::counters)
                .filter_map(|counter| counter.wrapping_interval)
                .min()
                .map_or(FALLBACK_REFRESH_INTERVAL, |wrap| wrap / 2)
        });
        debug!(?info, ?refresh_interval, "opened energy counters");

        let counters = Arc::new(Mutex::new(counters));
        let refresher = Refresher::spawn(Arc::clone(&counters), refresh_interval)?;
        Ok(Self {
            info,
            counters,
            refresh_interval,
            _refresher: refresher,
        })
    }

    /// Pause between two background reads of the counters.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }
}

/// `(package id, zone dir)` of every top-level `intel-rapl:N` package zone.
fn package_zones(powercap: &Path) -> Result<Vec<(CpuId, PathBuf)>> {
    let entries = fs::read_dir(powercap)
        .map_err(|_| HwError::Unsupported(format!("no powercap interface at {}", powercap.display())))?;

    let mut zones = Vec::new();
    for entry in entries.filter_map(|entry| entry.ok()) {
        let file_name = entry.file_name();
        let Some(index) = file_name.to_str().and_then(|n| n.strip_prefix("intel-rapl:")) else {
            continue;
        };
        if index.contains(':') {
            continue;
        }
        let zone = entry.path();
        let name = sysfs::read_first_line(&zone.join("name"))?;
        if let Some(package) = name.strip_prefix("package-").and_then(|p| p.parse().ok()) {
            zones.push((package, zone));
        }
    }
    zones.sort();
    Ok(zones)
}

fn open_cpu(cpu: CpuId, zone: &Path) -> Result<CpuCounters> {
    let mut counters = CpuCounters {
        cpu,
        package: Counter::open(zone)?,
        cores: None,
        graphic: None,
        dram: None,
    };

    let prefix = format!(
        "{}:",
        zone.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    );
    let entries = fs::read_dir(zone).map_err(|err| HwError::io("list", zone, err))?;
    for entry in entries.filter_map(|entry| entry.ok()) {
        let is_subzone = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with(&prefix));
        if !is_subzone {
            continue;
        }
        let subzone = entry.path();
        let slot = match sysfs::read_first_line(&subzone.join("name"))?.as_str() {
            "core" => &mut counters.cores,
            "uncore" => &mut counters.graphic,
            "dram" => &mut counters.dram,
            _ => continue,
        };
        *slot = Some(Counter::open(&subzone)?);
    }
    Ok(counters)
}

impl Energy for LocalEnergy {
    fn info(&self) -> &CounterCpusInfo {
        &self.info
    }

    fn joules_components(&self, cpu: CpuId) -> Result<JoulesCpu> {
        check_cpu(&self.info, cpu)?;
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        match counters.iter_mut().find(|c| c.cpu == cpu) {
            Some(counter) => counter.read(),
            None => Err(HwError::UnknownCpu(cpu)),
        }
    }

    fn reset(&self) -> Result<()> {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        for counter in counters.iter_mut() {
            counter.reset()?;
        }
        debug!("energy counters reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTree, RAPL_RANGE as RANGE};

    #[test]
    fn finds_package_zones_and_capabilities() {
        let tree = FakeTree::with_rapl("energy-zones");
        let energy = LocalEnergy::new(&tree.config()).unwrap();

        assert_eq!(energy.cpus(), &[0, 1]);
        assert!(energy.has_joules_cores());
        assert!(energy.has_joules_dram());
        assert!(!energy.has_joules_graphic());
    }

    #[test]
    fn counts_since_construction_and_reset() {
        let tree = FakeTree::with_rapl("energy-count");
        let energy = LocalEnergy::new(&tree.config()).unwrap();

        tree.set_energy("intel-rapl:0", 3_500_000);
        tree.set_energy("intel-rapl:0/intel-rapl:0:0", 1_000_000);
        tree.set_energy("intel-rapl:0/intel-rapl:0:2", 250_000);
        let joules = energy.joules_components(0).unwrap();
        assert_eq!(joules.cpu, 2.5);
        assert_eq!(joules.cores, 1.0);
        assert_eq!(joules.graphic, 0.25);
        assert_eq!(joules.dram, 0.0);

        tree.set_energy("intel-rapl:0", 4_000_000);
        assert_eq!(energy.joules_cpu(0).unwrap(), 3.0);

        energy.reset().unwrap();
        assert_eq!(energy.joules_cpu(0).unwrap(), 0.0);
        tree.set_energy("intel-rapl:0", 5_000_000);
        assert_eq!(energy.joules_cpu(0).unwrap(), 1.0);
    }

    #[test]
    fn handles_wraparound() {
        let tree = FakeTree::with_rapl("energy-wrap");
        tree.set_energy("intel-rapl:1", RANGE - 500_000);
        let energy = LocalEnergy::new(&tree.config()).unwrap();

        tree.set_energy("intel-rapl:1", 1_500_000);
        assert_eq!(energy.joules_cpu(1).unwrap(), 2.0);
        assert_eq!(wrapping_delta(10, 4, 12), 6);
    }

    #[test]
    fn refreshes_see_every_wrap() {
        let tree = FakeTree::with_rapl("energy-multiwrap");
        let config = tree.config().with_energy_refresh_interval(Duration::from_secs(3600));
        let energy = LocalEnergy::new(&config).unwrap();

        // Two full wraps: only visible when read in between.
        for raw in [RANGE - 1_000_000, 500_000, RANGE - 1_000_000, 2_000_000] {
            tree.set_energy("intel-rapl:0", raw);
            refresh(&energy.counters);
        }
        let expected = (2 * RANGE + 1_000_000) as f64 / MICROJOULES_PER_JOULE;
        assert!((energy.joules_cpu(0).unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn refresh_interval_is_half_the_wrapping_time() {
        let tree = FakeTree::with_rapl("energy-interval");
        // RANGE at 100 W for package 0, 50 W for package 1.
        tree.write(
            "sys/class/powercap/intel-rapl:0/constraint_0_max_power_uw",
            "100000000\n",
        );
        tree.write(
            "sys/class/powercap/intel-rapl:1/constraint_0_power_limit_uw",
            "50000000\n",
        );
        let energy = LocalEnergy::new(&tree.config()).unwrap();
        let wrap = RANGE as f64 / 100_000_000.0;
        assert!((energy.refresh_interval().as_secs_f64() - wrap / 2.0).abs() < 1e-3);

        let bare = FakeTree::with_rapl("energy-interval-default");
        let energy = LocalEnergy::new(&bare.config()).unwrap();
        assert_eq!(energy.refresh_interval(), FALLBACK_REFRESH_INTERVAL);
    }

    #[test]
    fn background_refresher_counts_wraps() {
        let tree = FakeTree::with_rapl("energy-refresher");
        let config = tree.config().with_energy_refresh_interval(Duration::from_millis(10));
        let energy = LocalEnergy::new(&config).unwrap();

        tree.set_energy("intel-rapl:1", RANGE - 1_000_000);
        thread::sleep(Duration::from_millis(200));
        tree.set_energy("intel-rapl:1", 1_000_000);
        thread::sleep(Duration::from_millis(200));
        tree.set_energy("intel-rapl:1", RANGE - 1_000_000);
        thread::sleep(Duration::from_millis(200));
        tree.set_energy("intel-rapl:1", 3_000_000);
        thread::sleep(Duration::from_millis(200));

        let expected = (2 * RANGE + 2_000_000) as f64 / MICROJOULES_PER_JOULE;
        assert!((energy.joules_cpu(1).unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn dropping_stops_the_refresher() {
        let tree = FakeTree::with_rapl("energy-drop");
        let config = tree.config().with_energy_refresh_interval(Duration::from_secs(3600));
        let energy = LocalEnergy::new(&config).unwrap();

        let start = std::time::Instant::now();
        drop(energy);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn aggregates_sum_packages() {
        let tree = FakeTree::with_rapl("energy-all");
        let energy = LocalEnergy::new(&tree.config()).unwrap();

        tree.set_energy("intel-rapl:0", 2_000_000);
        tree.set_energy("intel-rapl:1", 3_000_000);
        assert_eq!(energy.joules_cpu_all().unwrap(), 3.0);
        assert!(matches!(
            energy.joules_components(4),
            Err(HwError::UnknownCpu(4))
        ));
    }

    #[test]
    fn missing_powercap_is_unsupported() {
        let tree = FakeTree::with_two_packages("energy-none");
        assert!(matches!(
            LocalEnergy::new(&tree.config()),
            Err(HwError::Unsupported(_))
        ));
    }
}
