use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use super::{
    CpuId, IdleLevelInfo, Topology, TopologyMap, VirtualCoreCoordinates, VirtualCoreId,
};
use crate::config::LocalConfig;
use crate::error::{HwError, Result};
use crate::msr::{Msr, MSR_CLOCK_MODULATION};
use crate::sched;
use crate::spinner::Spinners;
use crate::sysfs;

/// Duty cycle granularity of on-demand clock modulation, in percent.
const CLOCK_MODULATION_STEP: f64 = 12.5;
/// Enable bit plus the three duty cycle bits.
const CLOCK_MODULATION_HIGH: u32 = 4;
const CLOCK_MODULATION_LOW: u32 = 1;
const CLOCK_MODULATION_ENABLE: u64 = 0b1000;

/// Topology read from sysfs and procfs.
///
/// Dropping it stops the utilization spinners and restores the clock
/// modulation bits found before the first change.
pub struct LocalTopology {
    config: LocalConfig,
    layout: TopologyMap,
    /// `(time, count)` baselines of idle levels, keyed by `(virtual core, level)`.
    idle_baselines: Mutex<HashMap<(VirtualCoreId, u32), (u64, u64)>>,
    /// Idle ticks of each virtual core at the last reset.
    idle_time_baselines: Mutex<HashMap<VirtualCoreId, u64>>,
    ticks_per_second: u64,
    spinners: Spinners,
    clock_modulation_origin: Mutex<HashMap<VirtualCoreId, u64>>,
}

impl LocalTopology {
    pub fn new(config: &LocalConfig) -> Result<Self> {
        let cpu_dir = config.cpu_dir();
        let present = sysfs::read_cpu_list(&cpu_dir.join("present"))?;

        let mut coordinates = Vec::with_capacity(present.len());
        for virtual_core in present {
            let topology_dir = config.virtual_core_dir(virtual_core).join("topology");
            coordinates.push(VirtualCoreCoordinates {
                cpu: sysfs::read_value(&topology_dir.join("physical_package_id"))?,
                physical_core: sysfs::read_value(&topology_dir.join("core_id"))?,
                virtual_core,
            });
        }

        let layout = TopologyMap::from_coordinates(coordinates);
        debug!(
            cpus = layout.cpus().len(),
            virtual_cores = layout.virtual_cores().len(),
            "read local topology"
        );

        let ticks_per_second = sched::clock_ticks_per_second();
        let idle_time_baselines = match proc_stat(config) {
            Ok(stat) => layout
                .virtual_cores()
                .into_iter()
                .filter_map(|vc| idle_ticks(&stat, vc).map(|ticks| (vc, ticks)))
                .collect(),
            Err(err) => {
                debug!(error = %err, "no idle time baseline");
                HashMap::new()
            }
        };

        Ok(Self {
            config: config.clone(),
            layout,
            idle_baselines: Mutex::new(HashMap::new()),
            idle_time_baselines: Mutex::new(idle_time_baselines),
            ticks_per_second,
            spinners: Spinners::default(),
            clock_modulation_origin: Mutex::new(HashMap::new()),
        })
    }

    fn check_virtual_cores(&self, virtual_cores: &[VirtualCoreId]) -> Result<()> {
        virtual_cores
            .iter()
            .try_for_each(|&vc| self.check_virtual_core(vc))
    }

    fn absolute_idle_ticks(&self, virtual_core: VirtualCoreId) -> Result<u64> {
        self.check_virtual_core(virtual_core)?;
        idle_ticks(&proc_stat(&self.config)?, virtual_core).ok_or_else(|| {
            HwError::Unsupported(format!("no idle time for virtual core {virtual_core}"))
        })
    }

    /// Register access of a virtual core with clock modulation.
    fn clock_modulation_msr(&self, virtual_core: VirtualCoreId) -> Result<Msr> {
        self.check_virtual_core(virtual_core)?;
        let msr = Msr::new(&self.config, virtual_core);
        if msr.available() {
            Ok(msr)
        } else {
            Err(HwError::Unsupported(format!(
                "no clock modulation on virtual core {virtual_core}"
            )))
        }
    }

    fn check_virtual_core(&self, virtual_core: VirtualCoreId) -> Result<()> {
        if self.layout.contains(virtual_core) {
            Ok(())
        } else {
            Err(HwError::UnknownVirtualCore(virtual_core))
        }
    }

    fn hotplug_file(&self, virtual_core: VirtualCoreId) -> Result<PathBuf> {
        self.check_virtual_core(virtual_core)?;
        Ok(self.config.virtual_core_dir(virtual_core).join("online"))
    }

    fn idle_level_dir(&self, virtual_core: VirtualCoreId, level: u32) -> Result<PathBuf> {
        self.check_virtual_core(virtual_core)?;
        let dir = self
            .config
            .virtual_core_dir(virtual_core)
            .join("cpuidle")
            .join(format!("state{level}"));
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(HwError::UnknownIdleLevel {
                virtual_core,
                level,
            })
        }
    }

    /// A `/proc/cpuinfo` field from the section of the first virtual core
    /// of `cpu`. Empty when the field is absent.
    fn cpu_info(&self, cpu: CpuId, field: &str) -> Result<String> {
        let virtual_core = self
            .layout
            .first_virtual_core(cpu)
            .ok_or(HwError::UnknownCpu(cpu))?;

        let path = self.config.proc_dir().join("cpuinfo");
        let contents = fs::read_to_string(&path).map_err(|err| HwError::io("read", &path, err))?;
        Ok(cpuinfo_field(&contents, virtual_core, field).unwrap_or_default())
    }

    fn baseline(&self, virtual_core: VirtualCoreId, level: u32) -> (u64, u64) {
        let baselines = self.idle_baselines.lock().unwrap_or_else(PoisonError::into_inner);
        baselines
            .get(&(virtual_core, level))
            .copied()
            .unwrap_or_default()
    }
}

impl Drop for LocalTopology {
    fn drop(&mut self) {
        let origin = self
            .clock_modulation_origin
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for (&virtual_core, &bits) in origin.iter() {
            let msr = Msr::new(&self.config, virtual_core);
            if let Err(err) = msr.write_bits(
                MSR_CLOCK_MODULATION,
                CLOCK_MODULATION_HIGH,
                CLOCK_MODULATION_LOW,
                bits,
            ) {
                warn!(virtual_core, error = %err, "clock modulation not restored");
            }
        }
    }
}

fn proc_stat(config: &LocalConfig) -> Result<String> {
    let path = config.proc_dir().join("stat");
    fs::read_to_string(&path).map_err(|err| HwError::io("read", &path, err))
}

/// Idle ticks of the `cpu<N>` line of `/proc/stat`.
fn idle_ticks(stat: &str, virtual_core: VirtualCoreId) -> Option<u64> {
    let label = format!("cpu{virtual_core}");
    stat.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .find(|fields| fields.first() == Some(&label.as_str()))?
        .get(4)?
        .parse()
        .ok()
}

fn clock_modulation_values() -> Vec<f64> {
    (1..8)
        .map(|step| f64::from(step) * CLOCK_MODULATION_STEP)
        .chain(std::iter::once(100.0))
        .collect()
}

/// Value of `field` in the `processor : <virtual_core>` section.
fn cpuinfo_field(contents: &str, virtual_core: VirtualCoreId, field: &str) -> Option<String> {
    contents
        .split("\n\n")
        .find(|section| {
            section.lines().any(|line| {
                matches!(line.split_once(':'), Some((key, value))
                    if key.trim() == "processor" && value.trim().parse::<u32>().ok() == Some(virtual_core))
            })
        })?
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim() == field)
        .map(|(_, value)| value.trim().to_string())
}

impl Topology for LocalTopology {
    fn layout(&self) -> &TopologyMap {
        &self.layout
    }

    fn cpu_vendor_id(&self, cpu: CpuId) -> Result<String> {
        self.cpu_info(cpu, "vendor_id")
    }

    fn cpu_family(&self, cpu: CpuId) -> Result<String> {
        self.cpu_info(cpu, "cpu family")
    }

    fn cpu_model(&self, cpu: CpuId) -> Result<String> {
        self.cpu_info(cpu, "model")
    }

    fn is_hot_pluggable(&self, virtual_core: VirtualCoreId) -> Result<bool> {
        Ok(self.hotplug_file(virtual_core)?.is_file())
    }

    fn is_hot_plugged(&self, virtual_core: VirtualCoreId) -> Result<bool> {
        let file = self.hotplug_file(virtual_core)?;
        if !file.is_file() {
            return Ok(true);
        }
        Ok(sysfs::read_value::<u32>(&file)? > 0)
    }

    fn hot_plug(&self, virtual_core: VirtualCoreId) -> Result<()> {
        let file = self.hotplug_file(virtual_core)?;
        if file.is_file() {
            sysfs::write_value(&file, 1)?;
            debug!(virtual_core, "hot plugged");
        }
        Ok(())
    }

    fn hot_unplug(&self, virtual_core: VirtualCoreId) -> Result<()> {
        let file = self.hotplug_file(virtual_core)?;
        if file.is_file() {
            sysfs::write_value(&file, 0)?;
            debug!(virtual_core, "hot unplugged");
        }
        Ok(())
    }

    fn idle_levels(&self, virtual_core: VirtualCoreId) -> Result<Vec<u32>> {
        self.check_virtual_core(virtual_core)?;
        sysfs::numbered_entries(
            &self.config.virtual_core_dir(virtual_core).join("cpuidle"),
            "state",
        )
    }

    fn idle_level(&self, virtual_core: VirtualCoreId, level: u32) -> Result<IdleLevelInfo> {
        let dir = self.idle_level_dir(virtual_core, level)?;
        let disable = dir.join("disable");
        let enableable = disable.is_file();
        let enabled = !enableable || sysfs::read_value::<u32>(&disable)? == 0;

        let absolute_time: u64 = sysfs::read_value(&dir.join("time"))?;
        let absolute_count: u64 = sysfs::read_value(&dir.join("usage"))?;
        let (base_time, base_count) = self.baseline(virtual_core, level);

        Ok(IdleLevelInfo {
            virtual_core,
            level,
            name: sysfs::read_first_line(&dir.join("name"))?,
            desc: sysfs::read_first_line(&dir.join("desc"))?,
            enableable,
            enabled,
            exit_latency: sysfs::read_value(&dir.join("latency"))?,
            power: sysfs::read_value(&dir.join("power"))?,
            absolute_time,
            absolute_count,
            time: absolute_time.saturating_sub(base_time),
            count: absolute_count.saturating_sub(base_count),
        })
    }

    fn set_idle_level_enabled(
        &self,
        virtual_core: VirtualCoreId,
        level: u32,
        enabled: bool,
    ) -> Result<bool> {
        let disable = self.idle_level_dir(virtual_core, level)?.join("disable");
        if !disable.is_file() {
            return Ok(false);
        }
        sysfs::write_value(&disable, if enabled { 0 } else { 1 })?;
        debug!(virtual_core, level, enabled, "idle level updated");
        Ok(true)
    }

    fn reset_idle_level(&self, virtual_core: VirtualCoreId, level: u32) -> Result<()> {
        let dir = self.idle_level_dir(virtual_core, level)?;
        let time: u64 = sysfs::read_value(&dir.join("time"))?;
        let count: u64 = sysfs::read_value(&dir.join("usage"))?;

        let mut baselines = self.idle_baselines.lock().unwrap_or_else(PoisonError::into_inner);
        baselines.insert((virtual_core, level), (time, count));
        Ok(())
    }

    fn maximize_utilization(&self, virtual_cores: &[VirtualCoreId]) -> Result<()> {
        self.check_virtual_cores(virtual_cores)?;
        self.spinners.start(virtual_cores)?;
        debug!(?virtual_cores, "utilization maximized");
        Ok(())
    }

    fn reset_utilization(&self, virtual_cores: &[VirtualCoreId]) -> Result<()> {
        self.check_virtual_cores(virtual_cores)?;
        let stopped = self.spinners.stop(virtual_cores);
        debug!(stopped, "utilization reset");
        Ok(())
    }

    fn idle_time(&self, virtual_core: VirtualCoreId) -> Result<u64> {
        let ticks = self.absolute_idle_ticks(virtual_core)?;
        let baseline = {
            let baselines = self
                .idle_time_baselines
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            baselines.get(&virtual_core).copied().unwrap_or_default()
        };
        Ok(ticks.saturating_sub(baseline) * 1_000_000 / self.ticks_per_second)
    }

    fn reset_idle_time(&self, virtual_core: VirtualCoreId) -> Result<()> {
        let ticks = self.absolute_idle_ticks(virtual_core)?;
        let mut baselines = self
            .idle_time_baselines
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        baselines.insert(virtual_core, ticks);
        Ok(())
    }

    fn has_clock_modulation(&self, virtual_core: VirtualCoreId) -> Result<bool> {
        self.check_virtual_core(virtual_core)?;
        Ok(Msr::new(&self.config, virtual_core).available())
    }

    fn clock_modulation_values(&self, virtual_core: VirtualCoreId) -> Result<Vec<f64>> {
        if self.has_clock_modulation(virtual_core)? {
            Ok(clock_modulation_values())
        } else {
            Ok(Vec::new())
        }
    }

    fn clock_modulation(&self, virtual_core: VirtualCoreId) -> Result<f64> {
        let bits = self.clock_modulation_msr(virtual_core)?.read_bits(
            MSR_CLOCK_MODULATION,
            CLOCK_MODULATION_HIGH,
            CLOCK_MODULATION_LOW,
        )?;
        if bits & CLOCK_MODULATION_ENABLE == 0 {
            return Ok(100.0);
        }
        Ok((bits & !CLOCK_MODULATION_ENABLE) as f64 * CLOCK_MODULATION_STEP)
    }

    fn set_clock_modulation(&self, virtual_core: VirtualCoreId, value: f64) -> Result<bool> {
        let msr = self.clock_modulation_msr(virtual_core)?;
        if !clock_modulation_values().contains(&value) {
            return Ok(false);
        }

        {
            let mut origin = self
                .clock_modulation_origin
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !origin.contains_key(&virtual_core) {
                let bits = msr.read_bits(
                    MSR_CLOCK_MODULATION,
                    CLOCK_MODULATION_HIGH,
                    CLOCK_MODULATION_LOW,
                )?;
                origin.insert(virtual_core, bits);
            }
        }

        let bits = if value >= 100.0 {
            0
        } else {
            CLOCK_MODULATION_ENABLE | (value / CLOCK_MODULATION_STEP) as u64
        };
        msr.write_bits(
            MSR_CLOCK_MODULATION,
            CLOCK_MODULATION_HIGH,
            CLOCK_MODULATION_LOW,
            bits,
        )?;
        debug!(virtual_core, value, "clock modulation updated");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTree;

    fn add_idle_level(tree: &FakeTree, vc: u32, level: u32, name: &str, disable: Option<&str>) {
        let base = format!("sys/devices/system/cpu/cpu{vc}/cpuidle/state{level}");
        tree.write(&format!("{base}/name"), &format!("{name}\n"));
        tree.write(&format!("{base}/desc"), &format!("{name} idle state\n"));
        tree.write(&format!("{base}/latency"), "2\n");
        tree.write(&format!("{base}/power"), "0\n");
        tree.write(&format!("{base}/time"), "1000\n");
        tree.write(&format!("{base}/usage"), "10\n");
        if let Some(disable) = disable {
            tree.write(&format!("{base}/disable"), disable);
        }
    }

    #[test]
    fn reads_layout_from_sysfs() {
        let tree = FakeTree::with_two_packages("topo-layout");
        let topology = LocalTopology::new(&tree.config()).unwrap();

        let layout = topology.layout();
        assert_eq!(layout.cpus(), vec![0, 1]);
        assert_eq!(layout.virtual_cores(), (0..8).collect::<Vec<_>>());
        assert_eq!(layout.physical_cores(1), vec![0, 1]);
        assert_eq!(layout.virtual_cores_of_physical_core(1, 1), vec![6, 7]);
    }

    #[test]
    fn cpu_info_comes_from_the_first_virtual_core_of_the_cpu() {
        let tree = FakeTree::with_two_packages("topo-cpuinfo");
        let topology = LocalTopology::new(&tree.config()).unwrap();

        assert_eq!(topology.cpu_vendor_id(0).unwrap(), "GenuineIntel");
        assert_eq!(topology.cpu_family(1).unwrap(), "6");
        assert_eq!(topology.cpu_model(0).unwrap(), "79");
        assert_eq!(topology.cpu_model(1).unwrap(), "85");
        assert!(matches!(topology.cpu_model(9), Err(HwError::UnknownCpu(9))));
    }

    #[test]
    fn hotplug() {
        let tree = FakeTree::with_two_packages("topo-hotplug");
        let topology = LocalTopology::new(&tree.config()).unwrap();

        assert!(!topology.is_hot_pluggable(0).unwrap());
        assert!(topology.is_hot_plugged(0).unwrap());
        topology.hot_unplug(0).unwrap();
        assert!(topology.is_hot_plugged(0).unwrap());

        assert!(topology.is_hot_pluggable(3).unwrap());
        topology.hot_unplug(3).unwrap();
        assert_eq!(tree.read("sys/devices/system/cpu/cpu3/online"), "0");
        assert!(!topology.is_hot_plugged(3).unwrap());
        assert_eq!(topology.plug_all().unwrap(), 8);
        assert!(topology.is_hot_plugged(3).unwrap());

        assert!(matches!(
            topology.hot_plug(42),
            Err(HwError::UnknownVirtualCore(42))
        ));
    }

    #[test]
    fn idle_levels_and_relative_counters() {
        let tree = FakeTree::with_two_packages("topo-idle");
        add_idle_level(&tree, 1, 0, "POLL", None);
        add_idle_level(&tree, 1, 1, "C1", Some("0\n"));
        let topology = LocalTopology::new(&tree.config()).unwrap();

        assert_eq!(topology.idle_levels(1).unwrap(), vec![0, 1]);
        assert!(topology.idle_levels(2).unwrap().is_empty());

        let poll = topology.idle_level(1, 0).unwrap();
        assert_eq!(poll.name, "POLL");
        assert!(!poll.enableable);
        assert!(poll.enabled);
        assert!(!topology.set_idle_level_enabled(1, 0, false).unwrap());

        assert!(topology.set_idle_level_enabled(1, 1, false).unwrap());
        let c1 = topology.idle_level(1, 1).unwrap();
        assert!(c1.enableable && !c1.enabled);
        assert_eq!((c1.time, c1.count), (1000, 10));

        topology.reset_idle_level(1, 1).unwrap();
        tree.write("sys/devices/system/cpu/cpu1/cpuidle/state1/time", "1500\n");
        tree.write("sys/devices/system/cpu/cpu1/cpuidle/state1/usage", "13\n");
        let c1 = topology.idle_level(1, 1).unwrap();
        assert_eq!((c1.absolute_time, c1.time, c1.count), (1500, 500, 3));

        assert!(matches!(
            topology.idle_level(1, 7),
            Err(HwError::UnknownIdleLevel { level: 7, .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn rollback_restores_hotplug_idle_levels_and_clock_modulation() {
        let tree = FakeTree::with_two_packages("topo-rollback");
        add_idle_level(&tree, 2, 0, "POLL", None);
        add_idle_level(&tree, 2, 1, "C1", Some("0\n"));
        add_idle_level(&tree, 2, 2, "C6", Some("1\n"));
        tree.create_msr(2);
        let topology = LocalTopology::new(&tree.config()).unwrap();
        topology.set_clock_modulation(2, 50.0).unwrap();

        let point = topology.rollback_point(2).unwrap();
        assert!(point.hot_plugged);
        assert_eq!(point.idle_levels, vec![(1, true), (2, false)]);
        assert_eq!(point.clock_modulation, Some(50.0));
        assert_eq!(topology.rollback_point(3).unwrap().clock_modulation, None);

        topology.hot_unplug(2).unwrap();
        topology.set_idle_level_enabled(2, 1, false).unwrap();
        topology.set_idle_level_enabled(2, 2, true).unwrap();
        topology.set_clock_modulation(2, 12.5).unwrap();

        topology.rollback(&point).unwrap();
        assert_eq!(topology.rollback_point(2).unwrap(), point);
    }

    #[test]
    fn idle_time_since_construction_and_reset() {
        let tree = FakeTree::with_two_packages("topo-idle-time");
        tree.write(
            "proc/stat",
            "cpu  40 0 20 4000 0 0 0 0 0 0\ncpu0 10 0 5 1000 0 0 0 0 0 0\ncpu1 10 0 5 2000 0 0 0 0 0 0\nintr 1 2 3\n",
        );
        let topology = LocalTopology::new(&tree.config()).unwrap();
        let hz = sched::clock_ticks_per_second();
        assert_eq!(topology.idle_time(1).unwrap(), 0);

        tree.write(
            "proc/stat",
            &format!(
                "cpu  40 0 20 4000 0 0 0 0 0 0\ncpu0 10 0 5 1000 0 0 0 0 0 0\ncpu1 10 0 5 {} 0 0 0 0 0 0\n",
                2000 + hz / 2
            ),
        );
        assert_eq!(topology.idle_time(1).unwrap(), hz / 2 * 1_000_000 / hz);
        assert_eq!(topology.idle_time(0).unwrap(), 0);

        topology.reset_idle_time(1).unwrap();
        assert_eq!(topology.idle_time(1).unwrap(), 0);

        assert!(matches!(topology.idle_time(3), Err(HwError::Unsupported(_))));
        assert!(matches!(
            topology.idle_time(42),
            Err(HwError::UnknownVirtualCore(42))
        ));
    }

    #[test]
    fn idle_time_lines_match_the_exact_core() {
        let stat = "cpu 1 2 3 4\ncpu1 1 2 3 40\ncpu10 1 2 3 400\n";
        assert_eq!(idle_ticks(stat, 1), Some(40));
        assert_eq!(idle_ticks(stat, 10), Some(400));
        assert_eq!(idle_ticks(stat, 2), None);
    }

    #[test]
    fn utilization_spinners_start_and_stop() {
        let tree = FakeTree::with_two_packages("topo-spin");
        let topology = LocalTopology::new(&tree.config()).unwrap();

        topology.maximize_utilization(&[0, 1]).unwrap();
        assert_eq!(topology.spinners.running(), vec![0, 1]);
        topology.reset_utilization(&[1, 2]).unwrap();
        assert_eq!(topology.spinners.running(), vec![0]);

        assert!(matches!(
            topology.maximize_utilization(&[0, 99]),
            Err(HwError::UnknownVirtualCore(99))
        ));
        drop(topology);
    }

    #[cfg(unix)]
    #[test]
    fn clock_modulation_duty_cycles() {
        let tree = FakeTree::with_two_packages("topo-clockmod");
        tree.create_msr(1);
        tree.set_msr(1, MSR_CLOCK_MODULATION, 0xF0_00);
        let topology = LocalTopology::new(&tree.config()).unwrap();

        assert!(!topology.has_clock_modulation(0).unwrap());
        assert!(topology.clock_modulation_values(0).unwrap().is_empty());
        assert!(matches!(
            topology.clock_modulation(0),
            Err(HwError::Unsupported(_))
        ));

        let values = topology.clock_modulation_values(1).unwrap();
        assert_eq!(values.len(), 8);
        assert_eq!(values[0], 12.5);
        assert_eq!(values[7], 100.0);
        assert_eq!(topology.clock_modulation(1).unwrap(), 100.0);

        assert!(topology.set_clock_modulation(1, 37.5).unwrap());
        assert_eq!(tree.msr(1, MSR_CLOCK_MODULATION), 0xF0_00 | 0b1_0110);
        assert_eq!(topology.clock_modulation(1).unwrap(), 37.5);

        assert!(!topology.set_clock_modulation(1, 40.0).unwrap());
        assert_eq!(topology.clock_modulation(1).unwrap(), 37.5);

        assert!(topology.set_clock_modulation(1, 100.0).unwrap());
        assert_eq!(topology.clock_modulation(1).unwrap(), 100.0);
        assert!(topology.set_clock_modulation(1, 87.5).unwrap());

        drop(topology);
        assert_eq!(tree.msr(1, MSR_CLOCK_MODULATION), 0xF0_00);
    }

    #[test]
    fn cpuinfo_sections() {
        let contents = "processor\t: 0\nmodel\t\t: 1\n\nprocessor\t: 10\nmodel\t\t: 2\n";
        assert_eq!(cpuinfo_field(contents, 10, "model").as_deref(), Some("2"));
        assert_eq!(cpuinfo_field(contents, 1, "model"), None);
        assert_eq!(cpuinfo_field(contents, 0, "flags"), None);
    }
}
