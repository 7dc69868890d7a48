use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration shared by the local façades.
///
/// Every `/sys` and `/proc` path is resolved below `sysfs_root`, which lets
/// tests and simulations point the façades at a prepared directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    /// Root prefix for sysfs, procfs and `/dev/cpu`. Default: `/`.
    pub sysfs_root: PathBuf,
    /// Pause between two background reads of the energy counters. Default:
    /// half the time the fastest counter takes to wrap at full power.
    pub energy_refresh_interval: Option<Duration>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self::with_sysfs_root("/")
    }
}

impl LocalConfig {
    pub fn with_sysfs_root(root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: root.into(),
            energy_refresh_interval: None,
        }
    }

    pub fn with_energy_refresh_interval(mut self, interval: Duration) -> Self {
        self.energy_refresh_interval = Some(interval);
        self
    }

    /// `/sys/devices/system/cpu`
    pub fn cpu_dir(&self) -> PathBuf {
        self.sysfs_root.join("sys/devices/system/cpu")
    }

    /// `/sys/devices/system/cpu/cpu<N>`
    pub fn virtual_core_dir(&self, virtual_core: u32) -> PathBuf {
        self.cpu_dir().join(format!("cpu{virtual_core}"))
    }

    /// `/sys/class/powercap`
    pub fn powercap_dir(&self) -> PathBuf {
        self.sysfs_root.join("sys/class/powercap")
    }

    /// `/proc`
    pub fn proc_dir(&self) -> PathBuf {
        self.sysfs_root.join("proc")
    }

    /// `/dev/cpu/<N>/msr`
    pub fn msr_file(&self, virtual_core: u32) -> PathBuf {
        self.sysfs_root
            .join("dev/cpu")
            .join(virtual_core.to_string())
            .join("msr")
    }

    pub fn root(&self) -> &Path {
        &self.sysfs_root
    }
}
