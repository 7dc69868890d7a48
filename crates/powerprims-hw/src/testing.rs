//! Fake sysfs/procfs trees for local façade tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::LocalConfig;

/// `max_energy_range_uj` of the fake RAPL zones.
pub(crate) const RAPL_RANGE: u64 = 262_143_328_850;

static NEXT_TREE: AtomicU64 = AtomicU64::new(0);

/// A temporary directory removed on drop.
pub(crate) struct FakeTree {
    root: PathBuf,
}

impl FakeTree {
    pub(crate) fn new(tag: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "powerprims-{tag}-{}-{}",
            std::process::id(),
            NEXT_TREE.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).expect("fake tree root should be creatable");
        Self { root }
    }

    pub(crate) fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub(crate) fn write(&self, rel: &str, contents: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("fake tree dir should be creatable");
        }
        fs::write(&path, contents).expect("fake tree file should be writable");
    }

    pub(crate) fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).expect("fake tree file should be readable")
    }

    pub(crate) fn config(&self) -> LocalConfig {
        LocalConfig::with_sysfs_root(&self.root)
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Two packages, two physical cores each, two hyperthreads per core:
    /// virtual cores 0..8, package = vc / 4, core = (vc / 2) % 2.
    pub(crate) fn with_two_packages(tag: &str) -> Self {
        let tree = Self::new(tag);
        tree.write("sys/devices/system/cpu/present", "0-7\n");
        for vc in 0..8u32 {
            let base = format!("sys/devices/system/cpu/cpu{vc}");
            tree.write(
                &format!("{base}/topology/physical_package_id"),
                &format!("{}\n", vc / 4),
            );
            tree.write(&format!("{base}/topology/core_id"), &format!("{}\n", (vc / 2) % 2));
            if vc != 0 {
                tree.write(&format!("{base}/online"), "1\n");
            }
        }
        tree.write(
            "proc/cpuinfo",
            "processor\t: 0\nvendor_id\t: GenuineIntel\ncpu family\t: 6\nmodel\t\t: 79\nmodel name\t: Intel(R) Xeon(R)\n\n\
             processor\t: 4\nvendor_id\t: GenuineIntel\ncpu family\t: 6\nmodel\t\t: 85\nmodel name\t: Intel(R) Xeon(R)\n\n",
        );
        tree
    }

    /// [`with_two_packages`](Self::with_two_packages) plus a RAPL zone per
    /// package with core and dram sub-zones. Only package 0 has an uncore
    /// zone, and a `psys` zone is present to be ignored.
    pub(crate) fn with_rapl(tag: &str) -> Self {
        let tree = Self::with_two_packages(tag);
        for package in 0..2u32 {
            let zone = format!("sys/class/powercap/intel-rapl:{package}");
            tree.write(&format!("{zone}/name"), &format!("package-{package}\n"));
            tree.write(&format!("{zone}/energy_uj"), "1000000\n");
            tree.write(&format!("{zone}/max_energy_range_uj"), &format!("{RAPL_RANGE}\n"));
            let mut subzones = vec!["core", "dram"];
            if package == 0 {
                subzones.push("uncore");
            }
            for (i, name) in subzones.into_iter().enumerate() {
                let sub = format!("{zone}/intel-rapl:{package}:{i}");
                tree.write(&format!("{sub}/name"), &format!("{name}\n"));
                tree.write(&format!("{sub}/energy_uj"), "0\n");
                tree.write(&format!("{sub}/max_energy_range_uj"), &format!("{RAPL_RANGE}\n"));
            }
        }
        tree.write("sys/class/powercap/intel-rapl:2/name", "psys\n");
        tree
    }

    /// A zeroed register file standing in for `/dev/cpu/<vc>/msr`.
    pub(crate) fn create_msr(&self, vc: u32) {
        let rel = format!("dev/cpu/{vc}/msr");
        self.write(&rel, "");
        let file = fs::OpenOptions::new()
            .write(true)
            .open(self.path(&rel))
            .expect("fake msr should be openable");
        file.set_len(0x1000).expect("fake msr should be resizable");
    }

    /// Raw register value of a fake msr file.
    #[cfg(unix)]
    pub(crate) fn msr(&self, vc: u32, register: u64) -> u64 {
        use std::os::unix::fs::FileExt;
        let file = fs::File::open(self.path(&format!("dev/cpu/{vc}/msr")))
            .expect("fake msr should be readable");
        let mut value = [0u8; 8];
        file.read_exact_at(&mut value, register)
            .expect("fake msr should hold the register");
        u64::from_le_bytes(value)
    }

    /// Overwrite a register of a fake msr file.
    #[cfg(unix)]
    pub(crate) fn set_msr(&self, vc: u32, register: u64, value: u64) {
        use std::os::unix::fs::FileExt;
        let file = fs::OpenOptions::new()
            .write(true)
            .open(self.path(&format!("dev/cpu/{vc}/msr")))
            .expect("fake msr should be writable");
        file.write_all_at(&value.to_le_bytes(), register)
            .expect("fake msr should accept the register");
    }

    /// Set the raw counter of a powercap zone, e.g. `intel-rapl:0/intel-rapl:0:1`.
    pub(crate) fn set_energy(&self, zone: &str, microjoules: u64) {
        self.write(
            &format!("sys/class/powercap/{zone}/energy_uj"),
            &format!("{microjoules}\n"),
        );
    }
}

impl Drop for FakeTree {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}
