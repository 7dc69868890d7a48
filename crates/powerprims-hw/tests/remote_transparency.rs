use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use powerprims_hw::energy::Energy;
use powerprims_hw::task::{Task, TaskRef};
use powerprims_hw::topology::Topology;
use powerprims_hw::{energy, task, topology, HwError, LocalConfig, ModuleSet};
use powerprims_rpc::{connect, RpcError, Supervisor};

static NEXT_ROOT: AtomicU64 = AtomicU64::new(0);

/// One package with two virtual cores, a RAPL zone and one process.
struct Machine {
    root: PathBuf,
}

impl Machine {
    fn new(tag: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "powerprims-it-{tag}-{}-{}",
            std::process::id(),
            NEXT_ROOT.fetch_add(1, Ordering::Relaxed)
        ));
        let machine = Self { root };
        machine.write("sys/devices/system/cpu/present", "0-1\n");
        for vc in 0..2 {
            let dir = format!("sys/devices/system/cpu/cpu{vc}/topology");
            machine.write(&format!("{dir}/physical_package_id"), "0\n");
            machine.write(&format!("{dir}/core_id"), &format!("{vc}\n"));
        }
        machine.write(
            "proc/cpuinfo",
            "processor\t: 0\nvendor_id\t: AuthenticAMD\ncpu family\t: 23\nmodel\t\t: 1\n\n\
             processor\t: 1\nvendor_id\t: AuthenticAMD\ncpu family\t: 23\nmodel\t\t: 1\n",
        );
        machine.write("proc/42/stat", &stat_line(42, 5));
        machine.write("proc/42/task/42/stat", &stat_line(42, 5));

        let zone = "sys/class/powercap/intel-rapl:0";
        machine.write(&format!("{zone}/name"), "package-0\n");
        machine.write(&format!("{zone}/energy_uj"), "1000\n");
        machine.write(&format!("{zone}/max_energy_range_uj"), "100000000\n");
        machine
    }

    fn write(&self, rel: &str, contents: &str) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn set_energy(&self, microjoules: u64) {
        self.write(
            "sys/class/powercap/intel-rapl:0/energy_uj",
            &format!("{microjoules}\n"),
        );
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn config(&self) -> LocalConfig {
        LocalConfig::with_sysfs_root(self.root())
    }

    fn serve(&self, modules: ModuleSet) -> String {
        self.serve_with(modules, self.config())
    }

    fn serve_with(&self, modules: ModuleSet, config: LocalConfig) -> String {
        let supervisor = Supervisor::bind_addr(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            modules.table_factory(config),
        )
        .unwrap();
        let addr = format!("127.0.0.1:{}", supervisor.local_addr().port());
        thread::spawn(move || {
            let _ = supervisor.serve();
        });
        addr
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn stat_line(pid: u32, nice: i32) -> String {
    let mut fields = vec!["0".to_string(); 40];
    fields[0] = "R".into();
    fields[16] = nice.to_string();
    fields[36] = "1".into();
    format!("{pid} (worker) {}\n", fields.join(" "))
}

#[test]
fn inactive_module_fails_and_the_channel_keeps_working() {
    let machine = Machine::new("inactive");
    let addr = machine.serve(ModuleSet {
        topology: true,
        ..ModuleSet::default()
    });
    let channel = connect(&addr).unwrap();

    match energy::remote(channel.clone()) {
        Err(HwError::Rpc(RpcError::Remote(reason))) => {
            assert!(reason.contains("energy not activated"), "{reason}")
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("energy should not be served"),
    }

    let remote = topology::remote(channel).unwrap();
    assert_eq!(remote.layout().virtual_cores(), vec![0, 1]);
    assert_eq!(remote.cpu_vendor_id(0).unwrap(), "AuthenticAMD");
}

#[test]
fn remote_facades_match_local_ones() {
    let machine = Machine::new("mirror");
    let addr = machine.serve(ModuleSet {
        topology: true,
        energy: true,
        task: true,
        ..ModuleSet::default()
    });
    let config = LocalConfig::with_sysfs_root(machine.root());
    let channel = connect(&addr).unwrap();

    let local_topology = topology::local(&config).unwrap();
    let remote_topology = topology::remote(channel.clone()).unwrap();
    assert_eq!(remote_topology.layout(), local_topology.layout());
    assert_eq!(
        remote_topology.cpu_family(0).unwrap(),
        local_topology.cpu_family(0).unwrap()
    );
    topology::release(remote_topology);

    let remote_energy = energy::remote(channel.clone()).unwrap();
    assert_eq!(remote_energy.cpus(), &[0]);
    assert!(!remote_energy.has_joules_dram());
    machine.write("sys/class/powercap/intel-rapl:0/energy_uj", "2501000\n");
    assert_eq!(remote_energy.joules_cpu_all().unwrap(), 2.5);
    assert_eq!(remote_energy.joules_dram(0).unwrap(), 0.0);

    let remote_task = task::remote(channel).unwrap();
    assert_eq!(remote_task.active_processes().unwrap(), vec![42]);
    assert_eq!(remote_task.priority(TaskRef::Process(42)).unwrap(), Some(15));
    assert_eq!(remote_task.virtual_core(TaskRef::Process(42)).unwrap(), Some(1));
    assert!(!remote_task.set_priority(TaskRef::Process(42), 41).unwrap());
}

#[test]
fn each_client_gets_its_own_channel() {
    let machine = Machine::new("clients");
    let addr = machine.serve(ModuleSet {
        topology: true,
        ..ModuleSet::default()
    });

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let addr = addr.clone();
            thread::spawn(move || {
                let remote = topology::remote(connect(&addr).unwrap()).unwrap();
                for _ in 0..20 {
                    assert_eq!(remote.cpu_model(0).unwrap(), "1");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn clients_do_not_share_module_state() {
    let machine = Machine::new("isolation");
    let addr = machine.serve(ModuleSet {
        topology: true,
        energy: true,
        ..ModuleSet::default()
    });
    let first = energy::remote(connect(&addr).unwrap()).unwrap();
    let second = energy::remote(connect(&addr).unwrap()).unwrap();

    machine.set_energy(2_501_000);
    assert_eq!(first.joules_cpu(0).unwrap(), 2.5);

    second.reset().unwrap();
    assert_eq!(second.joules_cpu(0).unwrap(), 0.0);
    assert_eq!(first.joules_cpu(0).unwrap(), 2.5);
}

#[test]
fn served_counters_survive_repeated_wraps() {
    let machine = Machine::new("wraps");
    let config = machine
        .config()
        .with_energy_refresh_interval(Duration::from_millis(10));
    let addr = machine.serve_with(
        ModuleSet {
            topology: true,
            energy: true,
            ..ModuleSet::default()
        },
        config,
    );
    let remote = energy::remote(connect(&addr).unwrap()).unwrap();

    // The zone wraps at 100 J; nothing reads it remotely in between.
    for raw in [90_000_000, 10_000_000, 90_000_000, 20_000_000] {
        machine.set_energy(raw);
        thread::sleep(Duration::from_millis(200));
    }

    let joules = remote.joules_cpu(0).unwrap();
    assert!((joules - 219.999).abs() < 1e-6, "{joules}");
}
