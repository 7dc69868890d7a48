//! Which hardware modules a server exposes.

use std::sync::Arc;

use powerprims_rpc::{DispatchTable, RpcError};
use tracing::{debug, warn};

use crate::config::LocalConfig;
use crate::cpufreq::{CpuFreqHandler, LocalCpuFreq};
use crate::energy::{EnergyHandler, LocalEnergy};
use crate::error::{HwError, Result};
use crate::task::{LocalTask, TaskHandler};
use crate::topology::{LocalTopology, TopologyHandler};

/// Modules activated on a server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModuleSet {
    pub topology: bool,
    pub cpufreq: bool,
    pub energy: bool,
    pub task: bool,
}

impl ModuleSet {
    /// Every module.
    pub fn all() -> Self {
        Self {
            topology: true,
            cpufreq: true,
            energy: true,
            task: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.topology || self.cpufreq || self.energy || self.task)
    }

    /// Names of the activated modules' capability domains.
    pub fn domains(&self) -> Vec<&'static str> {
        [
            (self.topology, crate::topology::DOMAIN),
            (self.cpufreq, crate::cpufreq::DOMAIN),
            (self.energy, crate::energy::DOMAIN),
            (self.task, crate::task::DOMAIN),
        ]
        .into_iter()
        .filter_map(|(on, domain)| on.then_some(domain))
        .collect()
    }

    /// Frequency and energy control are located through the topology.
    pub fn validate(&self) -> Result<()> {
        for (on, module) in [
            (self.cpufreq, crate::cpufreq::DOMAIN),
            (self.energy, crate::energy::DOMAIN),
        ] {
            if on && !self.topology {
                return Err(HwError::MissingDependency {
                    module,
                    requires: crate::topology::DOMAIN,
                });
            }
        }
        Ok(())
    }

    /// Open the local façades of every activated module and register their
    /// handlers.
    pub fn build_dispatch_table(&self, config: &LocalConfig) -> Result<DispatchTable> {
        self.validate()?;
        let mut table = DispatchTable::new();

        if self.topology {
            let topology = LocalTopology::new(config)?;
            if self.cpufreq {
                let cpufreq = LocalCpuFreq::with_topology(config, &topology)?;
                table.register(Arc::new(CpuFreqHandler::new(Box::new(cpufreq))))?;
            }
            if self.energy {
                let energy = LocalEnergy::with_topology(config, &topology)?;
                table.register(Arc::new(EnergyHandler::new(Box::new(energy))))?;
            }
            table.register(Arc::new(TopologyHandler::new(Box::new(topology))))?;
        }
        if self.task {
            let task = LocalTask::new(config)?;
            table.register(Arc::new(TaskHandler::new(Box::new(task))))?;
        }

        debug!(domains = ?table.domains(), root = %config.root().display(), "modules activated");
        Ok(table)
    }

    /// Table factory for a [`powerprims_rpc::Supervisor`]: every connection
    /// opens its own local façades.
    pub fn table_factory(
        self,
        config: LocalConfig,
    ) -> impl Fn() -> powerprims_rpc::Result<DispatchTable> + Send + Sync + 'static {
        move || {
            self.build_dispatch_table(&config).map_err(|err| {
                warn!(error = %err, "module setup failed");
                RpcError::TableSetup(err.to_string())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTree;

    #[test]
    fn dependencies_on_topology() {
        let energy_only = ModuleSet {
            energy: true,
            ..ModuleSet::default()
        };
        assert!(matches!(
            energy_only.validate(),
            Err(HwError::MissingDependency {
                module: "energy",
                requires: "topology"
            })
        ));

        let task_only = ModuleSet {
            task: true,
            ..ModuleSet::default()
        };
        assert!(task_only.validate().is_ok());
        assert!(ModuleSet::all().validate().is_ok());
        assert!(ModuleSet::default().is_empty());
    }

    #[test]
    fn table_holds_the_activated_domains() {
        let tree = FakeTree::with_rapl("modules-table");
        tree.write("proc/1/stat", "1 (init) S 1\n");
        let modules = ModuleSet {
            topology: true,
            energy: true,
            task: true,
            ..ModuleSet::default()
        };

        let table = modules.build_dispatch_table(&tree.config()).unwrap();
        assert_eq!(table.domains(), vec!["energy", "task", "topology"]);
        assert_eq!(table.domains(), {
            let mut domains = modules.domains();
            domains.sort_unstable();
            domains
        });
    }

    #[test]
    fn invalid_sets_build_nothing() {
        let tree = FakeTree::with_rapl("modules-invalid");
        let modules = ModuleSet {
            cpufreq: true,
            ..ModuleSet::default()
        };
        assert!(modules.build_dispatch_table(&tree.config()).is_err());

        let factory = modules.table_factory(tree.config());
        assert!(matches!(factory(), Err(RpcError::TableSetup(_))));
    }

    #[test]
    fn factory_builds_independent_tables() {
        let tree = FakeTree::with_rapl("modules-factory");
        let modules = ModuleSet {
            topology: true,
            energy: true,
            ..ModuleSet::default()
        };
        let factory = modules.table_factory(tree.config());

        let first = factory().unwrap();
        let second = factory().unwrap();
        assert_eq!(first.domains(), vec!["energy", "topology"]);
        assert_eq!(first.domains(), second.domains());
    }
}
