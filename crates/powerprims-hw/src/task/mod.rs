//! Scheduling control of processes and threads.

mod handler;
mod local;
pub mod messages;
mod remote;

use std::fmt;
use std::sync::Arc;

use powerprims_rpc::Channel;
use serde::{Deserialize, Serialize};

use crate::config::LocalConfig;
use crate::error::Result;
use crate::topology::{CpuId, PhysicalCoreId, TopologyMap, VirtualCoreId};

pub use handler::TaskHandler;
pub use local::LocalTask;
pub use remote::RemoteTask;

/// Capability domain of the task messages.
pub const DOMAIN: &str = "task";

/// Kernel process or thread id.
pub type TaskId = u32;

/// Lowest scheduling priority (nice 20).
pub const MIN_PRIORITY: u32 = 0;
/// Highest scheduling priority (nice -20).
pub const MAX_PRIORITY: u32 = 40;

/// A whole process or a single thread of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskRef {
    Process(TaskId),
    Thread { pid: TaskId, tid: TaskId },
}

impl TaskRef {
    pub fn pid(&self) -> TaskId {
        match *self {
            TaskRef::Process(pid) | TaskRef::Thread { pid, .. } => pid,
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskRef::Process(pid) => write!(f, "process {pid}"),
            TaskRef::Thread { pid, tid } => write!(f, "thread {pid}/{tid}"),
        }
    }
}

/// Task operations, identical for local and remote machines.
///
/// Operations on a task that has exited report `false` or `None` rather
/// than an error.
pub trait Task: Send + Sync {
    /// Ids of every running process.
    fn active_processes(&self) -> Result<Vec<TaskId>>;

    /// Thread ids of `pid`; empty once the process has exited.
    fn active_threads(&self, pid: TaskId) -> Result<Vec<TaskId>>;

    fn is_active(&self, task: TaskRef) -> Result<bool>;

    /// Priority in `0..=40`, where 40 is the most favourable.
    fn priority(&self, task: TaskRef) -> Result<Option<u32>>;

    /// Returns `false` for out of range priorities or a refused change.
    fn set_priority(&self, task: TaskRef, priority: u32) -> Result<bool>;

    /// Virtual core the task last ran on.
    fn virtual_core(&self, task: TaskRef) -> Result<Option<VirtualCoreId>>;

    /// Virtual cores the task may run on.
    fn affinity(&self, task: TaskRef) -> Result<Option<Vec<VirtualCoreId>>>;

    /// Restrict the task to `virtual_cores`. Moving a process moves all its
    /// threads.
    fn move_to(&self, task: TaskRef, virtual_cores: &[VirtualCoreId]) -> Result<bool>;

    /// Percentage of one core the task used since the last reset, or since
    /// it started if never reset. May exceed 100 for multithreaded
    /// processes.
    fn core_usage(&self, task: TaskRef) -> Result<Option<f64>>;

    /// Restart the core usage measurement of the task.
    fn reset_core_usage(&self, task: TaskRef) -> Result<bool>;

    fn move_to_virtual_core(&self, task: TaskRef, virtual_core: VirtualCoreId) -> Result<bool> {
        self.move_to(task, &[virtual_core])
    }

    /// Restrict the task to the virtual cores of `cpu` in `layout`.
    fn move_to_cpu(&self, task: TaskRef, layout: &TopologyMap, cpu: CpuId) -> Result<bool> {
        self.move_to(task, &layout.virtual_cores_of_cpu(cpu))
    }

    /// Restrict the task to the hyperthreads of one physical core.
    fn move_to_physical_core(
        &self,
        task: TaskRef,
        layout: &TopologyMap,
        cpu: CpuId,
        physical_core: PhysicalCoreId,
    ) -> Result<bool> {
        self.move_to(task, &layout.virtual_cores_of_physical_core(cpu, physical_core))
    }

    /// Every thread of `pid` as a task reference.
    fn threads_of(&self, pid: TaskId) -> Result<Vec<TaskRef>> {
        Ok(self
            .active_threads(pid)?
            .into_iter()
            .map(|tid| TaskRef::Thread { pid, tid })
            .collect())
    }
}

/// Task control on this machine.
pub fn local(config: &LocalConfig) -> Result<Box<dyn Task>> {
    Ok(Box::new(LocalTask::new(config)?))
}

/// Task control on the machine behind `channel`.
pub fn remote(channel: Arc<Channel>) -> Result<Box<dyn Task>> {
    Ok(Box::new(RemoteTask::new(channel)))
}

/// Release a façade obtained from [`local`] or [`remote`].
pub fn release(task: Box<dyn Task>) {
    drop(task);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_refs_display_and_pid() {
        assert_eq!(TaskRef::Process(7).to_string(), "process 7");
        let thread = TaskRef::Thread { pid: 7, tid: 9 };
        assert_eq!(thread.to_string(), "thread 7/9");
        assert_eq!(thread.pid(), 7);
    }
}
