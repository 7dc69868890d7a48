use std::sync::Arc;

use powerprims_rpc::Channel;

use super::messages::*;
use super::{Task, TaskId, TaskRef};
use crate::error::Result;
use crate::topology::VirtualCoreId;

/// Task control of a remote machine.
#[derive(Debug)]
pub struct RemoteTask {
    channel: Arc<Channel>,
}

impl RemoteTask {
    pub fn new(channel: Arc<Channel>) -> Self {
        Self { channel }
    }

    fn call_result<Req: powerprims_rpc::Message>(&self, request: &Req) -> Result<bool> {
        let res: ResultRes = self.channel.remote_call(request)?;
        Ok(res.result)
    }
}

impl Task for RemoteTask {
    fn active_processes(&self) -> Result<Vec<TaskId>> {
        let res: TaskIdsRes = self.channel.remote_call(&GetActiveProcesses)?;
        Ok(res.ids)
    }

    fn active_threads(&self, pid: TaskId) -> Result<Vec<TaskId>> {
        let res: TaskIdsRes = self.channel.remote_call(&GetActiveThreads { pid })?;
        Ok(res.ids)
    }

    fn is_active(&self, task: TaskRef) -> Result<bool> {
        self.call_result(&IsActive { task })
    }

    fn priority(&self, task: TaskRef) -> Result<Option<u32>> {
        let res: PriorityRes = self.channel.remote_call(&GetPriority { task })?;
        Ok(res.priority)
    }

    fn set_priority(&self, task: TaskRef, priority: u32) -> Result<bool> {
        self.call_result(&SetPriority { task, priority })
    }

    fn virtual_core(&self, task: TaskRef) -> Result<Option<VirtualCoreId>> {
        let res: VirtualCoreRes = self.channel.remote_call(&GetVirtualCore { task })?;
        Ok(res.virtual_core)
    }

    fn affinity(&self, task: TaskRef) -> Result<Option<Vec<VirtualCoreId>>> {
        let res: AffinityRes = self.channel.remote_call(&GetAffinity { task })?;
        Ok(res.virtual_cores)
    }

    fn move_to(&self, task: TaskRef, virtual_cores: &[VirtualCoreId]) -> Result<bool> {
        self.call_result(&MoveTo {
            task,
            virtual_cores: virtual_cores.to_vec(),
        })
    }

    fn core_usage(&self, task: TaskRef) -> Result<Option<f64>> {
        let res: CoreUsageRes = self.channel.remote_call(&GetCoreUsage { task })?;
        Ok(res.usage)
    }

    fn reset_core_usage(&self, task: TaskRef) -> Result<bool> {
        self.call_result(&ResetCoreUsage { task })
    }
}
