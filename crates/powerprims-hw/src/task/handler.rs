use powerprims_rpc::{Envelope, MessageHandler};

use super::messages::*;
use super::{Task, DOMAIN};
use crate::error::Result;
use crate::wire::{handler_error, reply};

/// Serves task requests from a local façade.
pub struct TaskHandler {
    task: Box<dyn Task>,
}

impl TaskHandler {
    pub fn new(task: Box<dyn Task>) -> Self {
        Self { task }
    }

    fn serve(&self, request: TaskRequest) -> Result<Envelope> {
        let task = &*self.task;
        match request {
            TaskRequest::GetActiveProcesses(GetActiveProcesses) => reply(&TaskIdsRes {
                ids: task.active_processes()?,
            }),
            TaskRequest::GetActiveThreads(req) => reply(&TaskIdsRes {
                ids: task.active_threads(req.pid)?,
            }),
            TaskRequest::IsActive(req) => reply(&ResultRes {
                result: task.is_active(req.task)?,
            }),
            TaskRequest::GetPriority(req) => reply(&PriorityRes {
                priority: task.priority(req.task)?,
            }),
            TaskRequest::SetPriority(req) => reply(&ResultRes {
                result: task.set_priority(req.task, req.priority)?,
            }),
            TaskRequest::GetVirtualCore(req) => reply(&VirtualCoreRes {
                virtual_core: task.virtual_core(req.task)?,
            }),
            TaskRequest::GetAffinity(req) => reply(&AffinityRes {
                virtual_cores: task.affinity(req.task)?,
            }),
            TaskRequest::MoveTo(req) => reply(&ResultRes {
                result: task.move_to(req.task, &req.virtual_cores)?,
            }),
            TaskRequest::GetCoreUsage(req) => reply(&CoreUsageRes {
                usage: task.core_usage(req.task)?,
            }),
            TaskRequest::ResetCoreUsage(req) => reply(&ResultRes {
                result: task.reset_core_usage(req.task)?,
            }),
        }
    }
}

impl MessageHandler for TaskHandler {
    fn domain(&self) -> &'static str {
        DOMAIN
    }

    fn handle(&self, shape: &str, payload: &[u8]) -> powerprims_rpc::Result<Option<Envelope>> {
        let Some(request) = TaskRequest::decode(shape, payload)? else {
            return Ok(None);
        };
        self.serve(request)
            .map(Some)
            .map_err(|err| handler_error(DOMAIN, shape, err))
    }
}
