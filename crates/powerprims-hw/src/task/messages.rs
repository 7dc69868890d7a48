//! Task requests and responses.

use powerprims_rpc::declare_messages;
use serde::{Deserialize, Serialize};

use super::{TaskId, TaskRef};
use crate::topology::VirtualCoreId;
use crate::wire::request_enum;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetActiveProcesses;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetActiveThreads {
    pub pid: TaskId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskIdsRes {
    pub ids: Vec<TaskId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsActive {
    pub task: TaskRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPriority {
    pub task: TaskRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityRes {
    pub priority: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPriority {
    pub task: TaskRef,
    pub priority: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetVirtualCore {
    pub task: TaskRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualCoreRes {
    pub virtual_core: Option<VirtualCoreId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAffinity {
    pub task: TaskRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffinityRes {
    pub virtual_cores: Option<Vec<VirtualCoreId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveTo {
    pub task: TaskRef,
    pub virtual_cores: Vec<VirtualCoreId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCoreUsage {
    pub task: TaskRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreUsageRes {
    pub usage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetCoreUsage {
    pub task: TaskRef,
}

/// Outcome of operations reporting success as a boolean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRes {
    pub result: bool,
}

declare_messages!(
    "task" =>
    GetActiveProcesses, GetActiveThreads, TaskIdsRes,
    IsActive,
    GetPriority, PriorityRes, SetPriority,
    GetVirtualCore, VirtualCoreRes,
    GetAffinity, AffinityRes,
    MoveTo,
    GetCoreUsage, CoreUsageRes, ResetCoreUsage,
    ResultRes,
);

request_enum! {
    /// Every request the task handler serves.
    pub enum TaskRequest {
        GetActiveProcesses,
        GetActiveThreads,
        IsActive,
        GetPriority,
        SetPriority,
        GetVirtualCore,
        GetAffinity,
        MoveTo,
        GetCoreUsage,
        ResetCoreUsage,
    }
}
