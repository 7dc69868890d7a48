//! Frequency requests and responses.

use powerprims_rpc::declare_messages;
use serde::{Deserialize, Serialize};

use super::{
    Domain, DomainId, Frequency, Governor, Voltage, VoltageSampling, VoltageTableEntry,
};
use crate::wire::request_enum;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDomains;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainsRes {
    pub domains: Vec<Domain>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAvailableFrequencies {
    pub domain: DomainId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequenciesRes {
    pub frequencies: Vec<Frequency>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAvailableGovernors {
    pub domain: DomainId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorsRes {
    pub governors: Vec<Governor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCurrentFrequency {
    pub domain: DomainId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCurrentFrequencyUserspace {
    pub domain: DomainId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyRes {
    pub frequency: Frequency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetFrequencyUserspace {
    pub domain: DomainId,
    pub frequency: Frequency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCurrentGovernor {
    pub domain: DomainId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorRes {
    pub governor: Option<Governor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetGovernor {
    pub domain: DomainId,
    pub governor: Governor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetHardwareFrequencyBounds {
    pub domain: DomainId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundsRes {
    pub lower: Frequency,
    pub upper: Frequency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCurrentGovernorBounds {
    pub domain: DomainId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionalBoundsRes {
    pub bounds: Option<(Frequency, Frequency)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetGovernorBounds {
    pub domain: DomainId,
    pub lower: Frequency,
    pub upper: Frequency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTransitionLatency {
    pub domain: DomainId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyRes {
    pub latency: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCurrentVoltage {
    pub domain: DomainId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoltageRes {
    pub voltage: Voltage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetVoltageTable {
    pub domain: DomainId,
    pub only_physical_cores: bool,
    pub sampling: VoltageSampling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoltageTableRes {
    pub entries: Vec<VoltageTableEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsBoostingSupported;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsBoostingEnabled;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnableBoosting;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisableBoosting;

/// Outcome of operations reporting success as a boolean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRes {
    pub result: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Done;

declare_messages!(
    "cpufreq" =>
    GetDomains, DomainsRes,
    GetAvailableFrequencies, FrequenciesRes,
    GetAvailableGovernors, GovernorsRes,
    GetCurrentFrequency, GetCurrentFrequencyUserspace, FrequencyRes,
    SetFrequencyUserspace,
    GetCurrentGovernor, GovernorRes, SetGovernor,
    GetHardwareFrequencyBounds, BoundsRes,
    GetCurrentGovernorBounds, OptionalBoundsRes, SetGovernorBounds,
    GetTransitionLatency, LatencyRes,
    GetCurrentVoltage, VoltageRes, GetVoltageTable, VoltageTableRes,
    IsBoostingSupported, IsBoostingEnabled, EnableBoosting, DisableBoosting,
    ResultRes, Done,
);

request_enum! {
    /// Every request the frequency handler serves.
    pub enum CpuFreqRequest {
        GetDomains,
        GetAvailableFrequencies,
        GetAvailableGovernors,
        GetCurrentFrequency,
        GetCurrentFrequencyUserspace,
        SetFrequencyUserspace,
        GetCurrentGovernor,
        SetGovernor,
        GetHardwareFrequencyBounds,
        GetCurrentGovernorBounds,
        SetGovernorBounds,
        GetTransitionLatency,
        GetCurrentVoltage,
        GetVoltageTable,
        IsBoostingSupported,
        IsBoostingEnabled,
        EnableBoosting,
        DisableBoosting,
    }
}
