//! Topology requests and responses.

use powerprims_rpc::declare_messages;
use serde::{Deserialize, Serialize};

use super::{CpuId, IdleLevelInfo, VirtualCoreCoordinates, VirtualCoreId};
use crate::wire::request_enum;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetLayout;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetLayoutRes {
    pub coordinates: Vec<VirtualCoreCoordinates>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCpuVendorId {
    pub cpu: CpuId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCpuFamily {
    pub cpu: CpuId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCpuModel {
    pub cpu: CpuId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuInfoRes {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsHotPluggable {
    pub virtual_core: VirtualCoreId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsHotPlugged {
    pub virtual_core: VirtualCoreId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotPlug {
    pub virtual_core: VirtualCoreId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotUnplug {
    pub virtual_core: VirtualCoreId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetIdleLevels {
    pub virtual_core: VirtualCoreId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleLevelsRes {
    pub levels: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetIdleLevel {
    pub virtual_core: VirtualCoreId,
    pub level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleLevelRes {
    pub info: IdleLevelInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetIdleLevelEnabled {
    pub virtual_core: VirtualCoreId,
    pub level: u32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetIdleLevel {
    pub virtual_core: VirtualCoreId,
    pub level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaximizeUtilization {
    pub virtual_cores: Vec<VirtualCoreId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetUtilization {
    pub virtual_cores: Vec<VirtualCoreId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetIdleTime {
    pub virtual_core: VirtualCoreId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleTimeRes {
    pub micros: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetIdleTime {
    pub virtual_core: VirtualCoreId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HasClockModulation {
    pub virtual_core: VirtualCoreId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetClockModulationValues {
    pub virtual_core: VirtualCoreId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockModulationValuesRes {
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetClockModulation {
    pub virtual_core: VirtualCoreId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockModulationRes {
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetClockModulation {
    pub virtual_core: VirtualCoreId,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoolRes {
    pub value: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Done;

declare_messages!(
    "topology" =>
    GetLayout, GetLayoutRes,
    GetCpuVendorId, GetCpuFamily, GetCpuModel, CpuInfoRes,
    IsHotPluggable, IsHotPlugged, HotPlug, HotUnplug,
    GetIdleLevels, IdleLevelsRes, GetIdleLevel, IdleLevelRes,
    SetIdleLevelEnabled, ResetIdleLevel,
    MaximizeUtilization, ResetUtilization,
    GetIdleTime, IdleTimeRes, ResetIdleTime,
    HasClockModulation, GetClockModulationValues, ClockModulationValuesRes,
    GetClockModulation, ClockModulationRes, SetClockModulation,
    BoolRes, Done,
);

request_enum! {
    /// Every request the topology handler serves.
    pub enum TopologyRequest {
        GetLayout,
        GetCpuVendorId,
        GetCpuFamily,
        GetCpuModel,
        IsHotPluggable,
        IsHotPlugged,
        HotPlug,
        HotUnplug,
        GetIdleLevels,
        GetIdleLevel,
        SetIdleLevelEnabled,
        ResetIdleLevel,
        MaximizeUtilization,
        ResetUtilization,
        GetIdleTime,
        ResetIdleTime,
        HasClockModulation,
        GetClockModulationValues,
        GetClockModulation,
        SetClockModulation,
    }
}

#[cfg(test)]
mod tests {
    use powerprims_rpc::{encode_message, shape_of, Message};

    use super::*;
    use crate::topology::DOMAIN;

    #[test]
    fn identifiers_live_in_the_topology_domain() {
        for type_id in [GetLayout::TYPE_ID, IdleLevelRes::TYPE_ID, Done::TYPE_ID] {
            assert!(type_id.starts_with(&format!("powerprims.{DOMAIN}.")), "{type_id}");
        }
    }

    #[test]
    fn decodes_the_variant_named_by_the_shape() {
        let envelope = encode_message(&GetIdleLevel {
            virtual_core: 3,
            level: 2,
        })
        .unwrap();
        let request = TopologyRequest::decode(shape_of::<GetIdleLevel>(), &envelope.payload)
            .unwrap()
            .unwrap();
        assert_eq!(request.shape(), "GetIdleLevel");
        assert!(matches!(
            request,
            TopologyRequest::GetIdleLevel(GetIdleLevel {
                virtual_core: 3,
                level: 2
            })
        ));
    }

    #[test]
    fn responses_are_not_requests() {
        assert!(TopologyRequest::decode("GetLayoutRes", &[]).unwrap().is_none());
        assert!(TopologyRequest::decode("Nope", &[]).unwrap().is_none());
    }
}
