use powerprims_rpc::{Envelope, MessageHandler};

use super::messages::*;
use super::{Topology, DOMAIN};
use crate::error::Result;
use crate::wire::{handler_error, reply};

/// Serves topology requests from a local façade.
pub struct TopologyHandler {
    topology: Box<dyn Topology>,
}

impl TopologyHandler {
    pub fn new(topology: Box<dyn Topology>) -> Self {
        Self { topology }
    }

    fn serve(&self, request: TopologyRequest) -> Result<Envelope> {
        let topology = &*self.topology;
        match request {
            TopologyRequest::GetLayout(GetLayout) => reply(&GetLayoutRes {
                coordinates: topology.layout().coordinates().to_vec(),
            }),
            TopologyRequest::GetCpuVendorId(req) => reply(&CpuInfoRes {
                value: topology.cpu_vendor_id(req.cpu)?,
            }),
            TopologyRequest::GetCpuFamily(req) => reply(&CpuInfoRes {
                value: topology.cpu_family(req.cpu)?,
            }),
            TopologyRequest::GetCpuModel(req) => reply(&CpuInfoRes {
                value: topology.cpu_model(req.cpu)?,
            }),
            TopologyRequest::IsHotPluggable(req) => reply(&BoolRes {
                value: topology.is_hot_pluggable(req.virtual_core)?,
            }),
            TopologyRequest::IsHotPlugged(req) => reply(&BoolRes {
                value: topology.is_hot_plugged(req.virtual_core)?,
            }),
            TopologyRequest::HotPlug(req) => {
                topology.hot_plug(req.virtual_core)?;
                reply(&Done)
            }
            TopologyRequest::HotUnplug(req) => {
                topology.hot_unplug(req.virtual_core)?;
                reply(&Done)
            }
            TopologyRequest::GetIdleLevels(req) => reply(&IdleLevelsRes {
                levels: topology.idle_levels(req.virtual_core)?,
            }),
            TopologyRequest::GetIdleLevel(req) => reply(&IdleLevelRes {
                info: topology.idle_level(req.virtual_core, req.level)?,
            }),
            TopologyRequest::SetIdleLevelEnabled(req) => reply(&BoolRes {
                value: topology.set_idle_level_enabled(req.virtual_core, req.level, req.enabled)?,
            }),
            TopologyRequest::ResetIdleLevel(req) => {
                topology.reset_idle_level(req.virtual_core, req.level)?;
                reply(&Done)
            }
            TopologyRequest::MaximizeUtilization(req) => {
                topology.maximize_utilization(&req.virtual_cores)?;
                reply(&Done)
            }
            TopologyRequest::ResetUtilization(req) => {
                topology.reset_utilization(&req.virtual_cores)?;
                reply(&Done)
            }
            TopologyRequest::GetIdleTime(req) => reply(&IdleTimeRes {
                micros: topology.idle_time(req.virtual_core)?,
            }),
            TopologyRequest::ResetIdleTime(req) => {
                topology.reset_idle_time(req.virtual_core)?;
                reply(&Done)
            }
            TopologyRequest::HasClockModulation(req) => reply(&BoolRes {
                value: topology.has_clock_modulation(req.virtual_core)?,
            }),
            TopologyRequest::GetClockModulationValues(req) => reply(&ClockModulationValuesRes {
                values: topology.clock_modulation_values(req.virtual_core)?,
            }),
            TopologyRequest::GetClockModulation(req) => reply(&ClockModulationRes {
                value: topology.clock_modulation(req.virtual_core)?,
            }),
            TopologyRequest::SetClockModulation(req) => reply(&BoolRes {
                value: topology.set_clock_modulation(req.virtual_core, req.value)?,
            }),
        }
    }
}

impl MessageHandler for TopologyHandler {
    fn domain(&self) -> &'static str {
        DOMAIN
    }

    fn handle(&self, shape: &str, payload: &[u8]) -> powerprims_rpc::Result<Option<Envelope>> {
        let Some(request) = TopologyRequest::decode(shape, payload)? else {
            return Ok(None);
        };
        self.serve(request)
            .map(Some)
            .map_err(|err| handler_error(DOMAIN, shape, err))
    }
}
