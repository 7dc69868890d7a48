use std::sync::Arc;

use powerprims_rpc::Channel;

use super::messages::*;
use super::{CpuId, IdleLevelInfo, Topology, TopologyMap, VirtualCoreId};
use crate::error::Result;

/// Topology of a remote machine. The layout is fetched once on construction.
#[derive(Debug)]
pub struct RemoteTopology {
    channel: Arc<Channel>,
    layout: TopologyMap,
}

impl RemoteTopology {
    pub fn new(channel: Arc<Channel>) -> Result<Self> {
        let res: GetLayoutRes = channel.remote_call(&GetLayout)?;
        Ok(Self {
            channel,
            layout: TopologyMap::from_coordinates(res.coordinates),
        })
    }
}

impl Topology for RemoteTopology {
    fn layout(&self) -> &TopologyMap {
        &self.layout
    }

    fn cpu_vendor_id(&self, cpu: CpuId) -> Result<String> {
        let res: CpuInfoRes = self.channel.remote_call(&GetCpuVendorId { cpu })?;
        Ok(res.value)
    }

    fn cpu_family(&self, cpu: CpuId) -> Result<String> {
        let res: CpuInfoRes = self.channel.remote_call(&GetCpuFamily { cpu })?;
        Ok(res.value)
    }

    fn cpu_model(&self, cpu: CpuId) -> Result<String> {
        let res: CpuInfoRes = self.channel.remote_call(&GetCpuModel { cpu })?;
        Ok(res.value)
    }

    fn is_hot_pluggable(&self, virtual_core: VirtualCoreId) -> Result<bool> {
        let res: BoolRes = self.channel.remote_call(&IsHotPluggable { virtual_core })?;
        Ok(res.value)
    }

    fn is_hot_plugged(&self, virtual_core: VirtualCoreId) -> Result<bool> {
        let res: BoolRes = self.channel.remote_call(&IsHotPlugged { virtual_core })?;
        Ok(res.value)
    }

    fn hot_plug(&self, virtual_core: VirtualCoreId) -> Result<()> {
        let Done = self.channel.remote_call(&HotPlug { virtual_core })?;
        Ok(())
    }

    fn hot_unplug(&self, virtual_core: VirtualCoreId) -> Result<()> {
        let Done = self.channel.remote_call(&HotUnplug { virtual_core })?;
        Ok(())
    }

    fn idle_levels(&self, virtual_core: VirtualCoreId) -> Result<Vec<u32>> {
        let res: IdleLevelsRes = self.channel.remote_call(&GetIdleLevels { virtual_core })?;
        Ok(res.levels)
    }

    fn idle_level(&self, virtual_core: VirtualCoreId, level: u32) -> Result<IdleLevelInfo> {
        let res: IdleLevelRes = self.channel.remote_call(&GetIdleLevel {
            virtual_core,
            level,
        })?;
        Ok(res.info)
    }

    fn set_idle_level_enabled(
        &self,
        virtual_core: VirtualCoreId,
        level: u32,
        enabled: bool,
    ) -> Result<bool> {
        let res: BoolRes = self.channel.remote_call(&SetIdleLevelEnabled {
            virtual_core,
            level,
            enabled,
        })?;
        Ok(res.value)
    }

    fn reset_idle_level(&self, virtual_core: VirtualCoreId, level: u32) -> Result<()> {
        let Done = self.channel.remote_call(&ResetIdleLevel {
            virtual_core,
            level,
        })?;
        Ok(())
    }

    fn maximize_utilization(&self, virtual_cores: &[VirtualCoreId]) -> Result<()> {
        let Done = self.channel.remote_call(&MaximizeUtilization {
            virtual_cores: virtual_cores.to_vec(),
        })?;
        Ok(())
    }

    fn reset_utilization(&self, virtual_cores: &[VirtualCoreId]) -> Result<()> {
        let Done = self.channel.remote_call(&ResetUtilization {
            virtual_cores: virtual_cores.to_vec(),
        })?;
        Ok(())
    }

    fn idle_time(&self, virtual_core: VirtualCoreId) -> Result<u64> {
        let res: IdleTimeRes = self.channel.remote_call(&GetIdleTime { virtual_core })?;
        Ok(res.micros)
    }

    fn reset_idle_time(&self, virtual_core: VirtualCoreId) -> Result<()> {
        let Done = self.channel.remote_call(&ResetIdleTime { virtual_core })?;
        Ok(())
    }

    fn has_clock_modulation(&self, virtual_core: VirtualCoreId) -> Result<bool> {
        let res: BoolRes = self
            .channel
            .remote_call(&HasClockModulation { virtual_core })?;
        Ok(res.value)
    }

    fn clock_modulation_values(&self, virtual_core: VirtualCoreId) -> Result<Vec<f64>> {
        let res: ClockModulationValuesRes = self
            .channel
            .remote_call(&GetClockModulationValues { virtual_core })?;
        Ok(res.values)
    }

    fn clock_modulation(&self, virtual_core: VirtualCoreId) -> Result<f64> {
        let res: ClockModulationRes = self
            .channel
            .remote_call(&GetClockModulation { virtual_core })?;
        Ok(res.value)
    }

    fn set_clock_modulation(&self, virtual_core: VirtualCoreId, value: f64) -> Result<bool> {
        let res: BoolRes = self.channel.remote_call(&SetClockModulation {
            virtual_core,
            value,
        })?;
        Ok(res.value)
    }
}
