use std::sync::Arc;

use powerprims_rpc::Channel;

use super::messages::*;
use super::{
    CpuFreq, Domain, DomainId, Frequency, Governor, Voltage, VoltageSampling, VoltageTableEntry,
};
use crate::error::Result;

/// Frequency control of a remote machine. Domains are fetched once on
/// construction.
#[derive(Debug)]
pub struct RemoteCpuFreq {
    channel: Arc<Channel>,
    domains: Vec<Domain>,
}

impl RemoteCpuFreq {
    pub fn new(channel: Arc<Channel>) -> Result<Self> {
        let res: DomainsRes = channel.remote_call(&GetDomains)?;
        Ok(Self {
            channel,
            domains: res.domains,
        })
    }
}

impl CpuFreq for RemoteCpuFreq {
    fn domains(&self) -> &[Domain] {
        &self.domains
    }

    fn available_frequencies(&self, domain: DomainId) -> Result<Vec<Frequency>> {
        let res: FrequenciesRes = self
            .channel
            .remote_call(&GetAvailableFrequencies { domain })?;
        Ok(res.frequencies)
    }

    fn available_governors(&self, domain: DomainId) -> Result<Vec<Governor>> {
        let res: GovernorsRes = self.channel.remote_call(&GetAvailableGovernors { domain })?;
        Ok(res.governors)
    }

    fn current_frequency(&self, domain: DomainId) -> Result<Frequency> {
        let res: FrequencyRes = self.channel.remote_call(&GetCurrentFrequency { domain })?;
        Ok(res.frequency)
    }

    fn current_frequency_userspace(&self, domain: DomainId) -> Result<Frequency> {
        let res: FrequencyRes = self
            .channel
            .remote_call(&GetCurrentFrequencyUserspace { domain })?;
        Ok(res.frequency)
    }

    fn set_frequency_userspace(&self, domain: DomainId, frequency: Frequency) -> Result<bool> {
        let res: ResultRes = self
            .channel
            .remote_call(&SetFrequencyUserspace { domain, frequency })?;
        Ok(res.result)
    }

    fn current_governor(&self, domain: DomainId) -> Result<Option<Governor>> {
        let res: GovernorRes = self.channel.remote_call(&GetCurrentGovernor { domain })?;
        Ok(res.governor)
    }

    fn set_governor(&self, domain: DomainId, governor: Governor) -> Result<bool> {
        let res: ResultRes = self
            .channel
            .remote_call(&SetGovernor { domain, governor })?;
        Ok(res.result)
    }

    fn hardware_frequency_bounds(&self, domain: DomainId) -> Result<(Frequency, Frequency)> {
        let res: BoundsRes = self
            .channel
            .remote_call(&GetHardwareFrequencyBounds { domain })?;
        Ok((res.lower, res.upper))
    }

    fn current_governor_bounds(&self, domain: DomainId) -> Result<Option<(Frequency, Frequency)>> {
        let res: OptionalBoundsRes = self
            .channel
            .remote_call(&GetCurrentGovernorBounds { domain })?;
        Ok(res.bounds)
    }

    fn set_governor_bounds(
        &self,
        domain: DomainId,
        lower: Frequency,
        upper: Frequency,
    ) -> Result<bool> {
        let res: ResultRes = self.channel.remote_call(&SetGovernorBounds {
            domain,
            lower,
            upper,
        })?;
        Ok(res.result)
    }

    fn transition_latency(&self, domain: DomainId) -> Result<Option<u32>> {
        let res: LatencyRes = self.channel.remote_call(&GetTransitionLatency { domain })?;
        Ok(res.latency)
    }

    fn current_voltage(&self, domain: DomainId) -> Result<Voltage> {
        let res: VoltageRes = self.channel.remote_call(&GetCurrentVoltage { domain })?;
        Ok(res.voltage)
    }

    fn voltage_table(
        &self,
        domain: DomainId,
        only_physical_cores: bool,
        sampling: &VoltageSampling,
    ) -> Result<Vec<VoltageTableEntry>> {
        let res: VoltageTableRes = self.channel.remote_call(&GetVoltageTable {
            domain,
            only_physical_cores,
            sampling: *sampling,
        })?;
        Ok(res.entries)
    }

    fn is_boosting_supported(&self) -> Result<bool> {
        let res: ResultRes = self.channel.remote_call(&IsBoostingSupported)?;
        Ok(res.result)
    }

    fn is_boosting_enabled(&self) -> Result<bool> {
        let res: ResultRes = self.channel.remote_call(&IsBoostingEnabled)?;
        Ok(res.result)
    }

    fn enable_boosting(&self) -> Result<()> {
        let Done = self.channel.remote_call(&EnableBoosting)?;
        Ok(())
    }

    fn disable_boosting(&self) -> Result<()> {
        let Done = self.channel.remote_call(&DisableBoosting)?;
        Ok(())
    }
}
