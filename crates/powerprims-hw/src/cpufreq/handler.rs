use powerprims_rpc::{Envelope, MessageHandler};

use super::messages::*;
use super::{CpuFreq, DOMAIN};
use crate::error::Result;
use crate::wire::{handler_error, reply};

/// Serves frequency requests from a local façade.
pub struct CpuFreqHandler {
    cpufreq: Box<dyn CpuFreq>,
}

impl CpuFreqHandler {
    pub fn new(cpufreq: Box<dyn CpuFreq>) -> Self {
        Self { cpufreq }
    }

    fn serve(&self, request: CpuFreqRequest) -> Result<Envelope> {
        let cpufreq = &*self.cpufreq;
        match request {
            CpuFreqRequest::GetDomains(GetDomains) => reply(&DomainsRes {
                domains: cpufreq.domains().to_vec(),
            }),
            CpuFreqRequest::GetAvailableFrequencies(req) => reply(&FrequenciesRes {
                frequencies: cpufreq.available_frequencies(req.domain)?,
            }),
            CpuFreqRequest::GetAvailableGovernors(req) => reply(&GovernorsRes {
                governors: cpufreq.available_governors(req.domain)?,
            }),
            CpuFreqRequest::GetCurrentFrequency(req) => reply(&FrequencyRes {
                frequency: cpufreq.current_frequency(req.domain)?,
            }),
            CpuFreqRequest::GetCurrentFrequencyUserspace(req) => reply(&FrequencyRes {
                frequency: cpufreq.current_frequency_userspace(req.domain)?,
            }),
            CpuFreqRequest::SetFrequencyUserspace(req) => reply(&ResultRes {
                result: cpufreq.set_frequency_userspace(req.domain, req.frequency)?,
            }),
            CpuFreqRequest::GetCurrentGovernor(req) => reply(&GovernorRes {
                governor: cpufreq.current_governor(req.domain)?,
            }),
            CpuFreqRequest::SetGovernor(req) => reply(&ResultRes {
                result: cpufreq.set_governor(req.domain, req.governor)?,
            }),
            CpuFreqRequest::GetHardwareFrequencyBounds(req) => {
                let (lower, upper) = cpufreq.hardware_frequency_bounds(req.domain)?;
                reply(&BoundsRes { lower, upper })
            }
            CpuFreqRequest::GetCurrentGovernorBounds(req) => reply(&OptionalBoundsRes {
                bounds: cpufreq.current_governor_bounds(req.domain)?,
            }),
            CpuFreqRequest::SetGovernorBounds(req) => reply(&ResultRes {
                result: cpufreq.set_governor_bounds(req.domain, req.lower, req.upper)?,
            }),
            CpuFreqRequest::GetTransitionLatency(req) => reply(&LatencyRes {
                latency: cpufreq.transition_latency(req.domain)?,
            }),
            CpuFreqRequest::GetCurrentVoltage(req) => reply(&VoltageRes {
                voltage: cpufreq.current_voltage(req.domain)?,
            }),
            CpuFreqRequest::GetVoltageTable(req) => reply(&VoltageTableRes {
                entries: cpufreq.voltage_table(
                    req.domain,
                    req.only_physical_cores,
                    &req.sampling,
                )?,
            }),
            CpuFreqRequest::IsBoostingSupported(_) => reply(&ResultRes {
                result: cpufreq.is_boosting_supported()?,
            }),
            CpuFreqRequest::IsBoostingEnabled(_) => reply(&ResultRes {
                result: cpufreq.is_boosting_enabled()?,
            }),
            CpuFreqRequest::EnableBoosting(_) => {
                cpufreq.enable_boosting()?;
                reply(&Done)
            }
            CpuFreqRequest::DisableBoosting(_) => {
                cpufreq.disable_boosting()?;
                reply(&Done)
            }
        }
    }
}

impl MessageHandler for CpuFreqHandler {
    fn domain(&self) -> &'static str {
        DOMAIN
    }

    fn handle(&self, shape: &str, payload: &[u8]) -> powerprims_rpc::Result<Option<Envelope>> {
        let Some(request) = CpuFreqRequest::decode(shape, payload)? else {
            return Ok(None);
        };
        self.serve(request)
            .map(Some)
            .map_err(|err| handler_error(DOMAIN, shape, err))
    }
}
