use std::sync::Arc;

use powerprims_rpc::Channel;

use super::messages::*;
use super::{CounterCpusInfo, Energy, JoulesCpu};
use crate::error::Result;
use crate::topology::CpuId;

/// Energy counters of a remote machine. Counter capabilities are fetched
/// once on construction.
#[derive(Debug)]
pub struct RemoteEnergy {
    channel: Arc<Channel>,
    info: CounterCpusInfo,
}

impl RemoteEnergy {
    pub fn new(channel: Arc<Channel>) -> Result<Self> {
        let res: CounterInfoRes = channel.remote_call(&GetCounterInfo)?;
        Ok(Self {
            channel,
            info: res.info,
        })
    }
}

impl Energy for RemoteEnergy {
    fn info(&self) -> &CounterCpusInfo {
        &self.info
    }

    fn joules_components(&self, cpu: CpuId) -> Result<JoulesCpu> {
        let res: JoulesComponentsRes = self.channel.remote_call(&GetJoulesComponents { cpu })?;
        Ok(res.joules)
    }

    fn reset(&self) -> Result<()> {
        let Done = self.channel.remote_call(&Reset)?;
        Ok(())
    }
}
