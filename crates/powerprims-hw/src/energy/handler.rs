use powerprims_rpc::{Envelope, MessageHandler};

use super::messages::*;
use super::{Energy, DOMAIN};
use crate::error::Result;
use crate::wire::{handler_error, reply};

/// Serves energy requests from a local façade.
pub struct EnergyHandler {
    energy: Box<dyn Energy>,
}

impl EnergyHandler {
    pub fn new(energy: Box<dyn Energy>) -> Self {
        Self { energy }
    }

    fn serve(&self, request: EnergyRequest) -> Result<Envelope> {
        match request {
            EnergyRequest::GetCounterInfo(GetCounterInfo) => reply(&CounterInfoRes {
                info: self.energy.info().clone(),
            }),
            EnergyRequest::GetJoulesComponents(req) => reply(&JoulesComponentsRes {
                joules: self.energy.joules_components(req.cpu)?,
            }),
            EnergyRequest::Reset(Reset) => {
                self.energy.reset()?;
                reply(&Done)
            }
        }
    }
}

impl MessageHandler for EnergyHandler {
    fn domain(&self) -> &'static str {
        DOMAIN
    }

    fn handle(&self, shape: &str, payload: &[u8]) -> powerprims_rpc::Result<Option<Envelope>> {
        let Some(request) = EnergyRequest::decode(shape, payload)? else {
            return Ok(None);
        };
        self.serve(request)
            .map(Some)
            .map_err(|err| handler_error(DOMAIN, shape, err))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use powerprims_rpc::{Channel, DispatchTable, HandlingUnit, RpcError};
    use powerprims_transport::ByteStream;

    use super::*;
    use crate::energy::{LocalEnergy, RemoteEnergy};
    use crate::error::HwError;
    use crate::testing::FakeTree;

    #[test]
    fn remote_counters_follow_the_server() {
        let tree = FakeTree::with_rapl("energy-remote");
        let local = LocalEnergy::new(&tree.config()).unwrap();
        let table = DispatchTable::new()
            .with_handler(Arc::new(EnergyHandler::new(Box::new(local))))
            .unwrap();
        let (client, server) = ByteStream::pair().unwrap();
        let unit = HandlingUnit::new(1, Channel::new(server).unwrap(), Arc::new(table));
        thread::spawn(move || unit.run());
        let energy = RemoteEnergy::new(Arc::new(Channel::new(client).unwrap())).unwrap();

        assert_eq!(energy.cpus(), &[0, 1]);
        assert!(energy.has_joules_cores());
        assert!(!energy.has_joules_graphic());

        tree.set_energy("intel-rapl:0", 2_000_000);
        tree.set_energy("intel-rapl:1", 1_500_000);
        assert_eq!(energy.joules_cpu(0).unwrap(), 1.0);
        assert_eq!(energy.joules_cpu_all().unwrap(), 1.5);

        energy.reset().unwrap();
        assert_eq!(energy.joules_cpu_all().unwrap(), 0.0);

        let err = energy.joules_components(9).unwrap_err();
        match err {
            HwError::Rpc(RpcError::Remote(reason)) => {
                assert!(reason.contains("powerprims.energy.GetJoulesComponents"), "{reason}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
