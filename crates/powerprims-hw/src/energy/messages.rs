//! Energy requests and responses.

use powerprims_rpc::declare_messages;
use serde::{Deserialize, Serialize};

use super::{CounterCpusInfo, JoulesCpu};
use crate::topology::CpuId;
use crate::wire::request_enum;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCounterInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterInfoRes {
    pub info: CounterCpusInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetJoulesComponents {
    pub cpu: CpuId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoulesComponentsRes {
    pub joules: JoulesCpu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reset;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Done;

declare_messages!(
    "energy" =>
    GetCounterInfo, CounterInfoRes,
    GetJoulesComponents, JoulesComponentsRes,
    Reset, Done,
);

request_enum! {
    /// Every request the energy handler serves.
    pub enum EnergyRequest {
        GetCounterInfo,
        GetJoulesComponents,
        Reset,
    }
}
