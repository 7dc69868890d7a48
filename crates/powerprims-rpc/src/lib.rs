//! Remote calls, dispatch and connection supervision.
//!
//! Clients share a [`Channel`] and issue typed [`Channel::remote_call`]s, one
//! exchange at a time. Servers run a [`Supervisor`] that gives every accepted
//! connection its own [`HandlingUnit`], which routes each request through a
//! [`DispatchTable`] to the [`MessageHandler`] owning its capability domain.

pub mod channel;
pub mod connector;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod supervisor;
pub mod unit;

pub use channel::Channel;
pub use connector::{connect, connect_with_config};
pub use dispatch::{DispatchTable, MessageHandler};
pub use error::{Result, RpcError};
pub use message::{decode_request, decode_response, encode_message, shape_of, Message};
pub use supervisor::{
    Registry, Supervisor, SupervisorConfig, TableFactory, DEFAULT_ACCEPT_BACKOFF,
    DEFAULT_SWEEP_INTERVAL,
};
pub use unit::{HandlingUnit, UnitExit, UnitHandle, UnitState};

pub use powerprims_frame::{Envelope, FrameConfig, NAMESPACE};
