use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use powerprims_frame::Envelope;
use tracing::{debug, error, info, warn};

use crate::channel::Channel;
use crate::dispatch::DispatchTable;
use crate::error::{Result, RpcError};

/// Lifecycle of a started handling unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Running its receive/dispatch/respond loop.
    Running,
    /// Loop exited; waiting to be reclaimed.
    Finished,
}

/// Why a handling unit stopped.
#[derive(Debug)]
pub enum UnitExit {
    /// The peer closed the connection between requests.
    PeerClosed,
    /// A failure outside the handling of a single request.
    Fatal(RpcError),
    /// The unit's thread panicked.
    Panicked,
}

/// Serves one connection: receive a request, route it, send the response.
pub struct HandlingUnit {
    id: u64,
    channel: Channel,
    table: Arc<DispatchTable>,
}

impl HandlingUnit {
    pub fn new(id: u64, channel: Channel, table: Arc<DispatchTable>) -> Self {
        Self { id, channel, table }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Run the loop on the current thread until the connection ends.
    pub fn run(self) -> UnitExit {
        info!(unit = self.id, peer = ?self.channel.peer_addr(), "handling unit started");

        let exit = loop {
            let request = match self.channel.receive() {
                Ok(Some(request)) => request,
                Ok(None) => break UnitExit::PeerClosed,
                Err(err) => break UnitExit::Fatal(err),
            };

            if let Err(err) = self.process(&request) {
                break UnitExit::Fatal(err);
            }
        };

        match &exit {
            UnitExit::PeerClosed => info!(unit = self.id, "peer closed connection"),
            UnitExit::Fatal(err) => error!(unit = self.id, error = %err, "handling unit failed"),
            UnitExit::Panicked => {}
        }
        exit
    }

    /// Start the loop on its own thread.
    pub fn spawn(self) -> Result<UnitHandle> {
        let id = self.id;
        let peer = self.channel.peer_addr();
        let join = thread::Builder::new()
            .name(format!("powerprims-unit-{id}"))
            .spawn(move || self.run())
            .map_err(RpcError::Spawn)?;
        Ok(UnitHandle { id, peer, join })
    }

    /// Handle one request. Only a failure to send is returned.
    fn process(&self, request: &Envelope) -> Result<()> {
        match self.table.route(request) {
            Ok(response) => {
                debug!(unit = self.id, request = %request.type_id, response = %response.type_id, "handled");
                self.channel.send(&response)
            }
            Err(err) => {
                match &err {
                    RpcError::NotActivated(_) | RpcError::Routing { .. } => {
                        error!(unit = self.id, request = %request.type_id, error = %err, "routing failed")
                    }
                    _ => warn!(unit = self.id, request = %request.type_id, error = %err, "request failed"),
                }
                self.channel.send_error(&format!("Server: {err}"))
            }
        }
    }
}

/// Handle to a started handling unit.
#[derive(Debug)]
pub struct UnitHandle {
    id: u64,
    peer: Option<SocketAddr>,
    join: JoinHandle<UnitExit>,
}

impl UnitHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Current state, without blocking.
    pub fn state(&self) -> UnitState {
        if self.join.is_finished() {
            UnitState::Finished
        } else {
            UnitState::Running
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the unit to stop and return its exit reason.
    pub fn join(self) -> UnitExit {
        self.join.join().unwrap_or(UnitExit::Panicked)
    }
}
