use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use powerprims_frame::FrameConfig;
use powerprims_transport::{TcpServer, TransportError};
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::dispatch::DispatchTable;
use crate::error::{Result, RpcError};
use crate::unit::{HandlingUnit, UnitExit, UnitHandle};

/// Default pause between two registry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Default pause after a failed accept.
pub const DEFAULT_ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Builds the private dispatch table of one connection.
pub type TableFactory = Box<dyn Fn() -> Result<DispatchTable> + Send + Sync>;

/// Supervisor tuning.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Pause between two registry sweeps. Default: 10 s.
    pub sweep_interval: Duration,
    /// Pause before accepting again after the listener failed. Default: 100 ms.
    pub accept_backoff: Duration,
    /// Envelope configuration applied to every accepted connection.
    pub frame: FrameConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            accept_backoff: DEFAULT_ACCEPT_BACKOFF,
            frame: FrameConfig::default(),
        }
    }
}

/// Started handling units, shared by the accept loop and the sweeper.
///
/// The lock is held only while a unit is appended or while a sweep
/// partitions the list.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    units: Arc<Mutex<Vec<UnitHandle>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, unit: UnitHandle) {
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(unit);
    }

    pub fn len(&self) -> usize {
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and reap every finished unit. Returns how many were removed.
    ///
    /// Running units are left untouched; the check never blocks on them.
    pub fn sweep(&self) -> usize {
        let finished: Vec<UnitHandle> = {
            let mut units = self.units.lock().unwrap_or_else(PoisonError::into_inner);
            let (finished, running) = units.drain(..).partition(UnitHandle::is_finished);
            *units = running;
            finished
        };

        let removed = finished.len();
        for unit in finished {
            let id = unit.id();
            match unit.join() {
                UnitExit::PeerClosed => debug!(unit = id, "reclaimed unit"),
                UnitExit::Fatal(err) => debug!(unit = id, error = %err, "reclaimed failed unit"),
                UnitExit::Panicked => warn!(unit = id, "reclaimed panicked unit"),
            }
        }
        removed
    }
}

/// Accepts connections and runs one handling unit per connection.
///
/// Every connection gets a fresh table from the factory, so handler state
/// such as counter baselines is never shared between clients.
pub struct Supervisor {
    server: TcpServer,
    factory: TableFactory,
    registry: Registry,
    config: SupervisorConfig,
    next_unit_id: AtomicU64,
}

impl Supervisor {
    /// Listen on all interfaces at `port`.
    pub fn bind<F>(port: u16, factory: F) -> Result<Self>
    where
        F: Fn() -> Result<DispatchTable> + Send + Sync + 'static,
    {
        Ok(Self::from_server(TcpServer::bind(port)?, Box::new(factory)))
    }

    /// Listen on an explicit address.
    pub fn bind_addr<F>(addr: SocketAddr, factory: F) -> Result<Self>
    where
        F: Fn() -> Result<DispatchTable> + Send + Sync + 'static,
    {
        Ok(Self::from_server(TcpServer::bind_addr(addr)?, Box::new(factory)))
    }

    fn from_server(server: TcpServer, factory: TableFactory) -> Self {
        Self {
            server,
            factory,
            registry: Registry::new(),
            config: SupervisorConfig::default(),
            next_unit_id: AtomicU64::new(1),
        }
    }

    /// Override supervisor config.
    pub fn with_config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    /// Address the supervisor listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Shared handle to the unit registry.
    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Accept one connection, build its table, start its unit and register
    /// it.
    ///
    /// Returns the id of the new unit. On failure after the accept the
    /// connection is dropped.
    pub fn accept_one(&self) -> Result<u64> {
        let (stream, peer) = self.server.accept()?;
        let table = (self.factory)()?;
        let channel = Channel::with_config(stream, self.config.frame.clone())?;

        let id = self.next_unit_id.fetch_add(1, Ordering::Relaxed);
        let unit = HandlingUnit::new(id, channel, Arc::new(table)).spawn()?;
        self.registry.insert(unit);

        debug!(unit = id, %peer, "registered unit");
        Ok(id)
    }

    /// Start the periodic sweeper thread.
    pub fn spawn_sweeper(&self) -> Result<JoinHandle<()>> {
        let registry = self.registry.clone();
        let interval = self.config.sweep_interval;

        thread::Builder::new()
            .name("powerprims-sweeper".to_string())
            .spawn(move || loop {
                thread::sleep(interval);
                let removed = registry.sweep();
                if removed > 0 {
                    debug!(removed, remaining = registry.len(), "swept finished units");
                }
            })
            .map_err(RpcError::Spawn)
    }

    /// Run the sweeper and the accept loop. Only returns if the sweeper
    /// cannot be started.
    ///
    /// A failed accept is logged and retried after
    /// [`SupervisorConfig::accept_backoff`]. A connection whose table or
    /// unit cannot be set up is logged and dropped; the loop continues.
    pub fn serve(&self) -> Result<()> {
        self.spawn_sweeper()?;
        info!(addr = %self.local_addr(), "supervisor running");

        loop {
            match self.accept_one() {
                Ok(_) => {}
                Err(RpcError::Transport(TransportError::Accept(err))) => {
                    warn!(error = %err, "accept failed");
                    thread::sleep(self.config.accept_backoff);
                }
                Err(err) => warn!(error = %err, "connection setup failed, dropped"),
            }
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("addr", &self.local_addr())
            .field("units", &self.registry.len())
            .finish()
    }
}
