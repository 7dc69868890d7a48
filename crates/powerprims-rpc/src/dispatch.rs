use std::collections::HashMap;
use std::sync::Arc;

use powerprims_frame::{Envelope, MessageId};

use crate::error::{Result, RpcError};

/// Server-side handler for every message of one capability domain.
pub trait MessageHandler: Send + Sync {
    /// Capability domain served by this handler, e.g. `"cpufreq"`.
    fn domain(&self) -> &'static str;

    /// Decode the request named by `shape`, perform it and encode the response.
    ///
    /// Returns `Ok(None)` when `shape` is not a request of this domain.
    fn handle(&self, shape: &str, payload: &[u8]) -> Result<Option<Envelope>>;
}

/// Routes requests to the handler owning their capability domain.
///
/// Read-only once built; share it with `Arc` across handling units.
#[derive(Clone, Default)]
pub struct DispatchTable {
    handlers: HashMap<&'static str, Arc<dyn MessageHandler>>,
}

impl DispatchTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its domain.
    pub fn register(&mut self, handler: Arc<dyn MessageHandler>) -> Result<()> {
        let domain = handler.domain();
        if self.handlers.contains_key(domain) {
            return Err(RpcError::DuplicateDomain(domain.to_string()));
        }
        self.handlers.insert(domain, handler);
        Ok(())
    }

    /// Builder form of [`DispatchTable::register`].
    pub fn with_handler(mut self, handler: Arc<dyn MessageHandler>) -> Result<Self> {
        self.register(handler)?;
        Ok(self)
    }

    /// Whether a handler is registered for `domain`.
    pub fn contains(&self, domain: &str) -> bool {
        self.handlers.contains_key(domain)
    }

    /// Registered domains, sorted.
    pub fn domains(&self) -> Vec<&'static str> {
        let mut domains: Vec<_> = self.handlers.keys().copied().collect();
        domains.sort_unstable();
        domains
    }

    /// Route one request and return the handler's response.
    pub fn route(&self, request: &Envelope) -> Result<Envelope> {
        let id = MessageId::parse(&request.type_id).map_err(|err| RpcError::Routing {
            type_id: request.type_id.clone(),
            reason: err.to_string(),
        })?;

        let handler = self
            .handlers
            .get(id.domain())
            .ok_or_else(|| RpcError::NotActivated(id.domain().to_string()))?;

        handler
            .handle(id.shape(), &request.payload)?
            .ok_or_else(|| RpcError::UnknownShape {
                domain: id.domain().to_string(),
                shape: id.shape().to_string(),
            })
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("domains", &self.domains())
            .finish()
    }
}
