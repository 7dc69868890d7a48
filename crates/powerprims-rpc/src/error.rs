/// Errors that can occur in remote calls and request handling.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] powerprims_transport::TransportError),

    /// Envelope-level error.
    #[error("frame error: {0}")]
    Frame(#[from] powerprims_frame::FrameError),

    /// The server answered with an error envelope.
    #[error("{0}")]
    Remote(String),

    /// The response type does not match the request.
    #[error("protocol mismatch: expected {expected}, got {got:?}")]
    ProtocolMismatch { expected: &'static str, got: String },

    /// The response payload does not decode into the expected shape.
    #[error("malformed {type_id} response: {reason}")]
    MalformedResponse {
        type_id: &'static str,
        reason: String,
    },

    /// The request payload does not decode into the expected shape.
    #[error("malformed {type_id} request: {reason}")]
    MalformedRequest {
        type_id: &'static str,
        reason: String,
    },

    /// The peer closed the channel before a response arrived.
    #[error("connection closed before a response arrived")]
    ConnectionClosed,

    /// The type identifier cannot be routed.
    #[error("cannot route {type_id:?}: {reason}")]
    Routing { type_id: String, reason: String },

    /// The capability domain has no handler on this server.
    #[error("module {0} not activated")]
    NotActivated(String),

    /// The domain handler does not know the message shape.
    #[error("unknown {domain} message {shape:?}")]
    UnknownShape { domain: String, shape: String },

    /// A message could not be serialized.
    #[error("cannot encode {type_id}: {reason}")]
    Encode {
        type_id: &'static str,
        reason: String,
    },

    /// The handler failed to perform the requested operation.
    #[error("error while processing {type_id}: {reason}")]
    Handler { type_id: String, reason: String },

    /// A handler was registered twice for one domain.
    #[error("duplicate handler for domain {0}")]
    DuplicateDomain(String),

    /// A caller panicked while holding the channel.
    #[error("channel poisoned by a panicked caller")]
    Poisoned,

    /// A worker thread could not be started.
    #[error("failed to spawn thread: {0}")]
    Spawn(std::io::Error),

    /// The dispatch table of a new connection could not be built.
    #[error("cannot build dispatch table: {0}")]
    TableSetup(String),
}

impl RpcError {
    /// Whether the error leaves the channel unusable.
    ///
    /// Transport failures, truncated envelopes and poisoned channels are
    /// fatal. Everything else concerns a single call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RpcError::Transport(_)
                | RpcError::Frame(_)
                | RpcError::ConnectionClosed
                | RpcError::Poisoned
        )
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
