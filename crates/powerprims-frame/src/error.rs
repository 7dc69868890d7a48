/// Errors that can occur during envelope encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The type identifier exceeds [`crate::MAX_TYPE_ID_LEN`].
    #[error("type identifier too long ({len} bytes, max {max})")]
    TypeIdTooLong { len: usize, max: usize },

    /// An I/O error occurred while reading or writing envelopes.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended after an envelope had begun.
    ///
    /// The stream cannot be resynchronized and must be closed.
    #[error("connection closed mid-envelope ({buffered} bytes buffered)")]
    Truncated { buffered: usize },

    /// The peer stopped accepting bytes while an envelope was being written.
    #[error("connection closed")]
    ConnectionClosed,

    /// The type identifier is not `namespace.domain.Shape`.
    #[error("invalid message identifier {type_id:?}: {reason}")]
    InvalidMessageId {
        type_id: String,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, FrameError>;
