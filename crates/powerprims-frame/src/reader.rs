use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use powerprims_transport::ByteStream;

use crate::codec::{decode_envelope, Envelope, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete envelopes from any `Read` stream.
///
/// Handles partial reads internally. Callers always get complete envelopes.
pub struct EnvelopeReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> EnvelopeReader<T> {
    /// Create a new envelope reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new envelope reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete envelope (blocking).
    ///
    /// Returns `Ok(None)` when the stream ends before any byte of a new
    /// envelope, and [`FrameError::Truncated`] when it ends part way through.
    pub fn read_envelope(&mut self) -> Result<Option<Envelope>> {
        loop {
            if let Some(envelope) = decode_envelope(&mut self.buf, self.config.max_payload_size)? {
                return Ok(Some(envelope));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(FrameError::Truncated {
                    buffered: self.buf.len(),
                });
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current envelope reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl EnvelopeReader<ByteStream> {
    /// Create an envelope reader for a [`ByteStream`] and apply the read
    /// timeout from config.
    pub fn with_config_stream(inner: ByteStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: powerprims_transport::TransportError) -> FrameError {
    match err {
        powerprims_transport::TransportError::Io(io)
        | powerprims_transport::TransportError::Accept(io) => FrameError::Io(io),
        powerprims_transport::TransportError::Bind { source, .. }
        | powerprims_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
