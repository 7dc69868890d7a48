use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use powerprims_transport::ByteStream;

use crate::codec::{encode_envelope, Envelope, FrameConfig};
use crate::error::{FrameError, Result};
use crate::ident::ERROR_SENTINEL;
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete envelopes to any `Write` stream.
///
/// Each envelope is encoded into one buffer and written in full before
/// `send` returns. A write that cannot be completed leaves the stream in an
/// unknown state; callers must drop it.
pub struct EnvelopeWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> EnvelopeWriter<T> {
    /// Create a new envelope writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new envelope writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete envelope (blocking).
    pub fn write_envelope(&mut self, envelope: &Envelope) -> Result<()> {
        self.send(&envelope.type_id, envelope.payload.as_ref())
    }

    /// Send an error envelope carrying `message`.
    pub fn send_error(&mut self, message: &str) -> Result<()> {
        self.send(ERROR_SENTINEL, message.as_bytes())
    }

    /// Encode and send a payload under a type identifier.
    pub fn send(&mut self, type_id: &str, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_envelope(type_id, payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current envelope writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl EnvelopeWriter<ByteStream> {
    /// Create an envelope writer for a [`ByteStream`] and apply the write
    /// timeout from config.
    pub fn with_config_stream(inner: ByteStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
