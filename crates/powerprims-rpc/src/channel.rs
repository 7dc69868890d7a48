use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};

use powerprims_frame::{Envelope, EnvelopeReader, EnvelopeWriter, FrameConfig};
use powerprims_transport::ByteStream;
use tracing::trace;

use crate::error::{Result, RpcError};
use crate::message::{decode_response, encode_message, Message};

/// An open duplex connection carrying envelopes.
///
/// Every public operation holds the channel lock for its whole duration, so
/// a [`Channel::remote_call`] sends its request and receives its response
/// without any other caller's exchange in between. Share it with `Arc`.
///
/// There is no call timeout unless one is configured through
/// [`FrameConfig`]; a peer that never answers blocks every caller.
pub struct Channel {
    io: Mutex<ChannelIo>,
    peer: Option<SocketAddr>,
}

struct ChannelIo {
    reader: EnvelopeReader<ByteStream>,
    writer: EnvelopeWriter<ByteStream>,
}

impl Channel {
    /// Connect to a server given as `host:port`.
    pub fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_config(addr, FrameConfig::default())
    }

    /// Connect with explicit envelope configuration.
    pub fn connect_with_config(addr: &str, config: FrameConfig) -> Result<Self> {
        let stream = powerprims_transport::connect(addr)?;
        Self::with_config(stream, config)
    }

    /// Wrap a connected stream with default configuration.
    pub fn new(stream: ByteStream) -> Result<Self> {
        Self::with_config(stream, FrameConfig::default())
    }

    /// Wrap a connected stream with explicit configuration.
    pub fn with_config(stream: ByteStream, config: FrameConfig) -> Result<Self> {
        let peer = stream.peer_addr();
        let reader_stream = stream.try_clone()?;

        let reader = EnvelopeReader::with_config_stream(reader_stream, config.clone())?;
        let writer = EnvelopeWriter::with_config_stream(stream, config)?;

        Ok(Self {
            io: Mutex::new(ChannelIo { reader, writer }),
            peer,
        })
    }

    /// Send a typed request and wait for its typed response.
    pub fn remote_call<Req: Message, Res: Message>(&self, request: &Req) -> Result<Res> {
        let envelope = encode_message(request)?;
        let response = self.call_raw(&envelope.type_id, &envelope.payload)?;
        decode_response(response)
    }

    /// Send one envelope and wait for the next one, as a single exchange.
    ///
    /// Error envelopes are returned as they are.
    pub fn call_raw(&self, type_id: &str, payload: &[u8]) -> Result<Envelope> {
        let mut io = self.lock()?;

        trace!(type_id, size = payload.len(), "sending request");
        io.writer.send(type_id, payload)?;

        let response = io.reader.read_envelope()?.ok_or(RpcError::ConnectionClosed)?;
        trace!(type_id = %response.type_id, size = response.payload.len(), "received response");
        Ok(response)
    }

    /// Receive the next envelope (server side).
    ///
    /// Returns `Ok(None)` when the peer closed the connection in an orderly
    /// way between messages.
    pub fn receive(&self) -> Result<Option<Envelope>> {
        Ok(self.lock()?.reader.read_envelope()?)
    }

    /// Send one envelope (server side).
    pub fn send(&self, envelope: &Envelope) -> Result<()> {
        Ok(self.lock()?.writer.write_envelope(envelope)?)
    }

    /// Send an error envelope (server side).
    pub fn send_error(&self, message: &str) -> Result<()> {
        Ok(self.lock()?.writer.send_error(message)?)
    }

    /// Remote address of the peer, for TCP channels.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn lock(&self) -> Result<MutexGuard<'_, ChannelIo>> {
        self.io.lock().map_err(|_| RpcError::Poisoned)
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").field("peer", &self.peer).finish()
    }
}
