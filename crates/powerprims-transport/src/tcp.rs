use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::ByteStream;

/// Pending-connection backlog for listening sockets.
pub const LISTEN_BACKLOG: i32 = 10;

/// A bound and listening TCP socket.
pub struct TcpServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpServer {
    /// Listen on all IPv4 interfaces at `port`.
    ///
    /// Port 0 asks the OS for an ephemeral port; see [`TcpServer::local_addr`].
    pub fn bind(port: u16) -> Result<Self> {
        Self::bind_addr(SocketAddr::from(([0, 0, 0, 0], port)))
    }

    /// Listen on an explicit socket address.
    pub fn bind_addr(addr: SocketAddr) -> Result<Self> {
        let bind_err = |source| TransportError::Bind { addr, source };

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(bind_err)?;
        socket.set_reuse_address(true).map_err(bind_err)?;
        socket.bind(&addr.into()).map_err(bind_err)?;
        socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;

        let listener: TcpListener = socket.into();
        let local_addr = listener.local_addr().map_err(bind_err)?;

        info!(%local_addr, backlog = LISTEN_BACKLOG, "listening");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept the next incoming connection (blocking).
    pub fn accept(&self) -> Result<(ByteStream, SocketAddr)> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nodelay(true)?;
                    debug!(%peer, "accepted connection");
                    return Ok((ByteStream::from_tcp(stream), peer));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Accept(err)),
            }
        }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl std::fmt::Debug for TcpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpServer")
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

/// Split a `host:port` string on its first colon.
pub fn split_host_port(addr: &str) -> Result<(&str, u16)> {
    let invalid = |reason| TransportError::InvalidAddress {
        addr: addr.to_string(),
        reason,
    };

    let (host, port) = addr.split_once(':').ok_or_else(|| invalid("expected host:port"))?;
    if host.is_empty() {
        return Err(invalid("empty host"));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| invalid("port must be a number in 0..=65535"))?;

    Ok((host, port))
}

/// Connect to a server given as `host:port`.
pub fn connect(addr: &str) -> Result<ByteStream> {
    let (host, port) = split_host_port(addr)?;

    let stream = TcpStream::connect((host, port)).map_err(|source| TransportError::Connect {
        addr: addr.to_string(),
        source,
    })?;
    stream.set_nodelay(true)?;

    debug!(addr, "connected");
    Ok(ByteStream::from_tcp(stream))
}
