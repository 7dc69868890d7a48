//! Blocking duplex byte streams for powerprims.
//!
//! This is the lowest layer of powerprims. A [`ByteStream`] is a reliable,
//! ordered, bidirectional stream with blocking reads and writes. Servers obtain
//! streams from a [`TcpServer`], clients from [`connect`].
//!
//! Everything above this crate (framing, calls, dispatch) only sees
//! [`ByteStream`].

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::ByteStream;
pub use tcp::{connect, split_host_port, TcpServer, LISTEN_BACKLOG};
