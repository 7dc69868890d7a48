//! Length-prefixed typed message envelopes.
//!
//! Every message on the wire is a type identifier followed by a payload, each
//! preceded by a 4-byte big-endian length:
//!
//! ```text
//! ┌────────────┬────────────────┬────────────┬─────────────────┐
//! │ L1 (4B BE) │ type id (L1 B) │ L2 (4B BE) │ payload (L2 B)  │
//! └────────────┴────────────────┴────────────┴─────────────────┘
//! ```
//!
//! An empty type identifier marks an error envelope whose payload is a
//! human-readable message. Readers tell an orderly end of stream (no bytes of
//! a new envelope) apart from a truncated envelope.

pub mod codec;
pub mod error;
pub mod ident;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_envelope, encode_envelope, Envelope, FrameConfig, DEFAULT_MAX_PAYLOAD,
    LENGTH_PREFIX_SIZE, MAX_TYPE_ID_LEN,
};
pub use error::{FrameError, Result};
pub use ident::{domain_of, MessageId, ERROR_SENTINEL, NAMESPACE};
pub use reader::EnvelopeReader;
pub use writer::EnvelopeWriter;
