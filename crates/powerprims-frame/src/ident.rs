//! Message type identifiers: `namespace.domain.Shape`.
//!
//! The middle segment is the capability domain used for routing. It never
//! carries data.

use crate::error::{FrameError, Result};

/// Root namespace token shared by every message type identifier.
pub const NAMESPACE: &str = "powerprims";

/// Type identifier of an error envelope.
pub const ERROR_SENTINEL: &str = "";

/// A parsed, borrowed message type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageId<'a> {
    domain: &'a str,
    shape: &'a str,
}

impl<'a> MessageId<'a> {
    /// Parse a type identifier.
    ///
    /// Exactly three non-empty dot-separated segments are required, and the
    /// first one must be [`NAMESPACE`].
    pub fn parse(type_id: &'a str) -> Result<Self> {
        let invalid = |reason| FrameError::InvalidMessageId {
            type_id: type_id.to_string(),
            reason,
        };

        let mut segments = type_id.split('.');
        let (Some(namespace), Some(domain), Some(shape), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(invalid("expected three dot-separated segments"));
        };

        if namespace != NAMESPACE {
            return Err(invalid("unknown namespace"));
        }
        if domain.is_empty() || shape.is_empty() {
            return Err(invalid("empty segment"));
        }

        Ok(Self { domain, shape })
    }

    /// The capability domain (middle segment).
    pub fn domain(&self) -> &'a str {
        self.domain
    }

    /// The message shape name (last segment).
    pub fn shape(&self) -> &'a str {
        self.shape
    }
}

impl std::fmt::Display for MessageId<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{NAMESPACE}.{}.{}", self.domain, self.shape)
    }
}

/// Capability domain of a type identifier.
pub fn domain_of(type_id: &str) -> Result<&str> {
    MessageId::parse(type_id).map(|id| id.domain())
}
