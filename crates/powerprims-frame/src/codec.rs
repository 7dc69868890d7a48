use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::ident::ERROR_SENTINEL;

/// Size of each length prefix on the wire.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Longest accepted type identifier.
pub const MAX_TYPE_ID_LEN: usize = 4 * 1024;

/// One typed message: a type identifier and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// The message type identifier, or empty for an error envelope.
    pub type_id: String,
    /// The message payload.
    pub payload: Bytes,
}

impl Envelope {
    /// Create a new envelope.
    pub fn new(type_id: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            type_id: type_id.into(),
            payload: payload.into(),
        }
    }

    /// Create an error envelope carrying `message`.
    pub fn error(message: impl AsRef<str>) -> Self {
        Self {
            type_id: ERROR_SENTINEL.to_string(),
            payload: Bytes::copy_from_slice(message.as_ref().as_bytes()),
        }
    }

    /// Whether this is an error envelope.
    pub fn is_error(&self) -> bool {
        self.type_id == ERROR_SENTINEL
    }

    /// The error text of an error envelope.
    pub fn error_message(&self) -> Option<String> {
        self.is_error()
            .then(|| String::from_utf8_lossy(&self.payload).into_owned())
    }

    /// The total wire size of this envelope (prefixes + content).
    pub fn wire_size(&self) -> usize {
        2 * LENGTH_PREFIX_SIZE + self.type_id.len() + self.payload.len()
    }
}

/// Encode an envelope into the wire format.
pub fn encode_envelope(type_id: &str, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if type_id.len() > MAX_TYPE_ID_LEN {
        return Err(FrameError::TypeIdTooLong {
            len: type_id.len(),
            max: MAX_TYPE_ID_LEN,
        });
    }
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }

    dst.reserve(2 * LENGTH_PREFIX_SIZE + type_id.len() + payload.len());
    dst.put_u32(type_id.len() as u32);
    dst.put_slice(type_id.as_bytes());
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode an envelope from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete envelope yet.
/// On success, consumes the envelope bytes from the buffer. Type identifiers
/// that are not valid UTF-8 are decoded lossily and fail later at routing.
pub fn decode_envelope(src: &mut BytesMut, max_payload: usize) -> Result<Option<Envelope>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let type_len = (&src[..LENGTH_PREFIX_SIZE]).get_u32() as usize;
    if type_len > MAX_TYPE_ID_LEN {
        return Err(FrameError::TypeIdTooLong {
            len: type_len,
            max: MAX_TYPE_ID_LEN,
        });
    }

    let payload_prefix_at = LENGTH_PREFIX_SIZE + type_len;
    if src.len() < payload_prefix_at + LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let payload_len =
        (&src[payload_prefix_at..payload_prefix_at + LENGTH_PREFIX_SIZE]).get_u32() as usize;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    if src.len() < payload_prefix_at + LENGTH_PREFIX_SIZE + payload_len {
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    let type_id = String::from_utf8_lossy(&src.split_to(type_len)).into_owned();
    src.advance(LENGTH_PREFIX_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Envelope { type_id, payload }))
}

/// Configuration for envelope readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations. Default: none.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations. Default: none.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_layout_is_big_endian() {
        let mut buf = BytesMut::new();
        encode_envelope("a.b.C", b"xyz", &mut buf).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&[0, 0, 0, 5]);
        expected.extend_from_slice(b"a.b.C");
        expected.extend_from_slice(&[0, 0, 0, 3]);
        expected.extend_from_slice(b"xyz");
        assert_eq!(buf.as_ref(), expected.as_slice());
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        encode_envelope("powerprims.cpufreq.GetDomains", b"\x01\x02", &mut buf).unwrap();

        let env = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(env.type_id, "powerprims.cpufreq.GetDomains");
        assert_eq!(env.payload.as_ref(), b"\x01\x02");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_incomplete_prefix() {
        let mut buf = BytesMut::from(&[0x00, 0x00, 0x00][..]);
        assert!(decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn decode_incomplete_type_id_and_payload() {
        let mut full = BytesMut::new();
        encode_envelope("x.y.Z", b"hello", &mut full).unwrap();

        for cut in 1..full.len() {
            let mut partial = BytesMut::from(&full[..cut]);
            let decoded = decode_envelope(&mut partial, DEFAULT_MAX_PAYLOAD).unwrap();
            assert!(decoded.is_none(), "cut at {cut} should be incomplete");
            assert_eq!(partial.len(), cut, "incomplete decode must not consume");
        }
    }

    #[test]
    fn decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32(0);
        buf.put_u32(1024);

        let result = decode_envelope(&mut buf, 16);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge {
                size: 1024,
                max: 16
            })
        ));
    }

    #[test]
    fn type_id_length_is_bounded() {
        let mut buf = BytesMut::new();
        buf.put_u32((MAX_TYPE_ID_LEN + 1) as u32);
        let result = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::TypeIdTooLong { .. })));

        let long = "x".repeat(MAX_TYPE_ID_LEN + 1);
        let err = encode_envelope(&long, b"", &mut BytesMut::new()).unwrap_err();
        assert!(matches!(err, FrameError::TypeIdTooLong { .. }));
    }

    #[test]
    fn multiple_envelopes_in_one_buffer() {
        let mut buf = BytesMut::new();
        encode_envelope("a.b.First", b"1", &mut buf).unwrap();
        encode_envelope("a.b.Second", b"22", &mut buf).unwrap();

        let e1 = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        let e2 = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(e1.type_id, "a.b.First");
        assert_eq!(e2.type_id, "a.b.Second");
        assert_eq!(e2.payload.as_ref(), b"22");
        assert!(buf.is_empty());
    }

    #[test]
    fn error_sentinel_with_message() {
        let env = Envelope::error("Server: Module energy not activated.");
        assert!(env.is_error());

        let mut buf = BytesMut::new();
        encode_envelope(&env.type_id, &env.payload, &mut buf).unwrap();
        assert_eq!(&buf[..4], &[0, 0, 0, 0]);

        let decoded = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(decoded.is_error());
        assert_eq!(
            decoded.error_message().as_deref(),
            Some("Server: Module energy not activated.")
        );
    }

    #[test]
    fn empty_payload_is_not_an_error() {
        let mut buf = BytesMut::new();
        encode_envelope("a.b.C", b"", &mut buf).unwrap();

        let env = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(!env.is_error());
        assert!(env.payload.is_empty());
        assert!(env.error_message().is_none());
    }

    #[test]
    fn invalid_utf8_type_id_is_decoded_lossily() {
        let mut buf = BytesMut::new();
        buf.put_u32(2);
        buf.put_slice(&[0xFF, 0xFE]);
        buf.put_u32(0);

        let env = decode_envelope(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(!env.is_error());
        assert!(buf.is_empty());
    }

    #[test]
    fn envelope_wire_size() {
        let env = Envelope::new("a.b.C", Bytes::from_static(b"test"));
        assert_eq!(env.wire_size(), 8 + 5 + 4);
    }
}
