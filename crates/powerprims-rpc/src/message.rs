use powerprims_frame::Envelope;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, RpcError};

/// A typed request or response carried in an envelope payload.
///
/// `TYPE_ID` is `powerprims.<domain>.<Shape>`. Implementations are usually
/// generated with [`declare_messages!`](crate::declare_messages).
pub trait Message: Serialize + DeserializeOwned {
    /// Full type identifier sent on the wire.
    const TYPE_ID: &'static str;
}

/// Implement [`Message`] for a list of types in one capability domain.
///
/// Each type identifier is `powerprims.<domain>.<TypeName>`.
///
/// ```ignore
/// declare_messages!("cpufreq" => GetDomains, GetDomainsRes);
/// assert_eq!(GetDomains::TYPE_ID, "powerprims.cpufreq.GetDomains");
/// ```
#[macro_export]
macro_rules! declare_messages {
    ($domain:literal => $($ty:ident),+ $(,)?) => {
        $(
            impl $crate::Message for $ty {
                const TYPE_ID: &'static str =
                    concat!("powerprims.", $domain, ".", stringify!($ty));
            }
        )+
    };
}

/// Shape segment of a message's type identifier.
pub fn shape_of<M: Message>() -> &'static str {
    M::TYPE_ID.rsplit('.').next().unwrap_or(M::TYPE_ID)
}

/// Serialize a message into an envelope.
pub fn encode_message<M: Message>(message: &M) -> Result<Envelope> {
    let payload = postcard::to_allocvec(message).map_err(|err| RpcError::Encode {
        type_id: M::TYPE_ID,
        reason: err.to_string(),
    })?;
    Ok(Envelope::new(M::TYPE_ID, payload))
}

/// Deserialize a request payload whose shape was already matched.
pub fn decode_request<M: Message>(payload: &[u8]) -> Result<M> {
    postcard::from_bytes(payload).map_err(|err| RpcError::MalformedRequest {
        type_id: M::TYPE_ID,
        reason: err.to_string(),
    })
}

/// Interpret a response envelope as `M`.
///
/// Error envelopes become [`RpcError::Remote`], foreign type identifiers
/// [`RpcError::ProtocolMismatch`] and undecodable payloads
/// [`RpcError::MalformedResponse`].
pub fn decode_response<M: Message>(envelope: Envelope) -> Result<M> {
    if let Some(message) = envelope.error_message() {
        return Err(RpcError::Remote(message));
    }
    if envelope.type_id != M::TYPE_ID {
        return Err(RpcError::ProtocolMismatch {
            expected: M::TYPE_ID,
            got: envelope.type_id,
        });
    }
    postcard::from_bytes(&envelope.payload).map_err(|err| RpcError::MalformedResponse {
        type_id: M::TYPE_ID,
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use powerprims_frame::{MessageId, NAMESPACE};
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct SetGovernor {
        domain: u32,
        governor: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct SetGovernorRes {
        result: bool,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct GetTopology;

    crate::declare_messages!("cpufreq" => SetGovernor, SetGovernorRes);
    crate::declare_messages!("topology" => GetTopology);

    #[test]
    fn type_ids_follow_namespace_domain_shape() {
        assert_eq!(SetGovernor::TYPE_ID, "powerprims.cpufreq.SetGovernor");
        assert_eq!(GetTopology::TYPE_ID, "powerprims.topology.GetTopology");

        let id = MessageId::parse(SetGovernorRes::TYPE_ID).unwrap();
        assert_eq!(id.domain(), "cpufreq");
        assert_eq!(id.shape(), shape_of::<SetGovernorRes>());
        assert!(SetGovernor::TYPE_ID.starts_with(NAMESPACE));
    }

    #[test]
    fn request_roundtrip() {
        let request = SetGovernor {
            domain: 3,
            governor: "userspace".to_string(),
        };
        let envelope = encode_message(&request).unwrap();
        assert_eq!(envelope.type_id, SetGovernor::TYPE_ID);

        let decoded: SetGovernor = decode_request(&envelope.payload).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn unit_message_has_empty_payload() {
        let envelope = encode_message(&GetTopology).unwrap();
        assert!(envelope.payload.is_empty());
        let _: GetTopology = decode_request(&envelope.payload).unwrap();
    }

    #[test]
    fn error_envelope_becomes_remote_error() {
        let err = decode_response::<SetGovernorRes>(Envelope::error("invalid governor"))
            .unwrap_err();
        assert!(matches!(err, RpcError::Remote(msg) if msg == "invalid governor"));
    }

    #[test]
    fn foreign_type_is_protocol_mismatch() {
        let envelope = encode_message(&GetTopology).unwrap();
        let err = decode_response::<SetGovernorRes>(envelope).unwrap_err();
        assert!(matches!(
            err,
            RpcError::ProtocolMismatch { expected, got }
                if expected == SetGovernorRes::TYPE_ID && got == GetTopology::TYPE_ID
        ));
    }

    #[test]
    fn undecodable_payload_is_malformed_response() {
        let envelope = Envelope::new(SetGovernorRes::TYPE_ID, Vec::<u8>::new());
        let err = decode_response::<SetGovernorRes>(envelope).unwrap_err();
        assert!(matches!(err, RpcError::MalformedResponse { .. }));
    }

    #[test]
    fn undecodable_request_is_malformed_request() {
        let err = decode_request::<SetGovernor>(&[0xFF]).unwrap_err();
        assert!(matches!(err, RpcError::MalformedRequest { .. }));
    }
}
