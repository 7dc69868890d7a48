//! Glue between module handlers and the rpc layer.

use powerprims_rpc::{encode_message, Envelope, Message, RpcError};

use crate::error::{HwError, Result};

/// Encode a handler's typed response.
pub(crate) fn reply<M: Message>(message: &M) -> Result<Envelope> {
    Ok(encode_message(message)?)
}

/// Turn a failed hardware operation into a request-scoped rpc error.
pub(crate) fn handler_error(domain: &str, shape: &str, err: HwError) -> RpcError {
    match err {
        HwError::Rpc(err) => err,
        other => RpcError::Handler {
            type_id: format!("{}.{domain}.{shape}", powerprims_rpc::NAMESPACE),
            reason: other.to_string(),
        },
    }
}

/// Decode the request variant named by `shape`.
///
/// Expands to a `decode(shape, payload)` constructor on a request enum whose
/// variants are named after, and wrap, the request message types.
macro_rules! request_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug)]
        $vis enum $name {
            $($variant($variant),)+
        }

        impl $name {
            /// Decode the payload into the variant named by `shape`.
            ///
            /// Returns `Ok(None)` for shapes that are not requests of this
            /// domain.
            pub fn decode(shape: &str, payload: &[u8]) -> powerprims_rpc::Result<Option<Self>> {
                let request = match shape {
                    $(stringify!($variant) => Self::$variant(powerprims_rpc::decode_request(payload)?),)+
                    _ => return Ok(None),
                };
                Ok(Some(request))
            }

            /// Shape segment of this request's type identifier.
            pub fn shape(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => stringify!($variant),)+
                }
            }
        }
    };
}

pub(crate) use request_enum;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_failures_become_handler_errors() {
        let err = handler_error("cpufreq", "SetGovernor", HwError::UnknownDomain(9));
        assert_eq!(
            err.to_string(),
            "error while processing powerprims.cpufreq.SetGovernor: unknown frequency domain 9"
        );
        assert!(!err.is_fatal());
    }

    #[test]
    fn rpc_failures_pass_through() {
        let err = handler_error("task", "Move", HwError::Rpc(RpcError::ConnectionClosed));
        assert!(matches!(err, RpcError::ConnectionClosed));
    }
}
