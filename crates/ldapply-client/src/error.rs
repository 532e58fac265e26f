//! Client-layer error types.

use thiserror::Error;

use crate::result::OperationResult;
use crate::result_code::ResultCode;

/// Errors produced by the LDAP client layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No connection could be established to any configured server.
    #[error("unable to establish an LDAP connection to {server}: {source}")]
    Connect {
        /// The last server that was attempted.
        server: String,
        /// The transport error.
        #[source]
        source: ldap3::LdapError,
    },

    /// The bind on a freshly established connection failed.
    #[error("bind to {server} failed: {}", .result.summary())]
    Bind {
        /// The server the bind was attempted against.
        server: String,
        /// The server's bind result.
        result: OperationResult,
    },

    /// A wire value could not be decoded.
    #[error("unable to decode {what}: {message}")]
    Decode {
        /// What was being decoded.
        what: &'static str,
        /// Human-readable cause.
        message: String,
    },

    /// A value could not be encoded for the wire.
    #[error("unable to encode {what}: {message}")]
    Encode {
        /// What was being encoded.
        what: &'static str,
        /// Human-readable cause.
        message: String,
    },

    /// A search filter string was malformed.
    #[error("invalid search filter at offset {offset}: {message}")]
    Filter {
        /// Byte offset into the filter string.
        offset: usize,
        /// Human-readable cause.
        message: String,
    },

    /// An invalid parameter was supplied to the client layer.
    #[error("invalid parameter: {0}")]
    Param(String),

    /// A transport-level failure from the `ldap3` layer.
    #[error("LDAP transport error: {0}")]
    Transport(#[from] ldap3::LdapError),
}

impl ClientError {
    /// The result code this error maps to for exit-code purposes.
    #[must_use]
    pub fn result_code(&self) -> ResultCode {
        match self {
            ClientError::Connect { .. } => ResultCode::CONNECT_ERROR,
            ClientError::Bind { result, .. } => result.result_code(),
            ClientError::Decode { .. } => ResultCode::DECODING_ERROR,
            ClientError::Encode { .. } => ResultCode::ENCODING_ERROR,
            ClientError::Filter { .. } => ResultCode::FILTER_ERROR,
            ClientError::Param(_) => ResultCode::PARAM_ERROR,
            ClientError::Transport(e) => transport_result_code(e),
        }
    }

    /// Shorthand for a decode error.
    #[must_use]
    pub fn decode(what: &'static str, message: impl Into<String>) -> Self {
        ClientError::Decode {
            what,
            message: message.into(),
        }
    }

    /// Shorthand for an encode error.
    #[must_use]
    pub fn encode(what: &'static str, message: impl Into<String>) -> Self {
        ClientError::Encode {
            what,
            message: message.into(),
        }
    }
}

/// Maps a transport error to the closest client-side result code.
#[must_use]
pub fn transport_result_code(err: &ldap3::LdapError) -> ResultCode {
    match err {
        ldap3::LdapError::LdapResult { result } => ResultCode::from(result.rc),
        _ => ResultCode::SERVER_DOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_codes() {
        assert_eq!(
            ClientError::decode("paged results control", "truncated").result_code(),
            ResultCode::DECODING_ERROR
        );
        assert_eq!(
            ClientError::Param("bad".into()).result_code(),
            ResultCode::PARAM_ERROR
        );
        assert_eq!(
            ClientError::Filter {
                offset: 3,
                message: "unbalanced".into()
            }
            .result_code(),
            ResultCode::FILTER_ERROR
        );
    }
}
