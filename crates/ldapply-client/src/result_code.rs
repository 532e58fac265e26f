//! LDAP result codes.
//!
//! A closed value type over the numeric result-code space. Classification is
//! table-driven: the engine only ever asks "is this success-like", "can the
//! connection still be used", and "is this a client-side code".

use std::fmt;

use serde::{Deserialize, Serialize};

/// An LDAP result code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCode(pub i32);

impl ResultCode {
    pub const SUCCESS: ResultCode = ResultCode(0);
    pub const OPERATIONS_ERROR: ResultCode = ResultCode(1);
    pub const PROTOCOL_ERROR: ResultCode = ResultCode(2);
    pub const TIME_LIMIT_EXCEEDED: ResultCode = ResultCode(3);
    pub const SIZE_LIMIT_EXCEEDED: ResultCode = ResultCode(4);
    pub const REFERRAL: ResultCode = ResultCode(10);
    pub const ADMIN_LIMIT_EXCEEDED: ResultCode = ResultCode(11);
    pub const UNAVAILABLE_CRITICAL_EXTENSION: ResultCode = ResultCode(12);
    pub const NO_SUCH_ATTRIBUTE: ResultCode = ResultCode(16);
    pub const UNDEFINED_ATTRIBUTE_TYPE: ResultCode = ResultCode(17);
    pub const CONSTRAINT_VIOLATION: ResultCode = ResultCode(19);
    pub const ATTRIBUTE_OR_VALUE_EXISTS: ResultCode = ResultCode(20);
    pub const INVALID_ATTRIBUTE_SYNTAX: ResultCode = ResultCode(21);
    pub const NO_SUCH_OBJECT: ResultCode = ResultCode(32);
    pub const INVALID_DN_SYNTAX: ResultCode = ResultCode(34);
    pub const INAPPROPRIATE_AUTHENTICATION: ResultCode = ResultCode(48);
    pub const INVALID_CREDENTIALS: ResultCode = ResultCode(49);
    pub const INSUFFICIENT_ACCESS_RIGHTS: ResultCode = ResultCode(50);
    pub const BUSY: ResultCode = ResultCode(51);
    pub const UNAVAILABLE: ResultCode = ResultCode(52);
    pub const UNWILLING_TO_PERFORM: ResultCode = ResultCode(53);
    pub const NAMING_VIOLATION: ResultCode = ResultCode(64);
    pub const OBJECT_CLASS_VIOLATION: ResultCode = ResultCode(65);
    pub const NOT_ALLOWED_ON_NONLEAF: ResultCode = ResultCode(66);
    pub const NOT_ALLOWED_ON_RDN: ResultCode = ResultCode(67);
    pub const ENTRY_ALREADY_EXISTS: ResultCode = ResultCode(68);
    pub const AFFECTS_MULTIPLE_DSAS: ResultCode = ResultCode(71);
    pub const OTHER: ResultCode = ResultCode(80);
    pub const SERVER_DOWN: ResultCode = ResultCode(81);
    pub const LOCAL_ERROR: ResultCode = ResultCode(82);
    pub const ENCODING_ERROR: ResultCode = ResultCode(83);
    pub const DECODING_ERROR: ResultCode = ResultCode(84);
    pub const TIMEOUT: ResultCode = ResultCode(85);
    pub const FILTER_ERROR: ResultCode = ResultCode(87);
    pub const USER_CANCELED: ResultCode = ResultCode(88);
    pub const PARAM_ERROR: ResultCode = ResultCode(89);
    pub const NO_MEMORY: ResultCode = ResultCode(90);
    pub const CONNECT_ERROR: ResultCode = ResultCode(91);
    pub const NOT_SUPPORTED: ResultCode = ResultCode(92);
    pub const CONTROL_NOT_FOUND: ResultCode = ResultCode(93);
    pub const NO_RESULTS_RETURNED: ResultCode = ResultCode(94);
    pub const CLIENT_LOOP: ResultCode = ResultCode(96);
    pub const REFERRAL_LIMIT_EXCEEDED: ResultCode = ResultCode(97);
    pub const CANCELED: ResultCode = ResultCode(118);
    pub const ASSERTION_FAILED: ResultCode = ResultCode(122);
    pub const AUTHORIZATION_DENIED: ResultCode = ResultCode(123);
    /// Returned in place of SUCCESS when the no-op control suppressed the
    /// change. Outside the normal protocol range.
    pub const NO_OPERATION: ResultCode = ResultCode(16654);

    /// The numeric value of this code.
    #[must_use]
    pub fn value(self) -> i32 {
        self.0
    }

    /// The process exit code for this result, clamped to the 0..=255 range.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        self.0.clamp(0, 255)
    }

    /// Whether this code counts as a successful outcome for the engine
    /// (SUCCESS, or the no-op control's success surrogate).
    #[must_use]
    pub fn is_success(self) -> bool {
        self == ResultCode::SUCCESS || self == ResultCode::NO_OPERATION
    }

    /// Whether the connection that produced this code is still usable.
    ///
    /// The codes below indicate a transport-level breakdown; everything else
    /// is an ordinary operation outcome on a healthy connection.
    #[must_use]
    pub fn is_connection_usable(self) -> bool {
        !matches!(
            self,
            ResultCode::SERVER_DOWN
                | ResultCode::ENCODING_ERROR
                | ResultCode::DECODING_ERROR
                | ResultCode::TIMEOUT
                | ResultCode::NO_MEMORY
                | ResultCode::CONNECT_ERROR
        )
    }

    /// Whether this code originates on the client rather than the server.
    #[must_use]
    pub fn is_client_side(self) -> bool {
        (81..=97).contains(&self.0)
    }

    /// The registered name of this code, or `None` for codes outside the
    /// known taxonomy.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "success",
            1 => "operations error",
            2 => "protocol error",
            3 => "time limit exceeded",
            4 => "size limit exceeded",
            10 => "referral",
            11 => "admin limit exceeded",
            12 => "unavailable critical extension",
            16 => "no such attribute",
            17 => "undefined attribute type",
            19 => "constraint violation",
            20 => "attribute or value exists",
            21 => "invalid attribute syntax",
            32 => "no such object",
            34 => "invalid DN syntax",
            48 => "inappropriate authentication",
            49 => "invalid credentials",
            50 => "insufficient access rights",
            51 => "busy",
            52 => "unavailable",
            53 => "unwilling to perform",
            64 => "naming violation",
            65 => "object class violation",
            66 => "not allowed on non-leaf",
            67 => "not allowed on RDN",
            68 => "entry already exists",
            71 => "affects multiple DSAs",
            80 => "other",
            81 => "server down",
            82 => "local error",
            83 => "encoding error",
            84 => "decoding error",
            85 => "timeout",
            87 => "filter error",
            88 => "user canceled",
            89 => "parameter error",
            90 => "out of memory",
            91 => "connect error",
            92 => "not supported",
            93 => "control not found",
            94 => "no results returned",
            96 => "client loop",
            97 => "referral limit exceeded",
            118 => "canceled",
            122 => "assertion failed",
            123 => "authorization denied",
            16654 => "no operation",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", self.0, name),
            None => write!(f, "{}", self.0),
        }
    }
}

impl fmt::Debug for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResultCode({self})")
    }
}

impl From<u32> for ResultCode {
    fn from(rc: u32) -> Self {
        ResultCode(i32::try_from(rc).unwrap_or(i32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_like_codes() {
        assert!(ResultCode::SUCCESS.is_success());
        assert!(ResultCode::NO_OPERATION.is_success());
        assert!(!ResultCode::NO_SUCH_OBJECT.is_success());
    }

    #[test]
    fn test_connection_usable_classification() {
        for code in [
            ResultCode::SERVER_DOWN,
            ResultCode::ENCODING_ERROR,
            ResultCode::DECODING_ERROR,
            ResultCode::TIMEOUT,
            ResultCode::NO_MEMORY,
            ResultCode::CONNECT_ERROR,
        ] {
            assert!(!code.is_connection_usable(), "{code} should be unusable");
        }
        for code in [
            ResultCode::SUCCESS,
            ResultCode::NO_SUCH_OBJECT,
            ResultCode::ASSERTION_FAILED,
            ResultCode::BUSY,
        ] {
            assert!(code.is_connection_usable(), "{code} should be usable");
        }
    }

    #[test]
    fn test_client_side_range() {
        assert!(ResultCode::LOCAL_ERROR.is_client_side());
        assert!(ResultCode::PARAM_ERROR.is_client_side());
        assert!(!ResultCode::NO_SUCH_OBJECT.is_client_side());
        assert!(!ResultCode::ASSERTION_FAILED.is_client_side());
    }

    #[test]
    fn test_exit_code_clamping() {
        assert_eq!(ResultCode::SUCCESS.exit_code(), 0);
        assert_eq!(ResultCode::NO_SUCH_OBJECT.exit_code(), 32);
        assert_eq!(ResultCode::NO_OPERATION.exit_code(), 255);
    }

    #[test]
    fn test_display() {
        assert_eq!(ResultCode::NO_SUCH_OBJECT.to_string(), "32 (no such object)");
        assert_eq!(ResultCode(4242).to_string(), "4242");
    }
}
