//! The normalized result model.
//!
//! `OperationResult` is the immutable value every dispatch path produces,
//! whether the server answered or the transport failed. Empty wire strings
//! normalize to `None`; referral and control arrays normalize to empty
//! vectors, never to an absent field.

use lber::common::TagClass;
use serde::Serialize;

use crate::ber;
use crate::controls::Control;
use crate::error::{transport_result_code, ClientError};
use crate::result_code::ResultCode;

/// Sentinel used when no protocol message id is associated with a result.
pub const NO_MESSAGE_ID: i32 = -1;

/// The outcome of one directory operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    message_id: i32,
    result_code: ResultCode,
    matched_dn: Option<String>,
    diagnostic_message: Option<String>,
    referral_urls: Vec<String>,
    response_controls: Vec<Control>,
}

impl OperationResult {
    /// A bare result with only a code.
    #[must_use]
    pub fn new(result_code: ResultCode) -> Self {
        OperationResult {
            message_id: NO_MESSAGE_ID,
            result_code,
            matched_dn: None,
            diagnostic_message: None,
            referral_urls: Vec::new(),
            response_controls: Vec::new(),
        }
    }

    /// Attaches a diagnostic message (empty strings normalize to absent).
    #[must_use]
    pub fn with_diagnostic(mut self, message: impl Into<String>) -> Self {
        self.diagnostic_message = none_if_empty(message.into());
        self
    }

    /// Builds a normalized result from the transport's result type.
    #[must_use]
    pub fn from_ldap(result: ldap3::LdapResult) -> Self {
        OperationResult {
            message_id: NO_MESSAGE_ID,
            result_code: ResultCode::from(result.rc),
            matched_dn: none_if_empty(result.matched),
            diagnostic_message: none_if_empty(result.text),
            referral_urls: result.refs,
            response_controls: result.ctrls.into_iter().map(Control::from_transport).collect(),
        }
    }

    /// Builds a result describing a transport-level failure, the way a
    /// server result would describe an operation failure.
    #[must_use]
    pub fn from_transport_error(err: &ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => Self::from_ldap(result.clone()),
            other => OperationResult::new(transport_result_code(other))
                .with_diagnostic(other.to_string()),
        }
    }

    /// The result code.
    #[must_use]
    pub fn result_code(&self) -> ResultCode {
        self.result_code
    }

    /// The protocol message id, or [`NO_MESSAGE_ID`].
    #[must_use]
    pub fn message_id(&self) -> i32 {
        self.message_id
    }

    /// The matched DN, if the server supplied one.
    #[must_use]
    pub fn matched_dn(&self) -> Option<&str> {
        self.matched_dn.as_deref()
    }

    /// The diagnostic message, if the server supplied one.
    #[must_use]
    pub fn diagnostic_message(&self) -> Option<&str> {
        self.diagnostic_message.as_deref()
    }

    /// Referral URLs (empty when none were returned).
    #[must_use]
    pub fn referral_urls(&self) -> &[String] {
        &self.referral_urls
    }

    /// Response controls in insertion order.
    #[must_use]
    pub fn response_controls(&self) -> &[Control] {
        &self.response_controls
    }

    /// Whether a response control with the given OID is present.
    #[must_use]
    pub fn has_response_control(&self, oid: &str) -> bool {
        self.response_controls.iter().any(|c| c.oid == oid)
    }

    /// The first response control with the given OID, in insertion order.
    #[must_use]
    pub fn get_response_control(&self, oid: &str) -> Option<&Control> {
        self.response_controls.iter().find(|c| c.oid == oid)
    }

    /// One-line summary, e.g. `49 (invalid credentials): the password was wrong`.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.diagnostic_message {
            Some(msg) => format!("{}: {}", self.result_code, msg),
            None => self.result_code.to_string(),
        }
    }

    /// Multi-line human-readable rendering used for progress output and
    /// reject-file trailers.
    #[must_use]
    pub fn format_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(4);
        lines.push(format!("result code: {}", self.result_code));
        if let Some(msg) = &self.diagnostic_message {
            lines.push(format!("diagnostic message: {msg}"));
        }
        if let Some(dn) = &self.matched_dn {
            lines.push(format!("matched DN: {dn}"));
        }
        for url in &self.referral_urls {
            lines.push(format!("referral URL: {url}"));
        }
        for control in &self.response_controls {
            lines.push(format!("response control: {}", control.oid));
        }
        lines
    }
}

fn none_if_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// The outcome of an extended operation: the common result shape plus the
/// response name and value, when present.
#[derive(Debug, Clone)]
pub struct ExtendedOutcome {
    /// The common result fields.
    pub result: OperationResult,
    /// The response OID, if the server supplied one.
    pub name: Option<String>,
    /// The raw response value, if the server supplied one.
    pub value: Option<Vec<u8>>,
}

impl ExtendedOutcome {
    /// Wraps a bare result with no extended payload.
    #[must_use]
    pub fn from_result(result: OperationResult) -> Self {
        ExtendedOutcome {
            result,
            name: None,
            value: None,
        }
    }
}

/// OID of the stream-proxy-values intermediate response.
pub const STREAM_PROXY_VALUES_OID: &str = "1.3.6.1.4.1.30221.2.6.9";

/// A decoded stream-proxy-values intermediate response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamProxyValuesResponse {
    /// The attribute the values belong to, if any.
    pub attribute_name: Option<String>,
    /// Result indicator: 0 all values returned, 1 more to return,
    /// 2 attribute not indexed, 3 processing error.
    pub result: u8,
    /// Optional diagnostic message.
    pub diagnostic_message: Option<String>,
    /// The values carried by this response.
    pub values: Vec<Vec<u8>>,
}

impl StreamProxyValuesResponse {
    /// Decodes the intermediate-response value. Decoding is side-effect
    /// free: a malformed value produces a single decode error.
    pub fn decode(value: &[u8]) -> Result<Self, ClientError> {
        const WHAT: &str = "stream proxy values intermediate response";
        let elements = ber::expect_sequence(ber::decode(value)?)
            .map_err(|_| ClientError::decode(WHAT, "value is not a SEQUENCE"))?;

        let mut attribute_name = None;
        let mut result = None;
        let mut diagnostic_message = None;
        let mut values = Vec::new();

        for element in elements {
            if element.class != TagClass::Context {
                return Err(ClientError::decode(WHAT, "unexpected element class"));
            }
            match element.id {
                0 => {
                    let bytes = ber::expect_bytes(element)?;
                    attribute_name = Some(String::from_utf8(bytes).map_err(|e| {
                        ClientError::decode(WHAT, format!("attribute name: {e}"))
                    })?);
                }
                1 => {
                    let bytes = ber::expect_bytes(element)?;
                    let value = ber::decode_uint(&bytes);
                    if value > 3 {
                        return Err(ClientError::decode(
                            WHAT,
                            format!("result value {value} out of range"),
                        ));
                    }
                    result = Some(value as u8);
                }
                2 => {
                    let bytes = ber::expect_bytes(element)?;
                    diagnostic_message = none_if_empty(String::from_utf8(bytes).map_err(
                        |e| ClientError::decode(WHAT, format!("diagnostic message: {e}")),
                    )?);
                }
                4 => {
                    let entries = element
                        .expect_constructed()
                        .ok_or_else(|| ClientError::decode(WHAT, "values is not constructed"))?;
                    for entry in entries {
                        values.push(ber::expect_bytes(entry)?);
                    }
                }
                other => {
                    return Err(ClientError::decode(
                        WHAT,
                        format!("unexpected element tag {other}"),
                    ));
                }
            }
        }

        let result = result.ok_or_else(|| ClientError::decode(WHAT, "missing result element"))?;
        Ok(StreamProxyValuesResponse {
            attribute_name,
            result,
            diagnostic_message,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ldap_result(rc: u32, matched: &str, text: &str) -> ldap3::LdapResult {
        ldap3::LdapResult {
            rc,
            matched: matched.to_string(),
            text: text.to_string(),
            refs: vec![],
            ctrls: vec![],
        }
    }

    #[test]
    fn test_empty_strings_normalize_to_absent() {
        let result = OperationResult::from_ldap(ldap_result(0, "", ""));
        assert_eq!(result.matched_dn(), None);
        assert_eq!(result.diagnostic_message(), None);
        assert!(result.referral_urls().is_empty());
        assert!(result.response_controls().is_empty());
    }

    #[test]
    fn test_populated_result() {
        let mut raw = ldap_result(32, "dc=example,dc=com", "entry missing");
        raw.refs = vec!["ldap://other.example.com/".to_string()];
        let result = OperationResult::from_ldap(raw);
        assert_eq!(result.result_code(), ResultCode::NO_SUCH_OBJECT);
        assert_eq!(result.matched_dn(), Some("dc=example,dc=com"));
        assert_eq!(result.referral_urls().len(), 1);
        let lines = result.format_lines();
        assert_eq!(lines[0], "result code: 32 (no such object)");
        assert!(lines.iter().any(|l| l.starts_with("referral URL: ")));
    }

    #[test]
    fn test_response_control_lookup_first_match_wins() {
        let mut raw = ldap_result(0, "", "");
        raw.ctrls = vec![
            ldap3::controls::Control(
                None,
                ldap3::controls::RawControl {
                    ctype: "1.2.3.4".to_string(),
                    crit: false,
                    val: Some(vec![1]),
                },
            ),
            ldap3::controls::Control(
                None,
                ldap3::controls::RawControl {
                    ctype: "1.2.3.4".to_string(),
                    crit: false,
                    val: Some(vec![2]),
                },
            ),
        ];
        let result = OperationResult::from_ldap(raw);
        assert!(result.has_response_control("1.2.3.4"));
        assert_eq!(
            result.get_response_control("1.2.3.4").unwrap().value,
            Some(vec![1])
        );
        assert!(!result.has_response_control("9.9.9.9"));
    }

    #[test]
    fn test_result_serializes() {
        let mut raw = ldap_result(32, "dc=example,dc=com", "entry missing");
        raw.refs = vec!["ldap://other.example.com/".to_string()];
        let result = OperationResult::from_ldap(raw);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["result_code"], 32);
        assert_eq!(json["matched_dn"], "dc=example,dc=com");
        assert_eq!(json["referral_urls"][0], "ldap://other.example.com/");
    }

    #[test]
    fn test_stream_proxy_values_decode() {
        // SEQUENCE { [0] "cn", [1] 1, [4] { "a", "b" } }
        let value = ber::encode(ber::seq(vec![
            ber::ctx_prim(0, b"cn".to_vec()),
            ber::ctx_prim(1, vec![1]),
            ber::ctx_seq(
                4,
                vec![
                    ber::octet_string(b"a".to_vec()),
                    ber::octet_string(b"b".to_vec()),
                ],
            ),
        ]))
        .unwrap();

        let decoded = StreamProxyValuesResponse::decode(&value).unwrap();
        assert_eq!(decoded.attribute_name.as_deref(), Some("cn"));
        assert_eq!(decoded.result, 1);
        assert_eq!(decoded.values, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn test_stream_proxy_values_decode_rejects_garbage() {
        assert!(StreamProxyValuesResponse::decode(&[0xFF, 0x00]).is_err());
        // Missing the mandatory result element.
        let value = ber::encode(ber::seq(vec![ber::ctx_prim(0, b"cn".to_vec())])).unwrap();
        assert!(StreamProxyValuesResponse::decode(&value).is_err());
    }
}
