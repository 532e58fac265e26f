//! Request controls.
//!
//! Every control the tool can attach, keyed by OID. Controls are immutable
//! once built and freely cloneable between requests. Value encodings live
//! here next to their constructors so each control is self-contained.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;

use crate::ber;
use crate::error::ClientError;
use crate::filter;
use crate::result::OperationResult;

/// Control OIDs used by the tool.
pub mod oid {
    pub const ASSERTION: &str = "1.3.6.1.1.12";
    pub const AUTHORIZATION_IDENTITY: &str = "2.16.840.1.113730.3.4.16";
    pub const MANAGE_DSA_IT: &str = "2.16.840.1.113730.3.4.2";
    pub const PERMISSIVE_MODIFY: &str = "1.2.840.113556.1.4.1413";
    pub const PRE_READ: &str = "1.3.6.1.1.13.1";
    pub const POST_READ: &str = "1.3.6.1.1.13.2";
    pub const PROXIED_AUTH_V1: &str = "2.16.840.1.113730.3.4.12";
    pub const PROXIED_AUTH_V2: &str = "2.16.840.1.113730.3.4.18";
    pub const SUBTREE_DELETE: &str = "1.2.840.113556.1.4.805";
    pub const PAGED_RESULTS: &str = "1.2.840.113556.1.4.319";
    pub const TRANSACTION_SPECIFICATION: &str = "1.3.6.1.1.21.2";
    pub const NO_OP: &str = "1.3.6.1.4.1.4203.1.10.2";
    pub const PASSWORD_POLICY: &str = "1.3.6.1.4.1.42.2.27.8.5.1";
    pub const ASSURED_REPLICATION: &str = "1.3.6.1.4.1.30221.2.5.28";
    pub const GET_AUTHORIZATION_ENTRY: &str = "1.3.6.1.4.1.30221.2.5.6";
    pub const GET_USER_RESOURCE_LIMITS: &str = "1.3.6.1.4.1.30221.2.5.25";
    pub const HARD_DELETE: &str = "1.3.6.1.4.1.30221.2.5.22";
    pub const SOFT_DELETE: &str = "1.3.6.1.4.1.30221.2.5.20";
    pub const UNDELETE: &str = "1.3.6.1.4.1.30221.2.5.23";
    pub const IGNORE_NO_USER_MODIFICATION: &str = "1.3.6.1.4.1.30221.2.5.5";
    pub const NAME_WITH_ENTRY_UUID: &str = "1.3.6.1.4.1.30221.2.5.44";
    pub const OPERATION_PURPOSE: &str = "1.3.6.1.4.1.30221.2.5.19";
    pub const PASSWORD_VALIDATION_DETAILS: &str = "1.3.6.1.4.1.30221.2.5.40";
    pub const PURGE_PASSWORD: &str = "1.3.6.1.4.1.30221.2.5.32";
    pub const RETIRE_PASSWORD: &str = "1.3.6.1.4.1.30221.2.5.31";
    pub const REPLICATION_REPAIR: &str = "1.3.6.1.4.1.30221.1.5.2";
    pub const SUPPRESS_OPERATIONAL_ATTRIBUTE_UPDATE: &str = "1.3.6.1.4.1.30221.2.5.27";
    pub const SUPPRESS_REFERENTIAL_INTEGRITY_UPDATES: &str = "1.3.6.1.4.1.30221.2.5.30";
}

/// An LDAP request or response control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Control {
    /// The control OID.
    pub oid: String,
    /// Criticality flag.
    pub critical: bool,
    /// Raw control value, if any.
    pub value: Option<Vec<u8>>,
}

impl Control {
    /// A value-less control.
    #[must_use]
    pub fn flag(oid: &str, critical: bool) -> Self {
        Control {
            oid: oid.to_string(),
            critical,
            value: None,
        }
    }

    /// A control with a value.
    #[must_use]
    pub fn with_value(oid: &str, critical: bool, value: Vec<u8>) -> Self {
        Control {
            oid: oid.to_string(),
            critical,
            value: Some(value),
        }
    }

    /// Converts to the transport's raw control type.
    #[must_use]
    pub fn to_raw(&self) -> ldap3::controls::RawControl {
        ldap3::controls::RawControl {
            ctype: self.oid.clone(),
            crit: self.critical,
            val: self.value.clone(),
        }
    }

    /// Builds from a transport response control.
    #[must_use]
    pub fn from_transport(control: ldap3::controls::Control) -> Self {
        let raw = control.1;
        Control {
            oid: raw.ctype,
            critical: raw.crit,
            value: raw.val,
        }
    }

    /// Parses the command-line control syntax
    /// `oid[:criticality[:value|::b64value]]`.
    pub fn parse_arg(spec: &str) -> Result<Self, ClientError> {
        let (oid, rest) = match spec.find(':') {
            Some(i) => (&spec[..i], Some(&spec[i + 1..])),
            None => (spec, None),
        };
        if oid.is_empty() || !oid.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
            return Err(ClientError::Param(format!(
                "invalid control OID {oid:?} in {spec:?}"
            )));
        }

        let Some(rest) = rest else {
            return Ok(Control::flag(oid, false));
        };

        let (criticality, value_part) = match rest.find(':') {
            Some(i) => (&rest[..i], Some(&rest[i + 1..])),
            None => (rest, None),
        };
        let critical = match criticality {
            "true" => true,
            "false" => false,
            other => {
                return Err(ClientError::Param(format!(
                    "invalid control criticality {other:?} in {spec:?} (expected true or false)"
                )));
            }
        };

        let value = match value_part {
            None => None,
            Some(v) => match v.strip_prefix(':') {
                Some(b64) => Some(BASE64.decode(b64.as_bytes()).map_err(|e| {
                    ClientError::Param(format!("invalid base64 control value in {spec:?}: {e}"))
                })?),
                None => Some(v.as_bytes().to_vec()),
            },
        };

        Ok(Control {
            oid: oid.to_string(),
            critical,
            value,
        })
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.oid)?;
        if self.critical {
            write!(f, " (critical)")?;
        }
        Ok(())
    }
}

/// The assertion control: the server must fail the operation with
/// `ASSERTION_FAILED` when the filter does not match the target entry.
pub fn assertion(filter_str: &str) -> Result<Control, ClientError> {
    let value = filter::encode_filter_bytes(filter_str)?;
    Ok(Control::with_value(oid::ASSERTION, true, value))
}

/// Requests the authorization identity in the bind response.
#[must_use]
pub fn authorization_identity() -> Control {
    Control::flag(oid::AUTHORIZATION_IDENTITY, false)
}

/// Requests a copy of the authorization entry (and optionally specific
/// attributes of it) in the bind response.
pub fn get_authorization_entry(attributes: &[String]) -> Result<Control, ClientError> {
    let mut elements = vec![ber::ctx_prim(0, vec![0xFF]), ber::ctx_prim(1, vec![0xFF])];
    if !attributes.is_empty() {
        let attrs = attributes
            .iter()
            .map(|a| ber::octet_string(a.as_bytes().to_vec()))
            .collect();
        elements.push(ber::ctx_seq(2, attrs));
    }
    let value = ber::encode(ber::seq(elements))?;
    Ok(Control::with_value(oid::GET_AUTHORIZATION_ENTRY, false, value))
}

/// Requests the user's resource limits in the bind response.
#[must_use]
pub fn get_user_resource_limits() -> Control {
    Control::flag(oid::GET_USER_RESOURCE_LIMITS, false)
}

/// Permanently removes a soft-deleted entry.
#[must_use]
pub fn hard_delete() -> Control {
    Control::flag(oid::HARD_DELETE, true)
}

/// Converts a delete into a soft delete, asking for the soft-deleted DN in
/// the response.
pub fn soft_delete() -> Result<Control, ClientError> {
    let value = ber::encode(ber::seq(vec![ber::ctx_prim(0, vec![0xFF])]))?;
    Ok(Control::with_value(oid::SOFT_DELETE, true, value))
}

/// Deletes an entire subtree in one operation.
#[must_use]
pub fn subtree_delete() -> Control {
    Control::flag(oid::SUBTREE_DELETE, true)
}

/// Turns an add into an undelete of a soft-deleted entry.
#[must_use]
pub fn undelete() -> Control {
    Control::flag(oid::UNDELETE, true)
}

/// Allows NO-USER-MODIFICATION attributes in an add request.
#[must_use]
pub fn ignore_no_user_modification() -> Control {
    Control::flag(oid::IGNORE_NO_USER_MODIFICATION, true)
}

/// Names the added entry with its entryUUID.
#[must_use]
pub fn name_with_entry_uuid() -> Control {
    Control::flag(oid::NAME_WITH_ENTRY_UUID, true)
}

/// Lets the operation target referral entries themselves.
#[must_use]
pub fn manage_dsa_it() -> Control {
    Control::flag(oid::MANAGE_DSA_IT, true)
}

/// Validates the operation without applying it.
#[must_use]
pub fn no_op() -> Control {
    Control::flag(oid::NO_OP, true)
}

/// Makes modify tolerant of adding existing / deleting missing values.
#[must_use]
pub fn permissive_modify() -> Control {
    Control::flag(oid::PERMISSIVE_MODIFY, false)
}

/// Marks the operation as a replication repair that bypasses replication.
#[must_use]
pub fn replication_repair() -> Control {
    Control::flag(oid::REPLICATION_REPAIR, true)
}

/// Attaches a human-readable purpose to the operation.
pub fn operation_purpose(
    application_name: &str,
    application_version: &str,
    code_location: &str,
    purpose: &str,
) -> Result<Control, ClientError> {
    let value = ber::encode(ber::seq(vec![
        ber::ctx_prim(0, application_name.as_bytes().to_vec()),
        ber::ctx_prim(1, application_version.as_bytes().to_vec()),
        ber::ctx_prim(2, code_location.as_bytes().to_vec()),
        ber::ctx_prim(3, purpose.as_bytes().to_vec()),
    ]))?;
    Ok(Control::with_value(oid::OPERATION_PURPOSE, false, value))
}

/// Requests password-policy warnings and errors in the response.
#[must_use]
pub fn password_policy() -> Control {
    Control::flag(oid::PASSWORD_POLICY, false)
}

/// Requests detailed password-quality validation results.
#[must_use]
pub fn password_validation_details() -> Control {
    Control::flag(oid::PASSWORD_VALIDATION_DETAILS, false)
}

/// Retires the current password when setting a new one.
#[must_use]
pub fn retire_password() -> Control {
    Control::flag(oid::RETIRE_PASSWORD, false)
}

/// Purges the current password when setting a new one.
#[must_use]
pub fn purge_password() -> Control {
    Control::flag(oid::PURGE_PASSWORD, false)
}

/// Captures selected attributes of the entry before the change.
pub fn pre_read(attributes: &[String]) -> Result<Control, ClientError> {
    attribute_selection_control(oid::PRE_READ, attributes)
}

/// Captures selected attributes of the entry after the change.
pub fn post_read(attributes: &[String]) -> Result<Control, ClientError> {
    attribute_selection_control(oid::POST_READ, attributes)
}

fn attribute_selection_control(
    control_oid: &str,
    attributes: &[String],
) -> Result<Control, ClientError> {
    let attrs = attributes
        .iter()
        .map(|a| ber::octet_string(a.as_bytes().to_vec()))
        .collect();
    let value = ber::encode(ber::seq(attrs))?;
    Ok(Control::with_value(control_oid, true, value))
}

/// Proxied authorization v1, identifying the authorization user by DN.
pub fn proxied_auth_v1(dn: &str) -> Result<Control, ClientError> {
    let value = ber::encode(ber::seq(vec![ber::octet_string(dn.as_bytes().to_vec())]))?;
    Ok(Control::with_value(oid::PROXIED_AUTH_V1, true, value))
}

/// Proxied authorization v2, identifying the authorization user by
/// authorization ID (`dn:...` or `u:...`). The value is the raw authzId.
#[must_use]
pub fn proxied_auth_v2(authz_id: &str) -> Control {
    Control::with_value(oid::PROXIED_AUTH_V2, true, authz_id.as_bytes().to_vec())
}

/// Prevents referential-integrity processing for a delete or modify DN.
#[must_use]
pub fn suppress_referential_integrity_updates() -> Control {
    Control::flag(oid::SUPPRESS_REFERENTIAL_INTEGRITY_UPDATES, true)
}

/// Ties an operation to an active transaction.
#[must_use]
pub fn transaction_specification(txn_id: &[u8]) -> Control {
    Control::with_value(oid::TRANSACTION_SPECIFICATION, true, txn_id.to_vec())
}

/// Operational-attribute categories whose updates can be suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressType {
    LastAccessTime,
    LastLoginTime,
    LastLoginIp,
    LastMod,
}

impl SuppressType {
    fn wire_value(self) -> i64 {
        match self {
            SuppressType::LastAccessTime => 0,
            SuppressType::LastLoginTime => 1,
            SuppressType::LastLoginIp => 2,
            SuppressType::LastMod => 3,
        }
    }

    /// The command-line spelling of this suppress type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SuppressType::LastAccessTime => "last-access-time",
            SuppressType::LastLoginTime => "last-login-time",
            SuppressType::LastLoginIp => "last-login-ip",
            SuppressType::LastMod => "lastmod",
        }
    }
}

impl FromStr for SuppressType {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "last-access-time" => Ok(SuppressType::LastAccessTime),
            "last-login-time" => Ok(SuppressType::LastLoginTime),
            "last-login-ip" => Ok(SuppressType::LastLoginIp),
            "lastmod" => Ok(SuppressType::LastMod),
            other => Err(ClientError::Param(format!(
                "invalid suppress type {other:?} (expected last-access-time, \
                 last-login-time, last-login-ip, or lastmod)"
            ))),
        }
    }
}

/// Suppresses updates to the given operational attributes.
pub fn suppress_operational_attribute_updates(
    types: &[SuppressType],
) -> Result<Control, ClientError> {
    let elements = types
        .iter()
        .map(|t| ber::enumerated(t.wire_value()))
        .collect();
    let value = ber::encode(ber::seq(vec![ber::ctx_seq(0, elements)]))?;
    Ok(Control::with_value(
        oid::SUPPRESS_OPERATIONAL_ATTRIBUTE_UPDATE,
        false,
        value,
    ))
}

/// Local assurance levels for assured replication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssuredLocalLevel {
    None,
    ReceivedAnyServer,
    ProcessedAllServers,
}

impl AssuredLocalLevel {
    fn wire_value(self) -> i64 {
        match self {
            AssuredLocalLevel::None => 0,
            AssuredLocalLevel::ReceivedAnyServer => 1,
            AssuredLocalLevel::ProcessedAllServers => 2,
        }
    }
}

impl FromStr for AssuredLocalLevel {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(AssuredLocalLevel::None),
            "received-any-server" => Ok(AssuredLocalLevel::ReceivedAnyServer),
            "processed-all-servers" => Ok(AssuredLocalLevel::ProcessedAllServers),
            other => Err(ClientError::Param(format!(
                "invalid assured replication local level {other:?}"
            ))),
        }
    }
}

/// Remote assurance levels for assured replication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssuredRemoteLevel {
    None,
    ReceivedAnyRemoteLocation,
    ReceivedAllRemoteLocations,
    ProcessedAllRemoteServers,
}

impl AssuredRemoteLevel {
    fn wire_value(self) -> i64 {
        match self {
            AssuredRemoteLevel::None => 0,
            AssuredRemoteLevel::ReceivedAnyRemoteLocation => 1,
            AssuredRemoteLevel::ReceivedAllRemoteLocations => 2,
            AssuredRemoteLevel::ProcessedAllRemoteServers => 3,
        }
    }
}

impl FromStr for AssuredRemoteLevel {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(AssuredRemoteLevel::None),
            "received-any-remote-location" => Ok(AssuredRemoteLevel::ReceivedAnyRemoteLocation),
            "received-all-remote-locations" => Ok(AssuredRemoteLevel::ReceivedAllRemoteLocations),
            "processed-all-remote-servers" => Ok(AssuredRemoteLevel::ProcessedAllRemoteServers),
            other => Err(ClientError::Param(format!(
                "invalid assured replication remote level {other:?}"
            ))),
        }
    }
}

/// Requests replication assurance for the operation. The requested level is
/// used as both the minimum and maximum for its scope.
pub fn assured_replication(
    local: Option<AssuredLocalLevel>,
    remote: Option<AssuredRemoteLevel>,
    timeout_millis: Option<u64>,
) -> Result<Control, ClientError> {
    let mut elements = Vec::new();
    if let Some(level) = local {
        elements.push(ber::ctx_enum(0, level.wire_value()));
        elements.push(ber::ctx_enum(1, level.wire_value()));
    }
    if let Some(level) = remote {
        elements.push(ber::ctx_enum(2, level.wire_value()));
        elements.push(ber::ctx_enum(3, level.wire_value()));
    }
    if let Some(timeout) = timeout_millis {
        let timeout = i64::try_from(timeout)
            .map_err(|_| ClientError::Param("assured replication timeout too large".into()))?;
        elements.push(ber::ctx_int(4, timeout));
    }
    let value = ber::encode(ber::seq(elements))?;
    Ok(Control::with_value(oid::ASSURED_REPLICATION, true, value))
}

/// The simple paged results request control.
pub fn paged_results(size: u32, cookie: &[u8]) -> Result<Control, ClientError> {
    let value = ber::encode(ber::seq(vec![
        ber::integer(i64::from(size)),
        ber::octet_string(cookie.to_vec()),
    ]))?;
    Ok(Control::with_value(oid::PAGED_RESULTS, false, value))
}

/// The decoded simple paged results response control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedResultsInfo {
    /// The server's size estimate (0 when unknown).
    pub size: u32,
    /// The continuation cookie; empty means the result set is exhausted.
    pub cookie: Vec<u8>,
}

impl PagedResultsInfo {
    /// Whether more pages remain.
    #[must_use]
    pub fn more_pages(&self) -> bool {
        !self.cookie.is_empty()
    }
}

/// Extracts and decodes the paged results response control, if present.
pub fn find_paged_results(result: &OperationResult) -> Result<Option<PagedResultsInfo>, ClientError> {
    let Some(control) = result.get_response_control(oid::PAGED_RESULTS) else {
        return Ok(None);
    };
    let Some(value) = &control.value else {
        return Err(ClientError::decode(
            "paged results response control",
            "control has no value",
        ));
    };
    let elements = ber::expect_sequence(ber::decode(value)?)?;
    if elements.len() != 2 {
        return Err(ClientError::decode(
            "paged results response control",
            format!("expected 2 elements, got {}", elements.len()),
        ));
    }
    let size_bytes = ber::expect_bytes(elements[0].clone())?;
    let size = u32::try_from(ber::decode_uint(&size_bytes)).unwrap_or(u32::MAX);
    let cookie = ber::expect_bytes(elements[1].clone())?;
    Ok(Some(PagedResultsInfo { size, cookie }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result_code::ResultCode;

    #[test]
    fn test_flag_controls_have_no_value() {
        for (control, expected_oid, critical) in [
            (no_op(), oid::NO_OP, true),
            (manage_dsa_it(), oid::MANAGE_DSA_IT, true),
            (permissive_modify(), oid::PERMISSIVE_MODIFY, false),
            (hard_delete(), oid::HARD_DELETE, true),
            (subtree_delete(), oid::SUBTREE_DELETE, true),
            (undelete(), oid::UNDELETE, true),
            (password_policy(), oid::PASSWORD_POLICY, false),
            (retire_password(), oid::RETIRE_PASSWORD, false),
            (purge_password(), oid::PURGE_PASSWORD, false),
        ] {
            assert_eq!(control.oid, expected_oid);
            assert_eq!(control.critical, critical);
            assert!(control.value.is_none());
        }
    }

    #[test]
    fn test_assertion_control_encodes_filter() {
        let control = assertion("(objectClass=person)").unwrap();
        assert_eq!(control.oid, oid::ASSERTION);
        assert!(control.critical);
        let value = control.value.unwrap();
        assert_eq!(value[0], 0xA3);
    }

    #[test]
    fn test_assertion_control_rejects_bad_filter() {
        let err = assertion("(unbalanced").unwrap_err();
        assert_eq!(err.result_code(), ResultCode::FILTER_ERROR);
    }

    #[test]
    fn test_proxied_auth_v2_value_is_raw_authzid() {
        let control = proxied_auth_v2("dn:uid=proxy,dc=example,dc=com");
        assert_eq!(
            control.value.as_deref(),
            Some(&b"dn:uid=proxy,dc=example,dc=com"[..])
        );
    }

    #[test]
    fn test_transaction_specification_carries_raw_id() {
        let control = transaction_specification(b"txn-123");
        assert_eq!(control.oid, oid::TRANSACTION_SPECIFICATION);
        assert!(control.critical);
        assert_eq!(control.value.as_deref(), Some(&b"txn-123"[..]));
    }

    #[test]
    fn test_paged_results_round_trip() {
        let request = paged_results(2, b"").unwrap();
        // SEQUENCE { INTEGER 2, OCTET STRING "" }
        assert_eq!(
            request.value.as_deref(),
            Some(&[0x30, 0x05, 0x02, 0x01, 0x02, 0x04, 0x00][..])
        );

        let mut raw = ldap3::LdapResult {
            rc: 0,
            matched: String::new(),
            text: String::new(),
            refs: vec![],
            ctrls: vec![ldap3::controls::Control(
                None,
                ldap3::controls::RawControl {
                    ctype: oid::PAGED_RESULTS.to_string(),
                    crit: false,
                    val: paged_results(0, b"c1").unwrap().value,
                },
            )],
        };
        raw.rc = 0;
        let result = OperationResult::from_ldap(raw);
        let info = find_paged_results(&result).unwrap().unwrap();
        assert_eq!(info.cookie, b"c1");
        assert!(info.more_pages());
    }

    #[test]
    fn test_find_paged_results_absent() {
        let result = OperationResult::new(ResultCode::SUCCESS);
        assert!(find_paged_results(&result).unwrap().is_none());
    }

    #[test]
    fn test_suppress_types_parse() {
        assert_eq!(
            "last-access-time".parse::<SuppressType>().unwrap(),
            SuppressType::LastAccessTime
        );
        assert_eq!(
            "LASTMOD".parse::<SuppressType>().unwrap(),
            SuppressType::LastMod
        );
        assert!("nonsense".parse::<SuppressType>().is_err());
    }

    #[test]
    fn test_suppress_control_value() {
        let control = suppress_operational_attribute_updates(&[
            SuppressType::LastAccessTime,
            SuppressType::LastMod,
        ])
        .unwrap();
        // SEQUENCE { [0] { ENUMERATED 0, ENUMERATED 3 } }
        assert_eq!(
            control.value.as_deref(),
            Some(&[0x30, 0x08, 0xA0, 0x06, 0x0A, 0x01, 0x00, 0x0A, 0x01, 0x03][..])
        );
    }

    #[test]
    fn test_assured_replication_levels() {
        let control = assured_replication(
            Some(AssuredLocalLevel::ProcessedAllServers),
            Some(AssuredRemoteLevel::ReceivedAnyRemoteLocation),
            Some(5000),
        )
        .unwrap();
        assert!(control.critical);
        let value = control.value.unwrap();
        // [0],[1] local min/max; [2],[3] remote min/max; [4] timeout.
        let parsed = crate::ber::decode(&value).unwrap();
        let elements = parsed.expect_constructed().unwrap();
        assert_eq!(elements.len(), 5);
        assert_eq!(elements[0].id, 0);
        assert_eq!(elements[4].id, 4);
    }

    #[test]
    fn test_parse_arg_forms() {
        let c = Control::parse_arg("1.2.3.4").unwrap();
        assert!(!c.critical);
        assert!(c.value.is_none());

        let c = Control::parse_arg("1.2.3.4:true").unwrap();
        assert!(c.critical);

        let c = Control::parse_arg("1.2.3.4:false:hello").unwrap();
        assert_eq!(c.value.as_deref(), Some(&b"hello"[..]));

        let c = Control::parse_arg("1.2.3.4:true::aGk=").unwrap();
        assert_eq!(c.value.as_deref(), Some(&b"hi"[..]));

        assert!(Control::parse_arg("not-an-oid").is_err());
        assert!(Control::parse_arg("1.2.3.4:maybe").is_err());
    }
}
