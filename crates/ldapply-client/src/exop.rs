//! Extended operations.
//!
//! Builders for the extended requests the tool issues (transactions,
//! multi-update, administrative session) and decoding of their responses.
//! Values are BER-built the same way `ldap3` builds its own exop payloads.

use ldap3::exop::Exop;

use crate::ber;
use crate::error::ClientError;
use crate::request::UpdateRequest;
use crate::result::ExtendedOutcome;

/// OID of the start-transaction extended request (RFC 5805).
pub const START_TRANSACTION_OID: &str = "1.3.6.1.1.21.1";
/// OID of the end-transaction extended request (RFC 5805).
pub const END_TRANSACTION_OID: &str = "1.3.6.1.1.21.3";
/// OID of the proprietary multi-update extended request.
pub const MULTI_UPDATE_OID: &str = "1.3.6.1.4.1.30221.2.6.17";
/// OID of the proprietary start-administrative-session extended request.
pub const START_ADMIN_SESSION_OID: &str = "1.3.6.1.4.1.30221.1.6.1";
/// OID of the notice-of-disconnection unsolicited notification (RFC 4511).
pub const NOTICE_OF_DISCONNECTION_OID: &str = "1.3.6.1.4.1.1466.20036";

/// Builds a start-transaction request. The request carries no value; the
/// response value is the transaction identifier.
#[must_use]
pub fn start_transaction() -> Exop {
    Exop {
        name: Some(START_TRANSACTION_OID.to_string()),
        val: None,
    }
}

/// Extracts the transaction identifier from a start-transaction response.
pub fn start_transaction_id(outcome: &ExtendedOutcome) -> Result<Vec<u8>, ClientError> {
    outcome
        .value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ClientError::decode(
                "start transaction response",
                "response has no transaction identifier",
            )
        })
}

/// Builds an end-transaction request:
/// `SEQUENCE { commit BOOLEAN DEFAULT TRUE, identifier OCTET STRING }`.
pub fn end_transaction(txn_id: &[u8], commit: bool) -> Result<Exop, ClientError> {
    let mut elements = Vec::with_capacity(2);
    if !commit {
        // TRUE is the default and is omitted.
        elements.push(ber::boolean(false));
    }
    elements.push(ber::octet_string(txn_id.to_vec()));
    let value = ber::encode(ber::seq(elements))?;
    Ok(Exop {
        name: Some(END_TRANSACTION_OID.to_string()),
        val: Some(value),
    })
}

/// Builds a start-administrative-session request carrying the client name,
/// used as a post-connect step before the bind.
pub fn start_administrative_session(client_name: &str) -> Result<Exop, ClientError> {
    let value = ber::encode(ber::seq(vec![ber::ctx_prim(
        0,
        client_name.as_bytes().to_vec(),
    )]))?;
    Ok(Exop {
        name: Some(START_ADMIN_SESSION_OID.to_string()),
        val: Some(value),
    })
}

/// Error behavior of a multi-update extended request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiUpdateErrorBehavior {
    /// All updates succeed or none are applied.
    Atomic,
    /// Stop at the first failure, keeping earlier updates.
    AbortOnError,
    /// Attempt every update regardless of failures.
    ContinueOnError,
}

impl MultiUpdateErrorBehavior {
    fn wire_value(self) -> i64 {
        match self {
            MultiUpdateErrorBehavior::Atomic => 0,
            MultiUpdateErrorBehavior::AbortOnError => 1,
            MultiUpdateErrorBehavior::ContinueOnError => 2,
        }
    }

    /// The command-line spelling of this behavior.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MultiUpdateErrorBehavior::Atomic => "atomic",
            MultiUpdateErrorBehavior::AbortOnError => "abort-on-error",
            MultiUpdateErrorBehavior::ContinueOnError => "continue-on-error",
        }
    }
}

impl std::str::FromStr for MultiUpdateErrorBehavior {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "atomic" => Ok(MultiUpdateErrorBehavior::Atomic),
            "abort-on-error" => Ok(MultiUpdateErrorBehavior::AbortOnError),
            "continue-on-error" => Ok(MultiUpdateErrorBehavior::ContinueOnError),
            other => Err(ClientError::Param(format!(
                "invalid multi-update error behavior {other:?}"
            ))),
        }
    }
}

/// Builds a multi-update request packaging the buffered requests in order:
/// `SEQUENCE { errorBehavior ENUMERATED, requests SEQUENCE OF
/// SEQUENCE { updateOp, controls [0] OPTIONAL } }`.
pub fn multi_update(
    behavior: MultiUpdateErrorBehavior,
    requests: &[UpdateRequest],
) -> Result<Exop, ClientError> {
    let mut request_elements = Vec::with_capacity(requests.len());
    for request in requests {
        let op = encode_protocol_op(request)?;
        let mut element = vec![op];
        if !request.controls().is_empty() {
            let controls = request
                .controls()
                .iter()
                .map(encode_control)
                .collect::<Result<Vec<_>, _>>()?;
            element.push(ber::ctx_seq(0, controls));
        }
        request_elements.push(ber::seq(element));
    }

    let value = ber::encode(ber::seq(vec![
        ber::enumerated(behavior.wire_value()),
        ber::seq(request_elements),
    ]))?;
    Ok(Exop {
        name: Some(MULTI_UPDATE_OID.to_string()),
        val: Some(value),
    })
}

/// Encodes one request as its RFC 4511 protocol op.
fn encode_protocol_op(request: &UpdateRequest) -> Result<lber::structures::Tag, ClientError> {
    let op = match request {
        UpdateRequest::Add(add) => {
            let attrs = add
                .attributes
                .iter()
                .map(|(name, values)| {
                    ber::seq(vec![
                        ber::octet_string(name.as_bytes().to_vec()),
                        ber::set(values.iter().map(|v| ber::octet_string(v.clone())).collect()),
                    ])
                })
                .collect();
            ber::app_seq(
                8,
                vec![ber::octet_string(add.dn.as_bytes().to_vec()), ber::seq(attrs)],
            )
        }
        UpdateRequest::Delete(delete) => ber::app_prim(10, delete.dn.as_bytes().to_vec()),
        UpdateRequest::Modify(modify) => {
            let changes = modify
                .changes
                .iter()
                .map(|change| {
                    ber::seq(vec![
                        ber::enumerated(change.op.wire_value()),
                        ber::seq(vec![
                            ber::octet_string(change.attribute.as_bytes().to_vec()),
                            ber::set(
                                change
                                    .values
                                    .iter()
                                    .map(|v| ber::octet_string(v.clone()))
                                    .collect(),
                            ),
                        ]),
                    ])
                })
                .collect();
            ber::app_seq(
                6,
                vec![
                    ber::octet_string(modify.dn.as_bytes().to_vec()),
                    ber::seq(changes),
                ],
            )
        }
        UpdateRequest::ModifyDn(moddn) => {
            let mut elements = vec![
                ber::octet_string(moddn.dn.as_bytes().to_vec()),
                ber::octet_string(moddn.new_rdn.as_bytes().to_vec()),
                ber::boolean(moddn.delete_old_rdn),
            ];
            if let Some(superior) = &moddn.new_superior {
                elements.push(ber::ctx_prim(0, superior.as_bytes().to_vec()));
            }
            ber::app_seq(12, elements)
        }
    };
    Ok(op)
}

/// Encodes one control as its RFC 4511 `Control` sequence. Criticality is
/// omitted when false (the protocol default).
fn encode_control(control: &crate::controls::Control) -> Result<lber::structures::Tag, ClientError> {
    let mut elements = vec![ber::octet_string(control.oid.as_bytes().to_vec())];
    if control.critical {
        elements.push(ber::boolean(true));
    }
    if let Some(value) = &control.value {
        elements.push(ber::octet_string(value.clone()));
    }
    Ok(ber::seq(elements))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::Control;
    use crate::request::{AddUpdate, DeleteUpdate, ModChange, ModOp, ModifyUpdate};

    #[test]
    fn test_start_transaction_has_no_value() {
        let exop = start_transaction();
        assert_eq!(exop.name.as_deref(), Some(START_TRANSACTION_OID));
        assert!(exop.val.is_none());
    }

    #[test]
    fn test_end_transaction_commit_omits_default() {
        let exop = end_transaction(b"txn", true).unwrap();
        // SEQUENCE { OCTET STRING "txn" }; commit TRUE is the default.
        assert_eq!(
            exop.val.as_deref(),
            Some(&[0x30, 0x05, 0x04, 0x03, b't', b'x', b'n'][..])
        );
    }

    #[test]
    fn test_end_transaction_abort_encodes_false() {
        let exop = end_transaction(b"txn", false).unwrap();
        assert_eq!(
            exop.val.as_deref(),
            Some(&[0x30, 0x08, 0x01, 0x01, 0x00, 0x04, 0x03, b't', b'x', b'n'][..])
        );
    }

    #[test]
    fn test_start_transaction_id_extraction() {
        use crate::result::{ExtendedOutcome, OperationResult};
        use crate::result_code::ResultCode;

        let outcome = ExtendedOutcome {
            result: OperationResult::new(ResultCode::SUCCESS),
            name: None,
            value: Some(b"txn-1".to_vec()),
        };
        assert_eq!(start_transaction_id(&outcome).unwrap(), b"txn-1");

        let empty = ExtendedOutcome::from_result(OperationResult::new(ResultCode::SUCCESS));
        assert!(start_transaction_id(&empty).is_err());
    }

    #[test]
    fn test_multi_update_preserves_order() {
        let requests = vec![
            UpdateRequest::Add(AddUpdate {
                dn: "uid=a,dc=x".to_string(),
                attributes: vec![("cn".to_string(), vec![b"a".to_vec()])],
                controls: vec![],
            }),
            UpdateRequest::Delete(DeleteUpdate {
                dn: "uid=b,dc=x".to_string(),
                controls: vec![],
            }),
        ];
        let exop = multi_update(MultiUpdateErrorBehavior::AbortOnError, &requests).unwrap();
        assert_eq!(exop.name.as_deref(), Some(MULTI_UPDATE_OID));

        let value = exop.val.unwrap();
        let outer = crate::ber::expect_sequence(crate::ber::decode(&value).unwrap()).unwrap();
        assert_eq!(outer.len(), 2);
        // errorBehavior = abort-on-error(1)
        assert_eq!(
            crate::ber::expect_bytes(outer[0].clone()).unwrap(),
            vec![1u8]
        );
        let inner = outer[1].clone().expect_constructed().unwrap();
        assert_eq!(inner.len(), 2);
        // First buffered request is the AddRequest (application tag 8).
        let first = inner[0].clone().expect_constructed().unwrap();
        assert_eq!(first[0].id, 8);
        let second = inner[1].clone().expect_constructed().unwrap();
        assert_eq!(second[0].id, 10);
    }

    #[test]
    fn test_multi_update_inner_controls() {
        let requests = vec![UpdateRequest::Modify(ModifyUpdate {
            dn: "uid=a,dc=x".to_string(),
            changes: vec![ModChange {
                op: ModOp::Replace,
                attribute: "cn".to_string(),
                values: vec![b"b".to_vec()],
            }],
            controls: vec![Control::flag("1.2.3.4", true)],
        })];
        let exop = multi_update(MultiUpdateErrorBehavior::Atomic, &requests).unwrap();
        let value = exop.val.unwrap();
        let outer = crate::ber::expect_sequence(crate::ber::decode(&value).unwrap()).unwrap();
        let inner = outer[1].clone().expect_constructed().unwrap();
        let element = inner[0].clone().expect_constructed().unwrap();
        // updateOp followed by the [0]-tagged control list.
        assert_eq!(element.len(), 2);
        assert_eq!(element[0].id, 6);
        assert_eq!(element[1].id, 0);
    }

    #[test]
    fn test_admin_session_value() {
        let exop = start_administrative_session("ldapply").unwrap();
        assert_eq!(exop.name.as_deref(), Some(START_ADMIN_SESSION_OID));
        let value = exop.val.unwrap();
        let elements = crate::ber::expect_sequence(crate::ber::decode(&value).unwrap()).unwrap();
        assert_eq!(
            crate::ber::expect_bytes(elements[0].clone()).unwrap(),
            b"ldapply"
        );
    }
}
