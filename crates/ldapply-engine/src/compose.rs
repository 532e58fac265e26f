//! Request composition.
//!
//! Turns a change record into a dispatchable request: the record's own
//! controls first, then the globally configured per-operation-type set,
//! then any controls derived from the record's content (undelete, password
//! handling).

use ldapply_client::controls;
use ldapply_client::request::{
    AddUpdate, DeleteUpdate, ModChange, ModOp, ModifyDnUpdate, ModifyUpdate,
};
use ldapply_client::{Control, UpdateRequest};
use ldapply_ldif::{AddRecord, DeleteRecord, ModType, ModifyDnRecord, ModifyRecord, RecordControl};

use crate::settings::ControlSettings;

/// Attribute that holds the primary password of an entry.
const ATTR_USER_PASSWORD: &str = "userpassword";
/// Attribute that holds auth-password values (RFC 3112).
const ATTR_AUTH_PASSWORD: &str = "authpassword";
/// Attribute naming the soft-deleted entry an add should resurrect.
const ATTR_UNDELETE_FROM_DN: &str = "ds-undelete-from-dn";

fn record_controls(record_controls: &[RecordControl]) -> Vec<Control> {
    record_controls
        .iter()
        .map(|rc| Control {
            oid: rc.oid.clone(),
            critical: rc.critical,
            value: rc.value.clone(),
        })
        .collect()
}

/// Composes an add request.
pub fn add_request(
    record: &AddRecord,
    global_controls: &[Control],
    settings: &ControlSettings,
) -> UpdateRequest {
    let mut controls_list = record_controls(&record.controls);
    controls_list.extend(global_controls.iter().cloned());

    if settings.allow_undelete && record.get_attribute(ATTR_UNDELETE_FROM_DN).is_some() {
        controls_list.push(controls::undelete());
    }
    if settings.password_validation_details
        && (record.get_attribute(ATTR_USER_PASSWORD).is_some()
            || record.get_attribute(ATTR_AUTH_PASSWORD).is_some())
    {
        controls_list.push(controls::password_validation_details());
    }

    UpdateRequest::Add(AddUpdate {
        dn: record.dn.clone(),
        attributes: record
            .attributes
            .iter()
            .map(|attr| (attr.name.clone(), attr.values.clone()))
            .collect(),
        controls: controls_list,
    })
}

/// Composes a delete request.
pub fn delete_request(record: &DeleteRecord, global_controls: &[Control]) -> UpdateRequest {
    let mut controls_list = record_controls(&record.controls);
    controls_list.extend(global_controls.iter().cloned());
    UpdateRequest::Delete(DeleteUpdate {
        dn: record.dn.clone(),
        controls: controls_list,
    })
}

/// Composes a modify request, attaching password-change controls when a
/// modification targets a password attribute.
pub fn modify_request(
    record: &ModifyRecord,
    global_controls: &[Control],
    settings: &ControlSettings,
) -> UpdateRequest {
    let mut controls_list = record_controls(&record.controls);
    controls_list.extend(global_controls.iter().cloned());

    if settings.retire_current_password
        || settings.purge_current_password
        || settings.password_validation_details
    {
        let touches_password = record.modifications.iter().any(|m| {
            let base = m.base_attribute();
            base == ATTR_USER_PASSWORD || base == ATTR_AUTH_PASSWORD
        });
        if touches_password {
            if settings.retire_current_password {
                controls_list.push(controls::retire_password());
            } else if settings.purge_current_password {
                controls_list.push(controls::purge_password());
            }
            if settings.password_validation_details {
                controls_list.push(controls::password_validation_details());
            }
        }
    }

    UpdateRequest::Modify(ModifyUpdate {
        dn: record.dn.clone(),
        changes: record
            .modifications
            .iter()
            .map(|m| ModChange {
                op: match m.op {
                    ModType::Add => ModOp::Add,
                    ModType::Delete => ModOp::Delete,
                    ModType::Replace => ModOp::Replace,
                    ModType::Increment => ModOp::Increment,
                },
                attribute: m.attribute.clone(),
                values: m.values.clone(),
            })
            .collect(),
        controls: controls_list,
    })
}

/// Composes a modify DN request.
pub fn modify_dn_request(record: &ModifyDnRecord, global_controls: &[Control]) -> UpdateRequest {
    let mut controls_list = record_controls(&record.controls);
    controls_list.extend(global_controls.iter().cloned());
    UpdateRequest::ModifyDn(ModifyDnUpdate {
        dn: record.dn.clone(),
        new_rdn: record.new_rdn.clone(),
        delete_old_rdn: record.delete_old_rdn,
        new_superior: record.new_superior.clone(),
        controls: controls_list,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldapply_client::controls::oid;
    use ldapply_ldif::{Attribute, Modification};

    fn oids(request: &UpdateRequest) -> Vec<&str> {
        request.controls().iter().map(|c| c.oid.as_str()).collect()
    }

    fn add_record(attrs: Vec<Attribute>) -> AddRecord {
        AddRecord {
            dn: "uid=a,dc=example,dc=com".to_string(),
            attributes: attrs,
            controls: vec![],
        }
    }

    #[test]
    fn test_record_controls_precede_global_controls() {
        let mut record = add_record(vec![Attribute {
            name: "cn".to_string(),
            values: vec![b"a".to_vec()],
        }]);
        record.controls = vec![RecordControl {
            oid: "9.9.9.9".to_string(),
            critical: true,
            value: None,
        }];
        let global = vec![Control::flag("1.1.1.1", false)];
        let request = add_request(&record, &global, &ControlSettings::default());
        assert_eq!(oids(&request), vec!["9.9.9.9", "1.1.1.1"]);
    }

    #[test]
    fn test_undelete_control_requires_flag_and_attribute() {
        let mut settings = ControlSettings::default();
        let with_marker = add_record(vec![Attribute {
            name: "ds-undelete-from-dn".to_string(),
            values: vec![b"uid=old,dc=example,dc=com".to_vec()],
        }]);

        let request = add_request(&with_marker, &[], &settings);
        assert!(!oids(&request).contains(&oid::UNDELETE));

        settings.allow_undelete = true;
        let request = add_request(&with_marker, &[], &settings);
        assert!(oids(&request).contains(&oid::UNDELETE));

        let plain = add_record(vec![Attribute {
            name: "cn".to_string(),
            values: vec![b"a".to_vec()],
        }]);
        let request = add_request(&plain, &[], &settings);
        assert!(!oids(&request).contains(&oid::UNDELETE));
    }

    #[test]
    fn test_password_validation_on_add() {
        let mut settings = ControlSettings::default();
        settings.password_validation_details = true;
        let record = add_record(vec![Attribute {
            name: "userPassword".to_string(),
            values: vec![b"secret".to_vec()],
        }]);
        let request = add_request(&record, &[], &settings);
        assert!(oids(&request).contains(&oid::PASSWORD_VALIDATION_DETAILS));
    }

    fn password_modify() -> ModifyRecord {
        ModifyRecord {
            dn: "uid=a,dc=example,dc=com".to_string(),
            modifications: vec![Modification {
                op: ModType::Replace,
                attribute: "userPassword;x-option".to_string(),
                values: vec![b"new-secret".to_vec()],
            }],
            controls: vec![],
        }
    }

    #[test]
    fn test_retire_password_on_modify() {
        let mut settings = ControlSettings::default();
        settings.retire_current_password = true;
        let request = modify_request(&password_modify(), &[], &settings);
        assert!(oids(&request).contains(&oid::RETIRE_PASSWORD));
        assert!(!oids(&request).contains(&oid::PURGE_PASSWORD));
    }

    #[test]
    fn test_purge_password_on_modify() {
        let mut settings = ControlSettings::default();
        settings.purge_current_password = true;
        settings.password_validation_details = true;
        let request = modify_request(&password_modify(), &[], &settings);
        assert!(oids(&request).contains(&oid::PURGE_PASSWORD));
        assert!(oids(&request).contains(&oid::PASSWORD_VALIDATION_DETAILS));
    }

    #[test]
    fn test_password_controls_skip_non_password_modify() {
        let mut settings = ControlSettings::default();
        settings.retire_current_password = true;
        let record = ModifyRecord {
            dn: "uid=a,dc=example,dc=com".to_string(),
            modifications: vec![Modification {
                op: ModType::Replace,
                attribute: "mail".to_string(),
                values: vec![b"a@example.com".to_vec()],
            }],
            controls: vec![],
        };
        let request = modify_request(&record, &[], &settings);
        assert!(oids(&request).is_empty());
    }

    #[test]
    fn test_modify_preserves_change_order() {
        let record = ModifyRecord {
            dn: "uid=a,dc=example,dc=com".to_string(),
            modifications: vec![
                Modification {
                    op: ModType::Add,
                    attribute: "description".to_string(),
                    values: vec![b"one".to_vec()],
                },
                Modification {
                    op: ModType::Increment,
                    attribute: "loginCount".to_string(),
                    values: vec![b"1".to_vec()],
                },
            ],
            controls: vec![],
        };
        let UpdateRequest::Modify(modify) = modify_request(&record, &[], &ControlSettings::default())
        else {
            panic!("expected modify request");
        };
        assert_eq!(modify.changes.len(), 2);
        assert_eq!(modify.changes[0].op, ModOp::Add);
        assert_eq!(modify.changes[1].op, ModOp::Increment);
    }

    #[test]
    fn test_modify_dn_request_carries_fields() {
        let record = ModifyDnRecord {
            dn: "uid=a,ou=people,dc=example,dc=com".to_string(),
            new_rdn: "uid=b".to_string(),
            delete_old_rdn: true,
            new_superior: Some("ou=staff,dc=example,dc=com".to_string()),
            controls: vec![],
        };
        let UpdateRequest::ModifyDn(moddn) = modify_dn_request(&record, &[]) else {
            panic!("expected modify DN request");
        };
        assert_eq!(moddn.new_rdn, "uid=b");
        assert!(moddn.delete_old_rdn);
        assert_eq!(
            moddn.new_superior.as_deref(),
            Some("ou=staff,dc=example,dc=com")
        );
    }
}
