//! Per-operation-type request control sets.
//!
//! Builds the global control lists once per run from the configured
//! palette. Insertion order is observable (controls are sent in list
//! order), so the construction order here is part of the behavior.

use ldapply_client::controls::{self, Control, SuppressType};
use ldapply_client::{ClientError, OperationType};

use crate::settings::{ControlSettings, Settings};

/// The controls attached to each operation type.
#[derive(Debug, Clone, Default)]
pub struct RequestControlSets {
    pub add: Vec<Control>,
    pub delete: Vec<Control>,
    pub modify: Vec<Control>,
    pub modify_dn: Vec<Control>,
    pub search: Vec<Control>,
}

impl RequestControlSets {
    /// The control list for one operation type.
    #[must_use]
    pub fn for_type(&self, operation: OperationType) -> &[Control] {
        match operation {
            OperationType::Add => &self.add,
            OperationType::Delete => &self.delete,
            OperationType::Modify => &self.modify,
            OperationType::ModifyDn => &self.modify_dn,
            OperationType::Search => &self.search,
        }
    }

    /// Appends a control to all four modifying sets (not search). Used for
    /// the transaction-specification control once a transaction starts.
    pub fn push_modifying(&mut self, control: &Control) {
        self.add.push(control.clone());
        self.delete.push(control.clone());
        self.modify.push(control.clone());
        self.modify_dn.push(control.clone());
    }

    fn push_all(&mut self, control: &Control) {
        self.push_modifying(control);
    }
}

/// Builds the per-operation-type control sets for a run.
pub fn build(settings: &Settings) -> Result<RequestControlSets, ClientError> {
    let c = &settings.controls;
    let mut sets = RequestControlSets::default();

    sets.add.extend(c.add_controls.iter().cloned());
    sets.delete.extend(c.delete_controls.iter().cloned());
    sets.modify.extend(c.modify_controls.iter().cloned());
    sets.modify_dn.extend(c.modify_dn_controls.iter().cloned());
    for control in &c.operation_controls {
        sets.push_all(control);
    }

    if c.no_operation {
        sets.push_all(&controls::no_op());
    }
    if c.ignore_no_user_modification {
        sets.add.push(controls::ignore_no_user_modification());
    }
    if c.name_with_entry_uuid {
        sets.add.push(controls::name_with_entry_uuid());
    }
    if c.permissive_modify {
        sets.modify.push(controls::permissive_modify());
    }
    if c.suppress_referential_integrity_updates {
        let control = controls::suppress_referential_integrity_updates();
        sets.delete.push(control.clone());
        sets.modify_dn.push(control);
    }
    if !c.suppress_operational_attribute_updates.is_empty() {
        let control = controls::suppress_operational_attribute_updates(
            &c.suppress_operational_attribute_updates,
        )?;
        sets.push_all(&control);
    }
    if c.password_policy {
        let control = controls::password_policy();
        sets.add.push(control.clone());
        sets.modify.push(control);
    }
    if c.assured_replication {
        let control = controls::assured_replication(
            c.assured_replication_local_level,
            c.assured_replication_remote_level,
            c.assured_replication_timeout
                .map(|t| t.as_millis().min(u128::from(u64::MAX)) as u64),
        )?;
        sets.push_all(&control);
    }
    if c.hard_delete {
        sets.delete.push(controls::hard_delete());
    }
    if c.replication_repair {
        sets.push_all(&controls::replication_repair());
    }
    if c.soft_delete {
        sets.delete.push(controls::soft_delete()?);
    }
    if c.subtree_delete {
        sets.delete.push(controls::subtree_delete());
    }
    if let Some(filter) = &c.assertion_filter {
        sets.push_all(&controls::assertion(filter)?);
    }
    if let Some(purpose) = &c.operation_purpose {
        let control = controls::operation_purpose(
            "ldapply",
            env!("CARGO_PKG_VERSION"),
            "control_sets::build",
            purpose,
        )?;
        sets.push_all(&control);
    }
    if c.manage_dsa_it {
        sets.push_all(&controls::manage_dsa_it());
    }
    if !c.pre_read_attributes.is_empty() {
        let control = controls::pre_read(&tokenize_attributes(&c.pre_read_attributes))?;
        sets.delete.push(control.clone());
        sets.modify.push(control.clone());
        sets.modify_dn.push(control);
    }
    if !c.post_read_attributes.is_empty() {
        let control = controls::post_read(&tokenize_attributes(&c.post_read_attributes))?;
        sets.add.push(control.clone());
        sets.modify.push(control.clone());
        sets.modify_dn.push(control);
    }

    // Under transactional or multi-update grouping, proxied authorization
    // attaches to the outer request only, never to the inner operations.
    let grouped = settings.use_transaction || settings.multi_update_error_behavior.is_some();
    if !grouped {
        if let Some(control) = proxy_control(c)? {
            sets.push_all(&control);
            sets.search.push(control);
        }
    }

    Ok(sets)
}

/// The proxied-authorization control implied by the settings, if any.
pub fn proxy_control(c: &ControlSettings) -> Result<Option<Control>, ClientError> {
    if let Some(authz_id) = &c.proxy_as {
        Ok(Some(controls::proxied_auth_v2(authz_id)))
    } else if let Some(dn) = &c.proxy_v1_as {
        Ok(Some(controls::proxied_auth_v1(dn)?))
    } else {
        Ok(None)
    }
}

/// The controls attached to the bind request.
pub fn bind_controls(settings: &Settings) -> Result<Vec<Control>, ClientError> {
    let c = &settings.controls;
    let mut list = c.bind_controls.clone();

    if c.authorization_identity {
        list.push(controls::authorization_identity());
    }
    if !c.get_authorization_entry_attributes.is_empty() {
        list.push(controls::get_authorization_entry(
            &c.get_authorization_entry_attributes,
        )?);
    }
    if c.get_user_resource_limits {
        list.push(controls::get_user_resource_limits());
    }
    if c.password_policy {
        list.push(controls::password_policy());
    }
    if !c.suppress_operational_attribute_updates.is_empty() {
        // lastmod suppression does not apply to a bind.
        let types: Vec<SuppressType> = c
            .suppress_operational_attribute_updates
            .iter()
            .copied()
            .filter(|t| *t != SuppressType::LastMod)
            .collect();
        if !types.is_empty() {
            list.push(controls::suppress_operational_attribute_updates(&types)?);
        }
    }

    Ok(list)
}

/// Splits attribute list arguments on commas and whitespace.
fn tokenize_attributes(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split([',', ' ', '\t']))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldapply_client::controls::oid;
    use ldapply_client::exop::MultiUpdateErrorBehavior;

    fn oids(controls: &[Control]) -> Vec<&str> {
        controls.iter().map(|c| c.oid.as_str()).collect()
    }

    #[test]
    fn test_empty_settings_produce_empty_sets() {
        let sets = build(&Settings::default()).unwrap();
        assert!(sets.add.is_empty());
        assert!(sets.delete.is_empty());
        assert!(sets.modify.is_empty());
        assert!(sets.modify_dn.is_empty());
        assert!(sets.search.is_empty());
    }

    #[test]
    fn test_attachment_matrix() {
        let mut settings = Settings::default();
        let c = &mut settings.controls;
        c.permissive_modify = true;
        c.subtree_delete = true;
        c.hard_delete = true;
        c.suppress_referential_integrity_updates = true;
        c.ignore_no_user_modification = true;
        c.name_with_entry_uuid = true;
        c.pre_read_attributes = vec!["cn, sn".to_string()];
        c.post_read_attributes = vec!["cn".to_string()];
        c.password_policy = true;
        c.no_operation = true;
        c.manage_dsa_it = true;

        let sets = build(&settings).unwrap();

        // permissive-modify: modify only
        assert!(oids(&sets.modify).contains(&oid::PERMISSIVE_MODIFY));
        assert!(!oids(&sets.add).contains(&oid::PERMISSIVE_MODIFY));

        // delete-only controls
        for delete_only in [oid::SUBTREE_DELETE, oid::HARD_DELETE] {
            assert!(oids(&sets.delete).contains(&delete_only));
            assert!(!oids(&sets.modify).contains(&delete_only));
        }

        // suppress-referential-integrity: delete + modify DN
        assert!(oids(&sets.delete).contains(&oid::SUPPRESS_REFERENTIAL_INTEGRITY_UPDATES));
        assert!(oids(&sets.modify_dn).contains(&oid::SUPPRESS_REFERENTIAL_INTEGRITY_UPDATES));
        assert!(!oids(&sets.add).contains(&oid::SUPPRESS_REFERENTIAL_INTEGRITY_UPDATES));

        // add-only controls
        for add_only in [oid::IGNORE_NO_USER_MODIFICATION, oid::NAME_WITH_ENTRY_UUID] {
            assert!(oids(&sets.add).contains(&add_only));
            assert!(!oids(&sets.delete).contains(&add_only));
        }

        // pre-read: delete, modify, modify DN; post-read: add, modify, modify DN
        assert!(oids(&sets.delete).contains(&oid::PRE_READ));
        assert!(!oids(&sets.add).contains(&oid::PRE_READ));
        assert!(oids(&sets.add).contains(&oid::POST_READ));
        assert!(!oids(&sets.delete).contains(&oid::POST_READ));

        // password policy: add + modify
        assert!(oids(&sets.add).contains(&oid::PASSWORD_POLICY));
        assert!(oids(&sets.modify).contains(&oid::PASSWORD_POLICY));
        assert!(!oids(&sets.delete).contains(&oid::PASSWORD_POLICY));

        // cross-operation flags land on all four modifying types
        for set in [&sets.add, &sets.delete, &sets.modify, &sets.modify_dn] {
            assert!(oids(set).contains(&oid::NO_OP));
            assert!(oids(set).contains(&oid::MANAGE_DSA_IT));
        }
        // ...but not on search
        assert!(!oids(&sets.search).contains(&oid::NO_OP));
    }

    #[test]
    fn test_proxy_attaches_everywhere_in_immediate_mode() {
        let mut settings = Settings::default();
        settings.controls.proxy_as = Some("dn:uid=proxy,dc=x".to_string());
        let sets = build(&settings).unwrap();
        for set in [
            &sets.add,
            &sets.delete,
            &sets.modify,
            &sets.modify_dn,
            &sets.search,
        ] {
            assert!(oids(set).contains(&oid::PROXIED_AUTH_V2));
        }
    }

    #[test]
    fn test_proxy_omitted_under_grouping() {
        for grouped in [true, false] {
            let mut settings = Settings::default();
            settings.controls.proxy_as = Some("dn:uid=proxy,dc=x".to_string());
            if grouped {
                settings.use_transaction = true;
            } else {
                settings.multi_update_error_behavior = Some(MultiUpdateErrorBehavior::Atomic);
            }
            let sets = build(&settings).unwrap();
            for set in [
                &sets.add,
                &sets.delete,
                &sets.modify,
                &sets.modify_dn,
                &sets.search,
            ] {
                assert!(!oids(set).contains(&oid::PROXIED_AUTH_V2));
            }
        }
    }

    #[test]
    fn test_push_modifying_skips_search() {
        let mut sets = RequestControlSets::default();
        let control = ldapply_client::controls::transaction_specification(b"txn");
        sets.push_modifying(&control);
        assert_eq!(sets.add.len(), 1);
        assert_eq!(sets.modify_dn.len(), 1);
        assert!(sets.search.is_empty());
    }

    #[test]
    fn test_raw_control_args_come_first() {
        let mut settings = Settings::default();
        settings.controls.modify_controls = vec![Control::flag("1.1.1.1", false)];
        settings.controls.operation_controls = vec![Control::flag("2.2.2.2", false)];
        settings.controls.permissive_modify = true;
        let sets = build(&settings).unwrap();
        assert_eq!(
            oids(&sets.modify),
            vec!["1.1.1.1", "2.2.2.2", oid::PERMISSIVE_MODIFY]
        );
    }

    #[test]
    fn test_bind_controls() {
        let mut settings = Settings::default();
        settings.controls.authorization_identity = true;
        settings.controls.get_user_resource_limits = true;
        settings.controls.suppress_operational_attribute_updates =
            vec![SuppressType::LastAccessTime, SuppressType::LastMod];

        let list = bind_controls(&settings).unwrap();
        let listed = oids(&list);
        assert!(listed.contains(&oid::AUTHORIZATION_IDENTITY));
        assert!(listed.contains(&oid::GET_USER_RESOURCE_LIMITS));
        // lastmod is filtered out but last-access-time keeps the control.
        assert!(listed.contains(&oid::SUPPRESS_OPERATIONAL_ATTRIBUTE_UPDATE));
    }

    #[test]
    fn test_tokenize_attributes() {
        let tokens = tokenize_attributes(&[
            "cn, sn".to_string(),
            "uid".to_string(),
            " givenName  mail ".to_string(),
        ]);
        assert_eq!(tokens, vec!["cn", "sn", "uid", "givenName", "mail"]);
    }
}
