//! Command-line surface.
//!
//! Long flag names follow the conventions of the classic directory tools
//! (`--useTransaction`, `--modifyEntriesMatchingFilter`, ...), so existing
//! scripts port over without relearning.

use std::path::PathBuf;

use clap::Parser;

use ldapply_client::Control;

/// Apply LDIF change records to an LDAP directory server.
#[derive(Debug, Parser)]
#[command(name = "ldapply", version, about, long_about = None)]
pub struct Args {
    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------
    /// Directory server hostname (repeat for failover; `host:port` works too)
    #[arg(long = "hostname", value_name = "HOST", default_value = "localhost")]
    pub hostname: Vec<String>,

    /// Directory server port used for hostnames without an explicit port
    #[arg(short = 'p', long = "port", value_name = "PORT", default_value_t = 389)]
    pub port: u16,

    /// Use LDAPS
    #[arg(short = 'Z', long = "useSSL")]
    pub use_ssl: bool,

    /// Upgrade the plain connection with StartTLS
    #[arg(short = 'q', long = "useStartTLS")]
    pub use_starttls: bool,

    /// DN to bind as
    #[arg(short = 'D', long = "bindDN", value_name = "DN", default_value = "")]
    pub bind_dn: String,

    /// Password for the bind DN
    #[arg(short = 'w', long = "bindPassword", value_name = "PASSWORD")]
    pub bind_password: Option<String>,

    /// File containing the password for the bind DN
    #[arg(short = 'j', long = "bindPasswordFile", value_name = "PATH")]
    pub bind_password_file: Option<PathBuf>,

    /// Connect timeout in milliseconds
    #[arg(
        long = "connectTimeoutMillis",
        value_name = "MILLIS",
        default_value_t = 30_000
    )]
    pub connect_timeout_millis: u64,

    /// Start an administrative session before authenticating
    #[arg(long = "useAdministrativeSession")]
    pub use_administrative_session: bool,

    // ------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------
    /// LDIF file with the changes to apply (repeatable; standard input if absent)
    #[arg(short = 'f', long = "ldifFile", value_name = "PATH")]
    pub ldif_file: Vec<PathBuf>,

    /// Character set of the LDIF input
    #[arg(
        short = 'i',
        long = "characterSet",
        value_name = "CHARSET",
        default_value = "UTF-8"
    )]
    pub character_set: String,

    /// File to which rejected changes are written
    #[arg(short = 'R', long = "rejectFile", value_name = "PATH")]
    pub reject_file: Option<PathBuf>,

    /// Strip trailing spaces from LDIF values instead of rejecting them
    #[arg(long = "stripTrailingSpaces")]
    pub strip_trailing_spaces: bool,

    /// Treat records without a changetype as add records
    #[arg(short = 'a', long = "defaultAdd")]
    pub default_add: bool,

    /// Write verbose output (outgoing requests, per-page search results)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------
    /// Keep processing changes after a failed operation
    #[arg(short = 'c', long = "continueOnError")]
    pub continue_on_error: bool,

    /// Report what would be done without contacting the server
    #[arg(short = 'n', long = "dryRun")]
    pub dry_run: bool,

    /// Follow a referral result one hop
    #[arg(long = "followReferrals")]
    pub follow_referrals: bool,

    /// Retry an operation when its failure made the connection unusable
    #[arg(long = "retryFailedOperations")]
    pub retry_failed_operations: bool,

    /// Maximum number of operations per second
    #[arg(long = "ratePerSecond", value_name = "N")]
    pub rate_per_second: Option<u32>,

    /// Page size for the searches issued by the bulk-modify arguments
    #[arg(long = "searchPageSize", value_name = "N")]
    pub search_page_size: Option<u32>,

    /// Process all changes in one server-side transaction
    #[arg(long = "useTransaction")]
    pub use_transaction: bool,

    /// Package all changes into one multi-update extended request
    #[arg(
        long = "multiUpdateErrorBehavior",
        value_name = "atomic|abort-on-error|continue-on-error"
    )]
    pub multi_update_error_behavior: Option<String>,

    // ------------------------------------------------------------------
    // Bulk-modify target selection
    // ------------------------------------------------------------------
    /// Apply each modify record to all entries below its DN matching this filter
    #[arg(long = "modifyEntriesMatchingFilter", value_name = "FILTER")]
    pub modify_entries_matching_filter: Vec<String>,

    /// Like --modifyEntriesMatchingFilter, reading filters from a file
    #[arg(long = "modifyEntriesMatchingFiltersFromFile", value_name = "PATH")]
    pub modify_entries_matching_filters_from_file: Vec<PathBuf>,

    /// Apply each modify record to the entry with this DN
    #[arg(long = "modifyEntryWithDN", value_name = "DN")]
    pub modify_entry_with_dn: Vec<String>,

    /// Like --modifyEntryWithDN, reading DNs from a file
    #[arg(long = "modifyEntriesWithDNsFromFile", value_name = "PATH")]
    pub modify_entries_with_dns_from_file: Vec<PathBuf>,

    // ------------------------------------------------------------------
    // Controls
    // ------------------------------------------------------------------
    /// Assertion filter the target entry must match
    #[arg(long = "assertionFilter", value_name = "FILTER")]
    pub assertion_filter: Option<String>,

    /// Allow add records carrying ds-undelete-from-dn to undelete entries
    #[arg(long = "allowUndelete")]
    pub allow_undelete: bool,

    /// Request assured replication for each operation
    #[arg(long = "assuredReplication")]
    pub assured_replication: bool,

    /// Local assurance level (none, received-any-server, processed-all-servers)
    #[arg(long = "assuredReplicationLocalLevel", value_name = "LEVEL")]
    pub assured_replication_local_level: Option<String>,

    /// Remote assurance level (none, received-any-remote-location,
    /// received-all-remote-locations, processed-all-remote-servers)
    #[arg(long = "assuredReplicationRemoteLevel", value_name = "LEVEL")]
    pub assured_replication_remote_level: Option<String>,

    /// Assured replication timeout (e.g. 500ms, 5s, 1m)
    #[arg(long = "assuredReplicationTimeout", value_name = "DURATION")]
    pub assured_replication_timeout: Option<String>,

    /// Request the authorization identity in the bind response
    #[arg(short = 'E', long = "authorizationIdentity")]
    pub authorization_identity: bool,

    /// Request the authorization entry, optionally naming attributes
    #[arg(long = "getAuthorizationEntryAttribute", value_name = "ATTR")]
    pub get_authorization_entry_attribute: Vec<String>,

    /// Request the user's resource limits in the bind response
    #[arg(long = "getUserResourceLimits")]
    pub get_user_resource_limits: bool,

    /// Permanently remove a soft-deleted entry on delete
    #[arg(long = "hardDelete")]
    pub hard_delete: bool,

    /// Allow changes to NO-USER-MODIFICATION attributes on add
    #[arg(long = "ignoreNoUserModification")]
    pub ignore_no_user_modification: bool,

    /// Target referral entries themselves instead of following them
    #[arg(long = "useManageDsaIT", alias = "manageDsaIT")]
    pub manage_dsa_it: bool,

    /// Name added entries with their entryUUID
    #[arg(long = "nameWithEntryUUID")]
    pub name_with_entry_uuid: bool,

    /// Validate each operation without applying it
    #[arg(long = "noOperation")]
    pub no_operation: bool,

    /// Human-readable purpose recorded with each operation
    #[arg(long = "operationPurpose", value_name = "PURPOSE")]
    pub operation_purpose: Option<String>,

    /// Tolerate adds of existing values and deletes of missing values
    #[arg(long = "permissiveModify")]
    pub permissive_modify: bool,

    /// Attributes to capture from the entry after the change (repeatable,
    /// comma- or space-separated)
    #[arg(long = "postReadAttribute", value_name = "ATTRS")]
    pub post_read_attribute: Vec<String>,

    /// Attributes to capture from the entry before the change
    #[arg(long = "preReadAttribute", value_name = "ATTRS")]
    pub pre_read_attribute: Vec<String>,

    /// Authorization ID (dn:... or u:...) to proxy operations as
    #[arg(short = 'Y', long = "proxyAs", alias = "proxyV2As", value_name = "AUTHZID")]
    pub proxy_as: Option<String>,

    /// DN to proxy operations as, using the legacy v1 control
    #[arg(long = "proxyV1As", value_name = "DN")]
    pub proxy_v1_as: Option<String>,

    /// Purge the existing password when a password modification is applied
    #[arg(long = "purgeCurrentPassword")]
    pub purge_current_password: bool,

    /// Retire the existing password when a password modification is applied
    #[arg(long = "retireCurrentPassword")]
    pub retire_current_password: bool,

    /// Mark operations as replication repair (not replicated)
    #[arg(long = "replicationRepair")]
    pub replication_repair: bool,

    /// Convert deletes into soft deletes
    #[arg(long = "softDelete")]
    pub soft_delete: bool,

    /// Delete entire subtrees in one delete operation
    #[arg(long = "subtreeDelete")]
    pub subtree_delete: bool,

    /// Suppress updates of operational attributes (last-access-time,
    /// last-login-time, last-login-ip, lastmod; repeatable)
    #[arg(long = "suppressOperationalAttributeUpdates", value_name = "TYPE")]
    pub suppress_operational_attribute_updates: Vec<String>,

    /// Suppress referential-integrity processing on delete and modify DN
    #[arg(long = "suppressReferentialIntegrityUpdates")]
    pub suppress_referential_integrity_updates: bool,

    /// Request password-policy warnings on binds, adds, and modifies
    #[arg(long = "usePasswordPolicyControl")]
    pub use_password_policy_control: bool,

    /// Request detailed password-quality validation results
    #[arg(long = "passwordValidationDetails")]
    pub password_validation_details: bool,

    /// Raw control for add requests (oid[:criticality[:value|::b64]])
    #[arg(long = "addControl", value_name = "CONTROL", value_parser = parse_control_arg)]
    pub add_control: Vec<Control>,

    /// Raw control for delete requests
    #[arg(long = "deleteControl", value_name = "CONTROL", value_parser = parse_control_arg)]
    pub delete_control: Vec<Control>,

    /// Raw control for modify requests
    #[arg(long = "modifyControl", value_name = "CONTROL", value_parser = parse_control_arg)]
    pub modify_control: Vec<Control>,

    /// Raw control for modify DN requests
    #[arg(long = "modifyDNControl", value_name = "CONTROL", value_parser = parse_control_arg)]
    pub modify_dn_control: Vec<Control>,

    /// Raw control for every request type
    #[arg(long = "operationControl", value_name = "CONTROL", value_parser = parse_control_arg)]
    pub operation_control: Vec<Control>,

    /// Raw control for the bind request
    #[arg(long = "bindControl", value_name = "CONTROL", value_parser = parse_control_arg)]
    pub bind_control: Vec<Control>,
}

/// clap value parser for the raw control syntax.
fn parse_control_arg(spec: &str) -> Result<Control, String> {
    Control::parse_arg(spec).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_typical_invocation() {
        let args = Args::parse_from([
            "ldapply",
            "--hostname",
            "ds1.example.com",
            "--port",
            "1389",
            "--bindDN",
            "cn=admin,dc=example,dc=com",
            "--bindPassword",
            "secret",
            "--ldifFile",
            "changes.ldif",
            "--continueOnError",
            "--ratePerSecond",
            "100",
        ]);
        assert_eq!(args.hostname, vec!["ds1.example.com"]);
        assert_eq!(args.port, 1389);
        assert!(args.continue_on_error);
        assert_eq!(args.rate_per_second, Some(100));
    }

    #[test]
    fn test_parse_bulk_and_control_args() {
        let args = Args::parse_from([
            "ldapply",
            "--modifyEntriesMatchingFilter",
            "(objectClass=person)",
            "--searchPageSize",
            "100",
            "--modifyControl",
            "1.2.3.4:true",
        ]);
        assert_eq!(args.modify_entries_matching_filter.len(), 1);
        assert_eq!(args.search_page_size, Some(100));
        assert!(args.modify_control[0].critical);
    }
}
