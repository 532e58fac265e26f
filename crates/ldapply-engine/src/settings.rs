//! Engine settings and argument-compatibility validation.
//!
//! The settings mirror the tool's command-line surface. `validate()`
//! enforces the compatibility matrix: transactional and multi-update
//! grouping exclude most per-operation options, and the bulk-modify
//! selectors only make sense for modify records.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use ldapply_client::controls::{AssuredLocalLevel, AssuredRemoteLevel, SuppressType};
use ldapply_client::exop::MultiUpdateErrorBehavior;
use ldapply_client::{Control, ResultCode};
use ldapply_ldif::{Charset, TrailingSpaceBehavior};

/// A rejected settings combination.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Two arguments that cannot be combined.
    #[error("the {first} and {second} arguments cannot be used together")]
    Exclusive {
        first: &'static str,
        second: &'static str,
    },

    /// An argument that requires another one.
    #[error("{dependent} can only be used when {required} is present")]
    Dependent {
        dependent: &'static str,
        required: &'static str,
    },

    /// A malformed argument value.
    #[error("invalid value for {argument}: {message}")]
    Invalid {
        argument: &'static str,
        message: String,
    },
}

impl SettingsError {
    /// Settings problems always map to the parameter-error result code.
    #[must_use]
    pub fn result_code(&self) -> ResultCode {
        ResultCode::PARAM_ERROR
    }
}

/// How dispatched operations are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingMode {
    /// Each request is dispatched as it is composed.
    Immediate,
    /// All requests run inside one server-side transaction.
    Transaction,
    /// All requests are buffered into one multi-update extended request.
    MultiUpdate(MultiUpdateErrorBehavior),
}

/// The bulk-modify target selectors.
#[derive(Debug, Clone, Default)]
pub struct BulkSettings {
    /// Filters supplied directly on the command line.
    pub filters: Vec<String>,
    /// Files containing one filter per line.
    pub filter_files: Vec<PathBuf>,
    /// Target DNs supplied directly on the command line.
    pub dns: Vec<String>,
    /// Files containing one DN per line.
    pub dn_files: Vec<PathBuf>,
}

impl BulkSettings {
    /// Whether any selector is present.
    #[must_use]
    pub fn any(&self) -> bool {
        !self.filters.is_empty()
            || !self.filter_files.is_empty()
            || !self.dns.is_empty()
            || !self.dn_files.is_empty()
    }
}

/// The control palette configured for the run.
#[derive(Debug, Clone, Default)]
pub struct ControlSettings {
    pub allow_undelete: bool,
    pub assertion_filter: Option<String>,
    pub assured_replication: bool,
    pub assured_replication_local_level: Option<AssuredLocalLevel>,
    pub assured_replication_remote_level: Option<AssuredRemoteLevel>,
    pub assured_replication_timeout: Option<Duration>,
    pub authorization_identity: bool,
    pub get_authorization_entry_attributes: Vec<String>,
    pub get_user_resource_limits: bool,
    pub hard_delete: bool,
    pub ignore_no_user_modification: bool,
    pub manage_dsa_it: bool,
    pub name_with_entry_uuid: bool,
    pub no_operation: bool,
    pub operation_purpose: Option<String>,
    pub password_policy: bool,
    pub password_validation_details: bool,
    pub permissive_modify: bool,
    pub post_read_attributes: Vec<String>,
    pub pre_read_attributes: Vec<String>,
    pub proxy_as: Option<String>,
    pub proxy_v1_as: Option<String>,
    pub purge_current_password: bool,
    pub replication_repair: bool,
    pub retire_current_password: bool,
    pub soft_delete: bool,
    pub subtree_delete: bool,
    pub suppress_operational_attribute_updates: Vec<SuppressType>,
    pub suppress_referential_integrity_updates: bool,
    /// Raw controls for add requests only.
    pub add_controls: Vec<Control>,
    /// Raw controls for delete requests only.
    pub delete_controls: Vec<Control>,
    /// Raw controls for modify requests only.
    pub modify_controls: Vec<Control>,
    /// Raw controls for modify DN requests only.
    pub modify_dn_controls: Vec<Control>,
    /// Raw controls for every operation type.
    pub operation_controls: Vec<Control>,
    /// Raw controls for the bind request.
    pub bind_controls: Vec<Control>,
}

/// Everything the engine needs for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// LDIF input files; standard input when empty.
    pub ldif_files: Vec<PathBuf>,
    /// Input character set.
    pub charset: Charset,
    /// Trailing-space handling for LDIF values.
    pub trailing_spaces: TrailingSpaceBehavior,
    /// Reject-file path, if configured.
    pub reject_file: Option<PathBuf>,
    /// Parse records without a changetype as adds.
    pub default_add: bool,
    /// Keep going after a failed operation.
    pub continue_on_error: bool,
    /// Report what would be done without contacting the server.
    pub dry_run: bool,
    /// Echo outgoing requests and per-page results.
    pub verbose: bool,
    /// Chase referral results one hop.
    pub follow_referrals: bool,
    /// Retry operations whose failure condemned the connection.
    pub retry_failed_operations: bool,
    /// Maximum operations per second.
    pub rate_per_second: Option<u32>,
    /// Page size for bulk-modify searches.
    pub search_page_size: Option<u32>,
    /// Run everything in one server-side transaction.
    pub use_transaction: bool,
    /// Buffer everything into one multi-update request.
    pub multi_update_error_behavior: Option<MultiUpdateErrorBehavior>,
    /// Bulk-modify target selectors.
    pub bulk: BulkSettings,
    /// The configured control palette.
    pub controls: ControlSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            ldif_files: Vec::new(),
            charset: Charset::default(),
            trailing_spaces: TrailingSpaceBehavior::default(),
            reject_file: None,
            default_add: false,
            continue_on_error: false,
            dry_run: false,
            verbose: false,
            follow_referrals: false,
            retry_failed_operations: false,
            rate_per_second: None,
            search_page_size: None,
            use_transaction: false,
            multi_update_error_behavior: None,
            bulk: BulkSettings::default(),
            controls: ControlSettings::default(),
        }
    }
}

impl Settings {
    /// The grouping mode implied by the flags. `validate` guarantees the
    /// two grouped modes never overlap.
    #[must_use]
    pub fn grouping(&self) -> GroupingMode {
        if self.use_transaction {
            GroupingMode::Transaction
        } else if let Some(behavior) = self.multi_update_error_behavior {
            GroupingMode::MultiUpdate(behavior)
        } else {
            GroupingMode::Immediate
        }
    }

    /// Whether any bulk-modify selector is configured.
    #[must_use]
    pub fn is_bulk(&self) -> bool {
        self.bulk.any()
    }

    /// Enforces the argument-compatibility matrix.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let c = &self.controls;

        // Assured replication levels depend on the main flag.
        for (present, name) in [
            (
                c.assured_replication_local_level.is_some(),
                "--assuredReplicationLocalLevel",
            ),
            (
                c.assured_replication_remote_level.is_some(),
                "--assuredReplicationRemoteLevel",
            ),
            (
                c.assured_replication_timeout.is_some(),
                "--assuredReplicationTimeout",
            ),
        ] {
            if present && !c.assured_replication {
                return Err(SettingsError::Dependent {
                    dependent: name,
                    required: "--assuredReplication",
                });
            }
        }

        // The two grouped modes exclude most per-operation options.
        let grouped: [(bool, &'static str); 2] = [
            (self.use_transaction, "--useTransaction"),
            (
                self.multi_update_error_behavior.is_some(),
                "--multiUpdateErrorBehavior",
            ),
        ];
        for (mode_present, mode_name) in grouped {
            if !mode_present {
                continue;
            }
            let conflicts: [(bool, &'static str); 13] = [
                (self.reject_file.is_some(), "--rejectFile"),
                (self.retry_failed_operations, "--retryFailedOperations"),
                (self.continue_on_error, "--continueOnError"),
                (self.dry_run, "--dryRun"),
                (self.follow_referrals, "--followReferrals"),
                (c.name_with_entry_uuid, "--nameWithEntryUUID"),
                (c.no_operation, "--noOperation"),
                (!c.operation_controls.is_empty(), "--operationControl"),
                (!c.add_controls.is_empty(), "--addControl"),
                (!c.delete_controls.is_empty(), "--deleteControl"),
                (!c.modify_controls.is_empty(), "--modifyControl"),
                (!c.modify_dn_controls.is_empty(), "--modifyDNControl"),
                (self.is_bulk(), "a bulk-modify target argument"),
            ];
            for (conflict, conflict_name) in conflicts {
                if conflict {
                    return Err(SettingsError::Exclusive {
                        first: mode_name,
                        second: conflict_name,
                    });
                }
            }
        }

        if self.use_transaction && self.multi_update_error_behavior.is_some() {
            return Err(SettingsError::Exclusive {
                first: "--useTransaction",
                second: "--multiUpdateErrorBehavior",
            });
        }
        if self.multi_update_error_behavior.is_some() && self.rate_per_second.is_some() {
            return Err(SettingsError::Exclusive {
                first: "--multiUpdateErrorBehavior",
                second: "--ratePerSecond",
            });
        }

        // Delete-flavor controls are mutually exclusive with soft delete.
        if c.soft_delete && c.hard_delete {
            return Err(SettingsError::Exclusive {
                first: "--softDelete",
                second: "--hardDelete",
            });
        }
        if c.soft_delete && c.subtree_delete {
            return Err(SettingsError::Exclusive {
                first: "--softDelete",
                second: "--subtreeDelete",
            });
        }

        if c.retire_current_password && c.purge_current_password {
            return Err(SettingsError::Exclusive {
                first: "--retireCurrentPassword",
                second: "--purgeCurrentPassword",
            });
        }

        if self.follow_referrals && c.manage_dsa_it {
            return Err(SettingsError::Exclusive {
                first: "--followReferrals",
                second: "--useManageDsaIT",
            });
        }

        if c.proxy_as.is_some() && c.proxy_v1_as.is_some() {
            return Err(SettingsError::Exclusive {
                first: "--proxyAs",
                second: "--proxyV1As",
            });
        }

        // Bulk selectors only drive modify requests, so everything that is
        // specific to other operation types is out.
        let selectors: [(bool, &'static str); 4] = [
            (!self.bulk.filters.is_empty(), "--modifyEntriesMatchingFilter"),
            (
                !self.bulk.filter_files.is_empty(),
                "--modifyEntriesMatchingFiltersFromFile",
            ),
            (!self.bulk.dns.is_empty(), "--modifyEntryWithDN"),
            (
                !self.bulk.dn_files.is_empty(),
                "--modifyEntriesWithDNsFromFile",
            ),
        ];
        for (selector_present, selector_name) in selectors {
            if !selector_present {
                continue;
            }
            let conflicts: [(bool, &'static str); 12] = [
                (c.allow_undelete, "--allowUndelete"),
                (self.default_add, "--defaultAdd"),
                (self.dry_run, "--dryRun"),
                (c.hard_delete, "--hardDelete"),
                (c.ignore_no_user_modification, "--ignoreNoUserModification"),
                (c.name_with_entry_uuid, "--nameWithEntryUUID"),
                (c.soft_delete, "--softDelete"),
                (c.subtree_delete, "--subtreeDelete"),
                (
                    c.suppress_referential_integrity_updates,
                    "--suppressReferentialIntegrityUpdates",
                ),
                (!c.add_controls.is_empty(), "--addControl"),
                (!c.delete_controls.is_empty(), "--deleteControl"),
                (!c.modify_dn_controls.is_empty(), "--modifyDNControl"),
            ];
            for (conflict, conflict_name) in conflicts {
                if conflict {
                    return Err(SettingsError::Exclusive {
                        first: selector_name,
                        second: conflict_name,
                    });
                }
            }
        }

        if self.rate_per_second == Some(0) {
            return Err(SettingsError::Invalid {
                argument: "--ratePerSecond",
                message: "must be positive".to_string(),
            });
        }
        if self.search_page_size == Some(0) {
            return Err(SettingsError::Invalid {
                argument: "--searchPageSize",
                message: "must be positive".to_string(),
            });
        }

        Ok(())
    }
}
