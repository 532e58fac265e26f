//! ldapply - apply LDIF change records to an LDAP directory server.
//!
//! Reads a stream of LDIF change records and applies them through a pooled,
//! retry-capable connection, with an extensive request-control palette,
//! optional transactional or multi-update grouping, paged bulk
//! modification, and a reject file for failed changes.

use std::str::FromStr;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ldapply_client::controls::{AssuredLocalLevel, AssuredRemoteLevel, SuppressType};
use ldapply_client::exop::MultiUpdateErrorBehavior;
use ldapply_client::{NotificationSink, PoolConfig, ResultCode, ServerAddress};
use ldapply_engine::{BulkSettings, ControlSettings, Engine, Settings};
use ldapply_ldif::{Charset, TrailingSpaceBehavior};

mod args;

use args::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();

    let args = Args::parse();
    let code = run(args).await;
    if code != ResultCode::SUCCESS {
        std::process::exit(code.exit_code());
    }
}

async fn run(args: Args) -> ResultCode {
    let (settings, pool_config) = match build_configuration(args) {
        Ok(built) => built,
        Err(message) => {
            eprintln!("# {message}");
            return ResultCode::PARAM_ERROR;
        }
    };

    let (notices, sink) = NotificationSink::channel();
    let sink_task = tokio::spawn(sink.run());

    let code = Engine::run(settings, pool_config, Some(notices)).await;

    // The engine dropped its sender; let the sink drain what is queued.
    let _ = sink_task.await;
    code
}

/// Translates parsed arguments into engine settings and pool configuration.
/// Value-level problems (bad level names, unreadable password file) are
/// parameter errors.
fn build_configuration(args: Args) -> Result<(Settings, PoolConfig), String> {
    let charset = Charset::from_name(&args.character_set)
        .ok_or_else(|| format!("unsupported character set {:?}", args.character_set))?;

    let trailing_spaces = if args.strip_trailing_spaces {
        TrailingSpaceBehavior::Strip
    } else {
        TrailingSpaceBehavior::Reject
    };

    let multi_update_error_behavior = args
        .multi_update_error_behavior
        .as_deref()
        .map(MultiUpdateErrorBehavior::from_str)
        .transpose()
        .map_err(|e| e.to_string())?;

    let suppress_operational_attribute_updates = args
        .suppress_operational_attribute_updates
        .iter()
        .map(|s| SuppressType::from_str(s))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;

    let assured_replication_local_level = args
        .assured_replication_local_level
        .as_deref()
        .map(AssuredLocalLevel::from_str)
        .transpose()
        .map_err(|e| e.to_string())?;

    let assured_replication_remote_level = args
        .assured_replication_remote_level
        .as_deref()
        .map(AssuredRemoteLevel::from_str)
        .transpose()
        .map_err(|e| e.to_string())?;

    let assured_replication_timeout = args
        .assured_replication_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?;

    let bind_password = match (&args.bind_password, &args.bind_password_file) {
        (Some(_), Some(_)) => {
            return Err(
                "the --bindPassword and --bindPasswordFile arguments cannot be used together"
                    .to_string(),
            );
        }
        (Some(password), None) => password.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| format!("unable to read the bind password file {}: {e}", path.display()))?
            .trim_end_matches(['\r', '\n'])
            .to_string(),
        (None, None) => String::new(),
    };

    let servers = args
        .hostname
        .iter()
        .map(|host| {
            let mut server = ServerAddress::from_str(host).map_err(|e| e.to_string())?;
            if !host.contains(':') {
                server.port = args.port;
            }
            Ok(server)
        })
        .collect::<Result<Vec<_>, String>>()?;

    let pool_config = PoolConfig {
        servers,
        use_tls: args.use_ssl,
        use_starttls: args.use_starttls,
        bind_dn: args.bind_dn.clone(),
        bind_password,
        connect_timeout: Duration::from_millis(args.connect_timeout_millis),
        admin_session_client: args
            .use_administrative_session
            .then(|| "ldapply".to_string()),
        bind_controls: Vec::new(), // filled in by the engine
        follow_referrals: args.follow_referrals,
    };

    let settings = Settings {
        ldif_files: args.ldif_file,
        charset,
        trailing_spaces,
        reject_file: args.reject_file,
        default_add: args.default_add,
        continue_on_error: args.continue_on_error,
        dry_run: args.dry_run,
        verbose: args.verbose,
        follow_referrals: args.follow_referrals,
        retry_failed_operations: args.retry_failed_operations,
        rate_per_second: args.rate_per_second,
        search_page_size: args.search_page_size,
        use_transaction: args.use_transaction,
        multi_update_error_behavior,
        bulk: BulkSettings {
            filters: args.modify_entries_matching_filter,
            filter_files: args.modify_entries_matching_filters_from_file,
            dns: args.modify_entry_with_dn,
            dn_files: args.modify_entries_with_dns_from_file,
        },
        controls: ControlSettings {
            allow_undelete: args.allow_undelete,
            assertion_filter: args.assertion_filter,
            assured_replication: args.assured_replication,
            assured_replication_local_level,
            assured_replication_remote_level,
            assured_replication_timeout,
            authorization_identity: args.authorization_identity,
            get_authorization_entry_attributes: args.get_authorization_entry_attribute,
            get_user_resource_limits: args.get_user_resource_limits,
            hard_delete: args.hard_delete,
            ignore_no_user_modification: args.ignore_no_user_modification,
            manage_dsa_it: args.manage_dsa_it,
            name_with_entry_uuid: args.name_with_entry_uuid,
            no_operation: args.no_operation,
            operation_purpose: args.operation_purpose,
            password_policy: args.use_password_policy_control,
            password_validation_details: args.password_validation_details,
            permissive_modify: args.permissive_modify,
            post_read_attributes: args.post_read_attribute,
            pre_read_attributes: args.pre_read_attribute,
            proxy_as: args.proxy_as,
            proxy_v1_as: args.proxy_v1_as,
            purge_current_password: args.purge_current_password,
            replication_repair: args.replication_repair,
            retire_current_password: args.retire_current_password,
            soft_delete: args.soft_delete,
            subtree_delete: args.subtree_delete,
            suppress_operational_attribute_updates,
            suppress_referential_integrity_updates: args.suppress_referential_integrity_updates,
            add_controls: args.add_control,
            delete_controls: args.delete_control,
            modify_controls: args.modify_control,
            modify_dn_controls: args.modify_dn_control,
            operation_controls: args.operation_control,
            bind_controls: args.bind_control,
        },
    };

    Ok((settings, pool_config))
}

/// Parses durations like `500ms`, `5s`, or `1m`.
fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let (number, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(split) => value.split_at(split),
        None => (value, "ms"),
    };
    let number: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration {value:?}"))?;
    match unit.trim() {
        "ms" => Ok(Duration::from_millis(number)),
        "s" => Ok(Duration::from_secs(number)),
        "m" => Ok(Duration::from_secs(number * 60)),
        other => Err(format!("invalid duration unit {other:?} in {value:?}")),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("750").unwrap(), Duration::from_millis(750));
        assert!(parse_duration("5h").is_err());
        assert!(parse_duration("abc").is_err());
    }

    #[test]
    fn test_build_configuration_happy_path() {
        let args = Args::parse_from([
            "ldapply",
            "--hostname",
            "ds1.example.com",
            "--hostname",
            "ds2.example.com:2389",
            "--port",
            "1389",
            "--bindDN",
            "cn=admin,dc=example,dc=com",
            "--bindPassword",
            "secret",
            "--useTransaction",
        ]);
        let (settings, pool_config) = build_configuration(args).unwrap();
        assert!(settings.use_transaction);
        assert_eq!(pool_config.servers.len(), 2);
        assert_eq!(pool_config.servers[0].port, 1389);
        assert_eq!(pool_config.servers[1].port, 2389);
    }

    #[test]
    fn test_build_configuration_rejects_bad_level() {
        let args = Args::parse_from([
            "ldapply",
            "--assuredReplication",
            "--assuredReplicationLocalLevel",
            "everything",
        ]);
        assert!(build_configuration(args).is_err());
    }

    #[test]
    fn test_build_configuration_rejects_two_password_sources() {
        let args = Args::parse_from([
            "ldapply",
            "--bindPassword",
            "a",
            "--bindPasswordFile",
            "/tmp/pw",
        ]);
        assert!(build_configuration(args).is_err());
    }

    #[test]
    fn test_default_hostname_gets_port() {
        let args = Args::parse_from(["ldapply", "--port", "10389"]);
        let (_, pool_config) = build_configuration(args).unwrap();
        assert_eq!(pool_config.servers[0].host, "localhost");
        assert_eq!(pool_config.servers[0].port, 10389);
    }
}
