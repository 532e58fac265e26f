//! Connection pool.
//!
//! A small pool (at most two live connections) over `ldap3`, with a
//! bind-reporting health check, failover across a server list, an optional
//! administrative-session request before the bind, and opt-in transparent
//! retry of operations whose failure condemned the connection.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use ldap3::exop::Exop;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::controls::Control;
use crate::error::ClientError;
use crate::exop;
use crate::notify::ServerNotice;
use crate::request::{ModOp, UpdateRequest};
use crate::result::{ExtendedOutcome, OperationResult};
use crate::result_code::ResultCode;

/// The pool never holds more than this many idle connections.
const MAX_IDLE: usize = 2;

/// One directory server address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    /// Hostname or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerAddress {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| ClientError::Param(format!("invalid port in {s:?}")))?;
                Ok(ServerAddress {
                    host: host.to_string(),
                    port,
                })
            }
            _ => Ok(ServerAddress {
                host: s.to_string(),
                port: 389,
            }),
        }
    }
}

/// Pool configuration.
#[derive(Clone)]
pub struct PoolConfig {
    /// Servers in failover order; the first reachable one is used.
    pub servers: Vec<ServerAddress>,
    /// Use LDAPS.
    pub use_tls: bool,
    /// Upgrade a plain connection with STARTTLS.
    pub use_starttls: bool,
    /// Bind DN for simple authentication.
    pub bind_dn: String,
    /// Bind password.
    pub bind_password: String,
    /// Connect timeout for each attempt.
    pub connect_timeout: Duration,
    /// When set, a start-administrative-session request naming this client
    /// is sent on every new connection before the bind.
    pub admin_session_client: Option<String>,
    /// Controls attached to the bind request.
    pub bind_controls: Vec<Control>,
    /// Chase a referral result one hop for write operations.
    pub follow_referrals: bool,
}

impl PoolConfig {
    /// Basic sanity checks before any connection is attempted.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.servers.is_empty() {
            return Err(ClientError::Param("no server address configured".into()));
        }
        if self.use_tls && self.use_starttls {
            return Err(ClientError::Param(
                "cannot use both LDAPS and STARTTLS".into(),
            ));
        }
        Ok(())
    }

    /// The LDAP URL for one server.
    #[must_use]
    pub fn url_for(&self, server: &ServerAddress) -> String {
        let scheme = if self.use_tls { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, server.host, server.port)
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("servers", &self.servers)
            .field("use_tls", &self.use_tls)
            .field("use_starttls", &self.use_starttls)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password", &"***REDACTED***")
            .field("connect_timeout", &self.connect_timeout)
            .field("admin_session_client", &self.admin_session_client)
            .field("follow_referrals", &self.follow_referrals)
            .finish()
    }
}

/// A connection checked out of the pool.
pub struct PooledConn {
    ldap: Ldap,
    /// The server this connection is bound to, as `host:port`.
    pub server: String,
}

/// The result of a search issued on a borrowed connection.
#[derive(Debug)]
pub struct SearchOutcome {
    /// DNs of the entries returned, in arrival order.
    pub entry_dns: Vec<String>,
    /// The final search result.
    pub result: OperationResult,
}

impl PooledConn {
    /// Runs a subtree search returning entry DNs only.
    pub async fn search_dns(
        &mut self,
        base: &str,
        filter: &str,
        controls: &[Control],
    ) -> SearchOutcome {
        let raw: Vec<_> = controls.iter().map(Control::to_raw).collect();
        let outcome = if raw.is_empty() {
            self.ldap.search(base, Scope::Subtree, filter, vec!["1.1"]).await
        } else {
            self.ldap
                .with_controls(raw)
                .search(base, Scope::Subtree, filter, vec!["1.1"])
                .await
        };
        match outcome {
            Ok(ldap3::SearchResult(entries, result)) => SearchOutcome {
                entry_dns: entries
                    .into_iter()
                    .map(|entry| SearchEntry::construct(entry).dn)
                    .collect(),
                result: OperationResult::from_ldap(result),
            },
            Err(err) => SearchOutcome {
                entry_dns: Vec::new(),
                result: OperationResult::from_transport_error(&err),
            },
        }
    }
}

/// A pool of one or two connections to the configured server list.
pub struct ConnectionPool {
    config: PoolConfig,
    idle: Vec<PooledConn>,
    retry_enabled: bool,
    notices: Option<UnboundedSender<ServerNotice>>,
}

impl ConnectionPool {
    /// Establishes the initial connection (connect, optional administrative
    /// session, bind). A bind failure is reported by the health check and
    /// surfaces the server's result code.
    pub async fn connect(
        config: PoolConfig,
        notices: Option<UnboundedSender<ServerNotice>>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let mut pool = ConnectionPool {
            config,
            idle: Vec::new(),
            retry_enabled: false,
            notices,
        };
        let conn = pool.open_connection().await?;
        pool.idle.push(conn);
        Ok(pool)
    }

    /// Enables transparent one-shot retry of operations whose failure
    /// classified the connection as unusable.
    pub fn set_retry_failed_operations(&mut self, enabled: bool) {
        self.retry_enabled = enabled;
    }

    /// The server of the connection that would be used next.
    #[must_use]
    pub fn current_server(&self) -> Option<&str> {
        self.idle.first().map(|c| c.server.as_str())
    }

    fn notify(&self, notice: ServerNotice) {
        if let Some(tx) = &self.notices {
            let _ = tx.send(notice);
        }
    }

    /// Opens a connection to the first reachable server. A bind failure is
    /// final; a connect failure moves on to the next server.
    async fn open_connection(&self) -> Result<PooledConn, ClientError> {
        let mut last_err = None;
        for server in &self.config.servers {
            match self.open_connection_to(server).await {
                Ok(conn) => return Ok(conn),
                Err(err @ ClientError::Bind { .. }) => return Err(err),
                Err(err) => {
                    warn!(server = %server, error = %err, "connection attempt failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ClientError::Param("no server address configured".into())))
    }

    async fn open_connection_to(&self, server: &ServerAddress) -> Result<PooledConn, ClientError> {
        let url = self.config.url_for(server);
        debug!(url = %url, "connecting");

        let mut settings = LdapConnSettings::new().set_conn_timeout(self.config.connect_timeout);
        if self.config.use_starttls {
            settings = settings.set_starttls(true);
        }

        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|source| ClientError::Connect {
                server: url.clone(),
                source,
            })?;
        ldap3::drive!(conn);

        if let Some(client_name) = &self.config.admin_session_client {
            let request = exop::start_administrative_session(client_name)?;
            let outcome = run_extended(&mut ldap, request, &[]).await;
            if outcome.result.result_code() != ResultCode::SUCCESS {
                report_setup_failure(&url, "administrative session request", &outcome.result);
                return Err(ClientError::Bind {
                    server: url,
                    result: outcome.result,
                });
            }
        }

        debug!(bind_dn = %self.config.bind_dn, "binding");
        let bind_controls: Vec<_> = self.config.bind_controls.iter().map(Control::to_raw).collect();
        let bind = if bind_controls.is_empty() {
            ldap.simple_bind(&self.config.bind_dn, &self.config.bind_password)
                .await
        } else {
            ldap.with_controls(bind_controls)
                .simple_bind(&self.config.bind_dn, &self.config.bind_password)
                .await
        };
        let result = match bind {
            Ok(res) => OperationResult::from_ldap(res),
            Err(err) => OperationResult::from_transport_error(&err),
        };

        if result.result_code() != ResultCode::SUCCESS {
            // The health check reports the bind failure exactly once; the
            // engine does not print it again.
            report_setup_failure(&url, "bind", &result);
            return Err(ClientError::Bind {
                server: url,
                result,
            });
        }

        info!(server = %server, "LDAP connection established");
        Ok(PooledConn {
            ldap,
            server: server.to_string(),
        })
    }

    /// Checks a connection out of the pool, establishing one if necessary.
    pub async fn acquire(&mut self) -> Result<PooledConn, ClientError> {
        match self.idle.pop() {
            Some(conn) => Ok(conn),
            None => self.open_connection().await,
        }
    }

    /// Returns a healthy connection to the pool.
    pub fn release(&mut self, conn: PooledConn) {
        if self.idle.len() < MAX_IDLE {
            self.idle.push(conn);
        } else {
            let mut ldap = conn.ldap;
            tokio::spawn(async move {
                let _ = ldap.unbind().await;
            });
        }
    }

    /// Discards a connection that is no longer usable.
    pub fn release_defunct(&mut self, conn: PooledConn, code: ResultCode) {
        self.notify(ServerNotice::ConnectionDefunct {
            server: conn.server.clone(),
            code,
        });
        let mut ldap = conn.ldap;
        tokio::spawn(async move {
            let _ = ldap.unbind().await;
        });
    }

    /// Discards a defunct connection and establishes a replacement.
    pub async fn replace_defunct(
        &mut self,
        conn: PooledConn,
        code: ResultCode,
    ) -> Result<PooledConn, ClientError> {
        self.release_defunct(conn, code);
        let replacement = self.open_connection().await?;
        self.notify(ServerNotice::Failover {
            server: replacement.server.clone(),
        });
        Ok(replacement)
    }

    /// Dispatches one composed request, retrying once on a replacement
    /// connection when retry is enabled and the failure condemned the
    /// connection. Transport failures surface as client-side results.
    pub async fn apply(&mut self, request: &UpdateRequest) -> OperationResult {
        let mut conn = match self.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                return OperationResult::new(err.result_code()).with_diagnostic(err.to_string());
            }
        };

        let mut result = dispatch(&mut conn.ldap, request).await;

        if !result.result_code().is_connection_usable() {
            // Surface whatever the transport reported about the broken
            // connection (e.g. the server's disconnect notice).
            if let Some(detail) = result.diagnostic_message() {
                self.notify(ServerNotice::ServerMessage {
                    oid: None,
                    detail: detail.to_string(),
                });
            }
        }

        if !result.result_code().is_connection_usable() && self.retry_enabled {
            debug!(dn = request.dn(), code = %result.result_code(), "retrying on a new connection");
            match self.replace_defunct(conn, result.result_code()).await {
                Ok(mut replacement) => {
                    result = dispatch(&mut replacement.ldap, request).await;
                    conn = replacement;
                }
                Err(err) => {
                    warn!(error = %err, "unable to establish a replacement connection");
                    return result;
                }
            }
        }

        if result.result_code().is_connection_usable() {
            self.release(conn);
        } else {
            self.release_defunct(conn, result.result_code());
        }

        if result.result_code() == ResultCode::REFERRAL && self.config.follow_referrals {
            if let Some(chased) = self.chase_referral(request, &result).await {
                return chased;
            }
        }

        result
    }

    /// Sends an extended request through a pooled connection, retrying once
    /// like [`ConnectionPool::apply`]. Errors become client-side results.
    pub async fn extended(&mut self, request: Exop, controls: &[Control]) -> ExtendedOutcome {
        let mut conn = match self.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                return ExtendedOutcome::from_result(
                    OperationResult::new(err.result_code()).with_diagnostic(err.to_string()),
                );
            }
        };

        let mut outcome = run_extended(&mut conn.ldap, request.clone(), controls).await;

        if !outcome.result.result_code().is_connection_usable() && self.retry_enabled {
            match self
                .replace_defunct(conn, outcome.result.result_code())
                .await
            {
                Ok(mut replacement) => {
                    outcome = run_extended(&mut replacement.ldap, request, controls).await;
                    conn = replacement;
                }
                Err(err) => {
                    warn!(error = %err, "unable to establish a replacement connection");
                    return outcome;
                }
            }
        }

        if outcome.result.result_code().is_connection_usable() {
            self.release(conn);
        } else {
            self.release_defunct(conn, outcome.result.result_code());
        }
        outcome
    }

    /// Follows the first parseable referral URL one hop: connect, bind with
    /// the pool's credentials, re-dispatch, tear down.
    async fn chase_referral(
        &mut self,
        request: &UpdateRequest,
        result: &OperationResult,
    ) -> Option<OperationResult> {
        let server = result
            .referral_urls()
            .iter()
            .find_map(|url| parse_referral_url(url))?;
        info!(server = %server, dn = request.dn(), "following referral");

        let mut config = self.config.clone();
        config.servers = vec![server];
        config.follow_referrals = false;
        let pool = ConnectionPool {
            config,
            idle: Vec::new(),
            retry_enabled: false,
            notices: None,
        };
        let mut conn = match pool.open_connection().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = %err, "unable to follow referral");
                return None;
            }
        };
        let chased = dispatch(&mut conn.ldap, request).await;
        let _ = conn.ldap.unbind().await;
        Some(chased)
    }

    /// Unbinds every pooled connection.
    pub async fn close(&mut self) {
        for mut conn in self.idle.drain(..) {
            let _ = conn.ldap.unbind().await;
        }
    }
}

/// Extracts `host:port` from an `ldap://` referral URL.
fn parse_referral_url(url: &str) -> Option<ServerAddress> {
    let rest = url.strip_prefix("ldap://")?;
    let authority = rest.split('/').next()?;
    if authority.is_empty() {
        return None;
    }
    ServerAddress::from_str(authority).ok()
}

/// Issues one request on a connection and normalizes the outcome.
async fn dispatch(ldap: &mut Ldap, request: &UpdateRequest) -> OperationResult {
    let controls: Vec<_> = request.controls().iter().map(Control::to_raw).collect();
    let ldap = if controls.is_empty() {
        ldap
    } else {
        ldap.with_controls(controls)
    };

    let outcome = match request {
        UpdateRequest::Add(add) => {
            let attrs: Vec<(Vec<u8>, HashSet<Vec<u8>>)> = add
                .attributes
                .iter()
                .map(|(name, values)| {
                    (
                        name.as_bytes().to_vec(),
                        values.iter().cloned().collect::<HashSet<_>>(),
                    )
                })
                .collect();
            ldap.add(&add.dn, attrs).await
        }
        UpdateRequest::Delete(delete) => ldap.delete(&delete.dn).await,
        UpdateRequest::Modify(modify) => {
            let mods: Vec<ldap3::Mod<Vec<u8>>> = modify
                .changes
                .iter()
                .map(|change| {
                    let attr = change.attribute.as_bytes().to_vec();
                    let values: HashSet<Vec<u8>> = change.values.iter().cloned().collect();
                    match change.op {
                        ModOp::Add => ldap3::Mod::Add(attr, values),
                        ModOp::Delete => ldap3::Mod::Delete(attr, values),
                        ModOp::Replace => ldap3::Mod::Replace(attr, values),
                        ModOp::Increment => ldap3::Mod::Increment(
                            attr,
                            change.values.first().cloned().unwrap_or_default(),
                        ),
                    }
                })
                .collect();
            ldap.modify(&modify.dn, mods).await
        }
        UpdateRequest::ModifyDn(moddn) => {
            ldap.modifydn(
                &moddn.dn,
                &moddn.new_rdn,
                moddn.delete_old_rdn,
                moddn.new_superior.as_deref(),
            )
            .await
        }
    };

    match outcome {
        Ok(result) => OperationResult::from_ldap(result),
        Err(err) => OperationResult::from_transport_error(&err),
    }
}

/// Issues one extended request on a connection and normalizes the outcome.
async fn run_extended(ldap: &mut Ldap, request: Exop, controls: &[Control]) -> ExtendedOutcome {
    let raw: Vec<_> = controls.iter().map(Control::to_raw).collect();
    let ldap = if raw.is_empty() {
        ldap
    } else {
        ldap.with_controls(raw)
    };
    match ldap.extended(request).await {
        Ok(ldap3::result::ExopResult(exop, result)) => ExtendedOutcome {
            result: OperationResult::from_ldap(result),
            name: exop.name,
            value: exop.val,
        },
        Err(err) => ExtendedOutcome::from_result(OperationResult::from_transport_error(&err)),
    }
}

/// Prints a connection-setup failure the way a health check reports it.
fn report_setup_failure(server: &str, what: &str, result: &OperationResult) {
    eprintln!("# The {what} against {server} failed:");
    for line in result.format_lines() {
        eprintln!("#   {line}");
    }
}
