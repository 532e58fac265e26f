//! # LDAP client layer
//!
//! Everything ldapply needs to talk to a directory server beyond what the
//! `ldap3` transport provides:
//!
//! - A normalized, immutable result model with a closed result-code taxonomy
//! - The request-control palette (standard and proprietary controls)
//! - RFC 4515 filter encoding for the assertion control
//! - Extended operations: transactions, multi-update, administrative session
//! - A small failover-capable connection pool with opportunistic retry
//! - A channel-based sink for connection notices

pub mod ber;
pub mod controls;
pub mod error;
pub mod exop;
pub mod filter;
pub mod notify;
pub mod pool;
pub mod request;
pub mod result;
pub mod result_code;

pub use controls::Control;
pub use error::ClientError;
pub use notify::{NotificationSink, ServerNotice};
pub use pool::{ConnectionPool, PoolConfig, PooledConn, ServerAddress};
pub use request::{OperationType, UpdateRequest};
pub use result::{ExtendedOutcome, OperationResult, StreamProxyValuesResponse};
pub use result_code::ResultCode;
