//! # Change-application engine
//!
//! The state machine that drives ldapply: it streams LDIF change records,
//! composes directory requests with the configured control palette,
//! dispatches them immediately or under transactional / multi-update
//! grouping, runs paged bulk modification, applies the failure policy, and
//! records rejected changes.

pub mod bulk;
pub mod compose;
pub mod control_sets;
pub mod engine;
pub mod progress;
pub mod rate;
pub mod reject;
pub mod settings;

pub use engine::Engine;
pub use settings::{BulkSettings, ControlSettings, GroupingMode, Settings, SettingsError};
