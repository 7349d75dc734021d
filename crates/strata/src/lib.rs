//! Strata is a typed, group-organized settings registry.
//!
//! # Features
//!
//! - Groups of typed fields with defaults, declared at startup
//! - Layered loading: caller defaults, defaults file, main file
//! - Coercion of raw file strings with every failure reported at once
//! - Change tracking with a save deferred to the end of a transaction
//! - Default suppression: only values that differ from their defaults are
//!   persisted
//! - Optional polling watcher reloading the main file on change
//!
//! Storage is pluggable through [`StorageBackend`]; the INI file backend
//! lives in the `strata-storage-adapter-ini` crate.

#![forbid(unsafe_code)]

pub mod bootstrap;
pub mod error;
pub mod events;
pub mod group;
pub mod macros;
pub mod prelude;
pub mod registry;
pub mod schema;
pub mod storage;
pub mod transaction;
pub mod validator;
pub mod value;
pub mod watcher;

pub use crate::bootstrap::init_settings;
pub use crate::error::{Error, Invalid, StResult};
pub use crate::events::SettingsEvent;
pub use crate::group::{Group, GroupDef};
pub use crate::registry::{Phase, Settings};
pub use crate::schema::{
	GroupSchema, GroupValues, NestedValues, RawGroups, RawSettings, RootSchema, SchemaNode,
	SchemaNodeBuilder,
};
pub use crate::storage::{MemoryStorage, StorageBackend};
pub use crate::transaction::{LocalTransaction, TransactionManager};
pub use crate::validator::{GroupCheck, GroupValidator, group_check};
pub use crate::value::{FieldType, SettingType, Value};
pub use crate::watcher::{DEFAULT_POLL_INTERVAL, Watcher};

// vim: ts=4
