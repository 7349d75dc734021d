//! Application-level initialization

use std::sync::Arc;

use crate::prelude::*;
use crate::registry::Settings;
use crate::schema::RawSettings;
use crate::storage::StorageBackend;

/// Key of the application settings listing extra files to merge
pub const INCLUDE_KEY: &str = "include";

/// Initializes the registry from an application settings mapping
///
/// The mapping, with the files named by its `include` key merged on top,
/// becomes the caller supplied defaults layer. Include files are read
/// through the backend; without one they are skipped.
pub fn init_settings(
	settings: &Settings,
	app: &RawSettings,
	backend: Option<Arc<dyn StorageBackend>>,
) -> StResult<()> {
	let mut defaults = app.clone();
	if let Some(include) = app.get(INCLUDE_KEY).filter(|s| !s.trim().is_empty()) {
		match &backend {
			Some(backend) => defaults.extend(backend.load_includes(include)?),
			None => warn!("no storage backend, ignoring included settings files"),
		}
	}

	settings.init(backend, Some(&defaults))
}

// vim: ts=4
