//! Storage backend trait
//!
//! A backend is the file-based source and sink of raw settings. It is
//! loaded in two layers (defaults, then the main file) and persisted as one
//! flat mapping. The main file may hold keys the registry does not own;
//! saving leaves those alone.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::path::Path;

use parking_lot::Mutex;

use crate::prelude::*;
use crate::schema::RawSettings;

pub trait StorageBackend: Debug + Send + Sync {
	/// Loads the main file's section; a missing file is an empty mapping
	fn load(&self) -> StResult<RawSettings>;

	/// Loads the defaults layer, including any files it pulls in
	fn load_defaults(&self) -> StResult<RawSettings>;

	/// Loads and merges a newline separated list of extra files
	///
	/// Later files override earlier ones. Backends without a notion of
	/// files return an empty mapping.
	fn load_includes(&self, _include: &str) -> StResult<RawSettings> {
		Ok(RawSettings::new())
	}

	/// Writes `data` into the main file
	///
	/// `declared` holds every `group.field` key the registry owns. Declared
	/// keys missing from `data` are back at their default and are removed;
	/// any other key already in the file is kept.
	fn save(&self, data: &RawSettings, declared: &BTreeSet<String>) -> StResult<()>;

	/// File whose modification time signals an external change
	fn watch_path(&self) -> Option<&Path> {
		None
	}
}

/// In-memory backend
///
/// Keeps the live and defaults layers in memory and records every save.
/// Useful for applications that only persist through another channel, and
/// for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
	data: Mutex<RawSettings>,
	defaults: RawSettings,
	saves: Mutex<Vec<RawSettings>>,
}

impl MemoryStorage {
	pub fn new(data: RawSettings) -> Self {
		Self { data: Mutex::new(data), ..Self::default() }
	}

	pub fn with_defaults(mut self, defaults: RawSettings) -> Self {
		self.defaults = defaults;
		self
	}

	/// Replaces the live layer, as if the file was edited externally
	pub fn replace(&self, data: RawSettings) {
		*self.data.lock() = data;
	}

	/// Current live layer
	pub fn data(&self) -> RawSettings {
		self.data.lock().clone()
	}

	/// Every mapping passed to `save`, oldest first
	pub fn saves(&self) -> Vec<RawSettings> {
		self.saves.lock().clone()
	}

	pub fn save_count(&self) -> usize {
		self.saves.lock().len()
	}
}

impl StorageBackend for MemoryStorage {
	fn load(&self) -> StResult<RawSettings> {
		Ok(self.data.lock().clone())
	}

	fn load_defaults(&self) -> StResult<RawSettings> {
		Ok(self.defaults.clone())
	}

	fn save(&self, data: &RawSettings, declared: &BTreeSet<String>) -> StResult<()> {
		debug!("memory storage: saving {} keys", data.len());
		let mut stored = self.data.lock();
		stored.retain(|key, _| !declared.contains(key));
		stored.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
		self.saves.lock().push(data.clone());
		Ok(())
	}
}

// vim: ts=4
