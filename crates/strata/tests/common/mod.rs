//! Shared fixtures for registry tests

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata::{MemoryStorage, RawSettings, SchemaNode, Settings, StResult, StorageBackend};

/// Log output for tests that want it, `cargo test -- --nocapture`
pub fn setup_test_logging() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
}

pub fn raw(pairs: &[(&str, &str)]) -> RawSettings {
	pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

/// Registry with one group `site` holding `title`, `port` and `debug`
pub fn site_settings() -> Settings {
	let settings = Settings::new();
	let site = settings.register("site", "Site", "Site wide settings");
	site.register(SchemaNode::new("title", "Untitled")).expect("title registers");
	site.register(SchemaNode::new("port", 8080i64)).expect("port registers");
	site.register(SchemaNode::new("debug", false)).expect("debug registers");
	settings
}

/// Memory backend that pretends to live in a file, for the watcher
#[derive(Debug)]
pub struct FileBackedMemory {
	pub memory: MemoryStorage,
	pub path: PathBuf,
}

impl FileBackedMemory {
	pub fn new(path: &Path, data: RawSettings) -> Arc<Self> {
		Arc::new(Self { memory: MemoryStorage::new(data), path: path.to_path_buf() })
	}
}

impl StorageBackend for FileBackedMemory {
	fn load(&self) -> StResult<RawSettings> {
		self.memory.load()
	}

	fn load_defaults(&self) -> StResult<RawSettings> {
		self.memory.load_defaults()
	}

	fn save(&self, data: &RawSettings, declared: &BTreeSet<String>) -> StResult<()> {
		self.memory.save(data, declared)
	}

	fn watch_path(&self) -> Option<&Path> {
		Some(&self.path)
	}
}

// vim: ts=4
