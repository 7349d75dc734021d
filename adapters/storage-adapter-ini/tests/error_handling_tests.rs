//! INI storage error handling tests
//!
//! Malformed files, bad values and unwritable targets

use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use strata::{Error, RawSettings, SchemaNode, Settings, StorageBackend, Watcher};
use strata_storage_adapter_ini::FileStorage;
use tempfile::TempDir;

fn declared(keys: &[&str]) -> BTreeSet<String> {
	keys.iter().map(|k| (*k).to_string()).collect()
}

fn create_test_settings() -> Settings {
	let settings = Settings::new();
	let site = settings.register("site", "Site", "");
	site.register(SchemaNode::new("port", 8080i64)).expect("port registers");
	site.register(SchemaNode::new("debug", false)).expect("debug registers");
	settings
}

#[test]
fn test_malformed_file_reports_line() {
	let temp = TempDir::new().expect("Failed to create temp directory");
	let path = temp.path().join("settings.ini");
	fs::write(&path, "[DEFAULT]\nsite.port = 1\nnot a pair\n").expect("write");

	let settings = create_test_settings();
	match settings.init(Some(Arc::new(FileStorage::new(&path))), None) {
		Err(Error::Parse { file, line, .. }) => {
			assert_eq!(file, path);
			assert_eq!(line, 3);
		}
		other => unreachable!("expected a parse error, got {:?}", other),
	}
}

#[test]
fn test_invalid_values_are_rejected() {
	let temp = TempDir::new().expect("Failed to create temp directory");
	let path = temp.path().join("settings.ini");
	fs::write(&path, "[DEFAULT]\nsite.port = eighty\nsite.debug = nah\n").expect("write");

	let settings = create_test_settings();
	let Err(Error::Invalid(err)) = settings.init(Some(Arc::new(FileStorage::new(&path))), None) else {
		unreachable!("invalid values must fail");
	};
	assert_eq!(err.paths(), vec!["site.debug".to_string(), "site.port".to_string()]);
}

#[test]
fn test_unknown_interpolation_key() {
	let temp = TempDir::new().expect("Failed to create temp directory");
	let path = temp.path().join("settings.ini");
	fs::write(&path, "[DEFAULT]\nsite.port = %(port)s\n").expect("write");

	let storage = FileStorage::new(&path);
	assert!(matches!(storage.load(), Err(Error::ConfigError(_))));
}

#[test]
fn test_save_refuses_to_clobber_malformed_file() {
	let temp = TempDir::new().expect("Failed to create temp directory");
	let path = temp.path().join("settings.ini");
	let broken = "[DEFAULT]\n= broken\n";
	fs::write(&path, broken).expect("write");

	let storage = FileStorage::new(&path);
	let data: RawSettings = [("site.port".to_string(), "1".to_string())].into();
	assert!(matches!(storage.save(&data, &declared(&["site.port"])), Err(Error::Parse { line: 2, .. })));
	assert_eq!(fs::read_to_string(&path).expect("read back"), broken);
}

#[test]
fn test_save_onto_directory_fails() {
	let temp = TempDir::new().expect("Failed to create temp directory");
	let path = temp.path().join("settings.ini");
	fs::create_dir(&path).expect("create dir");

	let storage = FileStorage::new(&path);
	let data: RawSettings = [("site.port".to_string(), "1".to_string())].into();
	assert!(matches!(storage.save(&data, &declared(&["site.port"])), Err(Error::Io(_))));
	assert_eq!(fs::read_dir(temp.path()).expect("list dir").count(), 1);
}

#[test]
fn test_save_refuses_values_that_do_not_read_back() {
	let temp = TempDir::new().expect("Failed to create temp directory");
	let path = temp.path().join("settings.ini");
	let original = "[DEFAULT]\nsite.port = 81\n";
	fs::write(&path, original).expect("write");

	let storage = FileStorage::new(&path);
	for value in ["line1\n# not a comment", "line1\n\nline3", " padded", "line1\n; note"] {
		let data: RawSettings = [("site.title".to_string(), value.to_string())].into();
		match storage.save(&data, &declared(&["site.port", "site.title"])) {
			Err(Error::ConfigError(msg)) => assert!(msg.contains("site.title"), "{}", msg),
			other => unreachable!("expected a config error for {:?}, got {:?}", value, other),
		}
	}
	assert_eq!(fs::read_to_string(&path).expect("read back"), original);
}

#[test]
fn test_missing_settings_key() {
	let app: RawSettings = [("here".to_string(), "/srv".to_string())].into();
	assert!(matches!(FileStorage::from_app_settings(&app), Err(Error::ConfigError(_))));
}

#[test]
fn test_watcher_propagates_reload_failure() {
	let temp = TempDir::new().expect("Failed to create temp directory");
	let path = temp.path().join("settings.ini");
	fs::write(&path, "[DEFAULT]\nsite.port = 1\n").expect("write");
	let past = SystemTime::now() - Duration::from_secs(600);
	fs::File::options().write(true).open(&path).and_then(|f| f.set_modified(past)).expect("set mtime");

	let settings = create_test_settings();
	settings.init(Some(Arc::new(FileStorage::new(&path))), None).expect("init succeeds");

	let start = Instant::now();
	let mut watcher = Watcher::new_at(settings.clone(), Duration::from_secs(5), start);
	fs::write(&path, "[DEFAULT]\nsite.port = x\n").expect("write");

	assert!(matches!(watcher.check_at(start + Duration::from_secs(5)), Err(Error::Invalid(_))));
	assert_eq!(settings.group("site").and_then(|g| g.get_int("port")).ok(), Some(1));
}

// vim: ts=4
