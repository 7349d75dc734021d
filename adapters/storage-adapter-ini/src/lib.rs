//! INI file storage backend for the strata settings registry
//!
//! Settings live in one section of an INI file. An optional defaults file
//! (read with the same section) provides the defaults layer, and may pull
//! in more files through its `include` key. Values can refer to the
//! directory the settings belong to as `%(here)s`.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use strata::bootstrap::INCLUDE_KEY;
use strata::prelude::*;
use strata::{RawSettings, StorageBackend};

pub mod ini;

pub use ini::{DEFAULT_SECTION, Ini};

/// Application settings key naming the main settings file
pub const SETTINGS_KEY: &str = "settings";
/// Application settings key naming the defaults file
pub const DEFAULTS_KEY: &str = "defaultsettings";
/// Application settings key holding the `here` variable
pub const HERE_KEY: &str = "here";

#[derive(Debug, Clone)]
pub struct FileStorage {
	cfg: PathBuf,
	cfg_defaults: Option<PathBuf>,
	here: String,
	section: String,
}

impl FileStorage {
	/// Backend for `cfg`, reading and writing the `DEFAULT` section
	pub fn new(cfg: impl Into<PathBuf>) -> Self {
		Self { cfg: cfg.into(), cfg_defaults: None, here: String::new(), section: DEFAULT_SECTION.to_string() }
	}

	pub fn with_defaults(mut self, cfg_defaults: impl Into<PathBuf>) -> Self {
		self.cfg_defaults = Some(cfg_defaults.into());
		self
	}

	pub fn with_here(mut self, here: impl Into<String>) -> Self {
		self.here = here.into();
		self
	}

	pub fn with_section(mut self, section: impl Into<String>) -> Self {
		self.section = section.into();
		self
	}

	/// Derives a backend from application settings
	///
	/// Reads the main file from `settings`, the defaults file from
	/// `defaultsettings` and the `here` variable from `here`. Without `here`
	/// the main file's directory is used.
	pub fn from_app_settings(app: &RawSettings) -> StResult<Self> {
		let cfg = app
			.get(SETTINGS_KEY)
			.filter(|s| !s.trim().is_empty())
			.ok_or_else(|| Error::ConfigError(format!("missing '{}' application setting", SETTINGS_KEY)))?;

		let mut storage = Self::new(cfg.trim());
		if let Some(defaults) = app.get(DEFAULTS_KEY).filter(|s| !s.trim().is_empty()) {
			storage = storage.with_defaults(defaults.trim());
		}
		let here = match app.get(HERE_KEY) {
			Some(here) => here.clone(),
			None => storage.cfg.parent().map(|p| p.display().to_string()).unwrap_or_default(),
		};
		Ok(storage.with_here(here))
	}

	pub fn path(&self) -> &Path {
		&self.cfg
	}

	pub fn defaults_path(&self) -> Option<&Path> {
		self.cfg_defaults.as_deref()
	}

	pub fn here(&self) -> &str {
		&self.here
	}

	pub fn section(&self) -> &str {
		&self.section
	}

	fn read_ini(path: &Path) -> StResult<Option<Ini>> {
		match fs::read_to_string(path) {
			Ok(text) => Ini::parse(&text, path).map(Some),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(err) => Err(err.into()),
		}
	}

	/// Section items of `path`; a missing file is an empty mapping
	fn read_section(&self, path: &Path) -> StResult<RawSettings> {
		let Some(ini) = Self::read_ini(path)? else {
			debug!("settings file {} does not exist", path.display());
			return Ok(RawSettings::new());
		};
		ini.items(&self.section, &[(HERE_KEY, self.here.as_str())])
	}
}

fn write_replace(tmp_path: &Path, path: &Path, contents: &str) -> StResult<()> {
	let mut file = fs::File::create(tmp_path)?;
	file.write_all(contents.as_bytes())?;
	file.sync_all()?;
	fs::rename(tmp_path, path)?;
	Ok(())
}

impl StorageBackend for FileStorage {
	fn load(&self) -> StResult<RawSettings> {
		debug!("loading settings from {}", self.cfg.display());
		self.read_section(&self.cfg)
	}

	fn load_defaults(&self) -> StResult<RawSettings> {
		let Some(cfg_defaults) = &self.cfg_defaults else {
			return Ok(RawSettings::new());
		};
		debug!("loading default settings from {}", cfg_defaults.display());
		let mut data = self.read_section(cfg_defaults)?;
		if let Some(include) = data.get(INCLUDE_KEY).cloned() {
			data.extend(self.load_includes(&include)?);
		}
		Ok(data)
	}

	fn load_includes(&self, include: &str) -> StResult<RawSettings> {
		let mut data = RawSettings::new();
		for file in include.lines().map(str::trim).filter(|f| !f.is_empty()) {
			let path = Path::new(file);
			if !path.exists() {
				debug!("skipping missing include {}", path.display());
				continue;
			}
			debug!("including settings from {}", path.display());
			data.extend(self.read_section(path)?);
		}
		Ok(data)
	}

	/// Merges `data` into the section, leaving the rest of the file alone
	///
	/// Keys the registry does not declare (`include`, application keys)
	/// survive. Values the format cannot read back unchanged fail with
	/// [`Error::ConfigError`] before anything is written.
	///
	/// The new content goes to a temporary file next to the main file which
	/// is then renamed over it, so readers never see a partial file.
	fn save(&self, data: &RawSettings, declared: &BTreeSet<String>) -> StResult<()> {
		for (key, value) in data {
			ini::check_writable(key, value)?;
		}
		let mut doc = Self::read_ini(&self.cfg)?.unwrap_or_default();
		let escaped: RawSettings = data.iter().map(|(k, v)| (k.clone(), ini::escape(v))).collect();
		doc.merge_section(&self.section, &escaped, declared);

		let dir = match self.cfg.parent() {
			Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
			_ => PathBuf::from("."),
		};
		fs::create_dir_all(&dir)?;

		let file_name = self.cfg.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
		let tmp_path = dir.join(format!(".{}.tmp-{}", file_name, std::process::id()));
		info!("saving {} settings to {}", data.len(), self.cfg.display());

		let res = write_replace(&tmp_path, &self.cfg, &doc.write());
		if res.is_err() {
			// Best effort, the write error is what gets reported
			let _ignore = fs::remove_file(&tmp_path);
		}
		res
	}

	fn watch_path(&self) -> Option<&Path> {
		Some(&self.cfg)
	}
}

// vim: ts=4
