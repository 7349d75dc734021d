//! INI reader and writer
//!
//! Handles the subset of the format settings files use: `[section]`
//! headers, `key = value` and `key: value` pairs, `#`/`;` comment lines,
//! indented continuation lines, a `DEFAULT` section inherited by every
//! other section and `%(name)s` interpolation.
//!
//! There are no inline comments: `a = x ; y` holds `x ; y`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use strata::RawSettings;
use strata::prelude::*;

pub const DEFAULT_SECTION: &str = "DEFAULT";

const MAX_INTERPOLATION_DEPTH: usize = 10;

type Entries = Vec<(String, String)>;

fn parse_error(file: &Path, line: usize, message: impl Into<String>) -> Error {
	Error::Parse { file: file.to_path_buf(), line, message: message.into() }
}

/// Parsed INI document
///
/// Keeps sections and keys in file order so that rewriting one section
/// leaves the rest of the file recognizable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ini {
	defaults: Entries,
	sections: Vec<(String, Entries)>,
}

impl Ini {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn parse(text: &str, file: &Path) -> StResult<Self> {
		let mut ini = Self::new();
		let mut current: Option<String> = None;
		let mut last_key: Option<String> = None;

		for (idx, line) in text.lines().enumerate() {
			let lineno = idx + 1;
			let trimmed = line.trim();
			if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
				continue;
			}

			// Continuation of the previous value
			if line.starts_with(char::is_whitespace) {
				let (Some(section), Some(key)) = (&current, &last_key) else {
					return Err(parse_error(file, lineno, "continuation line without a preceding key"));
				};
				if let Some((_, value)) = ini.entries_mut(section).iter_mut().find(|(k, _)| k == key) {
					value.push('\n');
					value.push_str(trimmed);
				}
				continue;
			}

			if let Some(rest) = trimmed.strip_prefix('[') {
				let Some(name) = rest.strip_suffix(']').map(str::trim) else {
					return Err(parse_error(file, lineno, "unterminated section header"));
				};
				if name.is_empty() {
					return Err(parse_error(file, lineno, "empty section name"));
				}
				ini.entries_mut(name);
				current = Some(name.to_string());
				last_key = None;
				continue;
			}

			let Some(section) = &current else {
				return Err(parse_error(file, lineno, "key outside of any section"));
			};
			let Some(pos) = trimmed.find(['=', ':']) else {
				return Err(parse_error(file, lineno, format!("expected 'key = value', got {:?}", trimmed)));
			};
			let key = trimmed[..pos].trim().to_lowercase();
			if key.is_empty() {
				return Err(parse_error(file, lineno, "empty key"));
			}
			let value = trimmed[pos + 1..].trim();
			set_entry(ini.entries_mut(section), &key, value);
			last_key = Some(key);
		}

		Ok(ini)
	}

	fn entries_mut(&mut self, section: &str) -> &mut Entries {
		if section == DEFAULT_SECTION {
			return &mut self.defaults;
		}
		let idx = match self.sections.iter().position(|(name, _)| name == section) {
			Some(idx) => idx,
			None => {
				self.sections.push((section.to_string(), Entries::new()));
				self.sections.len() - 1
			}
		};
		&mut self.sections[idx].1
	}

	pub fn has_section(&self, section: &str) -> bool {
		section == DEFAULT_SECTION || self.sections.iter().any(|(name, _)| name == section)
	}

	/// Section names in file order, `DEFAULT` excluded
	pub fn sections(&self) -> impl Iterator<Item = &str> {
		self.sections.iter().map(|(name, _)| name.as_str())
	}

	/// Uninterpolated value of a key, falling back to `DEFAULT`
	pub fn get_raw(&self, section: &str, key: &str) -> Option<&str> {
		fn lookup<'a>(entries: &'a Entries, key: &str) -> Option<&'a str> {
			entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
		}
		self.sections
			.iter()
			.find(|(name, _)| name == section)
			.and_then(|(_, entries)| lookup(entries, key))
			.or_else(|| lookup(&self.defaults, key))
	}

	/// Interpolated key/value pairs of a section
	///
	/// `DEFAULT` keys are inherited and `vars` override both. A section that
	/// does not exist yields only the inherited keys and `vars`.
	pub fn items(&self, section: &str, vars: &[(&str, &str)]) -> StResult<RawSettings> {
		let mut merged: BTreeMap<String, String> = self.defaults.iter().cloned().collect();
		if let Some((_, entries)) = self.sections.iter().find(|(name, _)| name == section) {
			merged.extend(entries.iter().cloned());
		}
		for (key, value) in vars {
			merged.insert(key.to_lowercase(), (*value).to_string());
		}

		merged
			.iter()
			.map(|(key, value)| -> StResult<(String, String)> {
				let mut out = String::with_capacity(value.len());
				interpolate(key, value, &merged, &mut out, 1)?;
				Ok((key.clone(), out))
			})
			.collect()
	}

	/// Writes `data` into `section` and drops the `declared` keys it lacks
	///
	/// Keys outside `declared` stay as they are. The section ends up sorted
	/// by key.
	pub fn merge_section(&mut self, section: &str, data: &RawSettings, declared: &BTreeSet<String>) {
		let entries = self.entries_mut(section);
		entries.retain(|(key, _)| data.contains_key(key) || !declared.contains(key));
		for (key, value) in data {
			set_entry(entries, key, value);
		}
		entries.sort_by(|a, b| a.0.cmp(&b.0));
	}

	/// Serializes the document; multi-line values become continuation lines
	pub fn write(&self) -> String {
		let mut out = String::new();
		if !self.defaults.is_empty() {
			write_section(&mut out, DEFAULT_SECTION, &self.defaults);
		}
		for (name, entries) in &self.sections {
			write_section(&mut out, name, entries);
		}
		out
	}
}

fn set_entry(entries: &mut Entries, key: &str, value: &str) {
	match entries.iter_mut().find(|(k, _)| k == key) {
		Some((_, v)) => *v = value.to_string(),
		None => entries.push((key.to_string(), value.to_string())),
	}
}

fn write_section(out: &mut String, name: &str, entries: &Entries) {
	out.push('[');
	out.push_str(name);
	out.push_str("]\n");
	for (key, value) in entries {
		out.push_str(key);
		out.push_str(" = ");
		out.push_str(&value.replace('\n', "\n\t"));
		out.push('\n');
	}
	out.push('\n');
}

fn interpolate(
	key: &str,
	value: &str,
	vars: &BTreeMap<String, String>,
	out: &mut String,
	depth: usize,
) -> StResult<()> {
	if depth > MAX_INTERPOLATION_DEPTH {
		return Err(Error::ConfigError(format!("interpolation of '{}' nests too deep", key)));
	}

	let mut rest = value;
	while let Some(pos) = rest.find('%') {
		out.push_str(&rest[..pos]);
		rest = &rest[pos..];
		match rest.as_bytes().get(1) {
			Some(b'%') => {
				out.push('%');
				rest = &rest[2..];
			}
			Some(b'(') => {
				let Some(end) = rest.find(")s") else {
					return Err(Error::ConfigError(format!("bad interpolation syntax in '{}': {:?}", key, rest)));
				};
				let name = rest[2..end].to_lowercase();
				let Some(referenced) = vars.get(&name) else {
					return Err(Error::ConfigError(format!("'{}' references unknown key '{}'", key, name)));
				};
				rest = &rest[end + 2..];
				interpolate(key, referenced, vars, out, depth + 1)?;
			}
			_ => {
				return Err(Error::ConfigError(format!("'%' must be followed by '%' or '(' in '{}'", key)));
			}
		}
	}
	out.push_str(rest);
	Ok(())
}

/// Makes a value safe to read back through interpolation
pub fn escape(value: &str) -> String {
	value.replace('%', "%%")
}

/// Rejects a value that would not read back as written
///
/// The reader trims every line, skips blank and comment lines inside a
/// continuation, so such values cannot be stored.
pub fn check_writable(key: &str, value: &str) -> StResult<()> {
	for (idx, line) in value.split('\n').enumerate() {
		let problem = if line.trim() != line {
			"a line with leading or trailing whitespace"
		} else if idx > 0 && line.is_empty() {
			"a blank line"
		} else if idx > 0 && (line.starts_with('#') || line.starts_with(';')) {
			"a line starting with a comment character"
		} else {
			continue;
		};
		return Err(Error::ConfigError(format!("cannot store '{}': value has {}", key, problem)));
	}
	Ok(())
}


// vim: ts=4
