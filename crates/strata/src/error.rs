//! Error types for the settings registry

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::value::FieldType;

pub type StResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// `init` was called on a registry that already went through it
	AlreadyInitialized,
	/// Operation needs an initialized registry
	NotInitialized,
	/// Unknown group or field
	NotFound(String),
	/// Programmer error in the registry setup
	ConfigError(String),
	/// Value written through a group does not match the field type
	TypeMismatch { path: String, expected: FieldType, got: FieldType },
	/// One or more fields failed coercion or validation
	Invalid(Invalid),
	/// Malformed settings file
	Parse { file: PathBuf, line: usize, message: String },

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<Invalid> for Error {
	fn from(err: Invalid) -> Self {
		Self::Invalid(err)
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::AlreadyInitialized => write!(f, "settings registry is already initialized"),
			Error::NotInitialized => write!(f, "settings registry is not initialized"),
			Error::NotFound(what) => write!(f, "not found: {}", what),
			Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
			Error::TypeMismatch { path, expected, got } => {
				write!(f, "type mismatch for '{}': expected {}, got {}", path, expected, got)
			}
			Error::Invalid(invalid) => write!(f, "{}", invalid),
			Error::Parse { file, line, message } => {
				write!(f, "parse error in {}:{}: {}", file.display(), line, message)
			}
			Error::Io(err) => write!(f, "I/O error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

/// Validation failure tree
///
/// A leaf carries the message for one field, addressed by its dotted path
/// (`group.field`). Composite nodes (a group, or the whole registry) collect
/// every failure found in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalid {
	pub path: String,
	pub message: Option<String>,
	pub children: Vec<Invalid>,
}

impl Invalid {
	pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
		Self { path: path.into(), message: Some(message.into()), children: Vec::new() }
	}

	/// Empty composite node, filled with [`Invalid::add`]
	pub fn composite(path: impl Into<String>) -> Self {
		Self { path: path.into(), message: None, children: Vec::new() }
	}

	pub fn add(&mut self, child: Invalid) {
		self.children.push(child);
	}

	pub fn is_empty(&self) -> bool {
		self.message.is_none() && self.children.is_empty()
	}

	/// Prefixes every path in the tree with `prefix.`
	pub fn within(mut self, prefix: &str) -> Self {
		if !prefix.is_empty() {
			self.path =
				if self.path.is_empty() { prefix.to_string() } else { format!("{}.{}", prefix, self.path) };
		}
		self.children = self.children.into_iter().map(|c| c.within(prefix)).collect();
		self
	}

	/// Flattens the tree into `path -> message`, one entry per failure
	pub fn as_map(&self) -> BTreeMap<String, String> {
		let mut res = BTreeMap::new();
		self.collect(&mut res);
		res
	}

	fn collect(&self, res: &mut BTreeMap<String, String>) {
		if let Some(msg) = &self.message {
			res.entry(self.path.clone())
				.and_modify(|m: &mut String| {
					m.push_str("; ");
					m.push_str(msg);
				})
				.or_insert_with(|| msg.clone());
		}
		for child in &self.children {
			child.collect(res);
		}
	}

	/// Paths of every failing field
	pub fn paths(&self) -> Vec<String> {
		self.as_map().into_keys().collect()
	}
}

impl fmt::Display for Invalid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let map = self.as_map();
		write!(f, "invalid settings")?;
		if !self.path.is_empty() {
			write!(f, " in '{}'", self.path)?;
		}
		for (i, (path, msg)) in map.iter().enumerate() {
			write!(f, "{}{}: {}", if i == 0 { ": " } else { "; " }, path, msg)?;
		}
		Ok(())
	}
}

impl std::error::Error for Invalid {}


// vim: ts=4
