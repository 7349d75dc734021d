//! Settings schema: field descriptors, group mappings and the root tree
//!
//! Raw data is a flat `group.field -> string` mapping as read from a file.
//! The schema converts between that, the nested raw form
//! (`group -> field -> string`) and typed values (`group -> field -> Value`).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Debug};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Invalid;
use crate::prelude::*;
use crate::validator::{GroupCheck, GroupValidator};
use crate::value::{FieldType, Value};

/// Flat raw mapping, as stored in a settings file
pub type RawSettings = BTreeMap<String, String>;
/// Nested raw mapping: group -> field -> raw string
pub type RawGroups = BTreeMap<String, BTreeMap<String, String>>;
/// Typed values of one group
pub type GroupValues = BTreeMap<String, Value>;
/// Typed values of every group
pub type NestedValues = BTreeMap<String, GroupValues>;

/// Per-field check, run after coercion
pub type FieldCheck = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Field descriptor
#[derive(Clone)]
pub struct SchemaNode {
	pub name: String,
	pub field_type: FieldType,
	pub default: Value,
	pub title: String,
	pub description: String,
	check: Option<FieldCheck>,
}

impl Debug for SchemaNode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SchemaNode")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("default", &self.default)
			.field("title", &self.title)
			.field("description", &self.description)
			.field("check", &self.check.is_some())
			.finish()
	}
}

impl SchemaNode {
	/// Field whose type is taken from its default value
	pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
		let default = default.into();
		Self {
			name: name.into(),
			field_type: default.field_type(),
			default,
			title: String::new(),
			description: String::new(),
			check: None,
		}
	}

	pub fn builder(name: impl Into<String>, field_type: FieldType) -> SchemaNodeBuilder {
		SchemaNodeBuilder::new(name, field_type)
	}

	pub fn serialize(&self, value: &Value) -> String {
		value.to_raw()
	}

	/// Coerces a raw string, reporting failures under the field name
	pub fn deserialize(&self, raw: &str) -> Result<Value, Invalid> {
		let value = match self.field_type.coerce(raw) {
			Ok(Some(value)) => value,
			Ok(None) => self.default.clone(),
			Err(msg) => return Err(Invalid::new(&self.name, msg)),
		};
		self.check_value(&value)?;
		Ok(value)
	}

	/// Runs the per-field check, if any
	pub fn check_value(&self, value: &Value) -> Result<(), Invalid> {
		match &self.check {
			Some(check) => check(value).map_err(|msg| Invalid::new(&self.name, msg)),
			None => Ok(()),
		}
	}
}

/// Builder for SchemaNode with fluent API
pub struct SchemaNodeBuilder {
	name: String,
	field_type: FieldType,
	default: Option<Value>,
	title: String,
	description: String,
	check: Option<FieldCheck>,
}

impl SchemaNodeBuilder {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			default: None,
			title: String::new(),
			description: String::new(),
			check: None,
		}
	}

	/// Set the default value (falls back to the type's zero value)
	pub fn default(mut self, value: impl Into<Value>) -> Self {
		self.default = Some(value.into());
		self
	}

	pub fn title(mut self, title: impl Into<String>) -> Self {
		self.title = title.into();
		self
	}

	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	/// Set a per-field check, run after coercion
	pub fn check<F>(mut self, f: F) -> Self
	where
		F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.check = Some(Arc::new(f));
		self
	}

	pub fn build(self) -> StResult<SchemaNode> {
		if self.name.is_empty() {
			return Err(Error::ConfigError("Field name is required".into()));
		}
		let default = match self.default {
			Some(default) if default.field_type() != self.field_type => {
				return Err(Error::TypeMismatch {
					path: self.name,
					expected: self.field_type,
					got: default.field_type(),
				});
			}
			Some(default) => default,
			None => zero_value(self.field_type),
		};

		Ok(SchemaNode {
			name: self.name,
			field_type: self.field_type,
			default,
			title: self.title,
			description: self.description,
			check: self.check,
		})
	}
}

fn zero_value(field_type: FieldType) -> Value {
	match field_type {
		FieldType::Str => Value::Str(String::new()),
		FieldType::Int => Value::Int(0),
		FieldType::Float => Value::Float(0.0),
		FieldType::Bool => Value::Bool(false),
		FieldType::Lines => Value::Lines(Vec::new()),
		FieldType::Timestamp => Value::Timestamp(DateTime::<Utc>::UNIX_EPOCH),
	}
}

/// Mapping node for one group: ordered fields plus the group validator
#[derive(Debug, Clone)]
pub struct GroupSchema {
	name: String,
	children: Vec<SchemaNode>,
	pub validator: GroupValidator,
}

impl GroupSchema {
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), children: Vec::new(), validator: GroupValidator::new() }
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Adds a field, replacing an existing one with the same name in place
	pub fn add(&mut self, node: SchemaNode) {
		match self.children.iter_mut().find(|c| c.name == node.name) {
			Some(existing) => *existing = node,
			None => self.children.push(node),
		}
	}

	pub fn add_check(&mut self, check: GroupCheck) -> bool {
		self.validator.add(check)
	}

	pub fn get(&self, name: &str) -> Option<&SchemaNode> {
		self.children.iter().find(|c| c.name == name)
	}

	pub fn get_mut(&mut self, name: &str) -> Option<&mut SchemaNode> {
		self.children.iter_mut().find(|c| c.name == name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.get(name).is_some()
	}

	pub fn fields(&self) -> impl Iterator<Item = &SchemaNode> {
		self.children.iter()
	}

	pub fn len(&self) -> usize {
		self.children.len()
	}

	pub fn is_empty(&self) -> bool {
		self.children.is_empty()
	}

	/// Typed -> raw for every declared field present in `values`
	pub fn serialize(&self, values: &GroupValues) -> BTreeMap<String, String> {
		self.children
			.iter()
			.filter_map(|node| values.get(&node.name).map(|v| (node.name.clone(), node.serialize(v))))
			.collect()
	}

	/// Raw -> typed for every declared field present in `raw`
	///
	/// All coercion failures are collected. Group checks run only when every
	/// field coerced.
	pub fn deserialize(&self, raw: &BTreeMap<String, String>) -> Result<GroupValues, Invalid> {
		let values = self.coerce(raw)?;
		self.validator.validate(&self.name, &values)?;
		Ok(values)
	}

	/// Raw -> typed with field checks only, group checks left to the caller
	pub fn coerce(&self, raw: &BTreeMap<String, String>) -> Result<GroupValues, Invalid> {
		let mut error = Invalid::composite(&self.name);
		let mut values = GroupValues::new();

		for node in &self.children {
			let Some(raw_value) = raw.get(&node.name) else { continue };
			match node.deserialize(raw_value) {
				Ok(value) => {
					values.insert(node.name.clone(), value);
				}
				Err(err) => error.add(err.within(&self.name)),
			}
		}

		if error.is_empty() { Ok(values) } else { Err(error) }
	}
}

/// Root of the schema tree, one child per registered group
#[derive(Debug, Clone, Default)]
pub struct RootSchema {
	children: Vec<GroupSchema>,
}

impl RootSchema {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a group schema; a name that is already present is left alone
	pub fn add(&mut self, group: GroupSchema) -> bool {
		if self.contains(group.name()) {
			return false;
		}
		self.children.push(group);
		true
	}

	pub fn get(&self, name: &str) -> Option<&GroupSchema> {
		self.children.iter().find(|g| g.name == name)
	}

	pub fn get_mut(&mut self, name: &str) -> Option<&mut GroupSchema> {
		self.children.iter_mut().find(|g| g.name == name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.get(name).is_some()
	}

	pub fn groups(&self) -> impl Iterator<Item = &GroupSchema> {
		self.children.iter()
	}

	pub fn len(&self) -> usize {
		self.children.len()
	}

	pub fn is_empty(&self) -> bool {
		self.children.is_empty()
	}

	/// Every declared `group.field` path
	pub fn paths(&self) -> BTreeSet<String> {
		self.children
			.iter()
			.flat_map(|g| g.children.iter().map(move |node| format!("{}.{}", g.name, node.name)))
			.collect()
	}

	/// `group -> field -> raw` into `group.field -> raw`
	pub fn flatten(&self, nested: &RawGroups) -> RawSettings {
		nested
			.iter()
			.flat_map(|(group, fields)| {
				fields.iter().map(move |(field, raw)| (format!("{}.{}", group, field), raw.clone()))
			})
			.collect()
	}

	/// `group.field -> raw` into `group -> field -> raw`
	///
	/// Driven by the schema: keys that do not name a declared field are
	/// dropped, so application keys sharing the file are ignored.
	pub fn unflatten(&self, flat: &RawSettings) -> RawGroups {
		let mut nested = RawGroups::new();
		for group in &self.children {
			for node in &group.children {
				let key = format!("{}.{}", group.name, node.name);
				if let Some(raw) = flat.get(&key) {
					nested
						.entry(group.name.clone())
						.or_default()
						.insert(node.name.clone(), raw.clone());
				}
			}
		}
		if tracing::enabled!(tracing::Level::TRACE) {
			let used: usize = nested.values().map(BTreeMap::len).sum();
			trace!("unflatten: {} of {} raw keys matched declared fields", used, flat.len());
		}
		nested
	}

	pub fn serialize(&self, values: &NestedValues) -> RawGroups {
		self.children
			.iter()
			.filter_map(|g| values.get(&g.name).map(|v| (g.name.clone(), g.serialize(v))))
			.collect()
	}

	/// Deserializes every group present in `raw`, reporting all failures
	/// across all groups in one composite error
	pub fn deserialize(&self, raw: &RawGroups) -> Result<NestedValues, Invalid> {
		self.convert(raw, GroupSchema::deserialize)
	}

	/// Like [`RootSchema::deserialize`] without the group checks
	pub fn coerce(&self, raw: &RawGroups) -> Result<NestedValues, Invalid> {
		self.convert(raw, GroupSchema::coerce)
	}

	fn convert<F>(&self, raw: &RawGroups, f: F) -> Result<NestedValues, Invalid>
	where
		F: Fn(&GroupSchema, &BTreeMap<String, String>) -> Result<GroupValues, Invalid>,
	{
		let mut error = Invalid::composite("");
		let mut values = NestedValues::new();

		for group in &self.children {
			let Some(group_raw) = raw.get(&group.name) else { continue };
			match f(group, group_raw) {
				Ok(group_values) => {
					values.insert(group.name.clone(), group_values);
				}
				Err(err) => error.add(err),
			}
		}

		if error.is_empty() { Ok(values) } else { Err(error) }
	}
}


// vim: ts=4
