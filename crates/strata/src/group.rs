//! Settings groups
//!
//! A [`Group`] is a named handle into the registry. Reads and writes go
//! through the registry so that every write can be change-tracked.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::prelude::*;
use crate::registry::Inner;
use crate::schema::{GroupSchema, GroupValues, SchemaNode};
use crate::validator::GroupCheck;
use crate::value::{SettingType, Value};

pub struct Group {
	name: String,
	title: String,
	description: String,
	category: RwLock<Option<String>>,
	settings: Weak<Inner>,
}

impl Group {
	pub(crate) fn new(name: &str, title: &str, description: &str, settings: Weak<Inner>) -> Self {
		Self {
			name: name.to_string(),
			title: title.to_string(),
			description: description.to_string(),
			category: RwLock::new(None),
			settings,
		}
	}

	fn inner(&self) -> StResult<Arc<Inner>> {
		self.settings
			.upgrade()
			.ok_or_else(|| Error::ConfigError(format!("settings group '{}' outlived its registry", self.name)))
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn title(&self) -> &str {
		&self.title
	}

	pub fn description(&self) -> &str {
		&self.description
	}

	pub fn category(&self) -> Option<String> {
		self.category.read().clone()
	}

	pub fn set_category(&self, category: impl Into<String>) {
		*self.category.write() = Some(category.into());
	}

	/// Declares a field and seeds its value with the default
	///
	/// Registering a name again replaces the descriptor and resets the value.
	pub fn register(&self, node: SchemaNode) -> StResult<()> {
		let inner = self.inner()?;
		let mut guard = inner.state.lock();
		let state = &mut *guard;
		debug!("Registering setting: {}.{}", self.name, node.name);

		let schema = state.schema.get_mut(&self.name).ok_or_else(|| Error::NotFound(self.name.clone()))?;
		state.values.entry(self.name.clone()).or_default().insert(node.name.clone(), node.default.clone());
		schema.add(node);
		Ok(())
	}

	pub fn add_check(&self, check: GroupCheck) -> StResult<bool> {
		let inner = self.inner()?;
		let mut state = inner.state.lock();
		let schema = state.schema.get_mut(&self.name).ok_or_else(|| Error::NotFound(self.name.clone()))?;
		Ok(schema.add_check(check))
	}

	/// Snapshot of the group schema
	pub fn schema(&self) -> StResult<GroupSchema> {
		let inner = self.inner()?;
		let state = inner.state.lock();
		state.schema.get(&self.name).cloned().ok_or_else(|| Error::NotFound(self.name.clone()))
	}

	/// Snapshot of the current values
	pub fn values(&self) -> StResult<GroupValues> {
		let inner = self.inner()?;
		let state = inner.state.lock();
		Ok(state.values.get(&self.name).cloned().unwrap_or_default())
	}

	pub fn contains(&self, field: &str) -> bool {
		self.inner().is_ok_and(|inner| {
			inner.state.lock().values.get(&self.name).is_some_and(|v| v.contains_key(field))
		})
	}

	pub fn get(&self, field: &str) -> StResult<Value> {
		let inner = self.inner()?;
		let state = inner.state.lock();
		state
			.values
			.get(&self.name)
			.and_then(|v| v.get(field))
			.cloned()
			.ok_or_else(|| Error::NotFound(format!("{}.{}", self.name, field)))
	}

	/// Typed read
	pub fn get_as<T: SettingType>(&self, field: &str) -> StResult<T> {
		let value = self.get(field)?;
		T::from_value(&value).ok_or_else(|| Error::TypeMismatch {
			path: format!("{}.{}", self.name, field),
			expected: T::FIELD_TYPE,
			got: value.field_type(),
		})
	}

	pub fn get_str(&self, field: &str) -> StResult<String> {
		self.get_as(field)
	}

	pub fn get_int(&self, field: &str) -> StResult<i64> {
		self.get_as(field)
	}

	pub fn get_float(&self, field: &str) -> StResult<f64> {
		self.get_as(field)
	}

	pub fn get_bool(&self, field: &str) -> StResult<bool> {
		self.get_as(field)
	}

	pub fn get_lines(&self, field: &str) -> StResult<Vec<String>> {
		self.get_as(field)
	}

	pub fn get_timestamp(&self, field: &str) -> StResult<DateTime<Utc>> {
		self.get_as(field)
	}

	/// Writes a declared field; returns whether the value changed
	///
	/// A changed value marks the registry changed (scheduling the deferred
	/// save) and notifies listeners. Undeclared fields, values of the wrong
	/// type and values failing the field's check are rejected. Group checks
	/// are left to [`Group::validate`].
	pub fn set(&self, field: &str, value: impl Into<Value>) -> StResult<bool> {
		let inner = self.inner()?;
		let changed = inner.state.lock().write_field(&self.name, field, value.into())?;
		if changed {
			inner.changed(&self.name, &[field.to_string()]);
		}
		Ok(changed)
	}

	/// Bulk [`Group::set`]; returns the fields that changed
	///
	/// Every entry is checked before any is stored, so a rejected entry
	/// leaves the group untouched.
	pub fn update<I, K>(&self, values: I) -> StResult<Vec<String>>
	where
		I: IntoIterator<Item = (K, Value)>,
		K: Into<String>,
	{
		let inner = self.inner()?;
		let values: Vec<(String, Value)> = values.into_iter().map(|(k, v)| (k.into(), v)).collect();
		let changed = {
			let mut state = inner.state.lock();
			for (field, value) in &values {
				state.check_field(&self.name, field, value)?;
			}
			values
				.into_iter()
				.filter_map(|(field, value)| state.store_field(&self.name, &field, value).then_some(field))
				.collect::<Vec<_>>()
		};
		if !changed.is_empty() {
			inner.changed(&self.name, &changed);
		}
		Ok(changed)
	}

	/// Runs the group checks over the current values
	pub fn validate(&self) -> StResult<()> {
		let inner = self.inner()?;
		let state = inner.state.lock();
		let schema = state.schema.get(&self.name).ok_or_else(|| Error::NotFound(self.name.clone()))?;
		let empty = GroupValues::new();
		let values = state.values.get(&self.name).unwrap_or(&empty);
		schema.validator.validate(&self.name, values)?;
		Ok(())
	}
}

impl std::fmt::Debug for Group {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Group")
			.field("name", &self.name)
			.field("title", &self.title)
			.field("category", &*self.category.read())
			.finish()
	}
}

/// Everything needed to register a group in one call
pub struct GroupDef {
	pub(crate) name: String,
	pub(crate) title: String,
	pub(crate) description: String,
	pub(crate) category: Option<String>,
	pub(crate) checks: Vec<GroupCheck>,
	pub(crate) fields: Vec<SchemaNode>,
}

impl GroupDef {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			title: String::new(),
			description: String::new(),
			category: None,
			checks: Vec::new(),
			fields: Vec::new(),
		}
	}

	pub fn title(mut self, title: impl Into<String>) -> Self {
		self.title = title.into();
		self
	}

	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	pub fn category(mut self, category: impl Into<String>) -> Self {
		self.category = Some(category.into());
		self
	}

	pub fn check(mut self, check: GroupCheck) -> Self {
		self.checks.push(check);
		self
	}

	pub fn field(mut self, node: SchemaNode) -> Self {
		self.fields.push(node);
		self
	}
}


// vim: ts=4
