//! Settings registry
//!
//! # Lifecycle
//!
//! `Uninitialized -> Initializing -> Initialized`. [`Settings::init`] runs
//! once; a second call fails with [`Error::AlreadyInitialized`] instead of
//! reconfiguring the registry.
//!
//! # Layers
//!
//! `init` loads, each layer overriding the previous one:
//! 1. caller supplied defaults
//! 2. the backend's defaults file (and its includes)
//! 3. the backend's main file
//!
//! The first two layers also become the field defaults, so exporting
//! without defaults yields only what differs from them.
//!
//! # Persistence
//!
//! The first mutation after a save marks the registry changed and, when a
//! [`TransactionManager`] is attached, schedules one save to run after the
//! transaction commits. Without a transaction manager the caller has to
//! call [`Settings::save`] itself.
//!
//! The registry is meant to be driven from one logical execution context at
//! a time. The internal mutex only keeps shared handles memory-safe; it does
//! not make interleaved mutations from several threads meaningful.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::error::Invalid;
use crate::events::{Listener, Listeners, SettingsEvent};
use crate::group::{Group, GroupDef};
use crate::prelude::*;
use crate::schema::{GroupSchema, GroupValues, NestedValues, RawGroups, RawSettings, RootSchema};
use crate::storage::StorageBackend;
use crate::transaction::TransactionManager;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Uninitialized,
	Initializing,
	Initialized,
}

pub(crate) struct State {
	pub(crate) phase: Phase,
	pub(crate) schema: RootSchema,
	pub(crate) values: NestedValues,
	pub(crate) groups: BTreeMap<String, Arc<Group>>,
	pub(crate) changed: bool,
	pub(crate) backend: Option<Arc<dyn StorageBackend>>,
}

impl State {
	/// Checks that `value` may be stored in `group.field`, storing nothing
	///
	/// The field must be declared, the value must have the field's type and
	/// pass the field's own check.
	pub(crate) fn check_field(&self, group: &str, field: &str, value: &Value) -> StResult<()> {
		let node = self
			.schema
			.get(group)
			.and_then(|g| g.get(field))
			.ok_or_else(|| Error::NotFound(format!("{}.{}", group, field)))?;
		if node.field_type != value.field_type() {
			return Err(Error::TypeMismatch {
				path: format!("{}.{}", group, field),
				expected: node.field_type,
				got: value.field_type(),
			});
		}
		node.check_value(value).map_err(|err| err.within(group))?;
		Ok(())
	}

	/// Stores an already checked value, returns whether it differs from the
	/// old one
	pub(crate) fn store_field(&mut self, group: &str, field: &str, value: Value) -> bool {
		let values = self.values.entry(group.to_string()).or_default();
		if values.get(field) == Some(&value) {
			return false;
		}
		values.insert(field.to_string(), value);
		true
	}

	pub(crate) fn write_field(&mut self, group: &str, field: &str, value: Value) -> StResult<bool> {
		self.check_field(group, field, &value)?;
		Ok(self.store_field(group, field, value))
	}

	/// Runs the group checks of every group in `incoming` over its current
	/// values overlaid with the incoming ones
	fn validate_overlay(&self, incoming: &NestedValues) -> Result<(), Invalid> {
		let mut error = Invalid::composite("");
		for (name, fields) in incoming {
			let Some(schema) = self.schema.get(name) else { continue };
			let mut merged = self.values.get(name).cloned().unwrap_or_default();
			merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
			if let Err(err) = schema.validator.validate(name, &merged) {
				error.add(err);
			}
		}
		if error.is_empty() { Ok(()) } else { Err(error) }
	}
}

pub(crate) struct Inner {
	pub(crate) state: Mutex<State>,
	transactions: RwLock<Option<Arc<dyn TransactionManager>>>,
	listeners: Listeners,
}

impl Inner {
	/// Marks the registry dirty; the first mark since the last save
	/// schedules the deferred save
	pub(crate) fn changed(self: &Arc<Self>, group: &str, fields: &[String]) {
		let first = {
			let mut state = self.state.lock();
			let first = !state.changed;
			state.changed = true;
			first
		};
		debug!("settings group '{}' modified: {:?}", group, fields);

		if first {
			self.schedule_save();
		}
		self.listeners.emit(&SettingsEvent::GroupModified { group, fields });
	}

	fn schedule_save(self: &Arc<Self>) {
		let Some(tm) = self.transactions.read().clone() else {
			debug!("no transaction manager attached, changes wait for an explicit save");
			return;
		};

		let weak: Weak<Inner> = Arc::downgrade(self);
		tm.add_after_commit_hook(Box::new(move |committed| {
			let Some(inner) = weak.upgrade() else { return };
			if committed {
				if let Err(err) = inner.save() {
					error!("deferred settings save failed: {}", err);
				}
			} else {
				inner.state.lock().changed = false;
				warn!("transaction rolled back, settings changes were not persisted");
			}
		}));
	}

	pub(crate) fn save(&self) -> StResult<()> {
		let (data, declared, backend) = {
			let mut state = self.state.lock();
			state.changed = false;
			(export(&state, false), state.schema.paths(), state.backend.clone())
		};

		let Some(backend) = backend else { return Ok(()) };
		if data.is_empty() {
			debug!("nothing to save, every setting has its default value");
			return Ok(());
		}
		info!("saving {} settings", data.len());
		backend.save(&data, &declared)
	}

	/// Merges one raw layer into the live values
	///
	/// Group checks see the layer on top of the values already loaded, so a
	/// check over fields coming from different layers still applies. Nothing
	/// is written unless the whole layer is valid.
	fn load_layer(&self, raw: &RawSettings, set_defaults: bool) -> StResult<()> {
		let raw: RawSettings = raw.iter().map(|(k, v)| (k.to_lowercase(), v.clone())).collect();

		let modified = {
			let mut state = self.state.lock();
			let nested = state.schema.unflatten(&raw);
			let data = state.schema.coerce(&nested)?;
			state.validate_overlay(&data)?;

			let mut modified = Vec::new();
			for (name, incoming) in data {
				if incoming.is_empty() || !state.groups.contains_key(&name) {
					continue;
				}
				let mut fields = Vec::new();
				for (field, value) in incoming {
					if set_defaults {
						if let Some(node) = state.schema.get_mut(&name).and_then(|g| g.get_mut(&field)) {
							node.default = value.clone();
						}
					}
					if state.store_field(&name, &field, value) {
						fields.push(field);
					}
				}
				if !fields.is_empty() {
					modified.push((name, fields));
				}
			}
			modified
		};

		for (group, fields) in &modified {
			self.listeners.emit(&SettingsEvent::GroupModified { group, fields });
		}
		Ok(())
	}
}

/// Flat mapping of the current values, default values dropped unless asked for
fn export(state: &State, default: bool) -> RawSettings {
	state.schema.flatten(&export_nested(state, default))
}

fn export_nested(state: &State, default: bool) -> RawGroups {
	let mut nested = state.schema.serialize(&state.values);
	if !default {
		for group in state.schema.groups() {
			let (Some(values), Some(raw)) = (state.values.get(group.name()), nested.get_mut(group.name()))
			else {
				continue;
			};
			for node in group.fields() {
				if values.get(&node.name) == Some(&node.default) {
					raw.remove(&node.name);
				}
			}
		}
		nested.retain(|_, fields| !fields.is_empty());
	}
	nested
}

/// Handle to the settings registry
///
/// Cloning is cheap, every clone refers to the same registry.
#[derive(Clone)]
pub struct Settings {
	inner: Arc<Inner>,
}

impl Settings {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Inner {
				state: Mutex::new(State {
					phase: Phase::Uninitialized,
					schema: RootSchema::new(),
					values: NestedValues::new(),
					groups: BTreeMap::new(),
					changed: false,
					backend: None,
				}),
				transactions: RwLock::new(None),
				listeners: Listeners::default(),
			}),
		}
	}

	/// Attaches the transaction collaborator used for deferred saves
	pub fn with_transactions(self, tm: Arc<dyn TransactionManager>) -> Self {
		self.set_transactions(tm);
		self
	}

	pub fn set_transactions(&self, tm: Arc<dyn TransactionManager>) {
		*self.inner.transactions.write() = Some(tm);
	}

	pub fn subscribe<F>(&self, listener: F)
	where
		F: Fn(&SettingsEvent<'_>) + Send + Sync + 'static,
	{
		let listener: Listener = Arc::new(listener);
		self.inner.listeners.add(listener);
	}

	/// Registers a group, or returns the one already registered under `name`
	pub fn register(&self, name: &str, title: &str, description: &str) -> Arc<Group> {
		let mut state = self.inner.state.lock();
		if let Some(group) = state.groups.get(name) {
			return group.clone();
		}

		debug!("Registering settings group: {}", name);
		let group = Arc::new(Group::new(name, title, description, Arc::downgrade(&self.inner)));
		state.schema.add(GroupSchema::new(name));
		state.values.insert(name.to_string(), GroupValues::new());
		state.groups.insert(name.to_string(), group.clone());
		group
	}

	/// Registers a group together with its fields, checks and category
	pub fn register_group(&self, def: GroupDef) -> StResult<Arc<Group>> {
		let group = self.register(&def.name, &def.title, &def.description);
		if let Some(category) = def.category {
			group.set_category(category);
		}
		for check in def.checks {
			group.add_check(check)?;
		}
		for field in def.fields {
			group.register(field)?;
		}
		Ok(group)
	}

	pub fn group(&self, name: &str) -> StResult<Arc<Group>> {
		self.inner
			.state
			.lock()
			.groups
			.get(name)
			.cloned()
			.ok_or_else(|| Error::NotFound(name.to_string()))
	}

	/// Every group, in registration order
	pub fn groups(&self) -> Vec<Arc<Group>> {
		let state = self.inner.state.lock();
		state.schema.groups().filter_map(|g| state.groups.get(g.name()).cloned()).collect()
	}

	/// Snapshot of the root schema
	pub fn schema(&self) -> RootSchema {
		self.inner.state.lock().schema.clone()
	}

	pub fn phase(&self) -> Phase {
		self.inner.state.lock().phase
	}

	pub fn is_initialized(&self) -> bool {
		self.phase() == Phase::Initialized
	}

	/// Whether values changed since the last save
	pub fn is_changed(&self) -> bool {
		self.inner.state.lock().changed
	}

	pub fn backend(&self) -> Option<Arc<dyn StorageBackend>> {
		self.inner.state.lock().backend.clone()
	}

	/// File the backend persists to, if any
	pub fn backend_path(&self) -> Option<PathBuf> {
		self.backend().and_then(|b| b.watch_path().map(std::path::Path::to_path_buf))
	}

	/// Loads every layer; see the module docs for the order
	pub fn init(
		&self,
		backend: Option<Arc<dyn StorageBackend>>,
		defaults: Option<&RawSettings>,
	) -> StResult<()> {
		{
			let mut state = self.inner.state.lock();
			if state.phase != Phase::Uninitialized {
				return Err(Error::AlreadyInitialized);
			}
			state.phase = Phase::Initializing;
			state.backend.clone_from(&backend);
		}

		let empty = RawSettings::new();
		let app = defaults.unwrap_or(&empty);
		self.inner.listeners.emit(&SettingsEvent::Initializing { app });

		let _span = info_span!("settings_init").entered();
		if let Some(defaults) = defaults {
			self.inner.load_layer(defaults, true)?;
		}
		if let Some(backend) = &backend {
			self.inner.load_layer(&backend.load_defaults()?, true)?;
			self.inner.load_layer(&backend.load()?, false)?;
		}

		self.inner.state.lock().phase = Phase::Initialized;
		info!("settings initialized, {} groups", self.inner.state.lock().groups.len());
		self.inner.listeners.emit(&SettingsEvent::Initialized { app });
		Ok(())
	}

	/// Reloads the live layer from the backend
	///
	/// Fails before `init`; a registry initialized without a backend has
	/// nothing to reload.
	pub fn load(&self) -> StResult<()> {
		let backend = {
			let state = self.inner.state.lock();
			if state.phase == Phase::Uninitialized {
				return Err(Error::NotInitialized);
			}
			state.backend.clone()
		};
		let Some(backend) = backend else { return Ok(()) };
		info!("reloading settings");
		self.inner.load_layer(&backend.load()?, false)
	}

	/// Persists every non-default value and clears the changed flag
	///
	/// Also the way to persist values written during a transaction that
	/// rolled back: those stay in memory (there is no undo) and are written
	/// by the next save that runs, explicit or after a later commit.
	pub fn save(&self) -> StResult<()> {
		self.inner.save()
	}

	/// Flat `group.field -> raw` mapping of the current values
	///
	/// Unless `default` is set, fields equal to their default are left out.
	pub fn export(&self, default: bool) -> RawSettings {
		export(&self.inner.state.lock(), default)
	}

	/// Same as [`Settings::export`], before flattening
	pub fn export_nested(&self, default: bool) -> RawGroups {
		export_nested(&self.inner.state.lock(), default)
	}
}

impl Default for Settings {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for Settings {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("Settings")
			.field("phase", &state.phase)
			.field("groups", &state.groups.keys().collect::<Vec<_>>())
			.field("changed", &state.changed)
			.field("backend", &state.backend)
			.finish()
	}
}


// vim: ts=4
