//! Lifecycle notifications
//!
//! Listeners are notified synchronously and their return value is ignored.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::schema::RawSettings;

#[derive(Debug, Clone, Copy)]
pub enum SettingsEvent<'a> {
	/// Before any layer is loaded; carries the application settings
	Initializing { app: &'a RawSettings },
	/// After every layer is loaded
	Initialized { app: &'a RawSettings },
	/// One or more fields of a group got a new value
	GroupModified { group: &'a str, fields: &'a [String] },
}

pub type Listener = Arc<dyn Fn(&SettingsEvent<'_>) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Listeners {
	list: RwLock<Vec<Listener>>,
}

impl Listeners {
	pub(crate) fn add(&self, listener: Listener) {
		self.list.write().push(listener);
	}

	pub(crate) fn emit(&self, event: &SettingsEvent<'_>) {
		let list = self.list.read().clone();
		for listener in list {
			listener(event);
		}
	}
}

impl fmt::Debug for Listeners {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Listeners").field("count", &self.list.read().len()).finish()
	}
}

// vim: ts=4
