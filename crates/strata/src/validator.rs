//! Group-level validation
//!
//! A group validator aggregates any number of cross-field checks. Every
//! check runs, and all their failures are merged into one composite
//! [`Invalid`] naming the group.

use std::fmt;
use std::sync::Arc;

use crate::error::Invalid;
use crate::schema::GroupValues;

/// Cross-field check over the deserialized values of one group
///
/// Failures are reported with paths relative to the group (`"port"`, not
/// `"mail.port"`); the group validator qualifies them.
pub type GroupCheck = Arc<dyn Fn(&GroupValues) -> Result<(), Invalid> + Send + Sync>;

/// Wraps a closure into a [`GroupCheck`]
///
/// Keep the returned handle around if the same check may be registered more
/// than once: deduplication is by identity.
pub fn group_check<F>(f: F) -> GroupCheck
where
	F: Fn(&GroupValues) -> Result<(), Invalid> + Send + Sync + 'static,
{
	Arc::new(f)
}

#[derive(Clone, Default)]
pub struct GroupValidator {
	checks: Vec<GroupCheck>,
}

impl GroupValidator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a check unless the very same one is already registered
	pub fn add(&mut self, check: GroupCheck) -> bool {
		if self.checks.iter().any(|c| Arc::ptr_eq(c, &check)) {
			return false;
		}
		self.checks.push(check);
		true
	}

	pub fn len(&self) -> usize {
		self.checks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.checks.is_empty()
	}

	/// Runs every check, collecting all failures
	pub fn validate(&self, group: &str, values: &GroupValues) -> Result<(), Invalid> {
		let mut error = Invalid::composite(group);
		for check in &self.checks {
			if let Err(err) = check(values) {
				error.add(err.within(group));
			}
		}

		if error.is_empty() { Ok(()) } else { Err(error) }
	}
}

impl fmt::Debug for GroupValidator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GroupValidator").field("checks", &self.checks.len()).finish()
	}
}


// vim: ts=4
