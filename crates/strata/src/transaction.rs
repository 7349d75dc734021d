//! Transaction collaborator
//!
//! The registry does not own a transaction manager. It only needs a way to
//! run a callback once the surrounding transaction has finished: hooks get
//! `true` after a successful commit and `false` after a rollback.

use parking_lot::Mutex;

pub type CommitHook = Box<dyn FnOnce(bool) + Send>;

pub trait TransactionManager: Send + Sync {
	/// Runs `hook` when the current transaction ends
	fn add_after_commit_hook(&self, hook: CommitHook);
}

/// Minimal in-process transaction: queues hooks until `commit` or `rollback`
#[derive(Default)]
pub struct LocalTransaction {
	hooks: Mutex<Vec<CommitHook>>,
}

impl LocalTransaction {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of hooks waiting for the transaction to end
	pub fn pending(&self) -> usize {
		self.hooks.lock().len()
	}

	pub fn commit(&self) {
		self.finish(true);
	}

	pub fn rollback(&self) {
		self.finish(false);
	}

	fn finish(&self, committed: bool) {
		// Hooks may start new work on this transaction, so run them unlocked
		let hooks = std::mem::take(&mut *self.hooks.lock());
		for hook in hooks {
			hook(committed);
		}
	}
}

impl TransactionManager for LocalTransaction {
	fn add_after_commit_hook(&self, hook: CommitHook) {
		self.hooks.lock().push(hook);
	}
}


// vim: ts=4
