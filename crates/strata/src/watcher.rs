//! Polling watcher for the backing settings file

use std::fs;
use std::time::{Duration, Instant, SystemTime};

use crate::prelude::*;
use crate::registry::Settings;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Reloads the registry when the backend's file gets a newer mtime
///
/// [`Watcher::check`] is cheap to call often: it does nothing until the poll
/// interval has elapsed since the previous check, and it never blocks on
/// anything but one `stat`.
#[derive(Debug)]
pub struct Watcher {
	settings: Settings,
	interval: Duration,
	checked: Instant,
	mtime: Option<SystemTime>,
	stats: u64,
}

impl Watcher {
	pub fn new(settings: Settings, interval: Duration) -> Self {
		Self::new_at(settings, interval, Instant::now())
	}

	/// Same as [`Watcher::new`] with an explicit "last checked" instant
	pub fn new_at(settings: Settings, interval: Duration, now: Instant) -> Self {
		let mtime = settings
			.backend_path()
			.and_then(|path| fs::metadata(path).and_then(|m| m.modified()).ok());
		Self { settings, interval, checked: now, mtime, stats: 0 }
	}

	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Number of times the file was stat'ed
	pub fn stat_count(&self) -> u64 {
		self.stats
	}

	/// Returns `true` when the file changed and the registry was reloaded
	pub fn check(&mut self) -> StResult<bool> {
		self.check_at(Instant::now())
	}

	pub fn check_at(&mut self, now: Instant) -> StResult<bool> {
		if now.saturating_duration_since(self.checked) < self.interval {
			return Ok(false);
		}
		self.checked = now;

		let Some(path) = self.settings.backend_path() else { return Ok(false) };
		self.stats += 1;
		// The file may be missing for a moment while it is being rewritten
		let mtime = match fs::metadata(&path).and_then(|m| m.modified()) {
			Ok(mtime) => mtime,
			Err(err) => {
				debug!("cannot stat {}: {}", path.display(), err);
				return Ok(false);
			}
		};
		if self.mtime.is_some_and(|seen| mtime <= seen) {
			return Ok(false);
		}

		self.mtime = Some(mtime);
		info!("settings file {} changed, reloading", path.display());
		self.settings.load()?;
		Ok(true)
	}
}

// vim: ts=4
