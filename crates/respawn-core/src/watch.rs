use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::WatchError;

/// What to watch and how tightly to coalesce bursts of events.
#[derive(Debug, Clone)]
pub struct WatchConfig {
	/// File extensions that trigger a signal, with or without the
	/// leading dot.
	pub extensions: Vec<String>,
	/// Minimum interval between two emitted signals.
	pub debounce: Duration,
}

impl Default for WatchConfig {
	fn default() -> Self {
		Self {
			extensions: vec!["py".to_string(), "ini".to_string()],
			debounce: Duration::from_secs(1),
		}
	}
}

/// A relevant edit, already filtered and debounced.
#[derive(Debug, Clone)]
pub struct Change {
	pub path: PathBuf,
	pub kind: ChangeKind,
	pub at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
	Created,
	Modified,
	Deleted,
}

/// Leading-edge debounce gate: the first event fires immediately, later
/// events are absorbed until the interval has passed since the last fire.
///
/// One gate covers all paths, so a save touching several files produces a
/// single signal. The gate starts open; a watcher's very first event is
/// never absorbed.
#[derive(Debug)]
pub struct Debounce {
	last_fire: Option<Instant>,
	min_interval: Duration,
}

impl Debounce {
	pub fn new(min_interval: Duration) -> Self {
		Self { last_fire: None, min_interval }
	}

	/// Returns true if a signal may fire at `now`, recording the fire time.
	pub fn admit(&mut self, now: Instant) -> bool {
		match self.last_fire {
			Some(last) if now.duration_since(last) <= self.min_interval => false,
			_ => {
				self.last_fire = Some(now);
				true
			}
		}
	}
}

fn has_watched_extension(path: &Path, extensions: &[String]) -> bool {
	match path.extension().and_then(|e| e.to_str()) {
		// `Path::extension` is dotless; tolerate configured entries in
		// either form.
		Some(ext) => extensions.iter().any(|want| want.trim_start_matches('.') == ext),
		None => false,
	}
}

/// Map a raw notification onto a change kind. Directory events, metadata
/// churn and access noise map to `None`. A rename lands as `Created` for
/// the new name; editors that save via rename-over still trigger one
/// restart that way.
fn classify(kind: &EventKind) -> Option<ChangeKind> {
	match kind {
		EventKind::Create(CreateKind::File) | EventKind::Create(CreateKind::Any) => {
			Some(ChangeKind::Created)
		}
		EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
			Some(ChangeKind::Modified)
		}
		EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Created),
		EventKind::Remove(RemoveKind::File) | EventKind::Remove(RemoveKind::Any) => {
			Some(ChangeKind::Deleted)
		}
		_ => None,
	}
}

/// Watches a single directory (not its subdirectories) and emits debounced
/// [`Change`] signals for files with watched extensions.
pub struct ChangeWatcher {
	// Held to keep the OS subscription alive until stop.
	_watcher: RecommendedWatcher,
	signals: Option<mpsc::Receiver<Change>>,
	cancel: watch::Sender<bool>,
	task: JoinHandle<()>,
}

impl ChangeWatcher {
	/// Subscribe to file events under `root`. Fails with [`WatchError`]
	/// when the OS notification facility is unavailable; callers may keep
	/// running without automatic restarts.
	pub fn start(root: &Path, config: WatchConfig) -> Result<Self, WatchError> {
		let (raw_tx, raw_rx) = mpsc::channel::<notify::Event>(1024);
		let mut watcher = RecommendedWatcher::new(
			move |result: Result<notify::Event, notify::Error>| {
				if let Ok(event) = result {
					let _ = raw_tx.blocking_send(event);
				}
			},
			notify::Config::default(),
		)?;
		watcher.watch(root, RecursiveMode::NonRecursive)?;
		tracing::debug!("watching {} for {:?} changes", root.display(), config.extensions);

		let (signal_tx, signal_rx) = mpsc::channel(64);
		let (cancel_tx, cancel_rx) = watch::channel(false);
		let task = tokio::spawn(filter_events(raw_rx, signal_tx, config, cancel_rx));

		Ok(Self {
			_watcher: watcher,
			signals: Some(signal_rx),
			cancel: cancel_tx,
			task,
		})
	}

	/// Take the receiver for debounced change signals. Can be taken once.
	pub fn take_signals(&mut self) -> Option<mpsc::Receiver<Change>> {
		self.signals.take()
	}

	/// Drop the OS subscription. In-flight events are discarded, not queued.
	pub fn stop(self) {
		let _ = self.cancel.send(true);
		self.task.abort();
	}
}

async fn filter_events(
	mut raw: mpsc::Receiver<notify::Event>,
	signals: mpsc::Sender<Change>,
	config: WatchConfig,
	mut cancel: watch::Receiver<bool>,
) {
	let mut gate = Debounce::new(config.debounce);
	loop {
		tokio::select! {
			event = raw.recv() => {
				let event = match event {
					Some(e) => e,
					None => return,
				};
				let kind = match classify(&event.kind) {
					Some(k) => k,
					None => continue,
				};
				for path in event.paths {
					if path.is_dir() || !has_watched_extension(&path, &config.extensions) {
						continue;
					}
					let now = Instant::now();
					if !gate.admit(now) {
						continue;
					}
					tracing::debug!("change in {}", path.display());
					if signals.send(Change { path, kind, at: now }).await.is_err() {
						return;
					}
				}
			}
			_ = cancel.changed() => return,
		}
	}
}

/// A change feed that never produces a signal, for supervising without a
/// watcher. The receiving end sees a closed channel straight away.
pub fn no_changes() -> mpsc::Receiver<Change> {
	let (_tx, rx) = mpsc::channel(1);
	rx
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn debounce_first_event_fires() {
		let mut gate = Debounce::new(Duration::from_secs(1));
		assert!(gate.admit(Instant::now()));
	}

	#[test]
	fn debounce_absorbs_within_window() {
		let start = Instant::now();
		let mut gate = Debounce::new(Duration::from_secs(1));
		assert!(gate.admit(start));
		assert!(!gate.admit(start + Duration::from_millis(200)));
		assert!(!gate.admit(start + Duration::from_millis(999)));
		// A delta of exactly the window is still absorbed.
		assert!(!gate.admit(start + Duration::from_millis(1000)));
	}

	#[test]
	fn debounce_fires_after_window() {
		let start = Instant::now();
		let mut gate = Debounce::new(Duration::from_secs(1));
		assert!(gate.admit(start));
		assert!(gate.admit(start + Duration::from_millis(1001)));
	}

	#[test]
	fn debounce_save_burst_collapses() {
		let start = Instant::now();
		let mut gate = Debounce::new(Duration::from_secs(1));
		let fired: Vec<bool> = [0u64, 200, 1500]
			.iter()
			.map(|ms| gate.admit(start + Duration::from_millis(*ms)))
			.collect();
		assert_eq!(fired, vec![true, false, true]);
	}

	#[test]
	fn debounce_no_two_fires_within_window() {
		let start = Instant::now();
		let mut gate = Debounce::new(Duration::from_millis(100));
		let mut fires: Vec<u64> = Vec::new();
		for ms in (0..1000).step_by(7) {
			if gate.admit(start + Duration::from_millis(ms)) {
				fires.push(ms);
			}
		}
		assert!(!fires.is_empty());
		for pair in fires.windows(2) {
			assert!(pair[1] - pair[0] > 100);
		}
	}

	#[test]
	fn extension_filter_matches_configured_only() {
		let exts = vec!["py".to_string(), "ini".to_string()];
		assert!(has_watched_extension(Path::new("/code/app.py"), &exts));
		assert!(has_watched_extension(Path::new("settings.ini"), &exts));
		assert!(!has_watched_extension(Path::new("/code/notes.txt"), &exts));
		assert!(!has_watched_extension(Path::new("/code/Makefile"), &exts));
		// A bare file named like an extension has no extension of its own.
		assert!(!has_watched_extension(Path::new("/code/py"), &exts));
	}

	#[test]
	fn extension_filter_tolerates_leading_dot() {
		let exts = vec![".py".to_string(), "ini".to_string()];
		assert!(has_watched_extension(Path::new("/code/app.py"), &exts));
		assert!(has_watched_extension(Path::new("/code/settings.ini"), &exts));
		assert!(!has_watched_extension(Path::new("/code/notes.txt"), &exts));
	}

	#[test]
	fn classify_maps_file_events() {
		use notify::event::{AccessKind, DataChange};

		assert_eq!(classify(&EventKind::Create(CreateKind::File)), Some(ChangeKind::Created));
		assert_eq!(
			classify(&EventKind::Modify(ModifyKind::Data(DataChange::Any))),
			Some(ChangeKind::Modified)
		);
		assert_eq!(classify(&EventKind::Remove(RemoveKind::File)), Some(ChangeKind::Deleted));
		assert_eq!(
			classify(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
			Some(ChangeKind::Created)
		);
		assert_eq!(classify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))), None);
		assert_eq!(classify(&EventKind::Create(CreateKind::Folder)), None);
		assert_eq!(classify(&EventKind::Access(AccessKind::Any)), None);
	}
}
