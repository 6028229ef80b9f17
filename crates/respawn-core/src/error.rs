use std::io;

/// Fatal outcomes of a supervised run.
///
/// Routine trouble (a crashing app, a lost watch) is absorbed into state
/// transitions; only failures that leave nothing to supervise end up here.
#[derive(Debug)]
pub enum RunError {
	/// The installer subprocess could not be started at all.
	BootstrapFailed(String),
	/// The installer ran and exited nonzero.
	InstallFailed { exit_code: i32, stderr: String },
	/// The application could not be launched.
	SpawnFailed(io::Error),
}

impl std::fmt::Display for RunError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			RunError::BootstrapFailed(e) => write!(f, "bootstrap failed: {}", e),
			RunError::InstallFailed { exit_code, .. } => {
				write!(f, "dependency install failed (exit {})", exit_code)
			}
			RunError::SpawnFailed(e) => write!(f, "spawn failed: {}", e),
		}
	}
}

impl std::error::Error for RunError {}

/// Failure to subscribe to file-system notifications.
///
/// Deliberately separate from [`RunError`]: a broken watch is not fatal,
/// callers may keep supervising without automatic restarts.
#[derive(Debug)]
pub struct WatchError(pub notify::Error);

impl std::fmt::Display for WatchError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "watch setup failed: {}", self.0)
	}
}

impl std::error::Error for WatchError {}

impl From<notify::Error> for WatchError {
	fn from(e: notify::Error) -> Self {
		WatchError(e)
	}
}
