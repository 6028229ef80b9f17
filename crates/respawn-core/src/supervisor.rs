use tokio::sync::{mpsc, watch};

use crate::bootstrap::{BootstrapResult, BootstrapStatus, Bootstrapper};
use crate::error::RunError;
use crate::process::{Controller, ExitNotice};
use crate::watch::Change;

/// Where the supervisor currently is. `Stopped` is terminal: once entered,
/// nothing is running and nothing will be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Bootstrapping,
	Running,
	Restarting,
	Crashed,
	Stopped,
}

/// What to do when the installer runs but exits nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPolicy {
	/// Abort before anything is spawned (the default).
	Abort,
	/// Log and keep going; the app runs against whatever was installed.
	Continue,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
	pub install_policy: InstallPolicy,
}

impl Default for SupervisorConfig {
	fn default() -> Self {
		Self { install_policy: InstallPolicy::Abort }
	}
}

/// Drives a whole run: bootstrap once, then keep the app alive across
/// edits until a clean exit, a fatal error, or a shutdown signal.
///
/// Running and Crashed both react to change signals with a restart. A
/// clean exit (code 0) ends supervision instead of restarting; a crash
/// parks the supervisor until the next edit rather than restart-looping
/// against a broken program.
pub struct Supervisor {
	controller: Controller,
	config: SupervisorConfig,
	exits: Option<mpsc::UnboundedReceiver<ExitNotice>>,
	phase_tx: watch::Sender<Phase>,
}

impl Supervisor {
	pub fn new(mut controller: Controller, config: SupervisorConfig) -> Self {
		let exits = controller.take_exits();
		let (phase_tx, _) = watch::channel(Phase::Bootstrapping);
		Self { controller, config, exits, phase_tx }
	}

	/// Subscribe to phase transitions. The receiver always reflects the
	/// latest phase; a slow reader may miss short-lived intermediates.
	pub fn phases(&self) -> watch::Receiver<Phase> {
		self.phase_tx.subscribe()
	}

	pub fn phase(&self) -> Phase {
		*self.phase_tx.borrow()
	}

	pub fn controller(&self) -> &Controller {
		&self.controller
	}

	fn set_phase(&self, phase: Phase) {
		tracing::debug!("phase: {:?}", phase);
		self.phase_tx.send_replace(phase);
	}

	/// Run the install step and apply the failure policy. On a fatal
	/// outcome the supervisor moves straight to `Stopped` and nothing is
	/// ever spawned.
	pub async fn bootstrap(
		&mut self,
		bootstrapper: &Bootstrapper,
		progress: mpsc::UnboundedSender<String>,
	) -> Result<BootstrapResult, RunError> {
		self.set_phase(Phase::Bootstrapping);
		let result = bootstrapper.run(progress).await;
		match &result.status {
			BootstrapStatus::Installed | BootstrapStatus::SkippedNoManifest => Ok(result),
			BootstrapStatus::InstallFailed { exit_code, stderr } => {
				if self.config.install_policy == InstallPolicy::Continue {
					tracing::warn!("dependency install failed (exit {}), continuing", exit_code);
					Ok(result)
				} else {
					self.set_phase(Phase::Stopped);
					Err(RunError::InstallFailed {
						exit_code: *exit_code,
						stderr: stderr.clone(),
					})
				}
			}
			BootstrapStatus::CommandFailed { error } => {
				self.set_phase(Phase::Stopped);
				Err(RunError::BootstrapFailed(error.clone()))
			}
		}
	}

	/// Supervise the application until a clean exit, a fatal spawn error,
	/// or a shutdown signal (which always wins, from any phase).
	///
	/// `changes` carries debounced edit signals; when it closes, automatic
	/// restarts stop but the app stays supervised. Signals queued before
	/// the first spawn are dropped, they predate anything restartable.
	pub async fn supervise(
		&mut self,
		mut changes: mpsc::Receiver<Change>,
		mut shutdown: watch::Receiver<bool>,
	) -> Result<(), RunError> {
		let mut exits = match self.exits.take() {
			Some(rx) => rx,
			// Already supervised to a terminal state once.
			None => return Ok(()),
		};

		if let Err(e) = self.controller.spawn() {
			self.set_phase(Phase::Stopped);
			return Err(RunError::SpawnFailed(e));
		}
		while changes.try_recv().is_ok() {}
		self.set_phase(Phase::Running);

		let mut changes_open = true;
		loop {
			tokio::select! {
				_ = shutdown.changed() => {
					tracing::info!("shutdown requested");
					self.controller.stop().await;
					self.set_phase(Phase::Stopped);
					return Ok(());
				}
				change = changes.recv(), if changes_open => {
					match change {
						Some(change) => {
							tracing::info!("change detected: {}", change.path.display());
							self.set_phase(Phase::Restarting);
							match self.controller.restart().await {
								Ok(_) => self.set_phase(Phase::Running),
								Err(e) => {
									self.set_phase(Phase::Stopped);
									return Err(RunError::SpawnFailed(e));
								}
							}
						}
						None => {
							tracing::warn!("change feed closed, automatic restart disabled");
							changes_open = false;
						}
					}
				}
				notice = exits.recv() => {
					let notice = match notice {
						// The controller owns a sender, so the feed
						// outlives this loop.
						None => continue,
						Some(n) => n,
					};
					if !self.controller.acknowledge(&notice) {
						continue;
					}
					if notice.exit_code == 0 {
						tracing::info!("app exited cleanly, ending supervision");
						self.set_phase(Phase::Stopped);
						return Ok(());
					}
					tracing::warn!(
						"app crashed (exit {}), waiting for the next change",
						notice.exit_code
					);
					self.set_phase(Phase::Crashed);
				}
			}
		}
	}
}
