use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Launch specification for the supervised application.
#[derive(Debug, Clone)]
pub struct AppSpec {
	/// Program and arguments, split on whitespace. Not passed to a shell.
	pub command: String,
	/// Working directory for the child.
	pub dir: PathBuf,
	/// Extra environment on top of the inherited one.
	pub env: HashMap<String, String>,
}

impl AppSpec {
	pub fn new(command: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
		Self {
			command: command.into(),
			dir: dir.into(),
			env: HashMap::new(),
		}
	}
}

/// Sent when the currently owned child exits on its own. Children reaped
/// by [`Controller::stop`] or [`Controller::restart`] never produce one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitNotice {
	/// Which spawn this notice belongs to. Notices from an already
	/// replaced child fail [`Controller::acknowledge`].
	pub generation: u64,
	/// Exit code, or -1 when the child was killed by a signal.
	pub exit_code: i32,
}

struct ChildSlot {
	pid: u32,
	generation: u64,
	cancel: watch::Sender<bool>,
	task: JoinHandle<()>,
}

/// Owns the lifecycle of the single supervised child process.
///
/// Each spawn gets a monitor task that waits on the child. If the child
/// exits on its own the task reports an [`ExitNotice`]; if the controller
/// wants it gone, the task escalates from SIGTERM to SIGKILL after the
/// grace period and reaps the child before finishing. `stop()` awaits
/// that task, so once it returns nothing of the child remains.
pub struct Controller {
	spec: AppSpec,
	grace: Duration,
	generation: u64,
	slot: Option<ChildSlot>,
	exit_tx: mpsc::UnboundedSender<ExitNotice>,
	exit_rx: Option<mpsc::UnboundedReceiver<ExitNotice>>,
}

impl Controller {
	pub fn new(spec: AppSpec, grace: Duration) -> Self {
		let (exit_tx, exit_rx) = mpsc::unbounded_channel();
		Self {
			spec,
			grace,
			generation: 0,
			slot: None,
			exit_tx,
			exit_rx: Some(exit_rx),
		}
	}

	/// Take the receiver for self-exit notices. Can be taken once.
	pub fn take_exits(&mut self) -> Option<mpsc::UnboundedReceiver<ExitNotice>> {
		self.exit_rx.take()
	}

	/// Pid of the currently owned child, if any.
	pub fn child_pid(&self) -> Option<u32> {
		self.slot.as_ref().map(|slot| slot.pid)
	}

	/// Launch the application in its own process group.
	///
	/// Replacing a live child goes through [`Controller::restart`]; calling
	/// `spawn` with one still owned drops the old slot, whose monitor task
	/// then shuts that child down in the background.
	pub fn spawn(&mut self) -> io::Result<u32> {
		let argv: Vec<&str> = self.spec.command.split_whitespace().collect();
		if argv.is_empty() {
			return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty app command"));
		}

		let mut cmd = Command::new(argv[0]);
		cmd.args(&argv[1..])
			.current_dir(&self.spec.dir)
			.stdin(Stdio::inherit())
			.stdout(Stdio::inherit())
			.stderr(Stdio::inherit())
			.kill_on_drop(true)
			.process_group(0);
		for (key, val) in &self.spec.env {
			cmd.env(key, val);
		}

		let mut child = cmd.spawn()?;
		let pid = child.id().unwrap_or(0);
		self.generation += 1;
		let generation = self.generation;

		let (cancel_tx, mut cancel_rx) = watch::channel(false);
		let exit_tx = self.exit_tx.clone();
		let grace = self.grace;
		let task = tokio::spawn(async move {
			let exited = tokio::select! {
				status = child.wait() => Some(status),
				_ = cancel_rx.changed() => None,
			};
			match exited {
				Some(status) => {
					let exit_code = match status {
						Ok(s) => s.code().unwrap_or(-1),
						Err(_) => -1,
					};
					let _ = exit_tx.send(ExitNotice { generation, exit_code });
				}
				None => terminate(&mut child, pid, grace).await,
			}
		});

		tracing::info!("spawned '{}' (pid {})", self.spec.command, pid);
		self.slot = Some(ChildSlot { pid, generation, cancel: cancel_tx, task });
		Ok(pid)
	}

	/// Gracefully stop the owned child, escalating to a kill after the
	/// grace period. Returns once the child is fully reaped; a no-op when
	/// none is owned. The stopped child produces no exit notice.
	pub async fn stop(&mut self) {
		if let Some(slot) = self.slot.take() {
			let _ = slot.cancel.send(true);
			let _ = slot.task.await;
			tracing::info!("stopped child (pid {})", slot.pid);
		}
	}

	/// Stop the owned child (if any), then launch a fresh one. Callers are
	/// serialized through `&mut self`; a second restart waits for the
	/// first to finish.
	pub async fn restart(&mut self) -> io::Result<u32> {
		self.stop().await;
		self.spawn()
	}

	/// Match an exit notice against the owned child. Returns true and
	/// releases the slot when the notice is for the current child, false
	/// for a stale notice from an already replaced one.
	pub fn acknowledge(&mut self, notice: &ExitNotice) -> bool {
		match &self.slot {
			Some(slot) if slot.generation == notice.generation => {
				self.slot = None;
				true
			}
			_ => false,
		}
	}
}

/// Signal the child's process group to exit, wait out the grace period,
/// then kill whatever is left. Always reaps before returning. A grace of
/// zero skips straight to SIGKILL.
async fn terminate(child: &mut Child, pid: u32, grace: Duration) {
	use nix::sys::signal::{killpg, Signal};
	use nix::unistd::Pid;

	let pgid = Pid::from_raw(pid as i32);
	let _ = killpg(pgid, Signal::SIGTERM);
	if tokio::time::timeout(grace, child.wait()).await.is_err() {
		tracing::warn!("pid {} ignored SIGTERM for {:?}, killing", pid, grace);
		let _ = killpg(pgid, Signal::SIGKILL);
		let _ = child.wait().await;
	}
}
