use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::manifest::Manifest;

/// Default install command. The command is split on whitespace, then
/// `{manifest}` is replaced per token with the resolved manifest path,
/// which stays a single argument even when it contains spaces.
pub const DEFAULT_INSTALL_COMMAND: &str = "pip install -r {manifest}";

/// Runs the dependency install step for a project directory.
///
/// The bootstrapper only reports what happened; whether a failed install
/// aborts the run is the caller's policy.
pub struct Bootstrapper {
	dir: PathBuf,
	manifest: PathBuf,
	command: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapStatus {
	/// Installer ran and exited 0.
	Installed,
	/// No manifest file present. Nothing to install, treated as success.
	SkippedNoManifest,
	/// Installer ran and exited nonzero.
	InstallFailed { exit_code: i32, stderr: String },
	/// Installer could not be started (empty or missing command).
	CommandFailed { error: String },
}

#[derive(Debug, Clone)]
pub struct BootstrapResult {
	pub status: BootstrapStatus,
	/// Ordered transcript of every progress line emitted during the run.
	pub log: Vec<String>,
}

impl BootstrapResult {
	pub fn success(&self) -> bool {
		matches!(
			self.status,
			BootstrapStatus::Installed | BootstrapStatus::SkippedNoManifest
		)
	}
}

fn emit(progress: &mpsc::UnboundedSender<String>, log: &mut Vec<String>, line: String) {
	let _ = progress.send(line.clone());
	log.push(line);
}

impl Bootstrapper {
	pub fn new(dir: impl Into<PathBuf>, manifest: impl Into<PathBuf>, command: impl Into<String>) -> Self {
		Self {
			dir: dir.into(),
			manifest: manifest.into(),
			command: command.into(),
		}
	}

	fn manifest_path(&self) -> PathBuf {
		if self.manifest.is_absolute() {
			self.manifest.clone()
		} else {
			self.dir.join(&self.manifest)
		}
	}

	/// Run the install step. Each completed line of installer output is
	/// sent on `progress` as it arrives and collected into the transcript.
	///
	/// Never returns an error: every outcome, including a missing manifest
	/// or an unlaunchable installer, is a [`BootstrapStatus`].
	pub async fn run(&self, progress: mpsc::UnboundedSender<String>) -> BootstrapResult {
		let mut log = Vec::new();
		emit(&progress, &mut log, "checking dependencies...".to_string());

		let manifest_path = self.manifest_path();
		let manifest = match Manifest::load(&manifest_path) {
			Ok(m) => m,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				emit(
					&progress,
					&mut log,
					format!("{} not found, skipping install", manifest_path.display()),
				);
				return BootstrapResult { status: BootstrapStatus::SkippedNoManifest, log };
			}
			Err(e) => {
				emit(
					&progress,
					&mut log,
					format!("cannot read {}: {}", manifest_path.display(), e),
				);
				return BootstrapResult {
					status: BootstrapStatus::CommandFailed { error: e.to_string() },
					log,
				};
			}
		};

		emit(
			&progress,
			&mut log,
			format!(
				"installing {} package(s) from {}",
				manifest.len(),
				manifest_path.display()
			),
		);

		// Substituting after the split keeps a manifest path with spaces
		// in a single argv entry.
		let manifest_arg = manifest_path.display().to_string();
		let argv: Vec<String> = self
			.command
			.split_whitespace()
			.map(|token| token.replace("{manifest}", &manifest_arg))
			.collect();
		if argv.is_empty() {
			let error = "install command is empty".to_string();
			emit(&progress, &mut log, error.clone());
			return BootstrapResult { status: BootstrapStatus::CommandFailed { error }, log };
		}

		tracing::debug!("running installer: {}", argv.join(" "));
		let mut child = match Command::new(&argv[0])
			.args(&argv[1..])
			.current_dir(&self.dir)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.spawn()
		{
			Ok(child) => child,
			Err(e) => {
				emit(&progress, &mut log, format!("failed to launch installer: {}", e));
				return BootstrapResult {
					status: BootstrapStatus::CommandFailed { error: e.to_string() },
					log,
				};
			}
		};

		// Stream stdout line by line while the installer runs; stderr is
		// collected whole for the failure report.
		let stdout = child.stdout.take();
		let live = progress.clone();
		let stdout_task = tokio::spawn(async move {
			let mut collected = Vec::new();
			if let Some(out) = stdout {
				let mut lines = BufReader::new(out).lines();
				while let Ok(Some(line)) = lines.next_line().await {
					let _ = live.send(line.clone());
					collected.push(line);
				}
			}
			collected
		});
		let stderr = child.stderr.take();
		let stderr_task = tokio::spawn(async move {
			let mut buf = String::new();
			if let Some(mut err) = stderr {
				let _ = err.read_to_string(&mut buf).await;
			}
			buf
		});

		let status = child.wait().await;
		log.extend(stdout_task.await.unwrap_or_default());
		let stderr_text = stderr_task.await.unwrap_or_default();

		match status {
			Ok(s) if s.success() => {
				emit(&progress, &mut log, "dependencies installed".to_string());
				BootstrapResult { status: BootstrapStatus::Installed, log }
			}
			Ok(s) => {
				let exit_code = s.code().unwrap_or(-1);
				emit(&progress, &mut log, format!("installer exited with code {}", exit_code));
				BootstrapResult {
					status: BootstrapStatus::InstallFailed { exit_code, stderr: stderr_text },
					log,
				}
			}
			Err(e) => {
				emit(&progress, &mut log, format!("installer failed: {}", e));
				BootstrapResult {
					status: BootstrapStatus::CommandFailed { error: e.to_string() },
					log,
				}
			}
		}
	}
}
