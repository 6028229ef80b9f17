//! # respawn-core
//!
//! Supervision core for the `respawn` development launcher.
//!
//! Install a project's dependencies with live progress, launch the app as
//! a child process, and restart it when watched files change. A clean
//! exit ends supervision; a crash parks the supervisor until the next
//! edit instead of restart-looping against a broken program.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tokio::sync::{mpsc, watch};
//! use respawn_core::{
//!     AppSpec, Bootstrapper, ChangeWatcher, Controller, Supervisor,
//!     SupervisorConfig, WatchConfig, DEFAULT_INSTALL_COMMAND,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = std::path::Path::new(".");
//!
//! let bootstrapper = Bootstrapper::new(dir, "requirements.txt", DEFAULT_INSTALL_COMMAND);
//! let controller = Controller::new(AppSpec::new("python main.py", dir), Duration::from_secs(2));
//! let mut supervisor = Supervisor::new(controller, SupervisorConfig::default());
//!
//! let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
//! tokio::spawn(async move {
//!     while let Some(line) = progress_rx.recv().await {
//!         println!("{}", line);
//!     }
//! });
//! supervisor.bootstrap(&bootstrapper, progress_tx).await?;
//!
//! let mut watcher = ChangeWatcher::start(dir, WatchConfig::default())?;
//! let changes = watcher.take_signals().unwrap();
//! let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//! supervisor.supervise(changes, shutdown_rx).await?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod error;
pub mod manifest;
pub mod process;
pub mod supervisor;
pub mod watch;

pub use bootstrap::{BootstrapResult, BootstrapStatus, Bootstrapper, DEFAULT_INSTALL_COMMAND};
pub use error::{RunError, WatchError};
pub use manifest::Manifest;
pub use process::{AppSpec, Controller, ExitNotice};
pub use supervisor::{InstallPolicy, Phase, Supervisor, SupervisorConfig};
pub use watch::{no_changes, Change, ChangeKind, ChangeWatcher, Debounce, WatchConfig};
