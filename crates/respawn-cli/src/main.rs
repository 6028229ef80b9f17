mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use owo_colors::OwoColorize;
use tokio::sync::{mpsc, watch};

use respawn_core::{no_changes, ChangeWatcher, RunError, Supervisor};

fn main() -> ExitCode {
	let args: Vec<String> = std::env::args().skip(1).collect();

	if args.is_empty() {
		print_usage();
		return ExitCode::SUCCESS;
	}

	match args[0].as_str() {
		"help" | "--help" | "-h" => {
			print_usage();
			ExitCode::SUCCESS
		}
		"version" | "--version" | "-V" => {
			println!("respawn {}", env!("CARGO_PKG_VERSION"));
			ExitCode::SUCCESS
		}
		"init" => cmd_init(&args[1..]),
		"run" => cmd_run(&args[1..]),
		other => {
			eprintln!("unknown command: {}", other);
			eprintln!("see '{}' for usage", "respawn help".bold());
			ExitCode::FAILURE
		}
	}
}

fn print_usage() {
	eprintln!(
		"{} {} - run, watch, and respawn your app while you develop",
		"respawn".bold(),
		env!("CARGO_PKG_VERSION")
	);
	eprintln!();
	eprintln!("usage: {} <command> [dir]", "respawn".bold());
	eprintln!();

	eprintln!("{}", "commands".cyan().bold());
	eprintln!("  {} [dir]      Install dependencies, launch the app, restart on change", "run".bold());
	eprintln!("  {} [dir]     Create a starter {}", "init".bold(), config::CONFIG_FILE);
	eprintln!("  {}          Show this help", "help".bold());
	eprintln!("  {}       Show version", "version".bold());
	eprintln!();

	eprintln!("{}", "behavior".cyan().bold());
	eprintln!("  A clean exit (code 0) ends the run.");
	eprintln!("  A crash waits for your next edit instead of restart-looping.");
	eprintln!("  Ctrl-C stops the app gracefully and exits.");
}

fn cmd_init(args: &[String]) -> ExitCode {
	let dir = args.first().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
	let path = dir.join(config::CONFIG_FILE);

	if path.exists() {
		eprintln!("already exists: {}", path.display());
		return ExitCode::FAILURE;
	}
	if let Err(e) = std::fs::write(&path, config::STARTER) {
		eprintln!("failed to write {}: {}", path.display(), e);
		return ExitCode::FAILURE;
	}
	eprintln!("created {}", path.display());
	eprintln!();
	eprintln!("getting started:");
	eprintln!("  1. set the [app] command in {}", config::CONFIG_FILE);
	eprintln!("  2. list dependencies in requirements.txt (optional)");
	eprintln!("  3. start: {}", "respawn run".bold());
	ExitCode::SUCCESS
}

fn cmd_run(args: &[String]) -> ExitCode {
	let dir = args.first().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
	let config_path = dir.join(config::CONFIG_FILE);

	let cfg = match config::load(&config_path) {
		Ok(cfg) => cfg,
		Err(config::ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
			eprintln!("no {} in {}", config::CONFIG_FILE, dir.display());
			eprintln!("create one with '{}'", "respawn init".bold());
			return ExitCode::FAILURE;
		}
		Err(e) => {
			eprintln!("failed to load {}: {}", config_path.display(), e);
			return ExitCode::FAILURE;
		}
	};

	let runtime = match tokio::runtime::Runtime::new() {
		Ok(rt) => rt,
		Err(e) => {
			eprintln!("failed to start runtime: {}", e);
			return ExitCode::FAILURE;
		}
	};

	match runtime.block_on(run_supervised(&dir, cfg)) {
		Ok(()) => {
			println!("{}", "stopped cleanly".green());
			ExitCode::SUCCESS
		}
		Err(e) => {
			eprintln!("{} {}", "error:".red().bold(), e);
			if let RunError::InstallFailed { stderr, .. } = &e {
				if !stderr.trim().is_empty() {
					eprintln!("{}", stderr.trim_end());
				}
			}
			ExitCode::FAILURE
		}
	}
}

async fn run_supervised(dir: &Path, cfg: config::Config) -> Result<(), RunError> {
	tracing_subscriber::fmt().init();

	let bootstrapper = cfg.bootstrapper(dir);
	let mut supervisor = Supervisor::new(cfg.controller(dir), cfg.supervisor_config());

	// Print install progress as it streams in, then settle the outcome.
	let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<String>();
	let printer = tokio::spawn(async move {
		while let Some(line) = progress_rx.recv().await {
			println!("{} {}", "[deps]".dimmed(), line);
		}
	});
	let outcome = supervisor.bootstrap(&bootstrapper, progress_tx).await;
	let _ = printer.await;
	outcome?;

	// Watching is best-effort: without it there is no auto-restart, but
	// the app still runs and Ctrl-C still works.
	let mut watcher = match ChangeWatcher::start(dir, cfg.watch_config()) {
		Ok(w) => Some(w),
		Err(e) => {
			eprintln!("{} {}; running without auto-restart", "warning:".yellow(), e);
			None
		}
	};
	let changes = watcher
		.as_mut()
		.and_then(|w| w.take_signals())
		.unwrap_or_else(no_changes);

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			let _ = shutdown_tx.send(true);
		}
	});

	println!(
		"{} {} (watching {})",
		"running".green().bold(),
		cfg.app.command,
		dir.display()
	);
	let result = supervisor.supervise(changes, shutdown_rx).await;
	if let Some(watcher) = watcher.take() {
		watcher.stop();
	}
	result
}
