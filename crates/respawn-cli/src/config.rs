use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use respawn_core::{
	AppSpec, Bootstrapper, Controller, InstallPolicy, SupervisorConfig, WatchConfig,
	DEFAULT_INSTALL_COMMAND,
};

pub const CONFIG_FILE: &str = "respawn.toml";

// ── Project config (<dir>/respawn.toml) ─────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub app: AppSection,
	#[serde(default)]
	pub bootstrap: BootstrapSection,
	#[serde(default)]
	pub watch: WatchSection,
	#[serde(default)]
	pub process: ProcessSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
	/// Program and arguments used to launch the app. Split on whitespace,
	/// not passed to a shell.
	pub command: String,
	#[serde(default)]
	pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapSection {
	#[serde(default = "default_manifest")]
	pub manifest: String,
	#[serde(default = "default_install_command")]
	pub command: String,
	#[serde(default = "default_on_failure")]
	pub on_failure: FailurePolicy,
}

impl Default for BootstrapSection {
	fn default() -> Self {
		Self {
			manifest: default_manifest(),
			command: default_install_command(),
			on_failure: default_on_failure(),
		}
	}
}

fn default_manifest() -> String { "requirements.txt".to_string() }
fn default_install_command() -> String { DEFAULT_INSTALL_COMMAND.to_string() }
fn default_on_failure() -> FailurePolicy { FailurePolicy::Abort }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
	Abort,
	Continue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
	#[serde(default = "default_extensions")]
	pub extensions: Vec<String>,
	#[serde(default = "default_debounce_ms")]
	pub debounce_ms: u64,
}

impl Default for WatchSection {
	fn default() -> Self {
		Self {
			extensions: default_extensions(),
			debounce_ms: default_debounce_ms(),
		}
	}
}

fn default_extensions() -> Vec<String> { vec!["py".to_string(), "ini".to_string()] }
fn default_debounce_ms() -> u64 { 1000 }

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessSection {
	#[serde(default = "default_grace_secs")]
	pub grace_secs: u64,
}

impl Default for ProcessSection {
	fn default() -> Self {
		Self { grace_secs: default_grace_secs() }
	}
}

fn default_grace_secs() -> u64 { 2 }

// ── Loading ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
	Io(std::io::Error),
	Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ConfigError::Io(e) => write!(f, "io error: {}", e),
			ConfigError::Parse(e) => write!(f, "parse error: {}", e),
		}
	}
}

impl std::error::Error for ConfigError {}

pub fn load(path: &Path) -> Result<Config, ConfigError> {
	let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
	toml::from_str(&text).map_err(ConfigError::Parse)
}

// ── Mapping onto core types ──────────────────────────────────────────────────

impl Config {
	pub fn bootstrapper(&self, dir: &Path) -> Bootstrapper {
		Bootstrapper::new(dir, self.bootstrap.manifest.clone(), self.bootstrap.command.clone())
	}

	pub fn controller(&self, dir: &Path) -> Controller {
		let mut spec = AppSpec::new(self.app.command.clone(), dir);
		spec.env = self.app.env.clone();
		Controller::new(spec, Duration::from_secs(self.process.grace_secs))
	}

	pub fn watch_config(&self) -> WatchConfig {
		WatchConfig {
			extensions: self.watch.extensions.clone(),
			debounce: Duration::from_millis(self.watch.debounce_ms),
		}
	}

	pub fn supervisor_config(&self) -> SupervisorConfig {
		SupervisorConfig {
			install_policy: match self.bootstrap.on_failure {
				FailurePolicy::Abort => InstallPolicy::Abort,
				FailurePolicy::Continue => InstallPolicy::Continue,
			},
		}
	}
}

// ── Starter file written by `respawn init` ───────────────────────────────────

pub const STARTER: &str = r#"# respawn project configuration

[app]
# Command used to launch the app (split on whitespace, no shell).
command = "python main.py"
# env = { PYTHONUNBUFFERED = "1" }

[bootstrap]
# manifest = "requirements.txt"
# command = "pip install -r {manifest}"
# on_failure = "abort"        # or "continue"

[watch]
# extensions = ["py", "ini"]
# debounce_ms = 1000

[process]
# grace_secs = 2
"#;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn minimal_config_gets_defaults() {
		let cfg: Config = toml::from_str("[app]\ncommand = \"python main.py\"\n").unwrap();
		assert_eq!(cfg.app.command, "python main.py");
		assert!(cfg.app.env.is_empty());
		assert_eq!(cfg.bootstrap.manifest, "requirements.txt");
		assert_eq!(cfg.bootstrap.command, "pip install -r {manifest}");
		assert_eq!(cfg.bootstrap.on_failure, FailurePolicy::Abort);
		assert_eq!(cfg.watch.extensions, ["py", "ini"]);
		assert_eq!(cfg.watch.debounce_ms, 1000);
		assert_eq!(cfg.process.grace_secs, 2);
	}

	#[test]
	fn full_config_overrides_defaults() {
		let toml = r#"
			[app]
			command = "uvicorn main:app"

			[app.env]
			PORT = "8080"

			[bootstrap]
			manifest = "deps.txt"
			command = "uv pip install -r {manifest}"
			on_failure = "continue"

			[watch]
			extensions = ["py", "toml", "html"]
			debounce_ms = 250

			[process]
			grace_secs = 5
		"#;
		let cfg: Config = toml::from_str(toml).unwrap();
		assert_eq!(cfg.app.env.get("PORT").map(String::as_str), Some("8080"));
		assert_eq!(cfg.bootstrap.manifest, "deps.txt");
		assert_eq!(cfg.bootstrap.on_failure, FailurePolicy::Continue);
		assert_eq!(cfg.watch.extensions, ["py", "toml", "html"]);
		assert_eq!(cfg.watch.debounce_ms, 250);
		assert_eq!(cfg.process.grace_secs, 5);
	}

	#[test]
	fn missing_app_command_is_an_error() {
		assert!(toml::from_str::<Config>("[watch]\ndebounce_ms = 5\n").is_err());
	}

	#[test]
	fn unknown_policy_is_an_error() {
		let toml = "[app]\ncommand = \"x\"\n[bootstrap]\non_failure = \"retry\"\n";
		assert!(toml::from_str::<Config>(toml).is_err());
	}

	#[test]
	fn starter_file_parses() {
		let cfg: Config = toml::from_str(STARTER).unwrap();
		assert_eq!(cfg.app.command, "python main.py");
		assert_eq!(cfg.watch.debounce_ms, 1000);
	}

	#[test]
	fn mapping_carries_watch_settings() {
		let cfg: Config =
			toml::from_str("[app]\ncommand = \"x\"\n[watch]\ndebounce_ms = 250\n").unwrap();
		let wc = cfg.watch_config();
		assert_eq!(wc.debounce, Duration::from_millis(250));
		assert_eq!(wc.extensions, ["py", "ini"]);
	}
}
