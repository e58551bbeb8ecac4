// Configuration Loader
// Layered configuration loading system

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::interpolate::interpolate;
use crate::layered::{ConfigLayer, ConfigLayerSource, LayeredConfig};
use crate::types::Config;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration loader with layered support
pub struct ConfigLoader {
  /// Global config directory
  global_dir: PathBuf,
  /// Project directory containing `.weave/config.toml`
  project_dir: Option<PathBuf>,
  /// File given on the command line
  config_file: Option<PathBuf>,
  /// Environment snapshot used for interpolation and flat overrides
  env: HashMap<String, String>,
}

impl ConfigLoader {
  /// Create a new configuration loader
  pub fn new() -> Self {
    let global_dir = dirs::home_dir()
      .unwrap_or_else(|| PathBuf::from("."))
      .join(".weave");

    Self {
      global_dir,
      project_dir: None,
      config_file: None,
      env: std::env::vars().collect(),
    }
  }

  pub fn with_global_dir(mut self, dir: PathBuf) -> Self {
    self.global_dir = dir;
    self
  }

  /// Set project directory
  pub fn with_project_dir(mut self, dir: PathBuf) -> Self {
    self.project_dir = Some(dir);
    self
  }

  pub fn with_config_file(mut self, path: PathBuf) -> Self {
    self.config_file = Some(path);
    self
  }

  /// Replace the environment snapshot
  pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
    self.env = env;
    self
  }

  /// Load configuration with CLI overrides
  pub fn load_with_cli_overrides(&self, cli_overrides: Vec<(String, String)>) -> Result<Config> {
    // Layers in order:
    // 1. Built-in defaults
    // 2. Global config (~/.weave/config.toml)
    // 3. Project config (.weave/config.toml)
    // 4. Explicit --config-file
    // 5. Flat environment variables
    // 6. CLI overrides
    let layered = self.load_layers()?;
    let mut merged = layered.merge();

    for (key, value) in cli_overrides {
      apply_override(&mut merged, &key, &value)?;
    }

    let config: Config = toml::Value::Table(merged)
      .try_into()
      .context("invalid configuration")?;
    config.validate()?;
    Ok(config)
  }

  /// Collect every available layer without CLI overrides
  pub fn load_layers(&self) -> Result<LayeredConfig> {
    let mut layered = LayeredConfig::new();
    layered.add_layer(ConfigLayer::new(
      ConfigLayerSource::Default,
      default_table()?,
    ));

    let global_path = self.global_dir.join(CONFIG_FILE_NAME);
    if let Some(values) = self.read_optional(&global_path)? {
      layered.add_layer(ConfigLayer::new(ConfigLayerSource::GlobalConfig, values));
    }

    if let Some(project_dir) = &self.project_dir {
      let project_path = project_dir.join(".weave").join(CONFIG_FILE_NAME);
      if let Some(values) = self.read_optional(&project_path)? {
        layered.add_layer(ConfigLayer::new(ConfigLayerSource::ProjectConfig, values));
      }
    }

    if let Some(path) = &self.config_file {
      let values = self
        .read_file(path)
        .with_context(|| format!("failed to load config file {}", path.display()))?;
      layered.add_layer(ConfigLayer::new(ConfigLayerSource::ExplicitFile, values));
    }

    let env_values = self.env_table();
    if !env_values.is_empty() {
      layered.add_layer(ConfigLayer::new(ConfigLayerSource::Environment, env_values));
    }

    Ok(layered)
  }

  fn read_optional(&self, path: &Path) -> Result<Option<toml::Table>> {
    if !path.exists() {
      return Ok(None);
    }
    self.read_file(path).map(Some)
  }

  fn read_file(&self, path: &Path) -> Result<toml::Table> {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("failed to read {}", path.display()))?;
    let hydrated = interpolate(&raw, &self.env);
    let values = toml::from_str::<toml::Table>(&hydrated)
      .with_context(|| format!("failed to parse {}", path.display()))?;
    debug!(path = %path.display(), "loaded config layer");
    Ok(values)
  }

  /// Flat overrides kept for compatibility with older deployments
  fn env_table(&self) -> toml::Table {
    let mut pipeline = toml::Table::new();
    if let Some(value) = self.first_env(&["WEAVE_HIDE_REASONING", "HIDE_THOUGHT_PROCESS"]) {
      pipeline.insert(
        "hide_reasoning".to_string(),
        toml::Value::Boolean(value.trim().eq_ignore_ascii_case("true")),
      );
    }
    if let Some(value) = self.first_env(&["WEAVE_TOOLS_ENABLED", "AGENTIC_TOOLCALL"]) {
      pipeline.insert(
        "tools_enabled".to_string(),
        toml::Value::Boolean(!value.trim().eq_ignore_ascii_case("false")),
      );
    }

    let mut table = toml::Table::new();
    if !pipeline.is_empty() {
      table.insert("pipeline".to_string(), toml::Value::Table(pipeline));
    }
    if let Some(key) = self.first_env(&["WEAVE_TAVILY_KEY", "TAVILY_KEY"]) {
      let mut search = toml::Table::new();
      search.insert("api_key".to_string(), toml::Value::String(key.to_string()));
      let mut providers = toml::Table::new();
      providers.insert("search".to_string(), toml::Value::Table(search));
      table.insert("providers".to_string(), toml::Value::Table(providers));
    }
    table
  }

  fn first_env(&self, names: &[&str]) -> Option<&str> {
    names
      .iter()
      .find_map(|name| self.env.get(*name))
      .map(String::as_str)
  }
}

impl Default for ConfigLoader {
  fn default() -> Self {
    Self::new()
  }
}

fn default_table() -> Result<toml::Table> {
  match toml::Value::try_from(Config::default()).context("failed to serialize defaults")? {
    toml::Value::Table(table) => Ok(table),
    _ => anyhow::bail!("default configuration is not a table"),
  }
}

/// Parse a `KEY=VALUE` command-line override
pub fn parse_override(raw: &str) -> Result<(String, String)> {
  let (key, value) = raw
    .split_once('=')
    .with_context(|| format!("override `{raw}` must be in KEY=VALUE form"))?;
  let key = key.trim();
  if key.is_empty() {
    anyhow::bail!("override `{raw}` has an empty key");
  }
  Ok((key.to_string(), value.trim().to_string()))
}

/// Apply a single dotted-key override. The value is read as a TOML literal
/// when it parses as one, otherwise as a plain string.
fn apply_override(table: &mut toml::Table, key: &str, value: &str) -> Result<()> {
  let mut parts: Vec<&str> = key.split('.').collect();
  let Some(leaf) = parts.pop() else {
    anyhow::bail!("Unknown config key: {key}");
  };

  let mut current = table;
  for part in parts {
    current = match current.get_mut(part) {
      Some(toml::Value::Table(next)) => next,
      _ => anyhow::bail!("Unknown config key: {key}"),
    };
  }

  current.insert(leaf.to_string(), parse_override_value(value));
  Ok(())
}

fn parse_override_value(value: &str) -> toml::Value {
  toml::from_str::<toml::Table>(&format!("v = {value}"))
    .ok()
    .and_then(|mut t| t.remove("v"))
    .unwrap_or_else(|| toml::Value::String(value.to_string()))
}
