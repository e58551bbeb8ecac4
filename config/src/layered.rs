// Layered Configuration
// Support for layered configuration with precedence

/// Ordered stack of TOML layers, later layers taking precedence
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
  /// Configuration layers
  layers: Vec<ConfigLayer>,
}

/// Configuration layer with source tracking
#[derive(Debug, Clone)]
pub struct ConfigLayer {
  /// Layer source
  pub source: ConfigLayerSource,
  /// Configuration values
  pub values: toml::Table,
}

/// Configuration layer source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayerSource {
  /// Built-in defaults
  Default,
  /// Global user config
  GlobalConfig,
  /// Project-specific config
  ProjectConfig,
  /// File passed explicitly
  ExplicitFile,
  /// Flat environment variables
  Environment,
  /// CLI override
  CliOverride,
}

impl ConfigLayer {
  pub fn new(source: ConfigLayerSource, values: toml::Table) -> Self {
    Self { source, values }
  }
}

impl LayeredConfig {
  /// Create a new layered configuration
  pub fn new() -> Self {
    Self { layers: Vec::new() }
  }

  /// Add a layer
  pub fn add_layer(&mut self, layer: ConfigLayer) {
    self.layers.push(layer);
  }

  pub fn sources(&self) -> Vec<ConfigLayerSource> {
    self.layers.iter().map(|l| l.source.clone()).collect()
  }

  /// Deep-merge all layers; nested tables merge key by key, anything else is replaced.
  pub fn merge(&self) -> toml::Table {
    let mut merged = toml::Table::new();
    for layer in &self.layers {
      merge_tables(&mut merged, layer.values.clone());
    }
    merged
  }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
  for (key, value) in overlay {
    match base.get_mut(&key) {
      Some(existing) => merge_values(existing, value),
      None => {
        base.insert(key, value);
      }
    }
  }
}

fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
  match (base, overlay) {
    (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
      merge_tables(base_table, overlay_table);
    }
    (base, overlay) => *base = overlay,
  }
}
