use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::dispatch::context::{ProviderOutput, Result};

/// Default time limit for a provider that does not declare one.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

/// A concrete capability (image, search, music, speech, ...).
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
  /// Slash-prefixed command this provider answers, e.g. `/img`.
  fn command(&self) -> &str;

  /// Upper bound on a single `invoke` call.
  fn timeout(&self) -> Duration {
    DEFAULT_PROVIDER_TIMEOUT
  }

  async fn invoke(&self, argument: &str) -> Result<ProviderOutput>;
}

#[derive(Default)]
pub struct CapabilityRegistry {
  providers: HashMap<String, Arc<dyn CapabilityProvider>>,
}

impl CapabilityRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register under the provider's own command. Replaces any previous
  /// provider for that command.
  pub fn register(&mut self, provider: Arc<dyn CapabilityProvider>) {
    let command = normalize_command(provider.command());
    self.providers.insert(command, provider);
  }

  pub fn get(&self, command: &str) -> Option<&Arc<dyn CapabilityProvider>> {
    self.providers.get(&normalize_command(command))
  }

  pub fn contains(&self, command: &str) -> bool {
    self.get(command).is_some()
  }

  /// Registered commands, sorted.
  pub fn commands(&self) -> Vec<String> {
    let mut commands: Vec<String> = self.providers.keys().cloned().collect();
    commands.sort();
    commands
  }

  pub fn is_empty(&self) -> bool {
    self.providers.is_empty()
  }
}

/// Lowercase and ensure a single leading slash.
pub fn normalize_command(command: &str) -> String {
  let trimmed = command.trim().trim_start_matches('/');
  format!("/{}", trimmed.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  struct Echo(&'static str);

  #[async_trait]
  impl CapabilityProvider for Echo {
    fn command(&self) -> &str {
      self.0
    }

    async fn invoke(&self, argument: &str) -> Result<ProviderOutput> {
      Ok(ProviderOutput::Text(argument.to_string()))
    }
  }

  #[test]
  fn lookups_ignore_case_and_slash() {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(Echo("/web")));
    registry.register(Arc::new(Echo("IMG")));

    assert!(registry.contains("/WEB"));
    assert!(registry.contains("img"));
    assert!(!registry.contains("/music"));
    assert_eq!(registry.commands(), vec!["/img", "/web"]);
  }

  #[test]
  fn default_timeout_applies() {
    assert_eq!(Echo("/x").timeout(), DEFAULT_PROVIDER_TIMEOUT);
  }
}
