//! Tavily web search provider

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use weave_config::SearchProviderConfig;

use super::{check_status, create_client, require_argument};
use crate::dispatch::context::{ProviderError, ProviderOutput, Result};
use crate::dispatch::registry::CapabilityProvider;

const SNIPPET_CHARS: usize = 140;

/// `/web`: search the web and list the top hits
pub struct SearchProvider {
  client: Client,
  endpoint: String,
  api_key: String,
  max_results: u32,
  include_answer: bool,
  timeout: Duration,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
  query: &'a str,
  max_results: u32,
  include_answer: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
  #[serde(default)]
  answer: Option<String>,
  #[serde(default)]
  results: Vec<SearchHit>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchHit {
  title: String,
  url: String,
  content: String,
}

impl SearchProvider {
  pub fn from_config(config: &SearchProviderConfig) -> Result<Self> {
    let api_key = config
      .api_key
      .clone()
      .filter(|key| !key.trim().is_empty())
      .ok_or_else(|| ProviderError::MissingConfig("Tavily key missing, set TAVILY_KEY".to_string()))?;

    Ok(Self {
      client: create_client(Some(config.timeout_secs)),
      endpoint: config.endpoint.clone(),
      api_key,
      max_results: config.max_results,
      include_answer: config.include_answer,
      timeout: Duration::from_secs(config.timeout_secs),
    })
  }

  async fn search(&self, query: &str) -> Result<SearchResponse> {
    let response = self
      .client
      .post(&self.endpoint)
      .bearer_auth(&self.api_key)
      .json(&SearchRequest {
        query,
        max_results: self.max_results,
        include_answer: self.include_answer,
      })
      .send()
      .await?;

    // Older keys reject bearer auth; they still work with the query-string form.
    let response = if response.status() == StatusCode::UNAUTHORIZED {
      debug!("Tavily rejected bearer auth, retrying with api_key parameter");
      let max_results = self.max_results.to_string();
      let include_answer = self.include_answer.to_string();
      self
        .client
        .get(&self.endpoint)
        .query(&[
          ("api_key", self.api_key.as_str()),
          ("query", query),
          ("max_results", max_results.as_str()),
          ("include_answer", include_answer.as_str()),
        ])
        .send()
        .await?
    } else {
      response
    };

    Ok(check_status(response).await?.json().await?)
  }
}

#[async_trait]
impl CapabilityProvider for SearchProvider {
  fn command(&self) -> &str {
    "/web"
  }

  fn timeout(&self) -> Duration {
    self.timeout
  }

  async fn invoke(&self, argument: &str) -> Result<ProviderOutput> {
    require_argument(argument, "search query")?;
    let response = self.search(argument).await?;
    Ok(ProviderOutput::Text(format_results(&response)))
  }
}

fn format_results(response: &SearchResponse) -> String {
  let mut lines = Vec::with_capacity(response.results.len() + 1);
  if let Some(answer) = response.answer.as_deref().filter(|a| !a.trim().is_empty()) {
    lines.push(format!("**Answer** → {}", answer.trim()));
  }
  for hit in &response.results {
    let snippet: String = hit.content.chars().take(SNIPPET_CHARS).collect();
    lines.push(format!(
      "• **{}** – {}…\n{}",
      hit.title,
      snippet.trim(),
      hit.url
    ));
  }

  if lines.is_empty() {
    return "No results".to_string();
  }
  lines.join("\n\n")
}
