//! Task inference from document text.
//!
//! [`AnalysisEngine::analyze_tasks`] builds the prompt, consults the
//! [`ResponseCache`], calls the provider at most once per uncached request,
//! and validates what comes back. Without a provider credential it falls back
//! to [`heuristic::HeuristicExtractor`].

pub mod heuristic;
pub mod parse;
pub mod prompt;
pub mod provider;

pub use heuristic::{HeuristicConfig, HeuristicExtractor};
pub use parse::{ParsedResponse, normalize_category};
pub use provider::{CompletionRequest, LlmProvider};
#[cfg(feature = "provider")]
pub use provider::AnthropicProvider;

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::cache::{CacheRequest, ResponseCache};
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::types::TaskDraft;

/// Cache scope for a domain set, usable with [`ResponseCache::invalidate`]
pub fn domain_scope(domains: &[String]) -> String {
    format!("domains:{}", domains.join("|"))
}

pub struct AnalysisEngine {
    provider: Option<Arc<dyn LlmProvider>>,
    cache: Arc<ResponseCache>,
    config: AnalysisConfig,
    heuristic: HeuristicExtractor,
}

impl AnalysisEngine {
    /// Engine over an explicit provider (or none, for heuristics only)
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        cache: Arc<ResponseCache>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            config,
            heuristic: HeuristicExtractor::default(),
        }
    }

    /// Engine using the Anthropic provider when a credential is configured
    #[cfg(feature = "provider")]
    pub fn from_config(config: AnalysisConfig, cache: Arc<ResponseCache>) -> Result<Self> {
        let provider = AnthropicProvider::from_config(&config)?
            .map(|p| Arc::new(p) as Arc<dyn LlmProvider>);
        Ok(Self::new(provider, cache, config))
    }

    pub fn with_heuristic(mut self, heuristic: HeuristicExtractor) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Whether a provider is configured (otherwise heuristics are used)
    pub fn uses_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.as_ref().map(|p| p.name()).unwrap_or("heuristic")
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Infer tasks from one document.
    ///
    /// Provider errors are returned. A response that can't be decoded yields
    /// an empty list, and is not cached.
    pub async fn analyze_tasks(&self, text: &str, domains: &[String]) -> Result<Vec<TaskDraft>> {
        let Some(provider) = &self.provider else {
            let drafts = self.heuristic.extract(text, domains);
            debug!(tasks = drafts.len(), "Heuristic extraction");
            return Ok(drafts);
        };

        let system = prompt::system_prompt(domains);
        let excerpt = prompt::truncate_chars(text, self.config.max_input_chars);
        let user = prompt::user_prompt(excerpt);

        let cache_request = CacheRequest::new(
            format!("{}\n\n{}", system, user),
            json!({ "domains": domains }),
        )
        .with_scope(domain_scope(domains));

        if let Some(cached) = self.cache.get(&cache_request) {
            match parse::decode(&cached) {
                ParsedResponse::Tasks(items) => {
                    debug!(candidates = items.len(), "Using cached provider response");
                    return Ok(parse::validate_all(&items, domains));
                }
                ParsedResponse::Unparsed { reason } => {
                    warn!(reason = %reason, "Discarding undecodable cache entry");
                }
            }
        }

        let request = CompletionRequest {
            system,
            user,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let raw = match provider.complete(&request).await {
            Ok(raw) => raw,
            Err(Error::MalformedResponse(reason)) => {
                warn!(provider = provider.name(), reason = %reason, "Provider returned no usable text");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let parsed = parse::decode(&raw);
        let ParsedResponse::Tasks(items) = &parsed else {
            if let ParsedResponse::Unparsed { reason } = &parsed {
                warn!(provider = provider.name(), reason = %reason, "Could not decode provider response");
            }
            return Ok(Vec::new());
        };

        if let Some(canonical) = parsed.canonical() {
            self.cache.set(&cache_request, &canonical);
        }

        let drafts = parse::validate_all(items, domains);
        info!(
            provider = provider.name(),
            candidates = items.len(),
            accepted = drafts.len(),
            "Provider analysis complete"
        );
        Ok(drafts)
    }
}
