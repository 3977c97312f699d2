use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::llm::provider::{ModelBackend, OpenAiCompatClient};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::info;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OPENROUTER_MODEL: &str = "deepseek/deepseek-r1-0528:free";
const CAILA_BASE_URL: &str = "https://caila.io/api/adapters/openai";
const CAILA_MODEL: &str = "just-ai/openai-proxy/gpt-4o-mini";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Ordered set of usable model backends and their health, plus a weak
/// "last successful backend" hint shared across requests. Health updates
/// go through `mark_success` / `mark_failure`; the hint tolerates races
/// (worst case is one extra failed attempt).
pub struct ModelRegistry {
    backends: Vec<Arc<ModelBackend>>,
    last_successful: RwLock<Option<String>>,
}

impl ModelRegistry {
    pub fn new(backends: Vec<ModelBackend>) -> Result<Self> {
        if backends.is_empty() {
            return Err(ApiError::ConfigurationError(
                "no model provider credentials configured".into(),
            ));
        }

        let mut registry = Self {
            backends: Vec::new(),
            last_successful: RwLock::new(None),
        };
        for backend in backends {
            registry.register(backend);
        }
        Ok(registry)
    }

    /// Builds the provider set from configured credentials, in the fixed
    /// priority order: OpenRouter, Caila, OpenAI.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut backends = Vec::new();

        if let Some(key) = &config.openrouter_api_key {
            let client = OpenAiCompatClient::new(OPENROUTER_BASE_URL, key, OPENROUTER_MODEL)?;
            backends.push(ModelBackend::new("openrouter", 1, Arc::new(client)));
        }
        if let Some(key) = &config.caila_api_key {
            let client = OpenAiCompatClient::new(CAILA_BASE_URL, key, CAILA_MODEL)?;
            backends.push(ModelBackend::new("caila", 2, Arc::new(client)));
        }
        if let Some(key) = &config.openai_api_key {
            let client = OpenAiCompatClient::new(OPENAI_BASE_URL, key, OPENAI_MODEL)?;
            backends.push(ModelBackend::new("openai", 3, Arc::new(client)));
        }

        let registry = Self::new(backends)?;
        info!(
            "Model registry initialized with {} provider(s): {:?}",
            registry.backends.len(),
            registry
                .backends
                .iter()
                .map(|b| b.name())
                .collect::<Vec<_>>()
        );
        Ok(registry)
    }

    /// Appends a backend and keeps the collection sorted ascending by
    /// priority.
    pub fn register(&mut self, backend: ModelBackend) {
        self.backends.push(Arc::new(backend));
        self.backends.sort_by_key(|b| b.priority());
    }

    /// A fresh priority-ordered snapshot of all backends, recomputed per
    /// call so callers always see the current ordering.
    pub fn candidates(&self) -> Vec<Arc<ModelBackend>> {
        let mut snapshot = self.backends.clone();
        snapshot.sort_by_key(|b| b.priority());
        snapshot
    }

    pub fn mark_success(&self, backend: &ModelBackend) {
        backend.record_success();
        if let Ok(mut last) = self.last_successful.write() {
            *last = Some(backend.name().to_string());
        }
    }

    pub fn mark_failure(&self, backend: &ModelBackend) {
        backend.record_failure();
    }

    pub fn last_successful(&self) -> Option<String> {
        self.last_successful.read().ok().and_then(|l| l.clone())
    }

    pub fn clear_last_successful_if(&self, name: &str) {
        if let Ok(mut last) = self.last_successful.write() {
            if last.as_deref() == Some(name) {
                *last = None;
            }
        }
    }

    /// Point-in-time health snapshot of every provider, for diagnostics.
    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        let current = self.last_successful();
        self.backends
            .iter()
            .map(|b| ProviderStatus {
                name: b.name().to_string(),
                priority: b.priority(),
                available: b.is_available(),
                failures: b.consecutive_failures(),
                is_current: current.as_deref() == Some(b.name()),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub priority: u8,
    pub available: bool,
    pub failures: u32,
    pub is_current: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::{ChatMessage, ChatTransport};
    use async_trait::async_trait;

    struct NoopTransport;

    #[async_trait]
    impl ChatTransport for NoopTransport {
        async fn complete(&self, _messages: &[ChatMessage], _json_mode: bool) -> Result<String> {
            Ok(String::new())
        }
    }

    fn backend(name: &str, priority: u8) -> ModelBackend {
        ModelBackend::new(name, priority, Arc::new(NoopTransport))
    }

    #[test]
    fn construction_fails_without_backends() {
        let result = ModelRegistry::new(Vec::new());
        assert!(matches!(result, Err(ApiError::ConfigurationError(_))));
    }

    #[test]
    fn candidates_are_ordered_by_priority() {
        let registry = ModelRegistry::new(vec![
            backend("fallback", 3),
            backend("primary", 1),
            backend("secondary", 2),
        ])
        .unwrap();

        let names: Vec<_> = registry
            .candidates()
            .iter()
            .map(|b| b.name().to_string())
            .collect();
        assert_eq!(names, vec!["primary", "secondary", "fallback"]);
    }

    #[test]
    fn backend_becomes_unavailable_at_threshold_and_recovers_on_success() {
        let registry =
            ModelRegistry::new(vec![backend("a", 1).with_failure_threshold(2)]).unwrap();
        let b = registry.candidates()[0].clone();

        registry.mark_failure(&b);
        assert!(b.is_available());
        assert_eq!(b.consecutive_failures(), 1);

        registry.mark_failure(&b);
        assert!(!b.is_available());
        assert_eq!(b.consecutive_failures(), 2);

        registry.mark_success(&b);
        assert!(b.is_available());
        assert_eq!(b.consecutive_failures(), 0);
    }

    #[test]
    fn default_threshold_demotes_after_one_failure() {
        let registry = ModelRegistry::new(vec![backend("a", 1)]).unwrap();
        let b = registry.candidates()[0].clone();

        registry.mark_failure(&b);
        assert!(!b.is_available());
    }

    #[test]
    fn provider_status_reflects_health_and_current_pointer() {
        let registry = ModelRegistry::new(vec![backend("a", 1), backend("b", 2)]).unwrap();
        let a = registry.candidates()[0].clone();
        let b = registry.candidates()[1].clone();

        registry.mark_failure(&a);
        registry.mark_success(&b);

        let status = registry.provider_status();
        assert_eq!(status[0].name, "a");
        assert!(!status[0].available);
        assert_eq!(status[0].failures, 1);
        assert!(!status[0].is_current);
        assert!(status[1].available);
        assert!(status[1].is_current);
    }

    #[test]
    fn last_successful_is_tracked_and_cleared() {
        let registry = ModelRegistry::new(vec![backend("a", 1), backend("b", 2)]).unwrap();
        let a = registry.candidates()[0].clone();

        assert_eq!(registry.last_successful(), None);

        registry.mark_success(&a);
        assert_eq!(registry.last_successful(), Some("a".to_string()));

        registry.clear_last_successful_if("b");
        assert_eq!(registry.last_successful(), Some("a".to_string()));

        registry.clear_last_successful_if("a");
        assert_eq!(registry.last_successful(), None);
    }
}
