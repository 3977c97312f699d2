use crate::error::{ApiError, Result};
use crate::llm::provider::{ChatMessage, ModelBackend};
use crate::llm::registry::ModelRegistry;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Failover-aware invocation layer over the model registry.
///
/// Every structured request walks the candidate list once: the last
/// successful backend first when it is still available, then the remaining
/// backends by priority. A demoted backend gets one cheap health probe
/// before the real request is risked on it. No candidate is tried twice
/// within one call and no delay or backoff is introduced here.
#[derive(Clone)]
pub struct OrchestratedModel {
    registry: Arc<ModelRegistry>,
}

impl OrchestratedModel {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    /// Invokes a structured-output request, parsing the model's JSON answer
    /// into `T`. A response that does not conform counts as a failure of
    /// that backend and triggers failover.
    pub async fn invoke_structured<T: DeserializeOwned>(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<T> {
        let messages = [
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_message),
        ];

        let mut last_error: Option<ApiError> = None;

        for backend in self.candidate_order() {
            if !backend.is_available() {
                if !self.probe(&backend).await {
                    continue;
                }
                info!("Reconnected to provider: {}", backend.name());
            }

            debug!("Trying provider: {}", backend.name());
            match self.attempt::<T>(&backend, &messages).await {
                Ok(result) => {
                    self.registry.mark_success(&backend);
                    return Ok(result);
                }
                Err(err) => {
                    warn!("Provider {} failed: {}", backend.name(), err);
                    self.registry.mark_failure(&backend);
                    self.registry.clear_last_successful_if(backend.name());
                    last_error = Some(err);
                }
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no provider could be reached".to_string());
        Err(ApiError::AllProvidersUnavailable(detail))
    }

    /// Candidate ordering for one call: last-successful first when still
    /// available, then registry priority order, without duplicates.
    fn candidate_order(&self) -> Vec<Arc<ModelBackend>> {
        let candidates = self.registry.candidates();
        let preferred = self.registry.last_successful().and_then(|name| {
            candidates
                .iter()
                .find(|b| b.name() == name && b.is_available())
                .cloned()
        });

        match preferred {
            Some(first) => {
                let mut order = vec![first.clone()];
                order.extend(
                    candidates
                        .into_iter()
                        .filter(|b| b.name() != first.name()),
                );
                order
            }
            None => candidates,
        }
    }

    /// Minimal round-trip to test whether a demoted backend has recovered.
    /// The probe outcome updates health state but is never counted as an
    /// attempt of the real request.
    async fn probe(&self, backend: &Arc<ModelBackend>) -> bool {
        let messages = [ChatMessage::system("Test"), ChatMessage::user("Hi")];
        match backend.transport().complete(&messages, false).await {
            Ok(_) => {
                self.registry.mark_success(backend);
                true
            }
            Err(err) => {
                debug!("Provider {} probe failed: {}", backend.name(), err);
                self.registry.mark_failure(backend);
                false
            }
        }
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        backend: &Arc<ModelBackend>,
        messages: &[ChatMessage],
    ) -> Result<T> {
        let raw = backend.transport().complete(messages, true).await?;
        parse_structured(&raw)
    }
}

/// Parses a model answer into the requested schema, tolerating the code
/// fences some endpoints wrap JSON responses in.
fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let trimmed = strip_code_fences(raw);
    serde_json::from_str(trimmed)
        .map_err(|e| ApiError::SchemaViolation(format!("{}: {}", e, truncate(trimmed, 200))))
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::ChatTransport;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Extracted {
        answer: String,
    }

    /// Transport that replays a script of outcomes and counts every call,
    /// probes included.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<String>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn always_failing() -> Arc<Self> {
            Self::new(Vec::new())
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn complete(&self, _messages: &[ChatMessage], _json_mode: bool) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::ExternalServiceError("scripted failure".into())))
        }
    }

    fn ok(json: &str) -> Result<String> {
        Ok(json.to_string())
    }

    fn orchestrator(
        backends: Vec<ModelBackend>,
    ) -> (OrchestratedModel, Arc<ModelRegistry>) {
        let registry = Arc::new(ModelRegistry::new(backends).unwrap());
        (OrchestratedModel::new(registry.clone()), registry)
    }

    #[tokio::test]
    async fn failover_returns_first_success_and_penalizes_earlier_backends() {
        let first = ScriptedTransport::always_failing();
        let second = ScriptedTransport::always_failing();
        let third = ScriptedTransport::new(vec![ok(r#"{"answer": "from third"}"#)]);

        let (model, registry) = orchestrator(vec![
            ModelBackend::new("first", 1, first.clone()),
            ModelBackend::new("second", 2, second.clone()),
            ModelBackend::new("third", 3, third.clone()),
        ]);

        let result: Extracted = model.invoke_structured("sys", "user").await.unwrap();
        assert_eq!(result.answer, "from third");

        let candidates = registry.candidates();
        assert_eq!(candidates[0].consecutive_failures(), 1);
        assert_eq!(candidates[1].consecutive_failures(), 1);
        assert_eq!(candidates[2].consecutive_failures(), 0);
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        assert_eq!(third.calls(), 1);
    }

    #[tokio::test]
    async fn success_stops_the_walk_before_later_backends() {
        let first = ScriptedTransport::new(vec![ok(r#"{"answer": "primary"}"#)]);
        let second = ScriptedTransport::always_failing();

        let (model, _) = orchestrator(vec![
            ModelBackend::new("first", 1, first.clone()),
            ModelBackend::new("second", 2, second.clone()),
        ]);

        let result: Extracted = model.invoke_structured("sys", "user").await.unwrap();
        assert_eq!(result.answer, "primary");
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn exhaustion_raises_all_providers_unavailable_after_one_try_each() {
        let first = ScriptedTransport::always_failing();
        let second = ScriptedTransport::always_failing();

        let (model, _) = orchestrator(vec![
            ModelBackend::new("first", 1, first.clone()),
            ModelBackend::new("second", 2, second.clone()),
        ]);

        let result: Result<Extracted> = model.invoke_structured("sys", "user").await;
        assert!(matches!(result, Err(ApiError::AllProvidersUnavailable(_))));
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }

    #[tokio::test]
    async fn malformed_schema_counts_as_backend_failure() {
        let first = ScriptedTransport::new(vec![ok("this is not json")]);
        let second = ScriptedTransport::new(vec![ok(r#"{"answer": "recovered"}"#)]);

        let (model, registry) = orchestrator(vec![
            ModelBackend::new("first", 1, first.clone()),
            ModelBackend::new("second", 2, second.clone()),
        ]);

        let result: Extracted = model.invoke_structured("sys", "user").await.unwrap();
        assert_eq!(result.answer, "recovered");
        assert_eq!(registry.candidates()[0].consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn last_successful_backend_is_preferred_next_call() {
        let first = ScriptedTransport::new(vec![
            Err(ApiError::ExternalServiceError("down".into())),
            ok(r#"{"answer": "unused"}"#),
        ]);
        let second = ScriptedTransport::new(vec![
            ok(r#"{"answer": "one"}"#),
            ok(r#"{"answer": "two"}"#),
        ]);

        let (model, _) = orchestrator(vec![
            ModelBackend::new("first", 1, first.clone()),
            ModelBackend::new("second", 2, second.clone()),
        ]);

        let _: Extracted = model.invoke_structured("sys", "user").await.unwrap();
        let again: Extracted = model.invoke_structured("sys", "user").await.unwrap();

        // Second served both calls; first was only hit by the initial walk
        // (its demotion keeps it behind a probe afterwards).
        assert_eq!(again.answer, "two");
        assert_eq!(second.calls(), 2);
        assert_eq!(first.calls(), 1);
    }

    #[tokio::test]
    async fn demoted_backend_is_probed_before_reuse() {
        // Script: real failure (demotes), successful probe, real success.
        let only = ScriptedTransport::new(vec![
            Err(ApiError::ExternalServiceError("down".into())),
            ok("pong"),
            ok(r#"{"answer": "back"}"#),
        ]);

        let (model, registry) = orchestrator(vec![ModelBackend::new("only", 1, only.clone())]);

        let failed: Result<Extracted> = model.invoke_structured("sys", "user").await;
        assert!(failed.is_err());
        assert!(!registry.candidates()[0].is_available());

        let recovered: Extracted = model.invoke_structured("sys", "user").await.unwrap();
        assert_eq!(recovered.answer, "back");
        assert!(registry.candidates()[0].is_available());
        assert_eq!(only.calls(), 3);
    }

    #[tokio::test]
    async fn failed_probe_skips_backend_without_real_attempt() {
        let demoted = ScriptedTransport::always_failing();
        let healthy = ScriptedTransport::new(vec![ok(r#"{"answer": "served"}"#)]);

        let (model, registry) = orchestrator(vec![
            ModelBackend::new("demoted", 1, demoted.clone()),
            ModelBackend::new("healthy", 2, healthy.clone()),
        ]);

        // Demote the primary up front; the walk must probe it, see the
        // probe fail, and move on without spending the real request on it.
        registry.mark_failure(&registry.candidates()[0]);
        assert!(!registry.candidates()[0].is_available());

        let result: Extracted = model.invoke_structured("sys", "user").await.unwrap();
        assert_eq!(result.answer, "served");
        assert_eq!(demoted.calls(), 1); // the probe only
        assert_eq!(healthy.calls(), 1);
    }

    #[test]
    fn code_fences_are_stripped_before_parsing() {
        let parsed: Extracted =
            parse_structured("```json\n{\"answer\": \"fenced\"}\n```").unwrap();
        assert_eq!(parsed.answer, "fenced");

        let err = parse_structured::<Extracted>("```json\nnot json\n```");
        assert!(matches!(err, Err(ApiError::SchemaViolation(_))));
    }
}
