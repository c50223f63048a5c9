//! Integration tests for sequential fallback
//!
//! These tests verify that:
//! 1. The first success ends the call and later candidates are never tried
//! 2. Exhaustion attempts every candidate exactly once and wraps the last error
//! 3. Telemetry reflects every attempt
//! 4. Notifications fire once per logical fallback

use async_trait::async_trait;
use llmrelay_core::{
    Backend, BackendConfig, Error, Generation, GenerationAdapter, GenerationRequest, Result,
};
use llmrelay_routing::notification::FALLBACK_TITLE;
use llmrelay_routing::{
    BackendProbe, ChannelNotifier, CollectingNotifier, Orchestrator, OrchestratorConfig,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Adapter that either answers or fails, counting calls
struct TestAdapter {
    should_fail: AtomicBool,
    calls: AtomicUsize,
    reply: String,
}

impl TestAdapter {
    fn new(reply: &str, should_fail: bool) -> Arc<Self> {
        Arc::new(Self {
            should_fail: AtomicBool::new(should_fail),
            calls: AtomicUsize::new(0),
            reply: reply.to_string(),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationAdapter for TestAdapter {
    async fn generate(&self, _request: &GenerationRequest) -> Result<Generation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail.load(Ordering::SeqCst) {
            Err(Error::Transport(format!("{} unreachable", self.reply)))
        } else {
            Ok(Generation::new(self.reply.clone()).with_tokens(50))
        }
    }
}

struct AvailableProbe(Vec<Backend>);

#[async_trait]
impl BackendProbe for AvailableProbe {
    async fn probe(&self, backend: Backend, _config: &BackendConfig) -> bool {
        self.0.contains(&backend)
    }
}

#[tokio::test]
async fn test_first_success_short_circuits() {
    let ollama = TestAdapter::new("ollama", true);
    let tinyllm = TestAdapter::new("tinyllm", false);
    let openai = TestAdapter::new("openai", false);
    let notifier = Arc::new(CollectingNotifier::new());

    let orchestrator = Orchestrator::builder(Arc::new(AvailableProbe(vec![
        Backend::Ollama,
        Backend::TinyLlm,
        Backend::OpenAi,
    ])))
    .adapter(Backend::Ollama, ollama.clone())
    .adapter(Backend::TinyLlm, tinyllm.clone())
    .adapter(Backend::OpenAi, openai.clone())
    .notifier(notifier.clone())
    .build();
    orchestrator.refresh_availability().await;

    let routed = orchestrator
        .generate_with_fallback(&GenerationRequest::new("What is 2+2?"))
        .await
        .unwrap();

    assert_eq!(routed.generation.text, "tinyllm");
    assert_eq!(routed.backend, Backend::TinyLlm);
    assert_eq!(ollama.calls(), 1);
    assert_eq!(tinyllm.calls(), 1);
    assert_eq!(openai.calls(), 0, "later candidates must not be attempted");

    let fallbacks = notifier.with_title(FALLBACK_TITLE);
    assert_eq!(fallbacks.len(), 1);
    assert_eq!(fallbacks[0].message, "Switched to TinyLLM after Ollama failed");
}

#[tokio::test]
async fn test_exhaustion_attempts_each_candidate_once() {
    let ollama = TestAdapter::new("ollama", true);
    let openai = TestAdapter::new("openai", true);
    let notifier = Arc::new(CollectingNotifier::new());

    let orchestrator = Orchestrator::builder(Arc::new(AvailableProbe(vec![
        Backend::Ollama,
        Backend::OpenAi,
    ])))
    .active_backend(Backend::OpenAi)
    .adapter(Backend::Ollama, ollama.clone())
    .adapter(Backend::OpenAi, openai.clone())
    .notifier(notifier.clone())
    .build();
    orchestrator.refresh_availability().await;

    let err = orchestrator
        .generate_with_fallback(&GenerationRequest::new("hello"))
        .await
        .unwrap_err();

    assert!(err.is_no_backend_available());
    match err {
        Error::NoBackendAvailable { attempted, source } => {
            assert_eq!(attempted, 2);
            // Active first, so Ollama failed last
            assert!(source.unwrap().to_string().contains("ollama unreachable"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ollama.calls(), 1);
    assert_eq!(openai.calls(), 1);

    assert_eq!(orchestrator.active_backend(), Backend::OpenAi);
    assert!(notifier.with_title(FALLBACK_TITLE).is_empty());

    for backend in [Backend::Ollama, Backend::OpenAi] {
        let perf = orchestrator.ledger().performance(backend).unwrap();
        assert_eq!(perf.failed_attempts, 1);
        assert_eq!(perf.success_rate, 0.0);
        assert!(orchestrator.ledger().usage(backend).is_none());
    }
}

#[tokio::test]
async fn test_nothing_available_fails_without_attempts() {
    let ollama = TestAdapter::new("ollama", false);
    let orchestrator = Orchestrator::builder(Arc::new(AvailableProbe(vec![])))
        .adapter(Backend::Ollama, ollama.clone())
        .build();
    orchestrator.refresh_availability().await;

    let err = orchestrator
        .generate_with_fallback(&GenerationRequest::new("hello"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::NoBackendAvailable {
            attempted: 0,
            source: None
        }
    ));
    assert_eq!(ollama.calls(), 0);
}

#[tokio::test]
async fn test_recovered_backend_is_used_after_refresh() {
    let ollama = TestAdapter::new("ollama", false);
    let openai = TestAdapter::new("openai", false);
    let (notifier, mut rx) = ChannelNotifier::new();

    let orchestrator = Orchestrator::builder(Arc::new(AvailableProbe(vec![Backend::OpenAi])))
        .config(OrchestratorConfig {
            restore_selection_after_fallback: true,
            ..Default::default()
        })
        .adapter(Backend::Ollama, ollama.clone())
        .adapter(Backend::OpenAi, openai.clone())
        .notifier(Arc::new(notifier))
        .build();
    orchestrator.refresh_availability().await;

    // Ollama unavailable: answered by OpenAI without trying Ollama
    let routed = orchestrator
        .generate_with_fallback(&GenerationRequest::new("hello"))
        .await
        .unwrap();
    assert_eq!(routed.backend, Backend::OpenAi);
    assert_eq!(routed.fallback_from, Some(Backend::Ollama));
    assert_eq!(ollama.calls(), 0);
    assert_eq!(rx.recv().await.unwrap().title, FALLBACK_TITLE);
    assert_eq!(orchestrator.active_backend(), Backend::Ollama);

    // Repeated calls produce the same candidates
    for _ in 0..3 {
        orchestrator
            .generate_with_fallback(&GenerationRequest::new("hello"))
            .await
            .unwrap();
    }
    assert_eq!(openai.calls(), 4);
    assert_eq!(
        orchestrator.ledger().usage(Backend::OpenAi).unwrap().total_requests,
        4
    );
}
