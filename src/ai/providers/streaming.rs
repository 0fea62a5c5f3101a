//! Streaming decorator: forwards assistant output to the event bus as
//! `workflow.node.output.delta` events while the engine continues to treat
//! every completion as atomic.
//!
//! The wrapper is constructed per task call-chain (never a shared mutable
//! handler slot) and delegates everything else to the inner provider.

use std::sync::Arc;

use async_trait::async_trait;

use crate::ai::provider::{LLMProvider, ProviderError, Result, StreamResponse};
use crate::ai::types::{CompletionRequest, CompletionResponse};
use crate::events::{TaskEventEmitter, WorkflowEvent};

pub struct StreamingProvider {
    inner: Arc<dyn LLMProvider>,
    events: TaskEventEmitter,
}

impl StreamingProvider {
    pub fn new(inner: Arc<dyn LLMProvider>, events: TaskEventEmitter) -> Self {
        Self { inner, events }
    }
}

#[async_trait]
impl LLMProvider for StreamingProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let response = self.inner.complete(request).await?;
        if !response.content.is_empty() {
            self.events.emit(WorkflowEvent::NodeOutputDelta {
                delta: response.content.clone(),
            });
        }
        Ok(response)
    }

    async fn stream(&self, request: CompletionRequest) -> Result<StreamResponse> {
        self.inner.stream(request).await
    }

    fn context_limit(&self) -> usize {
        self.inner.context_limit()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    async fn warmup(&self) -> Result<()> {
        self.inner.warmup().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AgentLevel, SessionEventBus};

    struct CannedProvider(&'static str);

    #[async_trait]
    impl LLMProvider for CannedProvider {
        async fn complete(&self, _: CompletionRequest) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                content: self.0.to_string(),
                tool_calls: vec![],
                model: "canned".into(),
                usage: None,
                finish_reason: None,
            })
        }
        async fn stream(&self, _: CompletionRequest) -> Result<StreamResponse> {
            Err(ProviderError::Transport("no stream".to_string()))
        }
        fn context_limit(&self) -> usize {
            1024
        }
        fn model_id(&self) -> &str {
            "canned"
        }
        fn provider_name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn complete_emits_delta() {
        let bus = Arc::new(SessionEventBus::new());
        let mut rx = bus.subscribe("s");
        let events = TaskEventEmitter::new(bus, "s", "t", "r", AgentLevel::Core);
        let provider = StreamingProvider::new(Arc::new(CannedProvider("chunk")), events);

        let response = provider
            .complete(CompletionRequest::new("m", vec![]))
            .await
            .unwrap();
        assert_eq!(response.content, "chunk");

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event.kind(), "workflow.node.output.delta");
    }

    #[tokio::test]
    async fn empty_content_emits_nothing() {
        let bus = Arc::new(SessionEventBus::new());
        let mut rx = bus.subscribe("s");
        let events = TaskEventEmitter::new(bus, "s", "t", "r", AgentLevel::Core);
        let provider = StreamingProvider::new(Arc::new(CannedProvider("")), events);

        provider
            .complete(CompletionRequest::new("m", vec![]))
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }
}
