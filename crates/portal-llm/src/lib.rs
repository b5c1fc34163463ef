//! The graph executor contract: a black box to the gateway core. Given a
//! provider/model override, a user's bridge, and whether operator-level
//! fallback credentials are allowed, a factory builds a [`GraphExecutor`]
//! the spawner can drive turn by turn. Nothing in `portal-spawner` reaches
//! into how a turn is actually produced.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use portal_bridge::Bridge;

/// Parameters the spawner supplies when it needs an executor for a turn.
pub struct ExecutorRequest {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub bridge: Arc<Bridge>,
    pub user_id: Uuid,
    /// Whether this executor may fall back to operator-level model
    /// credentials when the user has none configured.
    pub allow_operator_llm: bool,
}

/// One conversational turn runner bound to a specific bridge and model
/// selection. Stateless across calls except for whatever the external
/// runner itself tracks per `thread_id`.
#[async_trait]
pub trait GraphExecutor: Send + Sync {
    async fn chat(&self, message: &str, thread_id: Uuid) -> anyhow::Result<String>;
}

/// Builds a [`GraphExecutor`] for a given request. Implementations own
/// whatever connection pooling or provider selection logic they need; the
/// core only ever sees the resulting `chat` callable.
#[async_trait]
pub trait GraphExecutorFactory: Send + Sync {
    async fn build(&self, request: ExecutorRequest) -> anyhow::Result<Arc<dyn GraphExecutor>>;
}

/// A fixed-response executor for tests and for operators bootstrapping a
/// deployment before wiring a real model provider. `chat` always returns
/// the same text regardless of input.
pub struct StubExecutor {
    response: String,
}

impl StubExecutor {
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: response.into() }
    }
}

#[async_trait]
impl GraphExecutor for StubExecutor {
    async fn chat(&self, _message: &str, _thread_id: Uuid) -> anyhow::Result<String> {
        Ok(self.response.clone())
    }
}

/// Factory that always hands back the same [`StubExecutor`] response,
/// ignoring provider/model/bridge selection entirely.
pub struct StubExecutorFactory {
    response: String,
}

impl StubExecutorFactory {
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: response.into() }
    }
}

#[async_trait]
impl GraphExecutorFactory for StubExecutorFactory {
    async fn build(&self, _request: ExecutorRequest) -> anyhow::Result<Arc<dyn GraphExecutor>> {
        Ok(Arc::new(StubExecutor::new(self.response.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_bridge::Bridge;

    #[tokio::test]
    async fn stub_executor_returns_fixed_response() {
        let executor = StubExecutor::new("hello world");
        let reply = executor.chat("anything", Uuid::now_v7()).await.unwrap();
        assert_eq!(reply, "hello world");
    }

    #[tokio::test]
    async fn stub_factory_ignores_request_shape() {
        let factory = StubExecutorFactory::new("hello world");
        let bridge = Arc::new(Bridge::connect(Vec::new()).await);
        let request = ExecutorRequest {
            provider: None,
            model: None,
            bridge,
            user_id: Uuid::now_v7(),
            allow_operator_llm: true,
        };
        let executor = factory.build(request).await.unwrap();
        let reply = executor.chat("task", Uuid::now_v7()).await.unwrap();
        assert_eq!(reply, "hello world");
    }
}
