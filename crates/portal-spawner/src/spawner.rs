use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use portal_artifacts::ArtifactStore;
use portal_bridge::BridgeManager;
use portal_llm::{ExecutorRequest, GraphExecutorFactory};
use portal_notify::{NotificationQueue, Priority};
use portal_registry::{CallerProfile, Registry};

use crate::error::Result;
use crate::message::{build_task_message, title_case, truncate_preview};
use crate::thread_manager::ThreadManager;

/// Overrides a caller may supply on any of the three run modes. All three
/// fields default to the operator's configured defaults when absent.
#[derive(Debug, Clone, Default)]
pub struct ModelSelection {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub allow_operator_llm: bool,
}

/// Ties the registry, bridge manager, artifact store, notification queue,
/// and graph executor factory together behind three run modes. The
/// spawner never manipulates graph internals — it only ever calls
/// `chat(message, thread_id)` on whatever executor the factory hands back.
pub struct Spawner {
    registry: Arc<Registry>,
    bridges: Arc<BridgeManager>,
    artifacts: Arc<ArtifactStore>,
    notifications: Arc<NotificationQueue>,
    executors: Arc<dyn GraphExecutorFactory>,
    threads: ThreadManager,
}

impl Spawner {
    pub fn new(
        registry: Arc<Registry>,
        bridges: Arc<BridgeManager>,
        artifacts: Arc<ArtifactStore>,
        notifications: Arc<NotificationQueue>,
        executors: Arc<dyn GraphExecutorFactory>,
        threads: ThreadManager,
    ) -> Self {
        Self { registry, bridges, artifacts, notifications, executors, threads }
    }

    /// Inline, synchronous invocation on a fresh ephemeral thread. No
    /// artifact, no notification — the caller gets the text directly.
    pub async fn invoke_task(
        &self,
        user_id: Uuid,
        skill: &str,
        task: &str,
        context: Option<&Value>,
        selection: ModelSelection,
    ) -> Result<String> {
        let message = build_task_message(skill, task, context);
        let bridge = self.bridges.get_bridge(user_id).await;
        let executor = self
            .executors
            .build(ExecutorRequest {
                provider: selection.provider,
                model: selection.model,
                bridge,
                user_id,
                allow_operator_llm: selection.allow_operator_llm,
            })
            .await?;

        let ephemeral_thread_id = Uuid::now_v7();
        let reply = executor.chat(&message, ephemeral_thread_id).await?;
        Ok(reply)
    }

    /// Returns a synthetic `run_id` immediately and runs the turn, artifact
    /// write, and notification post in a detached task. Failures at any
    /// point become an urgent failure notification instead of propagating
    /// to the caller, who has already moved on.
    pub fn spawn_background(
        &self,
        user_id: Uuid,
        agent_name: &str,
        skill: &str,
        config: Option<Value>,
        selection: ModelSelection,
    ) -> Uuid {
        let run_id = Uuid::now_v7();
        let agent_name = agent_name.to_string();
        let skill = skill.to_string();
        let bridges = self.bridges.clone();
        let executors = self.executors.clone();
        let artifacts = self.artifacts.clone();
        let notifications = self.notifications.clone();

        tokio::spawn(async move {
            let task_text = config
                .as_ref()
                .and_then(|c| c.get("task"))
                .and_then(Value::as_str)
                .unwrap_or("Run scheduled task")
                .to_string();
            let message = build_task_message(&skill, &task_text, None);

            let outcome: anyhow::Result<(String, Uuid)> = async {
                let bridge = bridges.get_bridge(user_id).await;
                let executor = executors
                    .build(ExecutorRequest {
                        provider: selection.provider.clone(),
                        model: selection.model.clone(),
                        bridge,
                        user_id,
                        allow_operator_llm: selection.allow_operator_llm,
                    })
                    .await?;
                let ephemeral_thread_id = Uuid::now_v7();
                let text = executor.chat(&message, ephemeral_thread_id).await?;
                let artifact_id = artifacts.write(user_id, &agent_name, &skill, &text, None).await?;
                Ok((text, artifact_id))
            }
            .await;

            match outcome {
                Ok((text, artifact_id)) => {
                    let preview = truncate_preview(&text);
                    let message = format!("{skill} completed: {preview}");
                    if let Err(e) = notifications
                        .post(user_id, &agent_name, &message, Priority::Normal, None, Some(artifact_id))
                        .await
                    {
                        tracing::warn!(run_id = %run_id, error = %e, "failed to post background-agent completion notification");
                    }
                }
                Err(e) => {
                    let message = format!("{agent_name} failed: {e}");
                    if let Err(post_err) =
                        notifications.post(user_id, &agent_name, &message, Priority::Urgent, None, None).await
                    {
                        tracing::warn!(run_id = %run_id, error = %post_err, "failed to post background-agent failure notification");
                    }
                }
            }
        });

        run_id
    }

    /// Creates a tracked thread and returns its id immediately. If a
    /// pre-task is available (explicit or from the agent's bootstrap
    /// content), warms the thread in the background.
    pub async fn spawn_foreground(
        &self,
        user_id: Uuid,
        skill: &str,
        title: Option<String>,
        pre_task: Option<String>,
        selection: ModelSelection,
    ) -> Result<Uuid> {
        let title = title.unwrap_or_else(|| title_case(skill));
        let thread_id = self.threads.create(user_id, &title, selection.provider.as_deref(), selection.model.as_deref()).await?;

        let effective_pre_task = match pre_task {
            Some(t) => Some(t),
            None => match self.registry.resolve(skill, user_id, CallerProfile::User).await {
                Ok(resolved) if !resolved.bootstrap_md().trim().is_empty() => Some(resolved.into_bootstrap_md()),
                _ => None,
            },
        };

        if let Some(pre_task) = effective_pre_task {
            let bridges = self.bridges.clone();
            let executors = self.executors.clone();
            let provider = selection.provider.clone();
            let model = selection.model.clone();
            let allow_operator_llm = selection.allow_operator_llm;

            tokio::spawn(async move {
                let bridge = bridges.get_bridge(user_id).await;
                let executor = match executors.build(ExecutorRequest { provider, model, bridge, user_id, allow_operator_llm }).await {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(thread_id = %thread_id, error = %e, "foreground thread warm-up failed to build executor");
                        return;
                    }
                };
                if let Err(e) = executor.chat(&pre_task, thread_id).await {
                    tracing::warn!(thread_id = %thread_id, error = %e, "foreground thread warm-up turn failed");
                }
            });
        }

        Ok(thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use portal_llm::GraphExecutor;
    use portal_bridge::Bridge;

    struct EchoExecutor;

    #[async_trait]
    impl GraphExecutor for EchoExecutor {
        async fn chat(&self, message: &str, _thread_id: Uuid) -> anyhow::Result<String> {
            Ok(format!("echo: {message}"))
        }
    }

    struct EchoFactory;

    #[async_trait]
    impl GraphExecutorFactory for EchoFactory {
        async fn build(&self, _request: ExecutorRequest) -> anyhow::Result<Arc<dyn GraphExecutor>> {
            Ok(Arc::new(EchoExecutor))
        }
    }

    #[tokio::test]
    async fn invoke_task_builds_prefixed_message_and_returns_executor_text() {
        let executors: Arc<dyn GraphExecutorFactory> = Arc::new(EchoFactory);
        let bridge = Arc::new(Bridge::connect(Vec::new()).await);
        let executor = executors
            .build(ExecutorRequest {
                provider: None,
                model: None,
                bridge,
                user_id: Uuid::now_v7(),
                allow_operator_llm: true,
            })
            .await
            .unwrap();
        let message = build_task_message("email-triage", "clear inbox", None);
        let reply = executor.chat(&message, Uuid::now_v7()).await.unwrap();
        assert_eq!(reply, "echo: /email-triage clear inbox");
    }
}
