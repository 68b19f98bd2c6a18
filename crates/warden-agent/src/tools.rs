//! Tool dispatch seam.
//!
//! The orchestrator authorizes every invocation before it reaches a
//! [`ToolExecutor`]; executors never see denied actions.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{AgentError, AgentResult};
use crate::state::ToolInvocation;

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, invocation: &ToolInvocation) -> AgentResult<serde_json::Value>;
}

/// Executor that reflects the invocation back. Used by the default
/// composition root and as a harness in tests.
#[derive(Default)]
pub struct EchoToolExecutor {
    calls: AtomicUsize,
}

impl EchoToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolExecutor for EchoToolExecutor {
    async fn execute(&self, invocation: &ToolInvocation) -> AgentResult<serde_json::Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if invocation.action.is_empty() {
            return Err(AgentError::ToolExecution("empty action".into()));
        }
        Ok(serde_json::json!({
            "action": invocation.action,
            "arguments": invocation.arguments,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_reflects_invocation() {
        let executor = EchoToolExecutor::new();
        let result = executor
            .execute(&ToolInvocation {
                action: "tool:chat".into(),
                arguments: serde_json::json!({"q": 1}),
            })
            .await
            .unwrap();
        assert_eq!(result["action"], "tool:chat");
        assert_eq!(result["arguments"]["q"], 1);
        assert_eq!(executor.call_count(), 1);
    }
}
