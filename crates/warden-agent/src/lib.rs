//! Warden agent — the route/act/respond orchestrator.
//!
//! Three-state workflow per request: `Route` decides between tool dispatch
//! and a plain response, `UseTools` authorizes every requested action
//! before any dispatch, `Respond` delegates to the provider router. A
//! [`ConversationState`] checkpoint is committed after each completed
//! transition, and transitions of one conversation never overlap.

pub mod audit;
pub mod checkpoint;
pub mod error;
pub mod orchestrator;
pub mod state;
pub mod tools;

pub use audit::{AuditDecision, AuditEntry, AuditLog};
pub use checkpoint::{CheckpointStore, InMemoryCheckpointStore};
pub use error::{AgentError, AgentResult};
pub use orchestrator::{Orchestrator, ToolCallRequest, ToolCallResult, EXECUTOR_RELATION};
pub use state::{AgentState, ConversationState, ToolInvocation};
pub use tools::{EchoToolExecutor, ToolExecutor};
