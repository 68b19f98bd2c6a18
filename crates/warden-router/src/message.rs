//! The canonical message envelope.
//!
//! Every caller message is normalized into [`ChatMessage`] once at the
//! system boundary; adapters translate between this form and each
//! provider's wire dialect. Roles are a closed enum, not free strings.

use serde::{Deserialize, Serialize};
use std::fmt;

use warden_core::ProfileName;

use crate::error::{RouterError, RouterResult};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    pub fn parse(raw: &str) -> RouterResult<Self> {
        match raw {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            other => Err(RouterError::InvalidMessage(format!(
                "unknown role '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// A requested tool invocation attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallSpec {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// One canonical conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallSpec>>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Boundary validation: tool calls belong on assistant messages only,
    /// and tool call names must be non-empty.
    pub fn validate(&self) -> RouterResult<()> {
        if let Some(tool_calls) = &self.tool_calls {
            if self.role != Role::Assistant {
                return Err(RouterError::InvalidMessage(format!(
                    "tool calls are only valid on assistant messages, found on {}",
                    self.role
                )));
            }
            for call in tool_calls {
                if call.name.is_empty() {
                    return Err(RouterError::InvalidMessage(
                        "tool call name must be non-empty".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Validate a whole message list at the boundary.
pub fn validate_messages(messages: &[ChatMessage]) -> RouterResult<()> {
    if messages.is_empty() {
        return Err(RouterError::InvalidMessage(
            "message list must be non-empty".into(),
        ));
    }
    for message in messages {
        message.validate()?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GenerationRequest / GenerationResult
// ---------------------------------------------------------------------------

/// Caller-supplied generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            model: "default".into(),
            max_tokens: 1024,
            temperature: None,
        }
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Why generation stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    Other(String),
}

/// What one provider returned, before the router tags it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReply {
    pub content: String,
    pub usage: Usage,
    pub finish_reason: FinishReason,
}

/// The routed result: the winning provider's reply plus the attempt log
/// accumulated across the fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub content: String,
    pub usage: Usage,
    pub finish_reason: FinishReason,
    /// Which profile produced this result.
    pub provider: ProfileName,
    pub attempts: Vec<crate::router::InvocationAttempt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_roundtrip() {
        for role in [Role::System, Role::User, Role::Assistant, Role::Tool] {
            assert_eq!(Role::parse(role.as_str()).unwrap(), role);
        }
        assert!(Role::parse("wizard").is_err());
    }

    #[test]
    fn test_role_serde_is_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_message_validate_ok() {
        assert!(ChatMessage::user("hello").validate().is_ok());
        let with_calls = ChatMessage {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: Some(vec![ToolCallSpec {
                id: "call-1".into(),
                name: "search".into(),
                arguments: serde_json::json!({"q": "weather"}),
            }]),
        };
        assert!(with_calls.validate().is_ok());
    }

    #[test]
    fn test_message_validate_rejects_tool_calls_on_user() {
        let message = ChatMessage {
            role: Role::User,
            content: "hi".into(),
            tool_calls: Some(vec![]),
        };
        assert!(message.validate().is_err());
    }

    #[test]
    fn test_message_validate_rejects_empty_tool_name() {
        let message = ChatMessage {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: Some(vec![ToolCallSpec {
                id: "call-1".into(),
                name: String::new(),
                arguments: serde_json::Value::Null,
            }]),
        };
        assert!(message.validate().is_err());
    }

    #[test]
    fn test_validate_messages_rejects_empty_list() {
        assert!(validate_messages(&[]).is_err());
        assert!(validate_messages(&[ChatMessage::user("hi")]).is_ok());
    }

    #[test]
    fn test_message_serde_omits_absent_tool_calls() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert!(!json.contains("tool_calls"));
    }
}
