//! Provider wire-dialect adapters.
//!
//! One adapter per dialect, each implementing the same capability set:
//! translate the canonical envelope to the provider's request format,
//! translate the provider's response back, and classify its failures.
//! Adapters register in a lookup table keyed by dialect name; routing
//! never branches on vendor identity anywhere else.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ErrorClass, ProviderFailure, RouterError, RouterResult};
use crate::message::{
    ChatMessage, FinishReason, GenerationRequest, ProviderReply, Role, ToolCallSpec, Usage,
};

// ---------------------------------------------------------------------------
// ProviderAdapter trait
// ---------------------------------------------------------------------------

pub trait ProviderAdapter: Send + Sync {
    /// Dialect name this adapter handles, e.g. `"openai"`.
    fn dialect(&self) -> &'static str;

    /// Canonical envelope → provider wire request.
    fn translate_request(
        &self,
        messages: &[ChatMessage],
        request: &GenerationRequest,
    ) -> RouterResult<Value>;

    /// Recover the canonical messages from a wire request. Translation is
    /// information-preserving: `decode_request(translate_request(m)) == m`
    /// for role and content.
    fn decode_request(&self, wire: &Value) -> RouterResult<Vec<ChatMessage>>;

    /// Provider wire response → canonical reply.
    fn translate_response(&self, raw: &Value) -> RouterResult<ProviderReply>;

    /// Classify a categorized failure as transient or permanent. The
    /// default classification covers both bundled dialects.
    fn classify_error(&self, failure: &ProviderFailure) -> ErrorClass {
        failure.default_class()
    }
}

// ---------------------------------------------------------------------------
// AdapterRegistry
// ---------------------------------------------------------------------------

/// Lookup table of adapters keyed by dialect name.
pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry with both bundled dialects.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(OpenAiAdapter));
        registry.register(Arc::new(AnthropicAdapter));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.dialect(), adapter);
    }

    pub fn get(&self, dialect: &str) -> RouterResult<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(dialect)
            .cloned()
            .ok_or_else(|| RouterError::UnknownDialect(dialect.to_string()))
    }

    pub fn dialects(&self) -> Vec<&'static str> {
        let mut dialects: Vec<_> = self.adapters.keys().copied().collect();
        dialects.sort_unstable();
        dialects
    }
}

// ---------------------------------------------------------------------------
// OpenAI-style dialect
// ---------------------------------------------------------------------------

/// Chat-completions wire format: flat message list, `choices[0].message`.
pub struct OpenAiAdapter;

impl ProviderAdapter for OpenAiAdapter {
    fn dialect(&self) -> &'static str {
        "openai"
    }

    fn translate_request(
        &self,
        messages: &[ChatMessage],
        request: &GenerationRequest,
    ) -> RouterResult<Value> {
        let wire_messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                let mut entry = json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                });
                if let Some(tool_calls) = &m.tool_calls {
                    entry["tool_calls"] = json!(tool_calls
                        .iter()
                        .map(|c| json!({
                            "id": c.id,
                            "type": "function",
                            "function": {
                                "name": c.name,
                                "arguments": c.arguments.to_string(),
                            }
                        }))
                        .collect::<Vec<_>>());
                }
                entry
            })
            .collect();

        let mut wire = json!({
            "model": request.model,
            "messages": wire_messages,
            "max_tokens": request.max_tokens,
        });
        if let Some(temperature) = request.temperature {
            wire["temperature"] = json!(temperature);
        }
        Ok(wire)
    }

    fn decode_request(&self, wire: &Value) -> RouterResult<Vec<ChatMessage>> {
        let entries = wire["messages"]
            .as_array()
            .ok_or_else(|| RouterError::MalformedResponse("missing messages array".into()))?;
        entries
            .iter()
            .map(|entry| {
                let role = Role::parse(entry["role"].as_str().unwrap_or_default())?;
                let content = entry["content"].as_str().unwrap_or_default().to_string();
                let tool_calls = entry["tool_calls"].as_array().map(|calls| {
                    calls
                        .iter()
                        .map(|c| ToolCallSpec {
                            id: c["id"].as_str().unwrap_or_default().to_string(),
                            name: c["function"]["name"].as_str().unwrap_or_default().to_string(),
                            arguments: c["function"]["arguments"]
                                .as_str()
                                .and_then(|a| serde_json::from_str(a).ok())
                                .unwrap_or(Value::Null),
                        })
                        .collect()
                });
                Ok(ChatMessage {
                    role,
                    content,
                    tool_calls,
                })
            })
            .collect()
    }

    fn translate_response(&self, raw: &Value) -> RouterResult<ProviderReply> {
        let message = &raw["choices"][0]["message"];
        let content = message["content"].as_str().unwrap_or_default().to_string();
        if message.is_null() {
            return Err(RouterError::MalformedResponse(
                "response has no choices[0].message".into(),
            ));
        }
        let finish_reason = match raw["choices"][0]["finish_reason"].as_str() {
            Some("stop") | None => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some(other) => FinishReason::Other(other.to_string()),
        };
        Ok(ProviderReply {
            content,
            usage: Usage {
                prompt_tokens: raw["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
                completion_tokens: raw["usage"]["completion_tokens"].as_u64().unwrap_or(0),
            },
            finish_reason,
        })
    }
}

// ---------------------------------------------------------------------------
// Anthropic-style dialect
// ---------------------------------------------------------------------------

/// Messages wire format: system prompt extracted to a top-level field,
/// content carried as typed blocks.
pub struct AnthropicAdapter;

impl ProviderAdapter for AnthropicAdapter {
    fn dialect(&self) -> &'static str {
        "anthropic"
    }

    fn translate_request(
        &self,
        messages: &[ChatMessage],
        request: &GenerationRequest,
    ) -> RouterResult<Value> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let wire_messages: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let mut blocks = vec![json!({"type": "text", "text": m.content})];
                if let Some(tool_calls) = &m.tool_calls {
                    for call in tool_calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments,
                        }));
                    }
                }
                json!({
                    "role": m.role.as_str(),
                    "content": blocks,
                })
            })
            .collect();

        let mut wire = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": wire_messages,
        });
        if !system.is_empty() {
            wire["system"] = json!(system.join("\n"));
        }
        if let Some(temperature) = request.temperature {
            wire["temperature"] = json!(temperature);
        }
        Ok(wire)
    }

    fn decode_request(&self, wire: &Value) -> RouterResult<Vec<ChatMessage>> {
        let mut messages = Vec::new();
        if let Some(system) = wire["system"].as_str() {
            for line in system.split('\n') {
                messages.push(ChatMessage::system(line));
            }
        }
        let entries = wire["messages"]
            .as_array()
            .ok_or_else(|| RouterError::MalformedResponse("missing messages array".into()))?;
        for entry in entries {
            let role = Role::parse(entry["role"].as_str().unwrap_or_default())?;
            let blocks = entry["content"]
                .as_array()
                .ok_or_else(|| RouterError::MalformedResponse("missing content blocks".into()))?;
            let mut content = String::new();
            let mut tool_calls: Vec<ToolCallSpec> = Vec::new();
            for block in blocks {
                match block["type"].as_str() {
                    Some("text") => content.push_str(block["text"].as_str().unwrap_or_default()),
                    Some("tool_use") => tool_calls.push(ToolCallSpec {
                        id: block["id"].as_str().unwrap_or_default().to_string(),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        arguments: block["input"].clone(),
                    }),
                    _ => {}
                }
            }
            messages.push(ChatMessage {
                role,
                content,
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
            });
        }
        Ok(messages)
    }

    fn translate_response(&self, raw: &Value) -> RouterResult<ProviderReply> {
        let blocks = raw["content"]
            .as_array()
            .ok_or_else(|| RouterError::MalformedResponse("response has no content array".into()))?;
        let content: Vec<&str> = blocks
            .iter()
            .filter(|b| b["type"] == "text")
            .filter_map(|b| b["text"].as_str())
            .collect();
        let finish_reason = match raw["stop_reason"].as_str() {
            Some("end_turn") | None => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            Some("tool_use") => FinishReason::ToolCalls,
            Some(other) => FinishReason::Other(other.to_string()),
        };
        Ok(ProviderReply {
            content: content.join("\n"),
            usage: Usage {
                prompt_tokens: raw["usage"]["input_tokens"].as_u64().unwrap_or(0),
                completion_tokens: raw["usage"]["output_tokens"].as_u64().unwrap_or(0),
            },
            finish_reason,
        })
    }

}
