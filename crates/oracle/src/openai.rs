//! OpenAI Responses API oracle.
//!
//! Speaker and listener outputs are constrained with a custom tool whose
//! format is a Lark grammar, so the service only returns legal text.

use async_trait::async_trait;
use neuralese_core::{Example, Grammar, ListenerShot, Message, Metrics, Scene, SpeakerShot};
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::OracleError;
use crate::prompts::{index_grammar, listener_messages, proposer_messages, speaker_messages, ChatMessage};
use crate::traits::{Listener, Proposer, Speaker};

/// Client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Model name
    pub model: String,
    /// API root, without trailing slash
    pub base_url: String,
    /// Sampling temperature for the speaker, if the model accepts one
    pub speaker_temperature: Option<f32>,
    /// Sampling temperature for the listener, if the model accepts one
    pub listener_temperature: Option<f32>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-5".to_string()),
            base_url: "https://api.openai.com/v1".to_string(),
            speaker_temperature: Some(0.4),
            listener_temperature: Some(0.2),
        }
    }
}

/// HTTP oracle backed by the Responses API.
#[derive(Clone)]
pub struct OpenAiOracle {
    client: Client,
    api_key: String,
    config: OpenAiConfig,
}

impl OpenAiOracle {
    /// Create a client with an explicit key.
    pub fn new(api_key: impl Into<String>, config: OpenAiConfig) -> Self {
        Self {
            // per-call limits come from the retry guard
            client: ClientBuilder::new().build().unwrap_or_default(),
            api_key: api_key.into(),
            config,
        }
    }

    /// Create a client with the key from `OPENAI_API_KEY`.
    pub fn from_env(config: OpenAiConfig) -> Result<Self, OracleError> {
        match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key, config)),
            _ => Err(OracleError::Unavailable(
                "OPENAI_API_KEY is not set".to_string(),
            )),
        }
    }

    /// The active settings.
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn create_response(&self, body: Value) -> Result<Value, OracleError> {
        if self.api_key.is_empty() {
            return Err(OracleError::Unavailable("no API key configured".to_string()));
        }

        let response = self
            .client
            .post(format!("{}/responses", self.config.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OracleError::Service {
                status: status.as_u16(),
                message,
            });
        }

        response.json().await.map_err(transport_error)
    }

    /// Emit text constrained by a Lark grammar through a custom tool.
    async fn emit_with_grammar(
        &self,
        messages: &[ChatMessage],
        grammar_text: &str,
        tool_name: &str,
        temperature: Option<f32>,
    ) -> Result<String, OracleError> {
        let mut body = json!({
            "model": self.config.model,
            "input": messages,
            "tools": [{
                "type": "custom",
                "name": tool_name,
                "description": "Emit a string matching the grammar start rule.",
                "format": {"type": "grammar", "syntax": "lark", "definition": grammar_text},
            }],
            "tool_choice": {
                "type": "allowed_tools",
                "mode": "auto",
                "tools": [{"type": "custom", "name": tool_name}],
            },
        });
        if let Some(t) = temperature {
            body["temperature"] = json!(t);
        }

        debug!("Calling {} with {} turns", tool_name, messages.len());
        let response = self.create_response(body).await?;
        extract_tool_output(&response, tool_name)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OracleError::Generation("no grammar-conforming output returned".to_string()))
    }
}

fn transport_error(err: reqwest::Error) -> OracleError {
    if err.is_timeout() {
        OracleError::Timeout { elapsed_ms: 0 }
    } else {
        OracleError::Transport(err.to_string())
    }
}

/// Find the named tool call's input, falling back to the first text output.
fn extract_tool_output(response: &Value, tool_name: &str) -> Option<String> {
    let items = response.get("output")?.as_array()?;
    for item in items {
        match item.get("type").and_then(Value::as_str) {
            Some("custom_tool_call") if item.get("name").and_then(Value::as_str) == Some(tool_name) => {
                return item.get("input").and_then(Value::as_str).map(str::to_string);
            }
            Some("message") => {
                let text = item
                    .get("content")
                    .and_then(Value::as_array)
                    .and_then(|c| c.iter().find_map(|part| part.get("text").and_then(Value::as_str)));
                if let Some(text) = text {
                    return Some(text.to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[async_trait]
impl Speaker for OpenAiOracle {
    async fn speak(
        &self,
        grammar: &Grammar,
        scene: &Scene,
        fewshots: &[SpeakerShot],
    ) -> Result<Message, OracleError> {
        let messages = speaker_messages(scene, fewshots);
        let text = self
            .emit_with_grammar(
                &messages,
                &grammar.render(),
                "emit_message",
                self.config.speaker_temperature,
            )
            .await?;
        Ok(Message::new(text))
    }
}

#[async_trait]
impl Listener for OpenAiOracle {
    async fn listen(
        &self,
        _grammar: &Grammar,
        scene: &Scene,
        message: &Message,
        fewshots: &[ListenerShot],
    ) -> Result<usize, OracleError> {
        let messages = listener_messages(scene, message.as_str(), fewshots);
        let text = self
            .emit_with_grammar(
                &messages,
                &index_grammar(scene.len()),
                "emit_index",
                self.config.listener_temperature,
            )
            .await?;
        parse_index(&text, scene.len())
    }
}

#[async_trait]
impl Proposer for OpenAiOracle {
    async fn propose(
        &self,
        grammar: &Grammar,
        metrics: &Metrics,
        examples: &[Example],
    ) -> Result<String, OracleError> {
        let messages = proposer_messages(grammar, metrics, examples);
        let body = json!({
            "model": self.config.model,
            "input": messages,
        });
        let response = self.create_response(body).await?;
        extract_tool_output(&response, "propose_patch")
            .ok_or_else(|| OracleError::Malformed("proposer returned no text".to_string()))
    }
}

fn parse_index(text: &str, k: usize) -> Result<usize, OracleError> {
    let index: usize = text
        .trim()
        .parse()
        .map_err(|_| OracleError::Malformed(format!("not an index: {:?}", text)))?;
    if index >= k {
        return Err(OracleError::Malformed(format!("index {} out of range 0..{}", index, k)));
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_custom_tool_call() {
        let response = json!({
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "custom_tool_call", "name": "emit_message", "input": "c:red"}
            ]
        });
        assert_eq!(extract_tool_output(&response, "emit_message").as_deref(), Some("c:red"));
        assert_eq!(extract_tool_output(&response, "emit_index"), None);
    }

    #[test]
    fn test_extract_message_text() {
        let response = json!({
            "output": [{"type": "message", "content": [{"type": "output_text", "text": "{\"mutations\":[]}"}]}]
        });
        assert_eq!(
            extract_tool_output(&response, "propose_patch").as_deref(),
            Some("{\"mutations\":[]}")
        );
    }

    #[test]
    fn test_parse_index_range() {
        assert_eq!(parse_index(" 2\n", 4), Ok(2));
        assert!(matches!(parse_index("4", 4), Err(OracleError::Malformed(_))));
        assert!(matches!(parse_index("two", 4), Err(OracleError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let oracle = OpenAiOracle::new("", OpenAiConfig::default());
        let err = oracle
            .propose(&Grammar::base(), &Metrics::default(), &[])
            .await
            .unwrap_err();
        assert!(err.is_hard());
    }
}
