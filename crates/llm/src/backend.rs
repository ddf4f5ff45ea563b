//! Generation backend
//!
//! Streams completions from an OpenAI-compatible chat endpoint (vLLM,
//! Ollama in compatibility mode, or hosted APIs). Responses arrive as SSE
//! `data:` lines carrying JSON chunks.

use std::pin::Pin;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use faq_agent_core::{
    FinishReason, GenerateRequest, GenerativeModel, Result, Role, StreamChunk,
};

use crate::LlmError;

/// Generator configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Chat completions endpoint URL
    pub endpoint: String,
    /// Model name passed in the request
    pub model: String,
    /// API key (optional; local servers accept none)
    pub api_key: Option<String>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature
    pub temperature: f32,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11434/v1/chat/completions".to_string(),
            model: "llama3.2:3b".to_string(),
            api_key: None,
            max_tokens: 256,
            temperature: 0.3,
            timeout: Duration::from_secs(30),
        }
    }
}

impl GeneratorConfig {
    pub fn from_settings(composer: &faq_agent_config::ComposerConfig) -> Self {
        Self {
            endpoint: composer.generation_endpoint.clone(),
            model: composer.model.clone(),
            api_key: None,
            max_tokens: composer.max_answer_tokens,
            temperature: composer.temperature,
            timeout: Duration::from_secs(30),
        }
    }
}

/// OpenAI-compatible streaming generation backend.
pub struct HttpGenerator {
    client: Client,
    config: GeneratorConfig,
}

impl HttpGenerator {
    pub fn new(config: GeneratorConfig) -> std::result::Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn build_body(&self, request: &GenerateRequest) -> ChatRequest {
        ChatRequest {
            model: request.model.clone().unwrap_or_else(|| self.config.model.clone()),
            messages: request
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: match m.role {
                        Role::System => "system",
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    }
                    .to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: request.temperature.unwrap_or(self.config.temperature),
            stream: true,
        }
    }
}

#[async_trait]
impl GenerativeModel for HttpGenerator {
    fn generate_stream<'a>(
        &'a self,
        request: GenerateRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
        let body = self.build_body(&request);

        Box::pin(try_stream! {
            debug!(
                model = %body.model,
                messages = body.messages.len(),
                "Requesting streamed completion"
            );

            let mut builder = self.client.post(&self.config.endpoint).json(&body);
            if let Some(ref key) = self.config.api_key {
                builder = builder.bearer_auth(key);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| LlmError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                Err(LlmError::Api(format!("HTTP {}: {}", status, text)))?;
                return;
            }

            let mut stream = response.bytes_stream();
            let mut buffer = String::new();
            let mut finished = false;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| LlmError::Network(e.to_string()))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer.drain(..=line_end);

                    if line.is_empty() {
                        continue;
                    }
                    if line == "data: [DONE]" {
                        if !finished {
                            finished = true;
                            yield StreamChunk::final_chunk(FinishReason::Stop);
                        }
                        continue;
                    }

                    let Some(json_str) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let parsed: ChatStreamChunk = serde_json::from_str(json_str)
                        .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

                    let Some(choice) = parsed.choices.into_iter().next() else {
                        continue;
                    };

                    if let Some(content) = choice.delta.and_then(|d| d.content) {
                        if !content.is_empty() {
                            yield StreamChunk::text(content);
                        }
                    }

                    if let Some(reason) = choice.finish_reason {
                        finished = true;
                        let finish = match reason.as_str() {
                            "length" => FinishReason::Length,
                            _ => FinishReason::Stop,
                        };
                        yield StreamChunk::final_chunk(finish);
                    }
                }
            }

            if !finished {
                Err(LlmError::InvalidResponse(
                    "stream ended without a final chunk".to_string(),
                ))?;
            }
        })
    }

    async fn is_available(&self) -> bool {
        // Probe the models listing next to the completions endpoint.
        let url = self
            .config
            .endpoint
            .trim_end_matches("/chat/completions")
            .trim_end_matches('/')
            .to_string()
            + "/models";

        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "Availability probe failed");
                false
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    choices: Vec<ChatStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChoice {
    delta: Option<ChatDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatDelta {
    content: Option<String>,
}
