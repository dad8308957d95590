use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;

/// Generation limits for a single completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionOptions {
    pub const fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            temperature: 0.5,
        }
    }
}

/// A generic client for single-prompt text completion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends `prompt` as one user message and returns the generated text.
    ///
    /// A response without any content yields an empty string.
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<String>;
}

/// An implementation of `LlmClient` for any OpenAI-compatible API, including
/// Ollama's `/v1` endpoint.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The model identifier to use for chat completions (e.g., "llama3.2:3b").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAICompatibleClient {
    #[allow(deprecated)]
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            // Ollama's compatibility layer honours `max_tokens`, not `max_completion_tokens`.
            .max_tokens(options.max_tokens)
            .temperature(options.temperature)
            .build()?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .context("Chat completion request failed")?;

        let text = response
            .choices
            .into_iter()
            .next()
            .context("No response choice from LLM")?
            .message
            .content
            .unwrap_or_default();

        Ok(text)
    }
}
