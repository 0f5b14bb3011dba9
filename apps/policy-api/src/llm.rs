//! OpenAI-compatible chat completion generator
//!
//! Sends the prompt for each generation mode as a JSON-mode chat request and
//! parses the reply into raw claims. The reply is never trusted: claims are
//! validated by the pipeline after this returns.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use grounding_engine::prompts::{build_prompt, parse_claims, TEMPERATURE};
use grounding_engine::{GenerationRequest, Generator};
use policy_types::Claim;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    type_: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Claim>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("No LLM API key configured"))?;

        let prompt = build_prompt(request);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &prompt.system,
                },
                Message {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: TEMPERATURE,
            response_format: ResponseFormat { type_: "json_object" },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .context("LLM request failed")?
            .error_for_status()
            .context("LLM provider returned an error status")?;

        let reply: ChatResponse = response.json().await.context("Malformed LLM response")?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("LLM response has no content"))?;

        debug!(
            mode = request.mode.as_str(),
            chars = content.len(),
            "Received generation"
        );
        parse_claims(&content, request)
    }
}
