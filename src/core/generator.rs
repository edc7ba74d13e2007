//! HTTP text-generation client
//!
//! Talks to a chat-completions style endpoint. Which provider sits behind the
//! URL is deliberately not this crate's concern; everything is configured
//! through `GENERATION_API_URL`, `GENERATION_API_KEY` and `GENERATION_MODEL`.

use crate::core::traits::TextGenerator;
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Serialize, Debug)]
struct GenerationRequest<'a> {
    model: &'a str,
    messages: Vec<PromptMessage<'a>>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Serialize, Debug)]
struct PromptMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct GenerationResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: String,
}

pub struct HttpTextGenerator {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl HttpTextGenerator {
    pub fn from_env() -> HttpTextGenerator {
        dotenvy::dotenv().ok();
        let api_url = env::var("GENERATION_API_URL").expect("GENERATION_API_URL must be set");
        let api_key = env::var("GENERATION_API_KEY").unwrap_or_default();
        let model = env::var("GENERATION_MODEL").unwrap_or(DEFAULT_MODEL.to_owned());

        let client = Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .expect("Cannot create HTTP client");

        HttpTextGenerator {
            client,
            api_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let body = GenerationRequest {
            model: &self.model,
            messages: vec![PromptMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: Some(800),
            temperature: Some(0.7),
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            bail!("generation API returned {status}");
        }

        let parsed: GenerationResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("generation API returned no choices"))?;

        if choice.message.content.trim().is_empty() {
            bail!("generation API returned empty content");
        }

        Ok(choice.message.content)
    }
}
