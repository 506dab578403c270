//! Anthropic Messages API client.
//!
//! One blocking request per part. The prompt wraps the extracted text in
//! fixed translation instructions; the reply's text blocks are concatenated
//! into the translation.

use super::backend::{TranslateError, Translation, Translator};
use crate::config::TranslationConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_VERSION: &str = "2023-06-01";

/// Instructions sent ahead of every part. `{{TEXT}}` is replaced with the
/// extracted text.
pub const TRANSLATION_PROMPT: &str = r#"You are a professional technical translator specializing in hardware synthesizer manuals.

Translate the following English text from a hardware synthesizer manual into Japanese.

**Translation Guidelines:**
1. **Style**: Use technical documentation style (です・ます調 / desu-masu style)
2. **Technical Terms**: Preserve these in English where appropriate:
   - MIDI, CV, Gate, Sequencer, BPM, LFO, Arpeggiator, etc.
   - Product names such as OXI ONE MKII, USB, etc.
3. **Formatting**: Maintain markdown formatting, line breaks, and structure
4. **Page markers**: Copy every `-- k of N --` line unchanged and in place
5. **Accuracy**: Ensure technical accuracy; this is a hardware manual
6. **Consistency**: Use consistent terminology throughout

**Important:**
- Do NOT add extra explanations or notes
- Do NOT translate brand names or product names
- Keep numbered lists, bullet points, and headers in the same format
- Preserve any code snippets or technical specifications exactly as they are

Please translate the following text:

---

{{TEXT}}

---

Output ONLY the Japanese translation without any preamble or additional notes."#;

/// Fill the translation prompt with a part's text.
pub fn build_prompt(text: &str) -> String {
    TRANSLATION_PROMPT.replace("{{TEXT}}", text)
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Blocking client for the Messages endpoint.
pub struct AnthropicClient {
    http: reqwest::blocking::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    /// Build a client, reading the API key from the configured variable.
    pub fn from_config(config: &TranslationConfig) -> Result<Self, TranslateError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TranslateError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, api_key)
    }

    pub fn new(config: &TranslationConfig, api_key: String) -> Result<Self, TranslateError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("manual-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

impl Translator for AnthropicClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn translate(&self, source_text: &str) -> Result<Translation, TranslateError> {
        let prompt = build_prompt(source_text);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [Message {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TranslateError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let reply: MessagesResponse = response.json()?;
        parse_reply(reply)
    }
}

fn parse_reply(reply: MessagesResponse) -> Result<Translation, TranslateError> {
    let text: String = reply
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .map(|block| block.text)
        .collect();
    if text.trim().is_empty() {
        return Err(TranslateError::EmptyResponse);
    }
    Ok(Translation {
        text,
        input_tokens: reply.usage.input_tokens,
        output_tokens: reply.usage.output_tokens,
    })
}
