use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::generator::{ArticleGenerator, GeneratedArticle, GenerationError, parse_completion};

const SCHEMA_NAME: &str = "ecag_article";
const TEMPERATURE: f64 = 0.2;

const SYSTEM_PROMPT: &str = "You are a careful news editor.
Follow ALL rules:
- Use ONLY facts from the provided extracted text. If unsure, omit.
- Keep ALL numbers exactly unchanged (digits, %, currencies, ranges).
- No emojis. No hashtags.
- Output ONLY valid JSON matching the schema.

Output requirements:
- title_en: short headline in English.
- brief_en: 5-6 sentences.
- article_en: Rewrite the article in English based ONLY on provided text. If the extracted article is too long, shorten it while preserving key facts. Keep total length roughly 350-600 words. Use section titles as plain text lines (no Markdown symbols). Separate paragraphs by a blank line. Include a \"Key takeaways\" section with lines starting \"- \".
- title_ge, brief_ge, article_ge: Georgian translations of the English fields.
- source_url: must match the provided URL exactly.
";

/// Connection details for the chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    strict: bool,
    schema: Value,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct StructuredRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<Message<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

fn article_schema() -> Value {
    let fields = [
        "title_en",
        "brief_en",
        "article_en",
        "title_ge",
        "brief_ge",
        "article_ge",
        "source_url",
    ];
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|f| (f.to_string(), json!({ "type": "string" })))
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": fields,
        "additionalProperties": false,
    })
}

fn user_message(extracted_text: &str, source_url: &str) -> String {
    format!("SOURCE_URL: {source_url}\n\nEXTRACTED_TEXT:\n{extracted_text}")
}

pub struct OpenAiGenerator {
    http_client: Client,
    settings: OpenAiSettings,
}

impl OpenAiGenerator {
    pub fn new(settings: OpenAiSettings) -> Result<Self, GenerationError> {
        let http_client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            settings,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn map_transport(e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl ArticleGenerator for OpenAiGenerator {
    #[instrument(skip(self, extracted_text), fields(model = %self.settings.model, chars = extracted_text.len()))]
    async fn generate(
        &self,
        extracted_text: &str,
        source_url: &str,
    ) -> Result<GeneratedArticle, GenerationError> {
        let user = user_message(extracted_text, source_url);
        let request = StructuredRequest {
            model: &self.settings.model,
            temperature: TEMPERATURE,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: &user,
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: SCHEMA_NAME,
                    strict: true,
                    schema: article_schema(),
                },
            },
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(Self::map_transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %message, "OpenAI API error");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let raw: ChatResponseRaw = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout
            } else {
                GenerationError::Schema(e.to_string())
            }
        })?;

        let content = raw.choices.into_iter().next().and_then(|c| c.message.content);
        debug!(has_content = content.is_some(), "received completion");
        parse_completion(content.as_deref(), source_url)
    }
}
