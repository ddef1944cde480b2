//! OpenAI-compatible chat-completions client with image input.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{parse_analysis, MealAnalysis, MealAnalyzer, MealImage};
use crate::config::ApiConfig;
use crate::error::{Error, Result};

const SYSTEM_PROMPT: &str = "You are a nutritionist. Identify the meal in the photo and \
estimate its nutrition. Answer with a single JSON object and nothing else, shaped as: \
{\"name\": string, \"ingredients\": [{\"name\": string, \"amount\": number, \"unit\": string, \
\"calories\": number, \"protein\": number, \"carbs\": number, \"fat\": number}], \
\"nutrition\": {\"calories\": number, \"protein\": number, \"carbs\": number, \"fat\": number, \
\"fiber\": number, \"sugar\": number, \"sodium\": number}, \"health_grade\": \"A\"|\"B\"|\"C\"|\"D\"|\"E\"}. \
Macros are in grams, sodium in milligrams, calories in kcal, all for the whole plate as shown. \
If the photo does not show food, answer {\"error\": \"<short reason>\"}.";

const USER_PROMPT: &str = "Analyze this meal.";

/// Analyzer backed by an OpenAI-compatible vision model.
pub struct OpenAiAnalyzer {
    config: ApiConfig,
    api_key: String,
    client: Client,
}

impl std::fmt::Debug for OpenAiAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAnalyzer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OpenAiAnalyzer {
    /// Create an analyzer using the key from `config` or the environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingApiKey`] if no key is available, or an error
    /// if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let api_key = config.resolved_api_key().ok_or(Error::MissingApiKey)?;
        Self::with_api_key(config, api_key)
    }

    /// Create an analyzer with an explicit key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingApiKey`] if `api_key` is blank, or an error if
    /// the HTTP client cannot be built.
    pub fn with_api_key(config: &ApiConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey);
        }
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            config: config.clone(),
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_request(&self, image: &MealImage) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: USER_PROMPT.to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image.data_url(),
                                detail: self.config.image_detail.clone(),
                            },
                        },
                    ]),
                },
            ],
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

#[async_trait]
impl MealAnalyzer for OpenAiAnalyzer {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn analyze(&self, image: &MealImage) -> Result<MealAnalysis> {
        let request = self.build_request(image);
        info!(
            "Sending {} to {} ({})",
            image.path.display(),
            self.config.model,
            self.config.base_url
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Analysis request failed with {}", status);
            return Err(Error::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::response_parse(format!("unexpected response body: {e}")))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::response_parse("response has no choices"))?;
        debug!("finish_reason: {:?}", choice.finish_reason);

        if let Some(refusal) = choice.message.refusal.filter(|r| !r.trim().is_empty()) {
            return Err(Error::AnalysisRejected { reason: refusal });
        }
        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::response_parse("response message is empty"))?;

        parse_analysis(&content)
    }
}

/// Pull `error.message` out of an OpenAI error body, falling back to the
/// raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string())
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}
