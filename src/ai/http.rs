// src/ai/http.rs
//! HTTP chat provider speaking either the OpenAI-compatible chat completions
//! wire format (OpenAI, Gemini's compatibility endpoint, Ollama) or Anthropic messages.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::classify::{classify_status, parse_retry_after, to_error};
use crate::ai::{parse_structured_summary, Operation, Provider, ProviderRequest, ProviderResponse};
use crate::config::providers::{ChatFlavor, ProviderSpec};
use crate::error::{ConfigError, ProviderError};

const USER_AGENT: &str = "ai-news-aggregator/0.1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct HttpChatProvider {
    spec: ProviderSpec,
    http: reqwest::Client,
}

impl HttpChatProvider {
    pub fn new(spec: ProviderSpec) -> Result<Self, ConfigError> {
        if spec.flavor == ChatFlavor::Anthropic && spec.api_key.is_empty() {
            return Err(ConfigError::Provider {
                name: spec.name.clone(),
                message: "api key is required".to_string(),
            });
        }
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigError::Provider {
                name: spec.name.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { spec, http })
    }

    fn send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_builder() {
            ProviderError::fatal(&self.spec.name, e.to_string())
        } else {
            ProviderError::transient(&self.spec.name, e.to_string())
        }
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let builder = match self.spec.flavor {
            ChatFlavor::OpenAi => {
                let body = OpenAiRequest {
                    model: &self.spec.model,
                    messages: vec![
                        Msg {
                            role: "system",
                            content: system,
                        },
                        Msg {
                            role: "user",
                            content: user,
                        },
                    ],
                    temperature: 0.2,
                    max_tokens: self.spec.max_tokens,
                };
                let req = self.http.post(&self.spec.endpoint).json(&body);
                if self.spec.api_key.is_empty() {
                    req
                } else {
                    req.bearer_auth(&self.spec.api_key)
                }
            }
            ChatFlavor::Anthropic => {
                let body = AnthropicRequest {
                    model: &self.spec.model,
                    max_tokens: self.spec.max_tokens,
                    system,
                    messages: vec![Msg {
                        role: "user",
                        content: user,
                    }],
                };
                self.http
                    .post(&self.spec.endpoint)
                    .header("x-api-key", &self.spec.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(&body)
            }
        };

        let resp = builder.send().await.map_err(|e| self.send_error(e))?;
        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = resp.text().await.unwrap_or_default();
            let kind = classify_status(status.as_u16(), &body);
            let snippet: String = body.chars().take(200).collect();
            return Err(to_error(
                &self.spec.name,
                kind,
                format!("HTTP {}: {}", status.as_u16(), snippet),
                retry_after,
            ));
        }

        let text = match self.spec.flavor {
            ChatFlavor::OpenAi => {
                let parsed: OpenAiResponse = resp.json().await.map_err(|e| {
                    ProviderError::transient(&self.spec.name, format!("malformed response: {e}"))
                })?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
            }
            ChatFlavor::Anthropic => {
                let parsed: AnthropicResponse = resp.json().await.map_err(|e| {
                    ProviderError::transient(&self.spec.name, format!("malformed response: {e}"))
                })?;
                parsed
                    .content
                    .into_iter()
                    .find(|b| b.kind == "text")
                    .map(|b| b.text)
            }
        };

        text.map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::transient(&self.spec.name, "empty completion"))
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Msg<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// System and user prompt for one request.
pub fn prompts(request: &ProviderRequest) -> (String, String) {
    let lang = request.target_language.english_name();
    let system = match request.operation {
        Operation::Summarize => format!(
            "You summarize AI and machine-learning news for busy engineers. \
             Reply with a single JSON object and nothing else: \
             {{\"summary\": string, \"confidence\": number between 0 and 1, \"tags\": [up to 5 short topic strings]}}. \
             Write the summary in {lang}, at most 200 characters, factual and without hype. \
             confidence is how well the source text supports the summary."
        ),
        Operation::Translate => format!(
            "Translate the news headline into natural {lang}. \
             Drop Reddit-style prefixes such as [D], [R] or [P]. \
             Output only the translated headline on one line."
        ),
        Operation::ExtractTrends => format!(
            "From the following AI news items, list the 3 to 5 most important technology or industry trends, \
             most important first. Write in {lang}. One trend per line, each starting with \"- \". No other text."
        ),
    };
    (system, request.input_text.clone())
}

#[async_trait]
impl Provider for HttpChatProvider {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn capabilities(&self) -> &[Operation] {
        &self.spec.capabilities
    }

    fn requests_per_minute(&self) -> u32 {
        self.spec.requests_per_minute
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let (system, user) = prompts(request);
        let text = self.complete(&system, &user).await?;
        Ok(match request.operation {
            Operation::Summarize => parse_structured_summary(&text),
            Operation::Translate | Operation::ExtractTrends => ProviderResponse::text(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Language;

    fn spec(flavor: ChatFlavor, key: &str) -> ProviderSpec {
        ProviderSpec {
            name: "p".into(),
            flavor,
            endpoint: "http://127.0.0.1:9/v1/chat/completions".into(),
            model: "m".into(),
            api_key: key.into(),
            requests_per_minute: 0,
            capabilities: Operation::ALL.to_vec(),
            max_tokens: 512,
        }
    }

    #[test]
    fn anthropic_needs_a_key() {
        assert!(HttpChatProvider::new(spec(ChatFlavor::Anthropic, "")).is_err());
        assert!(HttpChatProvider::new(spec(ChatFlavor::OpenAi, "")).is_ok());
    }

    #[test]
    fn prompts_name_the_target_language() {
        let req = ProviderRequest::new(Operation::Translate, "Hello", Language::Ja);
        let (system, user) = prompts(&req);
        assert!(system.contains("Japanese"));
        assert_eq!(user, "Hello");
    }
}
