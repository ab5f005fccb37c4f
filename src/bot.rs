//! HTTP adapter to the bot text-generation endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::BotConfig;
use crate::error::BotError;

/// Fixed instruction keeping the assistant on books and movies.
const SYSTEM_PROMPT: &str = "You are a friendly assistant that chats about books and movies. \
Keep replies short and warm, and always encourage good reads or good films. If the question \
is not about books or movies, steer the user back to those topics.";

/// One bot round trip: prompt in, generated text out.
#[async_trait]
pub trait BotClient: Send + Sync {
    async fn reply(&self, prompt: &str) -> Result<String, BotError>;
}

#[derive(Debug, Serialize)]
struct BotRequest<'a> {
    prompt: &'a str,
    system: &'static str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct BotReply {
    #[serde(rename = "generatedText")]
    generated_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

pub struct BotResponder {
    http: Client,
    config: BotConfig,
}

impl BotResponder {
    pub fn new(config: BotConfig) -> Result<Self, BotError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl BotClient for BotResponder {
    async fn reply(&self, prompt: &str) -> Result<String, BotError> {
        info!(prompt_chars = prompt.chars().count(), "bot round trip");

        let request = BotRequest {
            prompt,
            system: SYSTEM_PROMPT,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let mut call = self.http.post(&self.config.endpoint).json(&request);
        if let Some(key) = &self.config.api_key {
            call = call.bearer_auth(key);
        }

        let response = call.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        interpret_response(status, &body)
    }
}

/// Maps one endpoint response to a reply or a [`BotError`]. Split out so the
/// contract is testable without a live endpoint.
pub(crate) fn interpret_response(status: u16, body: &str) -> Result<String, BotError> {
    if !(200..300).contains(&status) {
        return Err(BotError::Status {
            status,
            message: error_message(status, body),
        });
    }

    let reply: BotReply =
        serde_json::from_str(body).map_err(|e| BotError::Malformed(e.to_string()))?;
    let text = reply.generated_text.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(BotError::EmptyReply);
    }
    Ok(text)
}

/// Server-supplied error field when the body is JSON, the raw body text
/// otherwise, a generic status line as the last resort.
fn error_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.error.filter(|m| !m.trim().is_empty()) {
            return message;
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    format!("server error: {status}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_yields_generated_text() {
        let reply = interpret_response(200, r#"{"generatedText":"Try Dune"}"#).unwrap();
        assert_eq!(reply, "Try Dune");
    }

    #[test]
    fn server_error_carries_supplied_message() {
        let err = interpret_response(500, r#"{"error":"rate limited"}"#).unwrap_err();
        match err {
            BotError::Status { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "rate limited");
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn non_json_error_body_is_passed_through() {
        let err = interpret_response(502, "bad gateway").unwrap_err();
        match err {
            BotError::Status { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "bad gateway");
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn empty_error_body_falls_back_to_status_line() {
        let err = interpret_response(503, "").unwrap_err();
        match err {
            BotError::Status { message, .. } => assert_eq!(message, "server error: 503"),
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn missing_generated_text_is_an_empty_reply() {
        assert!(matches!(
            interpret_response(200, r#"{}"#),
            Err(BotError::EmptyReply)
        ));
        assert!(matches!(
            interpret_response(200, r#"{"generatedText":"  "}"#),
            Err(BotError::EmptyReply)
        ));
    }

    #[test]
    fn unparseable_success_body_is_malformed() {
        assert!(matches!(
            interpret_response(200, "not json"),
            Err(BotError::Malformed(_))
        ));
    }
}
