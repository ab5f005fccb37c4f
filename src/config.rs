use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ChatError;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Caller-level bound on one bot round trip. The endpoint itself has no
    /// documented limit, so the request future is capped here.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub bot: BotConfig,
    /// Device-local file holding the bot conversation transcript.
    pub bot_transcript_path: PathBuf,
    /// Words the content filter replaces with asterisks.
    pub blocked_words: Vec<String>,
}

impl Config {
    fn parse_words(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn from_env() -> Result<Self, ChatError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ChatError::Config("DATABASE_URL missing".into()))?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());

        let bot_endpoint = env::var("BOT_ENDPOINT_URL")
            .map_err(|_| ChatError::Config("BOT_ENDPOINT_URL missing".into()))?;
        let bot_api_key = env::var("BOT_API_KEY").ok().filter(|k| !k.trim().is_empty());
        let bot_max_tokens = env::var("BOT_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);
        let bot_temperature = env::var("BOT_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.7);
        let bot_timeout_secs = env::var("BOT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let bot_transcript_path = env::var("BOT_TRANSCRIPT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("chat_bot_history.json"));

        let blocked_words = env::var("BLOCKED_WORDS")
            .map(|v| Self::parse_words(&v))
            .unwrap_or_default();

        Ok(Self {
            database_url,
            redis_url,
            bot: BotConfig {
                endpoint: bot_endpoint,
                api_key: bot_api_key,
                max_tokens: bot_max_tokens,
                temperature: bot_temperature,
                timeout: Duration::from_secs(bot_timeout_secs),
            },
            bot_transcript_path,
            blocked_words,
        })
    }

    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/test".into(),
            redis_url: "redis://127.0.0.1:6379/0".into(),
            bot: BotConfig {
                endpoint: "http://127.0.0.1:9/bot".into(),
                api_key: None,
                max_tokens: 300,
                temperature: 0.7,
                timeout: Duration::from_secs(30),
            },
            bot_transcript_path: PathBuf::from("chat_bot_history.json"),
            blocked_words: Vec::new(),
        }
    }
}
