use anyhow::{Context, Result};
use std::str::FromStr;

/// 1 MiB, the limit the hosted deployment enforced on uploads.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Generous enough for a local model to chew through a long transcript.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub fallback_model: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Whole-request timeout, streamed bodies included.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            // Using Ollama as default
            api_url: "http://localhost:11434/api/generate".to_string(),
            api_key: None,
            model: "llama3".to_string(),
            fallback_model: None,
            temperature: 0.1,
            max_output_tokens: 1500,
            request_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub max_payload_bytes: usize,
    /// Prompt with `{duration}` and `{transcript}` placeholders.
    pub prompt_template: String,
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0:3000".to_string(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            prompt_template: crate::services::chapterizer::DEFAULT_PROMPT_TEMPLATE.to_string(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let prompt_template = match std::env::var("PROMPT_TEMPLATE_PATH") {
            Ok(path) => std::fs::read_to_string(&path)
                .with_context(|| format!("reading prompt template {path}"))?,
            Err(_) => defaults.prompt_template,
        };

        Ok(Config {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            max_payload_bytes: parse_var("MAX_PAYLOAD_BYTES")?
                .unwrap_or(defaults.max_payload_bytes),
            prompt_template,
            llm: LlmConfig {
                api_url: std::env::var("LLM_API_URL").unwrap_or(defaults.llm.api_url),
                api_key: non_empty_var("LLM_API_KEY"),
                model: std::env::var("LLM_MODEL").unwrap_or(defaults.llm.model),
                fallback_model: non_empty_var("LLM_FALLBACK_MODEL"),
                temperature: parse_var("LLM_TEMPERATURE")?.unwrap_or(defaults.llm.temperature),
                max_output_tokens: parse_var("LLM_MAX_OUTPUT_TOKENS")?
                    .unwrap_or(defaults.llm.max_output_tokens),
                request_timeout_secs: parse_var("LLM_TIMEOUT_SECS")?
                    .unwrap_or(defaults.llm.request_timeout_secs),
            },
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    non_empty_var(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .with_context(|| format!("{name} has an invalid value: {value}"))
        })
        .transpose()
}
