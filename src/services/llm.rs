use crate::config::LlmConfig;
use anyhow::{Context, Result, anyhow};
use futures::{Stream, StreamExt, stream, stream::BoxStream};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// One object of an Ollama `/api/generate` reply, streamed or not.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

pub struct LLMClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    fallback_model: Option<String>,
    temperature: f32,
    max_output_tokens: u32,
}

impl LLMClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(LLMClient {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.request_timeout_secs))
                .build()
                .context("building HTTP client")?,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            fallback_model: config.fallback_model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    /// Run the prompt to completion and return the whole response text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self.send_with_fallback(prompt, false).await?;
        let chunk: GenerateChunk = response.json().await.context("decoding model response")?;
        if let Some(error) = chunk.error {
            return Err(anyhow!("model returned an error: {error}"));
        }
        Ok(chunk.response)
    }

    /// Run the prompt and yield response text as the model produces it.
    pub async fn generate_stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        let response = self.send_with_fallback(prompt, true).await?;
        Ok(decode_ndjson(Box::pin(response.bytes_stream())).boxed())
    }

    async fn send_with_fallback(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        match self.send(&self.model, prompt, stream).await {
            Ok(response) => Ok(response),
            Err(err) => match &self.fallback_model {
                Some(fallback) => {
                    tracing::warn!(
                        "model {} failed, falling back to {}: {:#}",
                        self.model,
                        fallback,
                        err
                    );
                    self.send(fallback, prompt, stream).await
                }
                None => Err(err),
            },
        }
    }

    async fn send(&self, model: &str, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let mut request_builder = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": model,
                "prompt": prompt,
                "stream": stream,
                "options": {
                    "temperature": self.temperature,
                    "num_predict": self.max_output_tokens
                }
            }));

        if let Some(api_key) = &self.api_key {
            request_builder = request_builder.bearer_auth(api_key);
        }

        tracing::debug!("sending prompt of {} bytes to {}", prompt.len(), model);
        let response = request_builder
            .send()
            .await
            .with_context(|| format!("requesting {model}"))?
            .error_for_status()
            .with_context(|| format!("{model} rejected the request"))?;

        Ok(response)
    }
}

/// Turn a newline-delimited JSON byte stream into response text fragments.
fn decode_ndjson<S, B>(bytes: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = reqwest::Result<B>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    stream::unfold(
        (bytes, Vec::<u8>::new(), false),
        |(mut bytes, mut buffer, mut exhausted)| async move {
            loop {
                if let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline).collect();
                    match decode_line(&line) {
                        Ok(Some(text)) => return Some((Ok(text), (bytes, buffer, exhausted))),
                        Ok(None) => continue,
                        Err(err) => return Some((Err(err), (bytes, Vec::new(), true))),
                    }
                }
                if exhausted {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                    Some(Err(err)) => {
                        return Some((
                            Err(anyhow::Error::new(err).context("reading model stream")),
                            (bytes, Vec::new(), true),
                        ));
                    }
                    None => {
                        exhausted = true;
                        buffer.push(b'\n');
                    }
                }
            }
        },
    )
}

fn decode_line(line: &[u8]) -> Result<Option<String>> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let chunk: GenerateChunk =
        serde_json::from_str(line).context("decoding model stream chunk")?;
    if let Some(error) = chunk.error {
        return Err(anyhow!("model returned an error: {error}"));
    }
    if chunk.response.is_empty() {
        return Ok(None);
    }
    Ok(Some(chunk.response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use httpmock::prelude::*;

    fn config_for(server: &MockServer) -> LlmConfig {
        LlmConfig {
            api_url: server.url("/api/generate"),
            model: "primary".to_string(),
            ..LlmConfig::default()
        }
    }

    #[tokio::test]
    async fn generate_returns_response_text() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .json_body_partial(r#"{"model": "primary", "stream": false}"#);
                then.status(200)
                    .json_body(json!({"response": "00:00 Intro\n", "done": true}));
            })
            .await;

        let client = LLMClient::new(&config_for(&server)).unwrap();
        let text = client.generate("prompt").await.unwrap();

        mock.assert_async().await;
        assert_eq!(text, "00:00 Intro\n");
    }

    #[tokio::test]
    async fn sends_bearer_token_when_configured() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .header("Authorization", "Bearer secret");
                then.status(200).json_body(json!({"response": "ok"}));
            })
            .await;

        let config = LlmConfig {
            api_key: Some("secret".to_string()),
            ..config_for(&server)
        };
        let client = LLMClient::new(&config).unwrap();
        assert_eq!(client.generate("prompt").await.unwrap(), "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn falls_back_when_primary_fails() {
        let server = MockServer::start_async().await;
        let primary = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .json_body_partial(r#"{"model": "primary"}"#);
                then.status(500);
            })
            .await;
        let fallback = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .json_body_partial(r#"{"model": "backup"}"#);
                then.status(200).json_body(json!({"response": "from backup"}));
            })
            .await;

        let config = LlmConfig {
            fallback_model: Some("backup".to_string()),
            ..config_for(&server)
        };
        let client = LLMClient::new(&config).unwrap();

        assert_eq!(client.generate("prompt").await.unwrap(), "from backup");
        primary.assert_async().await;
        fallback.assert_async().await;
    }

    #[tokio::test]
    async fn fails_without_fallback() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(503);
            })
            .await;

        let client = LLMClient::new(&config_for(&server)).unwrap();
        assert!(client.generate("prompt").await.is_err());
    }

    #[tokio::test]
    async fn gives_up_on_a_model_that_never_answers() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200)
                    .delay(Duration::from_secs(5))
                    .json_body(json!({"response": "too late"}));
            })
            .await;

        let config = LlmConfig {
            request_timeout_secs: 1,
            ..config_for(&server)
        };
        let client = LLMClient::new(&config).unwrap();
        let started = std::time::Instant::now();

        assert!(client.generate("prompt").await.is_err());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn streams_ndjson_fragments() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .json_body_partial(r#"{"stream": true}"#);
                then.status(200).body(concat!(
                    "{\"response\":\"00:00 In\",\"done\":false}\n",
                    "\n",
                    "{\"response\":\"tro\\n01:30 Demo\",\"done\":false}\n",
                    "{\"response\":\"\",\"done\":true}"
                ));
            })
            .await;

        let client = LLMClient::new(&config_for(&server)).unwrap();
        let fragments: Vec<String> = client
            .generate_stream("prompt")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(fragments, vec!["00:00 In", "tro\n01:30 Demo"]);
    }

    #[tokio::test]
    async fn stream_surfaces_model_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200)
                    .body("{\"response\":\"00:00 Intro\"}\n{\"error\":\"out of memory\"}\n");
            })
            .await;

        let client = LLMClient::new(&config_for(&server)).unwrap();
        let results: Vec<Result<String>> =
            client.generate_stream("prompt").await.unwrap().collect().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "00:00 Intro");
        assert!(results[1].is_err());
    }
}
