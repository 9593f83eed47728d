use crate::embeddings::Embedder;
use crate::error::ProviderError;
use crate::secrets::Secrets;
use crate::traits::{ChatModel, TokenStream};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

#[derive(Debug, Clone)]
pub struct OpenAiCredentials {
    pub api_key: String,
    pub base_url: String,
}

impl OpenAiCredentials {
    pub fn from_secrets(secrets: &Secrets) -> Result<Self, ProviderError> {
        let api_key = secrets
            .get("OPENAI_API_KEY")
            .ok_or_else(|| ProviderError::MissingCredential("OPENAI_API_KEY".to_string()))?;
        let base_url = secrets
            .get("OPENAI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            api_key: api_key.trim().to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn build_client() -> Result<Client, ProviderError> {
    Ok(Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(300))
        .build()?)
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    Err(ProviderError::Response {
        provider: "openai".to_string(),
        status,
        body,
    })
}

pub struct OpenAiChatModel {
    credentials: OpenAiCredentials,
    model: String,
    temperature: f32,
    client: Client,
}

impl OpenAiChatModel {
    pub fn new(
        credentials: OpenAiCredentials,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            credentials,
            model: model.into(),
            temperature,
            client: build_client()?,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    stream: bool,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, PartialEq)]
pub(crate) enum SseEvent {
    Token(String),
    Done,
    Skip,
}

/// Interprets one line of a chat-completions event stream.
pub(crate) fn parse_sse_line(line: &str) -> Result<SseEvent, ProviderError> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let json: Value = serde_json::from_str(data)?;
    if let Some(message) = json.pointer("/error/message").and_then(Value::as_str) {
        return Err(ProviderError::Stream(message.to_string()));
    }
    match json
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
    {
        Some(content) if !content.is_empty() => Ok(SseEvent::Token(content.to_string())),
        _ => Ok(SseEvent::Skip),
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, prompt: &str) -> Result<TokenStream, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            stream: true,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.credentials.base_url))
            .bearer_auth(&self.credentials.api_key)
            .json(&body)
            .send()
            .await?;
        let response = error_for_status(response).await?;

        let (tx, rx) = mpsc::channel(64);
        let mut bytes = response.bytes_stream();

        tokio::spawn(async move {
            let mut pending: Vec<u8> = Vec::new();
            while let Some(item) = bytes.next().await {
                let chunk = match item {
                    Ok(chunk) => chunk,
                    Err(error) => {
                        let _ = tx.send(Err(ProviderError::Http(error))).await;
                        return;
                    }
                };
                pending.extend_from_slice(&chunk);

                while let Some(newline) = pending.iter().position(|byte| *byte == b'\n') {
                    let line: Vec<u8> = pending.drain(..=newline).collect();
                    match parse_sse_line(&String::from_utf8_lossy(&line)) {
                        Ok(SseEvent::Token(token)) => {
                            if tx.send(Ok(token)).await.is_err() {
                                return;
                            }
                        }
                        Ok(SseEvent::Done) => return,
                        Ok(SseEvent::Skip) => {}
                        Err(error) => {
                            let _ = tx.send(Err(error)).await;
                            return;
                        }
                    }
                }
            }
            debug!("openai stream closed without [DONE]");
        });

        Ok(rx)
    }
}

pub struct OpenAiEmbedder {
    credentials: OpenAiCredentials,
    model: String,
    dimensions: usize,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(credentials: OpenAiCredentials) -> Result<Self, ProviderError> {
        Ok(Self {
            credentials,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            client: build_client()?,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

fn order_embeddings(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    data.sort_by_key(|item| item.index);
    data.into_iter().map(|item| item.embedding).collect()
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.credentials.base_url))
            .bearer_auth(&self.credentials.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;
        let response = error_for_status(response).await?;

        let parsed: EmbeddingResponse = response.json().await?;
        Ok(order_embeddings(parsed.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_content_becomes_a_token() -> Result<(), ProviderError> {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_sse_line(line)?, SseEvent::Token("Hel".to_string()));
        Ok(())
    }

    #[test]
    fn done_marker_and_noise_are_recognised() -> Result<(), ProviderError> {
        assert_eq!(parse_sse_line("data: [DONE]\n")?, SseEvent::Done);
        assert_eq!(parse_sse_line("")?, SseEvent::Skip);
        assert_eq!(parse_sse_line(": keep-alive")?, SseEvent::Skip);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#)?,
            SseEvent::Skip
        );
        Ok(())
    }

    #[test]
    fn error_payload_is_surfaced() {
        let line = r#"data: {"error":{"message":"rate limited"}}"#;
        assert!(matches!(
            parse_sse_line(line),
            Err(ProviderError::Stream(message)) if message == "rate limited"
        ));
    }

    #[test]
    fn embeddings_are_returned_in_input_order() {
        let data = vec![
            EmbeddingData {
                index: 1,
                embedding: vec![2.0],
            },
            EmbeddingData {
                index: 0,
                embedding: vec![1.0],
            },
        ];
        assert_eq!(order_embeddings(data), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn credentials_come_from_secrets() {
        let secrets = Secrets::from_pairs([
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:1234/v1/"),
        ]);
        let credentials = OpenAiCredentials::from_secrets(&secrets);
        assert!(matches!(
            credentials,
            Ok(OpenAiCredentials { ref api_key, ref base_url })
                if api_key == "sk-test" && base_url == "http://localhost:1234/v1"
        ));
    }
}
