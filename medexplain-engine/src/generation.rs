// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Client side of the text-generation service

use async_trait::async_trait;
use medexplain_core::GenerationConfig;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// A backend that rewrites medical text in plain language
///
/// Implementations return the raw response body. For streaming backends that
/// is line-delimited JSON frames, which the engine reassembles itself.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, text: &str) -> Result<String, GenerationError>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Ollama-compatible `/api/chat` client
pub struct OllamaClient {
    base_url: String,
    model: String,
    system_prompt: String,
    stream: bool,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            stream: config.stream,
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    async fn generate(&self, text: &str) -> Result<String, GenerationError> {
        let request = json!({
            "model": self.model,
            "stream": self.stream,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": text }
            ]
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        debug!(model = %self.model, bytes = body.len(), "Generation response received");
        Ok(body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::Server) -> OllamaClient {
        let config = GenerationConfig {
            model: "test-model".to_string(),
            timeout_secs: 5,
            ..GenerationConfig::default()
        };
        OllamaClient::new(&config).unwrap().with_base_url(server.url())
    }

    #[tokio::test]
    async fn test_generate_posts_chat_request() {
        let mut server = mockito::Server::new_async().await;
        let body = "{\"message\":{\"content\":\"[[Asthma]] \"}}\n{\"message\":{\"content\":\"is a lung problem.\"},\"done\":true}\n";
        let mock = server
            .mock("POST", "/api/chat")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({ "model": "test-model", "stream": true })),
                Matcher::Regex(r#""content":"Asthma exacerbation""#.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/x-ndjson")
            .with_body(body)
            .create_async()
            .await;

        let client = client_for(&server);
        let response = client.generate("Asthma exacerbation").await.unwrap();

        assert_eq!(response, body);
        assert_eq!(client.model_name(), "test-model");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/chat")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let err = client_for(&server).generate("fever").await.unwrap_err();
        match err {
            GenerationError::ApiError { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "model not loaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        let config = GenerationConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            ..GenerationConfig::default()
        };
        let err = OllamaClient::new(&config)
            .unwrap()
            .generate("cough")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Http(_)));
    }
}
