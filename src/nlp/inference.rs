use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::error::{CrawlError, Result};
use crate::nlp::summarizer::{Summarizer, SummaryLength};
use crate::nlp::translator::Translator;

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
    options: InferenceOptions,
}

#[derive(Serialize, Default)]
struct InferenceParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    do_sample: Option<bool>,
}

#[derive(Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

/// Hosted Hugging Face inference API, used for both summarization and
/// translation.
#[derive(Clone)]
pub struct HuggingFaceClient {
    client: Client,
    base_url: String,
    summarization_model: String,
    translation_model: String,
    api_token: Option<String>,
    attempts: u32,
    backoff_base: Duration,
}

impl HuggingFaceClient {
    pub fn new(client: Client, models: &ModelConfig, api_token: Option<String>) -> Self {
        Self {
            client,
            base_url: models.inference_url.trim_end_matches('/').to_string(),
            summarization_model: models.summarization_model.clone(),
            translation_model: models.translation_model.clone(),
            api_token,
            attempts: 3,
            backoff_base: Duration::from_secs(2),
        }
    }

    pub fn with_retries(mut self, attempts: u32, backoff_base: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff_base = backoff_base;
        self
    }

    async fn infer(&self, model: &str, inputs: &str, parameters: InferenceParameters, output_key: &str) -> Result<String> {
        let url = format!("{}/{}", self.base_url, model);
        let body = InferenceRequest {
            inputs,
            parameters,
            options: InferenceOptions { wait_for_model: true },
        };

        let mut last_error = String::new();
        for attempt in 0..self.attempts {
            let mut request = self.client.post(&url).json(&body);
            if let Some(token) = &self.api_token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    let value: Value = response.json().await.map_err(|e| {
                        CrawlError::InferenceError(format!("Invalid response from {}: {}", model, e))
                    })?;
                    return read_output(&value, output_key).ok_or_else(|| {
                        CrawlError::InferenceError(format!("Response from {} has no '{}'", model, output_key)).into()
                    });
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    last_error = format!("HTTP {}: {}", status, text.chars().take(200).collect::<String>());
                    // model loading and rate limiting are worth another try
                    if status != StatusCode::SERVICE_UNAVAILABLE && status != StatusCode::TOO_MANY_REQUESTS {
                        break;
                    }
                }
                Err(e) => last_error = e.to_string(),
            }

            if attempt + 1 < self.attempts {
                let wait = self.backoff_base * 2u32.saturating_pow(attempt);
                warn!("Inference on {} failed: {}, retrying in {:?}", model, last_error, wait);
                sleep(wait).await;
            }
        }

        Err(CrawlError::InferenceError(format!("{} failed: {}", model, last_error)).into())
    }
}

fn read_output(value: &Value, key: &str) -> Option<String> {
    let item = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    item.get(key).and_then(Value::as_str).map(|s| s.trim().to_string())
}

#[async_trait]
impl Summarizer for HuggingFaceClient {
    async fn summarize(&self, text: &str, length: SummaryLength) -> Result<String> {
        debug!("Summarizing {} chars with {}", text.len(), self.summarization_model);
        let parameters = InferenceParameters {
            max_length: Some(length.max),
            min_length: Some(length.min),
            do_sample: Some(false),
        };
        self.infer(&self.summarization_model, text, parameters, "summary_text").await
    }
}

#[async_trait]
impl Translator for HuggingFaceClient {
    async fn translate(&self, text: &str) -> Result<String> {
        let parameters = InferenceParameters {
            max_length: Some(512),
            ..Default::default()
        };
        self.infer(&self.translation_model, text, parameters, "translation_text").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> HuggingFaceClient {
        let models = ModelConfig {
            inference_url: server.url("/models"),
            summarization_model: "org/summarizer".to_string(),
            translation_model: "org/translator".to_string(),
            ..ModelConfig::default()
        };
        HuggingFaceClient::new(Client::new(), &models, Some("secret".to_string()))
            .with_retries(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_summarize_sends_length_parameters() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/org/summarizer")
                    .header("authorization", "Bearer secret")
                    .json_body_partial(r#"{"parameters": {"max_length": 150, "min_length": 50, "do_sample": false}}"#);
                then.status(200).json_body(json!([{"summary_text": " A short summary. "}]));
            })
            .await;

        let summary = client(&server)
            .summarize("long text", SummaryLength { min: 50, max: 150 })
            .await
            .unwrap();
        assert_eq!(summary, "A short summary.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_translate_reads_translation_text() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/models/org/translator");
                then.status(200).json_body(json!([{"translation_text": "你好"}]));
            })
            .await;

        assert_eq!(client(&server).translate("hello").await.unwrap(), "你好");
    }

    #[tokio::test]
    async fn test_retries_while_model_loads() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/models/org/translator");
                then.status(503).json_body(json!({"error": "Model is loading", "estimated_time": 20.0}));
            })
            .await;

        let err = client(&server).translate("hello").await.unwrap_err();
        assert!(err.to_string().contains("Inference error"));
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/models/org/summarizer");
                then.status(400).body("bad input");
            })
            .await;

        let err = client(&server)
            .summarize("x", SummaryLength { min: 1, max: 5 })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("400"));
        mock.assert_hits_async(1).await;
    }

    #[test]
    fn test_read_output_shapes() {
        assert_eq!(read_output(&json!({"summary_text": "x"}), "summary_text").as_deref(), Some("x"));
        assert!(read_output(&json!([]), "summary_text").is_none());
    }
}
