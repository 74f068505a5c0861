use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{CrawlError, Result};
use crate::nlp::inference::HuggingFaceClient;
use crate::nlp::summarizer::{ExtractiveSummarizer, Summarizer, SummaryLength};
use crate::nlp::text::{char_chunks, clean_whitespace, word_count, SUMMARY_CHUNK_CHARS};
use crate::nlp::translator::{translate_content, Translator};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bilingual {
    pub en: String,
    pub zh: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BilingualList {
    pub en: Vec<String>,
    pub zh: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDigest {
    pub summary: Bilingual,
    pub key_points: BilingualList,
}

/// Turns article text into a bilingual summary plus key points.
pub struct Digester {
    summarizer: Arc<dyn Summarizer>,
    translator: Option<Arc<dyn Translator>>,
    min_words: usize,
}

impl Digester {
    pub fn new(summarizer: Arc<dyn Summarizer>, translator: Option<Arc<dyn Translator>>, min_words: usize) -> Self {
        Self {
            summarizer,
            translator,
            min_words,
        }
    }

    /// Backends as selected by `[models]`.
    pub fn from_config(config: &Config, client: Client) -> Result<Self> {
        let models = &config.models;
        let token = config.api_token();
        if token.is_none() && (models.summarizer == "huggingface" || models.translator == "huggingface") {
            info!("{} is not set, calling the inference API anonymously", models.api_token_env);
        }
        let hosted = Arc::new(HuggingFaceClient::new(client, models, token));

        let summarizer: Arc<dyn Summarizer> = match models.summarizer.as_str() {
            "extractive" => Arc::new(ExtractiveSummarizer::new()),
            "huggingface" => hosted.clone(),
            other => return Err(CrawlError::ConfigError(format!("Unknown summarizer '{}'", other)).into()),
        };
        let translator: Option<Arc<dyn Translator>> = match models.translator.as_str() {
            "huggingface" => Some(hosted),
            "none" => None,
            other => return Err(CrawlError::ConfigError(format!("Unknown translator '{}'", other)).into()),
        };

        Ok(Self::new(summarizer, translator, config.crawl.min_words))
    }

    /// `None` when the content is too short to be worth summarizing.
    pub async fn summarize_content(&self, content: &str) -> Result<Option<ArticleDigest>> {
        let text = clean_whitespace(content);
        let words = word_count(&text);
        if words == 0 || words < self.min_words {
            debug!("Skipping content with {} words", words);
            return Ok(None);
        }

        let chunks = char_chunks(&text, SUMMARY_CHUNK_CHARS);
        let head = chunks.first().map(String::as_str).unwrap_or_default();
        let Some(length) = SummaryLength::for_input(head.chars().count(), 150, 10, 50, 10) else {
            return Ok(None);
        };
        let summary_en = self.summarizer.summarize(head, length).await?;

        let mut key_points_en = Vec::new();
        for chunk in &chunks {
            let Some(length) = SummaryLength::for_input(chunk.chars().count(), 50, 5, 20, 5) else {
                debug!("Skipping {} char tail chunk", chunk.chars().count());
                continue;
            };
            let point = self.summarizer.summarize(chunk, length).await?;
            if !point.is_empty() {
                key_points_en.push(point);
            }
        }

        let (summary_zh, key_points_zh) = match &self.translator {
            Some(translator) => {
                let summary_zh = translate_content(translator.as_ref(), &summary_en)
                    .await
                    .unwrap_or_default();
                let mut points = Vec::with_capacity(key_points_en.len());
                for point in &key_points_en {
                    points.push(translate_content(translator.as_ref(), point).await.unwrap_or_default());
                }
                (summary_zh, points)
            }
            None => (String::new(), Vec::new()),
        };

        Ok(Some(ArticleDigest {
            summary: Bilingual {
                en: summary_en,
                zh: summary_zh,
            },
            key_points: BilingualList {
                en: key_points_en,
                zh: key_points_zh,
            },
        }))
    }
}
