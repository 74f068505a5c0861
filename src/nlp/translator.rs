use async_trait::async_trait;
use tracing::{error, info};

use crate::error::Result;
use crate::nlp::text::{chunk_sentences, split_into_sentences, TRANSLATION_CHUNK_CHARS};

/// English to Chinese translation backend.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String>;
}

/// Translate long text in sentence chunks. A chunk that fails is replaced by
/// a `[Translation Error for chunk N]` marker so the rest still comes through.
/// Returns `None` for blank input.
pub async fn translate_content(translator: &dyn Translator, content: &str) -> Option<String> {
    let content = content.trim();
    if content.is_empty() {
        return None;
    }

    let chunks = chunk_sentences(&split_into_sentences(content), TRANSLATION_CHUNK_CHARS);
    let mut translated = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        info!("Translating chunk {}/{} ({} chars)", i + 1, chunks.len(), chunk.chars().count());
        match translator.translate(chunk).await {
            Ok(text) => translated.push(text),
            Err(e) => {
                error!("Error translating chunk {}: {}", i + 1, e);
                translated.push(format!("[Translation Error for chunk {}]", i + 1));
            }
        }
    }

    Some(translated.join(" "))
}
