//! Plain-text helpers shared by summarization and translation.

pub const SUMMARY_CHUNK_CHARS: usize = 1024;
pub const TRANSLATION_CHUNK_CHARS: usize = 200;

/// Collapse every run of whitespace (newlines included) into one space.
pub fn clean_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split after `.`, `!` or `?` when followed by whitespace. Empty pieces are dropped.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|next| next.is_whitespace()) {
            while chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
            push_trimmed(&mut sentences, &current);
            current.clear();
        }
    }
    push_trimmed(&mut sentences, &current);

    sentences
}

fn push_trimmed(sentences: &mut Vec<String>, sentence: &str) {
    let sentence = sentence.trim();
    if !sentence.is_empty() {
        sentences.push(sentence.to_string());
    }
}

/// Group sentences into space-joined chunks whose summed sentence lengths stay
/// within `max_chars`. A single longer sentence becomes its own chunk.
pub fn chunk_sentences(sentences: &[String], max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for sentence in sentences {
        let len = sentence.chars().count();
        if current_len + len > max_chars {
            if !current.is_empty() {
                chunks.push(current.join(" "));
            }
            current = vec![sentence.as_str()];
            current_len = len;
        } else {
            current.push(sentence.as_str());
            current_len += len;
        }
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

/// Fixed-size character windows over `text`.
pub fn char_chunks(text: &str, size: usize) -> Vec<String> {
    if size == 0 {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|chunk| chunk.iter().collect()).collect()
}
