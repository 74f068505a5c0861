pub mod digest;
pub mod inference;
pub mod summarizer;
pub mod text;
pub mod translator;

pub use digest::{ArticleDigest, Bilingual, BilingualList, Digester};
pub use inference::HuggingFaceClient;
pub use summarizer::{ExtractiveSummarizer, Summarizer, SummaryLength};
pub use translator::{translate_content, Translator};
