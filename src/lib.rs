pub mod browser;
pub mod config;
pub mod crawlers;
pub mod error;
pub mod fetcher;
pub mod manifest;
pub mod nlp;
pub mod parser;
pub mod processor;
pub mod sources;
pub mod storage;

pub use config::Config;
pub use error::{CrawlError, Result};
pub use manifest::Manifest;
pub use processor::SiteProcessor;
pub use storage::{DigestReport, ReportWriter};
