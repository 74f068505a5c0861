pub mod api_parser;
pub mod article;
pub mod feed_parser;
pub mod html_parser;

pub use api_parser::ApiParser;
pub use article::*;
pub use feed_parser::FeedParser;
pub use html_parser::{html_to_text, ListingParser};
