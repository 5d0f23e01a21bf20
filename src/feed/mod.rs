pub mod extractor;
pub mod fetcher;
pub mod matcher;

pub use extractor::{extract_items, RssItem};
pub use fetcher::FeedFetcher;
pub use matcher::match_keywords;
