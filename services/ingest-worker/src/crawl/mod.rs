mod crawler;
mod error;

pub use crawler::{CrawlWebsite, CrawledPage, Crawler};
pub use error::CrawlError;

/// Hosts whose URLs are handed to the repository collaborator instead of
/// being fetched as a page.
pub const REPOSITORY_HOSTS: &[&str] = &["github.com", "www.github.com"];
