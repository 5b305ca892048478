use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid crawl URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("failed to fetch {url}: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} is larger than the {limit} byte crawl limit")]
    TooLarge { url: String, limit: u64 },

    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to save crawled page: {0}")]
    Io(#[from] std::io::Error),
}
