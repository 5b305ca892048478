use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Client;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use super::{CrawlError, REPOSITORY_HOSTS};

const USER_AGENT: &str = concat!("brain-intake-worker/", env!("CARGO_PKG_VERSION"));
const MAX_SLUG_LEN: usize = 120;

/// A crawl target parsed from a job payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlWebsite {
    url: Url,
}

impl CrawlWebsite {
    pub fn parse(raw: &str) -> Result<Self, CrawlError> {
        let url = Url::parse(raw.trim()).map_err(|err| CrawlError::InvalidUrl {
            url: raw.to_string(),
            reason: err.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(CrawlError::UnsupportedScheme(other.to_string())),
        }
        if url.host_str().is_none() {
            return Err(CrawlError::InvalidUrl {
                url: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn is_repository_host(&self) -> bool {
        self.url
            .host_str()
            .map(|host| {
                REPOSITORY_HOSTS
                    .iter()
                    .any(|candidate| host.eq_ignore_ascii_case(candidate))
            })
            .unwrap_or(false)
    }

    /// `<slug>.html`, the slug being the URL without its scheme, lowercased,
    /// with every run of non-alphanumeric characters collapsed to `-`.
    pub fn file_name(&self) -> String {
        let without_scheme = &self.url.as_str()[self.url.scheme().len()..];

        let mut slug = String::with_capacity(without_scheme.len());
        for ch in without_scheme.chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch.to_ascii_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }

        let mut slug = slug.trim_end_matches('-').to_string();
        if slug.len() > MAX_SLUG_LEN {
            slug.truncate(MAX_SLUG_LEN);
            slug = slug.trim_end_matches('-').to_string();
        }
        if slug.is_empty() {
            slug.push_str("page");
        }

        format!("{slug}.html")
    }
}

impl fmt::Display for CrawlWebsite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// A fetched page saved to disk. The backing directory is removed on drop.
#[derive(Debug)]
pub struct CrawledPage {
    _dir: TempDir,
    path: PathBuf,
    file_name: String,
}

impl CrawledPage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub async fn read(&self) -> Result<Bytes, CrawlError> {
        Ok(Bytes::from(tokio::fs::read(&self.path).await?))
    }
}

/// Fetches a single page and stores its body verbatim, refusing bodies larger
/// than `max_bytes`.
#[derive(Clone)]
pub struct Crawler {
    http_client: Client,
    max_bytes: u64,
}

impl Crawler {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self, CrawlError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|err| CrawlError::Request {
                url: String::new(),
                reason: format!("failed to build HTTP client: {err}"),
            })?;

        Ok(Self {
            http_client,
            max_bytes,
        })
    }

    pub async fn fetch(&self, site: &CrawlWebsite) -> Result<CrawledPage, CrawlError> {
        let url = site.as_str();
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|err| CrawlError::Request {
                url: url.to_string(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                warn!(url, length, max_bytes = self.max_bytes, "page too large to crawl");
                return Err(CrawlError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_bytes,
                });
            }
        }

        let dir = TempDir::new()?;
        let file_name = site.file_name();
        let path = dir.path().join(&file_name);
        let mut file = tokio::fs::File::create(&path).await?;

        // Content-Length may be absent or wrong; count what actually arrives.
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| CrawlError::Request {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                warn!(url, max_bytes = self.max_bytes, "page body exceeded crawl limit");
                return Err(CrawlError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        debug!(path = %path.display(), "crawled page saved");
        info!(url, bytes = written, file_name = %file_name, "page crawled");

        Ok(CrawledPage {
            _dir: dir,
            path,
            file_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn repository_hosts_are_detected() {
        let repo = CrawlWebsite::parse("https://github.com/acme/widgets").unwrap();
        assert!(repo.is_repository_host());
        let www = CrawlWebsite::parse("https://WWW.GitHub.com/acme/widgets").unwrap();
        assert!(www.is_repository_host());

        let page = CrawlWebsite::parse("https://docs.github.community/intro").unwrap();
        assert!(!page.is_repository_host());
        let lookalike = CrawlWebsite::parse("https://github.com.evil.example/x").unwrap();
        assert!(!lookalike.is_repository_host());
    }

    #[test]
    fn file_name_is_a_slug_of_the_url() {
        let site = CrawlWebsite::parse("https://Example.com/Docs/Getting Started?page=2").unwrap();
        assert_eq!(
            site.file_name(),
            "example-com-docs-getting-20started-page-2.html"
        );

        let root = CrawlWebsite::parse("https://example.com/").unwrap();
        assert_eq!(root.file_name(), "example-com.html");
    }

    #[test]
    fn non_http_targets_are_refused() {
        assert!(matches!(
            CrawlWebsite::parse("ftp://example.com/file"),
            Err(CrawlError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            CrawlWebsite::parse("not a url"),
            Err(CrawlError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn fetch_saves_the_body_to_a_temporary_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs/intro"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Intro</h1>"))
            .mount(&server)
            .await;

        let crawler = Crawler::new(Duration::from_secs(5), 1024).unwrap();
        let site = CrawlWebsite::parse(&format!("{}/docs/intro", server.uri())).unwrap();
        let page = crawler.fetch(&site).await.unwrap();

        assert!(page.file_name().ends_with("-docs-intro.html"));
        assert!(page.path().exists());
        assert_eq!(page.read().await.unwrap(), Bytes::from_static(b"<h1>Intro</h1>"));

        let saved = page.path().to_path_buf();
        drop(page);
        assert!(!saved.exists());
    }

    #[tokio::test]
    async fn fetch_surfaces_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let crawler = Crawler::new(Duration::from_secs(5), 1024).unwrap();
        let site = CrawlWebsite::parse(&format!("{}/missing", server.uri())).unwrap();

        assert!(matches!(
            crawler.fetch(&site).await,
            Err(CrawlError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn fetch_refuses_pages_over_the_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 4096]))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fits"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 1024]))
            .mount(&server)
            .await;

        let crawler = Crawler::new(Duration::from_secs(5), 1024).unwrap();

        let big = CrawlWebsite::parse(&format!("{}/big", server.uri())).unwrap();
        assert!(matches!(
            crawler.fetch(&big).await,
            Err(CrawlError::TooLarge { limit: 1024, .. })
        ));

        let fits = CrawlWebsite::parse(&format!("{}/fits", server.uri())).unwrap();
        let page = crawler.fetch(&fits).await.unwrap();
        assert_eq!(page.read().await.unwrap().len(), 1024);
    }
}
