use async_trait::async_trait;
use log::debug;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};

use crate::config::Settings;
use crate::error::FetchError;

/// Result of a (possibly conditional) source download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Server answered 304 for the validator we sent.
    NotModified,
    Fetched { body: String, etag: Option<String> },
}

/// Downloads filter list text.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch `url`; when `etag` is given the request is conditional.
    async fn fetch(&self, url: &str, etag: Option<&str>) -> Result<FetchOutcome, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, etag: Option<&str>) -> Result<FetchOutcome, FetchError> {
        let mut request = self.client.get(url);
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!("GET {} -> {}", url, status);

        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(FetchOutcome::Fetched { body, etag })
    }
}
