use anyhow::{bail, Result};
use reqwest::{header, Client};
use std::time::Duration;
use url::Url;

/// Largest body accepted from a page.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Missing content type is treated as HTML.
    pub fn is_html(&self) -> bool {
        self.content_type.as_deref().map_or(true, |ct| ct.starts_with("text/html"))
    }
}

/// Transport used for both `robots.txt` and pages. An `Err` means no response was received.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse>;
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse> {
        (**self).fetch(url).await
    }
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse> {
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await?;
        if bytes.len() > MAX_BODY_BYTES {
            bail!("{url}: body of {} bytes exceeds limit", bytes.len());
        }
        let body = String::from_utf8_lossy(&bytes).into_owned();
        Ok(FetchResponse { status, content_type, body })
    }
}
