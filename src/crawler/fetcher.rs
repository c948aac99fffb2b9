//! HTTP renderer implementation
//!
//! A [`Renderer`] for static documentation sites. It handles:
//! - Building HTTP clients with the configured user agent
//! - GET requests with redirect following
//! - Content-Type checks
//! - Error classification into [`RenderError`]
//! - Handing the body to the HTML parser

use crate::config::RendererConfig;
use crate::crawler::parser::parse_html;
use crate::crawler::renderer::{RenderError, RenderSession, RenderedPage, Renderer};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The renderer configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```
/// use docsweep::config::RendererConfig;
/// use docsweep::crawler::build_http_client;
///
/// let client = build_http_client(&RendererConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &RendererConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Renders pages by fetching them over HTTP and parsing the HTML
///
/// Each session gets its own client, so connection state from a failed
/// attempt is never carried into the next one.
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    config: RendererConfig,
}

impl HttpRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn initialize(&self) -> Result<(), RenderError> {
        build_http_client(&self.config)
            .map(|_| ())
            .map_err(|e| RenderError::Initialization(e.to_string()))
    }

    async fn new_session(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        let client = build_http_client(&self.config)
            .map_err(|e| RenderError::Initialization(e.to_string()))?;
        Ok(Box::new(HttpSession { client }))
    }
}

struct HttpSession {
    client: Client,
}

#[async_trait]
impl RenderSession for HttpSession {
    async fn fetch_and_render(&mut self, url: &str) -> Result<RenderedPage, RenderError> {
        let body = fetch_html(&self.client, url).await?;
        let base_url = Url::parse(&body.final_url)
            .or_else(|_| Url::parse(url))
            .map_err(|e| RenderError::Extraction(format!("Invalid page URL {}: {}", url, e)))?;

        let parsed = parse_html(&body.html, &base_url).map_err(RenderError::Extraction)?;

        Ok(RenderedPage {
            title: parsed.title.unwrap_or_else(|| url.to_string()),
            content: parsed.content,
            links: parsed.links,
        })
    }

    async fn close(self: Box<Self>) {}
}

/// An HTML response body
#[derive(Debug)]
pub struct FetchedHtml {
    /// Final URL after redirects
    pub final_url: String,
    pub html: String,
}

/// Fetches a URL and returns its HTML body
///
/// # Error Classification
///
/// | Condition | Error |
/// |-----------|-------|
/// | Non-2xx status | `Http { status }` (retryable for 429 and 5xx) |
/// | Content-Type not HTML | `ContentMismatch` |
/// | Timeout | `Timeout` |
/// | Connection failure, body read failure | `Network` |
pub async fn fetch_html(client: &Client, url: &str) -> Result<FetchedHtml, RenderError> {
    let response = client.get(url).send().await.map_err(classify_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(RenderError::Http {
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !is_html(&content_type) {
        return Err(RenderError::ContentMismatch(content_type));
    }

    let final_url = response.url().to_string();
    let html = response.text().await.map_err(classify_error)?;

    Ok(FetchedHtml { final_url, html })
}

/// A missing Content-Type is given the benefit of the doubt
fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || mime == "text/html" || mime == "application/xhtml+xml"
}

fn classify_error(e: reqwest::Error) -> RenderError {
    if e.is_timeout() {
        RenderError::Timeout
    } else if e.is_connect() {
        RenderError::Network(format!("Connection failed: {}", e))
    } else if e.is_redirect() {
        RenderError::Network(format!("Redirect error: {}", e))
    } else {
        RenderError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let config = RendererConfig {
            user_agent: "TestCrawler/1.0".to_string(),
        };
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_is_html() {
        assert!(is_html("text/html"));
        assert!(is_html("text/html; charset=utf-8"));
        assert!(is_html("TEXT/HTML"));
        assert!(is_html("application/xhtml+xml"));
        assert!(is_html(""));
        assert!(!is_html("application/pdf"));
        assert!(!is_html("application/json"));
    }

    #[tokio::test]
    async fn test_initialize() {
        let renderer = HttpRenderer::new(RendererConfig::default());
        assert!(renderer.initialize().await.is_ok());
        assert!(renderer.new_session().await.is_ok());
    }
}
