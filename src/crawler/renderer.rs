//! Renderer interface
//!
//! A renderer turns a URL into a title, the page's text content, and the
//! links found on it. The scheduler opens a fresh session for every attempt
//! so a session broken by one failure is never reused.

use async_trait::async_trait;
use thiserror::Error;

/// A rendered page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedPage {
    pub title: String,
    pub content: String,

    /// Absolute URLs discovered on the page
    pub links: Vec<String>,
}

/// Errors a renderer can report
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// The renderer cannot run at all; aborts the crawl
    #[error("Renderer initialization failed: {0}")]
    Initialization(String),

    #[error("Page load timed out")]
    Timeout,

    /// The rendering session went away mid-page
    #[error("Session detached: {0}")]
    SessionDetached(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}")]
    Http { status: u16 },

    /// The response is not an HTML document
    #[error("Not an HTML page: {0}")]
    ContentMismatch(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),
}

impl RenderError {
    /// Whether the whole crawl must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Initialization(_))
    }

    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::SessionDetached(_) | Self::Network(_) => true,
            Self::Http { status } => *status == 429 || (500..600).contains(status),
            Self::Initialization(_) | Self::ContentMismatch(_) | Self::Extraction(_) => false,
        }
    }

    /// Session failures get a longer backoff before the next attempt
    pub fn is_session_error(&self) -> bool {
        matches!(self, Self::SessionDetached(_))
    }
}

/// Produces rendering sessions
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Prepares the renderer; called once before any page is claimed
    async fn initialize(&self) -> Result<(), RenderError>;

    /// Opens a fresh session for a single attempt
    async fn new_session(&self) -> Result<Box<dyn RenderSession>, RenderError>;
}

/// One rendering session, used for exactly one attempt
#[async_trait]
pub trait RenderSession: Send {
    async fn fetch_and_render(&mut self, url: &str) -> Result<RenderedPage, RenderError>;

    /// Releases the session's resources
    async fn close(self: Box<Self>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_initialization_is_fatal() {
        assert!(RenderError::Initialization("no browser".into()).is_fatal());
        assert!(!RenderError::Timeout.is_fatal());
        assert!(!RenderError::Http { status: 500 }.is_fatal());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(RenderError::Timeout.is_retryable());
        assert!(RenderError::SessionDetached("frame".into()).is_retryable());
        assert!(RenderError::Network("reset".into()).is_retryable());
        assert!(RenderError::Http { status: 503 }.is_retryable());
        assert!(RenderError::Http { status: 429 }.is_retryable());

        assert!(!RenderError::Http { status: 404 }.is_retryable());
        assert!(!RenderError::ContentMismatch("application/pdf".into()).is_retryable());
        assert!(!RenderError::Initialization("x".into()).is_retryable());
    }

    #[test]
    fn test_session_error() {
        assert!(RenderError::SessionDetached("frame".into()).is_session_error());
        assert!(!RenderError::Timeout.is_session_error());
    }
}
