//! Fetching and extracting readable text from web pages.
//!
//! The `read` command turns a URL into speakable prose: fetch the page,
//! parse the HTML, and keep only the heading and paragraph text. Navigation,
//! scripts, and everything else on the page is ignored.

use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::SourceError;

/// Elements whose text is worth speaking, in document order.
const READABLE_SELECTOR: &str = "h1, h2, h3, p";

/// Default request timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches web pages and extracts their readable text.
///
/// ## Examples
///
/// ```no_run
/// use tts_lib::PageSource;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let source = PageSource::new();
/// let text = source.fetch_readable("https://example.com/article").await?;
/// println!("{text}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct PageSource {
    client: reqwest::Client,
}

impl PageSource {
    /// Creates a page source with the default HTTP client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Creates a page source around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetches `url` and returns its readable text.
    ///
    /// ## Errors
    ///
    /// - [`SourceError::InvalidUrl`] when the URL does not parse or is not
    ///   `http`/`https`
    /// - [`SourceError::Request`] when the request itself fails
    /// - [`SourceError::Status`] on a non-success response
    /// - [`SourceError::NoReadableContent`] when the page has no heading or
    ///   paragraph text
    pub async fn fetch_readable(&self, url: &str) -> Result<String, SourceError> {
        let url = parse_http_url(url)?;
        debug!(url = %url, "fetching page");

        let response = self
            .client
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .header(
                reqwest::header::USER_AGENT,
                concat!("tts/", env!("CARGO_PKG_VERSION")),
            )
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let text = extract_readable(&body);
        if text.is_empty() {
            return Err(SourceError::NoReadableContent);
        }
        debug!(chars = text.len(), "extracted readable text");
        Ok(text)
    }
}

/// Parses a URL, requiring an HTTP or HTTPS scheme.
fn parse_http_url(raw: &str) -> Result<Url, SourceError> {
    let url = Url::parse(raw).map_err(|_| SourceError::InvalidUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(SourceError::InvalidUrl(raw.to_string())),
    }
}

/// Extracts heading and paragraph text from an HTML document.
///
/// Each element's text is whitespace-normalized; elements are joined with
/// blank lines so the synthesizer pauses between blocks. Empty elements are
/// skipped.
fn extract_readable(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = Selector::parse(READABLE_SELECTOR).expect("readable selector is valid");

    let blocks: Vec<String> = document
        .select(&selector)
        .filter_map(|element| {
            let text = element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if text.is_empty() { None } else { Some(text) }
        })
        .collect();

    blocks.join("\n\n")
}
