use std::collections::HashSet;
use std::time::Duration;

use anyhow::anyhow;
use bytes::Bytes;
use reqwest::{redirect::Policy, Client};
use scraper::Html;
use url::Url;

use crate::error::CheckError;

/// User agent sent with every page fetch.
pub const PAGE_USER_AGENT: &str = "Magic Browser";

#[derive(Clone)]
pub struct PageClient {
    http: Client,
}

impl PageClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .user_agent(PAGE_USER_AGENT)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .redirect(Policy::limited(8))
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap();

        Self { http }
    }

    /// Fetch the page body. Only a failed DNS lookup counts as the caller's
    /// fault; every other transport failure bubbles up unchanged.
    pub async fn fetch(&self, url: &Url) -> Result<Bytes, CheckError> {
        let response = self.http.get(url.clone()).send().await.map_err(|e| {
            if is_dns_failure(&e) {
                CheckError::UnresolvableHost
            } else {
                CheckError::Unexpected(anyhow!(e).context("page fetch failed"))
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(CheckError::Unexpected(anyhow!(
                "page fetch returned status {status}"
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| CheckError::Unexpected(anyhow!(e).context("page body read failed")))?;
        Ok(body)
    }
}

impl Default for PageClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Hyper wraps resolver failures in connect errors; walk the source chain
/// and match on the dns error text, the same way the service always has.
fn is_dns_failure(error: &reqwest::Error) -> bool {
    if !error.is_connect() {
        return false;
    }
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        let text = cause.to_string();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Collapse a page into the words worth checking: every text node is split
/// on whitespace, single-character tokens dropped, the rest lowercased and
/// deduplicated, then joined with single spaces in arbitrary order.
pub fn unique_words(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut words: HashSet<String> = HashSet::new();
    for text in document.root_element().text() {
        for word in text.split_whitespace() {
            if word.chars().count() > 1 {
                words.insert(word.to_lowercase());
            }
        }
    }
    words.into_iter().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted_tokens(html: &str) -> Vec<String> {
        let joined = unique_words(html);
        let mut tokens: Vec<String> = joined.split_whitespace().map(str::to_string).collect();
        tokens.sort_unstable();
        tokens
    }

    #[test]
    fn repeated_words_collapse_case_insensitively() {
        let html = "<html><body><p>Rust RUST rust is is great</p></body></html>";
        assert_eq!(sorted_tokens(html), vec!["great", "is", "rust"]);
    }

    #[test]
    fn single_character_tokens_are_dropped() {
        assert_eq!(sorted_tokens("<p>a b xy z 9</p>"), vec!["xy"]);
    }

    #[test]
    fn text_spans_nested_elements() {
        assert_eq!(
            sorted_tokens("<div>Hello <b>World</b> again</div>"),
            vec!["again", "hello", "world"]
        );
    }

    #[test]
    fn empty_document_yields_empty_text() {
        assert_eq!(unique_words(""), "");
    }

    #[test]
    fn malformed_html_degrades_gracefully() {
        assert_eq!(
            sorted_tokens("<p>broken <b>markup"),
            vec!["broken", "markup"]
        );
    }
}
