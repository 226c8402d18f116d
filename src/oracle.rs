use std::time::Duration;

use anyhow::anyhow;
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};

use crate::error::CheckError;

/// Largest chunk of percent-encoded text sent in one oracle query.
pub const MAX_CHUNK_LEN: usize = 16352;

/// Per-request deadline for oracle calls.
pub const ORACLE_TIMEOUT: Duration = Duration::from_secs(20);

pub const DEFAULT_ORACLE_BASE: &str = "https://www.purgomalum.com";

/// Split percent-encoded text into slices of at most `max` bytes, pulling
/// each boundary back to the last `%` in the window so an escape triple is
/// never torn. Input must be percent-encoded (and therefore ASCII).
pub fn encoded_chunks(text: &str, max: usize) -> EncodedChunks<'_> {
    EncodedChunks {
        text,
        max,
        start: 0,
        end: max,
        done: false,
    }
}

pub struct EncodedChunks<'a> {
    text: &'a str,
    max: usize,
    start: usize,
    end: usize,
    done: bool,
}

impl<'a> Iterator for EncodedChunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.done {
            return None;
        }
        if self.end < self.text.len() {
            // A '%' at the window start (or at index 0) is not a usable
            // boundary; the chunk then splits at the full width even if
            // that tears an escape.
            if let Some(offset) = self.text[self.start..self.end].rfind('%') {
                let index = self.start + offset;
                if index > self.start {
                    self.end = index;
                }
            }
            let chunk = &self.text[self.start..self.end];
            self.start = self.end;
            self.end = self.start + self.max;
            return Some(chunk);
        }
        self.done = true;
        Some(&self.text[self.start..self.text.len().min(self.end)])
    }
}

#[derive(Clone)]
pub struct OracleClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl OracleClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// True as soon as any chunk is flagged, an error as soon as any chunk
    /// fails. The first terminal completion wins; dropping the stream
    /// cancels whatever is still in flight.
    pub async fn contains_profanity(&self, words: &str) -> Result<bool, CheckError> {
        let encoded = urlencoding::encode(words);
        let urls: Vec<String> = encoded_chunks(&encoded, MAX_CHUNK_LEN)
            .map(|chunk| {
                format!(
                    "{}/service/containsprofanity?text={}",
                    self.base_url, chunk
                )
            })
            .collect();
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let mut responses = stream::iter(urls.into_iter().map(|url| {
            let http = self.http.clone();
            let timeout = self.timeout;
            async move { http.get(&url).timeout(timeout).send().await }
        }))
        .buffer_unordered(workers);

        while let Some(result) = responses.next().await {
            let response = match result {
                Ok(response) => response,
                Err(e) if e.is_timeout() => return Err(CheckError::UpstreamTimeout),
                Err(e) => {
                    return Err(CheckError::Unexpected(
                        anyhow!(e).context("oracle request failed"),
                    ))
                }
            };
            let status = response.status();
            // Anything but a plain 200 counts as an upstream failure.
            if status != StatusCode::OK {
                return Err(CheckError::UpstreamStatus(status.as_u16()));
            }
            let flagged: bool = match response.json().await {
                Ok(flagged) => flagged,
                Err(e) if e.is_timeout() => return Err(CheckError::UpstreamTimeout),
                Err(e) => {
                    return Err(CheckError::Unexpected(
                        anyhow!(e).context("oracle returned a non-boolean body"),
                    ))
                }
            };
            if flagged {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
