// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::error::Error as _;
use std::path::PathBuf;

use thiserror::Error;

/// Fragments that transports use when a host name cannot be resolved
const UNRESOLVED_ADDRESS_MARKERS: [&str; 5] = [
    "dns error",
    "failed to lookup address",
    "name or service not known",
    "no such host",
    "name resolution",
];

/// Errors that can occur when fetching or reading a podcast feed
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for feed {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Feed source {url} is unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse RSS feed: {0}")]
    ParseFailed(#[from] rss::Error),

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to parse date '{date_str}': {reason}")]
    InvalidDate { date_str: String, reason: String },
}

impl FeedError {
    /// Whether this failure means the feed host could not be resolved,
    /// which callers treat as being offline
    pub fn is_unresolved_address(&self) -> bool {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);

        while let Some(err) = current {
            let message = err.to_string().to_lowercase();
            if UNRESOLVED_ADDRESS_MARKERS
                .iter()
                .any(|marker| message.contains(marker))
            {
                return true;
            }
            current = err.source();
        }

        false
    }
}

/// Errors raised by a downloadable resource (episode media or artwork)
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Resource has been disposed or was never downloaded")]
    Disposed,

    #[error("Resource has no source URL")]
    NoSource,

    #[error("Supplied stream could not be read: {0}")]
    StreamUnreadable(#[source] std::io::Error),

    #[error("HTTP request failed for {url}: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Download of {url} was cancelled")]
    Cancelled { url: String },
}

/// Errors that can occur while importing an OPML subscription list
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to read OPML file {path}: {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed OPML document: {0}")]
    Xml(#[from] quick_xml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable(message: &str) -> FeedError {
        FeedError::Unreachable {
            url: "https://feeds.example.invalid/rss".to_string(),
            source: std::io::Error::other(message.to_string()),
        }
    }

    #[test]
    fn dns_failures_are_classified_as_unresolved() {
        let err = unreachable("dns error: failed to lookup address information");
        assert!(err.is_unresolved_address());

        let err = unreachable("Name or service not known");
        assert!(err.is_unresolved_address());
    }

    #[test]
    fn other_failures_are_not_classified_as_unresolved() {
        assert!(!unreachable("connection refused").is_unresolved_address());

        let status = FeedError::HttpStatus {
            url: "https://example.com/feed.xml".to_string(),
            status: 500,
        };
        assert!(!status.is_unresolved_address());
    }

    #[test]
    fn resource_errors_render_urls() {
        let err = ResourceError::HttpStatus {
            url: "https://example.com/ep.mp3".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "HTTP error 404 for https://example.com/ep.mp3");
    }
}
