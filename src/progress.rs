// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

/// Snapshot of a running download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Expected size in bytes, if the server announced it
    pub total: Option<u64>,
    /// Bytes received so far
    pub received: u64,
}

impl DownloadProgress {
    /// Completion percentage, or `None` when the total size is unknown
    pub fn percent(&self) -> Option<u8> {
        match self.total {
            Some(0) => Some(100),
            Some(total) => Some((self.received.min(total) * 100 / total) as u8),
            None => None,
        }
    }
}

/// Events emitted while refreshing subscriptions and downloading resources
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A feed is being read from its source
    RefreshingFeed { url: String },

    /// A feed was merged into its podcast
    FeedRefreshed {
        podcast_title: String,
        new_episodes: usize,
        total_episodes: usize,
    },

    /// A feed could not be refreshed
    RefreshFailed {
        url: String,
        error: String,
        /// Failure was classified as the host being unresolvable
        offline: bool,
    },

    /// A resource download is starting
    DownloadStarting {
        url: String,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        url: String,
        progress: DownloadProgress,
    },

    /// A resource download completed successfully
    DownloadCompleted { url: String, bytes_downloaded: u64 },

    /// A resource download was cancelled; nothing was kept
    DownloadCancelled { url: String },

    /// An OPML outline entry is being imported
    ImportingEntry { title: String },
}

/// Sink for progress events.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
