// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod artwork;
pub mod cancel;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod opml;
pub mod podcast;
pub mod progress;
pub mod resource;
pub mod subscriptions;

// Re-export main types for convenience
pub use artwork::Artwork;
pub use cancel::CancelToken;
pub use episode::{Episode, PlaybackState, generate_identity, get_audio_extension, local_file_name};
pub use error::{FeedError, ImportError, ResourceError};
pub use feed::{FeedElement, FeedSource, RssFeedSource};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use opml::{OpmlEntry, read_outlines};
pub use podcast::{Podcast, PodcastId, RefreshOptions};
pub use progress::{
    DownloadProgress, NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter,
};
pub use resource::{Downloadable, Resource};
pub use subscriptions::{
    RefreshFailure, RefreshOutcome, RefreshSummary, SubscriptionChange, Subscriptions,
};
