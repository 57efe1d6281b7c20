// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod filename;
mod identity;
mod merge;
mod playback;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::artwork::Artwork;
use crate::podcast::PodcastId;
use crate::resource::{Downloadable, Resource};

pub use filename::{get_audio_extension, local_file_name};
pub use identity::generate_identity;
pub(crate) use merge::{episode_from_item, is_duplicate, item_key};
pub use merge::{AUDIO_MPEG, PLACEHOLDER_MEDIA_URL, normalize_title, select_media_link};
pub use playback::PlaybackState;

/// One entry of a podcast feed together with its local playback and
/// download state
#[derive(Debug, Clone, Serialize)]
pub struct Episode {
    podcast: PodcastId,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub published: DateTime<Utc>,
    pub media_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Length declared by the selected media link
    pub duration: Duration,
    /// `itunes:duration`, informational only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_hint: Option<Duration>,
    playback: PlaybackState,
    /// Locally unique identity token
    pub guid: String,
    /// GUID as published by the feed, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_file: Option<String>,
    downloaded: bool,
    pub pending_download: bool,
    pub active: bool,
    artwork: Artwork,
    unique_artwork: bool,
    #[serde(skip)]
    media: Resource,
}

impl Episode {
    pub fn new(podcast: PodcastId, title: &str, published: DateTime<Utc>) -> Self {
        Self {
            podcast,
            title: normalize_title(title),
            description: None,
            published,
            media_url: PLACEHOLDER_MEDIA_URL.to_string(),
            media_type: None,
            duration: Duration::ZERO,
            duration_hint: None,
            playback: PlaybackState::NotStarted,
            guid: String::new(),
            feed_guid: None,
            local_file: None,
            downloaded: false,
            pending_download: false,
            active: false,
            artwork: Artwork::default(),
            unique_artwork: false,
            media: Resource::new(),
        }
    }

    /// Podcast this episode belongs to
    pub fn podcast_id(&self) -> PodcastId {
        self.podcast
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = normalize_title(title);
    }

    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    pub fn is_played(&self) -> bool {
        self.playback.is_completed()
    }

    /// Marking as played jumps to the end; un-marking a played episode
    /// resets it to not started
    pub fn set_played(&mut self, played: bool) {
        if played {
            self.playback = PlaybackState::Completed;
        } else if self.playback.is_completed() {
            self.playback = PlaybackState::NotStarted;
        }
    }

    /// Playback position; `None` when never started
    pub fn position(&self) -> Option<Duration> {
        self.playback.position(self.duration)
    }

    pub fn set_position(&mut self, position: Duration) {
        self.playback = PlaybackState::at(position, self.duration);
    }

    /// Whether the media was stored locally
    pub fn downloaded(&self) -> bool {
        self.downloaded
    }

    /// Local storage path or token of the media file
    pub fn local_file(&self) -> Option<&str> {
        self.local_file.as_deref()
    }

    /// Record that the media now lives at `local_file`
    pub fn mark_downloaded(&mut self, local_file: impl Into<String>) {
        self.local_file = Some(local_file.into());
        self.downloaded = true;
        self.pending_download = false;
    }

    /// Forget the local copy, e.g. after it was evicted
    pub fn clear_download(&mut self) {
        self.local_file = None;
        self.downloaded = false;
        self.media.clear();
    }

    pub fn artwork(&self) -> &Artwork {
        &self.artwork
    }

    pub fn artwork_mut(&mut self) -> &mut Artwork {
        &mut self.artwork
    }

    /// Whether the artwork came from the episode itself rather than the podcast
    pub fn has_unique_artwork(&self) -> bool {
        self.unique_artwork
    }

    pub fn set_artwork(&mut self, artwork: Artwork, unique: bool) {
        self.artwork.dispose();
        self.artwork = artwork;
        self.unique_artwork = unique;
    }

    pub fn has_identity(&self) -> bool {
        !self.guid.trim().is_empty()
    }

    /// Replace the identity token with a freshly generated one
    pub fn assign_identity(&mut self) {
        self.guid = generate_identity();
    }

    /// Release media and artwork bytes for good
    pub(crate) fn dispose_all(&mut self) {
        self.media.dispose();
        self.artwork.dispose();
    }
}

impl Downloadable for Episode {
    fn source_url(&self) -> &str {
        &self.media_url
    }

    fn resource(&self) -> &Resource {
        &self.media
    }

    fn resource_mut(&mut self) -> &mut Resource {
        &mut self.media
    }
}
