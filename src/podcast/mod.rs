// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod refresh;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::artwork::Artwork;
use crate::episode::Episode;
use crate::resource::Downloadable;

pub use refresh::RefreshOptions;

static NEXT_PODCAST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handle of a podcast, used by episodes to refer to their parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PodcastId(u64);

impl PodcastId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        Self(NEXT_PODCAST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A subscribed show and its episodes, newest-first or in whatever order
/// refreshes produced
#[derive(Debug, Clone, Serialize)]
pub struct Podcast {
    id: PodcastId,
    feed_url: Url,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webmaster: Option<String>,
    /// Time-to-live in minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Cap on episodes kept after each refresh
    pub max_episodes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_build_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refreshed: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    artwork: Option<Artwork>,
    episodes: Vec<Episode>,
}

impl Podcast {
    pub const DEFAULT_MAX_EPISODES: usize = 20;

    pub fn new(feed_url: Url) -> Self {
        Self {
            id: PodcastId::next(),
            title: feed_url.to_string(),
            feed_url,
            link: None,
            author: None,
            generator: None,
            language: None,
            copyright: None,
            editor: None,
            webmaster: None,
            ttl: None,
            description: None,
            max_episodes: Self::DEFAULT_MAX_EPISODES,
            last_build_date: None,
            last_refreshed: None,
            artwork: None,
            episodes: Vec::new(),
        }
    }

    pub fn id(&self) -> PodcastId {
        self.id
    }

    pub fn feed_url(&self) -> &Url {
        &self.feed_url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.trim().to_string();
    }

    pub fn artwork(&self) -> Option<&Artwork> {
        self.artwork.as_ref()
    }

    pub fn artwork_mut(&mut self) -> Option<&mut Artwork> {
        self.artwork.as_mut()
    }

    /// Episodes in display order
    pub fn episodes(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn episodes_mut(&mut self) -> impl Iterator<Item = &mut Episode> {
        self.episodes.iter_mut()
    }

    pub fn episode_count(&self) -> usize {
        self.episodes.len()
    }

    /// Look up an episode by identity token
    pub fn episode(&self, guid: &str) -> Option<&Episode> {
        self.episodes.iter().find(|ep| ep.guid == guid)
    }

    pub fn episode_mut(&mut self, guid: &str) -> Option<&mut Episode> {
        self.episodes.iter_mut().find(|ep| ep.guid == guid)
    }

    /// Remove an episode by identity token, disposing its buffers
    pub fn remove_episode(&mut self, guid: &str) -> Option<Episode> {
        let index = self.episodes.iter().position(|ep| ep.guid == guid)?;
        let mut episode = self.episodes.remove(index);
        episode.dispose_all();
        Some(episode)
    }

    /// Keep only the `count` most recently published episodes.
    ///
    /// Played and downloaded state is not considered. The kept episodes end
    /// up sorted newest first. Returns how many episodes were dropped.
    pub fn shrink_episodes_to_count(&mut self, count: usize) -> usize {
        if self.episodes.len() <= count {
            return 0;
        }

        self.episodes.sort_by(|a, b| b.published.cmp(&a.published));

        let mut removed = 0;
        for mut episode in self.episodes.drain(count..) {
            episode.dispose_all();
            removed += 1;
        }
        removed
    }

    /// Release every buffer owned by this podcast
    pub(crate) fn dispose_all(&mut self) {
        if let Some(artwork) = self.artwork.as_mut() {
            artwork.dispose();
        }
        for episode in &mut self.episodes {
            episode.dispose_all();
        }
    }

    #[cfg(test)]
    pub(crate) fn push_episode(&mut self, episode: Episode) {
        self.episodes.push(episode);
    }
}
