// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::artwork::{Artwork, episode_artwork};
use crate::feed::{FeedItem, FeedLink, UNKNOWN_DATE, parse_duration, parse_feed_date_or_unknown};
use crate::podcast::PodcastId;

use super::Episode;

/// Media URL used when an item carries no usable link
pub const PLACEHOLDER_MEDIA_URL: &str = "https://localhost/missing-enclosure.mp3";

/// Media type accepted when no link is marked as enclosure
pub const AUDIO_MPEG: &str = "audio/mpeg";

/// Decode stray HTML entities and trim surrounding whitespace
pub fn normalize_title(title: &str) -> String {
    html_escape::decode_html_entities(title).trim().to_string()
}

/// The enclosure link if present, otherwise the first `audio/mpeg` link
pub fn select_media_link(links: &[FeedLink]) -> Option<&FeedLink> {
    links
        .iter()
        .find(|link| link.is_enclosure())
        .or_else(|| links.iter().find(|link| link.has_media_type(AUDIO_MPEG)))
}

/// Normalised title and publish date, the pair episodes are deduplicated on
pub(crate) fn item_key(item: &FeedItem) -> (String, DateTime<Utc>) {
    let title = normalize_title(item.title.as_deref().unwrap_or_default());
    let published = item
        .pub_date
        .as_deref()
        .map(parse_feed_date_or_unknown)
        .unwrap_or(UNKNOWN_DATE);
    (title, published)
}

/// Whether an episode with the same title (ignoring case) and publish date exists
pub(crate) fn is_duplicate(episodes: &[Episode], title: &str, published: DateTime<Utc>) -> bool {
    let title = title.to_lowercase();
    episodes
        .iter()
        .any(|ep| ep.published == published && ep.title.to_lowercase() == title)
}

/// Build a new episode from a feed item, identity assigned last
pub(crate) fn episode_from_item(
    item: &FeedItem,
    podcast: PodcastId,
    podcast_artwork: Option<&Artwork>,
    use_episode_artwork: bool,
) -> Episode {
    let (title, published) = item_key(item);
    let mut episode = Episode::new(podcast, &title, published);

    episode.description = item.description.clone();
    episode.feed_guid = item.guid.clone();
    episode.duration_hint = item.duration.as_deref().and_then(parse_duration);

    match select_media_link(&item.links) {
        Some(link) => {
            episode.media_url = link.url.trim().to_string();
            episode.media_type = link.media_type.clone();
            episode.duration = Duration::from_secs(link.length.unwrap_or(0));
        }
        None => episode.media_url = PLACEHOLDER_MEDIA_URL.to_string(),
    }

    let (artwork, unique) = episode_artwork(item, podcast_artwork, use_episode_artwork);
    episode.set_artwork(artwork, unique);

    episode.assign_identity();
    episode
}
