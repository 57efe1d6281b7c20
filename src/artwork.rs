// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use serde::Serialize;

use crate::feed::{FeedImage, FeedItem};
use crate::resource::{Downloadable, Resource};

/// Cover image of a podcast or episode
#[derive(Debug, Clone, Default, Serialize)]
pub struct Artwork {
    /// Where the image is fetched from; empty when there is no artwork
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    #[serde(skip)]
    resource: Resource,
}

impl Artwork {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.url.trim().is_empty()
    }

    /// Image bytes are present and the artwork has not been disposed
    pub fn is_ready(&self) -> bool {
        !self.resource.is_disposed() && self.resource.is_downloaded()
    }
}

impl Downloadable for Artwork {
    fn source_url(&self) -> &str {
        &self.url
    }

    fn resource(&self) -> &Resource {
        &self.resource
    }

    fn resource_mut(&mut self) -> &mut Resource {
        &mut self.resource
    }
}

/// Picks the podcast artwork URL during one pass over a feed.
///
/// The first high resolution image or image with a direct `href` wins. An
/// image description (`<image><url>`) is only used when nothing else turned
/// up before the first item, or by the end of the pass.
#[derive(Debug, Default)]
pub(crate) struct ArtworkSelector {
    found: bool,
    described: Option<String>,
}

impl ArtworkSelector {
    /// Offer a high resolution image; returns the URL if it was selected
    pub(crate) fn offer_high_res(&mut self, href: &str) -> Option<String> {
        self.select(href)
    }

    /// Offer a generic image element; returns the URL if it was selected
    pub(crate) fn offer_image(&mut self, image: &FeedImage) -> Option<String> {
        if let Some(href) = image.href.as_deref() {
            return self.select(href);
        }

        if self.described.is_none() {
            self.described = image
                .url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from);
        }
        None
    }

    /// Settle on the image description once items start, so episodes can
    /// inherit it. Returns the URL when it becomes the selection.
    pub(crate) fn settle(&mut self) -> Option<String> {
        if self.found {
            return None;
        }
        let url = self.described.take()?;
        self.found = true;
        Some(url)
    }

    /// Fallback URL from an image description, if nothing was selected
    pub(crate) fn finish(self) -> Option<String> {
        if self.found { None } else { self.described }
    }

    fn select(&mut self, url: &str) -> Option<String> {
        let url = url.trim();
        if self.found || url.is_empty() {
            return None;
        }
        self.found = true;
        Some(url.to_string())
    }
}

/// Artwork for a new episode and whether it is unique to that episode.
///
/// Item-level high resolution art wins over custom item art; otherwise the
/// podcast artwork is inherited. With `use_episode_artwork` off the episode
/// gets no artwork at all.
pub(crate) fn episode_artwork(
    item: &FeedItem,
    podcast_artwork: Option<&Artwork>,
    use_episode_artwork: bool,
) -> (Artwork, bool) {
    if !use_episode_artwork {
        return (Artwork::default(), false);
    }

    let own = [item.image.as_deref(), item.artwork.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty());

    match own {
        Some(url) => (Artwork::new(url), true),
        None => (podcast_artwork.cloned().unwrap_or_default(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::MockHttpClient;

    fn described(url: &str) -> FeedImage {
        FeedImage {
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn high_res_image_wins_over_later_images() {
        let mut selector = ArtworkSelector::default();

        assert_eq!(
            selector.offer_high_res("https://example.com/large.jpg"),
            Some("https://example.com/large.jpg".to_string())
        );
        let href = FeedImage {
            href: Some("https://example.com/other.jpg".to_string()),
            ..Default::default()
        };
        assert_eq!(selector.offer_image(&href), None);
        assert_eq!(selector.offer_image(&described("https://example.com/small.jpg")), None);
        assert_eq!(selector.finish(), None);
    }

    #[test]
    fn image_href_is_selected_when_first() {
        let mut selector = ArtworkSelector::default();
        let href = FeedImage {
            href: Some("https://example.com/href.jpg".to_string()),
            ..Default::default()
        };

        assert!(selector.offer_image(&href).is_some());
        assert_eq!(selector.offer_high_res("https://example.com/large.jpg"), None);
    }

    #[test]
    fn image_description_is_the_fallback() {
        let mut selector = ArtworkSelector::default();

        assert_eq!(selector.offer_image(&described("https://example.com/small.jpg")), None);
        assert_eq!(selector.offer_image(&described("https://example.com/later.jpg")), None);
        assert_eq!(
            selector.finish(),
            Some("https://example.com/small.jpg".to_string())
        );
    }

    #[test]
    fn description_settles_before_items() {
        let mut selector = ArtworkSelector::default();

        assert_eq!(selector.settle(), None);
        selector.offer_image(&described("https://example.com/small.jpg"));
        assert_eq!(
            selector.settle(),
            Some("https://example.com/small.jpg".to_string())
        );
        assert_eq!(selector.settle(), None);
        assert_eq!(selector.offer_high_res("https://example.com/large.jpg"), None);
        assert_eq!(selector.finish(), None);
    }

    #[test]
    fn episode_prefers_high_res_then_custom_art() {
        let podcast = Artwork::new("https://example.com/podcast.jpg");
        let mut item = FeedItem {
            image: Some("https://example.com/ep-large.jpg".to_string()),
            artwork: Some("https://example.com/ep-thumb.jpg".to_string()),
            ..Default::default()
        };

        let (art, unique) = episode_artwork(&item, Some(&podcast), true);
        assert_eq!(art.url, "https://example.com/ep-large.jpg");
        assert!(unique);

        item.image = None;
        let (art, unique) = episode_artwork(&item, Some(&podcast), true);
        assert_eq!(art.url, "https://example.com/ep-thumb.jpg");
        assert!(unique);
    }

    #[test]
    fn episode_inherits_podcast_artwork() {
        let podcast = Artwork::new("https://example.com/podcast.jpg");
        let (art, unique) = episode_artwork(&FeedItem::default(), Some(&podcast), true);

        assert_eq!(art.url, "https://example.com/podcast.jpg");
        assert!(!unique);
    }

    #[test]
    fn disabled_episode_artwork_is_left_empty() {
        let podcast = Artwork::new("https://example.com/podcast.jpg");
        let item = FeedItem {
            image: Some("https://example.com/ep-large.jpg".to_string()),
            ..Default::default()
        };

        let (art, unique) = episode_artwork(&item, Some(&podcast), false);
        assert!(art.is_empty());
        assert!(!unique);
    }

    #[tokio::test]
    async fn artwork_is_ready_after_download_until_disposed() {
        let url = "https://example.com/cover.jpg";
        let client = MockHttpClient::default().with(url, 200, b"\x89PNG");
        let mut artwork = Artwork::new(url);
        assert!(!artwork.is_ready());

        artwork.download(&client, None, None).await.unwrap();
        assert!(artwork.is_ready());

        artwork.dispose();
        assert!(!artwork.is_ready());
    }

    #[tokio::test]
    async fn inherited_artwork_shares_downloaded_bytes() {
        let url = "https://example.com/cover.jpg";
        let client = MockHttpClient::default().with(url, 200, b"image");
        let mut podcast = Artwork::new(url);
        podcast.download(&client, None, None).await.unwrap();

        let (art, _) = episode_artwork(&FeedItem::default(), Some(&podcast), true);

        assert!(art.is_ready());
        assert_eq!(client.requests(), 1);
    }
}
