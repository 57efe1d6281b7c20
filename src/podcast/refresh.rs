// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::Utc;
use tracing::{debug, warn};
use url::Url;

use crate::artwork::{Artwork, ArtworkSelector};
use crate::episode::{episode_from_item, is_duplicate, item_key};
use crate::error::FeedError;
use crate::feed::{FeedElement, FeedSource, parse_feed_date_or_unknown};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::resource::Downloadable;

use super::Podcast;

/// Options controlling how a feed is merged into a podcast
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// Give episodes their own artwork (or inherit the podcast's); when off
    /// episodes get no artwork at all
    pub use_episode_artwork: bool,
    /// Shrink each podcast to this many episodes before refreshing it
    pub episodes_to_keep: Option<usize>,
    /// Add new episodes at the end instead of the front
    pub append_to_end: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            use_episode_artwork: true,
            episodes_to_keep: None,
            append_to_end: false,
        }
    }
}

/// Single-valued feed fields already taken during the current pass
#[derive(Debug, Default)]
struct Found {
    title: bool,
    build_date: bool,
    language: bool,
    copyright: bool,
    author: bool,
    ttl: bool,
    generator: bool,
    link: bool,
}

/// Set `slot` from `value` unless the field was already found this pass
fn take_first<T>(found: &mut bool, slot: &mut Option<T>, value: T) {
    if !*found {
        *slot = Some(value);
        *found = true;
    }
}

impl Podcast {
    /// Read the feed at `feed_url` into a new podcast
    pub async fn fetch<S, C>(
        feed_url: Url,
        source: &S,
        client: &C,
        options: &RefreshOptions,
        reporter: &SharedProgressReporter,
    ) -> Result<Podcast, FeedError>
    where
        S: FeedSource + ?Sized,
        C: HttpClient + ?Sized,
    {
        let mut podcast = Podcast::new(feed_url);
        podcast.refresh(source, client, options, reporter).await?;
        Ok(podcast)
    }

    /// Merge the current feed contents into this podcast.
    ///
    /// First occurrences win for single-valued channel fields. At most
    /// `max_episodes` items are consumed per pass; the rest are ignored.
    /// Items matching an existing episode by title and publish date are
    /// skipped. Podcast artwork is downloaded as soon as it is resolved; a
    /// failed artwork download is logged and does not fail the refresh.
    ///
    /// Returns the number of episodes added.
    pub async fn refresh<S, C>(
        &mut self,
        source: &S,
        client: &C,
        options: &RefreshOptions,
        reporter: &SharedProgressReporter,
    ) -> Result<usize, FeedError>
    where
        S: FeedSource + ?Sized,
        C: HttpClient + ?Sized,
    {
        reporter.report(ProgressEvent::RefreshingFeed {
            url: self.feed_url.to_string(),
        });

        let elements = source.read_feed(&self.feed_url).await?;

        let mut found = Found::default();
        let mut artwork = ArtworkSelector::default();
        let mut items_seen = 0;
        let mut added = 0;

        for element in elements {
            match element {
                FeedElement::Title(title) => {
                    if !found.title {
                        self.set_title(&title);
                        found.title = true;
                    }
                }
                FeedElement::LastBuildDate(date) | FeedElement::PubDate(date) => {
                    let date = parse_feed_date_or_unknown(&date);
                    take_first(&mut found.build_date, &mut self.last_build_date, date);
                }
                FeedElement::Language(value) => {
                    take_first(&mut found.language, &mut self.language, value)
                }
                FeedElement::Copyright(value) => {
                    take_first(&mut found.copyright, &mut self.copyright, value)
                }
                FeedElement::Author(value) => {
                    take_first(&mut found.author, &mut self.author, value)
                }
                FeedElement::Generator(value) => {
                    take_first(&mut found.generator, &mut self.generator, value)
                }
                FeedElement::Link(value) => take_first(&mut found.link, &mut self.link, value),
                FeedElement::Ttl(value) => {
                    let minutes = value.trim().parse().unwrap_or_else(|_| {
                        debug!(value = %value, "ignoring malformed ttl");
                        0
                    });
                    take_first(&mut found.ttl, &mut self.ttl, minutes);
                }
                FeedElement::Description(value) => self.description = Some(value),
                FeedElement::ManagingEditor(value) => self.editor = Some(value),
                FeedElement::WebMaster(value) => self.webmaster = Some(value),
                FeedElement::HighResImage(href) => {
                    if let Some(url) = artwork.offer_high_res(&href) {
                        self.replace_artwork(url, client).await;
                    }
                }
                FeedElement::Image(image) => {
                    if let Some(url) = artwork.offer_image(&image) {
                        self.replace_artwork(url, client).await;
                    }
                }
                FeedElement::Item(item) => {
                    if let Some(url) = artwork.settle() {
                        self.replace_artwork(url, client).await;
                    }
                    if items_seen >= self.max_episodes {
                        continue;
                    }
                    items_seen += 1;

                    let (title, published) = item_key(&item);
                    if is_duplicate(&self.episodes, &title, published) {
                        continue;
                    }

                    let episode = episode_from_item(
                        &item,
                        self.id,
                        self.artwork.as_ref(),
                        options.use_episode_artwork,
                    );
                    if options.append_to_end {
                        self.episodes.push(episode);
                    } else {
                        self.episodes.insert(0, episode);
                    }
                    added += 1;
                }
            }
        }

        if let Some(url) = artwork.finish() {
            self.replace_artwork(url, client).await;
        }

        self.shrink_episodes_to_count(self.max_episodes);
        self.last_refreshed = Some(Utc::now());

        debug!(url = %self.feed_url, added, total = self.episodes.len(), "feed refreshed");
        reporter.report(ProgressEvent::FeedRefreshed {
            podcast_title: self.title.clone(),
            new_episodes: added,
            total_episodes: self.episodes.len(),
        });

        Ok(added)
    }

    /// Point the podcast artwork at `url` and download it
    async fn replace_artwork<C: HttpClient + ?Sized>(&mut self, url: String, client: &C) {
        let unchanged = self.artwork.as_ref().is_some_and(|art| art.url == url);
        if !unchanged {
            if let Some(old) = self.artwork.as_mut() {
                old.dispose();
            }
            self.artwork = Some(Artwork::new(url));
        }

        if let Some(artwork) = self.artwork.as_mut()
            && let Err(e) = artwork.download(client, None, None).await
        {
            warn!(url = %artwork.url, error = %e, "podcast artwork download failed");
        }
    }
}
