// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::episode::{Episode, PlaybackState};
use crate::error::ImportError;
use crate::feed::FeedSource;
use crate::http::HttpClient;
use crate::opml::read_outlines;
use crate::podcast::{Podcast, PodcastId, RefreshOptions};
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Overall result of refreshing every subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    Success,
    /// At least one feed host could not be resolved
    Offline,
    Error,
}

/// A feed that failed to refresh
#[derive(Debug, Clone, Serialize)]
pub struct RefreshFailure {
    pub feed_url: Url,
    pub error: String,
    pub offline: bool,
}

/// Result of [`Subscriptions::refresh_all`]
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub outcome: RefreshOutcome,
    /// Podcasts refreshed successfully
    pub refreshed: usize,
    pub new_episodes: usize,
    pub offline_failures: usize,
    pub other_failures: usize,
    pub failures: Vec<RefreshFailure>,
}

/// Something that happened to the subscription set, for observers to replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionChange {
    Added(PodcastId),
    Removed(PodcastId),
    Refreshed { id: PodcastId, new_episodes: usize },
    Shrunk { id: PodcastId, removed: usize },
}

/// The ordered set of subscribed podcasts.
///
/// Feed URLs are expected to be unique; [`Subscriptions::add`] does not
/// check, callers use [`Subscriptions::contains_feed`] first. Refreshes
/// mutate the podcasts in place, so observers should snapshot before
/// iterating concurrently.
#[derive(Debug, Default, Serialize)]
pub struct Subscriptions {
    podcasts: Vec<Podcast>,
    #[serde(skip)]
    index: HashMap<PodcastId, usize>,
    #[serde(skip)]
    changes: Vec<SubscriptionChange>,
}

impl Subscriptions {
    /// Refreshing stops once more than this many podcasts have failed
    pub const FAILURE_LIMIT: usize = 1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.podcasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.podcasts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Podcast> {
        self.podcasts.iter()
    }

    pub fn podcasts(&self) -> &[Podcast] {
        &self.podcasts
    }

    pub fn add(&mut self, podcast: Podcast) {
        let id = podcast.id();
        self.index.insert(id, self.podcasts.len());
        self.podcasts.push(podcast);
        self.changes.push(SubscriptionChange::Added(id));
    }

    /// Unsubscribe, disposing the podcast's artwork and episode buffers
    pub fn remove(&mut self, id: PodcastId) -> Option<Podcast> {
        let position = *self.index.get(&id)?;
        let mut podcast = self.podcasts.remove(position);
        podcast.dispose_all();
        self.rebuild_index();
        self.changes.push(SubscriptionChange::Removed(id));
        Some(podcast)
    }

    pub fn contains_feed(&self, feed_url: &Url) -> bool {
        self.podcasts.iter().any(|p| p.feed_url() == feed_url)
    }

    pub fn podcast(&self, id: PodcastId) -> Option<&Podcast> {
        self.index.get(&id).map(|&i| &self.podcasts[i])
    }

    pub fn podcast_mut(&mut self, id: PodcastId) -> Option<&mut Podcast> {
        self.index.get(&id).map(|&i| &mut self.podcasts[i])
    }

    /// Title of the podcast an episode belongs to
    pub fn podcast_title(&self, episode: &Episode) -> Option<&str> {
        self.podcast(episode.podcast_id()).map(Podcast::title)
    }

    /// Take the changes recorded since the last call
    pub fn drain_changes(&mut self) -> Vec<SubscriptionChange> {
        std::mem::take(&mut self.changes)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .podcasts
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id(), i))
            .collect();
    }

    /// Refresh every podcast in order, one at a time.
    ///
    /// Failures are counted per podcast and classified as offline (host not
    /// resolvable) or other; iteration stops once more than
    /// [`Self::FAILURE_LIMIT`] podcasts have failed. Any offline failure makes
    /// the outcome [`RefreshOutcome::Offline`], otherwise any failure makes it
    /// [`RefreshOutcome::Error`].
    pub async fn refresh_all<S, C>(
        &mut self,
        source: &S,
        client: &C,
        options: &RefreshOptions,
        reporter: &SharedProgressReporter,
    ) -> RefreshSummary
    where
        S: FeedSource + ?Sized,
        C: HttpClient + ?Sized,
    {
        let mut refreshed = 0;
        let mut new_episodes = 0;
        let mut offline_failures = 0;
        let mut other_failures = 0;
        let mut failures = Vec::new();

        for podcast in &mut self.podcasts {
            if let Some(keep) = options.episodes_to_keep {
                let removed = podcast.shrink_episodes_to_count(keep);
                if removed > 0 {
                    self.changes.push(SubscriptionChange::Shrunk {
                        id: podcast.id(),
                        removed,
                    });
                }
            }

            match podcast.refresh(source, client, options, reporter).await {
                Ok(added) => {
                    refreshed += 1;
                    new_episodes += added;
                    self.changes.push(SubscriptionChange::Refreshed {
                        id: podcast.id(),
                        new_episodes: added,
                    });
                }
                Err(e) => {
                    let offline = e.is_unresolved_address();
                    if offline {
                        offline_failures += 1;
                    } else {
                        other_failures += 1;
                    }

                    warn!(url = %podcast.feed_url(), error = %e, offline, "feed refresh failed");
                    reporter.report(ProgressEvent::RefreshFailed {
                        url: podcast.feed_url().to_string(),
                        error: e.to_string(),
                        offline,
                    });
                    failures.push(RefreshFailure {
                        feed_url: podcast.feed_url().clone(),
                        error: e.to_string(),
                        offline,
                    });

                    if offline_failures + other_failures > Self::FAILURE_LIMIT {
                        warn!(failed = failures.len(), "too many failures, stopping refresh");
                        break;
                    }
                }
            }
        }

        let outcome = if offline_failures > 0 {
            RefreshOutcome::Offline
        } else if other_failures > 0 {
            RefreshOutcome::Error
        } else {
            RefreshOutcome::Success
        };

        info!(?outcome, refreshed, new_episodes, "refresh finished");

        RefreshSummary {
            outcome,
            refreshed,
            new_episodes,
            offline_failures,
            other_failures,
            failures,
        }
    }

    /// Episodes waiting to be downloaded. With `max_count`, only that many of
    /// the most recently published ones; otherwise all of them in podcast then
    /// list order.
    pub fn pending_downloads(&self, max_count: Option<usize>) -> Vec<&Episode> {
        let mut pending: Vec<&Episode> = self
            .podcasts
            .iter()
            .flat_map(Podcast::episodes)
            .filter(|ep| ep.pending_download && !ep.downloaded())
            .collect();

        if let Some(max) = max_count {
            pending.sort_by(|a, b| b.published.cmp(&a.published));
            pending.truncate(max);
        }

        pending
    }

    /// Downloaded episodes that may be deleted locally, oldest first per
    /// podcast.
    ///
    /// An episode qualifies when it is finished or was never started and has
    /// a local file. A podcast contributes all of its qualifying episodes,
    /// but only when it has more than `count` of them.
    pub fn eviction_candidates(&self, count: usize) -> Vec<&Episode> {
        let mut candidates = Vec::new();

        for podcast in &self.podcasts {
            let mut eligible: Vec<&Episode> = podcast
                .episodes()
                .iter()
                .filter(|ep| {
                    ep.downloaded()
                        && matches!(
                            ep.playback(),
                            PlaybackState::Completed | PlaybackState::NotStarted
                        )
                        && ep.local_file().is_some_and(|f| !f.trim().is_empty())
                })
                .collect();

            if eligible.len() > count {
                eligible.sort_by(|a, b| a.published.cmp(&b.published));
                candidates.extend(eligible);
            }
        }

        candidates
    }

    /// The first episode flagged active, podcasts and episodes in order
    pub fn active_episode(&self) -> Option<&Episode> {
        self.podcasts
            .iter()
            .flat_map(Podcast::episodes)
            .find(|ep| ep.active)
    }

    /// Make the episode with identity `guid` the only active one.
    /// Returns false when no such episode exists.
    pub fn set_active(&mut self, guid: &str) -> bool {
        let exists = self
            .podcasts
            .iter()
            .any(|p| p.episode(guid).is_some());
        if !exists {
            return false;
        }

        for episode in self.podcasts.iter_mut().flat_map(Podcast::episodes_mut) {
            episode.active = episode.guid == guid;
        }
        true
    }

    /// Assign fresh identity tokens, to every episode when `overwrite` is set
    /// or only to those without one. Returns how many were assigned.
    pub fn generate_identities(&mut self, overwrite: bool) -> usize {
        let mut assigned = 0;
        for episode in self.podcasts.iter_mut().flat_map(Podcast::episodes_mut) {
            if overwrite || !episode.has_identity() {
                episode.assign_identity();
                assigned += 1;
            }
        }
        assigned
    }

    /// Subscribe to every feed listed in an OPML document, one at a time.
    ///
    /// Each entry is announced through the reporter before it is fetched.
    /// Entries whose URL is invalid, already subscribed, or cannot be fetched
    /// are skipped. Returns the number of skipped entries.
    pub async fn import_from_opml<R, S, C>(
        &mut self,
        input: R,
        source: &S,
        client: &C,
        options: &RefreshOptions,
        reporter: &SharedProgressReporter,
    ) -> Result<usize, ImportError>
    where
        R: BufRead,
        S: FeedSource + ?Sized,
        C: HttpClient + ?Sized,
    {
        let entries = read_outlines(input)?;
        let mut skipped = 0;

        for entry in entries {
            reporter.report(ProgressEvent::ImportingEntry {
                title: entry.display_name().to_string(),
            });

            let feed_url = match Url::parse(&entry.feed_url) {
                Ok(url) => url,
                Err(e) => {
                    warn!(url = %entry.feed_url, error = %e, "skipping invalid feed URL");
                    skipped += 1;
                    continue;
                }
            };

            if self.contains_feed(&feed_url) {
                info!(url = %feed_url, "already subscribed, skipping");
                skipped += 1;
                continue;
            }

            match Podcast::fetch(feed_url, source, client, options, reporter).await {
                Ok(podcast) => self.add(podcast),
                Err(e) => {
                    warn!(url = %entry.feed_url, error = %e, "skipping unreachable feed");
                    skipped += 1;
                }
            }
        }

        Ok(skipped)
    }

    /// [`Self::import_from_opml`] reading from a file
    pub async fn import_opml_file<S, C>(
        &mut self,
        path: &Path,
        source: &S,
        client: &C,
        options: &RefreshOptions,
        reporter: &SharedProgressReporter,
    ) -> Result<usize, ImportError>
    where
        S: FeedSource + ?Sized,
        C: HttpClient + ?Sized,
    {
        let file = std::fs::File::open(path).map_err(|e| ImportError::FileReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.import_from_opml(BufReader::new(file), source, client, options, reporter)
            .await
    }
}
