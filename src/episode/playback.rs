// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use serde::Serialize;

/// How far an episode has been listened to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "position", rename_all = "snake_case")]
pub enum PlaybackState {
    /// Never started, or reset after being played
    #[default]
    NotStarted,
    InProgress(Duration),
    Completed,
}

impl PlaybackState {
    /// State after seeking to `position` in an episode of length `duration`
    pub fn at(position: Duration, duration: Duration) -> Self {
        if !duration.is_zero() && position >= duration {
            Self::Completed
        } else {
            Self::InProgress(position)
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Played position; `None` when playback was never started
    pub fn position(&self, duration: Duration) -> Option<Duration> {
        match self {
            Self::NotStarted => None,
            Self::InProgress(position) => Some(*position),
            Self::Completed => Some(duration),
        }
    }
}
