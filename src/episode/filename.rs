// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use url::Url;

use crate::feed::UNKNOWN_DATE;

use super::Episode;

/// Maximum length for the title portion of a filename
const MAX_TITLE_LENGTH: usize = 100;

/// File name for storing an episode's media locally.
///
/// Format: "YYYY-MM-DD-sanitized-title.ext" or "undated-sanitized-title.ext"
pub fn local_file_name(episode: &Episode) -> String {
    let date_prefix = if episode.published == UNKNOWN_DATE {
        "undated".to_string()
    } else {
        episode.published.format("%Y-%m-%d").to_string()
    };

    format!(
        "{}-{}.{}",
        date_prefix,
        sanitize_title(episode.title()),
        get_audio_extension(episode)
    )
}

/// Audio file extension from the media URL path or media type, defaulting to "mp3"
pub fn get_audio_extension(episode: &Episode) -> String {
    if let Some(ext) = Url::parse(&episode.media_url)
        .ok()
        .as_ref()
        .and_then(|url| url.path_segments()?.next_back().map(String::from))
        .and_then(|filename| filename.rsplit_once('.').map(|(_, ext)| ext.to_lowercase()))
        .filter(|ext| is_valid_audio_extension(ext))
    {
        return ext;
    }

    if let Some(ext) = episode.media_type.as_deref().and_then(mime_to_extension) {
        return ext.to_string();
    }

    "mp3".to_string()
}

fn sanitize_title(title: &str) -> String {
    let cleaned = sanitize_filename::sanitize(title);
    let dashed = cleaned
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let truncated: String = dashed.chars().take(MAX_TITLE_LENGTH).collect();
    let truncated = truncated.trim_end_matches('-');

    if truncated.is_empty() {
        "episode".to_string()
    } else {
        truncated.to_string()
    }
}

fn is_valid_audio_extension(ext: &str) -> bool {
    matches!(
        ext,
        "mp3" | "m4a" | "mp4" | "aac" | "ogg" | "opus" | "wav" | "flac"
    )
}

fn mime_to_extension(mime: &str) -> Option<&'static str> {
    match mime.trim().to_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        "audio/aac" => Some("aac"),
        "audio/ogg" => Some("ogg"),
        "audio/opus" => Some("opus"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        _ => None,
    }
}
