// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// One typed unit of a feed, in document order.
///
/// Scalar values are carried raw; interpreting them (dates, numbers) and
/// recovering from malformed values is up to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedElement {
    Title(String),
    Link(String),
    Description(String),
    Author(String),
    Generator(String),
    Language(String),
    Copyright(String),
    ManagingEditor(String),
    WebMaster(String),
    /// Time-to-live in minutes, unparsed
    Ttl(String),
    LastBuildDate(String),
    PubDate(String),
    /// Feed-specific high resolution artwork (`itunes:image`)
    HighResImage(String),
    /// Generic image element
    Image(FeedImage),
    Item(FeedItem),
}

/// Generic image element. Either carries a direct `href` attribute or an
/// image description with a nested `url`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedImage {
    pub href: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
}

/// A link attached to an item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedLink {
    pub url: String,
    /// Relationship, e.g. `enclosure` or `alternate`
    pub rel: Option<String>,
    pub media_type: Option<String>,
    /// Declared length
    pub length: Option<u64>,
}

impl FeedLink {
    pub fn is_enclosure(&self) -> bool {
        self.rel
            .as_deref()
            .is_some_and(|rel| rel.eq_ignore_ascii_case("enclosure"))
    }

    pub fn has_media_type(&self, media_type: &str) -> bool {
        self.media_type
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(media_type))
    }
}

/// An episode entry of the feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub pub_date: Option<String>,
    pub guid: Option<String>,
    pub links: Vec<FeedLink>,
    /// Item-level high resolution artwork (`itunes:image`)
    pub image: Option<String>,
    /// Item-level custom artwork, e.g. `media:thumbnail`
    pub artwork: Option<String>,
    /// Raw `itunes:duration` value
    pub duration: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclosure_relationship_is_case_insensitive() {
        let link = FeedLink {
            url: "https://example.com/ep.mp3".to_string(),
            rel: Some("Enclosure".to_string()),
            ..Default::default()
        };
        assert!(link.is_enclosure());
    }

    #[test]
    fn media_type_match_ignores_surrounding_whitespace() {
        let link = FeedLink {
            url: "https://example.com/ep.mp3".to_string(),
            media_type: Some(" audio/mpeg ".to_string()),
            ..Default::default()
        };
        assert!(link.has_media_type("audio/mpeg"));
        assert!(!link.has_media_type("audio/ogg"));
    }
}
