// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use bytes::Bytes;
use rss::extension::ExtensionMap;
use url::Url;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::element::{FeedElement, FeedImage, FeedItem, FeedLink};

/// Produces the typed element sequence of a feed
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn read_feed(&self, url: &Url) -> Result<Vec<FeedElement>, FeedError>;
}

/// Reads RSS feeds over HTTP (or from `file://` URLs) using the `rss` crate
#[derive(Clone)]
pub struct RssFeedSource<C> {
    client: C,
}

impl<C: HttpClient> RssFeedSource<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

#[async_trait]
impl<C: HttpClient> FeedSource for RssFeedSource<C> {
    async fn read_feed(&self, url: &Url) -> Result<Vec<FeedElement>, FeedError> {
        let bytes = if url.scheme() == "file" {
            read_feed_file(url).await?
        } else {
            fetch_feed_bytes(&self.client, url.as_str()).await?
        };

        let channel = rss::Channel::read_from(&bytes[..])?;
        Ok(channel_elements(&channel))
    }
}

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Bytes, FeedError> {
    client.get_bytes(url).await.map_err(|e| match e.status() {
        Some(status) => FeedError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        },
        None => FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        },
    })
}

async fn read_feed_file(url: &Url) -> Result<Bytes, FeedError> {
    let path = url.to_file_path().map_err(|_| FeedError::Unreachable {
        url: url.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a local path"),
    })?;

    tokio::fs::read(&path)
        .await
        .map(Bytes::from)
        .map_err(|e| FeedError::Unreachable {
            url: url.to_string(),
            source: e,
        })
}

/// Flatten a parsed channel into feed elements, channel fields first and
/// items last in document order
pub fn channel_elements(channel: &rss::Channel) -> Vec<FeedElement> {
    let mut elements = Vec::with_capacity(channel.items().len() + 16);

    if !channel.title().trim().is_empty() {
        elements.push(FeedElement::Title(channel.title().to_string()));
    }
    if !channel.link().is_empty() {
        elements.push(FeedElement::Link(channel.link().to_string()));
    }
    if !channel.description().is_empty() {
        elements.push(FeedElement::Description(channel.description().to_string()));
    }

    let scalars: [(Option<&str>, fn(String) -> FeedElement); 8] = [
        (channel.language(), FeedElement::Language),
        (channel.copyright(), FeedElement::Copyright),
        (channel.managing_editor(), FeedElement::ManagingEditor),
        (channel.webmaster(), FeedElement::WebMaster),
        (channel.generator(), FeedElement::Generator),
        (channel.ttl(), FeedElement::Ttl),
        (channel.last_build_date(), FeedElement::LastBuildDate),
        (channel.pub_date(), FeedElement::PubDate),
    ];
    for (value, element) in scalars {
        if let Some(value) = value {
            elements.push(element(value.to_string()));
        }
    }

    if let Some(itunes) = channel.itunes_ext() {
        if let Some(author) = itunes.author() {
            elements.push(FeedElement::Author(author.to_string()));
        }
        if let Some(href) = itunes.image() {
            elements.push(FeedElement::HighResImage(href.to_string()));
        }
    }

    if let Some(href) = extension_attr(channel.extensions(), "image", "href") {
        elements.push(FeedElement::Image(FeedImage {
            href: Some(href),
            ..Default::default()
        }));
    }

    if let Some(image) = channel.image() {
        elements.push(FeedElement::Image(FeedImage {
            href: None,
            url: Some(image.url().to_string()).filter(|u| !u.is_empty()),
            title: Some(image.title().to_string()).filter(|t| !t.is_empty()),
            link: Some(image.link().to_string()).filter(|l| !l.is_empty()),
        }));
    }

    elements.extend(
        channel
            .items()
            .iter()
            .map(|item| FeedElement::Item(item_content(item))),
    );

    elements
}

fn item_content(item: &rss::Item) -> FeedItem {
    let mut links = Vec::new();

    if let Some(enclosure) = item.enclosure() {
        links.push(FeedLink {
            url: enclosure.url().to_string(),
            rel: Some("enclosure".to_string()),
            media_type: Some(enclosure.mime_type().to_string()).filter(|t| !t.is_empty()),
            length: enclosure.length().trim().parse().ok(),
        });
    }

    if let Some(contents) = item
        .extensions()
        .get("media")
        .and_then(|media| media.get("content"))
    {
        links.extend(contents.iter().filter_map(|content| {
            let url = content.attrs().get("url")?;
            Some(FeedLink {
                url: url.clone(),
                rel: None,
                media_type: content.attrs().get("type").cloned(),
                length: content
                    .attrs()
                    .get("fileSize")
                    .and_then(|size| size.trim().parse().ok()),
            })
        }));
    }

    if let Some(link) = item.link() {
        links.push(FeedLink {
            url: link.to_string(),
            rel: Some("alternate".to_string()),
            ..Default::default()
        });
    }

    let itunes = item.itunes_ext();

    FeedItem {
        title: item.title().map(String::from),
        description: item.description().map(String::from),
        pub_date: item.pub_date().map(String::from),
        guid: item.guid().map(|g| g.value().to_string()),
        links,
        image: itunes.and_then(|ext| ext.image().map(String::from)),
        artwork: extension_attr(item.extensions(), "thumbnail", "url"),
        duration: itunes.and_then(|ext| ext.duration().map(String::from)),
    }
}

/// First attribute value of a namespaced extension element, any namespace
fn extension_attr(extensions: &ExtensionMap, element: &str, attr: &str) -> Option<String> {
    extensions
        .values()
        .filter_map(|elements| elements.get(element))
        .flatten()
        .find_map(|ext| ext.attrs().get(attr).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
     xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"
     xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Test Podcast</title>
    <description>A test podcast for unit testing</description>
    <link>https://example.com</link>
    <language>en-us</language>
    <lastBuildDate>Tue, 02 Jan 2024 12:00:00 +0000</lastBuildDate>
    <ttl>60</ttl>
    <itunes:author>Test Author</itunes:author>
    <itunes:image href="https://example.com/cover-large.jpg"/>
    <image>
      <url>https://example.com/cover.jpg</url>
      <title>Test Podcast</title>
      <link>https://example.com</link>
    </image>
    <item>
      <title>Episode 1</title>
      <description>First episode</description>
      <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
      <guid>ep1-guid</guid>
      <enclosure url="https://example.com/ep1.mp3" length="1234567" type="audio/mpeg"/>
      <itunes:duration>30:00</itunes:duration>
      <itunes:image href="https://example.com/ep1.jpg"/>
    </item>
    <item>
      <title>Episode 2</title>
      <media:content url="https://example.com/ep2.mp3" type="audio/mpeg" fileSize="42"/>
      <media:thumbnail url="https://example.com/ep2-thumb.jpg"/>
    </item>
  </channel>
</rss>"#;

    struct FeedClient;

    #[async_trait]
    impl HttpClient for FeedClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from_static(SAMPLE_FEED.as_bytes()))
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            unreachable!("feeds are fetched whole")
        }
    }

    fn elements() -> Vec<FeedElement> {
        let channel = rss::Channel::read_from(SAMPLE_FEED.as_bytes()).unwrap();
        channel_elements(&channel)
    }

    #[test]
    fn blank_channel_title_is_skipped() {
        let feed = SAMPLE_FEED.replacen("<title>Test Podcast</title>", "<title>  </title>", 1);
        let channel = rss::Channel::read_from(feed.as_bytes()).unwrap();

        let elements = channel_elements(&channel);

        assert!(!elements.iter().any(|e| matches!(e, FeedElement::Title(_))));
    }

    #[test]
    fn channel_fields_precede_items() {
        let elements = elements();
        assert_eq!(elements[0], FeedElement::Title("Test Podcast".to_string()));

        let first_item = elements
            .iter()
            .position(|e| matches!(e, FeedElement::Item(_)))
            .unwrap();
        assert!(
            elements[first_item..]
                .iter()
                .all(|e| matches!(e, FeedElement::Item(_)))
        );
    }

    #[test]
    fn high_res_image_precedes_image_description() {
        let elements = elements();
        let high_res = elements
            .iter()
            .position(|e| matches!(e, FeedElement::HighResImage(_)))
            .unwrap();
        let described = elements
            .iter()
            .position(|e| matches!(e, FeedElement::Image(_)))
            .unwrap();
        assert!(high_res < described);

        match &elements[described] {
            FeedElement::Image(image) => {
                assert_eq!(image.url.as_deref(), Some("https://example.com/cover.jpg"));
                assert!(image.href.is_none());
            }
            other => panic!("unexpected element {other:?}"),
        }
    }

    #[test]
    fn items_carry_links_and_artwork() {
        let items: Vec<FeedItem> = elements()
            .into_iter()
            .filter_map(|e| match e {
                FeedElement::Item(item) => Some(item),
                _ => None,
            })
            .collect();

        assert_eq!(items.len(), 2);

        let ep1 = &items[0];
        assert!(ep1.links[0].is_enclosure());
        assert_eq!(ep1.links[0].length, Some(1234567));
        assert_eq!(ep1.image.as_deref(), Some("https://example.com/ep1.jpg"));
        assert_eq!(ep1.duration.as_deref(), Some("30:00"));

        let ep2 = &items[1];
        assert!(!ep2.links[0].is_enclosure());
        assert!(ep2.links[0].has_media_type("audio/mpeg"));
        assert_eq!(ep2.links[0].length, Some(42));
        assert_eq!(
            ep2.artwork.as_deref(),
            Some("https://example.com/ep2-thumb.jpg")
        );
    }

    #[tokio::test]
    async fn rss_source_reads_over_http() {
        let source = RssFeedSource::new(FeedClient);
        let url = Url::parse("https://example.com/feed.xml").unwrap();

        let elements = source.read_feed(&url).await.unwrap();

        assert!(elements.contains(&FeedElement::Ttl("60".to_string())));
        assert!(elements.contains(&FeedElement::Author("Test Author".to_string())));
    }

    #[tokio::test]
    async fn rss_source_reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.xml");
        std::fs::write(&path, SAMPLE_FEED).unwrap();

        let source = RssFeedSource::new(FeedClient);
        let url = Url::from_file_path(&path).unwrap();

        let elements = source.read_feed(&url).await.unwrap();
        assert!(elements.contains(&FeedElement::Language("en-us".to_string())));
    }

    #[tokio::test]
    async fn missing_local_file_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("missing.xml")).unwrap();

        let err = RssFeedSource::new(FeedClient)
            .read_feed(&url)
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Unreachable { .. }));
    }
}
