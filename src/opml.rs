// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::ImportError;

/// A feed subscription listed in an OPML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpmlEntry {
    pub feed_url: String,
    pub title: Option<String>,
}

impl OpmlEntry {
    /// Title for display, falling back to the feed URL when blank
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.feed_url)
    }
}

/// Collect every `outline` element carrying an `xmlUrl`, in document order
pub fn read_outlines<R: BufRead>(input: R) -> Result<Vec<OpmlEntry>, ImportError> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"outline" => {
                if let Some(feed_url) = get_attribute(e, "xmlUrl").filter(|u| !u.trim().is_empty())
                {
                    entries.push(OpmlEntry {
                        feed_url: feed_url.trim().to_string(),
                        title: get_attribute(e, "title").or_else(|| get_attribute(e, "text")),
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

fn get_attribute(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        let key = String::from_utf8_lossy(attr.key.as_ref());
        key.eq_ignore_ascii_case(name).then(|| {
            let raw = String::from_utf8_lossy(&attr.value);
            html_escape::decode_html_entities(&raw).into_owned()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OPML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="2.0">
  <head><title>My subscriptions</title></head>
  <body>
    <outline text="Podcasts">
      <outline type="rss" text="Show One" title="Show One" xmlUrl="https://one.example.com/feed.xml"/>
      <outline type="rss" title="   " xmlUrl="https://two.example.com/rss?a=1&amp;b=2"/>
      <outline type="link" text="Not a feed" url="https://example.com"/>
    </outline>
    <outline text="Show Three" xmlurl="https://three.example.com/feed"></outline>
  </body>
</opml>"#;

    #[test]
    fn reads_outlines_with_feed_urls() {
        let entries = read_outlines(SAMPLE_OPML.as_bytes()).unwrap();

        let urls: Vec<&str> = entries.iter().map(|e| e.feed_url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://one.example.com/feed.xml",
                "https://two.example.com/rss?a=1&b=2",
                "https://three.example.com/feed",
            ]
        );
    }

    #[test]
    fn blank_titles_fall_back_to_url() {
        let entries = read_outlines(SAMPLE_OPML.as_bytes()).unwrap();

        assert_eq!(entries[0].display_name(), "Show One");
        assert_eq!(entries[1].display_name(), "https://two.example.com/rss?a=1&b=2");
        assert_eq!(entries[2].display_name(), "Show Three");
    }

    #[test]
    fn empty_document_has_no_entries() {
        let entries = read_outlines(r#"<opml version="2.0"><body/></opml>"#.as_bytes()).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        let result = read_outlines("<opml><body></opml>".as_bytes());
        assert!(matches!(result, Err(ImportError::Xml(_))));
    }
}
