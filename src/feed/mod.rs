mod date;
mod element;
mod source;

pub use date::{UNKNOWN_DATE, parse_duration, parse_feed_date, parse_feed_date_or_unknown};
pub use element::{FeedElement, FeedImage, FeedItem, FeedLink};
pub use source::{FeedSource, RssFeedSource, channel_elements, fetch_feed_bytes};
