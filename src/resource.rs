// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lazily downloaded, in-memory byte resources.
//!
//! A [`Resource`] is fetched at most once. Operations take `&mut self`, so
//! a single instance can only be driven from one task at a time; callers
//! that want parallel downloads run them on distinct resources.

use std::io::{Cursor, Read};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::ResourceError;
use crate::http::HttpClient;
use crate::progress::{DownloadProgress, ProgressEvent, SharedProgressReporter};

#[derive(Debug, Clone, Default)]
enum State {
    #[default]
    Empty,
    Loaded(Bytes),
    Disposed,
}

/// Byte buffer behind a downloadable entry
#[derive(Debug, Clone, Default)]
pub struct Resource {
    state: State,
}

impl Resource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether non-empty bytes are available
    pub fn is_downloaded(&self) -> bool {
        matches!(&self.state, State::Loaded(bytes) if !bytes.is_empty())
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.state, State::Disposed)
    }

    /// Stream `url` into memory unless bytes are already present.
    ///
    /// On cancellation or failure nothing is retained and the resource stays
    /// not-downloaded.
    pub async fn download<C: HttpClient + ?Sized>(
        &mut self,
        url: &str,
        client: &C,
        reporter: Option<&SharedProgressReporter>,
        cancel: Option<&CancelToken>,
    ) -> Result<(), ResourceError> {
        match self.state {
            State::Disposed => return Err(ResourceError::Disposed),
            State::Loaded(ref bytes) if !bytes.is_empty() => return Ok(()),
            State::Loaded(_) | State::Empty => {}
        }

        if url.trim().is_empty() {
            return Err(ResourceError::NoSource);
        }

        let report = |event: ProgressEvent| {
            if let Some(reporter) = reporter {
                reporter.report(event);
            }
        };
        let cancelled = || {
            report(ProgressEvent::DownloadCancelled {
                url: url.to_string(),
            });
            ResourceError::Cancelled {
                url: url.to_string(),
            }
        };

        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(cancelled());
        }

        debug!(url, "starting download");

        let response = client
            .get_stream(url)
            .await
            .map_err(|e| ResourceError::RequestFailed {
                url: url.to_string(),
                source: e,
            })?;

        if response.is_error() {
            return Err(ResourceError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        let total = response.content_length;
        report(ProgressEvent::DownloadStarting {
            url: url.to_string(),
            content_length: total,
        });

        let mut buffer = BytesMut::with_capacity(total.unwrap_or(0).min(64 * 1024 * 1024) as usize);
        let mut body = response.body;

        loop {
            let next = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(cancelled()),
                    chunk = body.next() => chunk,
                },
                None => body.next().await,
            };

            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| ResourceError::StreamFailed {
                url: url.to_string(),
                source: e,
            })?;

            buffer.extend_from_slice(&chunk);

            report(ProgressEvent::DownloadProgress {
                url: url.to_string(),
                progress: DownloadProgress {
                    total,
                    received: buffer.len() as u64,
                },
            });
        }

        let bytes_downloaded = buffer.len() as u64;
        self.state = State::Loaded(buffer.freeze());

        report(ProgressEvent::DownloadCompleted {
            url: url.to_string(),
            bytes_downloaded,
        });
        debug!(url, bytes_downloaded, "download finished");

        Ok(())
    }

    /// A fresh reader over the stored bytes, positioned at the start
    pub fn stream(&self) -> Result<Cursor<Bytes>, ResourceError> {
        self.bytes().map(|bytes| Cursor::new(bytes.clone()))
    }

    pub fn bytes(&self) -> Result<&Bytes, ResourceError> {
        match &self.state {
            State::Loaded(bytes) => Ok(bytes),
            State::Empty | State::Disposed => Err(ResourceError::Disposed),
        }
    }

    /// Replace the contents with everything readable from `reader`,
    /// bypassing the network
    pub fn set_stream<R: Read>(&mut self, mut reader: R) -> Result<(), ResourceError> {
        if self.is_disposed() {
            return Err(ResourceError::Disposed);
        }

        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(ResourceError::StreamUnreadable)?;

        self.state = State::Loaded(Bytes::from(data));
        Ok(())
    }

    /// Drop the bytes for good; later reads and downloads fail with
    /// [`ResourceError::Disposed`]
    pub fn dispose(&mut self) {
        self.state = State::Disposed;
    }

    /// Forget the bytes but keep the resource usable
    pub fn clear(&mut self) {
        if !self.is_disposed() {
            self.state = State::Empty;
        }
    }
}

/// Entries whose bytes live in a [`Resource`] fetched from a source URL
#[async_trait]
pub trait Downloadable: Send {
    fn source_url(&self) -> &str;

    fn resource(&self) -> &Resource;

    fn resource_mut(&mut self) -> &mut Resource;

    /// Fetch the bytes once; repeated calls after a successful fetch are no-ops
    async fn download<C>(
        &mut self,
        client: &C,
        reporter: Option<&SharedProgressReporter>,
        cancel: Option<&CancelToken>,
    ) -> Result<(), ResourceError>
    where
        C: HttpClient + ?Sized,
    {
        let url = self.source_url().to_string();
        self.resource_mut()
            .download(&url, client, reporter, cancel)
            .await
    }

    fn is_downloaded(&self) -> bool {
        self.resource().is_downloaded()
    }

    fn stream(&self) -> Result<Cursor<Bytes>, ResourceError> {
        self.resource().stream()
    }

    fn set_stream<R: Read>(&mut self, reader: R) -> Result<(), ResourceError>
    where
        Self: Sized,
    {
        self.resource_mut().set_stream(reader)
    }

    fn dispose(&mut self) {
        self.resource_mut().dispose();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MockHttpClient;
    use super::*;
    use crate::http::{ByteStream, HttpResponse};
    use crate::progress::ProgressReporter;
    use std::sync::{Arc, Mutex};

    const URL: &str = "https://example.com/episode.mp3";

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl ProgressReporter for Recorder {
        fn report(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn read_all(resource: &Resource) -> Vec<u8> {
        let mut out = Vec::new();
        resource.stream().unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn download_stores_source_bytes() {
        let client = MockHttpClient::default().with(URL, 200, b"test audio content");
        let mut resource = Resource::new();

        resource.download(URL, &client, None, None).await.unwrap();

        assert!(resource.is_downloaded());
        assert_eq!(read_all(&resource), b"test audio content");
    }

    #[tokio::test]
    async fn second_download_does_not_fetch_again() {
        let client = MockHttpClient::default().with(URL, 200, b"audio");
        let mut resource = Resource::new();

        resource.download(URL, &client, None, None).await.unwrap();
        resource.download(URL, &client, None, None).await.unwrap();

        assert_eq!(client.requests(), 1);
    }

    #[tokio::test]
    async fn empty_body_is_fetched_again() {
        let client = MockHttpClient::default().with(URL, 200, b"");
        let mut resource = Resource::new();

        resource.download(URL, &client, None, None).await.unwrap();
        assert!(!resource.is_downloaded());
        resource.download(URL, &client, None, None).await.unwrap();

        assert_eq!(client.requests(), 2);
    }

    #[tokio::test]
    async fn streams_are_independent_and_rewound() {
        let client = MockHttpClient::default().with(URL, 200, b"abcdef");
        let mut resource = Resource::new();
        resource.download(URL, &client, None, None).await.unwrap();

        let mut first = resource.stream().unwrap();
        let mut head = [0u8; 3];
        first.read_exact(&mut head).unwrap();

        assert_eq!(&head, b"abc");
        assert_eq!(read_all(&resource), b"abcdef");
    }

    #[test]
    fn stream_before_download_is_disposed_error() {
        let resource = Resource::new();
        assert!(matches!(resource.stream(), Err(ResourceError::Disposed)));
    }

    #[tokio::test]
    async fn disposed_resource_rejects_everything() {
        let client = MockHttpClient::default().with(URL, 200, b"audio");
        let mut resource = Resource::new();
        resource.download(URL, &client, None, None).await.unwrap();

        resource.dispose();

        assert!(!resource.is_downloaded());
        assert!(matches!(resource.stream(), Err(ResourceError::Disposed)));
        assert!(matches!(
            resource.download(URL, &client, None, None).await,
            Err(ResourceError::Disposed)
        ));
        assert!(matches!(
            resource.set_stream(&b"cached"[..]),
            Err(ResourceError::Disposed)
        ));
        assert_eq!(client.requests(), 1);
    }

    #[tokio::test]
    async fn http_errors_leave_resource_empty() {
        let client = MockHttpClient::default().with(URL, 404, b"Not Found");
        let mut resource = Resource::new();

        let err = resource.download(URL, &client, None, None).await.unwrap_err();

        assert!(matches!(err, ResourceError::HttpStatus { status: 404, .. }));
        assert!(!resource.is_downloaded());
        assert!(resource.stream().is_err());
    }

    #[tokio::test]
    async fn empty_url_is_rejected_without_fetching() {
        let client = MockHttpClient::default();
        let mut resource = Resource::new();

        let err = resource.download("  ", &client, None, None).await.unwrap_err();

        assert!(matches!(err, ResourceError::NoSource));
        assert_eq!(client.requests(), 0);
    }

    #[tokio::test]
    async fn progress_is_reported_with_percentages() {
        let client = MockHttpClient::default().with(URL, 200, b"0123456789");
        let recorder = Arc::new(Recorder::default());
        let reporter: SharedProgressReporter = recorder.clone();
        let mut resource = Resource::new();

        resource
            .download(URL, &client, Some(&reporter), None)
            .await
            .unwrap();

        let events = recorder.0.lock().unwrap();
        assert!(matches!(
            events.first(),
            Some(ProgressEvent::DownloadStarting {
                content_length: Some(10),
                ..
            })
        ));
        let last_progress = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::DownloadProgress { progress, .. } => Some(*progress),
                _ => None,
            })
            .last()
            .unwrap();
        assert_eq!(last_progress.percent(), Some(100));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::DownloadCompleted {
                bytes_downloaded: 10,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn cancelled_before_start_does_not_fetch() {
        let client = MockHttpClient::default().with(URL, 200, b"audio");
        let token = CancelToken::new();
        token.cancel();
        let mut resource = Resource::new();

        let err = resource
            .download(URL, &client, None, Some(&token))
            .await
            .unwrap_err();

        assert!(matches!(err, ResourceError::Cancelled { .. }));
        assert_eq!(client.requests(), 0);
        assert!(!resource.is_downloaded());
    }

    struct StallingClient;

    #[async_trait]
    impl HttpClient for StallingClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::new())
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let first = futures::stream::once(async { Ok(Bytes::from_static(b"partial")) });
            let body: ByteStream = Box::pin(first.chain(futures::stream::pending()));
            Ok(HttpResponse {
                status: 200,
                content_length: Some(1000),
                body,
            })
        }
    }

    #[tokio::test]
    async fn cancelling_mid_stream_keeps_nothing() {
        let token = CancelToken::new();
        let canceller = token.clone();
        let mut resource = Resource::new();

        let download = resource.download(URL, &StallingClient, None, Some(&token));
        let cancel = async move {
            tokio::task::yield_now().await;
            canceller.cancel();
        };
        let (result, ()) = tokio::join!(download, cancel);

        assert!(matches!(result, Err(ResourceError::Cancelled { .. })));
        assert!(!resource.is_downloaded());
        assert!(resource.stream().is_err());
    }

    #[test]
    fn set_stream_replaces_contents() {
        let mut resource = Resource::new();
        resource.set_stream(&b"first"[..]).unwrap();
        resource.set_stream(&b"second"[..]).unwrap();

        assert_eq!(read_all(&resource), b"second");
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("device unplugged"))
        }
    }

    #[test]
    fn unreadable_stream_is_rejected() {
        let mut resource = Resource::new();
        let err = resource.set_stream(BrokenReader).unwrap_err();

        assert!(matches!(err, ResourceError::StreamUnreadable(_)));
        assert!(!resource.is_downloaded());
    }

    #[test]
    fn empty_bytes_do_not_count_as_downloaded() {
        let mut resource = Resource::new();
        resource.set_stream(&b""[..]).unwrap();

        assert!(!resource.is_downloaded());
        assert!(resource.stream().is_ok());
    }
}
