//! The wire side of a stream connection.
//!
//! [`Transport`] opens one long-lived response and yields decoded SSE
//! frames. The connection driver owns reconnect logic; a transport only
//! knows how to make a single attempt.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::{Stream, StreamExt, stream};
use reqwest::Url;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::TransportError;
use crate::sse::{SseDecoder, SseFrame};

pub type FrameStream = Pin<Box<dyn Stream<Item = Result<SseFrame, TransportError>> + Send>>;

const LAST_EVENT_ID: &str = "Last-Event-ID";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One connect attempt.
pub struct StreamRequest {
    /// Full subscription URL, token included when placed in the query.
    pub url: Url,
    /// Sent as `Authorization: Bearer` when present.
    pub bearer: Option<SecretString>,
    /// Resume point from the previous connection.
    pub last_event_id: Option<String>,
}

impl std::fmt::Debug for StreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRequest")
            .field("path", &self.url.path())
            .field("bearer", &self.bearer.as_ref().map(|_| "[REDACTED]"))
            .field("last_event_id", &self.last_event_id)
            .finish()
    }
}

pub trait Transport: Send + Sync + 'static {
    /// Open the stream. Resolves once the response headers arrived.
    fn open(
        &self,
        request: &StreamRequest,
    ) -> impl Future<Output = Result<FrameStream, TransportError>> + Send;
}

// ─── HTTP ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn open(
        &self,
        request: &StreamRequest,
    ) -> impl Future<Output = Result<FrameStream, TransportError>> + Send {
        let mut builder = self
            .client
            .get(request.url.clone())
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(id) = &request.last_event_id {
            builder = builder.header(LAST_EVENT_ID, id.as_str());
        }

        async move {
            let response = builder.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                });
            }

            let mut decoder = SseDecoder::new();
            let frames = response
                .bytes_stream()
                .map(move |chunk| match chunk {
                    Ok(bytes) => decoder.push(&bytes).into_iter().map(Ok).collect::<Vec<_>>(),
                    Err(e) => vec![Err(TransportError::Stream(e.to_string()))],
                })
                .flat_map(stream::iter);
            Ok(Box::pin(frames) as FrameStream)
        }
    }
}
