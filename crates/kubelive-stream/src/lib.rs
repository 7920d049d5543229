//! kubelive-stream: SSE subscription client with capped exponential
//! backoff, feeding decoded events to local subscribers and the shared
//! event store.

pub mod auth;
pub mod config;
pub mod connection;
pub mod error;
pub mod policy;
pub mod sse;
pub mod transport;

pub use auth::{NoToken, SharedToken, StaticToken, TokenPlacement, TokenProvider};
pub use config::{
    DEFAULT_BASE_URL, DEFAULT_BROADCAST_CAPACITY, DEFAULT_ENDPOINT_PATH,
    DEFAULT_MAX_LOCAL_EVENTS, DEFAULT_TOKEN_POLL_INTERVAL, StreamConfig,
};
pub use connection::{StreamConnection, StreamSnapshot};
pub use error::{ConnectionError, TransportError};
pub use policy::{ReconnectDecision, ReconnectPolicy, ReconnectTracker};
pub use sse::{SseDecoder, SseFrame};
pub use transport::{FrameStream, HttpTransport, StreamRequest, Transport};
