use std::time::Duration;

use kubelive_core::SubscriptionFilter;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};

use crate::auth::TokenPlacement;
use crate::error::ConnectionError;
use crate::policy::ReconnectPolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_ENDPOINT_PATH: &str = "/api/v1/events/stream";
pub const DEFAULT_MAX_LOCAL_EVENTS: usize = 100;
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;
pub const DEFAULT_TOKEN_POLL_INTERVAL: Duration = Duration::from_secs(1);

const TOKEN_PARAM: &str = "token";

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub base_url: String,
    pub endpoint_path: String,
    /// Bound of the per-connection event list.
    pub max_local_events: usize,
    pub token_placement: TokenPlacement,
    pub policy: ReconnectPolicy,
    /// Capacity of the live broadcast feed; slow subscribers lag.
    pub broadcast_capacity: usize,
    /// How often a provider without a change feed is re-read.
    pub token_poll_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            max_local_events: DEFAULT_MAX_LOCAL_EVENTS,
            token_placement: TokenPlacement::default(),
            policy: ReconnectPolicy::default(),
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            token_poll_interval: DEFAULT_TOKEN_POLL_INTERVAL,
        }
    }
}

impl StreamConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Subscription URL for `filter`, without credentials. Safe to log.
    pub fn stream_url(&self, filter: &SubscriptionFilter) -> Result<Url, ConnectionError> {
        let raw = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint_path.trim_start_matches('/')
        );
        let mut url =
            Url::parse(&raw).map_err(|e| ConnectionError::InvalidEndpoint(format!("{raw}: {e}")))?;
        let pairs = filter.query_pairs();
        if !pairs.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }
}

/// Append the token query parameter to an already-built URL.
pub(crate) fn with_query_token(mut url: Url, token: &SecretString) -> Url {
    url.query_pairs_mut()
        .append_pair(TOKEN_PARAM, token.expose_secret());
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubelive_core::ResourceType;

    #[test]
    fn default_url_has_no_query() {
        let url = StreamConfig::default()
            .stream_url(&SubscriptionFilter::all())
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/v1/events/stream");
    }

    #[test]
    fn filter_encoded_in_fixed_order() {
        let config = StreamConfig::default().with_base_url("https://dash.example.com/");
        let filter = SubscriptionFilter::all()
            .resource_type(ResourceType::Workload)
            .project("p 1")
            .cluster("c1");
        let url = config.stream_url(&filter).unwrap();
        assert_eq!(
            url.as_str(),
            "https://dash.example.com/api/v1/events/stream?cluster_id=c1&project_id=p+1&resource_type=workload"
        );
    }

    #[test]
    fn token_appended_last() {
        let url = StreamConfig::default()
            .stream_url(&SubscriptionFilter::all().cluster("c1"))
            .unwrap();
        let url = with_query_token(url, &SecretString::from("t0k"));
        assert_eq!(url.query(), Some("cluster_id=c1&token=t0k"));
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let err = StreamConfig::default()
            .with_base_url("not a url")
            .stream_url(&SubscriptionFilter::all())
            .unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidEndpoint(_)));
    }
}
