//! Wiring shared by the subcommands.

use std::sync::Arc;

use anyhow::Context as _;
use kubelive_core::SubscriptionFilter;
use kubelive_store::SharedEventStore;
use kubelive_stream::{HttpTransport, StaticToken, StreamConnection};

use crate::cli::Cli;

/// Open an enabled stream connection for `filter`.
pub fn open_stream(
    cli: &Cli,
    filter: SubscriptionFilter,
    store: Option<SharedEventStore>,
) -> anyhow::Result<StreamConnection> {
    let Some(token) = cli.token.as_deref().filter(|t| !t.is_empty()) else {
        anyhow::bail!("no API token: pass --token or set KUBELIVE_TOKEN");
    };
    let transport = HttpTransport::new().context("building HTTP client")?;
    let config = cli.stream_config();
    tracing::info!(
        api_url = %config.base_url,
        token_in_query = cli.token_in_query,
        "opening event stream"
    );
    Ok(StreamConnection::open(
        Arc::new(transport),
        Arc::new(StaticToken::new(token)),
        config,
        filter,
        true,
        store,
    ))
}
