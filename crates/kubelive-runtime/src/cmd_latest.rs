//! `kubelive latest`: listen for a while, then print the newest status
//! of every resource seen.

use std::time::Duration;

use kubelive_store::{EventStore, SharedEventStore};

use crate::cli::{Cli, LatestOpts};
use crate::context::open_stream;
use crate::display::format_latest_table;

pub async fn cmd_latest(cli: &Cli, opts: &LatestOpts) -> anyhow::Result<()> {
    let store = SharedEventStore::new(EventStore::with_max_history(cli.history));
    let conn = open_stream(cli, opts.filter.to_filter(), Some(store.clone()))?;

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(opts.seconds)) => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    if let Some(error) = conn.error() {
        tracing::warn!(%error, "event stream stopped before the listening window ended");
    }
    conn.close().await;

    let (latest, stats) = store.read(|s| (s.latest_by_resource(), s.stats()));
    tracing::info!(
        total = stats.total,
        resources = latest.len(),
        "events collected"
    );
    for (kind, count) in &stats.by_kind {
        tracing::debug!(kind = %kind, count, "events by kind");
    }
    print!("{}", format_latest_table(&latest));
    Ok(())
}
