//! `kubelive watch`: print events as they arrive.

use kubelive_core::Event;
use tokio::sync::broadcast::error::RecvError;

use crate::cli::{Cli, WatchOpts};
use crate::context::open_stream;
use crate::display::format_event_line;

/// Entry point for `kubelive watch`. Returns the process exit code:
/// 1 when the connection gave up, 0 on Ctrl-C.
pub async fn cmd_watch(cli: &Cli, opts: &WatchOpts) -> anyhow::Result<i32> {
    let conn = open_stream(cli, opts.filter.to_filter(), None)?;
    let mut feed = conn.subscribe();
    let mut state = conn.watch_state();

    let exit_code = loop {
        tokio::select! {
            received = feed.recv() => match received {
                Ok(event) => print_event(&event, opts.json)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "output fell behind, events skipped");
                }
                Err(RecvError::Closed) => break 0,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break 0;
                }
                let error = state.borrow_and_update().error.clone();
                if let Some(error) = error {
                    tracing::error!(%error, "event stream stopped");
                    break 1;
                }
            }
            _ = tokio::signal::ctrl_c() => break 0,
        }
    };

    conn.close().await;
    Ok(exit_code)
}

fn print_event(event: &Event, json: bool) -> anyhow::Result<()> {
    let line = if json {
        serde_json::to_string(event)?
    } else {
        format_event_line(event)
    };
    println!("{line}");
    Ok(())
}
