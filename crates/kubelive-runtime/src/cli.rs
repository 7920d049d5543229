//! CLI definition using clap derive.

use clap::{Parser, Subcommand};

use kubelive_core::{ResourceTypeFilter, SubscriptionFilter};
use kubelive_stream::{
    DEFAULT_BASE_URL, ReconnectPolicy, StreamConfig, TokenPlacement,
};

#[derive(Parser)]
#[command(name = "kubelive", about = "Live status feed for the cluster dashboard")]
pub struct Cli {
    /// Dashboard API base URL
    #[arg(long, global = true, env = "KUBELIVE_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    /// Bearer token; without one nothing is streamed
    #[arg(long, global = true, env = "KUBELIVE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Send the token as a query parameter instead of a header
    /// (ends up in proxy access logs)
    #[arg(long, global = true)]
    pub token_in_query: bool,

    /// Reconnect attempts before giving up
    #[arg(long, global = true, default_value = "10")]
    pub max_retries: u32,

    /// First reconnect delay in milliseconds
    #[arg(long, global = true, default_value = "1000")]
    pub initial_delay_ms: u64,

    /// Reconnect delay cap in milliseconds
    #[arg(long, global = true, default_value = "30000")]
    pub max_delay_ms: u64,

    /// Events kept in memory
    #[arg(long, global = true, default_value = "100")]
    pub history: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print events as they arrive
    Watch(WatchOpts),
    /// Collect events for a while, then print the latest status per resource
    Latest(LatestOpts),
}

#[derive(clap::Args, Default)]
pub struct FilterOpts {
    /// cluster, project, workload, build, addon or all
    #[arg(long)]
    pub resource_type: Option<ResourceTypeFilter>,

    #[arg(long)]
    pub cluster: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    #[arg(long)]
    pub workload: Option<String>,
}

#[derive(clap::Args)]
pub struct WatchOpts {
    #[command(flatten)]
    pub filter: FilterOpts,

    /// One JSON object per line
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args)]
pub struct LatestOpts {
    #[command(flatten)]
    pub filter: FilterOpts,

    /// How long to listen before printing
    #[arg(long, default_value = "10")]
    pub seconds: u64,
}

impl FilterOpts {
    pub fn to_filter(&self) -> SubscriptionFilter {
        SubscriptionFilter {
            resource_type: self.resource_type.and_then(|rt| rt.0),
            cluster_id: self.cluster.clone(),
            project_id: self.project.clone(),
            workload_id: self.workload.clone(),
        }
    }
}

impl Cli {
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            max_local_events: self.history,
            token_placement: if self.token_in_query {
                TokenPlacement::Query
            } else {
                TokenPlacement::Header
            },
            policy: ReconnectPolicy {
                initial_delay_ms: self.initial_delay_ms,
                max_delay_ms: self.max_delay_ms,
                max_attempts: self.max_retries,
                ..Default::default()
            },
            ..Default::default()
        }
        .with_base_url(&self.api_url)
    }
}
