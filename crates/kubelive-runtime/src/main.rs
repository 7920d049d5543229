//! kubelive: live cluster, project and workload status from the
//! dashboard's server-sent event stream.

use clap::Parser;

mod cli;
mod cmd_latest;
mod cmd_watch;
mod context;
mod display;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    let filter = std::env::var("KUBELIVE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match &args.command {
        cli::Command::Watch(opts) => {
            let exit_code = cmd_watch::cmd_watch(&args, opts).await?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
        cli::Command::Latest(opts) => {
            cmd_latest::cmd_latest(&args, opts).await?;
        }
    }

    Ok(())
}
