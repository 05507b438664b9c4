use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod core;
mod daemon;
mod providers;

#[derive(Parser)]
#[command(name = "stream-watch")]
#[command(author, version, about = "Desktop notifications when a Twitch streamer goes live")]
struct Cli {
    /// Accepted for launcher wrappers; has no effect
    #[arg(long, hide = true)]
    no_terminal: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    if cli.no_terminal {
        tracing::debug!("Started without a terminal wrapper");
    }

    if let Err(e) = daemon::run().await {
        tracing::error!(error = %format!("{e:#}"), "Fatal error");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
