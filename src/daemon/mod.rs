mod app;
mod entry;
mod lifecycle;
mod polling;
mod signals;
#[cfg(test)]
mod testing;

use anyhow::Result;

pub use lifecycle::ShutdownRequest;
pub use signals::SignalMode;

pub async fn run() -> Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting stream-watch");

    app::run().await
}
