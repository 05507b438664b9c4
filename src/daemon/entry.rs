use crate::core::models::{
    format_streamer_found, format_streamer_not_found, Broadcaster, Username, STREAMER_FOUND_TITLE,
    STREAMER_NOT_FOUND_TITLE,
};
use crate::core::notifications::Notifier;
use crate::providers::StatusProbe;

/// Confirms the broadcaster exists before monitoring starts.
///
/// Returns `None` when the account does not exist or the lookup failed; in
/// both cases the poll loop must not be started.
pub async fn check_streamer_existence(
    probe: &dyn StatusProbe,
    notifier: &dyn Notifier,
    username: &Username,
) -> Option<Broadcaster> {
    println!("Please wait a moment.");

    match probe.resolve(username).await {
        Ok(Some(broadcaster)) => {
            tracing::info!(
                username = %username,
                broadcaster_id = %broadcaster.id,
                display_name = %broadcaster.display_name,
                "Streamer found"
            );
            let message = format_streamer_found(username);
            notifier.notify(&message, STREAMER_FOUND_TITLE).await;
            println!("{message}");
            Some(broadcaster)
        }
        Ok(None) => {
            tracing::info!(username = %username, "Streamer not found");
            let message = format_streamer_not_found(username);
            notifier.notify(&message, STREAMER_NOT_FOUND_TITLE).await;
            println!("{message}");
            None
        }
        Err(e) => {
            tracing::error!(username = %username, error = %e, "Failed to check streamer existence");
            println!("Failed to check streamer existence.");
            None
        }
    }
}
