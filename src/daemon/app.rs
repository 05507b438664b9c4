use crate::cli::prompt;
use crate::core::models::{Broadcaster, PollConfig, Username};
use crate::core::notifications::{Notifier, SystemNotifier};
use crate::core::settings::Settings;
use crate::daemon::entry::check_streamer_existence;
use crate::daemon::lifecycle::{LifecycleController, ShutdownRequest};
use crate::daemon::polling::PollLoop;
use crate::daemon::signals::{SignalListener, SignalMode};
use crate::providers::{StatusProbe, TwitchClient};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::runtime::Handle;

pub async fn run() -> Result<()> {
    let settings = Settings::load()?;
    let (client_id, client_secret) = settings.twitch.credentials()?;
    let runtime = Handle::current();

    let requests = ShutdownRequest::new();
    let mode = SignalMode::new();
    SignalListener::install(mode.clone())
        .context("Failed to install signal handlers")?
        .spawn(&runtime, requests.clone());

    let client = Arc::new(TwitchClient::new(
        client_id,
        client_secret,
        settings.twitch.request_timeout(),
    )?);
    client
        .initialize()
        .await
        .context("Failed to authenticate with the Twitch API")?;

    let notifier = Arc::new(SystemNotifier::from_settings(&settings.notifications));
    let controller = LifecycleController::new(runtime, Arc::clone(&client) as Arc<dyn StatusProbe>);

    let result = monitor(&settings, &client, &notifier, &controller, &requests, &mode).await;

    controller.shutdown().await;
    result
}

async fn monitor(
    settings: &Settings,
    client: &Arc<TwitchClient>,
    notifier: &Arc<SystemNotifier>,
    controller: &LifecycleController,
    requests: &ShutdownRequest,
    mode: &SignalMode,
) -> Result<()> {
    let Some(username) = prompt::prompt_username(mode, requests)
        .await
        .context("Failed to read username")?
    else {
        return Ok(());
    };

    let session = Session {
        probe: Arc::clone(client) as Arc<dyn StatusProbe>,
        notifier: Arc::clone(notifier) as Arc<dyn Notifier>,
        config: settings.polling.poll_config(),
        failure_threshold: settings.polling.failure_threshold,
    };

    let Some(broadcaster) = session.begin(username, requests, controller).await? else {
        return Ok(());
    };
    if settings.notifications.profile_icon {
        prepare_profile_icon(client, notifier, &broadcaster).await;
    }

    prompt::spawn_quit_monitor(requests.clone());
    controller.wait(requests).await;
    Ok(())
}

/// Dependencies of one monitoring session.
struct Session {
    probe: Arc<dyn StatusProbe>,
    notifier: Arc<dyn Notifier>,
    config: PollConfig,
    failure_threshold: u32,
}

impl Session {
    /// Runs the existence check and, if the broadcaster exists, starts the
    /// poll loop. A pending shutdown request wins over the check.
    async fn begin(
        &self,
        username: Username,
        requests: &ShutdownRequest,
        controller: &LifecycleController,
    ) -> Result<Option<Broadcaster>> {
        let found = tokio::select! {
            biased;

            _ = requests.requested() => None,
            found = check_streamer_existence(self.probe.as_ref(), self.notifier.as_ref(), &username) => found,
        };
        let Some(broadcaster) = found else {
            return Ok(None);
        };

        let poll = PollLoop::new(
            username,
            self.config,
            Arc::clone(&self.probe),
            Arc::clone(&self.notifier),
            controller.run_flag(),
            controller.runtime().clone(),
        )
        .with_failure_threshold(self.failure_threshold);

        controller.start(poll).await?;
        Ok(Some(broadcaster))
    }
}

async fn prepare_profile_icon(client: &TwitchClient, notifier: &SystemNotifier, broadcaster: &Broadcaster) {
    let Some(url) = broadcaster.profile_image_url.as_deref() else {
        return;
    };
    let Some(path) = TwitchClient::profile_icon_path(&broadcaster.login) else {
        return;
    };

    match client.download_profile_image(url, &path).await {
        Ok(()) => notifier.set_icon(path).await,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "Failed to download profile image");
        }
    }
}
