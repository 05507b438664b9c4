use crate::core::failures::FailureTracker;
use crate::core::models::{
    format_stream_started, stream_url, LiveInfo, PollConfig, StreamStatus, Username, STREAM_STARTED_TITLE,
};
use crate::core::notifications::Notifier;
use crate::daemon::lifecycle::RunFlag;
use crate::providers::StatusProbe;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Checking,
    IdleWait,
    StreamingWait,
    Stopped,
}

/// Polls one broadcaster's live status until the run flag is cleared.
///
/// Each cycle probes once, announces an offline-to-live transition, then
/// sleeps for the interval matching the observed status. Failed probes keep
/// the previous status and retry after the normal interval. Sleeps end as
/// soon as the run flag is cleared; a probe already in flight is allowed to
/// finish.
pub struct PollLoop {
    username: Username,
    config: PollConfig,
    probe: Arc<dyn StatusProbe>,
    notifier: Arc<dyn Notifier>,
    run_flag: RunFlag,
    runtime: Handle,
    status: StreamStatus,
    failures: FailureTracker,
}

impl PollLoop {
    pub fn new(
        username: Username,
        config: PollConfig,
        probe: Arc<dyn StatusProbe>,
        notifier: Arc<dyn Notifier>,
        run_flag: RunFlag,
        runtime: Handle,
    ) -> Self {
        Self {
            username,
            config,
            probe,
            notifier,
            run_flag,
            runtime,
            status: StreamStatus::NotStreaming,
            failures: FailureTracker::default(),
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failures = FailureTracker::new(threshold);
        self
    }

    pub async fn run(mut self) {
        tracing::info!(
            username = %self.username,
            normal_interval_secs = self.config.normal_interval().as_secs(),
            streaming_interval_secs = self.config.streaming_interval().as_secs(),
            "Poll loop started"
        );

        let mut state = PollState::Checking;
        while state != PollState::Stopped {
            state = match state {
                PollState::Checking if !self.run_flag.is_running() => PollState::Stopped,
                PollState::Checking => self.check().await,
                PollState::IdleWait => {
                    self.wait(self.config.interval_for(StreamStatus::NotStreaming)).await
                }
                PollState::StreamingWait => {
                    self.wait(self.config.interval_for(StreamStatus::Streaming)).await
                }
                PollState::Stopped => PollState::Stopped,
            };
        }

        tracing::info!(username = %self.username, "Poll loop stopped");
    }

    async fn wait(&self, interval: Duration) -> PollState {
        tokio::select! {
            biased;

            _ = self.run_flag.stopped() => PollState::Stopped,
            _ = tokio::time::sleep(interval) => PollState::Checking,
        }
    }

    async fn check(&mut self) -> PollState {
        // The probe runs as its own task so a panic inside it surfaces as a
        // JoinError instead of tearing down the loop.
        let probe = Arc::clone(&self.probe);
        let username = self.username.clone();
        let result = self
            .runtime
            .spawn(async move { probe.live_info(&username).await })
            .await;

        match result {
            Ok(Ok(info)) => self.on_live_info(info).await,
            Ok(Err(e)) => {
                self.on_failure(&e, "Failed to check stream status");
                PollState::IdleWait
            }
            Err(e) => {
                self.on_failure(&e, "Unexpected error while checking stream status");
                PollState::IdleWait
            }
        }
    }

    async fn on_live_info(&mut self, info: LiveInfo) -> PollState {
        if self.failures.is_failing() {
            let failures = self.failures.record_success();
            tracing::info!(
                username = %self.username,
                failures,
                "Stream status check recovered"
            );
        }

        let status = StreamStatus::from_live_info(&info);
        tracing::info!(
            username = %self.username,
            %status,
            started_at = ?info.started_at,
            "Checking stream status"
        );

        let previous = std::mem::replace(&mut self.status, status);
        match status {
            StreamStatus::Streaming => {
                if previous == StreamStatus::NotStreaming {
                    self.announce(&info).await;
                }
                PollState::StreamingWait
            }
            StreamStatus::NotStreaming => PollState::IdleWait,
        }
    }

    async fn announce(&self, info: &LiveInfo) {
        let display_name = info
            .display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(self.username.as_str());
        let title = info.title.as_deref().unwrap_or_default();
        let message = format_stream_started(self.username.as_str(), display_name, title);

        let url = stream_url(self.username.as_str());

        self.notifier
            .notify_link(&message, STREAM_STARTED_TITLE, &url)
            .await;
        println!("{message}");
    }

    fn on_failure(&mut self, error: &dyn std::error::Error, context: &str) {
        self.failures.record_failure();
        let failures = self.failures.consecutive_failures();
        let retry_secs = self.config.normal_interval().as_secs();

        if self.failures.is_persistent() {
            tracing::error!(
                username = %self.username,
                error = %error,
                consecutive_failures = failures,
                retry_secs,
                "{context}"
            );
        } else {
            tracing::warn!(
                username = %self.username,
                error = %error,
                consecutive_failures = failures,
                retry_secs,
                "{context}"
            );
        }
    }
}
