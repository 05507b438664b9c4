//! In-memory probe and notifier used by the daemon tests.

use crate::core::models::{Broadcaster, LiveInfo, Username};
use crate::core::notifications::Notifier;
use crate::providers::{ApiError, StatusProbe};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub enum ProbeStep {
    Offline,
    Live(&'static str, &'static str),
    Fail,
    Panic,
}

#[derive(Debug, Clone)]
pub enum ResolveStep {
    Found,
    NotFound,
    Fail,
}

/// Answers `live_info` from a script; once the script runs out every probe
/// reports offline.
pub struct ScriptedProbe {
    steps: Mutex<VecDeque<ProbeStep>>,
    resolve: ResolveStep,
    delay: Option<Duration>,
    call_times: Mutex<Vec<Instant>>,
    events: Mutex<Vec<&'static str>>,
    resolve_calls: AtomicUsize,
    close_count: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(steps: Vec<ProbeStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            resolve: ResolveStep::Found,
            delay: None,
            call_times: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            resolve_calls: AtomicUsize::new(0),
            close_count: AtomicUsize::new(0),
        }
    }

    pub fn with_resolve(mut self, resolve: ResolveStep) -> Self {
        self.resolve = resolve;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn live_calls(&self) -> usize {
        self.call_times.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    fn failure() -> ApiError {
        ApiError::RateLimited { endpoint: "streams" }
    }
}

#[async_trait]
impl StatusProbe for ScriptedProbe {
    async fn resolve(&self, username: &Username) -> Result<Option<Broadcaster>, ApiError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        match self.resolve {
            ResolveStep::Found => Ok(Some(Broadcaster {
                id: "1234".to_string(),
                login: username.as_str().to_lowercase(),
                display_name: username.as_str().to_string(),
                profile_image_url: None,
            })),
            ResolveStep::NotFound => Ok(None),
            ResolveStep::Fail => Err(Self::failure()),
        }
    }

    async fn live_info(&self, _username: &Username) -> Result<LiveInfo, ApiError> {
        self.call_times.lock().unwrap().push(Instant::now());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.events.lock().unwrap().push("live_info");

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ProbeStep::Offline);

        match step {
            ProbeStep::Offline => Ok(LiveInfo::offline()),
            ProbeStep::Live(display_name, title) => Ok(LiveInfo {
                display_name: Some(display_name.to_string()),
                title: Some(title.to_string()),
                started_at: None,
            }),
            ProbeStep::Fail => Err(Self::failure()),
            ProbeStep::Panic => panic!("scripted probe panic"),
        }
    }

    async fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push("close");
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    links: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn links(&self) -> Vec<String> {
        self.links.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str, title: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((message.to_string(), title.to_string()));
    }

    async fn notify_link(&self, message: &str, title: &str, url: &str) {
        self.links.lock().unwrap().push(url.to_string());
        self.notify(message, title).await;
    }
}
