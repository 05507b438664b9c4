use crate::core::settings::{NotificationBackend, NotificationFormat, NotificationSettings};
use async_trait::async_trait;
use notify_rust::Notification;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::{oneshot, RwLock};

const APP_NAME: &str = "stream-watch";
const DISPLAY_TIMEOUT_MS: u32 = 5000;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification program not found: {0}")]
    ProgramNotFound(String),
    #[error("failed to run {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("notification did not complete within {0:?}")]
    TimedOut(Duration),
    #[error("desktop notification failed: {0}")]
    Desktop(#[from] notify_rust::error::Error),
    #[error("notification worker exited without reporting")]
    WorkerLost,
}

/// Delivers a message to the user. Implementations never fail outward.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str, title: &str);

    /// Like [`Notifier::notify`], with a link the user can open.
    async fn notify_link(&self, message: &str, title: &str, _url: &str) {
        self.notify(message, title).await;
    }
}

#[derive(Debug, Clone)]
enum Delivery {
    Desktop,
    Command { program: String, args: Vec<String> },
}

pub struct SystemNotifier {
    delivery: Delivery,
    format: NotificationFormat,
    timeout: Duration,
    icon: RwLock<Option<PathBuf>>,
}

impl SystemNotifier {
    pub fn from_settings(settings: &NotificationSettings) -> Self {
        let delivery = match settings.backend {
            NotificationBackend::Desktop => Delivery::Desktop,
            NotificationBackend::Command => {
                let mut parts = settings.command.iter().cloned();
                Delivery::Command {
                    program: parts.next().unwrap_or_default(),
                    args: parts.collect(),
                }
            }
        };

        Self {
            delivery,
            format: settings.format,
            timeout: settings.timeout(),
            icon: RwLock::new(None),
        }
    }

    pub async fn set_icon(&self, icon: PathBuf) {
        tracing::debug!(icon = %icon.display(), "Using notification icon");
        *self.icon.write().await = Some(icon);
    }

    pub async fn deliver(
        &self,
        message: &str,
        title: &str,
        url: Option<&str>,
    ) -> Result<(), NotificationError> {
        match &self.delivery {
            Delivery::Desktop => {
                let icon = self.icon.read().await.clone();
                self.deliver_desktop(message, title, url, icon).await
            }
            Delivery::Command { program, args } => {
                let rendered = render_args(args, message, title, url.unwrap_or_default());
                self.deliver_command(program, &rendered).await
            }
        }
    }

    /// Delivers, falling back to a text report on `out` when delivery fails.
    pub async fn notify_or_report<W: Write + Send>(
        &self,
        out: &mut W,
        message: &str,
        title: &str,
        url: Option<&str>,
    ) {
        match self.deliver(message, title, url).await {
            Ok(()) => {
                tracing::info!(title, ?url, "Sent notification");
            }
            Err(e) => {
                tracing::error!(error = %e, title, "Notification failed");
                if let Err(e) = write_fallback(out, message, title, url) {
                    tracing::warn!(error = %e, "Failed to write notification fallback");
                }
            }
        }
    }

    async fn deliver_desktop(
        &self,
        message: &str,
        title: &str,
        url: Option<&str>,
        icon: Option<PathBuf>,
    ) -> Result<(), NotificationError> {
        let (tx, rx) = oneshot::channel();
        let summary = title.to_string();
        let body = match url {
            Some(url) => format!("{message}\n{url}"),
            None => message.to_string(),
        };
        // Dialogs stay on screen until dismissed.
        let display_timeout = match self.format {
            NotificationFormat::Notification => {
                notify_rust::Timeout::Milliseconds(DISPLAY_TIMEOUT_MS)
            }
            NotificationFormat::Dialog => notify_rust::Timeout::Never,
        };

        // show() blocks on the notification service; keep it off the runtime.
        std::thread::spawn(move || {
            let mut notification = Notification::new();
            notification
                .summary(&summary)
                .body(&body)
                .appname(APP_NAME)
                .timeout(display_timeout);
            if let Some(icon) = icon {
                notification.icon(&icon.to_string_lossy());
            }
            let _ = tx.send(notification.show().map(|_| ()));
        });

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result.map_err(NotificationError::from),
            Ok(Err(_)) => Err(NotificationError::WorkerLost),
            Err(_) => Err(NotificationError::TimedOut(self.timeout)),
        }
    }

    async fn deliver_command(&self, program: &str, args: &[String]) -> Result<(), NotificationError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => NotificationError::ProgramNotFound(program.to_string()),
                _ => NotificationError::Launch {
                    program: program.to_string(),
                    source: e,
                },
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| NotificationError::TimedOut(self.timeout))?
            .map_err(|e| NotificationError::Launch {
                program: program.to_string(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(NotificationError::Failed {
                program: program.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for SystemNotifier {
    async fn notify(&self, message: &str, title: &str) {
        self.notify_or_report(&mut io::stdout(), message, title, None)
            .await;
    }

    async fn notify_link(&self, message: &str, title: &str, url: &str) {
        self.notify_or_report(&mut io::stdout(), message, title, Some(url))
            .await;
    }
}

fn write_fallback(
    out: &mut impl Write,
    message: &str,
    title: &str,
    url: Option<&str>,
) -> io::Result<()> {
    writeln!(out, "Failed to send notification")?;
    writeln!(out, "[{title}] {message}")?;
    if let Some(url) = url {
        writeln!(out, "{url}")?;
    }
    out.flush()
}

fn render_args(args: &[String], message: &str, title: &str, url: &str) -> Vec<String> {
    args.iter()
        .map(|arg| {
            arg.replace("{message}", message)
                .replace("{title}", title)
                .replace("{url}", url)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_notifier(command: &[&str], timeout_secs: u64) -> SystemNotifier {
        SystemNotifier::from_settings(&NotificationSettings {
            backend: NotificationBackend::Command,
            format: NotificationFormat::Notification,
            command: command.iter().map(|s| s.to_string()).collect(),
            timeout_secs,
            profile_icon: false,
        })
    }

    #[test]
    fn test_render_args_substitutes_placeholders() {
        let args = vec![
            "script.applescript".to_string(),
            "{message}".to_string(),
            "{title}".to_string(),
            "--label={title}: {message}".to_string(),
            "{url}".to_string(),
        ];
        let rendered = render_args(
            &args,
            "a is live",
            "Stream Started",
            "https://www.twitch.tv/a",
        );
        assert_eq!(
            rendered,
            vec![
                "script.applescript",
                "a is live",
                "Stream Started",
                "--label=Stream Started: a is live",
                "https://www.twitch.tv/a",
            ]
        );
    }

    #[test]
    fn test_render_args_without_url_leaves_it_empty() {
        let args = vec!["{title}".to_string(), "open {url}".to_string()];
        let rendered = render_args(&args, "hello", "Streamer Found", "");
        assert_eq!(rendered, vec!["Streamer Found", "open "]);
    }

    #[tokio::test]
    async fn test_missing_program_is_reported() {
        let notifier = command_notifier(&["/nonexistent/stream-watch-notifier", "{message}"], 5);
        let err = notifier.deliver("hello", "title", None).await.unwrap_err();
        assert!(matches!(err, NotificationError::ProgramNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_success() {
        let notifier = command_notifier(&["true", "{message}", "{title}"], 5);
        assert!(notifier.deliver("hello", "title", None).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_failure_status() {
        let notifier = command_notifier(&["false"], 5);
        let err = notifier.deliver("hello", "title", None).await.unwrap_err();
        assert!(matches!(err, NotificationError::Failed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_wait_is_bounded() {
        let notifier = command_notifier(&["sleep", "30"], 1);
        let started = std::time::Instant::now();
        let err = notifier.deliver("hello", "title", None).await.unwrap_err();
        assert!(matches!(err, NotificationError::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_failed_delivery_falls_back_to_text() {
        let notifier = command_notifier(&["/nonexistent/stream-watch-notifier"], 5);
        let mut out = Vec::new();

        notifier
            .notify_or_report(&mut out, "shroud has started streaming: ranked", "Stream Started", None)
            .await;

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Failed to send notification\n[Stream Started] shroud has started streaming: ranked\n"
        );
    }

    #[tokio::test]
    async fn test_fallback_includes_stream_url() {
        let notifier = command_notifier(&["/nonexistent/stream-watch-notifier", "{url}"], 5);
        let mut out = Vec::new();

        notifier
            .notify_or_report(&mut out, "a is live", "Stream Started", Some("https://www.twitch.tv/a"))
            .await;

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Failed to send notification\n[Stream Started] a is live\nhttps://www.twitch.tv/a\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_delivery_writes_nothing() {
        let notifier = command_notifier(&["true", "{url}"], 5);
        let mut out = Vec::new();

        notifier
            .notify_or_report(&mut out, "a is live", "Stream Started", Some("https://www.twitch.tv/a"))
            .await;

        assert!(out.is_empty());
    }
}
