use crate::core::models::Username;
use crate::daemon::{ShutdownRequest, SignalMode};
use std::io::{self, BufRead, Write};
use tokio::sync::oneshot;

pub const USERNAME_PROMPT: &str = "Enter Twitch username: ";

/// Pending result of one line read from the terminal. `Ok(None)` means
/// end of input.
pub type LineRead = oneshot::Receiver<io::Result<Option<String>>>;

/// Reads one line from stdin on a dedicated thread.
///
/// A blocked terminal read must not hold up signal delivery or runtime
/// shutdown, so it runs on a detached OS thread rather than the blocking pool.
pub fn read_stdin_line(prompt: &str) -> LineRead {
    let (tx, rx) = oneshot::channel();
    let prompt = prompt.to_string();

    std::thread::spawn(move || {
        let result = (|| -> io::Result<Option<String>> {
            let mut stdout = io::stdout();
            write!(stdout, "{prompt}")?;
            stdout.flush()?;

            let mut line = String::new();
            let read = io::stdin().lock().read_line(&mut line)?;
            Ok((read > 0).then_some(line))
        })();
        let _ = tx.send(result);
    });

    rx
}

/// Asks for a username until a valid one is entered.
///
/// Interrupts are suppressed for the duration of each read. Returns `None`
/// on end of input or when shutdown is requested while waiting.
pub async fn prompt_username(
    mode: &SignalMode,
    requests: &ShutdownRequest,
) -> io::Result<Option<Username>> {
    prompt_username_with(mode, requests, read_stdin_line).await
}

pub async fn prompt_username_with<F>(
    mode: &SignalMode,
    requests: &ShutdownRequest,
    mut read_line: F,
) -> io::Result<Option<Username>>
where
    F: FnMut(&str) -> LineRead,
{
    loop {
        let line = {
            let _guard = mode.suppress_interrupt();
            let pending = read_line(USERNAME_PROMPT);
            tokio::select! {
                _ = requests.requested() => return Ok(None),
                line = pending => line.map_err(|_| {
                    io::Error::new(io::ErrorKind::BrokenPipe, "input reader exited")
                })??,
            }
        };

        let Some(line) = line else {
            println!();
            tracing::info!("Input closed before a username was entered");
            return Ok(None);
        };

        match Username::parse(&line) {
            Ok(username) => return Ok(Some(username)),
            Err(e) => println!("{e}"),
        }
    }
}

pub fn is_quit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("quit")
}

/// Watches stdin for `quit` and turns it into a shutdown request.
pub fn spawn_quit_monitor(requests: ShutdownRequest) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if requests.is_requested() {
                break;
            }
            if is_quit_command(&line) {
                tracing::info!("Quit command received");
                requests.request();
                break;
            }
        }
        tracing::debug!("Quit monitor stopped");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    fn scripted(lines: Vec<Option<&'static str>>) -> impl FnMut(&str) -> LineRead {
        let mut lines: VecDeque<_> = lines.into();
        move |prompt: &str| {
            assert_eq!(prompt, USERNAME_PROMPT);
            let (tx, rx) = oneshot::channel();
            let line = lines.pop_front().expect("prompt read more lines than scripted");
            let _ = tx.send(Ok(line.map(str::to_string)));
            rx
        }
    }

    #[tokio::test]
    async fn test_reprompts_until_valid() {
        let mode = SignalMode::new();
        let requests = ShutdownRequest::new();
        let read = scripted(vec![Some("\n"), Some("not valid\n"), Some("  good_name \n")]);

        let username = prompt_username_with(&mode, &requests, read).await.unwrap();

        assert_eq!(username.unwrap().as_str(), "good_name");
        assert!(!mode.interrupt_suppressed());
    }

    #[tokio::test]
    async fn test_end_of_input_returns_none() {
        let mode = SignalMode::new();
        let requests = ShutdownRequest::new();

        let username = prompt_username_with(&mode, &requests, scripted(vec![None]))
            .await
            .unwrap();

        assert!(username.is_none());
        assert!(!mode.interrupt_suppressed());
    }

    #[tokio::test]
    async fn test_interrupts_suppressed_only_while_reading() {
        let mode = SignalMode::new();
        let requests = ShutdownRequest::new();
        let observed = mode.clone();

        let read = move |_: &str| {
            assert!(observed.interrupt_suppressed());
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(Ok(Some("viewer\n".to_string())));
            rx
        };

        prompt_username_with(&mode, &requests, read).await.unwrap();
        assert!(!mode.interrupt_suppressed());
    }

    #[tokio::test]
    async fn test_shutdown_request_abandons_read_and_restores_mode() {
        let mode = SignalMode::new();
        let requests = ShutdownRequest::new();
        let mut held = Vec::new();

        let read = |_: &str| {
            let (tx, rx) = oneshot::channel();
            held.push(tx);
            rx
        };

        let trigger = requests.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.request();
        });

        let username = tokio::time::timeout(
            Duration::from_secs(5),
            prompt_username_with(&mode, &requests, read),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(username.is_none());
        assert!(!mode.interrupt_suppressed());
    }

    #[tokio::test]
    async fn test_reader_failure_is_an_error() {
        let mode = SignalMode::new();
        let requests = ShutdownRequest::new();

        let read = |_: &str| {
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(Err(io::Error::new(io::ErrorKind::Other, "tty gone")));
            rx
        };

        let result = prompt_username_with(&mode, &requests, read).await;
        assert!(result.is_err());
        assert!(!mode.interrupt_suppressed());
    }

    #[test]
    fn test_quit_command() {
        assert!(is_quit_command("quit"));
        assert!(is_quit_command("  QUIT \n"));
        assert!(!is_quit_command("quite"));
        assert!(!is_quit_command(""));
    }
}
