//! Text-mode collaborators for headless use

use std::io::{self, BufRead};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;
use crate::session::{Capture, Heard, Playback};

/// Reads one utterance per line
///
/// Lines are read on a detached thread so a pending read never holds up
/// shutdown. Waits for the user to finish typing instead of applying the
/// listen timeout; a blank line counts as unclear input.
pub struct ConsoleCapture {
    lines: mpsc::Receiver<io::Result<String>>,
}

impl ConsoleCapture {
    /// Read from standard input
    ///
    /// # Errors
    ///
    /// Returns error if the reader thread cannot be spawned
    pub fn stdin() -> Result<Self> {
        Self::from_reader(io::BufReader::new(io::stdin()))
    }

    /// Read from any line source
    ///
    /// # Errors
    ///
    /// Returns error if the reader thread cannot be spawned
    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Result<Self> {
        let (tx, lines) = mpsc::channel(16);

        std::thread::Builder::new()
            .name("console-input".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self { lines })
    }
}

#[async_trait(?Send)]
impl Capture for ConsoleCapture {
    async fn capture_utterance(&mut self, _timeout: Duration, _phrase_limit: Duration) -> Heard {
        match self.lines.recv().await {
            Some(Ok(line)) if line.trim().is_empty() => Heard::Unclear,
            Some(Ok(line)) => Heard::Utterance(line),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "failed to read input");
                Heard::Closed
            }
            None => Heard::Closed,
        }
    }
}

/// Prints replies as `name: text`
pub struct ConsolePlayback {
    name: String,
}

impl ConsolePlayback {
    /// Create a printer labelled with the assistant name
    #[must_use]
    pub const fn new(name: String) -> Self {
        Self { name }
    }
}

#[async_trait(?Send)]
impl Playback for ConsolePlayback {
    async fn speak(&mut self, text: &str) {
        println!("{}: {text}", self.name);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::mpsc as std_mpsc;
    use std::time::Instant;

    use super::*;

    /// Blocks every read until its sender is dropped
    struct Stalled(std_mpsc::Receiver<()>);

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_reads_lines_until_closed() {
        let input: &[u8] = b"What time is it\n\n  \nbye\n";
        let mut capture = ConsoleCapture::from_reader(input).unwrap();
        let wait = Duration::from_secs(1);

        assert_eq!(
            capture.capture_utterance(wait, wait).await,
            Heard::Utterance("What time is it".to_string())
        );
        assert_eq!(capture.capture_utterance(wait, wait).await, Heard::Unclear);
        assert_eq!(capture.capture_utterance(wait, wait).await, Heard::Unclear);
        assert_eq!(
            capture.capture_utterance(wait, wait).await,
            Heard::Utterance("bye".to_string())
        );
        assert_eq!(capture.capture_utterance(wait, wait).await, Heard::Closed);
    }

    #[test]
    fn test_blocked_read_does_not_hold_runtime_shutdown() {
        let (_unblock, rx) = std_mpsc::channel::<()>();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let started = Instant::now();

        rt.block_on(async {
            let mut capture = ConsoleCapture::from_reader(io::BufReader::new(Stalled(rx))).unwrap();
            let wait = Duration::from_secs(1);

            tokio::select! {
                heard = capture.capture_utterance(wait, wait) => panic!("unexpected input: {heard:?}"),
                () = tokio::time::sleep(Duration::from_millis(50)) => {}
            }
        });
        drop(rt);

        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
