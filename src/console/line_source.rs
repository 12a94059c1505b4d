//! Terminal line source.
//!
//! Turns terminal input into a stream of [`ConsoleEvent`]s: one
//! [`ConsoleEvent::Line`] per completed line and a single
//! [`ConsoleEvent::Close`] on EOF or Ctrl+C. Once closed the source is
//! exhausted.
//!
//! The source can be paused. Lines read while paused are discarded, never
//! queued for later delivery.
//!
//! # Example
//!
//! ```ignore
//! let mut source = LineSource::stdin(ConsoleHandle::new(ConsoleState::Active));
//! while let Some(event) = source.next().await {
//!     match event {
//!         ConsoleEvent::Line(line) => println!("{line}"),
//!         ConsoleEvent::Close => break,
//!     }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::future::{Future, pending};
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

// ============================================================================
// Types
// ============================================================================

/// Event produced by the line source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// A completed input line, without its terminator.
    Line(String),
    /// EOF or interrupt. Sent once.
    Close,
}

/// Whether input is being consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleState {
    /// Input is read and discarded.
    Paused,
    /// Input is delivered.
    Active,
}

type Interrupt = Pin<Box<dyn Future<Output = ()> + Send>>;

// ============================================================================
// ConsoleHandle
// ============================================================================

/// Shared pause switch for a [`LineSource`].
#[derive(Debug, Clone)]
pub struct ConsoleHandle {
    state: Arc<Mutex<ConsoleState>>,
}

impl ConsoleHandle {
    /// Creates a switch in the given state.
    #[must_use]
    pub fn new(initial: ConsoleState) -> Self {
        Self {
            state: Arc::new(Mutex::new(initial)),
        }
    }

    /// Suspends line delivery.
    pub fn pause(&self) {
        *self.state.lock() = ConsoleState::Paused;
    }

    /// Resumes line delivery.
    pub fn resume(&self) {
        *self.state.lock() = ConsoleState::Active;
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConsoleState {
        *self.state.lock()
    }

    /// Returns `true` while paused.
    #[inline]
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state() == ConsoleState::Paused
    }
}

// ============================================================================
// LineSource
// ============================================================================

/// Lazy sequence of terminal input lines.
pub struct LineSource {
    /// Events from the reader task.
    events: mpsc::UnboundedReceiver<ConsoleEvent>,
    /// Pause switch shared with the reader task.
    handle: ConsoleHandle,
}

impl LineSource {
    /// Reads lines from stdin; Ctrl+C closes the source.
    #[must_use]
    pub fn stdin(handle: ConsoleHandle) -> Self {
        Self::spawn(Some(BufReader::new(tokio::io::stdin())), handle, true)
    }

    /// Delivers only the Ctrl+C close event; stdin is left untouched.
    #[must_use]
    pub fn interrupt_only(handle: ConsoleHandle) -> Self {
        Self::spawn(None::<BufReader<tokio::io::Stdin>>, handle, true)
    }

    /// Spawns a reader task over `reader`.
    ///
    /// With `interrupt` set, Ctrl+C also closes the source.
    pub fn spawn<R>(reader: Option<R>, handle: ConsoleHandle, interrupt: bool) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let (tx, events) = mpsc::unbounded_channel();

        let interrupt: Interrupt = if interrupt {
            Box::pin(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                    pending::<()>().await;
                }
            })
        } else {
            Box::pin(pending())
        };

        tokio::spawn(Self::run_reader(
            reader.map(AsyncBufReadExt::lines),
            interrupt,
            handle.clone(),
            tx,
        ));

        Self { events, handle }
    }

    /// Creates a source fed by the returned sender instead of a reader.
    #[must_use]
    pub fn channel(handle: ConsoleHandle) -> (Self, mpsc::UnboundedSender<ConsoleEvent>) {
        let (tx, events) = mpsc::unbounded_channel();
        (Self { events, handle }, tx)
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the source is exhausted.
    pub async fn next(&mut self) -> Option<ConsoleEvent> {
        self.events.recv().await
    }

    /// Returns the pause switch.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> ConsoleHandle {
        self.handle.clone()
    }

    /// Reader task: forwards lines until EOF, error or interrupt.
    async fn run_reader<R>(
        mut lines: Option<Lines<R>>,
        mut interrupt: Interrupt,
        handle: ConsoleHandle,
        tx: mpsc::UnboundedSender<ConsoleEvent>,
    ) where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        loop {
            let next_line = async {
                match lines.as_mut() {
                    Some(lines) => lines.next_line().await,
                    None => pending().await,
                }
            };

            tokio::select! {
                line = next_line => match line {
                    Ok(Some(line)) => {
                        if handle.is_paused() {
                            trace!("Discarding line read while paused");
                            continue;
                        }
                        if tx.send(ConsoleEvent::Line(line)).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {
                        debug!("Terminal input reached EOF");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read terminal input");
                        break;
                    }
                },

                () = &mut interrupt => {
                    debug!("Interrupt received");
                    break;
                }
            }
        }

        let _ = tx.send(ConsoleEvent::Close);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    fn reader(input: &str) -> Option<Cursor<Vec<u8>>> {
        Some(Cursor::new(input.as_bytes().to_vec()))
    }

    fn active() -> ConsoleHandle {
        ConsoleHandle::new(ConsoleState::Active)
    }

    #[tokio::test]
    async fn test_lines_then_close() {
        let mut source = LineSource::spawn(reader("first\nsecond\n"), active(), false);

        assert_eq!(source.next().await, Some(ConsoleEvent::Line("first".into())));
        assert_eq!(source.next().await, Some(ConsoleEvent::Line("second".into())));
        assert_eq!(source.next().await, Some(ConsoleEvent::Close));
        assert_eq!(source.next().await, None);
    }

    #[tokio::test]
    async fn test_crlf_is_stripped() {
        let mut source = LineSource::spawn(reader("hello\r\n"), active(), false);

        assert_eq!(source.next().await, Some(ConsoleEvent::Line("hello".into())));
    }

    #[tokio::test]
    async fn test_paused_lines_are_discarded() {
        let paused = ConsoleHandle::new(ConsoleState::Paused);
        let mut source = LineSource::spawn(reader("a\nb\n"), paused, false);

        assert_eq!(source.next().await, Some(ConsoleEvent::Close));
        assert_eq!(source.next().await, None);
    }

    #[test]
    fn test_handle_pause_resume() {
        let (source, _tx) = LineSource::channel(ConsoleHandle::new(ConsoleState::Paused));
        let handle = source.handle();

        assert!(handle.is_paused());
        handle.resume();
        assert_eq!(handle.state(), ConsoleState::Active);
        handle.pause();
        assert!(source.handle().is_paused());
    }
}
