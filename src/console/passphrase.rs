//! Masked passphrase prompt.
//!
//! Reads a passphrase in raw mode, echoing `*` per character. The prompt
//! and echo go to stderr so stdout stays clean when redirected.

// ============================================================================
// Imports
// ============================================================================

use std::io::{Write, stderr};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Result of feeding one key to the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOutcome {
    /// A character was added; echo a mask.
    Masked,
    /// A character was removed; erase one mask.
    Erased,
    /// Nothing visible changed.
    Ignored,
    /// Enter was pressed.
    Submit,
    /// Ctrl+C, Ctrl+D or Escape.
    Cancel,
}

/// Restores cooked mode when dropped.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Prompts for a passphrase without blocking the runtime.
///
/// # Errors
///
/// - [`Error::Interrupted`] if the user cancels
/// - [`Error::Io`] if the terminal cannot be put in raw mode
pub async fn prompt_passphrase(label: &str) -> Result<String> {
    let label = label.to_string();
    tokio::task::spawn_blocking(move || read_masked(&label))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

// ============================================================================
// Internals
// ============================================================================

/// Blocking masked read.
fn read_masked(label: &str) -> Result<String> {
    let mut err = stderr();
    write!(err, "{label}")?;
    err.flush()?;

    let mut buffer = String::new();
    let outcome = {
        let _raw = RawModeGuard::enable()?;
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };

            match apply_key(&mut buffer, key) {
                KeyOutcome::Masked => write!(err, "*")?,
                KeyOutcome::Erased => write!(err, "\x08 \x08")?,
                KeyOutcome::Ignored => continue,
                done @ (KeyOutcome::Submit | KeyOutcome::Cancel) => break done,
            }
            err.flush()?;
        }
    };

    writeln!(err)?;

    match outcome {
        KeyOutcome::Cancel => Err(Error::Interrupted),
        _ => Ok(buffer),
    }
}

/// Applies one key event to the buffer.
fn apply_key(buffer: &mut String, key: KeyEvent) -> KeyOutcome {
    if key.kind == KeyEventKind::Release {
        return KeyOutcome::Ignored;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c' | 'd') if ctrl => KeyOutcome::Cancel,
        KeyCode::Esc => KeyOutcome::Cancel,
        KeyCode::Enter => KeyOutcome::Submit,
        KeyCode::Backspace => {
            if buffer.pop().is_some() {
                KeyOutcome::Erased
            } else {
                KeyOutcome::Ignored
            }
        }
        KeyCode::Char(_) if ctrl => KeyOutcome::Ignored,
        KeyCode::Char(c) => {
            buffer.push(c);
            KeyOutcome::Masked
        }
        _ => KeyOutcome::Ignored,
    }
}

// ============================================================================
// Tests
// ============================================================================
