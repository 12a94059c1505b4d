//! Output renderer.
//!
//! Writes categorized messages to the terminal. On an interactive terminal
//! each message clears the input line, prints in color with a category
//! prefix, and re-renders the prompt. On a redirected stream only incoming
//! peer data is written, raw and newline-terminated, so the output can be
//! piped cleanly.
//!
//! # Example
//!
//! ```ignore
//! use wsbridge::console::{Category, Color, Renderer, Style};
//!
//! let mut renderer = Renderer::stdout(Style::default());
//! renderer.print(Category::Control, "Connected", Color::Green);
//! renderer.print(Category::Incoming, "hello", Color::Blue);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::io::{IsTerminal, Write};

// ============================================================================
// Constants
// ============================================================================

/// Prompt glyph.
pub const PROMPT: &str = "> ";

/// Erase the current line and move the cursor back over the prompt.
const CLEAR_LINE: &str = "\x1b[2K\x1b[3D";

// ============================================================================
// Color
// ============================================================================

/// ANSI foreground colors used by the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    /// Red
    Red,
    /// Green (control messages)
    Green,
    /// Yellow (errors)
    Yellow,
    /// Blue (incoming data)
    Blue,
    /// Terminal default
    Default,
}

impl Color {
    /// Returns the escape sequence for this color.
    #[must_use]
    pub const fn ansi(self) -> &'static str {
        match self {
            Self::Red => "\x1b[31m",
            Self::Green => "\x1b[32m",
            Self::Yellow => "\x1b[33m",
            Self::Blue => "\x1b[34m",
            Self::Default => "\x1b[39m",
        }
    }
}

// ============================================================================
// Category
// ============================================================================

/// Message category; decides rendering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Data received from the peer.
    Incoming,
    /// Status and lifecycle notices.
    Control,
    /// Errors.
    Error,
}

impl Category {
    /// Returns the prefix printed before messages of this category.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Incoming => "< ",
            Self::Control => "",
            Self::Error => "error: ",
        }
    }
}

// ============================================================================
// Style
// ============================================================================

/// Which decorations are emitted on an interactive terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    /// Emit category prefixes.
    pub prefixes: bool,
    /// Emit ANSI colors.
    pub colors: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            prefixes: true,
            colors: true,
        }
    }
}

impl Style {
    /// Derives the style from session flags.
    ///
    /// Execute mode drops both prefixes and colors; `--no-color` drops only
    /// colors.
    #[must_use]
    pub const fn for_session(execute: bool, color: bool) -> Self {
        if execute {
            Self {
                prefixes: false,
                colors: false,
            }
        } else {
            Self {
                prefixes: true,
                colors: color,
            }
        }
    }
}

// ============================================================================
// TtyCheck
// ============================================================================

/// How the renderer decides whether output is interactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtyCheck {
    /// Ask the OS whether stdout is a terminal, on every call.
    Stdout,
    /// Fixed answer.
    Fixed(bool),
}

impl TtyCheck {
    /// Returns `true` if output is an interactive terminal.
    #[inline]
    #[must_use]
    pub fn is_tty(self) -> bool {
        match self {
            Self::Stdout => std::io::stdout().is_terminal(),
            Self::Fixed(tty) => tty,
        }
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Categorized terminal output.
///
/// Write failures are ignored; rendering never fails the session.
pub struct Renderer {
    /// Output stream.
    out: Box<dyn Write + Send + Sync>,
    /// Interactive-terminal check.
    tty: TtyCheck,
    /// Decorations.
    style: Style,
}

impl Renderer {
    /// Creates a renderer over an arbitrary writer.
    #[must_use]
    pub fn new(out: Box<dyn Write + Send + Sync>, tty: TtyCheck, style: Style) -> Self {
        Self { out, tty, style }
    }

    /// Creates a renderer writing to stdout.
    #[must_use]
    pub fn stdout(style: Style) -> Self {
        Self::new(Box::new(std::io::stdout()), TtyCheck::Stdout, style)
    }

    /// Prints a message of the given category.
    pub fn print(&mut self, category: Category, message: &str, color: Color) {
        if self.tty.is_tty() {
            self.clear();

            let (color, reset) = if self.style.colors {
                (color.ansi(), Color::Default.ansi())
            } else {
                ("", "")
            };
            let prefix = if self.style.prefixes {
                category.prefix()
            } else {
                ""
            };

            let _ = writeln!(self.out, "{color}{prefix}{message}{reset}");
            self.prompt();
        } else if category == Category::Incoming {
            let _ = writeln!(self.out, "{message}");
            let _ = self.out.flush();
        }
    }

    /// Erases the current input line.
    pub fn clear(&mut self) {
        if self.tty.is_tty() {
            let _ = self.out.write_all(CLEAR_LINE.as_bytes());
            let _ = self.out.flush();
        }
    }

    /// Renders a fresh prompt.
    pub fn prompt(&mut self) {
        if self.tty.is_tty() {
            let _ = self.out.write_all(PROMPT.as_bytes());
            let _ = self.out.flush();
        }
    }
}

// ============================================================================
// Test Support
// ============================================================================

/// In-memory writer shared between a renderer and a test.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedBuffer(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    /// Returns everything written so far.
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Builds a renderer writing into this buffer.
    pub(crate) fn renderer(&self, tty: bool, style: Style) -> Renderer {
        Renderer::new(Box::new(self.clone()), TtyCheck::Fixed(tty), style)
    }

    /// Waits until `needle` has been written at least `count` times.
    ///
    /// Panics after five seconds.
    pub(crate) async fn wait_for(&self, needle: &str, count: usize) {
        let poll = async {
            while self.contents().matches(needle).count() < count {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(std::time::Duration::from_secs(5), poll)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {needle:?} x{count}"));
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tty_print_format() {
        let buffer = SharedBuffer::default();
        let mut renderer = buffer.renderer(true, Style::default());

        renderer.print(Category::Incoming, "hello", Color::Blue);

        assert_eq!(
            buffer.contents(),
            "\x1b[2K\x1b[3D\x1b[34m< hello\x1b[39m\n> "
        );
    }

    #[test]
    fn test_tty_error_prefix() {
        let buffer = SharedBuffer::default();
        let mut renderer = buffer.renderer(true, Style::default());

        renderer.print(Category::Error, "boom", Color::Yellow);

        assert!(buffer.contents().contains("\x1b[33merror: boom\x1b[39m\n"));
    }

    #[test]
    fn test_no_color_keeps_prefix() {
        let buffer = SharedBuffer::default();
        let mut renderer = buffer.renderer(true, Style::for_session(false, false));

        renderer.print(Category::Incoming, "hello", Color::Blue);

        assert_eq!(buffer.contents(), "\x1b[2K\x1b[3D< hello\n> ");
    }

    #[test]
    fn test_execute_style_is_plain() {
        let buffer = SharedBuffer::default();
        let mut renderer = buffer.renderer(true, Style::for_session(true, true));

        renderer.print(Category::Incoming, "hello", Color::Blue);

        assert_eq!(buffer.contents(), "\x1b[2K\x1b[3Dhello\n> ");
    }

    #[test]
    fn test_non_tty_only_incoming() {
        let buffer = SharedBuffer::default();
        let mut renderer = buffer.renderer(false, Style::default());

        renderer.print(Category::Control, "Connected", Color::Green);
        renderer.print(Category::Error, "boom", Color::Yellow);
        renderer.print(Category::Incoming, "data", Color::Blue);
        renderer.clear();
        renderer.prompt();

        assert_eq!(buffer.contents(), "data\n");
    }

    #[test]
    fn test_category_prefixes() {
        assert_eq!(Category::Incoming.prefix(), "< ");
        assert_eq!(Category::Control.prefix(), "");
        assert_eq!(Category::Error.prefix(), "error: ");
    }
}
