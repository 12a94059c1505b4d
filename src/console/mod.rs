//! Interactive console.
//!
//! Terminal input and output for the bridges.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `line_source` | Completed input lines and the close event |
//! | `renderer` | Categorized, TTY-aware output |
//! | `passphrase` | Masked passphrase prompt |

// ============================================================================
// Submodules
// ============================================================================

/// Terminal line source.
pub mod line_source;

/// Masked passphrase prompt.
pub mod passphrase;

/// Output renderer.
pub mod renderer;

// ============================================================================
// Re-exports
// ============================================================================

pub use line_source::{ConsoleEvent, ConsoleHandle, ConsoleState, LineSource};
pub use passphrase::prompt_passphrase;
pub use renderer::{Category, Color, Renderer, Style, TtyCheck};
