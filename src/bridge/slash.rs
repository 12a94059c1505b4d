//! Slash commands.
//!
//! With `--slash`, a typed line starting with `/` controls the connection
//! instead of being sent:
//!
//! | Command | Effect |
//! |---------|--------|
//! | `/ping [data]` | Send a ping frame |
//! | `/pong [data]` | Send a pong frame |
//! | `/close [code [reason]]` | Start the closing handshake (default 1000) |

use crate::error::{Error, Result};
use crate::transport::connection::CLOSE_NORMAL;

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    /// Send a ping with this payload.
    Ping(String),
    /// Send a pong with this payload.
    Pong(String),
    /// Close with this code and reason.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

impl SlashCommand {
    /// Parses a line that starts with `/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] for unknown commands or invalid close codes.
    pub fn parse(line: &str) -> Result<Self> {
        let body = line.strip_prefix('/').unwrap_or(line);
        let (name, rest) = body.split_once(' ').unwrap_or((body, ""));

        match name {
            "ping" => Ok(Self::Ping(rest.to_string())),
            "pong" => Ok(Self::Pong(rest.to_string())),
            "close" => Self::parse_close(rest.trim()),
            _ => Err(Error::usage("Unrecognized slash command.")),
        }
    }

    fn parse_close(args: &str) -> Result<Self> {
        if args.is_empty() {
            return Ok(Self::Close {
                code: CLOSE_NORMAL,
                reason: String::new(),
            });
        }

        let (code, reason) = args.split_once(' ').unwrap_or((args, ""));
        let code = code
            .parse::<u16>()
            .ok()
            .filter(|&c| is_sendable_close_code(c))
            .ok_or_else(|| Error::usage(format!("Invalid close code: {code}")))?;

        Ok(Self::Close {
            code,
            reason: reason.to_string(),
        })
    }
}

/// Codes an endpoint may put in a close frame.
fn is_sendable_close_code(code: u16) -> bool {
    matches!(code, 1000..=1003 | 1007..=1014 | 3000..=4999)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> SlashCommand {
        SlashCommand::parse(line).expect("valid command")
    }

    #[test]
    fn test_ping_and_pong() {
        assert_eq!(parse("/ping"), SlashCommand::Ping(String::new()));
        assert_eq!(parse("/ping hello there"), SlashCommand::Ping("hello there".into()));
        assert_eq!(parse("/pong x"), SlashCommand::Pong("x".into()));
    }

    #[test]
    fn test_close_defaults_to_normal() {
        assert_eq!(
            parse("/close"),
            SlashCommand::Close {
                code: 1000,
                reason: String::new()
            }
        );
    }

    #[test]
    fn test_close_with_code_and_reason() {
        assert_eq!(
            parse("/close 4000 going away now"),
            SlashCommand::Close {
                code: 4000,
                reason: "going away now".into()
            }
        );
    }

    #[test]
    fn test_invalid_close_codes() {
        assert!(SlashCommand::parse("/close abc").is_err());
        assert!(SlashCommand::parse("/close 1006").is_err());
        assert!(SlashCommand::parse("/close 70000").is_err());
    }

    #[test]
    fn test_unknown_command() {
        let err = SlashCommand::parse("/foo").expect_err("must fail");
        assert_eq!(err.to_string(), "Unrecognized slash command.");
    }
}
