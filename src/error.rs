use thiserror::Error;

use crate::page::Component;

/// The primary error type of the console.
///
/// Application-level refusals (`{"success": false}`) are not errors: they are
/// turned into flash messages by the handler that issued the request. Every
/// variant here means the command could not be carried out at all.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The request never produced a response (connection refused, timeout, ...).
    #[error("Network error: {0}")]
    Transport(String),
    /// The server answered with a non-success status and no usable JSON body.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// The body could not be decoded into the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),
    /// An account-scoped command was issued before any account was selected.
    #[error("No email account selected")]
    NoAccountSelected,
    /// The page carries no `csrf_token` input, so no mutating request may be sent.
    #[error("CSRF token not found on page")]
    MissingCsrfToken,
    /// The command targets a component the current content does not contain.
    #[error("{0} is not on the current page")]
    NotBound(Component),
    /// The command names a row, entry or email the page does not know.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The command's own input was rejected before sending anything.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The transport could not be set up from the configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for ConsoleError {
    fn from(err: url::ParseError) -> Self {
        ConsoleError::InvalidInput(format!("invalid URL: {}", err))
    }
}

impl ConsoleError {
    /// Errors caused by the network or the server rather than by the command.
    pub fn is_remote(&self) -> bool {
        matches!(self, ConsoleError::Transport(_) | ConsoleError::Http { .. } | ConsoleError::Decode(_))
    }
}

/// A type alias for `Result<T, ConsoleError>`, used throughout the crate.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Converts a missing page element into a `NotFound` error.
pub trait OptionExt<T> {
    fn ok_or_missing(self, what: &str) -> ConsoleResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_missing(self, what: &str) -> ConsoleResult<T> {
        self.ok_or_else(|| ConsoleError::NotFound(what.to_string()))
    }
}

/// Local checks applied to user input before a request is built.
pub mod validation {
    use super::*;

    /// Rejects blank text for rows that the server would store verbatim.
    pub fn require_text(text: &str, field: &str) -> ConsoleResult<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ConsoleError::InvalidInput(format!("{} is required", field)));
        }
        Ok(trimmed.to_string())
    }

    /// Dates are sent the way the server parses them: `YYYY-MM-DD`.
    pub fn require_date(value: &str, field: &str) -> ConsoleResult<()> {
        chrono::NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map(|_| ())
            .map_err(|_| ConsoleError::InvalidInput(format!("{} must be a YYYY-MM-DD date, got '{}'", field, value)))
    }
}
