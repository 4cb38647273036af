//! Error types at the session boundary.
//!
//! Internals propagate `anyhow::Error`; the two entry points a front end
//! calls ([`Session::initialize`](crate::session::Session::initialize) and
//! [`Session::get_response`](crate::session::Session::get_response)) map
//! failures onto [`StartupError`] and [`TurnError`].

use std::path::PathBuf;
use thiserror::Error;

/// Line appended to every user-facing error message.
pub const COMMON_ERROR_MESSAGE: &str =
    "If the problem persists, please contact the administrator.";

/// Fatal failures that abort a session before any chat is possible.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{var} is not set")]
    MissingCredential { var: String },

    #[error("source tree unreadable: {}", path.display())]
    SourceTree {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("no chunks were produced from the configured sources; refusing to build an empty index")]
    EmptyIndex,

    #[error("embedding failed while building the index: {0}")]
    Embedding(#[source] anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(#[source] anyhow::Error),
}

impl StartupError {
    /// Generic message suitable for display.
    pub fn user_message(&self) -> String {
        build_error_message("Initialization failed.")
    }
}

/// A failed chat turn. Conversation state is left as it was before the turn.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("query rewriting failed: {0}")]
    Rewrite(#[source] anyhow::Error),

    #[error("retrieval failed: {0}")]
    Retrieval(#[source] anyhow::Error),

    #[error("answer generation failed: {0}")]
    Generation(#[source] anyhow::Error),
}

impl TurnError {
    /// Generic message suitable for display, without internal detail.
    pub fn user_message(&self) -> String {
        build_error_message("Failed to get an answer.")
    }
}

/// Join a display message with the common administrator-contact line.
pub fn build_error_message(message: &str) -> String {
    [message, COMMON_ERROR_MESSAGE].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_error_hides_detail() {
        let err = TurnError::Generation(anyhow::anyhow!("HTTP 500: upstream secret"));
        let msg = err.user_message();
        assert!(!msg.contains("secret"));
        assert!(msg.ends_with(COMMON_ERROR_MESSAGE));
    }

    #[test]
    fn test_build_error_message() {
        assert_eq!(
            build_error_message("Oops."),
            format!("Oops.\n{}", COMMON_ERROR_MESSAGE)
        );
    }
}
