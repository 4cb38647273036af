//! `ask` and `chat` commands.
//!
//! Both build one [`Session`]; `chat` then reads lines from stdin until
//! `:quit` or end of input. Lines starting with `:` are REPL commands,
//! everything else is a user message.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::config::Config;
use crate::error::StartupError;
use crate::models::AnswerMode;
use crate::render::{format_for_display, render_conversation, welcome};
use crate::session::{Services, Session};

/// One parsed line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Message(String),
    SetMode(AnswerMode),
    History,
    Quit,
    Empty,
    Invalid(String),
}

impl ReplInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplInput::Empty;
        }
        let Some(command) = line.strip_prefix(':') else {
            return ReplInput::Message(line.to_string());
        };

        let mut parts = command.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("quit" | "q" | "exit"), None) => ReplInput::Quit,
            (Some("history"), None) => ReplInput::History,
            (Some("mode"), Some(mode)) => match mode.parse() {
                Ok(mode) => ReplInput::SetMode(mode),
                Err(e) => ReplInput::Invalid(e.to_string()),
            },
            _ => ReplInput::Invalid(format!(
                "Unknown command ':{}'. Use :mode <search|inquiry>, :history or :quit.",
                command
            )),
        }
    }
}

async fn start_session(config: &Config, mode: AnswerMode) -> Result<Session, StartupError> {
    let services = Services::from_config(config)?;
    let mut session = Session::initialize(config, services).await?;
    session.set_mode(mode);
    info!(session_id = %session.id(), mode = %mode, "Session started");
    Ok(session)
}

/// Answer a single question and exit.
pub async fn run_ask(config: &Config, question: &str, mode: AnswerMode) -> Result<()> {
    let mut session = start_session(config, mode).await?;
    match session.get_response(question).await {
        Ok(response) => {
            print!("{}", format_for_display(&response));
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Err(e.into())
        }
    }
}

/// Interactive loop over stdin. A failed turn is reported and the loop goes on.
pub async fn run_chat(config: &Config, mode: AnswerMode) -> Result<()> {
    let mut session = start_session(config, mode).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", welcome());
    loop {
        print!("[{}] > ", session.mode());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match ReplInput::parse(&line) {
            ReplInput::Empty => continue,
            ReplInput::Quit => break,
            ReplInput::History => print!("{}", render_conversation(session.turns())),
            ReplInput::SetMode(mode) => {
                session.set_mode(mode);
                println!("mode: {}", mode);
            }
            ReplInput::Invalid(msg) => println!("{}", msg),
            ReplInput::Message(text) => match session.get_response(&text).await {
                Ok(response) => println!("{}", format_for_display(&response)),
                Err(e) => println!("{}", e.user_message()),
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inputs() {
        assert_eq!(ReplInput::parse("   "), ReplInput::Empty);
        assert_eq!(
            ReplInput::parse(" vacation policy "),
            ReplInput::Message("vacation policy".into())
        );
        assert_eq!(ReplInput::parse(":quit"), ReplInput::Quit);
        assert_eq!(ReplInput::parse(":history"), ReplInput::History);
        assert_eq!(
            ReplInput::parse(":mode Inquiry"),
            ReplInput::SetMode(AnswerMode::Inquiry)
        );
    }

    #[test]
    fn test_parse_invalid_commands() {
        assert!(matches!(ReplInput::parse(":mode chat"), ReplInput::Invalid(_)));
        assert!(matches!(ReplInput::parse(":mode"), ReplInput::Invalid(_)));
        assert!(matches!(ReplInput::parse(":frobnicate"), ReplInput::Invalid(_)));
    }
}
