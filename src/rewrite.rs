//! History-aware query rewriting.
//!
//! Follow-up questions ("what about the second one?") are rewritten into
//! standalone queries before retrieval. With no history the input is used
//! as-is and the model is not called.

use anyhow::Result;

use crate::llm::{ChatMessage, ChatModel};
use crate::models::Exchange;
use crate::prompts::REWRITE_INSTRUCTION;

/// Build the message list: instruction, prior exchanges, then the new input.
pub fn history_messages(system: &str, history: &[Exchange], input: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage::system(system));
    for exchange in history {
        messages.push(ChatMessage::user(exchange.question.clone()));
        messages.push(ChatMessage::assistant(exchange.answer.clone()));
    }
    messages.push(ChatMessage::user(input));
    messages
}

/// Produce a standalone query for `input` given `history`.
pub async fn rewrite_query(
    model: &dyn ChatModel,
    history: &[Exchange],
    input: &str,
) -> Result<String> {
    if history.is_empty() {
        return Ok(input.to_string());
    }

    let messages = history_messages(REWRITE_INSTRUCTION, history, input);
    let rewritten = model.complete(&messages).await?;
    let rewritten = rewritten.trim();
    if rewritten.is_empty() {
        Ok(input.to_string())
    } else {
        Ok(rewritten.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRole;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Echo {
        reply: String,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl ChatModel for Echo {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.calls.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.clone())
        }
    }

    fn echo(reply: &str) -> Echo {
        Echo {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_no_history_skips_model() {
        let model = echo("unused");
        let q = rewrite_query(&model, &[], "vacation policy").await.unwrap();
        assert_eq!(q, "vacation policy");
        assert!(model.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_sent_in_order() {
        let model = echo("  How many vacation days do new hires get?\n");
        let history = vec![Exchange {
            question: "vacation policy".into(),
            answer: "20 days per year.".into(),
        }];
        let q = rewrite_query(&model, &history, "and for new hires?")
            .await
            .unwrap();
        assert_eq!(q, "How many vacation days do new hires get?");

        let calls = model.calls.lock().unwrap();
        let roles: Vec<ChatRole> = calls[0].iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User
            ]
        );
        assert_eq!(calls[0][3].content, "and for new hires?");
    }

    #[tokio::test]
    async fn test_blank_rewrite_falls_back_to_input() {
        let model = echo("   ");
        let history = vec![Exchange {
            question: "a".into(),
            answer: "b".into(),
        }];
        assert_eq!(rewrite_query(&model, &history, "c").await.unwrap(), "c");
    }
}
