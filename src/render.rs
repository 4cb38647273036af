//! Terminal rendering of structured responses.
//!
//! [`format_for_display`] is the only place a [`StructuredResponse`] turns
//! into display blocks; live answers and replayed history both go through
//! it, so they always look the same.

use std::fmt;

use crate::models::{ConversationTurn, Role, SourceRef, StructuredResponse, TurnContent};
use crate::page::is_pdf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    Link,
    Document,
}

impl IconKind {
    fn glyph(self) -> &'static str {
        match self {
            IconKind::Link => "🔗",
            IconKind::Document => "📄",
        }
    }
}

/// Links for web sources, documents for everything else.
pub fn icon_for(source: &str) -> IconKind {
    if source.starts_with("http") {
        IconKind::Link
    } else {
        IconKind::Document
    }
}

/// Display label for a source. Only PDFs carry a page annotation.
pub fn label_with_page(source: &str, page: Option<u32>) -> String {
    match page {
        Some(page) if is_pdf(source) => format!("{} (page {})", source, page),
        _ => source.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Markdown(String),
    Success { label: String, icon: IconKind },
    Info { label: String, icon: IconKind },
    Divider,
    Heading(String),
}

/// An ordered list of display blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rendered {
    pub blocks: Vec<Block>,
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            match block {
                Block::Markdown(text) => writeln!(f, "{}", text)?,
                Block::Success { label, icon } => writeln!(f, "  ✔ {} {}", icon.glyph(), label)?,
                Block::Info { label, icon } => writeln!(f, "  - {} {}", icon.glyph(), label)?,
                Block::Divider => writeln!(f, "{}", "─".repeat(40))?,
                Block::Heading(text) => writeln!(f, "{}", text)?,
            }
        }
        Ok(())
    }
}

fn source_block(source: &SourceRef, success: bool) -> Block {
    let label = label_with_page(&source.source, source.page);
    let icon = icon_for(&source.source);
    if success {
        Block::Success { label, icon }
    } else {
        Block::Info { label, icon }
    }
}

pub fn format_for_display(response: &StructuredResponse) -> Rendered {
    let mut blocks = Vec::new();
    match response {
        StructuredResponse::SearchHit(hit) => {
            blocks.push(Block::Markdown(hit.main_message.clone()));
            blocks.push(source_block(&hit.main, true));
            if let Some(sub) = &hit.sub {
                blocks.push(Block::Markdown(sub.message.clone()));
                blocks.extend(sub.choices.iter().map(|c| source_block(c, false)));
            }
        }
        StructuredResponse::SearchNoMatch { message } => {
            blocks.push(Block::Markdown(message.clone()));
        }
        StructuredResponse::Inquiry(answer) => {
            blocks.push(Block::Markdown(answer.answer.clone()));
            if let Some(sources) = &answer.sources {
                blocks.push(Block::Divider);
                blocks.push(Block::Heading(sources.heading.clone()));
                blocks.extend(sources.items.iter().map(|s| source_block(s, false)));
            }
        }
    }
    Rendered { blocks }
}

/// Replay a conversation log, one rendered entry per turn.
pub fn render_conversation(turns: &[ConversationTurn]) -> String {
    let mut out = String::new();
    for turn in turns {
        let speaker = match turn.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        let body = match &turn.content {
            TurnContent::Text(text) => format!("{}\n", text),
            TurnContent::Response(response) => format_for_display(response).to_string(),
        };
        out.push_str(&format!("[{}]\n{}\n", speaker, body));
    }
    out
}

/// Greeting shown when an interactive session starts.
pub fn welcome() -> Rendered {
    Rendered {
        blocks: vec![
            Block::Markdown(
                "Hello. I answer from the indexed internal documents. Pick a mode with \
                 `:mode search` or `:mode inquiry`, then type a message."
                    .to_string(),
            ),
            Block::Heading("search".to_string()),
            Block::Markdown(
                "Find where information related to your input lives.\n  e.g. minutes of the meeting on staff training policy"
                    .to_string(),
            ),
            Block::Heading("inquiry".to_string()),
            Block::Markdown(
                "Get an answer grounded in the documents.\n  e.g. list the employees in the HR department"
                    .to_string(),
            ),
        ],
    }
}
