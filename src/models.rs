//! Core data models used throughout Document Concierge.
//!
//! These types represent the documents and chunks that flow through the
//! ingestion pipeline, and the conversation state and structured answers
//! produced per chat turn.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Loosely-typed document metadata (`source`, `page`, `title`, ...).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Raw document produced by a loader, before chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// The `source` metadata entry (file path or URL), if present.
    pub fn source(&self) -> Option<&str> {
        source_of(&self.metadata)
    }
}

/// A bounded fragment of a [`Document`], the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
    pub metadata: Metadata,
}

impl Chunk {
    pub fn source(&self) -> Option<&str> {
        source_of(&self.metadata)
    }
}

fn source_of(metadata: &Metadata) -> Option<&str> {
    metadata
        .get("source")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

/// Which kind of answer a chat turn produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    /// Point at the documents most relevant to the input.
    #[default]
    Search,
    /// Answer the question from retrieved context and cite sources.
    Inquiry,
}

impl FromStr for AnswerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "search" => Ok(AnswerMode::Search),
            "inquiry" => Ok(AnswerMode::Inquiry),
            other => anyhow::bail!("Unknown answer mode: '{}'. Use search or inquiry.", other),
        }
    }
}

impl fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerMode::Search => write!(f, "search"),
            AnswerMode::Inquiry => write!(f, "inquiry"),
        }
    }
}

/// A cited document location. `page` is 1-based when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Secondary candidates shown below the main hit in search mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubChoices {
    pub message: String,
    pub choices: Vec<SourceRef>,
}

/// A successful search-mode answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub main_message: String,
    pub main: SourceRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<SubChoices>,
}

/// Sources cited under an inquiry-mode answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceList {
    pub heading: String,
    pub items: Vec<SourceRef>,
}

/// An inquiry-mode answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InquiryAnswer {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<SourceList>,
}

/// Mode-specific payload produced by one chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructuredResponse {
    SearchHit(SearchHit),
    SearchNoMatch { message: String },
    Inquiry(InquiryAnswer),
}

impl StructuredResponse {
    pub fn mode(&self) -> AnswerMode {
        match self {
            StructuredResponse::SearchHit(_) | StructuredResponse::SearchNoMatch { .. } => {
                AnswerMode::Search
            }
            StructuredResponse::Inquiry(_) => AnswerMode::Inquiry,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Response(StructuredResponse),
}

/// One entry of the display-oriented conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: TurnContent,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    pub fn assistant(response: StructuredResponse) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Response(response),
        }
    }
}

/// A raw question/answer pair, used only as prompt context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}
