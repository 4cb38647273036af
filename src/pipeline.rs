//! Per-turn retrieval and answer pipeline.
//!
//! One turn runs: rewrite the input against history → retrieve the top-k
//! chunks for the rewritten query → generate an answer from the stuffed
//! context plus history → build a mode-specific [`StructuredResponse`].
//!
//! The response builders ([`search_response`], [`inquiry_response`]) are
//! pure functions over the retrieved chunks and the generated answer.

use std::collections::HashSet;
use tracing::debug;

use crate::config::AnswerConfig;
use crate::error::TurnError;
use crate::index::Retriever;
use crate::llm::ChatModel;
use crate::models::{
    AnswerMode, Chunk, Exchange, InquiryAnswer, SearchHit, SourceList, SourceRef,
    StructuredResponse, SubChoices,
};
use crate::page::resolve_page;
use crate::prompts::{render_answer_prompt, stuff_context, DOC_SEARCH_TEMPLATE, INQUIRY_TEMPLATE};
use crate::rewrite::{history_messages, rewrite_query};

pub const MAIN_MESSAGE: &str = "Information related to your input may be in the following file.";
pub const SUB_MESSAGE: &str = "Other candidate locations:";
pub const SOURCES_HEADING: &str = "Sources";

/// Result of one turn: the structured payload and the raw answer text.
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub response: StructuredResponse,
    pub answer: String,
}

/// Run one chat turn in `mode`.
pub async fn run_turn(
    mode: AnswerMode,
    retriever: &Retriever,
    model: &dyn ChatModel,
    answers: &AnswerConfig,
    history: &[Exchange],
    input: &str,
) -> Result<TurnOutput, TurnError> {
    let query = rewrite_query(model, history, input)
        .await
        .map_err(TurnError::Rewrite)?;
    debug!(query = %query, "standalone query");

    let context = retriever
        .retrieve(&query)
        .await
        .map_err(TurnError::Retrieval)?;

    let (template, sentinel) = match mode {
        AnswerMode::Search => (DOC_SEARCH_TEMPLATE, answers.no_doc_match_answer.as_str()),
        AnswerMode::Inquiry => (INQUIRY_TEMPLATE, answers.inquiry_no_match_answer.as_str()),
    };
    let system = render_answer_prompt(template, sentinel, &stuff_context(&context));
    let messages = history_messages(&system, history, input);
    let answer = model
        .complete(&messages)
        .await
        .map_err(TurnError::Generation)?;

    let response = match mode {
        AnswerMode::Search => search_response(&context, &answer, answers),
        AnswerMode::Inquiry => inquiry_response(&context, &answer, answers),
    };

    Ok(TurnOutput { response, answer })
}

fn is_no_match(answer: &str, sentinel: &str) -> bool {
    let answer = answer.trim();
    answer.is_empty() || answer == sentinel.trim()
}

fn source_ref(chunk: &Chunk) -> Option<SourceRef> {
    chunk.source().map(|source| SourceRef {
        source: source.to_string(),
        page: resolve_page(&chunk.metadata),
    })
}

/// Collapse chunks to distinct sources in first-seen order.
///
/// Chunks without a source are skipped, as is `exclude` (the main hit).
pub fn dedup_sources(chunks: &[Chunk], exclude: Option<&str>) -> Vec<SourceRef> {
    let mut seen: HashSet<&str> = HashSet::new();
    if let Some(main) = exclude {
        seen.insert(main);
    }
    let mut out = Vec::new();
    for chunk in chunks {
        let Some(source) = chunk.source() else {
            continue;
        };
        if !seen.insert(source) {
            continue;
        }
        out.extend(source_ref(chunk));
    }
    out
}

/// Build the search-mode payload: main hit plus distinct sub-candidates.
pub fn search_response(
    context: &[Chunk],
    answer: &str,
    answers: &AnswerConfig,
) -> StructuredResponse {
    let main = match context.first().and_then(source_ref) {
        Some(main) if !is_no_match(answer, &answers.no_doc_match_answer) => main,
        _ => {
            return StructuredResponse::SearchNoMatch {
                message: answers.no_doc_match_message.clone(),
            }
        }
    };

    let choices = dedup_sources(&context[1..], Some(&main.source));
    let sub = if choices.is_empty() {
        None
    } else {
        Some(SubChoices {
            message: SUB_MESSAGE.to_string(),
            choices,
        })
    };

    StructuredResponse::SearchHit(SearchHit {
        main_message: MAIN_MESSAGE.to_string(),
        main,
        sub,
    })
}

/// Build the inquiry-mode payload: answer plus distinct cited sources.
pub fn inquiry_response(
    context: &[Chunk],
    answer: &str,
    answers: &AnswerConfig,
) -> StructuredResponse {
    if is_no_match(answer, &answers.inquiry_no_match_answer) {
        return StructuredResponse::Inquiry(InquiryAnswer {
            answer: answers.inquiry_no_match_answer.clone(),
            sources: None,
        });
    }

    let items = dedup_sources(context, None);
    let sources = if items.is_empty() {
        None
    } else {
        Some(SourceList {
            heading: SOURCES_HEADING.to_string(),
            items,
        })
    };

    StructuredResponse::Inquiry(InquiryAnswer {
        answer: answer.to_string(),
        sources,
    })
}
