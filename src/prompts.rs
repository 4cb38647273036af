//! Prompt templates for query rewriting and grounded answering.

use crate::models::Chunk;

/// Instruction for turning a follow-up into a standalone question.
pub const REWRITE_INSTRUCTION: &str = "Given the conversation history and the latest user input, \
which may refer to earlier turns, rewrite the input as a standalone question that can be \
understood without the history. Do NOT answer the question. Return only the rewritten \
question, or the input unchanged if it is already standalone.";

/// Search mode: find the documents related to the input.
pub const DOC_SEARCH_TEMPLATE: &str = "You are an assistant that locates internal documents. \
Using only the retrieved context below, reply with a one-sentence summary of the document \
most related to the user's input. If the context contains nothing related to the input, \
reply exactly with \"{no_match}\" and nothing else.\n\n\
Context:\n{context}";

/// Inquiry mode: answer the question from the retrieved context.
pub const INQUIRY_TEMPLATE: &str = "You are an assistant that answers questions about \
internal documents. Answer the user's question using only the retrieved context below. \
Be specific and structured, use bullet points for lists, and do not invent facts that are \
not in the context. If the context does not contain the answer, reply exactly with \
\"{no_match}\" and nothing else.\n\n\
Context:\n{context}";

/// Join retrieved chunk texts into the `{context}` slot, separated by blank lines.
pub fn stuff_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Fill an answer template with its sentinel and context.
pub fn render_answer_prompt(template: &str, no_match: &str, context: &str) -> String {
    template
        .replace("{no_match}", no_match)
        .replace("{context}", context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    #[test]
    fn test_render_fills_both_slots() {
        let p = render_answer_prompt(INQUIRY_TEMPLATE, "NONE", "alpha\n\nbeta");
        assert!(p.contains("\"NONE\""));
        assert!(p.ends_with("alpha\n\nbeta"));
        assert!(!p.contains("{context}"));
    }

    #[test]
    fn test_stuff_context_order() {
        let mk = |t: &str| Chunk {
            id: t.into(),
            chunk_index: 0,
            text: t.into(),
            hash: t.into(),
            metadata: Metadata::new(),
        };
        assert_eq!(stuff_context(&[mk("one"), mk("two")]), "one\n\ntwo");
    }
}
