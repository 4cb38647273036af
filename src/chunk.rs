//! Separator-boundary text chunker with overlap.
//!
//! Splits document content on a separator (newline by default) and greedily
//! packs the segments into [`Chunk`]s of at most `chunk_size` characters.
//! After a chunk is emitted, trailing segments totalling at most
//! `chunk_overlap` characters are carried into the next chunk.
//!
//! Packing policy, with `len` counted in Unicode scalar values:
//!
//! 1. Empty segments are dropped. A segment longer than `chunk_size` is
//!    hard-split into `chunk_size`-character pieces first.
//! 2. A segment joins the current chunk while
//!    `len(current) + len(separator) + len(segment) <= chunk_size`.
//! 3. On overflow the current chunk is emitted (joined, then trimmed), and
//!    leading segments are dropped until the remainder is at most
//!    `chunk_overlap` long and the incoming segment fits.
//!
//! Each chunk inherits its document's metadata verbatim and receives a
//! UUID plus a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::{Chunk, Document, Metadata};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk_size must be > 0")]
    ZeroChunkSize,
    #[error("chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge {
        chunk_size: usize,
        chunk_overlap: usize,
    },
}

/// Sliding-window splitter over separator-delimited segments.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: String,
}

impl TextSplitter {
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        separator: impl Into<String>,
    ) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::ZeroChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                chunk_size,
                chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separator: separator.into(),
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ChunkError> {
        Self::new(
            config.chunk_size,
            config.chunk_overlap,
            config.separator.clone(),
        )
    }

    /// Split raw text into chunk strings.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let segments = self.segments(text);
        self.merge(&segments)
    }

    /// Split every document, carrying metadata into each chunk.
    pub fn split_documents(&self, docs: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in docs {
            for (i, text) in self.split_text(&doc.content).into_iter().enumerate() {
                chunks.push(make_chunk(i as i64, &text, &doc.metadata));
            }
        }
        chunks
    }

    fn segments<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let raw: Vec<&str> = if self.separator.is_empty() {
            vec![text]
        } else {
            text.split(self.separator.as_str()).collect()
        };

        let mut out = Vec::with_capacity(raw.len());
        for seg in raw.into_iter().filter(|s| !s.is_empty()) {
            if char_len(seg) <= self.chunk_size {
                out.push(seg);
                continue;
            }
            // Hard split at chunk_size character boundaries
            let mut remaining = seg;
            while !remaining.is_empty() {
                let cut = remaining
                    .char_indices()
                    .nth(self.chunk_size)
                    .map(|(i, _)| i)
                    .unwrap_or(remaining.len());
                out.push(&remaining[..cut]);
                remaining = &remaining[cut..];
            }
        }
        out
    }

    fn merge(&self, segments: &[&str]) -> Vec<String> {
        let sep_len = char_len(&self.separator);
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for &seg in segments {
            let len = char_len(seg);
            let joiner = if current.is_empty() { 0 } else { sep_len };

            if total + joiner + len > self.chunk_size && !current.is_empty() {
                if let Some(chunk) = self.join(&current) {
                    chunks.push(chunk);
                }
                // Retain a tail of at most chunk_overlap that leaves room for seg
                while total > self.chunk_overlap
                    || (total > 0 && total + sep_len + len > self.chunk_size)
                {
                    let head = char_len(current[0]) + if current.len() > 1 { sep_len } else { 0 };
                    total -= head;
                    current.remove(0);
                }
            }

            if !current.is_empty() {
                total += sep_len;
            }
            current.push(seg);
            total += len;
        }

        if let Some(chunk) = self.join(&current) {
            chunks.push(chunk);
        }
        chunks
    }

    fn join(&self, segments: &[&str]) -> Option<String> {
        let joined = segments.join(&self.separator);
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn make_chunk(index: i64, text: &str, metadata: &Metadata) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
        metadata: metadata.clone(),
    }
}
