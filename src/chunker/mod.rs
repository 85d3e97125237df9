use anyhow::Result;
use text_splitter::{ChunkConfig, TextSplitter};

use crate::database::models::ChunkDraft;

/// Splits document text into overlapping, token-bounded chunks. `window` and
/// `overlap` are counted in the embedding model's own tokenizer units
/// (`tiktoken`'s `cl100k_base` encoding), so chunk boundaries line up with
/// what the Embedder actually sees.
pub struct Chunker {
    window: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(window: usize, overlap: usize) -> Self {
        Self { window, overlap }
    }

    /// Deterministic: identical `text` and constructor args always produce
    /// byte-identical chunk texts in the same order. Empty input yields an
    /// empty vector; rejecting empty documents is the ingestion pipeline's job.
    pub fn chunk(&self, text: &str) -> Result<Vec<ChunkDraft>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let tokenizer = tiktoken_rs::cl100k_base()?;
        let config = ChunkConfig::new(self.window)
            .with_sizer(tokenizer.clone())
            .with_overlap(self.overlap)?;
        let splitter = TextSplitter::new(config);

        let drafts = splitter
            .chunks(text)
            .enumerate()
            .map(|(ordinal, chunk_text)| {
                let token_count = tokenizer.encode_ordinary(chunk_text).len() as i32;
                ChunkDraft {
                    ordinal: ordinal as i32,
                    text: chunk_text.to_string(),
                    token_count,
                }
            })
            .collect();

        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_produces_no_chunks() {
        let chunker = Chunker::new(400, 40);
        assert!(chunker.chunk("").unwrap().is_empty());
        assert!(chunker.chunk("   \n  ").unwrap().is_empty());
    }

    #[test]
    fn chunking_is_deterministic() {
        let chunker = Chunker::new(50, 10);
        let text = "Paris is the capital of France. ".repeat(40);
        let first = chunker.chunk(&text).unwrap();
        let second = chunker.chunk(&text).unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.text, b.text);
        }
    }

    #[test]
    fn ordinals_are_dense_and_zero_based() {
        let chunker = Chunker::new(50, 10);
        let text = "Paris is the capital of France. ".repeat(40);
        let chunks = chunker.chunk(&text).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.ordinal, i as i32);
            assert!(!chunk.text.is_empty());
        }
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let chunker = Chunker::new(400, 40);
        let chunks = chunker.chunk("A short document.").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].ordinal, 0);
    }
}
