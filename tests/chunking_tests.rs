//! Property tests for fixed-size chunking: full coverage and the exact
//! overlap invariant.

use proptest::prelude::*;
use ragline::chunking::{Chunker, FixedSizeChunker};
use ragline::document::Document;

/// Generate a (chunk_size, overlap) pair with overlap < chunk_size.
fn arb_chunk_config() -> impl Strategy<Value = (usize, usize)> {
    (2usize..60).prop_flat_map(|size| (Just(size), 0usize..size))
}

/// Count the chars in the overlap region between two adjacent chunks.
fn overlap_chars(text: &str, prev_end: usize, next_start: usize) -> usize {
    text[next_start..prev_end].chars().count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Concatenating the chunks (skipping the declared overlap on every
    /// chunk after the first) reconstructs the document exactly; no
    /// character is dropped.
    #[test]
    fn chunks_reconstruct_document(
        text in "\\PC{1,300}",
        (size, overlap) in arb_chunk_config(),
    ) {
        let chunker = FixedSizeChunker::new(size, overlap).unwrap();
        let doc = Document::new("doc", text.clone());
        let chunks = chunker.chunk(&doc);

        prop_assert!(!chunks.is_empty());
        prop_assert_eq!(chunks[0].start, 0);
        prop_assert_eq!(chunks.last().unwrap().end, text.len());

        let mut rebuilt = chunks[0].text.clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.text.chars().skip(overlap));
        }
        prop_assert_eq!(rebuilt, text);
    }

    /// Every adjacent chunk pair overlaps by exactly the configured overlap;
    /// spans are contiguous with no gaps.
    #[test]
    fn adjacent_chunks_overlap_exactly(
        text in "\\PC{1,300}",
        (size, overlap) in arb_chunk_config(),
    ) {
        let chunker = FixedSizeChunker::new(size, overlap).unwrap();
        let doc = Document::new("doc", text.clone());
        let chunks = chunker.chunk(&doc);

        for pair in chunks.windows(2) {
            prop_assert!(pair[1].start <= pair[0].end, "gap between adjacent chunks");
            prop_assert_eq!(
                overlap_chars(&text, pair[0].end, pair[1].start),
                overlap,
            );
        }
    }

    /// Every chunk except the last has exactly `chunk_size` chars; the last
    /// may be shorter but never empty.
    #[test]
    fn chunk_lengths_are_bounded(
        text in "\\PC{1,300}",
        (size, overlap) in arb_chunk_config(),
    ) {
        let chunker = FixedSizeChunker::new(size, overlap).unwrap();
        let doc = Document::new("doc", text.clone());
        let chunks = chunker.chunk(&doc);

        let last = chunks.len() - 1;
        for (i, chunk) in chunks.iter().enumerate() {
            let len = chunk.text.chars().count();
            if i < last {
                prop_assert_eq!(len, size);
            } else {
                prop_assert!(len >= 1 && len <= size);
            }
        }
    }

    /// A document no longer than chunk_size produces exactly one chunk.
    #[test]
    fn short_document_is_one_chunk(
        text in "\\PC{1,40}",
        overlap in 0usize..40,
    ) {
        let size = text.chars().count().max(overlap + 1);
        let chunker = FixedSizeChunker::new(size, overlap).unwrap();
        let doc = Document::new("doc", text.clone());
        let chunks = chunker.chunk(&doc);
        prop_assert_eq!(chunks.len(), 1);
        prop_assert_eq!(chunks[0].text.clone(), text);
    }
}

#[test]
fn multibyte_text_chunks_on_char_boundaries() {
    let chunker = FixedSizeChunker::new(4, 1).unwrap();
    let doc = Document::new("doc", "héllo wörld — ünïcode ✓");
    let chunks = chunker.chunk(&doc);
    let mut rebuilt = chunks[0].text.clone();
    for chunk in &chunks[1..] {
        rebuilt.extend(chunk.text.chars().skip(1));
    }
    assert_eq!(rebuilt, doc.text);
}

#[test]
fn empty_document_yields_no_chunks() {
    let chunker = FixedSizeChunker::new(10, 2).unwrap();
    assert!(chunker.chunk(&Document::new("doc", "")).is_empty());
}
