//! Tests for fixed-size chunking.

use docqa_rag::{Chunker, ErrorKind, FixedSizeChunker, TextChunk, split};
use proptest::prelude::*;

fn texts(chunks: &[TextChunk]) -> Vec<&str> {
    chunks.iter().map(|c| c.text.as_str()).collect()
}

/// Drop each chunk's leading overlap (except the first) and concatenate.
fn reassemble(chunks: &[TextChunk], overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let skip = if i == 0 { 0 } else { overlap };
        out.extend(chunk.text.chars().skip(skip));
    }
    out
}

#[test]
fn long_text_splits_into_overlapping_chunks() {
    let text = "x".repeat(2400);
    let chunks = split(&text, 1000, 200).unwrap();

    assert_eq!(chunks.len(), 3);
    assert_eq!((chunks[0].start, chunks[0].end), (0, 1000));
    assert_eq!((chunks[1].start, chunks[1].end), (800, 1800));
    assert_eq!((chunks[2].start, chunks[2].end), (1600, 2400));
    for pair in chunks.windows(2) {
        let tail: String = pair[0].text.chars().skip(pair[0].char_len() - 200).collect();
        let head: String = pair[1].text.chars().take(200).collect();
        assert_eq!(tail, head);
    }
    assert_eq!(chunks.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2]);
}

#[test]
fn empty_text_yields_no_chunks() {
    assert!(split("", 100, 10).unwrap().is_empty());
}

#[test]
fn short_text_is_a_single_chunk() {
    let chunks = split("just a few words", 100, 10).unwrap();
    assert_eq!(texts(&chunks), vec!["just a few words"]);
    assert_eq!((chunks[0].start, chunks[0].end), (0, 16));
}

#[test]
fn invalid_sizes_are_rejected() {
    for (size, overlap) in [(0, 0), (100, 100), (100, 150)] {
        let err = FixedSizeChunker::new(size, overlap).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration, "size={size} overlap={overlap}");
    }
}

#[test]
fn split_prefers_whitespace_near_the_limit() {
    let chunker = FixedSizeChunker::new(12, 0).unwrap();
    let chunks = chunker.split("alpha beta gamma delta");
    assert_eq!(texts(&chunks), vec!["alpha beta ", "gamma delta"]);
}

#[test]
fn zero_window_splits_at_the_hard_limit() {
    let chunker = FixedSizeChunker::new(12, 0).unwrap().with_boundary_window(0);
    let chunks = chunker.split("alpha beta gamma delta");
    assert_eq!(texts(&chunks), vec!["alpha beta g", "amma delta"]);
}

#[test]
fn sizes_count_characters_not_bytes() {
    let text = "é".repeat(30);
    let chunks = split(&text, 10, 2).unwrap();
    assert!(chunks.iter().all(|c| c.text.chars().count() <= 10));
    assert_eq!(chunks[0].text, "é".repeat(10));
    assert_eq!(reassemble(&chunks, 2), text);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn chunks_reassemble_to_the_original_text(
        text in "[a-zé ,\n]{0,400}",
        size in 1usize..60,
        overlap_seed in 0usize..60,
        window in 0usize..16,
    ) {
        let overlap = overlap_seed % size;
        let chunker = FixedSizeChunker::new(size, overlap).unwrap().with_boundary_window(window);
        let chunks = chunker.split(&text);

        prop_assert_eq!(reassemble(&chunks, overlap), text.clone());
        prop_assert_eq!(chunks.is_empty(), text.is_empty());

        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.index, i);
            prop_assert!(chunk.char_len() <= size);
            prop_assert!(chunk.char_len() > overlap || i + 1 == chunks.len());
        }
        for pair in chunks.windows(2) {
            prop_assert_eq!(pair[1].start, pair[0].end - overlap);
            prop_assert!(pair[1].start > pair[0].start);
        }
    }

    #[test]
    fn chunking_is_deterministic(text in "[a-z ]{0,300}", size in 5usize..50) {
        let chunker = FixedSizeChunker::new(size, size / 3).unwrap();
        prop_assert_eq!(chunker.split(&text), chunker.split(&text));
    }
}
