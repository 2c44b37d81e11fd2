//! Property tests for the deduplicator and the segmenter.

use chunkscribe::audio::{AudioBuffer, segment};
use chunkscribe::dedupe;
use proptest::prelude::*;

/// Small vocabulary so repeats are common.
fn transcript() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec!["a", "b", "c", "olá", "mundo", "the", "fox"]),
        0..60,
    )
    .prop_map(|words| words.join(" "))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn dedupe_is_idempotent(text in transcript()) {
        let once = dedupe(&text);
        prop_assert_eq!(dedupe(&once), once);
    }

    #[test]
    fn dedupe_leaves_no_adjacent_repeats(text in transcript()) {
        let out = dedupe(&text);
        let tokens: Vec<&str> = out.split_whitespace().collect();
        for pair in tokens.windows(2) {
            prop_assert_ne!(pair[0], pair[1], "adjacent repeat in {:?}", out);
        }
    }

    #[test]
    fn dedupe_output_is_a_subsequence_of_input(text in transcript()) {
        let out = dedupe(&text);
        let mut input = text.split_whitespace();
        for token in out.split_whitespace() {
            prop_assert!(
                input.any(|t| t == token),
                "{:?} is not a subsequence of {:?}",
                out,
                text
            );
        }
    }

    #[test]
    fn segments_cover_buffer_without_gaps(
        samples in 0usize..(16000 * 45),
        chunk_ms in 1000u32..12000,
        overlap_fraction in 0.0f64..2.0,
    ) {
        let overlap_ms = ((chunk_ms as f64) * overlap_fraction) as u32;

        let buffer = AudioBuffer::normalized(vec![0i16; samples]);
        let chunks = segment(&buffer, chunk_ms, overlap_ms).unwrap();

        let chunk_samples = chunk_ms as usize * 16;
        let overlap_samples = overlap_ms as usize * 16;

        prop_assert!(!chunks.is_empty());
        prop_assert_eq!(chunks[0].range().start, 0);
        prop_assert_eq!(chunks[chunks.len() - 1].range().end, samples);

        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.index, i);
            prop_assert!(chunk.len() <= chunk_samples);
        }

        for pair in chunks.windows(2) {
            let (prev, next) = (pair[0].range(), pair[1].range());
            prop_assert!(next.start > prev.start, "chunks must advance");
            prop_assert!(next.start <= prev.end, "gap between {:?} and {:?}", prev, next);
            prop_assert!(
                prev.end - next.start <= overlap_samples,
                "overlap of {} samples exceeds {}",
                prev.end - next.start,
                overlap_samples
            );
        }
    }
}

#[test]
fn seam_repeat_collapses_once() {
    assert_eq!(
        dedupe("então vamos começar então vamos começar agora"),
        "então vamos começar agora"
    );
}
