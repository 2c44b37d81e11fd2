//! Repetition cleanup for stitched transcripts.
//!
//! Overlapping chunks make recognizers repeat the words at the seams. Two
//! phases remove that: immediate word repeats are dropped, then repeated
//! n-grams (longest first, n = 4, 3, 2) are collapsed to a single copy.

/// N-gram sizes collapsed after the word pass, in order.
const NGRAM_SIZES: [usize; 3] = [4, 3, 2];

/// Remove word and phrase repetitions.
///
/// Whitespace in the result is normalized to single spaces. The transform is
/// repeated until the token count stops shrinking, so applying `dedupe` to its
/// own output changes nothing.
pub fn dedupe(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();

    loop {
        let before = tokens.len();
        tokens = single_pass(&tokens);
        if tokens.len() == before {
            break;
        }
    }

    tokens.join(" ")
}

fn single_pass<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    let mut tokens = collapse_repeated_words(tokens);
    for n in NGRAM_SIZES {
        tokens = collapse_repeated_ngrams(&tokens, n);
    }
    tokens
}

/// Drop any token equal to the last kept token.
fn collapse_repeated_words<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    let mut kept: Vec<&str> = Vec::with_capacity(tokens.len());
    for &token in tokens {
        if kept.last() != Some(&token) {
            kept.push(token);
        }
    }
    kept
}

/// One left-to-right pass collapsing `X X` to `X` for blocks of `n` tokens.
fn collapse_repeated_ngrams<'a>(tokens: &[&'a str], n: usize) -> Vec<&'a str> {
    let mut kept = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        if i + 2 * n <= tokens.len() && tokens[i..i + n] == tokens[i + n..i + 2 * n] {
            kept.extend_from_slice(&tokens[i..i + n]);
            i += 2 * n;
        } else {
            kept.push(tokens[i]);
            i += 1;
        }
    }

    kept
}
