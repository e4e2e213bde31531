//! Text-composition primitives shared by every reformulation method
//!
//! All outputs are whitespace-normalized single-line strings, safe for
//! `qid \t query` TSV rows.

/// Normalize whitespace and strip stray surrounding quotes.
///
/// Newlines, carriage returns and tabs become spaces; runs of spaces
/// collapse to one.
pub fn clean(text: &str) -> String {
    let mut text = text.replace(['\n', '\r', '\t'], " ");
    while text.contains("  ") {
        text = text.replace("  ", " ");
    }
    text.trim().trim_matches('"').trim_matches('\'').to_string()
}

/// `query` repeated `repeats` times, followed by `generated`, space-joined.
pub fn repeat(query: &str, generated: &str, repeats: usize) -> String {
    let mut parts: Vec<&str> = vec![query; repeats];
    parts.push(generated);
    clean(&parts.join(" "))
}

/// Repeat `query` proportionally to the length of `generated`.
///
/// `reps = max(1, (chars(generated) / max(1, chars(query))) / ratio)`, so
/// the query keeps roughly constant weight however verbose the generation
/// is.
pub fn adaptive(query: &str, generated: &str, ratio: usize) -> String {
    let query_len = query.chars().count().max(1);
    let generated_len = generated.chars().count();
    let reps = ((generated_len / query_len) / ratio.max(1)).max(1);

    let mut parts: Vec<&str> = vec![query; reps];
    parts.push(generated);
    clean(&parts.join(" "))
}

/// Interleave `query` before each passage: `q p1 q p2 …`.
pub fn interleave(query: &str, passages: &[String]) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(passages.len() * 2);
    for passage in passages {
        parts.push(query);
        parts.push(passage);
    }
    clean(&parts.join(" "))
}
