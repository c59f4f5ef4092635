//! Content-hash normalization (spec.md §3 invariant, §8 property 7).
//!
//! `H(c)` must be invariant under CRLF↔LF conversion, trailing whitespace,
//! and collapsing runs of blank lines — so that same-text files saved with
//! different line endings still dedup during ingestion.

use sha2::{Digest, Sha256};

/// Normalize content per spec.md §3: line endings to LF, trailing whitespace
/// stripped per line, and runs of blank lines collapsed to a single blank line.
pub fn normalize_content(content: &str) -> String {
    let unified = content.replace("\r\n", "\n").replace('\r', "\n");

    let mut out_lines: Vec<&str> = Vec::new();
    let mut blank_run = false;
    for line in unified.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            if blank_run {
                continue;
            }
            blank_run = true;
        } else {
            blank_run = false;
        }
        out_lines.push(trimmed);
    }

    out_lines.join("\n")
}

/// SHA-256 of the normalized content, as a lowercase hex string.
pub fn content_hash(content: &str) -> String {
    let normalized = normalize_content(content);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut s, b| {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
            s
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_and_lf_hash_equal() {
        let a = "line one\r\nline two\r\n";
        let b = "line one\nline two\n";
        assert_eq!(content_hash(a), content_hash(b));
    }

    #[test]
    fn trailing_whitespace_ignored() {
        let a = "line one   \nline two\t\n";
        let b = "line one\nline two\n";
        assert_eq!(content_hash(a), content_hash(b));
    }

    #[test]
    fn blank_run_collapsed() {
        let a = "a\n\n\n\nb";
        let b = "a\n\nb";
        assert_eq!(content_hash(a), content_hash(b));
    }

    #[test]
    fn distinct_content_differs() {
        assert_ne!(content_hash("a"), content_hash("b"));
    }
}
