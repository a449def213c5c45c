// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Head/tail truncation for tool output shown to the model, shared by the
//! `kubectl` and `bash` built-ins (§4.3: both runners wrap `kubectl-ai-exec`
//! output the same way before handing it back).

/// Hard byte ceiling for combined stdout + stderr returned to the model.
const OUTPUT_LIMIT_BYTES: usize = 20_000;
const HEAD_LINES: usize = 100;
const TAIL_LINES: usize = 100;

/// Truncate `s` to fit within [`OUTPUT_LIMIT_BYTES`], keeping the first
/// [`HEAD_LINES`] and last [`TAIL_LINES`] lines when it doesn't.
pub fn head_tail_truncate(s: &str) -> String {
    if s.len() <= OUTPUT_LIMIT_BYTES {
        return s.to_string();
    }

    let lines: Vec<&str> = s.lines().collect();
    let total = lines.len();

    if total <= HEAD_LINES + TAIL_LINES {
        let tail_start = ceil_char_boundary(s, s.len().saturating_sub(OUTPUT_LIMIT_BYTES / 2));
        let tail_str = &s[tail_start..];
        let head_end = floor_char_boundary(s, (OUTPUT_LIMIT_BYTES / 2).min(s.len()));
        let head_str = &s[..head_end];
        let omitted_bytes = s.len() - head_str.len() - tail_str.len();
        return format!("{head_str}\n...[{omitted_bytes} bytes omitted]...\n{tail_str}");
    }

    let head: Vec<&str> = lines[..HEAD_LINES].to_vec();
    let tail: Vec<&str> = lines[total - TAIL_LINES..].to_vec();
    let omitted_lines = total - HEAD_LINES - TAIL_LINES;
    let shown_bytes = head.join("\n").len() + tail.join("\n").len();
    let omitted_bytes = s.len().saturating_sub(shown_bytes);

    format!(
        "{}\n...[{} lines / ~{} bytes omitted]...\n{}",
        head.join("\n"),
        omitted_lines,
        omitted_bytes,
        tail.join("\n"),
    )
}

/// Largest index `<= index` that lies on a UTF-8 char boundary of `s`.
/// Stable-Rust stand-in for the unstable `str::floor_char_boundary`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut idx = index;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Smallest index `>= index` that lies on a UTF-8 char boundary of `s`.
/// Stable-Rust stand-in for the unstable `str::ceil_char_boundary`.
fn ceil_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut idx = index;
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_output_is_untouched() {
        assert_eq!(head_tail_truncate("hello"), "hello");
    }

    #[test]
    fn long_output_keeps_head_and_tail() {
        let lines: Vec<String> = (0..500).map(|i| format!("line-{i}")).collect();
        let big = lines.join("\n");
        let out = head_tail_truncate(&big);
        assert!(out.contains("line-0"));
        assert!(out.contains("line-499"));
        assert!(out.contains("omitted"));
    }

    #[test]
    fn degenerate_branch_never_splits_a_multibyte_char() {
        // Few very long lines (≤ HEAD_LINES + TAIL_LINES total) but well over
        // OUTPUT_LIMIT_BYTES, forcing the byte-offset head/tail branch. Every
        // multi-byte char ("é", 2 bytes) is placed so some candidate offset
        // (OUTPUT_LIMIT_BYTES/2 from either end) lands mid-character.
        let line = "é".repeat(30_000);
        let out = head_tail_truncate(&line);
        assert!(out.contains("omitted"));
    }

    #[test]
    fn floor_and_ceil_find_the_nearest_boundary() {
        let s = "aé"; // 'a' = 1 byte, 'é' = 2 bytes (indices 1,2 valid bounds, 2 mid-char... )
        // s.as_bytes(): [0]='a', [1..3] = 'é' bytes. Valid boundaries: 0, 1, 3.
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(ceil_char_boundary(s, 2), 3);
        assert_eq!(floor_char_boundary(s, 3), 3);
        assert_eq!(ceil_char_boundary(s, 1), 1);
    }
}
