//! Small character-level scanners shared by the LaTeX stages.
//!
//! Brace groups and environments are located with explicit forward scans
//! rather than regexes so the tie-break rules are visible in code:
//!
//! * [`leading_group`] stops at the **first** closing delimiter. Macro bodies
//!   are deliberately not brace-balanced.
//! * [`environments`] pairs each `\begin{name}` with the `\end{name}` that
//!   closes it, tracking nesting depth. For non-nested input this is simply
//!   the first end tag after the begin tag.
//!
//! Tags that sit inside a `%` comment are invisible to the environment scan.

use std::ops::Range;

/// Byte offset of the first unescaped `%` in `line`, if any.
///
/// A `%` preceded by an odd number of backslashes is a literal percent sign
/// (`\%`), not a comment; `\\%` is a row break followed by a comment.
pub fn comment_start(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut backslashes = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\\' => backslashes += 1,
            b'%' if backslashes % 2 == 0 => return Some(i),
            _ => backslashes = 0,
        }
    }
    None
}

/// `line` with any `%` comment tail removed.
pub fn strip_comment(line: &str) -> &str {
    match comment_start(line) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Whether the byte at `pos` sits inside a `%` comment on its own line.
fn is_commented(text: &str, pos: usize) -> bool {
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    comment_start(&text[line_start..pos]).is_some()
}

/// Split off a leading `open … close` group.
///
/// `input` must start with `open`. Returns the content up to the first
/// `close` and the remainder after it, or `None` when the group never
/// closes. Nested `open` characters are not counted.
pub fn leading_group(input: &str, open: char, close: char) -> Option<(&str, &str)> {
    let rest = input.strip_prefix(open)?;
    let end = rest.find(close)?;
    Some((&rest[..end], &rest[end + close.len_utf8()..]))
}

/// True when `rest` (the text right after a control word) does not extend
/// the control word, i.e. it is empty or starts with a non-letter.
pub fn ends_control_word(rest: &str) -> bool {
    !rest.starts_with(|c: char| c.is_ascii_alphabetic())
}

/// Strip a control word such as `\def` from the start of `line`.
///
/// Returns the remainder only when the keyword is a whole control word, so
/// `\definecolor` does not match `\def`.
pub fn strip_control_word<'a>(line: &'a str, word: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(word)?;
    ends_control_word(rest).then_some(rest)
}

/// Every `\begin{name} … \end{name}` span in `text`, in document order.
///
/// Spans are non-overlapping; an environment nested inside a returned span
/// is part of that span. A begin tag that is never closed is skipped and the
/// scan resumes after it.
pub fn environments(text: &str, name: &str) -> Vec<Range<usize>> {
    let begin = format!("\\begin{{{name}}}");
    let end = format!("\\end{{{name}}}");
    let mut spans = Vec::new();
    let mut cursor = 0;

    while let Some(start) = find_tag(text, &begin, cursor) {
        match closing_tag(text, &begin, &end, start + begin.len()) {
            Some(stop) => {
                spans.push(start..stop);
                cursor = stop;
            }
            None => cursor = start + begin.len(),
        }
    }

    spans
}

/// The first environment span, if any.
pub fn first_environment(text: &str, name: &str) -> Option<Range<usize>> {
    let begin = format!("\\begin{{{name}}}");
    let end = format!("\\end{{{name}}}");
    let mut cursor = 0;

    while let Some(start) = find_tag(text, &begin, cursor) {
        if let Some(stop) = closing_tag(text, &begin, &end, start + begin.len()) {
            return Some(start..stop);
        }
        cursor = start + begin.len();
    }

    None
}

/// Next uncommented occurrence of `tag` at or after `from`.
fn find_tag(text: &str, tag: &str, from: usize) -> Option<usize> {
    let mut cursor = from;
    while let Some(offset) = text[cursor..].find(tag) {
        let pos = cursor + offset;
        if !is_commented(text, pos) {
            return Some(pos);
        }
        cursor = pos + tag.len();
    }
    None
}

/// End offset (exclusive) of the `end` tag that closes a `begin` tag whose
/// body starts at `from`.
fn closing_tag(text: &str, begin: &str, end: &str, from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut cursor = from;

    loop {
        let next_end = find_tag(text, end, cursor)?;
        match find_tag(text, begin, cursor) {
            Some(next_begin) if next_begin < next_end => {
                depth += 1;
                cursor = next_begin + begin.len();
            }
            _ => {
                if depth == 0 {
                    return Some(next_end + end.len());
                }
                depth -= 1;
                cursor = next_end + end.len();
            }
        }
    }
}
