//! Character-level scanning helpers shared by the validator, guard and classifier.
//!
//! None of this is a SQL tokenizer. It knows about three quote styles and
//! identifier characters, nothing else.

use std::borrow::Cow;

/// Whether a byte may appear inside a word (`[A-Za-z0-9_]`).
pub fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Counts `;` characters outside `'…'`, `"…"` and `` `…` `` quoting.
///
/// A doubled quote character inside its own quoting is an escaped quote. Dollar
/// quoting and comments are not recognised.
pub fn unquoted_terminators(sql: &str) -> usize {
    let mut count = 0;
    let mut chars = sql.chars().peekable();

    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut in_backtick = false;

    while let Some(ch) = chars.next() {
        match ch {
            '\'' if !in_double_quote && !in_backtick => {
                if in_single_quote && chars.peek() == Some(&'\'') {
                    chars.next();
                    continue;
                }
                in_single_quote = !in_single_quote;
            }
            '"' if !in_single_quote && !in_backtick => {
                if in_double_quote && chars.peek() == Some(&'"') {
                    chars.next();
                    continue;
                }
                in_double_quote = !in_double_quote;
            }
            '`' if !in_single_quote && !in_double_quote => {
                in_backtick = !in_backtick;
            }
            ';' if !(in_single_quote || in_double_quote || in_backtick) => {
                count += 1;
            }
            _ => {}
        }
    }

    count
}

/// Leading run of word characters, or `""` when the text starts with anything else.
pub fn leading_word(sql: &str) -> &str {
    let end = sql
        .bytes()
        .position(|b| !is_word_byte(b))
        .unwrap_or(sql.len());
    &sql[..end]
}

/// Whether `keyword` occurs in `haystack` bounded by non-word characters.
///
/// Both arguments must share the same case.
pub fn contains_word(haystack: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    let bytes = haystack.as_bytes();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(keyword) {
        let abs_pos = start + pos;
        let before_ok = abs_pos == 0 || !is_word_byte(bytes[abs_pos - 1]);
        let after_pos = abs_pos + keyword.len();
        let after_ok = after_pos >= bytes.len() || !is_word_byte(bytes[after_pos]);
        if before_ok && after_ok {
            return true;
        }
        start = abs_pos + 1;
        while start < haystack.len() && !haystack.is_char_boundary(start) {
            start += 1;
        }
        if start >= haystack.len() {
            break;
        }
    }
    false
}

/// Word tokens of `sql`, pairing `word.word` into one qualified token.
///
/// `a.b.c` yields `a.b` then `c`. Double quotes and whitespace around the dot are
/// transparent, so `"a" . "b"` yields `a.b`. Quote characters otherwise act as
/// separators, so quoted identifiers and string literal contents are scanned too.
pub fn word_tokens(sql: &str) -> WordTokens<'_> {
    WordTokens { sql, pos: 0 }
}

/// Iterator returned by [`word_tokens`].
#[derive(Debug, Clone)]
pub struct WordTokens<'a> {
    sql: &'a str,
    pos: usize,
}

impl<'a> WordTokens<'a> {
    fn word_end(&self, from: usize) -> usize {
        let bytes = self.sql.as_bytes();
        let mut end = from;
        while end < bytes.len() && is_word_byte(bytes[end]) {
            end += 1;
        }
        end
    }

    fn skip_quotes_and_spaces(&self, from: usize) -> usize {
        let bytes = self.sql.as_bytes();
        let mut pos = from;
        while pos < bytes.len() && (bytes[pos] == b'"' || bytes[pos].is_ascii_whitespace()) {
            pos += 1;
        }
        pos
    }
}

impl<'a> Iterator for WordTokens<'a> {
    type Item = Cow<'a, str>;

    fn next(&mut self) -> Option<Cow<'a, str>> {
        let bytes = self.sql.as_bytes();
        while self.pos < bytes.len() && !is_word_byte(bytes[self.pos]) {
            self.pos += 1;
        }
        if self.pos >= bytes.len() {
            return None;
        }

        let start = self.pos;
        let end = self.word_end(start);
        self.pos = end;

        let dot = self.skip_quotes_and_spaces(end);
        if dot < bytes.len() && bytes[dot] == b'.' {
            let next = self.skip_quotes_and_spaces(dot + 1);
            if next < bytes.len() && is_word_byte(bytes[next]) {
                let next_end = self.word_end(next);
                self.pos = next_end;
                if dot == end && next == dot + 1 {
                    return Some(Cow::Borrowed(&self.sql[start..next_end]));
                }
                return Some(Cow::Owned(format!(
                    "{}.{}",
                    &self.sql[start..end],
                    &self.sql[next..next_end]
                )));
            }
        }

        Some(Cow::Borrowed(&self.sql[start..end]))
    }
}
