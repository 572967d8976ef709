//! Deterministic entry ordering: natural (digit-aware) name comparison.

use std::cmp::Ordering;
use std::path::Path;

/// Comparators a caller may select when re-sorting an open sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryOrdering {
    /// Digit runs compare as numbers: `page2` sorts before `page10`.
    #[default]
    Natural,
    /// Plain case-insensitive string comparison.
    Lexicographic,
}

impl EntryOrdering {
    /// Compare two internal container paths under this ordering.
    pub fn compare(self, a: &Path, b: &Path) -> Ordering {
        let a_key = fold_path(a);
        let b_key = fold_path(b);
        match self {
            EntryOrdering::Natural => natural_cmp(&a_key, &b_key),
            EntryOrdering::Lexicographic => a_key.cmp(&b_key).then_with(|| compare_raw(a, b)),
        }
    }
}

fn fold_path(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

fn compare_raw(a: &Path, b: &Path) -> Ordering {
    a.as_os_str().cmp(b.as_os_str())
}

/// Compare two strings treating embedded digit runs as numbers.
///
/// Equal numeric values with different digit counts (`1` vs `001`) fall back
/// to digit-run length so the ordering stays total and stable.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a_tokens = tokenize(a);
    let b_tokens = tokenize(b);

    for (a_tok, b_tok) in a_tokens.iter().zip(b_tokens.iter()) {
        match (a_tok, b_tok) {
            (Token::Number(a_digits, a_val), Token::Number(b_digits, b_val)) => {
                match a_val.cmp(b_val) {
                    Ordering::Equal => match a_digits.len().cmp(&b_digits.len()) {
                        Ordering::Equal => {}
                        other => return other,
                    },
                    other => return other,
                }
            }
            (Token::Text(a_text), Token::Text(b_text)) => match a_text.cmp(b_text) {
                Ordering::Equal => {}
                other => return other,
            },
            (Token::Number(..), Token::Text(..)) => return Ordering::Less,
            (Token::Text(..), Token::Number(..)) => return Ordering::Greater,
        }
    }

    a_tokens.len().cmp(&b_tokens.len()).then_with(|| a.cmp(b))
}

/// One lexical unit of a file name: either a text span or a digit run.
#[derive(Debug, PartialEq)]
pub enum Token<'a> {
    Text(&'a str),
    Number(&'a str, u128),
}

/// Split a name into alternating text and digit-run tokens.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut chars = input.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch.is_ascii_digit() {
            if start < idx {
                tokens.push(Token::Text(&input[start..idx]));
            }
            let mut end = idx + ch.len_utf8();
            while let Some(&(nidx, nch)) = chars.peek() {
                if nch.is_ascii_digit() {
                    chars.next();
                    end = nidx + nch.len_utf8();
                } else {
                    break;
                }
            }
            let digits = &input[idx..end];
            let value = digits.parse::<u128>().unwrap_or(0);
            tokens.push(Token::Number(digits, value));
            start = end;
        }
    }

    if start < input.len() {
        tokens.push(Token::Text(&input[start..]));
    }

    tokens
}
