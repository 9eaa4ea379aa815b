//! Reference token scanning
//!
//! A reference token is a `$` followed by an optional path suffix (`.name`, `..name`,
//! `.*`, `[...]`). It must be immediately followed by whitespace, an operator, a
//! closing bracket, a comma, or the end of the condition. When the token is followed by
//! a member call such as `.includes(` or `.startsWith(`, the method name is not part of
//! the token.
//!
//! Bracket segments may nest (`[?(@.tags[0] == 'x')]`) and may hold quoted strings
//! containing brackets; the scanner tracks both so the token ends at the matching `]`.

use super::EvalError;
use core::ops::Range;
use regex::Regex;
use std::sync::LazyLock;

static MEMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.\.?(?:[A-Za-z_][A-Za-z0-9_]*|\*)").expect("invalid regex"));

const TERMINATORS: &[char] = &['=', '!', '<', '>', '&', '|', '+', '-', '*', '/', '%', ',', ')', ']', '?', ':'];

const MEMBERSHIP_METHOD: &str = "includes";

/// The single reference token of a condition and where it occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    path: String,
    spans: Vec<Range<usize>>,
    membership: bool,
}

impl Reference {
    /// Scans `condition` for its reference token.
    ///
    /// # Errors
    ///
    /// [`EvalError::ConditionSyntax`] when no token is present and
    /// [`EvalError::MultipleReferences`] when more than one distinct token is present.
    pub fn scan(condition: &str) -> Result<Self, EvalError> {
        let mut tokens: Vec<Self> = Vec::new();

        let mut cursor = 0;
        while let Some(offset) = condition.get(cursor..).and_then(|text| text.find('$')) {
            let start = cursor + offset;
            let end = start + token_len(condition.get(start..).unwrap_or_default());
            cursor = end;

            let candidate = condition.get(start..end).unwrap_or_default();
            let Some((path, membership)) = classify(candidate, condition.get(end..).unwrap_or_default()) else {
                continue;
            };

            let span = start..start + path.len();
            if let Some(existing) = tokens.iter_mut().find(|t| t.path == path) {
                existing.spans.push(span);
                existing.membership |= membership;
            } else {
                tokens.push(Self {
                    path: path.to_string(),
                    spans: vec![span],
                    membership,
                });
            }
        }

        match tokens.len() {
            0 => Err(EvalError::ConditionSyntax {
                condition: condition.to_string(),
            }),
            1 => Ok(tokens.remove(0)),
            _ => Err(EvalError::MultipleReferences {
                condition: condition.to_string(),
                tokens: tokens.into_iter().map(|t| t.path).collect(),
            }),
        }
    }

    /// The path expression of the token, always rooted at `$`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the token is the receiver of an `includes(...)` call.
    #[must_use]
    pub const fn membership(&self) -> bool {
        self.membership
    }

    /// Returns `condition` with every occurrence of the token replaced by `identifier`.
    #[must_use]
    pub fn rewrite(&self, condition: &str, identifier: &str) -> String {
        let mut rewritten = String::with_capacity(condition.len());
        let mut last = 0;
        for span in &self.spans {
            rewritten.push_str(condition.get(last..span.start).unwrap_or_default());
            rewritten.push_str(identifier);
            last = span.end;
        }
        rewritten.push_str(condition.get(last..).unwrap_or_default());
        rewritten
    }
}

/// Length of the token candidate at the start of `text`, which begins with `$`.
fn token_len(text: &str) -> usize {
    let mut len = 1;
    loop {
        let rest = text.get(len..).unwrap_or_default();
        if let Some(member) = MEMBER_REGEX.find(rest) {
            len += member.end();
        } else if let Some(bracket) = bracket_len(rest) {
            len += bracket;
        } else {
            return len;
        }
    }
}

/// Length of the bracket segment at the start of `text`, up to and including its
/// matching `]`. Returns `None` when `text` does not open a bracket or never closes it.
fn bracket_len(text: &str) -> Option<usize> {
    if !text.starts_with('[') {
        return None;
    }

    let mut depth = 0_usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (index, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' => quote = Some(c),
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// Decides whether a token candidate is a reference token, given the text that follows it.
///
/// Returns the token path and whether it is the receiver of a membership test.
fn classify<'a>(candidate: &'a str, rest: &str) -> Option<(&'a str, bool)> {
    match rest.chars().next() {
        None => Some((candidate, false)),
        Some(c) if c.is_whitespace() || TERMINATORS.contains(&c) => Some((candidate, false)),
        Some('(') => {
            let (path, method) = candidate.rsplit_once('.')?;
            if path.is_empty() || path.ends_with('.') || method.is_empty() || method == "*" {
                return None;
            }
            Some((path, method == MEMBERSHIP_METHOD))
        }
        Some(_) => None,
    }
}
