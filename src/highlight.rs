//! # Highlighter
//!
//! A forward, line-local scan that classifies each rendered byte of a row into a [`HlType`]. The
//! only state that crosses a row boundary is whether the row ends inside an unterminated
//! multi-line comment (`Row::hl_open_comment`); everything else (whether the scan is inside a
//! string, whether the previous byte was a separator) is local to one row.

use std::fmt::{self, Display, Formatter};

use crate::syntax::Conf as SyntaxConf;

/// The classification of a single rendered byte.
///
/// Each variant is associated with an ANSI SGR foreground color code, matching the scheme of the
/// editor this crate's design is grounded on (and, before it, antirez's original `kilo`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HlType {
    /// Ordinary text.
    Normal,
    /// A single-line comment, from its prefix to the end of the row.
    Comment,
    /// A multi-line comment, possibly spanning several rows.
    MlComment,
    /// A string literal.
    String,
    /// A number literal.
    Number,
    /// A primary keyword (e.g. `if`, `while`).
    Keyword1,
    /// A secondary keyword, conventionally a type name.
    Keyword2,
    /// The currently active search match.
    Match,
}

impl HlType {
    /// The ANSI SGR foreground color code for this token.
    pub(crate) const fn color(self) -> u8 {
        match self {
            Self::Normal => 37,
            Self::Comment | Self::MlComment => 36,
            Self::Keyword1 => 33,
            Self::Keyword2 => 32,
            Self::String => 35,
            Self::Number => 31,
            Self::Match => 34,
        }
    }
}

impl Display for HlType {
    /// Write the ANSI escape sequence that selects this token's foreground color.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { write!(f, "\x1b[{}m", self.color()) }
}

/// Return whether `c` is a separator: whitespace, NUL, or one of `,.()+-/*=~%<>[];`.
pub(crate) const fn is_separator(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0 | b',' | b'.' | b'(' | b')' | b'+' | b'-' | b'/'
        | b'*' | b'=' | b'~' | b'%' | b'<' | b'>' | b'[' | b']' | b';')
}

/// Classify every byte of `render`, given whether the *previous* row ended inside an unterminated
/// multi-line comment. Returns the per-byte classification and whether this row itself ends inside
/// an unterminated multi-line comment.
pub fn scan_row(render: &[u8], syntax: &SyntaxConf, prev_open_comment: bool) -> (Vec<HlType>, bool) {
    let mut hl = vec![HlType::Normal; render.len()];
    let mut prev_sep = true;
    let mut in_string: Option<u8> = None;
    let mut in_comment = prev_open_comment;

    let mut i = 0;
    while i < render.len() {
        let c = render[i];

        // Rule 1: single-line comment.
        if in_string.is_none() && !in_comment {
            if let Some(prefix) = &syntax.sl_comment_start {
                if !prefix.is_empty() && render[i..].starts_with(prefix.as_bytes()) {
                    hl[i..].fill(HlType::Comment);
                    break;
                }
            }
        }

        // Rule 2: already inside a multi-line comment.
        if in_comment {
            hl[i] = HlType::MlComment;
            if let Some((_, end)) = &syntax.ml_comment_delims {
                if render[i..].starts_with(end.as_bytes()) {
                    hl[i..(i + end.len()).min(render.len())].fill(HlType::MlComment);
                    i += end.len();
                    in_comment = false;
                    prev_sep = true;
                    continue;
                }
            }
            i += 1;
            continue;
        }

        // Rule 3: entering a multi-line comment.
        if in_string.is_none() {
            if let Some((start, _)) = &syntax.ml_comment_delims {
                if render[i..].starts_with(start.as_bytes()) {
                    let end = (i + start.len()).min(render.len());
                    hl[i..end].fill(HlType::MlComment);
                    i += start.len();
                    in_comment = true;
                    continue;
                }
            }
        }

        // Rule 4: strings.
        if let Some(quote) = in_string {
            hl[i] = HlType::String;
            if c == b'\\' && i + 1 < render.len() {
                hl[i + 1] = HlType::String;
                i += 2;
                continue;
            }
            if c == quote {
                in_string = None;
            }
            i += 1;
            prev_sep = true;
            continue;
        }
        if syntax.highlight_strings && (c == b'"' || c == b'\'') {
            in_string = Some(c);
            hl[i] = HlType::String;
            i += 1;
            continue;
        }

        // Rule 5: numbers.
        if syntax.highlight_numbers
            && ((c.is_ascii_digit() && (prev_sep || (i > 0 && hl[i - 1] == HlType::Number)))
                || (c == b'.' && i > 0 && hl[i - 1] == HlType::Number))
        {
            hl[i] = HlType::Number;
            prev_sep = false;
            i += 1;
            continue;
        }

        // Rule 6: keywords.
        if prev_sep {
            if let Some((kw_len, kw_type)) = match_keyword(render, i, syntax) {
                hl[i..i + kw_len].fill(kw_type);
                i += kw_len;
                prev_sep = false;
                continue;
            }
        }

        // Rule 7: default.
        prev_sep = is_separator(c);
        i += 1;
    }

    (hl, in_comment)
}

/// Try to match one of `syntax`'s keywords at position `i` in `render`. Returns the keyword's
/// length (excluding the secondary-keyword `|` sentinel) and its highlight type.
fn match_keyword(render: &[u8], i: usize, syntax: &SyntaxConf) -> Option<(usize, HlType)> {
    for keyword in &syntax.keywords {
        let secondary = keyword.ends_with('|');
        let body = if secondary { &keyword[..keyword.len() - 1] } else { keyword.as_str() };
        let klen = body.len();
        if i + klen > render.len() || &render[i..i + klen] != body.as_bytes() {
            continue;
        }
        let next_is_sep = render.get(i + klen).is_none_or(|b| is_separator(*b));
        if !next_is_sep {
            continue;
        }
        return Some((klen, if secondary { HlType::Keyword2 } else { HlType::Keyword1 }));
    }
    None
}
