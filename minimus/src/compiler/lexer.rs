use std::borrow::Cow;

use crate::compiler::tokens::{Span, TagKind, Token};
use crate::error::{Error, ErrorKind};
use crate::syntax::Delimiters;

/// Utility enum that defines a marker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Marker {
    Tag,
    Newline,
    CarriageReturn,
}

/// Finds the next position where text data ends.
fn find_marker(rest: &str, open: &str) -> Option<(usize, Marker)> {
    let newline = rest
        .bytes()
        .position(|b| b == b'\n' || b == b'\r')
        .map(|idx| {
            if rest.as_bytes()[idx] == b'\n' {
                (idx, Marker::Newline)
            } else {
                (idx, Marker::CarriageReturn)
            }
        });
    let tag = rest.find(open).map(|idx| (idx, Marker::Tag));
    match (newline, tag) {
        (Some(a), Some(b)) => Some(if b.0 <= a.0 { b } else { a }),
        (a, b) => a.or(b),
    }
}

/// Selects the tag kind from the character after the opening delimiter.
///
/// Returns the kind, the number of bytes the sigil occupies and the
/// prefix the closing delimiter needs for this kind of tag.
fn match_sigil(rest: &str) -> (TagKind, usize, &'static str) {
    match rest.as_bytes().first() {
        Some(b'!') => (TagKind::Comment, 1, ""),
        Some(b'=') => (TagKind::SetDelimiters, 1, "="),
        Some(b'>') => (TagKind::Partial, 1, ""),
        Some(b'#') => (TagKind::Section, 1, ""),
        Some(b'^') => (TagKind::InvertedSection, 1, ""),
        Some(b'/') => (TagKind::CloseSection, 1, ""),
        Some(b'{') => (TagKind::Unescaped, 1, "}"),
        Some(b'&') => (TagKind::Unescaped, 1, ""),
        _ => (TagKind::Variable, 0, ""),
    }
}

/// Tokenizes template source.
///
/// The tokenizer tracks the 1-based line number and the active delimiters.
/// Set delimiter tags are applied as soon as they are tokenized so that
/// the rest of the source is scanned with the new delimiters.
pub struct Tokenizer<'s> {
    source: &'s str,
    offset: usize,
    current_line: usize,
    delimiters: Delimiters,
    filename: &'s str,
}

impl<'s> Tokenizer<'s> {
    /// Creates a new tokenizer.
    pub fn new(source: &'s str, delimiters: Delimiters, filename: &'s str) -> Tokenizer<'s> {
        Tokenizer {
            source,
            offset: 0,
            current_line: 1,
            delimiters,
            filename,
        }
    }

    /// The line the tokenizer is currently on.
    pub fn current_line(&self) -> usize {
        self.current_line
    }

    /// The delimiters currently in effect.
    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Produces the next token from the tokenizer.
    pub fn next_token(&mut self) -> Result<Option<(Token<'s>, usize)>, Error> {
        loop {
            let rest = &self.source[self.offset..];
            if rest.is_empty() {
                return Ok(None);
            }
            let line = self.current_line;
            return match find_marker(rest, self.delimiters.open()) {
                Some((0, Marker::CarriageReturn)) => {
                    self.offset += 1;
                    continue;
                }
                Some((0, Marker::Newline)) => {
                    self.offset += 1;
                    self.current_line += 1;
                    Ok(Some((Token::Newline, line)))
                }
                Some((0, Marker::Tag)) => self.eat_tag().map(Some),
                Some((idx, _)) => {
                    self.offset += idx;
                    Ok(Some((Token::Text(&rest[..idx]), line)))
                }
                None => {
                    self.offset = self.source.len();
                    Ok(Some((Token::Text(rest), line)))
                }
            };
        }
    }

    fn eat_tag(&mut self) -> Result<(Token<'s>, usize), Error> {
        let line = self.current_line;
        let start_offset = self.offset;
        let after_open = start_offset + self.delimiters.open().len();
        let (kind, sigil_len, close_prefix) = match_sigil(&self.source[after_open..]);
        let inner_start = after_open + sigil_len;

        let close: Cow<'_, str> = if close_prefix.is_empty() {
            Cow::Borrowed(self.delimiters.close())
        } else {
            Cow::Owned(format!("{}{}", close_prefix, self.delimiters.close()))
        };
        let inner_len = match self.source[inner_start..].find(&*close) {
            Some(idx) => idx,
            None => {
                return Err(self.syntax_error(format!(
                    "Tag {:?} was not closed properly",
                    self.delimiters.open()
                )))
            }
        };

        let inner = &self.source[inner_start..inner_start + inner_len];
        let end_offset = inner_start + inner_len + close.len();
        let name = inner.trim();

        if kind == TagKind::SetDelimiters {
            self.delimiters = match name.parse() {
                Ok(delimiters) => delimiters,
                Err(_) => {
                    return Err(self.syntax_error(format!(
                        "Delimiter definition {name:?} must consist of an opening and a closing delimiter"
                    )))
                }
            };
        }

        self.current_line += inner.matches('\n').count();
        self.offset = end_offset;
        Ok((
            Token::Tag {
                kind,
                name,
                span: Span {
                    start_offset,
                    end_offset,
                },
            },
            line,
        ))
    }

    fn syntax_error(&self, msg: String) -> Error {
        let mut err = Error::new(ErrorKind::SyntaxError, msg);
        err.set_location(self.filename, self.current_line);
        err
    }
}

/// Utility function to quickly tokenize into an iterator.
#[cfg(any(test, feature = "unstable_machinery"))]
pub fn tokenize(
    input: &str,
    delimiters: Delimiters,
) -> impl Iterator<Item = Result<(Token<'_>, usize), Error>> {
    // This function is unused in the engine itself, it's only used in tests
    // and in the unstable machinery as a convenient alternative to the tokenizer.
    let mut tokenizer = Tokenizer::new(input, delimiters, "<template>");
    std::iter::from_fn(move || tokenizer.next_token().transpose())
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    fn kinds(input: &str) -> Vec<(String, usize)> {
        tokenize(input, Delimiters::default())
            .map(|rv| {
                let (token, line) = rv.unwrap();
                let desc = match token {
                    Token::Text(text) => format!("text {text:?}"),
                    Token::Newline => "newline".to_string(),
                    Token::Tag { kind, name, .. } => format!("{kind} {name:?}"),
                };
                (desc, line)
            })
            .collect()
    }

    #[test]
    fn test_find_marker() {
        assert_eq!(find_marker("foo", "{{"), None);
        assert_eq!(find_marker("foo {", "{{"), None);
        assert_eq!(find_marker("foo {{", "{{"), Some((4, Marker::Tag)));
        assert_eq!(find_marker("a\nb{{", "{{"), Some((1, Marker::Newline)));
        assert_eq!(find_marker("ab\r\n", "{{"), Some((2, Marker::CarriageReturn)));
    }

    #[test]
    fn test_sigils() {
        assert_eq!(
            kinds("{{a}}{{{b}}}{{&c}}{{#d}}{{^e}}{{/f}}{{>g}}{{!h}}"),
            vec![
                ("variable \"a\"".to_string(), 1),
                ("unescaped variable \"b\"".to_string(), 1),
                ("unescaped variable \"c\"".to_string(), 1),
                ("start of section \"d\"".to_string(), 1),
                ("start of inverted section \"e\"".to_string(), 1),
                ("end of section \"f\"".to_string(), 1),
                ("partial \"g\"".to_string(), 1),
                ("comment \"h\"".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_lines_and_carriage_returns() {
        assert_eq!(
            kinds("a\r\n{{! one\ntwo }}b\n{{ c }}"),
            vec![
                ("text \"a\"".to_string(), 1),
                ("newline".to_string(), 1),
                ("comment \"one\\ntwo\"".to_string(), 2),
                ("text \"b\"".to_string(), 3),
                ("newline".to_string(), 3),
                ("variable \"c\"".to_string(), 4),
            ]
        );
    }

    #[test]
    fn test_set_delimiters() {
        assert_eq!(
            kinds("{{=<% %>=}}<%a%>{{b}}<%{c}%><%=| |=%>|d|"),
            vec![
                ("set delimiters \"<% %>\"".to_string(), 1),
                ("variable \"a\"".to_string(), 1),
                ("text \"{{b}}\"".to_string(), 1),
                ("unescaped variable \"c\"".to_string(), 1),
                ("set delimiters \"| |\"".to_string(), 1),
                ("variable \"d\"".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("ab{{#x}}cd", Delimiters::default())
            .map(|rv| rv.unwrap().0)
            .collect::<Vec<_>>();
        assert_eq!(
            tokens[1],
            Token::Tag {
                kind: TagKind::Section,
                name: "x",
                span: Span {
                    start_offset: 2,
                    end_offset: 8
                }
            }
        );
    }

    #[test]
    fn test_unclosed_tag() {
        let err = tokenize("a\nb {{name", Delimiters::default())
            .find_map(Result::err)
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
        assert_eq!(err.detail(), Some("Tag \"{{\" was not closed properly"));
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_bad_delimiter_definition() {
        let err = tokenize("{{=<%=}}", Delimiters::default())
            .find_map(Result::err)
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
    }
}
