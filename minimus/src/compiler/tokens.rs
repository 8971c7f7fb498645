use std::fmt;

/// Represents a token in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Raw template data without newlines.
    Text(&'a str),
    /// A single `\n`.
    Newline,
    /// A tag between delimiters.
    Tag {
        /// What the tag does.
        kind: TagKind,
        /// The trimmed tag contents after the sigil.
        name: &'a str,
        /// Where the tag sits in the source, delimiters included.
        span: Span,
    },
}

/// The kind of a tag, selected by its sigil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `{{! ... }}`
    Comment,
    /// `{{=<% %>=}}`
    SetDelimiters,
    /// `{{> name}}`
    Partial,
    /// `{{#name}}`
    Section,
    /// `{{^name}}`
    InvertedSection,
    /// `{{/name}}`
    CloseSection,
    /// `{{{name}}}` or `{{&name}}`
    Unescaped,
    /// `{{name}}`
    Variable,
}

impl<'a> fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Text(_) => f.write_str("template-data"),
            Token::Newline => f.write_str("newline"),
            Token::Tag { kind, .. } => fmt::Display::fmt(kind, f),
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TagKind::Comment => "comment",
            TagKind::SetDelimiters => "set delimiters",
            TagKind::Partial => "partial",
            TagKind::Section => "start of section",
            TagKind::InvertedSection => "start of inverted section",
            TagKind::CloseSection => "end of section",
            TagKind::Unescaped => "unescaped variable",
            TagKind::Variable => "variable",
        })
    }
}

/// Token span information as byte offsets into the source.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start_offset: usize,
    pub end_offset: usize,
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " @ {}-{}", self.start_offset, self.end_offset)
    }
}
