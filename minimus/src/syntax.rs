//! Documents the syntax for templates and provides the delimiter type.
//!
//! <details><summary><strong style="cursor: pointer">Table of Contents</strong></summary>
//!
//! - [Synopsis](#synopsis)
//! - [Variables](#variables)
//! - [Sections](#sections)
//!   - [Lists](#lists)
//!   - [Maps](#maps)
//!   - [Functions and Lambdas](#functions-and-lambdas)
//!   - [Inverted Sections](#inverted-sections)
//! - [Partials](#partials)
//! - [Comments](#comments)
//! - [Set Delimiters](#set-delimiters)
//! - [Standalone Lines](#standalone-lines)
//!
//! </details>
//!
//! # Synopsis
//!
//! A template is a text file with tags in it.  Tags are enclosed in the
//! delimiters `{{` and `}}` and the first character after the opening
//! delimiter selects what the tag does.  There is no logic in templates
//! beyond that: everything is driven by the data passed to render.
//!
//! ```mustache
//! <h1>{{title}}</h1>
//! <ul>
//! {{#items}}
//!   <li>{{name}}</li>
//! {{/items}}
//! {{^items}}
//!   <li>Nothing here</li>
//! {{/items}}
//! </ul>
//! ```
//!
//! # Variables
//!
//! `{{name}}` looks up `name` and prints it HTML escaped.  `{{{name}}}` and
//! `{{&name}}` print the value without escaping.  Names are trimmed, so
//! `{{ name }}` is the same as `{{name}}`.
//!
//! Lookups walk the context stack from the innermost scope outwards.
//! Dotted names (`{{person.name}}`) traverse into nested maps; the first
//! scope in which the whole path resolves wins.  `{{.}}` prints the current
//! scope itself which is useful when iterating over lists of strings.
//! A name that cannot be found prints nothing.
//!
//! # Sections
//!
//! Sections start with `{{#name}}` and end with `{{/name}}`.  What happens
//! to the body depends on the value `name` resolves to.
//!
//! ## Lists
//!
//! For a list the body is rendered once per item with the item pushed as
//! new scope.  An empty list renders nothing.
//!
//! ## Maps
//!
//! A map is pushed as new scope and the body is rendered once.
//!
//! ## Functions and Lambdas
//!
//! Functions are computed values; they are invoked on lookup and the section
//! works with their return value.  Lambdas receive the raw, unrendered body
//! of the section and decide what to print in its place.  See
//! [`Value::from_lambda`](crate::value::Value::from_lambda).
//!
//! All other values render the body once if they are true and not at all
//! if they are false.  `false`, `0`, the empty string and missing values
//! are false.
//!
//! ## Inverted Sections
//!
//! `{{^name}}` opens an inverted section.  Its body is rendered once if the
//! value is missing, none, `false` or an empty list.
//!
//! # Partials
//!
//! `{{> name}}` renders the partial template `name` with the current scope.
//! Partials are passed at render time (see [`Partials`](crate::Partials)).
//! A partial that cannot be found renders nothing.
//!
//! # Comments
//!
//! `{{! anything }}` is ignored.  Comments may span multiple lines.
//!
//! # Set Delimiters
//!
//! `{{=<% %>=}}` switches the delimiters to `<%` and `%>` for the rest of
//! the template.  The tag must contain exactly two whitespace separated
//! delimiters.  Triple mustaches follow the change: with the delimiters
//! above an unescaped variable is written as `<%{name}%>`.
//!
//! The initial delimiters can be changed with
//! [`CompileOptions::delimiters`](crate::CompileOptions::delimiters).
//!
//! # Standalone Lines
//!
//! A line that contains tags but nothing else except whitespace is removed
//! from the output entirely, including its newline.  This keeps section,
//! comment and partial tags from leaving blank lines behind.  Lines with
//! variable tags are never standalone.  The behavior can be disabled with
//! [`CompileOptions::space`](crate::CompileOptions::space).
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, ErrorKind};

/// The pair of delimiters that encloses tags.
///
/// The default delimiters are `{{` and `}}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Delimiters {
    open: String,
    close: String,
}

impl Default for Delimiters {
    fn default() -> Delimiters {
        Delimiters {
            open: "{{".into(),
            close: "}}".into(),
        }
    }
}

impl Delimiters {
    /// Creates a new delimiter pair.
    ///
    /// Both delimiters must be non-empty and may not contain whitespace.
    pub fn new<O: Into<String>, C: Into<String>>(open: O, close: C) -> Result<Delimiters, Error> {
        let open = open.into();
        let close = close.into();
        for delim in [&open, &close] {
            if delim.is_empty() {
                return Err(Error::new(
                    ErrorKind::InvalidDelimiters,
                    "delimiters may not be empty",
                ));
            }
            if delim.contains(char::is_whitespace) {
                return Err(Error::new(
                    ErrorKind::InvalidDelimiters,
                    format!("delimiter {delim:?} contains whitespace"),
                ));
            }
        }
        Ok(Delimiters { open, close })
    }

    /// Returns the opening delimiter.
    pub fn open(&self) -> &str {
        &self.open
    }

    /// Returns the closing delimiter.
    pub fn close(&self) -> &str {
        &self.close
    }
}

impl fmt::Display for Delimiters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.open, self.close)
    }
}

/// Parses `"OPEN CLOSE"`, the format used by the set delimiter tag.
impl FromStr for Delimiters {
    type Err = Error;

    fn from_str(s: &str) -> Result<Delimiters, Error> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(open), Some(close), None) => Delimiters::new(open, close),
            _ => Err(Error::new(
                ErrorKind::InvalidDelimiters,
                format!("expected an opening and a closing delimiter, got {s:?}"),
            )),
        }
    }
}
