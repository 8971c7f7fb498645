use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Represents template errors.
///
/// Errors raised while compiling or rendering carry the template source,
/// the file label and the 1-based line that was active when the failure
/// happened.  The alternative formatting (``format!("{:#}", err)``) renders
/// a few lines of template source around the failing line.
///
/// # Example
///
/// Here is an example of how you might want to render errors:
///
/// ```rust
/// # let env = minimus::Environment::new();
/// match env.render("Hello {{name}}!", (), ()) {
///     Ok(result) => println!("{}", result),
///     Err(err) => {
///         eprintln!("Could not render template:");
///         eprintln!("  {:#}", err);
///     }
/// }
/// ```
///
/// Errors from partials or section lambdas are wrapped into an error of kind
/// [`ErrorKind::BadPartial`] located at the calling tag.  The original error
/// is available via [`std::error::Error::source`].
pub struct Error {
    repr: Box<ErrorRepr>,
}

struct ErrorRepr {
    kind: ErrorKind,
    detail: Option<Cow<'static, str>>,
    name: Option<String>,
    lineno: usize,
    template_source: Option<Arc<str>>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut err = f.debug_struct("Error");
        err.field("kind", &self.kind());
        if let Some(ref detail) = self.repr.detail {
            err.field("detail", detail);
        }
        if let Some(ref name) = self.name() {
            err.field("name", name);
        }
        if let Some(line) = self.line() {
            err.field("line", &line);
        }
        if let Some(ref source) = std::error::Error::source(self) {
            err.field("source", source);
        }
        ok!(err.finish());

        // so that debug info is shown for unwraps
        if !f.alternate() && self.template_source().is_some() {
            ok!(writeln!(f));
            ok!(writeln!(f, "{self:#}"));
        }
        Ok(())
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

impl Eq for Error {}

/// An enum describing the error kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The template has a syntax error.
    SyntaxError,
    /// The configured delimiters are unusable.
    InvalidDelimiters,
    /// A named template was not found.
    TemplateNotFound,
    /// A function or lambda in the view reported a failure.
    CallbackError,
    /// Rendering a partial or a lambda body failed.
    BadPartial,
    /// Partials or lambdas recursed too deeply.
    RecursionLimit,
    /// A value could not be converted into the internal format.
    BadSerialization,
    /// The output could not be written.
    WriteFailure,
}

impl ErrorKind {
    fn description(self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "syntax error",
            ErrorKind::InvalidDelimiters => "invalid delimiters",
            ErrorKind::TemplateNotFound => "template not found",
            ErrorKind::CallbackError => "callback failed",
            ErrorKind::BadPartial => "could not render nested template",
            ErrorKind::RecursionLimit => "recursion limit exceeded",
            ErrorKind::BadSerialization => "could not serialize to internal format",
            ErrorKind::WriteFailure => "failed to write output",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref detail) = self.repr.detail {
            ok!(write!(f, "{}: {}", self.kind(), detail));
        } else {
            ok!(write!(f, "{}", self.kind()));
        }
        if let Some(ref filename) = self.name() {
            ok!(write!(f, " (in {}:{})", filename, self.repr.lineno));
        }
        if f.alternate() {
            if let Some(source) = self.template_source() {
                ok!(crate::debug::render_source_context(
                    f,
                    self.name(),
                    self.line(),
                    source
                ));
            }
        }
        Ok(())
    }
}

impl Error {
    /// Creates a new error with kind and detail.
    pub fn new<D: Into<Cow<'static, str>>>(kind: ErrorKind, detail: D) -> Error {
        Error {
            repr: Box::new(ErrorRepr {
                kind,
                detail: Some(detail.into()),
                name: None,
                lineno: 0,
                template_source: None,
                source: None,
            }),
        }
    }

    pub(crate) fn new_not_found(name: &str, autoload: bool) -> Error {
        Error::new(
            ErrorKind::TemplateNotFound,
            if autoload {
                format!("template {name:?} does not exist")
            } else {
                format!("template {name:?} does not exist (autoload disabled)")
            },
        )
    }

    /// Sets the file label and line of the error.
    pub(crate) fn set_location(&mut self, filename: &str, lineno: usize) {
        self.repr.name = Some(filename.into());
        self.repr.lineno = lineno;
    }

    /// Attaches the template source for the source context display.
    pub(crate) fn set_template_source(&mut self, source: Arc<str>) {
        self.repr.template_source = Some(source);
    }

    /// Attaches another error as source to this error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.repr.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind
    pub fn kind(&self) -> ErrorKind {
        self.repr.kind
    }

    /// Returns the error detail
    ///
    /// The detail is an error message that provides further details about
    /// the error kind.
    pub fn detail(&self) -> Option<&str> {
        self.repr.detail.as_deref()
    }

    /// Returns the file label of the template that failed.
    pub fn name(&self) -> Option<&str> {
        self.repr.name.as_deref()
    }

    /// Returns the 1-based line that was active when the error happened.
    pub fn line(&self) -> Option<usize> {
        self.repr.name.as_ref().map(|_| self.repr.lineno)
    }

    /// Returns the source of the template that failed.
    pub fn template_source(&self) -> Option<&str> {
        self.repr.template_source.as_deref()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.repr.source.as_ref().map(|err| err.as_ref() as _)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            repr: Box::new(ErrorRepr {
                kind,
                detail: None,
                name: None,
                lineno: 0,
                template_source: None,
                source: None,
            }),
        }
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Error::new(ErrorKind::WriteFailure, "formatting failed")
    }
}

impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Error::new(ErrorKind::BadSerialization, msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_display_without_location() {
        let err = Error::new(ErrorKind::SyntaxError, "Tag \"{{\" was not closed properly");
        assert_eq!(
            err.to_string(),
            "syntax error: Tag \"{{\" was not closed properly"
        );
        assert_eq!(err.line(), None);
    }

    #[test]
    fn test_display_with_location() {
        let mut err = Error::from(ErrorKind::RecursionLimit);
        err.set_location("<template>", 4);
        assert_eq!(err.to_string(), "recursion limit exceeded (in <template>:4)");
        assert_eq!(err.line(), Some(4));
        assert_eq!(err.name(), Some("<template>"));
    }

    #[test]
    fn test_alternate_display_marks_line() {
        let mut err = Error::new(ErrorKind::CallbackError, "boom");
        err.set_location("hello.mustache", 2);
        err.set_template_source(Arc::from("first\nsecond\nthird"));
        let rendered = format!("{err:#}");
        assert!(rendered.contains("   2 > second"));
        assert!(rendered.contains("   1 | first"));
        assert!(rendered.contains("   3 | third"));
    }
}
