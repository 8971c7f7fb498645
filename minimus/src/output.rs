use std::{fmt, io};

use crate::error::{Error, ErrorKind};
use crate::utils::HtmlEscape;
use crate::value::Value;

/// An abstraction over [`fmt::Write`](std::fmt::Write) for the rendering.
///
/// Partials render straight into the output of the template that includes
/// them, so a single output is threaded through a whole render.
pub struct Output<'a> {
    w: &'a mut (dyn fmt::Write + 'a),
}

impl<'a> Output<'a> {
    /// Creates a new output.
    pub(crate) fn new(w: &'a mut (dyn fmt::Write + 'a)) -> Self {
        Self { w }
    }

    /// Writes a value the way a variable tag prints it.
    ///
    /// Strings are HTML escaped when `escape` is set, all other values are
    /// formatted first and escaped afterwards.
    pub(crate) fn write_value(&mut self, value: &Value, escape: bool) -> Result<(), Error> {
        match (value.as_str(), escape) {
            (Some(s), false) => self.write_str(s),
            (Some(s), true) => write!(self, "{}", HtmlEscape(s)),
            (None, false) => write!(self, "{value}"),
            (None, true) => write!(self, "{}", HtmlEscape(&value.to_string())),
        }
        .map_err(Error::from)
    }

    /// Writes some data to the underlying buffer contained within this output.
    #[inline]
    pub fn write_str(&mut self, s: &str) -> fmt::Result {
        self.w.write_str(s)
    }

    /// Writes some formatted information into this instance.
    #[inline]
    pub fn write_fmt(&mut self, a: fmt::Arguments<'_>) -> fmt::Result {
        self.w.write_fmt(a)
    }
}

impl fmt::Write for Output<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.w.write_str(s)
    }

    #[inline]
    fn write_char(&mut self, c: char) -> fmt::Result {
        self.w.write_char(c)
    }
}

pub struct WriteWrapper<W> {
    pub w: W,
    pub err: Option<io::Error>,
}

impl<W> WriteWrapper<W> {
    /// Replaces the given error with the held error if available.
    pub fn take_err(&mut self, original: Error) -> Error {
        self.err
            .take()
            .map(|io_err| {
                Error::new(ErrorKind::WriteFailure, "I/O error during rendering")
                    .with_source(io_err)
            })
            .unwrap_or(original)
    }
}

impl<W: io::Write> fmt::Write for WriteWrapper<W> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.w.write_all(s.as_bytes()).map_err(|e| {
            self.err = Some(e);
            fmt::Error
        })
    }

    #[inline]
    fn write_char(&mut self, c: char) -> fmt::Result {
        self.w
            .write_all(c.encode_utf8(&mut [0; 4]).as_bytes())
            .map_err(|e| {
                self.err = Some(e);
                fmt::Error
            })
    }
}
