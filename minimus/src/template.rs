use std::sync::Arc;
use std::{fmt, io};

use serde::Serialize;

use crate::compiler::codegen::compile_program;
use crate::compiler::instructions::Program;
use crate::environment::{Environment, Partials};
use crate::error::Error;
use crate::output::{Output, WriteWrapper};
use crate::syntax::Delimiters;
use crate::value::Value;
use crate::vm::Vm;

/// The file label used when none was configured.
const DEFAULT_FILE_LABEL: &str = "<template>";

/// Options that control how templates are compiled.
///
/// The options are built up with builder methods:
///
/// ```
/// # use minimus::{CompileOptions, Environment};
/// let options = CompileOptions::default()
///     .tags("<%", "%>")
///     .unwrap()
///     .file("greeting.mustache")
///     .space(true);
/// let env = Environment::new();
/// let tmpl = env.compile_with_options("Hello <%name%>!", options).unwrap();
/// assert_eq!(tmpl.render(minimus::context!(name => "Ann"), ()).unwrap(), "Hello Ann!");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    delimiters: Delimiters,
    file: Option<String>,
    debug: bool,
    space: bool,
    cache: bool,
}

impl Default for CompileOptions {
    fn default() -> CompileOptions {
        CompileOptions {
            delimiters: Delimiters::default(),
            file: None,
            debug: false,
            space: false,
            cache: true,
        }
    }
}

impl CompileOptions {
    /// Sets the delimiters the template starts out with.
    pub fn delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Sets the initial delimiters from an opening and closing tag.
    ///
    /// Fails with [`InvalidDelimiters`](crate::ErrorKind::InvalidDelimiters)
    /// if either is empty or contains whitespace.
    pub fn tags(self, open: &str, close: &str) -> Result<Self, Error> {
        Ok(self.delimiters(ok!(Delimiters::new(open, close))))
    }

    /// Sets the label that errors refer to the template by.
    ///
    /// When not set errors use `<template>`.
    pub fn file<S: Into<String>>(mut self, file: S) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Emits the compiled program as `tracing` debug event.
    ///
    /// The event is emitted with the target `minimus::compiler`.
    pub fn debug(mut self, yes: bool) -> Self {
        self.debug = yes;
        self
    }

    /// Keeps the whitespace of standalone lines.
    pub fn space(mut self, yes: bool) -> Self {
        self.space = yes;
        self
    }

    /// Controls the use of the compiled template cache.
    ///
    /// With the cache disabled the template is compiled from scratch and
    /// the result is not stored.
    pub fn cache(mut self, yes: bool) -> Self {
        self.cache = yes;
        self
    }

    /// Returns the delimiters the template starts out with.
    pub fn initial_delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Returns the file label for errors.
    pub fn file_label(&self) -> &str {
        self.file.as_deref().unwrap_or(DEFAULT_FILE_LABEL)
    }

    /// Returns `true` if debug output is enabled.
    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    /// Returns `true` if standalone lines keep their whitespace.
    pub fn preserves_space(&self) -> bool {
        self.space
    }

    /// Returns `true` if the compiled template cache is used.
    pub fn uses_cache(&self) -> bool {
        self.cache
    }
}

/// A compiled template.
///
/// Holds the program together with the source it was compiled from and the
/// options that were used.
pub struct CompiledTemplate {
    source: Arc<str>,
    program: Program,
    options: CompileOptions,
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("name", &self.file_label())
            .field("program", &self.program)
            .finish()
    }
}

impl CompiledTemplate {
    /// Compiles template source.
    pub fn new(source: Arc<str>, options: &CompileOptions) -> Result<CompiledTemplate, Error> {
        let program = match compile_program(&source, options) {
            Ok(program) => program,
            Err(mut err) => {
                err.set_template_source(source);
                return Err(err);
            }
        };
        if options.debug_enabled() {
            tracing::debug!(
                target: "minimus::compiler",
                file = options.file_label(),
                "compiled program:\n{:#?}",
                program
            );
        }
        Ok(CompiledTemplate {
            source,
            program,
            options: options.clone(),
        })
    }

    /// Returns the compiled program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Returns the template source.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn shared_source(&self) -> Arc<str> {
        self.source.clone()
    }

    /// Returns the label errors refer to this template by.
    pub fn file_label(&self) -> &str {
        self.options.file_label()
    }

    /// Returns the options the template was compiled with.
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }
}

/// Represents a handle to a compiled template.
///
/// Templates are created with [`Environment::compile`] or looked up by name
/// with [`Environment::get_template`].  A handle is cheap to clone, it only
/// holds a reference to the environment and a shared pointer to the
/// compiled program.
#[derive(Clone)]
pub struct Template<'env> {
    env: &'env Environment,
    compiled: Arc<CompiledTemplate>,
}

impl fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name())
            .field("program", self.program())
            .finish()
    }
}

impl<'env> Template<'env> {
    pub(crate) fn new(env: &'env Environment, compiled: Arc<CompiledTemplate>) -> Template<'env> {
        Template { env, compiled }
    }

    /// Returns the file label of the template.
    pub fn name(&self) -> &str {
        self.compiled.file_label()
    }

    /// Returns the source code of the template.
    pub fn source(&self) -> &str {
        self.compiled.source()
    }

    /// Returns the compiled program.
    pub fn program(&self) -> &Program {
        self.compiled.program()
    }

    /// Returns `true` if both handles share the same compilation.
    ///
    /// Compiling the same source twice with the cache enabled yields handles
    /// that share the compilation.  After
    /// [`clear_cache`](Environment::clear_cache) a recompile produces a new
    /// one.
    pub fn same_compilation(&self, other: &Template<'_>) -> bool {
        Arc::ptr_eq(&self.compiled, &other.compiled)
    }

    /// Renders the template into a string.
    ///
    /// The view can be any value that implements [`Serialize`].  Partials
    /// are resolved at render time from `partials`; pass `()` if there
    /// are none.
    ///
    /// ```
    /// # use std::collections::BTreeMap;
    /// # use minimus::{context, Environment};
    /// let env = Environment::new();
    /// let tmpl = env.compile("<ul>{{#users}}{{> user}}{{/users}}</ul>").unwrap();
    /// let partials = BTreeMap::from([("user", "<li>{{name}}</li>")]);
    /// let view = context!(users => vec![context!(name => "Ann"), context!(name => "Bo")]);
    /// assert_eq!(
    ///     tmpl.render(view, &partials).unwrap(),
    ///     "<ul><li>Ann</li><li>Bo</li></ul>"
    /// );
    /// ```
    ///
    /// Rendering is all or nothing: if an error occurs no output is
    /// returned.
    pub fn render<S: Serialize, P: Partials>(&self, view: S, partials: P) -> Result<String, Error> {
        // reduce total amount of code falling under mono morphization into
        // this function, and share the rest in _render.
        self._render(Value::from_serialize(&view), &partials)
    }

    fn _render(&self, root: Value, partials: &dyn Partials) -> Result<String, Error> {
        let mut rv = String::with_capacity(self.compiled.source().len());
        ok!(Vm::new(self.env).eval(
            &self.compiled,
            root,
            partials,
            &mut Output::new(&mut rv),
            0
        ));
        Ok(rv)
    }

    /// Renders the template into an [`io::Write`].
    ///
    /// This works exactly like [`render`](Self::render) but writes the output
    /// as the template is evaluated.  On error the output written so far
    /// stays in the writer.
    pub fn render_to_write<S: Serialize, P: Partials, W: io::Write>(
        &self,
        view: S,
        partials: P,
        w: W,
    ) -> Result<(), Error> {
        let mut wrapper = WriteWrapper { w, err: None };
        let rv = Vm::new(self.env).eval(
            &self.compiled,
            Value::from_serialize(&view),
            &partials,
            &mut Output::new(&mut wrapper),
            0,
        );
        rv.map_err(|err| wrapper.take_err(err))
    }
}
