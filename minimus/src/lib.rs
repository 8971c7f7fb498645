//! Minimus: a logic-less template engine in the style of Mustache.
//!
//! Minimus compiles templates with `{{tags}}` in them into a small program
//! and renders that program against any value that implements
//! [`serde::Serialize`].  Templates have no logic of their own: what a
//! section does (loop, condition, scope change, text transform) is decided
//! by the data it is rendered with.
//!
//! ```mustache
//! <ul>
//! {{#users}}
//!   <li>{{name}}</li>
//! {{/users}}
//! </ul>
//! ```
//!
//! # Template Usage
//!
//! Templates are compiled by an [`Environment`] which also caches the
//! compiled programs.  The [`context!`] macro can be used to quickly
//! construct data to render with:
//!
//! ```
//! use minimus::{context, Environment};
//!
//! let env = Environment::new();
//! let tmpl = env.compile("Hello {{name}}!").unwrap();
//! assert_eq!(tmpl.render(context!(name => "John"), ()).unwrap(), "Hello John!");
//! ```
//!
//! For one-off renders there is also the [`render`] function which uses a
//! thread local environment:
//!
//! ```
//! # use minimus::context;
//! let rv = minimus::render("{{#items}}{{.}},{{/items}}", context!(items => [1, 2, 3]), ());
//! assert_eq!(rv.unwrap(), "1,2,3,");
//! ```
//!
//! # Partials
//!
//! Partials are other templates that are spliced in with `{{> name}}`.
//! They are resolved when a template renders, from anything that
//! implements [`Partials`].  Maps of names to template source do:
//!
//! ```
//! # use std::collections::HashMap;
//! # use minimus::{context, Environment};
//! let mut partials = HashMap::new();
//! partials.insert("user", "<b>{{name}}</b>");
//! let env = Environment::new();
//! let rv = env.render("Hi {{> user}}", context!(name => "Ann"), &partials);
//! assert_eq!(rv.unwrap(), "Hi <b>Ann</b>");
//! ```
//!
//! # Named Templates
//!
//! Templates can be registered under a name with
//! [`Environment::add_template`] or loaded on demand through a loader such
//! as [`path_loader`]:
//!
//! ```
//! # use minimus::{context, Environment};
//! let mut env = Environment::new();
//! env.add_template("greeting", "Hello {{name}}!").unwrap();
//! let rv = env.render_named("greeting", context!(name => "World"), ());
//! assert_eq!(rv.unwrap(), "Hello World!");
//! ```
//!
//! # Errors
//!
//! Compile and render errors are reported as [`Error`].  They carry the
//! file label and line they relate to.  The alternative display
//! (`{:#}`) also prints the surrounding template source:
//!
//! ```
//! # use minimus::Environment;
//! let env = Environment::new();
//! let err = env.compile("{{#list}}\n{{/items}}").unwrap_err();
//! assert_eq!(
//!     err.to_string(),
//!     "syntax error: Section named \"items\" was never opened (in <template>:2)"
//! );
//! ```
//!
//! The template syntax is documented in the [`syntax`] module.
//!
//! # Optional Features
//!
//! - `unstable_machinery`: exposes the compiler internals (tokenizer and
//!   program builder) in the [`machinery`] module.  There are no stability
//!   guarantees for this API.
#![allow(clippy::cognitive_complexity)]
#![allow(clippy::needless_borrowed_reference)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

#[macro_use]
mod macros;

mod compiler;
mod debug;
mod environment;
mod error;
mod loader;
mod output;
mod template;
mod utils;
mod vm;

pub mod syntax;
pub mod value;

pub use self::environment::{render, Environment, Partials};
pub use self::error::{Error, ErrorKind};
pub use self::loader::{path_loader, path_loader_with_extension};
pub use self::syntax::Delimiters;
pub use self::template::{CompileOptions, CompiledTemplate, Template};
pub use self::utils::HtmlEscape;
pub use self::vm::LambdaCall;

/// Re-export for convenience.
pub use self::value::Value;

pub use self::macros::__context;

/// This module gives access to the low level machinery.
///
/// This module is only provided by the `unstable_machinery` feature and does not
/// have a stable interface.  It mostly exists for internal testing purposes and
/// for debugging.
#[cfg(feature = "unstable_machinery")]
#[cfg_attr(docsrs, doc(cfg(feature = "unstable_machinery")))]
pub mod machinery {
    #![allow(missing_docs)]
    pub use crate::compiler::codegen::{compile_program, CodeGenerator};
    pub use crate::compiler::instructions::{Instruction, Program, Section};
    pub use crate::compiler::lexer::{tokenize, Tokenizer};
    pub use crate::compiler::tokens::{Span, TagKind, Token};
}
