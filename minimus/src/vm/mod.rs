use std::fmt;

use crate::compiler::instructions::{Instruction, Section};
use crate::environment::{Environment, Partials};
use crate::error::{Error, ErrorKind};
use crate::output::Output;
use crate::template::{CompileOptions, CompiledTemplate};
use crate::value::{Value, ValueRepr};

pub use crate::vm::context::Context;

mod context;

/// The maximum nesting of partials and lambda renders.
const MAX_RECURSION: usize = 250;

/// Helps to evaluate something.
pub struct Vm<'env> {
    env: &'env Environment,
}

/// Per template evaluation state.
struct State<'a> {
    template: &'a CompiledTemplate,
    partials: &'a dyn Partials,
    depth: usize,
}

impl State<'_> {
    /// Attaches the location of the current template unless the error
    /// already points somewhere.
    #[cold]
    fn locate(&self, mut err: Error, line: usize) -> Error {
        if err.line().is_none() {
            err.set_location(self.template.file_label(), line);
            err.set_template_source(self.template.shared_source());
        }
        err
    }
}

/// Wraps an error that happened in a nested render.
fn nested_error(err: Error, detail: String) -> Error {
    if err.kind() == ErrorKind::RecursionLimit {
        err
    } else {
        Error::new(ErrorKind::BadPartial, detail).with_source(err)
    }
}

/// Returns `true` if an inverted section renders for this value.
fn is_empty_for_inverted(value: &Value) -> bool {
    match value.0 {
        ValueRepr::Undefined | ValueRepr::None | ValueRepr::Bool(false) => true,
        ValueRepr::Seq(ref items) => items.is_empty(),
        _ => false,
    }
}

impl<'env> Vm<'env> {
    /// Creates a new VM.
    pub fn new(env: &'env Environment) -> Vm<'env> {
        Vm { env }
    }

    /// Evaluates a compiled template with `root` as the only frame.
    pub fn eval(
        &self,
        template: &CompiledTemplate,
        root: Value,
        partials: &dyn Partials,
        out: &mut Output,
        depth: usize,
    ) -> Result<(), Error> {
        if depth > MAX_RECURSION {
            return Err(Error::new(
                ErrorKind::RecursionLimit,
                "partials or lambdas nested too deeply",
            ));
        }
        let state = State {
            template,
            partials,
            depth,
        };
        let mut ctx = Context::new(root);
        self.eval_program(&state, template.program(), &mut ctx, out)
    }

    fn eval_program(
        &self,
        state: &State<'_>,
        program: &[Instruction],
        ctx: &mut Context,
        out: &mut Output,
    ) -> Result<(), Error> {
        for instr in program {
            match instr {
                Instruction::Literal(text) => {
                    ok!(out.write_str(text).map_err(Error::from));
                }
                Instruction::Variable { path, escape, line } => {
                    let value = ok!(ctx.lookup(path).map_err(|err| state.locate(err, *line)));
                    ok!(out
                        .write_value(&value, *escape)
                        .map_err(|err| state.locate(err, *line)));
                }
                Instruction::Partial { name, line } => {
                    ok!(self
                        .eval_partial(state, name, ctx.top(), out)
                        .map_err(|err| state.locate(err, *line)));
                }
                Instruction::Section(section) => {
                    ok!(self.eval_section(state, section, ctx, out));
                }
                Instruction::SetDelimiters(_) => {}
            }
        }
        Ok(())
    }

    fn eval_section(
        &self,
        state: &State<'_>,
        section: &Section,
        ctx: &mut Context,
        out: &mut Output,
    ) -> Result<(), Error> {
        let value = ok!(ctx
            .lookup(&section.path)
            .map_err(|err| state.locate(err, section.line)));

        if section.inverted {
            if is_empty_for_inverted(&value) {
                ok!(self.eval_program(state, &section.body, ctx, out));
            }
            return Ok(());
        }

        match value.0 {
            ValueRepr::Seq(ref items) => {
                for item in items.iter() {
                    ctx.push(item.clone());
                    let rv = self.eval_program(state, &section.body, ctx, out);
                    ctx.pop();
                    ok!(rv);
                }
                Ok(())
            }
            ValueRepr::Map(_) => {
                ctx.push(value);
                let rv = self.eval_program(state, &section.body, ctx, out);
                ctx.pop();
                rv
            }
            ValueRepr::Lambda(ref f) => {
                let call = LambdaCall {
                    vm: self,
                    state,
                    scope: ctx.top(),
                    section,
                };
                let rv = ok!(f(&call).map_err(|err| state.locate(err, section.line)));
                out.write_value(&rv, false)
                    .map_err(|err| state.locate(err, section.line))
            }
            _ if value.is_true() => self.eval_program(state, &section.body, ctx, out),
            _ => Ok(()),
        }
    }

    fn eval_partial(
        &self,
        state: &State<'_>,
        name: &str,
        scope: &Value,
        out: &mut Output,
    ) -> Result<(), Error> {
        let source = match state.partials.get_partial(name) {
            Some(source) => source,
            None => {
                tracing::trace!(target: "minimus::vm", name, "partial not found");
                return Ok(());
            }
        };
        // the cache is keyed by text alone, so partials use the plain
        // environment options and the wrapping error names the partial
        self.render_nested(state, &source, self.env.options(), scope.clone(), out)
            .map_err(|err| nested_error(err, format!("could not render partial {name:?}")))
    }

    /// Compiles and renders template source one level deeper.
    fn render_nested(
        &self,
        state: &State<'_>,
        source: &str,
        options: &CompileOptions,
        scope: Value,
        out: &mut Output,
    ) -> Result<(), Error> {
        let template = ok!(self.env.get_compiled(source, options));
        self.eval(&template, scope, state.partials, out, state.depth + 1)
    }
}

/// Passed to section lambdas.
///
/// Gives access to the raw section body and the scope the section was
/// entered with, and allows rendering template source against that scope.
pub struct LambdaCall<'a> {
    vm: &'a Vm<'a>,
    state: &'a State<'a>,
    scope: &'a Value,
    section: &'a Section,
}

impl fmt::Debug for LambdaCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaCall")
            .field("scope", self.scope)
            .field("text", &self.text())
            .finish()
    }
}

impl LambdaCall<'_> {
    /// The topmost frame of the context stack when the section was entered.
    pub fn scope(&self) -> &Value {
        self.scope
    }

    /// The unrendered section body exactly as it appears in the template.
    ///
    /// Standalone line stripping is not applied to this text.
    pub fn text(&self) -> &str {
        &self.section.raw_body
    }

    /// Renders template source against the scope of the section.
    ///
    /// The source is compiled with the delimiters that were active when
    /// the section was opened and the partials of the current render are
    /// available to it.
    pub fn render(&self, source: &str) -> Result<String, Error> {
        let mut options = self.vm.env.options().clone();
        if options.initial_delimiters() != &self.section.delimiters {
            options = options
                .delimiters(self.section.delimiters.clone())
                .cache(false);
        }
        let mut rv = String::new();
        ok!(self
            .vm
            .render_nested(
                self.state,
                source,
                &options,
                self.scope.clone(),
                &mut Output::new(&mut rv),
            )
            .map_err(|err| nested_error(err, "could not render lambda body".into())));
        Ok(rv)
    }
}
