use crate::compiler::instructions::{Instruction, Program, Section};
use crate::compiler::lexer::Tokenizer;
use crate::compiler::tokens::{TagKind, Token};
use crate::error::{Error, ErrorKind};
use crate::syntax::Delimiters;
use crate::template::CompileOptions;

#[cfg(test)]
use similar_asserts::assert_eq;

/// Output of the first code generation pass.
///
/// Literal data is kept one character per entry so that whitespace of
/// standalone lines can be removed after the fact.  Removed entries are
/// set to `None`.
enum Emitted {
    Char(char),
    Instr(Instruction),
    StartSection {
        path: String,
        inverted: bool,
        line: usize,
        body_start: usize,
        delimiters: Delimiters,
    },
    EndSection {
        body_end: usize,
    },
}

/// A program that is still being assembled.
#[derive(Default)]
struct PendingProgram {
    program: Program,
    literal: String,
}

impl PendingProgram {
    fn flush(&mut self) {
        if !self.literal.is_empty() {
            self.program
                .push(Instruction::Literal(std::mem::take(&mut self.literal)));
        }
    }

    fn push(&mut self, instr: Instruction) {
        self.flush();
        self.program.push(instr);
    }

    fn finish(mut self) -> Program {
        self.flush();
        self.program
    }
}

/// A section whose end was not reached yet while folding.
struct PendingSection {
    path: String,
    inverted: bool,
    line: usize,
    body_start: usize,
    delimiters: Delimiters,
    body: PendingProgram,
}

/// Provides a convenient interface to creating programs for the VM.
///
/// Tokens are fed in with [`compile_token`](Self::compile_token).  While
/// doing so the generator keeps track of the whitespace on the current line
/// and whether the line carries a tag.  Whenever a line ends and it held
/// nothing but tags and whitespace the whitespace (newline included) is
/// dropped.  [`finish`](Self::finish) then folds the flat output into a
/// tree of sections.
pub struct CodeGenerator<'source> {
    source: &'source str,
    filename: &'source str,
    preserve_space: bool,
    code: Vec<Option<Emitted>>,
    spaces: Vec<usize>,
    has_tag: bool,
    non_space: bool,
    section_stack: Vec<&'source str>,
}

impl<'source> CodeGenerator<'source> {
    /// Creates a new code generator.
    pub fn new(
        source: &'source str,
        filename: &'source str,
        preserve_space: bool,
    ) -> CodeGenerator<'source> {
        CodeGenerator {
            source,
            filename,
            preserve_space,
            code: Vec::with_capacity(source.len()),
            spaces: Vec::new(),
            has_tag: false,
            non_space: false,
            section_stack: Vec::with_capacity(8),
        }
    }

    /// Compiles a single token.
    ///
    /// `delimiters` are the delimiters in effect after the token was
    /// scanned.
    pub fn compile_token(
        &mut self,
        token: Token<'source>,
        line: usize,
        delimiters: &Delimiters,
    ) -> Result<(), Error> {
        match token {
            Token::Text(text) => {
                for c in text.chars() {
                    if c.is_whitespace() {
                        self.spaces.push(self.code.len());
                    } else {
                        self.non_space = true;
                    }
                    self.code.push(Some(Emitted::Char(c)));
                }
            }
            Token::Newline => {
                self.spaces.push(self.code.len());
                self.code.push(Some(Emitted::Char('\n')));
                self.strip_space();
            }
            Token::Tag { kind, name, span } => {
                self.has_tag = true;
                let emitted = match kind {
                    TagKind::Comment => return Ok(()),
                    TagKind::SetDelimiters => {
                        Emitted::Instr(Instruction::SetDelimiters(delimiters.clone()))
                    }
                    TagKind::Partial => Emitted::Instr(Instruction::Partial {
                        name: name.into(),
                        line,
                    }),
                    TagKind::Section | TagKind::InvertedSection => {
                        if name.is_empty() {
                            return Err(self.syntax_error("Section name may not be empty", line));
                        }
                        self.section_stack.push(name);
                        Emitted::StartSection {
                            path: name.into(),
                            inverted: kind == TagKind::InvertedSection,
                            line,
                            body_start: span.end_offset,
                            delimiters: delimiters.clone(),
                        }
                    }
                    TagKind::CloseSection => {
                        if self.section_stack.last() != Some(&name) {
                            return Err(self.syntax_error(
                                format!("Section named {name:?} was never opened"),
                                line,
                            ));
                        }
                        self.section_stack.pop();
                        Emitted::EndSection {
                            body_end: span.start_offset,
                        }
                    }
                    TagKind::Unescaped | TagKind::Variable => {
                        self.non_space = true;
                        Emitted::Instr(Instruction::Variable {
                            path: name.into(),
                            escape: kind == TagKind::Variable,
                            line,
                        })
                    }
                };
                self.code.push(Some(emitted));
            }
        }
        Ok(())
    }

    /// Drops the whitespace of the current line if it is standalone.
    fn strip_space(&mut self) {
        if self.has_tag && !self.non_space && !self.preserve_space {
            for idx in self.spaces.drain(..) {
                self.code[idx] = None;
            }
        } else {
            self.spaces.clear();
        }
        self.has_tag = false;
        self.non_space = false;
    }

    fn syntax_error<D: Into<std::borrow::Cow<'static, str>>>(&self, msg: D, line: usize) -> Error {
        let mut err = Error::new(ErrorKind::SyntaxError, msg);
        err.set_location(self.filename, line);
        err
    }

    /// Finishes compilation and returns the program.
    ///
    /// `line` is the last line of the template and is used to report
    /// sections that were never closed.
    pub fn finish(mut self, line: usize) -> Result<Program, Error> {
        if let Some(name) = self.section_stack.last() {
            return Err(self.syntax_error(format!("Section {name:?} was not closed properly"), line));
        }
        self.strip_space();

        let mut root = PendingProgram::default();
        let mut open: Vec<PendingSection> = Vec::new();

        for emitted in self.code.into_iter().flatten() {
            let current = match open.last_mut() {
                Some(section) => &mut section.body,
                None => &mut root,
            };
            match emitted {
                Emitted::Char(c) => current.literal.push(c),
                Emitted::Instr(instr) => current.push(instr),
                Emitted::StartSection {
                    path,
                    inverted,
                    line,
                    body_start,
                    delimiters,
                } => {
                    current.flush();
                    open.push(PendingSection {
                        path,
                        inverted,
                        line,
                        body_start,
                        delimiters,
                        body: PendingProgram::default(),
                    });
                }
                Emitted::EndSection { body_end } => {
                    if let Some(section) = open.pop() {
                        let instr = Instruction::Section(Box::new(Section {
                            path: section.path,
                            inverted: section.inverted,
                            body: section.body.finish(),
                            line: section.line,
                            raw_body: self.source[section.body_start..body_end].to_string(),
                            delimiters: section.delimiters,
                        }));
                        match open.last_mut() {
                            Some(parent) => parent.body.push(instr),
                            None => root.push(instr),
                        }
                    }
                }
            }
        }

        Ok(root.finish())
    }
}

/// Compiles template source into a program.
///
/// Errors carry the file label of the options and the line they were
/// detected on.
pub fn compile_program(source: &str, options: &CompileOptions) -> Result<Program, Error> {
    let filename = options.file_label();
    let mut tokenizer = Tokenizer::new(source, options.initial_delimiters().clone(), filename);
    let mut gen = CodeGenerator::new(source, filename, options.preserves_space());
    while let Some((token, line)) = ok!(tokenizer.next_token()) {
        ok!(gen.compile_token(token, line, tokenizer.delimiters()));
    }
    gen.finish(tokenizer.current_line())
}

#[cfg(test)]
fn literal(s: &str) -> Instruction {
    Instruction::Literal(s.into())
}

#[cfg(test)]
fn variable(path: &str, line: usize) -> Instruction {
    Instruction::Variable {
        path: path.into(),
        escape: true,
        line,
    }
}

#[test]
fn test_plain_program() {
    let program = compile_program("Hi {{name}}!\n{{{raw}}}", &CompileOptions::default()).unwrap();
    assert_eq!(
        program,
        vec![
            literal("Hi "),
            variable("name", 1),
            literal("!\n"),
            Instruction::Variable {
                path: "raw".into(),
                escape: false,
                line: 2,
            },
        ]
    );
}

#[test]
fn test_standalone_lines_are_stripped() {
    let source = "<ul>\n  {{#items}}\n  <li>{{.}}</li>\n  {{/items}}\n</ul>";
    let program = compile_program(source, &CompileOptions::default()).unwrap();
    assert_eq!(
        program,
        vec![
            literal("<ul>\n"),
            Instruction::Section(Box::new(Section {
                path: "items".into(),
                inverted: false,
                body: vec![literal("  <li>"), variable(".", 3), literal("</li>\n")],
                line: 2,
                raw_body: "\n  <li>{{.}}</li>\n  ".into(),
                delimiters: Delimiters::default(),
            })),
            literal("</ul>"),
        ]
    );
}

#[test]
fn test_space_option_keeps_whitespace() {
    let options = CompileOptions::default().space(true);
    let program = compile_program("  {{! comment }}\nx", &options).unwrap();
    assert_eq!(program, vec![literal("  \nx")]);
    let program = compile_program("  {{! comment }}\nx", &CompileOptions::default()).unwrap();
    assert_eq!(program, vec![literal("x")]);
}

#[test]
fn test_trailing_standalone_tag() {
    let program = compile_program("a\n  {{! end }}  ", &CompileOptions::default()).unwrap();
    assert_eq!(program, vec![literal("a\n")]);
}

#[test]
fn test_section_errors() {
    let err = compile_program("{{#a}}\n{{/b}}", &CompileOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
    assert_eq!(err.detail(), Some("Section named \"b\" was never opened"));
    assert_eq!(err.line(), Some(2));

    let err = compile_program("{{#a}}\n{{#b}}\n{{/b}}", &CompileOptions::default()).unwrap_err();
    assert_eq!(err.detail(), Some("Section \"a\" was not closed properly"));
    assert_eq!(err.line(), Some(3));

    let err = compile_program("x {{# }}", &CompileOptions::default()).unwrap_err();
    assert_eq!(err.detail(), Some("Section name may not be empty"));
    assert_eq!(err.name(), Some("<template>"));
}

#[test]
fn test_delimiters_are_recorded() {
    let program = compile_program("{{=<% %>=}}\n<%#a%><%b%><%/a%>", &CompileOptions::default())
        .unwrap();
    let delims = Delimiters::new("<%", "%>").unwrap();
    assert_eq!(
        program,
        vec![
            Instruction::SetDelimiters(delims.clone()),
            Instruction::Section(Box::new(Section {
                path: "a".into(),
                inverted: false,
                body: vec![variable("b", 2)],
                line: 2,
                raw_body: "<%b%>".into(),
                delimiters: delims,
            })),
        ]
    );
}
