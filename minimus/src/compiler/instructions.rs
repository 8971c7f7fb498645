use crate::syntax::Delimiters;

/// An ordered list of instructions.
///
/// Sections embed their body as a nested program so a program is a tree.
pub type Program = Vec<Instruction>;

/// Represents an instruction for the VM.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Emits raw template data.
    Literal(String),

    /// Looks up a path and emits the value.
    Variable {
        path: String,
        escape: bool,
        line: usize,
    },

    /// Renders the named partial with the current scope.
    Partial { name: String, line: usize },

    /// Evaluates a section.
    Section(Box<Section>),

    /// Marks where the delimiters were changed.
    ///
    /// This only has an effect while compiling, the VM skips it.
    SetDelimiters(Delimiters),
}

/// A section with its nested program.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// The dotted path the section looks up.
    pub path: String,
    /// Inverted sections render when the value is missing or empty.
    pub inverted: bool,
    /// The compiled section body.
    pub body: Program,
    /// The line of the opening tag.
    pub line: usize,
    /// The unrendered body source as written in the template.
    pub raw_body: String,
    /// The delimiters that were active when the section was opened.
    pub delimiters: Delimiters,
}
