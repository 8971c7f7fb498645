#![cfg(feature = "unstable_machinery")]
use minimus::machinery::{compile_program, tokenize, Instruction, Section, TagKind, Token};
use minimus::{CompileOptions, Delimiters};

use similar_asserts::assert_eq;

#[test]
fn test_tokenize_reports_lines() {
    let lines = tokenize("a\n{{#b}}\n{{/b}}", Delimiters::default())
        .map(|rv| rv.unwrap())
        .filter_map(|(token, line)| match token {
            Token::Tag { kind, name, .. } => Some((kind, name.to_string(), line)),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(
        lines,
        vec![
            (TagKind::Section, "b".to_string(), 2),
            (TagKind::CloseSection, "b".to_string(), 3),
        ]
    );
}

#[test]
fn test_compiled_program_shape() {
    let program = compile_program(
        "{{#list}}\n  {{{item}}}\n{{/list}}\n{{^list}}empty{{/list}}",
        &CompileOptions::default(),
    )
    .unwrap();
    assert_eq!(
        program,
        vec![
            Instruction::Section(Box::new(Section {
                path: "list".into(),
                inverted: false,
                body: vec![
                    Instruction::Literal("  ".into()),
                    Instruction::Variable {
                        path: "item".into(),
                        escape: false,
                        line: 2,
                    },
                    Instruction::Literal("\n".into()),
                ],
                line: 1,
                raw_body: "\n  {{{item}}}\n".into(),
                delimiters: Delimiters::default(),
            })),
            Instruction::Section(Box::new(Section {
                path: "list".into(),
                inverted: true,
                body: vec![Instruction::Literal("empty".into())],
                line: 4,
                raw_body: "empty".into(),
                delimiters: Delimiters::default(),
            })),
        ]
    );
}
