use std::collections::BTreeMap;
use std::fmt::Write;
use std::fs;

use minimus::{CompileOptions, Environment};

/// Renders every `inputs/*.txt` file into a snapshot.  Files consist of a
/// JSON context and the template separated by a `---` line.
#[test]
fn test_vm() {
    let mut partials = BTreeMap::new();
    insta::glob!("inputs/partials/*.mustache", |path| {
        let name = path.file_stem().unwrap().to_str().unwrap().to_string();
        partials.insert(name, fs::read_to_string(path).unwrap());
    });

    insta::glob!("inputs/*.txt", |path| {
        let filename = path.file_name().unwrap().to_str().unwrap();
        let contents = fs::read_to_string(path).unwrap();
        let mut iter = contents.splitn(2, "\n---\n");
        let ctx: serde_json::Value = serde_json::from_str(iter.next().unwrap()).unwrap();
        let source = iter.next().unwrap();

        let env = Environment::new();
        let options = CompileOptions::default().file(filename);
        let rendered = match env.compile_with_options(source, options) {
            Err(err) => format!("!!!SYNTAX ERROR!!!\n{err}\n"),
            Ok(tmpl) => match tmpl.render(&ctx, &partials) {
                Ok(mut rendered) => {
                    rendered.push('\n');
                    rendered
                }
                Err(err) => {
                    let mut rendered = format!("!!!ERROR!!!\n{err}\n");
                    let mut err = &err as &dyn std::error::Error;
                    while let Some(next_err) = err.source() {
                        writeln!(rendered, "caused by: {next_err}").unwrap();
                        err = next_err;
                    }
                    rendered
                }
            },
        };

        insta::with_settings!({
            info => &ctx,
            description => source.trim_end(),
            omit_expression => true
        }, {
            insta::assert_snapshot!(&rendered);
        });
    });
}
