use std::io::Write;
use std::process::Command;

use insta_cmd::{assert_cmd_snapshot, get_cargo_bin};
use tempfile::NamedTempFile;

fn cli() -> Command {
    let mut cmd = Command::new(get_cargo_bin("minimus-cli"));
    cmd.env_remove("MINIMUS_LOG");
    cmd
}

fn file_with_contents(contents: &str) -> NamedTempFile {
    file_with_contents_and_ext(contents, "")
}

fn file_with_contents_and_ext<X: AsRef<[u8]>>(contents: X, ext: &str) -> NamedTempFile {
    let mut f = tempfile::Builder::new()
        .prefix("minimus-testfile--")
        .suffix(ext)
        .tempfile()
        .unwrap();
    f.write_all(contents.as_ref()).unwrap();
    f
}

macro_rules! bind_common_filters {
    ($($expr:expr),*) => {
        let mut settings = insta::Settings::clone_current();
        settings.add_filter(
            r"(?m)^-+ (minimus-testfile--\S+) -+$",
            "--- [TEMPLATE] ---",
        );
        settings.add_filter(
            r"\(in .*minimus-testfile--.*?:(\d+)\)",
            "(in [TEMPLATE]:$1)",
        );
        settings.add_filter(r"\bminimus-cli\.exe\b", "minimus-cli");
        let _guard = settings.bind_to_scope();
    };
}

#[test]
fn test_explicit_format() {
    let input = file_with_contents(r#"{"foo": "bar"}"#);
    let tmpl = file_with_contents(r#"Hello {{foo}}!"#);

    assert_cmd_snapshot!(
        cli()
            .arg("--format=json")
            .arg(tmpl.path())
            .arg(input.path()),
        @r###"
    success: true
    exit_code: 0
    ----- stdout -----
    Hello bar!

    ----- stderr -----
    "###);
}

#[test]
fn test_no_newline() {
    let input = file_with_contents(r#"{"foo": "bar"}"#);
    let tmpl = file_with_contents(r#"Hello {{foo}}!"#);

    assert_cmd_snapshot!(
        cli()
            .arg("--format=json")
            .arg("--no-newline")
            .arg(tmpl.path())
            .arg(input.path()),
        @r###"
    success: true
    exit_code: 0
    ----- stdout -----
    Hello bar!
    ----- stderr -----
    "###);
}

#[test]
fn test_json_sections() {
    let input = file_with_contents_and_ext(r#"{"items": [{"n": 1}, {"n": 2}]}"#, ".json");
    let tmpl = file_with_contents("{{#items}}{{n}}-{{/items}}{{^items}}none{{/items}}");

    assert_cmd_snapshot!(
        cli()
            .arg(tmpl.path())
            .arg(input.path()),
        @r###"
    success: true
    exit_code: 0
    ----- stdout -----
    1-2-

    ----- stderr -----
    "###);
}

#[test]
#[cfg(feature = "yaml")]
fn test_yaml() {
    let input = file_with_contents_and_ext("foo: bar", ".yaml");
    let tmpl = file_with_contents(r#"Hello {{foo}}!"#);

    assert_cmd_snapshot!(
        cli()
            .arg(tmpl.path())
            .arg(input.path()),
        @r###"
    success: true
    exit_code: 0
    ----- stdout -----
    Hello bar!

    ----- stderr -----
    "###);
}

#[test]
#[cfg(feature = "toml")]
fn test_toml() {
    let input = file_with_contents_and_ext("[section]\nfoo = \"bar\"", ".toml");
    let tmpl = file_with_contents(r#"Hello {{section.foo}}!"#);

    assert_cmd_snapshot!(
        cli()
            .arg(tmpl.path())
            .arg(input.path()),
        @r###"
    success: true
    exit_code: 0
    ----- stdout -----
    Hello bar!

    ----- stderr -----
    "###);
}

#[test]
fn test_defines() {
    let tmpl = file_with_contents(r#"{{greeting}} {{who}}{{#loud}}!{{/loud}}"#);

    assert_cmd_snapshot!(
        cli()
            .arg("-D")
            .arg("greeting=Hello")
            .arg("-D")
            .arg(r#"who:="World""#)
            .arg("-D")
            .arg("loud")
            .arg(tmpl.path()),
        @r###"
    success: true
    exit_code: 0
    ----- stdout -----
    Hello World!

    ----- stderr -----
    "###);
}

#[test]
fn test_select() {
    let input = file_with_contents_and_ext(r#"{"user": {"name": "Bo"}}"#, ".json");
    let tmpl = file_with_contents(r#"Hi {{name}}"#);

    assert_cmd_snapshot!(
        cli()
            .arg("--select=user")
            .arg(tmpl.path())
            .arg(input.path()),
        @r###"
    success: true
    exit_code: 0
    ----- stdout -----
    Hi Bo

    ----- stderr -----
    "###);
}

#[test]
fn test_tags_and_partials() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("row.mustache"), "<%.%>;").unwrap();
    let input = file_with_contents_and_ext(r#"{"items": ["a", "b"]}"#, ".json");
    let tmpl = file_with_contents("<%#items%><%> row%><%/items%>");

    assert_cmd_snapshot!(
        cli()
            .arg("--tags=<% %>")
            .arg("--partials")
            .arg(dir.path())
            .arg(tmpl.path())
            .arg(input.path()),
        @r###"
    success: true
    exit_code: 0
    ----- stdout -----
    a;b;

    ----- stderr -----
    "###);
}

#[test]
fn test_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");
    let tmpl = file_with_contents("{{x}}");

    assert_cmd_snapshot!(
        cli()
            .arg("-D")
            .arg("x=42")
            .arg("-o")
            .arg(&out)
            .arg(tmpl.path()),
        @r###"
    success: true
    exit_code: 0
    ----- stdout -----

    ----- stderr -----
    "###);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "42\n");
}

#[test]
fn test_syntax_error() {
    let tmpl = file_with_contents("{{#a}}\n{{/b}}");

    bind_common_filters!();
    assert_cmd_snapshot!(
        cli()
            .arg(tmpl.path()),
        @r###"
    success: false
    exit_code: 1
    ----- stdout -----

    ----- stderr -----
    error: syntax error: Section named "b" was never opened (in [TEMPLATE]:2)
    syntax error: Section named "b" was never opened (in [TEMPLATE]:2)
    --- [TEMPLATE] ---
       1 | {{#a}}
       2 > {{/b}}
    ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    "###);
}

#[test]
fn test_missing_data_format() {
    let input = file_with_contents(r#"{"foo": "bar"}"#);
    let tmpl = file_with_contents("{{foo}}");

    assert_cmd_snapshot!(
        cli()
            .arg(tmpl.path())
            .arg(input.path()),
        @r###"
    success: false
    exit_code: 1
    ----- stdout -----

    ----- stderr -----
    error: cannot auto detect format from extension
    "###);
}
