use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::{fs, io};

use anyhow::{bail, Context, Error};
use clap::ArgMatches;
use minimus::machinery::{tokenize, Instruction};
use minimus::{CompileOptions, Delimiters, Environment, Error as MError, Partials, Value};
use tracing_subscriber::EnvFilter;

mod cli;
mod output;

use crate::output::{Output, STDIN_STDOUT};

/// Partials loaded from files in a directory.
///
/// The partial `users/row` is loaded from `<dir>/users/row.<ext>`.  Names
/// with segments starting with a dot are never loaded.
struct DirPartials {
    dir: PathBuf,
    ext: String,
}

impl Partials for DirPartials {
    fn get_partial(&self, name: &str) -> Option<Cow<'_, str>> {
        if name
            .split('/')
            .any(|segment| segment.is_empty() || segment.starts_with('.') || segment.contains('\\'))
        {
            tracing::warn!(name, "refusing to load partial");
            return None;
        }
        let path = self.dir.join(format!("{}.{}", name, self.ext));
        match fs::read_to_string(&path) {
            Ok(source) => Some(Cow::Owned(source)),
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "partial not loaded");
                None
            }
        }
    }
}

fn read_input(path: &Path, what: &str) -> Result<String, Error> {
    if path == Path::new(STDIN_STDOUT) {
        io::read_to_string(io::stdin()).with_context(|| format!("unable to read {what} from stdin"))
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("unable to read {what} file '{}'", path.display()))
    }
}

fn load_data(
    format: &str,
    path: &Path,
    selector: Option<&str>,
) -> Result<(Value, bool), Error> {
    let stdin_used = path == Path::new(STDIN_STDOUT);
    let contents = read_input(path, "data")?;
    let format = if format == "auto" {
        if stdin_used {
            bail!("auto detection does not work with data from stdin");
        }
        match path.extension().and_then(|x| x.to_str()) {
            Some("json") => "json",
            #[cfg(feature = "yaml")]
            Some("yaml" | "yml") => "yaml",
            #[cfg(feature = "toml")]
            Some("toml") => "toml",
            _ => bail!("cannot auto detect format from extension"),
        }
    } else {
        format
    };

    let mut data = match format {
        "json" => Value::from_serialize(&serde_json::from_str::<serde_json::Value>(&contents)?),
        #[cfg(feature = "yaml")]
        "yaml" => Value::from_serialize(&serde_yaml::from_str::<serde_yaml::Value>(&contents)?),
        #[cfg(feature = "toml")]
        "toml" => Value::from_serialize(&toml::from_str::<toml::Value>(&contents)?),
        _ => unreachable!(),
    };

    if let Some(selector) = selector {
        for part in selector.split('.') {
            data = data.get_attr(part).with_context(|| {
                format!(
                    "unable to select {:?} in {:?} (value was {})",
                    part,
                    selector,
                    data.kind()
                )
            })?;
        }
    }

    if data.as_map().is_none() {
        bail!("input data must be an object, got {}", data.kind());
    }
    Ok((data, stdin_used))
}

fn interpret_raw_value(s: &str) -> Result<Value, Error> {
    let value: serde_json::Value =
        serde_json::from_str(s).with_context(|| format!("invalid raw value '{s}' (not valid JSON)"))?;
    Ok(Value::from_serialize(&value))
}

fn make_context(matches: &ArgMatches, base: Value) -> Result<Value, Error> {
    let mut ctx = BTreeMap::new();
    if let Some(map) = base.as_map() {
        for (key, value) in map {
            ctx.insert(key.to_string(), value.clone());
        }
    }
    if let Some(items) = matches.get_many::<String>("define") {
        for item in items {
            if let Some((key, raw_value)) = item.split_once(":=") {
                ctx.insert(key.to_string(), interpret_raw_value(raw_value)?);
            } else if let Some((key, string_value)) = item.split_once('=') {
                ctx.insert(key.to_string(), Value::from(string_value));
            } else {
                ctx.insert(item.to_string(), Value::from(true));
            }
        }
    }
    Ok(Value::from(ctx))
}

fn make_options(matches: &ArgMatches) -> Result<CompileOptions, Error> {
    let mut options = CompileOptions::default()
        .space(matches.get_flag("space"))
        .debug(matches.get_flag("debug"));
    if let Some(tags) = matches.get_one::<String>("tags") {
        let delimiters: Delimiters = tags.parse().context("could not configure delimiters")?;
        options = options.delimiters(delimiters);
    }
    Ok(options)
}

fn print_instructions(
    output: &mut Output,
    instructions: &[Instruction],
    depth: usize,
) -> Result<(), Error> {
    let indent = depth * 2;
    for (idx, instruction) in instructions.iter().enumerate() {
        match instruction {
            Instruction::Section(section) => {
                writeln!(
                    output,
                    "{:indent$}{idx:4}: Section {{ path: {:?}, inverted: {}, line: {} }}",
                    "", section.path, section.inverted, section.line
                )?;
                print_instructions(output, &section.body, depth + 1)?;
            }
            other => writeln!(output, "{:indent$}{idx:4}: {other:?}", "")?,
        }
    }
    Ok(())
}

fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_env("MINIMUS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if debug { "minimus::compiler=debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .init();
}

fn execute() -> Result<i32, Error> {
    let matches = cli::make_command().get_matches();
    init_logging(matches.get_flag("debug"));

    let format = matches.get_one::<String>("format").map_or("auto", |x| x.as_str());
    let (base, stdin_used) = if let Some(data) = matches.get_one::<PathBuf>("data") {
        load_data(
            format,
            data,
            matches.get_one::<String>("select").map(|x| x.as_str()),
        )?
    } else {
        (Value::from(BTreeMap::<String, Value>::new()), false)
    };
    let ctx = make_context(&matches, base)?;

    let template = matches
        .get_one::<String>("template")
        .map_or(STDIN_STDOUT, |x| x.as_str());
    if template == STDIN_STDOUT && stdin_used {
        bail!("cannot load template from stdin when data is from stdin");
    }
    let source = read_input(Path::new(template), "template")?;
    let label = if template == STDIN_STDOUT {
        "<stdin>"
    } else {
        template
    };
    let options = make_options(&matches)?;

    let mut output = Output::open(
        matches
            .get_one::<PathBuf>("output")
            .map_or(Path::new(STDIN_STDOUT), |x| x.as_path()),
    )?;

    if let Some(dump) = matches.get_one::<String>("dump") {
        match dump.as_str() {
            "tokens" => {
                for rv in tokenize(&source, options.initial_delimiters().clone()) {
                    let (token, line) = rv?;
                    writeln!(&mut output, "{line:4}: {token:?}")?;
                }
            }
            "instructions" => {
                let env = Environment::new();
                let tmpl = env.compile_with_options(&source, options.file(label))?;
                print_instructions(&mut output, tmpl.program(), 0)?;
            }
            _ => unreachable!(),
        }
    } else {
        // partials are compiled with the environment options
        let mut env = Environment::new();
        env.set_options(options.clone());
        let tmpl = env.compile_with_options(&source, options.file(label))?;
        let result = match matches.get_one::<PathBuf>("partials") {
            Some(dir) => {
                let partials = DirPartials {
                    dir: dir.clone(),
                    ext: matches
                        .get_one::<String>("partial-ext")
                        .map_or("mustache", |x| x.as_str())
                        .trim_start_matches('.')
                        .to_string(),
                };
                tmpl.render(&ctx, &partials)?
            }
            None => tmpl.render(&ctx, ())?,
        };
        if matches.get_flag("no-newline") {
            write!(&mut output, "{result}")?;
        } else {
            writeln!(&mut output, "{result}")?;
        }
    }

    output.commit()?;
    Ok(0)
}

pub fn print_error(err: &Error) {
    eprintln!("error: {err}");
    if let Some(err) = err.downcast_ref::<MError>() {
        if err.template_source().is_some() {
            eprintln!("{err:#}");
        }
    }
    let mut source_opt = err.source();
    while let Some(source) = source_opt {
        eprintln!();
        eprintln!("caused by: {source}");
        if let Some(source) = source.downcast_ref::<MError>() {
            if source.template_source().is_some() {
                eprintln!("{source:#}");
            }
        }
        source_opt = source.source();
    }
}

fn main() {
    match execute() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            print_error(&err);
            std::process::exit(1);
        }
    }
}
