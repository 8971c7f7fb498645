use std::path::PathBuf;

use clap::{arg, command, value_parser, ArgAction, Command};

pub(super) fn make_command() -> Command {
    command!()
        .args([
            arg!(-f --format <FORMAT> "the format of the input data")
                .value_parser([
                    "auto",
                    "json",
                    #[cfg(feature = "yaml")]
                    "yaml",
                    #[cfg(feature = "toml")]
                    "toml",
                ])
                .default_value("auto"),
            arg!(-D --define <EXPR> "defines an input variable (key=value or key:=json)")
                .action(ArgAction::Append),
            arg!(--tags <TAGS> "the initial delimiters, separated by a space (eg: \"<% %>\")"),
            arg!(--space "keep the whitespace of lines that only hold tags"),
            arg!(-p --partials <DIR> "directory to load partials from")
                .value_parser(value_parser!(PathBuf)),
            arg!(--"partial-ext" <EXT> "file extension of partials")
                .default_value("mustache")
                .requires("partials"),
            arg!(--"no-newline" "Do not output a newline"),
            arg!(--debug "log the compiled program of the template to stderr"),
            arg!(--dump <KIND> "dump internals of a template").value_parser(["instructions", "tokens"]),
            arg!(-o --output <FILENAME> "path to the output file")
                .default_value("-")
                .value_parser(value_parser!(PathBuf)),
            arg!(--select <SELECTOR> "select a path of the input data"),
            arg!(template: [TEMPLATE] "path to the input template").default_value("-"),
            arg!(data: [DATA] "path to the data file").value_parser(value_parser!(PathBuf)),
        ])
        .about("minimus-cli is a command line tool to render Mustache style templates.")
        .after_help("Set MINIMUS_LOG (eg: MINIMUS_LOG=minimus=trace) to see what the engine does.")
}
