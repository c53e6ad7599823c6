// src/cli.rs
use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

pub mod commands {
    pub mod run;
}

use commands::run::{self, RunOptions};

pub fn build_cli() -> Command {
    Command::new("testitem-runner")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs one test item in an isolated namespace and prints its result as JSON.")
        .arg(
            Arg::new("request")
                .help("Request JSON, `-` to read it from stdin, or `@FILE` to read it from a file")
                .value_name("REQUEST")
                .required(true)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Runner configuration file (defaults to $TESTITEM_RUNNER_CONFIG)")
                .value_name("CONFIG")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .help("Print a human-readable summary to stderr after the JSON result")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Show environment resolution progress on stderr")
                .action(ArgAction::SetTrue),
        )
}

/// Turns parsed matches into run options.
pub fn options_from_matches(matches: &ArgMatches) -> RunOptions {
    RunOptions {
        request: matches
            .get_one::<String>("request")
            .cloned()
            .unwrap_or_default(),
        config: matches.get_one::<PathBuf>("config").cloned(),
        report: matches.get_flag("report"),
        verbose: matches.get_flag("verbose"),
    }
}

pub fn run() -> Result<()> {
    let matches = build_cli().get_matches();
    run::execute(options_from_matches(&matches))
}
