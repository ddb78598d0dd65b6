//! Main `FlowWorks` binary command line arguments options.
//!
//! This module declares a function to build `clap` command line arguments
//! parser, so that it can be used from other places than the main binary,
//! such as from bash completion file generator.

use clap::{value_parser, Arg, ArgAction, Command};
use clap_complete::Shell;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn arg_debug() -> Arg {
    Arg::new("debug")
        .short('d')
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Activate debug mode")
}

fn arg_verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .help("Activate verbose mode")
}

fn arg_ecslog() -> Arg {
    Arg::new("ecslog")
        .short('e')
        .long("ecslog")
        .action(ArgAction::SetTrue)
        .help("Output logs in ECS format")
}

fn arg_input() -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .action(ArgAction::Set)
        .required(true)
        .help("Input program (JSON)")
}

fn arg_output(help: &str) -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .action(ArgAction::Set)
        .help(help.to_string())
}

fn arg_filter_class() -> Arg {
    Arg::new("filter-class")
        .long("filter-class")
        .action(ArgAction::Set)
        .help("Class(es) regex filter")
}

fn arg_filter_method() -> Arg {
    Arg::new("filter-method")
        .long("filter-method")
        .action(ArgAction::Set)
        .help("Method(s) regex filter")
}

fn arg_json() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print the report as JSON")
}

/// Analysis configuration arguments, each one overriding the options file.
fn analysis_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("options")
            .long("options")
            .action(ArgAction::Set)
            .help("Analysis options file (key = value lines)"),
    )
    .arg(
        Arg::new("interprocedural")
            .long("interprocedural")
            .action(ArgAction::Set)
            .value_parser(["none", "non-context-sensitive", "context-sensitive"])
            .help("Interprocedural analysis kind"),
    )
    .arg(
        Arg::new("max-depth")
            .long("max-depth")
            .action(ArgAction::Set)
            .help("Maximum length of followed call chains"),
    )
    .arg(
        Arg::new("pessimistic")
            .long("pessimistic")
            .action(ArgAction::Set)
            .value_parser(["true", "false", "default"])
            .help("Account for calls that are not followed pessimistically"),
    )
}

#[must_use]
pub fn flowworks() -> Command {
    Command::new(NAME)
        .version(VERSION)
        .author(AUTHORS)
        .about(DESCRIPTION)
        .subcommand(cfg())
        .subcommand(dataflow())
        .subcommand(dispose())
        .subcommand(paramcheck())
        .subcommand(
            Command::new("gen-completions")
                .about("Generates completions file")
                .arg(
                    Arg::new("shell")
                        .short('s')
                        .long("shell")
                        .action(ArgAction::Set)
                        .value_parser(value_parser!(Shell))
                        .required(true)
                        .help("Shell type for completion generation"),
                ),
        )
}

#[must_use]
pub fn cfg() -> Command {
    Command::new("cfg")
        .bin_name("fw-cfg")
        .version(VERSION)
        .author(AUTHORS)
        .about("Prints methods control flow graphs")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_output("Dot output directory"))
        .arg(arg_filter_class())
        .arg(arg_filter_method())
}

#[must_use]
pub fn dataflow() -> Command {
    let cmd = Command::new("dataflow")
        .bin_name("fw-dataflow")
        .version(VERSION)
        .author(AUTHORS)
        .about("Prints the per block states of a dataflow analysis")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_filter_class())
        .arg(arg_filter_method())
        .arg(
            Arg::new("kind")
                .short('k')
                .long("kind")
                .action(ArgAction::Set)
                .value_parser([
                    "points-to",
                    "copy",
                    "value-content",
                    "null",
                    "dispose",
                    "parameter-validation",
                ])
                .required(true)
                .help("Analysis to run"),
        );
    analysis_args(cmd)
}

#[must_use]
pub fn dispose() -> Command {
    let cmd = Command::new("dispose")
        .bin_name("fw-dispose")
        .version(VERSION)
        .author(AUTHORS)
        .about("Reports leaked disposable objects and undisposed owned fields")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_filter_class())
        .arg(arg_filter_method())
        .arg(arg_json());
    analysis_args(cmd)
}

#[must_use]
pub fn paramcheck() -> Command {
    let cmd = Command::new("paramcheck")
        .bin_name("fw-paramcheck")
        .version(VERSION)
        .author(AUTHORS)
        .about("Reports parameters dereferenced before being checked against null")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_filter_class())
        .arg(arg_filter_method())
        .arg(arg_json())
        .arg(
            Arg::new("all")
                .short('a')
                .long("all")
                .action(ArgAction::SetTrue)
                .help("Check every method, not only public ones"),
        );
    analysis_args(cmd)
}
