//! CLI argument definitions for `strata`.

use clap::{Arg, ArgAction, Command};

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("Strata")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Play adaptive multi-layer music from a session file")
        .arg_required_else_help(true)
        .arg(
            Arg::new("intensity")
                .long("intensity")
                .short('i')
                .value_name("VALUE")
                .help("Starting intensity (0.0-1.0); overrides the session value"),
        )
        .arg(
            Arg::new("play")
                .long("play")
                .short('p')
                .value_name("SOUND_ID")
                .help("Start this sound as soon as the session is loaded"),
        )
        .arg(
            Arg::new("preload")
                .long("preload")
                .action(ArgAction::SetTrue)
                .help("Decode every adaptive sound before opening the TUI"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Do not open the TUI; play until interrupted"),
        )
        .arg(
            Arg::new("INPUT")
                .help("The session JSON file")
                .required(false)
                .index(1),
        )
        .subcommand(
            Command::new("mix")
                .about("Print the layer volumes for an intensity")
                .arg(
                    Arg::new("INTENSITY")
                        .help("Intensity between 0.0 and 1.0")
                        .required(true)
                        .allow_negative_numbers(true)
                        .index(1),
                )
                .arg(
                    Arg::new("layers")
                        .long("layers")
                        .value_name("LIST")
                        .default_value("low,mid,high")
                        .help("Comma separated layers present on the sound"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the levels as JSON"),
                ),
        )
        .subcommand(
            Command::new("detect")
                .about("Detect sibling `Intensity N` layer files for a path")
                .arg(
                    Arg::new("PATH")
                        .help("Any one of the layer files")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Probe every adaptive sound of a session")
                .arg(
                    Arg::new("INPUT")
                        .help("The session JSON file")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("create")
                .about("Emit default JSON payloads")
                .subcommand(Command::new("session-json").about("Print an example session file")),
        )
}
