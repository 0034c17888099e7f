pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::smoke::SmokeOptions;

#[derive(Debug, Parser)]
#[command(
    name = "dialtone",
    about = "Dialtone operator CLI",
    long_about = "Inspect configuration, probe the generation backend and telephony account, and smoke-test a running webhook server.",
    after_help = "Examples:\n  dialtone doctor --json\n  dialtone config\n  dialtone smoke --url http://127.0.0.1:8000"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, then probe the generation backend and telephony credentials")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Post sample voice, speech and SMS webhooks at a running server")]
    Smoke {
        #[arg(long, default_value = "http://127.0.0.1:8000", help = "Base URL of the server")]
        url: String,
        #[arg(long, default_value = "+15555550100", help = "Caller number sent as `From`")]
        from: String,
        #[arg(long, default_value = "Hello", help = "Speech result and SMS body to send")]
        body: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Smoke { url, from, body } => {
            commands::smoke::run(&SmokeOptions { url, from, body })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
