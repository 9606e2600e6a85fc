pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "goldsmith",
    about = "Goldsmith Connect operator CLI",
    long_about = "Operate Goldsmith Connect: migrations, demo data, readiness checks, config inspection and operator sessions.",
    after_help = "Examples:\n  goldsmith migrate\n  goldsmith doctor --json\n  goldsmith issue-session --role admin --subject ADM-ops"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo marketplace dataset and verify it")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, DB connectivity, schema state and pricing feed settings")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Issue a signed session token for a role and subject")]
    IssueSession {
        #[arg(long, help = "admin, goldsmith or customer")]
        role: String,
        #[arg(long, help = "Subject id carried in the token, e.g. GSM-... or ADM-ops")]
        subject: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::IssueSession { role, subject } => commands::issue_session::run(&role, &subject),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
