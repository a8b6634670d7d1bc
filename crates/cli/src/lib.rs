pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use commands::plan::PlanArgs;

#[derive(Debug, Parser)]
#[command(
    name = "billburn",
    about = "AWS Bill Burner operator CLI",
    long_about = "Generate and roast AWS burn plans, inspect configuration, check readiness, \
                  and migrate the burn plan store.",
    after_help = "Examples:\n  \
                  billburn plan --amount '$3000' --timeline 30 --efficiency 'Very stupid' \
                  --architecture serverless --burning-style vertical\n  \
                  billburn plan --interactive --report\n  \
                  billburn doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Ask the agent runtime for a burn plan and print it")]
    Plan(PlanArgs),
    #[command(about = "Ask the agent runtime to roast a saved burn plan")]
    Roast {
        #[arg(long, help = "Path to a burn plan JSON file (bare analysis or API response)")]
        input: PathBuf,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, agent runtime, storage, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Plan(args) => commands::plan::run(&args),
        Command::Roast { input } => commands::roast::run(&input),
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Warnings go to stderr so stdout stays parseable.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(tracing::Level::WARN)
        .compact()
        .try_init();
}
