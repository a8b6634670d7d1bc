use billburn_agent::BurnPlanner;
use billburn_core::domain::scenario::{ArchitectureType, BurnConfig, BurningStyle, EfficiencyLevel};
use billburn_core::errors::DomainError;
use billburn_core::report::format_report;
use clap::Args;
use inquire::{CustomType, Select, Text};

use crate::commands::{load_config, runtime, CommandResult};

const COMMAND: &str = "plan";

#[derive(Debug, Default, Args)]
pub struct PlanArgs {
    #[arg(long, help = "Amount to burn, e.g. '$3000'")]
    pub amount: Option<String>,
    #[arg(long, help = "Timeline in days")]
    pub timeline: Option<i64>,
    #[arg(long, help = "Efficiency level label or 1-4 index")]
    pub efficiency: Option<String>,
    #[arg(long, default_value = "mixed", help = "Architecture type label or 1-4 index")]
    pub architecture: String,
    #[arg(long, default_value = "horizontal", help = "Burning style label or 1-2 index")]
    pub burning_style: String,
    #[arg(long, help = "Model identifier forwarded to the agent runtime")]
    pub model: Option<String>,
    #[arg(long, help = "Prompt for every parameter")]
    pub interactive: bool,
    #[arg(long, help = "Print the text report instead of JSON")]
    pub report: bool,
}

pub fn run(args: &PlanArgs) -> CommandResult {
    let burn_config = if args.interactive { prompt_config(args) } else { burn_config(args) };
    let burn_config = match burn_config {
        Ok(config) => config,
        Err(message) => return CommandResult::failure(COMMAND, "validation_error", message, 2),
    };

    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let planner = match BurnPlanner::from_config(&config) {
        Ok(Some(planner)) => planner,
        Ok(None) => {
            return CommandResult::failure(
                COMMAND,
                "not_configured",
                "agent runtime is not configured \
                 (set AGENTCORE_AGENT_RUNTIME_ARN or agent.runtime_arn)",
                3,
            );
        }
        Err(error) => {
            return CommandResult::failure(COMMAND, "not_configured", error.to_string(), 3)
        }
    };
    let runtime = match runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    match runtime.block_on(planner.generate_burn_plan(&burn_config)) {
        Ok(analysis) if args.report => {
            CommandResult { exit_code: 0, output: format_report(&analysis) }
        }
        Ok(analysis) => match serde_json::to_string_pretty(&analysis) {
            Ok(output) => CommandResult { exit_code: 0, output },
            Err(error) => CommandResult::failure(COMMAND, "internal_error", error.to_string(), 1),
        },
        Err(error) => CommandResult::agent_failure(COMMAND, &error),
    }
}

/// Builds the request from flags; labels accept canonical text or a 1-based index.
pub fn burn_config(args: &PlanArgs) -> Result<BurnConfig, String> {
    let amount = args.amount.clone().ok_or("--amount is required")?;
    let timeline = args.timeline.ok_or("--timeline is required")?;
    let efficiency = args.efficiency.as_deref().ok_or("--efficiency is required")?;

    let config = parse_labels(amount, timeline, efficiency, &args.architecture, &args.burning_style)
        .map_err(|error| error.to_string())?
        .with_model(args.model.clone());
    config.validate().map_err(|error| error.to_string())?;
    Ok(config)
}

fn parse_labels(
    amount: String,
    timeline: i64,
    efficiency: &str,
    architecture: &str,
    burning_style: &str,
) -> Result<BurnConfig, DomainError> {
    Ok(BurnConfig::new(
        amount,
        timeline,
        efficiency.parse::<EfficiencyLevel>()?,
        architecture.parse::<ArchitectureType>()?,
        burning_style.parse::<BurningStyle>()?,
    ))
}

fn prompt_config(args: &PlanArgs) -> Result<BurnConfig, String> {
    let prompt_error = |error: inquire::InquireError| format!("prompt aborted: {error}");

    let amount = Text::new("How much did you burn?")
        .with_default(args.amount.as_deref().unwrap_or("$1000"))
        .with_help_message("Dollar amount, e.g. $3000 or $1,000,000")
        .prompt()
        .map_err(prompt_error)?;
    let timeline = CustomType::<i64>::new("Over how many days?")
        .with_default(args.timeline.unwrap_or(30))
        .with_error_message("Enter a whole number of days")
        .prompt()
        .map_err(prompt_error)?;
    let stupidity = Select::new("How efficient were you?", EfficiencyLevel::ALL.to_vec())
        .with_help_message(&level_help(&EfficiencyLevel::ALL, EfficiencyLevel::description))
        .prompt()
        .map_err(prompt_error)?;
    let architecture = Select::new("Which architecture?", ArchitectureType::ALL.to_vec())
        .with_help_message(&level_help(&ArchitectureType::ALL, ArchitectureType::description))
        .prompt()
        .map_err(prompt_error)?;
    let burning_style = Select::new("How did the spend ramp?", BurningStyle::ALL.to_vec())
        .with_help_message(&level_help(&BurningStyle::ALL, BurningStyle::description))
        .prompt()
        .map_err(prompt_error)?;

    let config = BurnConfig::new(amount, timeline, stupidity, architecture, burning_style)
        .with_model(args.model.clone());
    config.validate().map_err(|error| error.to_string())?;
    Ok(config)
}

fn level_help<T: Copy + std::fmt::Display>(
    all: &[T],
    description: fn(T) -> &'static str,
) -> String {
    all.iter()
        .map(|level| format!("{level}: {}", description(*level)))
        .collect::<Vec<_>>()
        .join(" | ")
}
