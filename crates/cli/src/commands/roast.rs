use std::fs;
use std::path::Path;

use billburn_agent::{extract::extract_analysis, BurnPlanner};
use billburn_core::domain::analysis::SpendingAnalysis;
use serde_json::Value;

use crate::commands::{load_config, runtime, CommandResult};

const COMMAND: &str = "roast";

pub fn run(input: &Path) -> CommandResult {
    let analysis = match read_analysis(input) {
        Ok(analysis) => analysis,
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

    match runtime.block_on(planner.roast(&analysis)) {
        Ok(roast) => CommandResult::success(COMMAND, roast),
        Err(error) => CommandResult::agent_failure(COMMAND, &error),
    }
}

/// Reads a bare analysis, an agent reply envelope, or a `POST /burn-plan`
/// response (`burn_plan` key).
pub fn read_analysis(path: &Path) -> Result<SpendingAnalysis, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("failed to read `{}`: {error}", path.display()))?;
    let mut value = serde_json::from_str::<Value>(&raw)
        .map_err(|error| format!("`{}` is not valid JSON: {error}", path.display()))?;

    if let Some(burn_plan) = value.get_mut("burn_plan").map(Value::take) {
        value = burn_plan;
    }
    extract_analysis(value).map_err(|error| error.to_string())
}
