use billburn_core::config::{AppConfig, LoadOptions, StorageBackend};
use billburn_db::{connect_from_config, ping};
use serde::Serialize;

use crate::commands::runtime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 3] = ["agent_runtime", "invoice_storage", "database_connectivity"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\
                 \"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_agent_runtime(&config));
            checks.push(check_invoice_storage(&config));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_agent_runtime(config: &AppConfig) -> DoctorCheck {
    match config.agent.runtime_arn.as_deref().filter(|_| config.agent.is_configured()) {
        Some(arn) => {
            let auth = if config.agent.bearer_token.is_some() {
                "bearer token"
            } else if config.aws.credentials().is_some() {
                "SigV4 credentials"
            } else {
                "no credentials; requests will be unsigned"
            };
            DoctorCheck {
                name: "agent_runtime",
                status: CheckStatus::Pass,
                details: format!(
                    "runtime `{arn}` at {} ({auth})",
                    config.agent.resolved_endpoint(&config.aws.region)
                ),
            }
        }
        None => DoctorCheck {
            name: "agent_runtime",
            status: CheckStatus::Fail,
            details: "no runtime ARN; set AGENTCORE_AGENT_RUNTIME_ARN or agent.runtime_arn"
                .to_string(),
        },
    }
}

fn check_invoice_storage(config: &AppConfig) -> DoctorCheck {
    if !config.storage.enabled {
        return DoctorCheck {
            name: "invoice_storage",
            status: CheckStatus::Skipped,
            details: "invoice uploads disabled".to_string(),
        };
    }

    match config.storage.backend {
        StorageBackend::Local => DoctorCheck {
            name: "invoice_storage",
            status: CheckStatus::Pass,
            details: format!("local directory `{}`", config.storage.local_dir.display()),
        },
        StorageBackend::S3 if config.aws.credentials().is_some() => DoctorCheck {
            name: "invoice_storage",
            status: CheckStatus::Pass,
            details: format!(
                "bucket `{}` at {}",
                config.storage.bucket,
                config.storage.resolved_endpoint(&config.aws.region)
            ),
        },
        StorageBackend::S3 => DoctorCheck {
            name: "invoice_storage",
            status: CheckStatus::Fail,
            details: format!(
                "bucket `{}` needs AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY for signed uploads",
                config.storage.bucket
            ),
        },
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    if !config.database.enabled {
        return DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Skipped,
            details: "burn plan store disabled".to_string(),
        };
    }

    let runtime = match runtime("doctor") {
        Ok(runtime) => runtime,
        Err(failure) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: failure.output,
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        let checked = ping(&pool).await.map_err(|error| format!("database query failed: {error}"));
        pool.close().await;
        checked
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
