use serde::Serialize;
use votingbot_core::config::{AppConfig, LoadOptions};
use votingbot_db::{connect_with_settings, migrations, ping};

use crate::commands::{
    current_thread_runtime, escape_json, CommandResult, EXIT_CONFIG, EXIT_CONNECTIVITY,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
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

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = exit_code_for(&report);

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
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
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["database_connectivity", "schema_migrations"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            }];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck {
                        name: "database_connectivity",
                        status: CheckStatus::Fail,
                        details: format!("failed to connect to database: {error}"),
                    },
                    DoctorCheck {
                        name: "schema_migrations",
                        status: CheckStatus::Skipped,
                        details: "skipped because the database is unreachable".to_string(),
                    },
                ];
            }
        };

        let connectivity = match ping(&pool).await {
            Ok(()) => DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`", config.database.url),
            },
            Err(error) => DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("database query failed: {error}"),
            },
        };

        // Pending migrations are applied at server start, so they only warn.
        let schema = match migrations::pending_versions(&pool).await {
            Ok(pending) if pending.is_empty() => DoctorCheck {
                name: "schema_migrations",
                status: CheckStatus::Pass,
                details: "all migrations applied".to_string(),
            },
            Ok(pending) => DoctorCheck {
                name: "schema_migrations",
                status: CheckStatus::Warn,
                details: format!(
                    "{} migration(s) pending; run `votingbot migrate` or start the server",
                    pending.len()
                ),
            },
            Err(error) => DoctorCheck {
                name: "schema_migrations",
                status: CheckStatus::Fail,
                details: format!("could not read migration state: {error}"),
            },
        };

        pool.close().await;
        vec![connectivity, schema]
    })
}

fn exit_code_for(report: &DoctorReport) -> u8 {
    let failed = |name: &str| {
        report.checks.iter().any(|check| check.name == name && check.status == CheckStatus::Fail)
    };

    if failed("config_validation") {
        EXIT_CONFIG
    } else if report.overall_status == CheckStatus::Fail {
        EXIT_CONNECTIVITY
    } else {
        0
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
