use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use votingbot_cli::commands::{config, doctor, migrate};

#[test]
fn migrate_returns_success_with_in_memory_database() {
    with_env(&[("VOTINGBOT_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "applied 1 pending migration(s)");
    });
}

#[test]
fn migrate_is_idempotent_against_a_file_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("polls.db").display());

    with_env(&[("VOTINGBOT_DATABASE_URL", url.as_str())], || {
        let first = migrate::run();
        assert_eq!(first.exit_code, 0);

        let second = migrate::run();
        assert_eq!(second.exit_code, 0);
        let payload = parse_payload(&second.output);
        assert_eq!(payload["message"], "schema already up to date");
    });
}

#[test]
fn migrate_returns_config_failure_for_unsupported_database() {
    with_env(&[("VOTINGBOT_DATABASE_URL", "postgres://localhost/polls")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn migrate_returns_connectivity_failure_for_unreachable_database() {
    with_env(&[("VOTINGBOT_DATABASE_URL", "sqlite:///nonexistent-dir/votingbot.db")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 4, "expected connectivity failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "db_connectivity");
    });
}

#[test]
fn config_reports_env_and_default_sources() {
    with_env(
        &[("VOTINGBOT_DATABASE_URL", "sqlite::memory:"), ("VOTINGBOT_POLLS_MAX_CAST_ATTEMPTS", "9")],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);
            assert!(result
                .output
                .contains("- database.url = sqlite::memory: (source: env (VOTINGBOT_DATABASE_URL))"));
            assert!(result.output.contains(
                "- polls.max_cast_attempts = 9 (source: env (VOTINGBOT_POLLS_MAX_CAST_ATTEMPTS))"
            ));
            assert!(result.output.contains("- server.port = 8080 (source: default)"));
            assert!(result.output.contains("- logging.format = compact (source: default)"));
        },
    );
}

#[test]
fn config_returns_failure_for_invalid_values() {
    with_env(&[("VOTINGBOT_POLLS_MAX_CAST_ATTEMPTS", "0")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_json_reports_all_checks_passing() {
    with_env(&[("VOTINGBOT_DATABASE_URL", "sqlite::memory:")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "fresh in-memory database only warns");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");

        let checks = payload["checks"].as_array().expect("checks array");
        let names: Vec<&str> =
            checks.iter().filter_map(|check| check["name"].as_str()).collect();
        assert_eq!(names, vec!["config_validation", "database_connectivity", "schema_migrations"]);
        assert_eq!(checks[2]["status"], "warn");
    });
}

#[test]
fn doctor_reports_connectivity_failure() {
    with_env(&[("VOTINGBOT_DATABASE_URL", "sqlite:///nonexistent-dir/votingbot.db")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 4);
        assert!(result.output.contains("- [fail] database_connectivity:"));
        assert!(result.output.contains("- [skip] schema_migrations:"));
    });
}

#[test]
fn doctor_reports_config_failure() {
    with_env(&[("VOTINGBOT_LOGGING_LEVEL", "chatty")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid json")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "VOTINGBOT_DATABASE_URL",
        "VOTINGBOT_DATABASE_MAX_CONNECTIONS",
        "VOTINGBOT_DATABASE_TIMEOUT_SECS",
        "VOTINGBOT_DATABASE_REQUEST_TIMEOUT_MS",
        "VOTINGBOT_SERVER_BIND_ADDRESS",
        "VOTINGBOT_SERVER_PORT",
        "VOTINGBOT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "VOTINGBOT_SERVER_CORS_ALLOWED_ORIGINS",
        "VOTINGBOT_POLLS_MAX_CAST_ATTEMPTS",
        "VOTINGBOT_LOGGING_LEVEL",
        "VOTINGBOT_LOGGING_FORMAT",
        "VOTINGBOT_LOG_LEVEL",
        "VOTINGBOT_LOG_FORMAT",
        "PORT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
