use std::env;
use std::fs;
use std::path::Path;

use toml::Value;
use votingbot_core::config::{resolve_config_path, AppConfig, LoadOptions};

use crate::commands::{CommandResult, EXIT_CONFIG};

struct Field {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = config_file_path.as_deref().and_then(load_config_file_doc);

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            &field,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", field.key_path, field.value));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    vec![
        Field {
            key_path: "database.url",
            env_keys: &["VOTINGBOT_DATABASE_URL"],
            value: config.database.url.clone(),
        },
        Field {
            key_path: "database.max_connections",
            env_keys: &["VOTINGBOT_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
        },
        Field {
            key_path: "database.timeout_secs",
            env_keys: &["VOTINGBOT_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
        },
        Field {
            key_path: "database.request_timeout_ms",
            env_keys: &["VOTINGBOT_DATABASE_REQUEST_TIMEOUT_MS"],
            value: config.database.request_timeout_ms.to_string(),
        },
        Field {
            key_path: "server.bind_address",
            env_keys: &["VOTINGBOT_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        Field {
            key_path: "server.port",
            env_keys: &["VOTINGBOT_SERVER_PORT", "PORT"],
            value: config.server.port.to_string(),
        },
        Field {
            key_path: "server.graceful_shutdown_secs",
            env_keys: &["VOTINGBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
            value: config.server.graceful_shutdown_secs.to_string(),
        },
        Field {
            key_path: "server.cors_allowed_origins",
            env_keys: &["VOTINGBOT_SERVER_CORS_ALLOWED_ORIGINS"],
            value: config.server.cors_allowed_origins.join(","),
        },
        Field {
            key_path: "polls.max_cast_attempts",
            env_keys: &["VOTINGBOT_POLLS_MAX_CAST_ATTEMPTS"],
            value: config.polls.max_cast_attempts.to_string(),
        },
        Field {
            key_path: "logging.level",
            env_keys: &["VOTINGBOT_LOGGING_LEVEL", "VOTINGBOT_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key_path: "logging.format",
            env_keys: &["VOTINGBOT_LOGGING_FORMAT", "VOTINGBOT_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
        },
    ]
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let env_key = field
        .env_keys
        .iter()
        .find(|key| env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false));
    if let Some(env_key) = env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, field.key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::contains_path;

    #[test]
    fn contains_path_walks_nested_tables() {
        let doc: toml::Value = "[server]\nport = 9090\n".parse().expect("toml");
        assert!(contains_path(&doc, "server.port"));
        assert!(!contains_path(&doc, "server.bind_address"));
        assert!(!contains_path(&doc, "polls.max_cast_attempts"));
    }
}
