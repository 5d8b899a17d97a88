use crate::commands::{
    current_thread_runtime, CommandResult, EXIT_CONFIG, EXIT_CONNECTIVITY, EXIT_MIGRATION,
    EXIT_RUNTIME,
};
use votingbot_core::config::{AppConfig, LoadOptions};
use votingbot_db::{connect_with_settings, migrations};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), EXIT_CONNECTIVITY))?;

        let pending = migrations::pending_versions(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
        pool.close().await;
        Ok::<usize, (&'static str, String, u8)>(pending.len())
    });

    match result {
        Ok(0) => CommandResult::success("migrate", "schema already up to date"),
        Ok(applied) => {
            CommandResult::success("migrate", format!("applied {applied} pending migration(s)"))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
