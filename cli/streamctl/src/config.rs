//! Environment configuration.
//!
//! - `STREAMCTL_LOG_LEVEL`: tracing filter when `RUST_LOG` is unset (default `warn`)
//! - `STREAMCTL_LOG_JSON`: emit JSON logs
//! - `STREAMCTL_RUN_MIGRATIONS`: apply pending migrations before each command
//! - `DATABASE_URL`, `DB_MAX_CONNECTIONS`, `DB_MIN_CONNECTIONS`: see [`DbConfig`]

use l4gate_streams::db::DbConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_json: bool,
    pub run_migrations: bool,
    pub database: DbConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_json: false,
            run_migrations: false,
            database: DbConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let log_level = std::env::var("STREAMCTL_LOG_LEVEL").unwrap_or(defaults.log_level);
        let log_json = env_flag("STREAMCTL_LOG_JSON");
        let run_migrations = env_flag("STREAMCTL_RUN_MIGRATIONS");

        Self {
            log_level,
            log_json,
            run_migrations,
            database: DbConfig::from_env(),
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| is_truthy(&v)).unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
