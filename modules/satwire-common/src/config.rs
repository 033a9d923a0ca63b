use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Translation provider
    pub openai_api_key: Option<String>,

    /// When true, items whose translation failed are dropped at persist
    /// time instead of being stored untranslated.
    pub translation_required: bool,

    /// Lookback window for source fetches, in hours.
    pub fetch_window_hours: i64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            translation_required: env::var("TRANSLATION_REQUIRED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            fetch_window_hours: env::var("FETCH_WINDOW_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("FETCH_WINDOW_HOURS must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
