use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Overrides the level from the core config when set
    pub log_level: Option<String>,
    /// TOML file with pipeline, operation and log settings
    pub core_config: Option<PathBuf>,
    pub seed_sample_data: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("LOG_LEVEL").ok(),
            core_config: std::env::var("CORE_CONFIG").ok().map(PathBuf::from),
            seed_sample_data: std::env::var("SEED_SAMPLE_DATA")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(true),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
