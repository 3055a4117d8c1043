use serde::{Deserialize, Serialize};

use crate::{
    common::types::AnyResult,
    configs::{EngineConfig, LoggingConfig, TransportConfig},
};

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Config {
    pub fn load() -> AnyResult<Self> {
        let config_path = if std::path::Path::new("config.toml").exists() {
            "config.toml"
        } else if std::path::Path::new("config.default.toml").exists() {
            "config.default.toml"
        } else {
            return Err("config.toml or config.default.toml not found".into());
        };

        crate::log_println!("Loading configuration from: {}", config_path);

        let config_str = std::fs::read_to_string(config_path)?;
        Self::parse(&config_str)
    }

    pub fn parse(config_str: &str) -> AnyResult<Self> {
        let config: Config = toml::from_str(config_str)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.logging.is_none());
        assert_eq!(config.engine.volume, 1.0);
        assert_eq!(config.engine.pitch, 1.0);
        assert_eq!(config.engine.connect_timeout_ms, 10_000);
        assert!(config.engine.pace_output);
        assert_eq!(config.transport.dump_path, "voxboard.pcm");
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = Config::parse(
            r#"
            [engine]
            volume = 0.5
            pace_output = false

            [logging]
            level = "debug"

            [logging.file]
            path = "logs/voxboard.log"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.volume, 0.5);
        assert!(!config.engine.pace_output);
        assert_eq!(config.engine.health_check_interval_ms, 1_000);
        let logging = config.logging.unwrap();
        assert_eq!(logging.level.as_deref(), Some("debug"));
        assert_eq!(logging.file.unwrap().max_lines, 10_000);
    }
}
