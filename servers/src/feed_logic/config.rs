use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "scada_feed.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Binds live data feeds to targets and logs every update", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "SCADA_CONFIG_PATH", help = "Path to the JSON configuration file of this server.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "SCADA_OPTIONS_PATH", help = "Path to the JSON/JSON5 file declaring sources and tags.")]
    pub options_path: Option<PathBuf>,

    #[clap(long, env = "SCADA_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "SCADA_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "SCADA_DEBUG", help = "Turn on the debug flag of the instance (true/false).")]
    pub debug: Option<bool>,

    #[clap(long, env = "SCADA_STDIN_FEED", help = "Read '<source-id> <json>' lines from stdin into manual sources (true/false).")]
    pub stdin_feed: Option<bool>,
}

impl Config {
    // 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            options_path: other.options_path.or(self.options_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            debug: other.debug.or(self.debug),
            stdin_feed: other.stdin_feed.or(self.stdin_feed),
        }
    }

    pub fn defaults() -> Config {
        Config {
            options_path: Some(PathBuf::from("scada.json5")),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            debug: Some(false),
            stdin_feed: Some(true),
            ..Default::default()
        }
    }
}

/// Defaults, then the config file, then environment and CLI.
pub fn load_config() -> Config {
    resolve_config(Config::parse())
}

pub fn resolve_config(cli: Config) -> Config {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();
    if let Some(file_config) = read_config_file(&config_file_path) {
        current_config = current_config.merge(file_config);
    }
    current_config.merge(cli)
}

fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        log::info!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display());
        return None;
    }
    let config_str = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str::<Config>(&config_str) {
        Ok(config) => Some(config),
        Err(e) => {
            log::warn!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.conf");
        fs::write(&path, r#"{"logLevel": "warn", "optionsPath": "/etc/plant.json5"}"#).unwrap();

        let cli = Config {
            config_path: Some(path.clone()),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        let config = resolve_config(cli);

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.options_path, Some(PathBuf::from("/etc/plant.json5")));
        assert_eq!(config.log_dir, Some(PathBuf::from("./logs")));
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.conf");
        fs::write(&path, "not json").unwrap();

        let config = resolve_config(Config {
            config_path: Some(path.clone()),
            ..Default::default()
        });
        assert_eq!(
            config,
            Config {
                config_path: Some(path),
                ..Config::defaults()
            }
        );
    }
}
