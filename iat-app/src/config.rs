use iat_experiment::ExperimentConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where sessions, exports and the log file live.
    pub data_dir: Option<PathBuf>,
    pub keys: KeyBindings,
    pub experiment: ExperimentConfig,
}

/// Physical keys for the two response sides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub left: char,
    pub right: char,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            left: 'e',
            right: 'i',
        }
    }
}

impl AppConfig {
    /// Loads `path`, or `~/.iat/config.toml` when none is given. A missing
    /// file yields defaults; an unreadable or invalid one is logged and
    /// ignored.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(default_config_path) else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Self::default();
            }
        };

        match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Self::default()
            }
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("iat")))
            .unwrap_or_else(|| PathBuf::from("iat-data"))
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir().join("sessions")
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".iat").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "data_dir = \"/tmp/iat\"\n[keys]\nleft = \"f\"\n[experiment]\nfixation_range_ms = [300, 400]\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path));
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/iat")));
        assert_eq!(config.keys, KeyBindings { left: 'f', right: 'i' });
        assert_eq!(config.experiment.fixation_range_ms, (300, 400));
        assert_eq!(config.experiment.completion_return_ms, 60_000);
        assert_eq!(config.sessions_dir(), PathBuf::from("/tmp/iat/sessions"));
    }

    #[test]
    fn missing_or_broken_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = AppConfig::load(Some(&dir.path().join("nope.toml")));
        assert_eq!(missing.keys, KeyBindings::default());

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "keys = 3").unwrap();
        let config = AppConfig::load(Some(&broken));
        assert_eq!(config.experiment, ExperimentConfig::default());
    }
}
