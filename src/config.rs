use crate::{EditorError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub control: ControlConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    pub chrome_path: Option<PathBuf>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user_data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ControlConfig {
    /// Unix socket the edit panels connect to. Defaults to
    /// `control.sock` in the config directory.
    pub socket_path: Option<PathBuf>,
}

impl ControlConfig {
    pub fn resolved_socket_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.socket_path {
            return Ok(path.clone());
        }
        default_config_dir().map(|dir| dir.join("control.sock"))
    }
}

fn default_headless() -> bool {
    true
}

fn default_port() -> u16 {
    9222
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: default_headless(),
            port: default_port(),
            user_data_dir: None,
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    default_config_dir().map(|p| p.join("config.toml"))
}

pub fn default_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("request-editor-cli"))
        .ok_or_else(|| EditorError::ConfigError("Could not determine config directory".into()))
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        let global_path = default_config_path()?;
        if global_path.exists() {
            let content = std::fs::read_to_string(&global_path)?;
            config = toml::from_str(&content)?;
        }

        config.load_from_env();

        Ok(config)
    }

    pub fn load_with_overrides(&self, overrides: ConfigOverrides) -> Self {
        let mut config = self.clone();

        if let Some(headless) = overrides.headless {
            config.browser.headless = headless;
        }
        if let Some(port) = overrides.port {
            config.browser.port = port;
        }
        if let Some(chrome_path) = overrides.chrome_path {
            config.browser.chrome_path = Some(chrome_path);
        }
        if let Some(socket) = overrides.socket {
            config.control.socket_path = Some(socket);
        }

        config
    }

    fn load_from_env(&mut self) {
        if let Ok(port) = std::env::var("CHROME_DEBUG_PORT")
            && let Ok(port) = port.parse()
        {
            self.browser.port = port;
        }
        if let Ok(headless) = std::env::var("CHROME_HEADLESS") {
            self.browser.headless = headless == "true" || headless == "1";
        }
        if let Ok(path) = std::env::var("CHROME_PATH") {
            self.browser.chrome_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("REQUEST_EDITOR_SOCKET") {
            self.control.socket_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.browser.port < 1024 {
            return Err(EditorError::InvalidPort(self.browser.port));
        }

        if let Some(ref path) = self.browser.chrome_path
            && !path.exists()
        {
            return Err(EditorError::ConfigError(format!(
                "Chrome path does not exist: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn show(&self) -> String {
        format!(
            r#"Browser:
  Chrome Path: {}
  Headless: {}
  Port: {}

Control:
  Socket: {}
"#,
            self.browser
                .chrome_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "auto-detect".into()),
            self.browser.headless,
            self.browser.port,
            self.control
                .resolved_socket_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "unresolved".into()),
        )
    }
}

#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub headless: Option<bool>,
    pub port: Option<u16>,
    pub chrome_path: Option<PathBuf>,
    pub socket: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.browser.headless);
        assert_eq!(config.browser.port, 9222);
        assert!(config.control.socket_path.is_none());
    }

    #[test]
    fn test_config_validate_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate_invalid_port() {
        let mut config = Config::default();
        config.browser.port = 80;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_missing_chrome_path() {
        let mut config = Config::default();
        config.browser.chrome_path = Some(PathBuf::from("/definitely/not/chrome"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_with_overrides() {
        let config = Config::default();
        let overrides = ConfigOverrides {
            headless: Some(false),
            port: Some(9333),
            chrome_path: None,
            socket: Some(PathBuf::from("/tmp/editor.sock")),
        };

        let result = config.load_with_overrides(overrides);
        assert!(!result.browser.headless);
        assert_eq!(result.browser.port, 9333);
        assert_eq!(
            result.control.socket_path,
            Some(PathBuf::from("/tmp/editor.sock"))
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[browser]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.browser.port, config.browser.port);
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.browser.port = 9250;
        std::fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Config = toml::from_str(&content).unwrap();
        assert_eq!(parsed.browser.port, 9250);
    }

    #[test]
    fn test_explicit_socket_path_wins() {
        let mut config = Config::default();
        config.control.socket_path = Some(PathBuf::from("/tmp/x.sock"));
        assert_eq!(
            config.control.resolved_socket_path().unwrap(),
            PathBuf::from("/tmp/x.sock")
        );
    }
}
