//! Process configuration: CLI flags, `config.toml` in the home directory,
//! and built-in defaults, in that order of precedence.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

/// Default application key (base64 `1KHLiKZvAvjbY1ziZEHMXawbCEIM6qwjCDm3VYRan/s=`).
const DEFAULT_APP_KEY_B64: &str = "1KHLiKZvAvjbY1ziZEHMXawbCEIM6qwjCDm3VYRan/s=";
const DEFAULT_PORT: u16 = 8008;

/// The resolved configuration for one CLI invocation.
#[derive(Clone, Debug)]
pub struct Config {
    pub home: PathBuf,
    pub user: Option<String>,
    pub app_key: [u8; 32],
    pub port: u16,
}

/// The `config.toml` shape, every field optional so a partial file only
/// overrides what it names.
#[derive(Default, Deserialize)]
struct ConfigFile {
    home: Option<PathBuf>,
    user: Option<String>,
    app_key: Option<String>,
    port: Option<u16>,
}

/// Flags from the command line; `None` means "not given, fall through".
#[derive(Default)]
pub struct ConfigOverrides {
    pub home: Option<PathBuf>,
    pub user: Option<String>,
    pub app_key: Option<String>,
    pub port: Option<u16>,
}

impl Config {
    /// Resolves configuration: `overrides` > `<home>/config.toml` > defaults.
    ///
    /// The home directory itself is resolved first (from the override, else
    /// `$HOME/.ssb-drive`), since it's where `config.toml` is read from.
    pub fn resolve(overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let home = overrides
            .home
            .clone()
            .unwrap_or_else(default_home);

        let file = read_config_file(&home)?;

        let app_key_b64 = overrides
            .app_key
            .or(file.app_key)
            .unwrap_or_else(|| DEFAULT_APP_KEY_B64.to_string());
        let app_key_bytes = STANDARD
            .decode(&app_key_b64)
            .map_err(|e| anyhow::anyhow!("app_key is not valid base64: {e}"))?;
        let app_key: [u8; 32] = app_key_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("app_key must decode to exactly 32 bytes"))?;

        Ok(Self {
            home,
            user: overrides.user.or(file.user),
            app_key,
            port: overrides.port.or(file.port).unwrap_or(DEFAULT_PORT),
        })
    }

    /// `<home>/user.<name>` if a user was selected, else `<home>` itself.
    pub fn user_dir(&self) -> PathBuf {
        match &self.user {
            Some(name) => self.home.join(format!("user.{name}")),
            None => self.home.clone(),
        }
    }

    pub fn secret_path(&self) -> PathBuf {
        self.user_dir().join("secret")
    }

    pub fn flume_dir(&self) -> PathBuf {
        self.user_dir().join("flume")
    }

    pub fn friends_path(&self) -> PathBuf {
        self.flume_dir().join("friends.json")
    }
}

fn default_home() -> PathBuf {
    std::env::var("HOME")
        .map(|h| Path::new(&h).join(".ssb-drive"))
        .unwrap_or_else(|_| PathBuf::from(".ssb-drive"))
}

fn read_config_file(home: &Path) -> anyhow::Result<ConfigFile> {
    let path = home.join("config.toml");
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let raw = std::fs::read_to_string(&path)?;
    Ok(toml::from_str(&raw)?)
}
