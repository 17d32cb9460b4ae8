use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use dialogrs_core::DispatchConfig;
use tracing::warn;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dialogs: DialogsConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub comments: CommentsConfig,
    #[serde(default)]
    pub game: GameConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            cors: true,
        }
    }
}

impl ServerConfig {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    const fn default_port() -> u16 {
        9000
    }

    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DialogsConfig {
    #[serde(default = "DialogsConfig::default_handler_timeout_secs")]
    pub handler_timeout_secs: u64,
    #[serde(default = "DialogsConfig::default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,
    #[serde(default = "DialogsConfig::default_max_replace_chain")]
    pub max_replace_chain: usize,
    /// Dialog name -> `POST /dialogs` endpoint of the engine serving it.
    #[serde(default)]
    pub remote: BTreeMap<String, String>,
}

impl Default for DialogsConfig {
    fn default() -> Self {
        Self {
            handler_timeout_secs: Self::default_handler_timeout_secs(),
            turn_timeout_secs: Self::default_turn_timeout_secs(),
            max_replace_chain: Self::default_max_replace_chain(),
            remote: BTreeMap::new(),
        }
    }
}

impl DialogsConfig {
    const fn default_handler_timeout_secs() -> u64 {
        10
    }

    const fn default_turn_timeout_secs() -> u64 {
        30
    }

    const fn default_max_replace_chain() -> usize {
        8
    }

    #[must_use]
    pub const fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            handler_timeout: Duration::from_secs(self.handler_timeout_secs),
            turn_timeout: Duration::from_secs(self.turn_timeout_secs),
            max_replace_chain: self.max_replace_chain,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "RemoteConfig::default_endpoint")]
    pub endpoint: String,
    #[serde(default = "RemoteConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    fn default_endpoint() -> String {
        "http://127.0.0.1:9000/dialogs".to_string()
    }

    const fn default_timeout_secs() -> u64 {
        30
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CommentsConfig {
    #[serde(default = "CommentsConfig::default_base_url")]
    pub base_url: String,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
        }
    }
}

impl CommentsConfig {
    fn default_base_url() -> String {
        "https://jsonplaceholder.typicode.com".to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GameConfig {
    #[serde(default = "GameConfig::default_upper_limit")]
    pub upper_limit: u32,
    #[serde(default = "GameConfig::default_max_guesses")]
    pub max_guesses: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            upper_limit: Self::default_upper_limit(),
            max_guesses: Self::default_max_guesses(),
        }
    }
}

impl GameConfig {
    const fn default_upper_limit() -> u32 {
        10
    }

    const fn default_max_guesses() -> u32 {
        3
    }
}

const fn default_true() -> bool {
    true
}

impl Config {
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("dialogrs")
            .join("config.json"))
    }

    /// Load `~/dialogrs/config.json`, falling back to defaults when absent.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            warn!(
                "Config file not found at: {}. Using defaults; run 'dialogrs init' to create one.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        if config.game.upper_limit == 0 {
            anyhow::bail!("game.upper_limit must be at least 1");
        }
        if config.game.max_guesses == 0 {
            anyhow::bail!("game.max_guesses must be at least 1");
        }
        Ok(config)
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("dialogrs");

        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");

        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        let config_template = serde_json::to_string_pretty(&Self::default())?;
        std::fs::write(&config_path, config_template)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Run 'dialogrs serve' to expose the dialogs over HTTP");
        println!("   2. Run 'dialogrs chat' to play locally, or 'dialogrs chat --remote' against a server");
        println!();
        println!("🔧 Configuration options:");
        println!("   - server.port: port of the POST /dialogs endpoint");
        println!("   - dialogs.handler_timeout_secs: bound on a single handler run");
        println!("   - dialogs.remote: dialog names served by another engine, by endpoint");
        println!("   - remote.endpoint: server used by 'chat --remote'");
        println!();
        Ok(())
    }
}
