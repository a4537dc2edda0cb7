use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use config::{builder::DefaultState, Config as ConfigLib, ConfigBuilder, ConfigError, Environment, File};
use crate::utils::error::{Result, GateError};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub agent: AgentConfig,
    pub verification: VerificationConfig,
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL under which invitation payloads are reachable by wallets.
    pub public_url: String,
    pub log_level: String,
    #[serde(default)]
    pub log_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub admin_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub alias_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    pub poll_interval_secs: u64,
    pub session_timeout_secs: u64,
    pub grace_period_secs: u64,
    pub cred_def_id: String,
    pub proof_name: String,
    pub proof_version: String,
    pub attributes: Vec<String>,
    pub minimum_age: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotifierKind {
    CommandChannel,
    Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    pub kind: NotifierKind,
    pub host: String,
    pub port: u16,
    pub connect_timeout_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            session_timeout_secs: 600,
            grace_period_secs: 30,
            cred_def_id: "AbH2V5oKsrPXbzbKKrpU3f:3:CL:2872881:University-Certificate".to_string(),
            proof_name: "Minecraft Server Identity Verification".to_string(),
            proof_version: "1.0".to_string(),
            attributes: vec!["department".to_string()],
            minimum_age: 18,
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        let builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        Self::finish(builder)
    }

    /// Loads defaults overlaid with a single explicit file and the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let builder = Self::defaults()?
            .add_source(File::from(path.as_ref()));

        Self::finish(builder)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let verification = VerificationConfig::default();

        let builder = ConfigLib::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.public_url", "http://localhost:8080")?
            .set_default("server.log_level", "info")?
            .set_default("agent.admin_url", "http://localhost:8021")?
            .set_default("agent.connect_timeout_secs", 10)?
            .set_default("agent.request_timeout_secs", 30)?
            .set_default("agent.alias_prefix", "Minecraft-Player-")?
            .set_default("verification.poll_interval_secs", verification.poll_interval_secs)?
            .set_default("verification.session_timeout_secs", verification.session_timeout_secs)?
            .set_default("verification.grace_period_secs", verification.grace_period_secs)?
            .set_default("verification.cred_def_id", verification.cred_def_id)?
            .set_default("verification.proof_name", verification.proof_name)?
            .set_default("verification.proof_version", verification.proof_version)?
            .set_default("verification.attributes", verification.attributes)?
            .set_default("verification.minimum_age", verification.minimum_age)?
            .set_default("notifier.kind", "log")?
            .set_default("notifier.host", "localhost")?
            .set_default("notifier.port", 25575)?
            .set_default("notifier.connect_timeout_secs", 5)?;

        Ok(builder)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config = builder
            // Override with environment variables (e.g., SSI_GATE_AGENT__ADMIN_URL)
            .add_source(
                Environment::with_prefix("SSI_GATE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(GateError::Config("Invalid port number".into()));
        }

        if self.agent.admin_url.trim().is_empty() {
            return Err(GateError::Config("agent.admin_url must be set".into()));
        }

        if self.verification.poll_interval_secs == 0 {
            return Err(GateError::Config("poll_interval_secs must be greater than 0".into()));
        }
        if self.verification.session_timeout_secs <= self.verification.poll_interval_secs {
            return Err(GateError::Config(
                "session_timeout_secs must be greater than poll_interval_secs".into(),
            ));
        }
        if self.verification.cred_def_id.is_empty() {
            return Err(GateError::Config("cred_def_id must be set".into()));
        }

        if self.notifier.kind == NotifierKind::CommandChannel && self.notifier.host.is_empty() {
            return Err(GateError::Config("command-channel notifier requires a host".into()));
        }

        Ok(())
    }

    pub fn get_notifier_timeout(&self) -> Duration {
        Duration::from_secs(self.notifier.connect_timeout_secs)
    }
}

impl AgentConfig {
    pub fn get_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn get_request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl VerificationConfig {
    pub fn get_poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn get_session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn get_grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

impl From<ConfigError> for GateError {
    fn from(error: ConfigError) -> Self {
        GateError::Config(error.to_string())
    }
}
