pub mod toml_config;

use crate::core::transform::DEFAULT_MAX_COMMENT_LENGTH;
use crate::core::{ConfigProvider, ConflictPolicy};
use crate::utils::error::Result;
use crate::utils::validation::{validate_path, validate_range, validate_url, Validate};
use std::time::Duration;
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use clap::Parser;

pub const DEFAULT_PROTOCOLS_URL: &str =
    "https://www.iana.org/assignments/protocol-numbers/protocol-numbers.xml";
pub const DEFAULT_SERVICES_URL: &str =
    "https://www.iana.org/assignments/service-names-port-numbers/service-names-port-numbers.xml";

/// Fully resolved run configuration: built-in defaults, then the TOML file,
/// then command line overrides.
#[derive(Debug, Clone)]
pub struct Settings {
    pub protocols_url: String,
    pub services_url: String,
    pub output_path: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
    pub conflict_policy: ConflictPolicy,
    pub max_comment_length: usize,
    pub archive: bool,
}

impl Settings {
    pub fn new(output_path: impl Into<String>) -> Self {
        Self {
            protocols_url: DEFAULT_PROTOCOLS_URL.to_string(),
            services_url: DEFAULT_SERVICES_URL.to_string(),
            output_path: output_path.into(),
            timeout_seconds: 60,
            retry_attempts: 2,
            retry_delay_seconds: 2,
            conflict_policy: ConflictPolicy::Strict,
            max_comment_length: DEFAULT_MAX_COMMENT_LENGTH,
            archive: true,
        }
    }

    pub fn apply_toml(mut self, config: &TomlConfig) -> Result<Self> {
        if let Some(url) = &config.source.protocols_url {
            self.protocols_url = url.clone();
        }
        if let Some(url) = &config.source.services_url {
            self.services_url = url.clone();
        }
        if let Some(timeout) = config.source.timeout_seconds {
            self.timeout_seconds = timeout;
        }
        if let Some(attempts) = config.source.retry_attempts {
            self.retry_attempts = attempts;
        }
        if let Some(delay) = config.source.retry_delay_seconds {
            self.retry_delay_seconds = delay;
        }
        if let Some(policy) = config.conflict_policy()? {
            self.conflict_policy = policy;
        }
        if let Some(length) = config.transform.max_comment_length {
            self.max_comment_length = length;
        }
        if let Some(archive) = config.load.archive {
            self.archive = archive;
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }
}

impl ConfigProvider for Settings {
    fn protocols_url(&self) -> &str {
        &self.protocols_url
    }

    fn services_url(&self) -> &str {
        &self.services_url
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn conflict_policy(&self) -> ConflictPolicy {
        self.conflict_policy
    }

    fn max_comment_length(&self) -> usize {
        self.max_comment_length
    }

    fn archive_enabled(&self) -> bool {
        self.archive
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_url("protocols_url", &self.protocols_url)?;
        validate_url("services_url", &self.services_url)?;
        validate_path("output_path", &self.output_path)?;
        validate_range("timeout_seconds", self.timeout_seconds, 1, 3600)?;
        validate_range("retry_attempts", self.retry_attempts, 0, 10)?;
        validate_range("max_comment_length", self.max_comment_length, 1, 512)?;
        Ok(())
    }
}

#[cfg(feature = "cli")]
fn parse_conflict_policy(raw: &str) -> std::result::Result<ConflictPolicy, String> {
    ConflictPolicy::parse(raw)
        .ok_or_else(|| format!("'{}' is not one of strict, alias, first-wins", raw))
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "iana-etc")]
#[command(about = "Generate /etc/protocols and /etc/services from the IANA registries")]
pub struct CliConfig {
    /// Directory the generated files are written to
    pub output_path: String,

    /// Optional TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long, help = "Override the protocol numbers registry URL")]
    pub protocols_url: Option<String>,

    #[arg(long, help = "Override the service names registry URL")]
    pub services_url: Option<String>,

    /// How to handle differently named records on the same number or port
    #[arg(long, value_parser = parse_conflict_policy)]
    pub on_conflict: Option<ConflictPolicy>,

    /// HTTP timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Retries per download after the first failure
    #[arg(long)]
    pub retries: Option<u32>,

    #[arg(long, help = "Skip the release archive and checksum")]
    pub no_archive: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn resolve(&self) -> Result<Settings> {
        let mut settings = Settings::new(self.output_path.clone());

        if let Some(path) = &self.config {
            tracing::info!("📁 Loading configuration from: {}", path);
            let config = TomlConfig::from_file(path)?;
            config.validate()?;
            settings = settings.apply_toml(&config)?;
        }

        // 命令列參數覆蓋設定檔
        if let Some(url) = &self.protocols_url {
            settings.protocols_url = url.clone();
        }
        if let Some(url) = &self.services_url {
            settings.services_url = url.clone();
        }
        if let Some(policy) = self.on_conflict {
            settings.conflict_policy = policy;
        }
        if let Some(timeout) = self.timeout {
            settings.timeout_seconds = timeout;
        }
        if let Some(retries) = self.retries {
            settings.retry_attempts = retries;
        }
        if self.no_archive {
            settings.archive = false;
        }

        Ok(settings)
    }
}
