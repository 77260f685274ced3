use crate::core::ConflictPolicy;
use crate::utils::error::{IanaError, Result};
use crate::utils::validation::{validate_range, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optional configuration file. Every value can also come from the command
/// line, which takes precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub source: SourceConfig,
    pub transform: TransformConfig,
    pub load: LoadConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub protocols_url: Option<String>,
    pub services_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// `strict`, `alias` or `first-wins`
    pub on_conflict: Option<String>,
    pub max_comment_length: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub archive: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| IanaError::ConfigError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| IanaError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${IANA_MIRROR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}")?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn conflict_policy(&self) -> Result<Option<ConflictPolicy>> {
        match self.transform.on_conflict.as_deref() {
            None => Ok(None),
            Some(raw) => ConflictPolicy::parse(raw).map(Some).ok_or_else(|| {
                IanaError::InvalidConfigValueError {
                    field: "transform.on_conflict".to_string(),
                    value: raw.to_string(),
                    reason: "Valid values: strict, alias, first-wins".to_string(),
                }
            }),
        }
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        if let Some(url) = &self.source.protocols_url {
            validate_url("source.protocols_url", url)?;
        }
        if let Some(url) = &self.source.services_url {
            validate_url("source.services_url", url)?;
        }
        if let Some(timeout) = self.source.timeout_seconds {
            validate_range("source.timeout_seconds", timeout, 1, 3600)?;
        }
        if let Some(length) = self.transform.max_comment_length {
            validate_range("transform.max_comment_length", length, 1, 512)?;
        }
        self.conflict_policy()?;

        Ok(())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_toml_config() {
        let toml_content = r#"
[source]
protocols_url = "https://mirror.example.com/protocol-numbers.xml"
services_url = "https://mirror.example.com/service-names-port-numbers.xml"
timeout_seconds = 30
retry_attempts = 4

[transform]
on_conflict = "alias"
max_comment_length = 80

[load]
archive = false
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(
            config.source.protocols_url.as_deref(),
            Some("https://mirror.example.com/protocol-numbers.xml")
        );
        assert_eq!(config.source.timeout_seconds, Some(30));
        assert_eq!(config.source.retry_attempts, Some(4));
        assert_eq!(config.conflict_policy().unwrap(), Some(ConflictPolicy::Alias));
        assert_eq!(config.load.archive, Some(false));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert!(config.source.protocols_url.is_none());
        assert_eq!(config.conflict_policy().unwrap(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("IANA_ETC_TEST_MIRROR", "https://test.mirror.com");

        let toml_content = r#"
[source]
services_url = "${IANA_ETC_TEST_MIRROR}/services.xml"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(
            config.source.services_url.as_deref(),
            Some("https://test.mirror.com/services.xml")
        );

        std::env::remove_var("IANA_ETC_TEST_MIRROR");
    }

    #[test]
    fn test_config_validation() {
        let bad_url =
            TomlConfig::from_toml_str("[source]\nprotocols_url = \"invalid-url\"\n").unwrap();
        assert!(bad_url.validate().is_err());

        let bad_policy =
            TomlConfig::from_toml_str("[transform]\non_conflict = \"merge\"\n").unwrap();
        assert!(matches!(
            bad_policy.validate(),
            Err(IanaError::InvalidConfigValueError { .. })
        ));

        assert!(TomlConfig::from_toml_str("[source\n").is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[transform]\non_conflict = \"first-wins\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(
            config.conflict_policy().unwrap(),
            Some(ConflictPolicy::FirstWins)
        );

        assert!(TomlConfig::from_file("/nonexistent/iana-etc.toml").is_err());
    }
}
