use crate::domain::model::{LoadOutcome, OutputFile, RegistrySnapshot, SourceDocument};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Retrieves one upstream document.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl std::future::Future<Output = Result<String>> + Send;
}

pub trait Storage: Send + Sync {
    /// Returns `None` when the file does not exist.
    fn read_file(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Writes every file or, on failure, leaves each target either untouched
    /// or fully replaced. Never leaves a truncated file.
    fn write_files(
        &self,
        files: &[OutputFile],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Differently named records on the same key abort the run.
    #[default]
    Strict,
    /// Later names become aliases of the first record.
    Alias,
    /// Later records are dropped.
    FirstWins,
}

impl ConflictPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(ConflictPolicy::Strict),
            "alias" => Some(ConflictPolicy::Alias),
            "first-wins" | "first_wins" => Some(ConflictPolicy::FirstWins),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::Strict => "strict",
            ConflictPolicy::Alias => "alias",
            ConflictPolicy::FirstWins => "first-wins",
        }
    }
}

pub trait ConfigProvider: Send + Sync {
    fn protocols_url(&self) -> &str;
    fn services_url(&self) -> &str;
    fn output_path(&self) -> &str;
    fn conflict_policy(&self) -> ConflictPolicy;
    fn max_comment_length(&self) -> usize;
    fn archive_enabled(&self) -> bool;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<SourceDocument>>;
    async fn transform(&self, documents: Vec<SourceDocument>) -> Result<RegistrySnapshot>;
    async fn load(&self, snapshot: &RegistrySnapshot) -> Result<LoadOutcome>;
    fn output_path(&self) -> &str;
}
