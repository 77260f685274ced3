use crate::core::{LoadOutcome, Pipeline, RunSummary};
use crate::utils::error::Result;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        tracing::info!("🚀 Starting IANA registry conversion");

        // Extract
        let documents = self.pipeline.extract().await?;
        tracing::info!("📥 Extracted {} registry documents", documents.len());

        // Transform
        let snapshot = self.pipeline.transform(documents).await?;
        tracing::info!(
            "🔄 Transformed {} protocols and {} services (version {})",
            snapshot.protocols.len(),
            snapshot.services.len(),
            snapshot.version
        );

        // Load
        let outcome = self.pipeline.load(&snapshot).await?;
        match outcome {
            LoadOutcome::Written => {
                tracing::info!("💾 Output written to: {}", self.pipeline.output_path())
            }
            LoadOutcome::Unchanged => {
                tracing::info!("✨ Output for version {} is already up to date", snapshot.version)
            }
        }

        Ok(RunSummary {
            version: snapshot.version,
            protocols: snapshot.protocols.len(),
            services: snapshot.services.len(),
            outcome,
            output_path: self.pipeline.output_path().to_string(),
        })
    }
}
