use crate::core::emit::{
    archive_file_name, dist_path, Emitter, RenderedFiles, PROTOCOLS_FILE, SERVICES_FILE,
    VERSION_FILE,
};
use crate::core::transform::{TransformOptions, Transformer};
use crate::core::{
    ConfigProvider, Fetcher, LoadOutcome, Pipeline, RegistrySnapshot, SourceDocument, SourceKind,
    Storage,
};
use crate::utils::error::Result;

/// Fetches both IANA registries and writes `/etc`-style files from them.
pub struct IanaPipeline<F: Fetcher, S: Storage, C: ConfigProvider> {
    pub(crate) fetcher: F,
    pub(crate) storage: S,
    pub(crate) config: C,
}

impl<F: Fetcher, S: Storage, C: ConfigProvider> IanaPipeline<F, S, C> {
    pub fn new(fetcher: F, storage: S, config: C) -> Self {
        Self {
            fetcher,
            storage,
            config,
        }
    }

    fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            conflict_policy: self.config.conflict_policy(),
            max_comment_length: self.config.max_comment_length(),
        }
    }

    async fn matches_existing(&self, name: &str, expected: &[u8]) -> Result<bool> {
        Ok(self
            .storage
            .read_file(name)
            .await?
            .is_some_and(|existing| existing == expected))
    }

    /// 版本與輸出內容都相同時視為無變更
    async fn is_unchanged(
        &self,
        snapshot: &RegistrySnapshot,
        rendered: &RenderedFiles,
    ) -> Result<bool> {
        let Some(existing_version) = self.storage.read_file(VERSION_FILE).await? else {
            return Ok(false);
        };
        if String::from_utf8_lossy(&existing_version).trim() != rendered.version.trim() {
            return Ok(false);
        }

        if !self
            .matches_existing(&dist_path(PROTOCOLS_FILE), rendered.protocols.as_bytes())
            .await?
            || !self
                .matches_existing(&dist_path(SERVICES_FILE), rendered.services.as_bytes())
                .await?
        {
            return Ok(false);
        }

        if self.config.archive_enabled()
            && self
                .storage
                .read_file(&dist_path(&archive_file_name(&snapshot.version)))
                .await?
                .is_none()
        {
            return Ok(false);
        }

        Ok(true)
    }
}

#[async_trait::async_trait]
impl<F: Fetcher, S: Storage, C: ConfigProvider> Pipeline for IanaPipeline<F, S, C> {
    async fn extract(&self) -> Result<Vec<SourceDocument>> {
        let mut documents = Vec::with_capacity(2);

        // 依序下載，不平行
        for (kind, url) in [
            (SourceKind::Protocols, self.config.protocols_url()),
            (SourceKind::Services, self.config.services_url()),
        ] {
            tracing::info!("📥 Downloading {} registry from {}", kind.name(), url);
            let body = self.fetcher.fetch(url).await?;
            documents.push(SourceDocument {
                kind,
                url: url.to_string(),
                body,
            });
        }

        Ok(documents)
    }

    async fn transform(&self, documents: Vec<SourceDocument>) -> Result<RegistrySnapshot> {
        let options = self.transform_options();
        tracing::debug!(
            "Transforming with conflict policy '{}', max comment length {}",
            options.conflict_policy.as_str(),
            options.max_comment_length
        );

        Transformer::new(options)?.snapshot(documents)
    }

    async fn load(&self, snapshot: &RegistrySnapshot) -> Result<LoadOutcome> {
        let rendered = RenderedFiles::new(snapshot);

        if self.is_unchanged(snapshot, &rendered).await? {
            return Ok(LoadOutcome::Unchanged);
        }

        let emitter = Emitter::new(self.config.archive_enabled());
        let files = emitter.plan(snapshot, &rendered)?;
        tracing::debug!(
            "Writing {} files to {}",
            files.len(),
            self.config.output_path()
        );
        self.storage.write_files(&files).await?;

        Ok(LoadOutcome::Written)
    }

    fn output_path(&self) -> &str {
        self.config.output_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConflictPolicy, OutputFile};
    use crate::utils::error::IanaError;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        writes: Arc<Mutex<usize>>,
    }

    impl MockStorage {
        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }

        async fn write_count(&self) -> usize {
            *self.writes.lock().await
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
            let files = self.files.lock().await;
            Ok(files.get(path).cloned())
        }

        async fn write_files(&self, files: &[OutputFile]) -> Result<()> {
            let mut stored = self.files.lock().await;
            for file in files {
                stored.insert(file.name.clone(), file.contents.clone());
            }
            *self.writes.lock().await += 1;
            Ok(())
        }
    }

    struct MockFetcher {
        documents: HashMap<String, String>,
    }

    impl Fetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.documents
                .get(url)
                .cloned()
                .ok_or_else(|| IanaError::FetchError {
                    url: url.to_string(),
                    message: "HTTP status 404 Not Found".to_string(),
                })
        }
    }

    struct MockConfig {
        archive: bool,
    }

    impl ConfigProvider for MockConfig {
        fn protocols_url(&self) -> &str {
            "mock://protocols"
        }

        fn services_url(&self) -> &str {
            "mock://services"
        }

        fn output_path(&self) -> &str {
            "test_output"
        }

        fn conflict_policy(&self) -> ConflictPolicy {
            ConflictPolicy::Strict
        }

        fn max_comment_length(&self) -> usize {
            70
        }

        fn archive_enabled(&self) -> bool {
            self.archive
        }
    }

    const PROTOCOLS_XML: &str = "<registry><updated>2024-02-15</updated>\
        <record><value>6</value><name>TCP</name><description>Transmission Control</description></record>\
        </registry>";
    const SERVICES_XML: &str = "<registry><updated>2024-03-01</updated>\
        <record><name>ssh</name><protocol>tcp</protocol><number>22</number></record>\
        </registry>";

    fn pipeline(
        storage: MockStorage,
        archive: bool,
    ) -> IanaPipeline<MockFetcher, MockStorage, MockConfig> {
        let documents = HashMap::from([
            ("mock://protocols".to_string(), PROTOCOLS_XML.to_string()),
            ("mock://services".to_string(), SERVICES_XML.to_string()),
        ]);
        IanaPipeline::new(MockFetcher { documents }, storage, MockConfig { archive })
    }

    #[tokio::test]
    async fn test_extract_fetches_both_registries_in_order() {
        let pipeline = pipeline(MockStorage::default(), false);

        let documents = pipeline.extract().await.unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].kind, SourceKind::Protocols);
        assert_eq!(documents[1].kind, SourceKind::Services);
        assert_eq!(documents[1].body, SERVICES_XML);
    }

    #[tokio::test]
    async fn test_extract_propagates_fetch_error() {
        let mut pipeline = pipeline(MockStorage::default(), false);
        pipeline.fetcher.documents.remove("mock://services");

        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, IanaError::FetchError { .. }));
    }

    #[tokio::test]
    async fn test_load_writes_files_then_reports_unchanged() {
        let storage = MockStorage::default();
        let pipeline = pipeline(storage.clone(), false);

        let documents = pipeline.extract().await.unwrap();
        let snapshot = pipeline.transform(documents).await.unwrap();

        assert_eq!(pipeline.load(&snapshot).await.unwrap(), LoadOutcome::Written);
        assert_eq!(
            storage.get_file(".version").await,
            Some(b"20240301\n".to_vec())
        );
        let protocols = storage.get_file("dist/protocols").await.unwrap();
        let protocols = String::from_utf8(protocols).unwrap();
        assert!(protocols.contains("tcp              6 TCP"));

        assert_eq!(pipeline.load(&snapshot).await.unwrap(), LoadOutcome::Unchanged);
        assert_eq!(storage.write_count().await, 1);
    }

    #[tokio::test]
    async fn test_load_rewrites_when_archive_missing() {
        let storage = MockStorage::default();
        let without_archive = pipeline(storage.clone(), false);
        let documents = without_archive.extract().await.unwrap();
        let snapshot = without_archive.transform(documents).await.unwrap();
        without_archive.load(&snapshot).await.unwrap();

        let with_archive = pipeline(storage.clone(), true);
        assert_eq!(with_archive.load(&snapshot).await.unwrap(), LoadOutcome::Written);
        assert!(storage
            .get_file("dist/iana-etc-20240301.tar.gz")
            .await
            .is_some());
        assert!(storage
            .get_file("dist/iana-etc-20240301.tar.gz.sha256")
            .await
            .is_some());
        assert_eq!(storage.write_count().await, 2);
    }
}
