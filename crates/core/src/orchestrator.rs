use crate::agents::{chat_agent, rag_agent, Agent, Retriever};
use crate::config::ChatSettings;
use crate::embeddings::Embedder;
use crate::error::{IndexError, SessionError};
use crate::indexing::IndexingPipeline;
use crate::ingest::load_folder_chunks_best_effort;
use crate::models::IndexingReport;
use crate::record_manager::RecordManager;
use crate::traits::{ChatModel, VectorStore};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct HermesRuntime {
    settings: ChatSettings,
    model: Arc<dyn ChatModel>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    records: RecordManager,
}

impl HermesRuntime {
    pub fn new(
        settings: ChatSettings,
        model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        records: RecordManager,
    ) -> Self {
        Self {
            settings,
            model,
            embedder,
            store,
            records,
        }
    }

    pub fn with_settings(mut self, settings: ChatSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn session_namespace(&self, session_id: &str) -> String {
        format!("{}/{}", self.settings.namespace, session_id)
    }

    pub fn chat_agent(&self) -> Agent {
        chat_agent(Arc::clone(&self.model))
    }

    pub fn rag_agent(&self, namespace: &str) -> Agent {
        let retriever = Retriever::new(
            Arc::clone(&self.store),
            Arc::clone(&self.embedder),
            namespace,
            self.settings.top_k,
        );
        rag_agent(Arc::clone(&self.model), retriever)
    }

    /// Loads every PDF under `dir` and reconciles it into `namespace`.
    pub async fn index_documents(
        &self,
        dir: &Path,
        namespace: &str,
    ) -> Result<IndexingReport, SessionError> {
        let options = self.settings.ingestion_options();
        let ingestion = load_folder_chunks_best_effort(dir, &options)?;

        let records = self.records.scoped(namespace);
        let report = IndexingPipeline::new(self.embedder.as_ref(), self.store.as_ref(), &records)
            .with_cleanup(self.settings.cleanup)
            .index(&ingestion.chunks)
            .await?;

        info!(
            namespace,
            chunks = ingestion.chunks.len(),
            unreadable = ingestion.skipped_files.len(),
            added = report.num_added,
            skipped = report.num_skipped,
            deleted = report.num_deleted,
            "documents indexed"
        );
        Ok(report)
    }

    /// Deletes every chunk the manifest tracks under `namespace`, from the
    /// vector store and the manifest alike.
    pub async fn drop_namespace(&self, namespace: &str) -> Result<usize, IndexError> {
        let records = self.records.scoped(namespace);
        let keys = records.list_keys(None, None)?;
        if keys.is_empty() {
            return Ok(0);
        }
        self.store.delete(namespace, &keys).await?;
        records.delete_keys(&keys)?;
        info!(namespace, dropped = keys.len(), "namespace dropped");
        Ok(keys.len())
    }
}

#[cfg(test)]
pub(crate) mod test_runtime {
    use super::*;
    use crate::agents::fakes::ScriptedModel;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::stores::InMemoryVectorStore;
    use std::path::PathBuf;

    pub(crate) fn runtime(
        storage_root: PathBuf,
        tokens: &[&str],
    ) -> (HermesRuntime, Arc<InMemoryVectorStore>) {
        let store = Arc::new(InMemoryVectorStore::new());
        let settings = ChatSettings {
            storage_root,
            ..ChatSettings::default()
        };
        let records = match RecordManager::in_memory(settings.namespace.clone()) {
            Ok(records) => records,
            Err(error) => panic!("in-memory manifest: {error}"),
        };
        let runtime = HermesRuntime::new(
            settings,
            Arc::new(ScriptedModel::new(tokens)),
            Arc::new(CharacterNgramEmbedder::default()),
            store.clone(),
            records,
        );
        (runtime, store)
    }
}

#[cfg(test)]
mod tests {
    use super::test_runtime::runtime;
    use crate::test_support::write_text_pdf;
    use crate::traits::VectorStore;

    #[tokio::test]
    async fn reindexing_an_unchanged_folder_adds_nothing(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let temp = tempfile::tempdir()?;
        write_text_pdf(&temp.path().join("a.pdf"), &["Alpha page one.", "Alpha page two."])?;
        let (runtime, store) = runtime(temp.path().to_path_buf(), &["ok"]);
        let namespace = runtime.session_namespace("s1");

        let first = runtime.index_documents(temp.path(), &namespace).await?;
        let count = store.count(&namespace).await?;
        let second = runtime.index_documents(temp.path(), &namespace).await?;

        assert_eq!(first.num_added, 2);
        assert_eq!(second.num_added, 0);
        assert_eq!(second.num_skipped, 2);
        assert_eq!(store.count(&namespace).await?, count);
        Ok(())
    }

    #[tokio::test]
    async fn dropping_a_namespace_leaves_others_alone() -> Result<(), Box<dyn std::error::Error>> {
        let temp = tempfile::tempdir()?;
        write_text_pdf(&temp.path().join("a.pdf"), &["Alpha page one.", "Alpha page two."])?;
        let (runtime, store) = runtime(temp.path().to_path_buf(), &[]);
        let gone = runtime.session_namespace("s1");
        let kept = runtime.session_namespace("s2");
        runtime.index_documents(temp.path(), &gone).await?;
        runtime.index_documents(temp.path(), &kept).await?;

        assert_eq!(runtime.drop_namespace(&gone).await?, 2);
        assert_eq!(store.count(&gone).await?, 0);
        assert_eq!(store.count(&kept).await?, 2);
        assert_eq!(runtime.drop_namespace(&gone).await?, 0);

        let again = runtime.index_documents(temp.path(), &gone).await?;
        assert_eq!(again.num_added, 2);
        Ok(())
    }

    #[test]
    fn session_namespaces_extend_the_base() {
        let (runtime, _) = runtime(std::path::PathBuf::from("/tmp"), &[]);
        assert_eq!(runtime.session_namespace("abc"), "hermes/documents/abc");
        assert!(!runtime.chat_agent().uses_retrieval());
        assert!(runtime.rag_agent("hermes/documents/abc").uses_retrieval());
    }
}
