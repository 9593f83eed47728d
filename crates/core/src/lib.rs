pub mod agents;
pub mod chunking;
pub mod citations;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod frontend;
pub mod indexing;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod record_manager;
pub mod secrets;
pub mod session;
pub mod stores;
pub mod streaming;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use agents::{chat_agent, format_docs, rag_agent, Agent, AgentCallbacks, NoCallbacks, Retriever};
pub use chunking::{normalize_whitespace, split_pages, split_text, ChunkingConfig};
pub use citations::SourceCollector;
pub use config::{validate_base_url, ChatSettings, UploadPolicy};
pub use embeddings::{CharacterNgramEmbedder, Embedder};
pub use error::{
    AgentError, ConfigError, FrontendError, IndexError, IngestError, ProviderError, SessionError,
    StoreError,
};
pub use extractor::{extract_page_texts, PageText, PdfExtractor};
pub use frontend::{
    AskFileRequest, ChatFrontend, ChatProfile, MessageId, OutgoingMessage, PdfElement,
    UploadedFile,
};
pub use indexing::IndexingPipeline;
pub use ingest::{discover_pdf_files, load_folder_chunks, load_folder_chunks_best_effort};
pub use models::{
    Chunk, Citation, CleanupMode, IndexingReport, IngestionOptions, IngestionReport,
    RetrievedChunk, SkippedPdf,
};
pub use orchestrator::HermesRuntime;
pub use prompt::PromptTemplate;
pub use providers::{OpenAiChatModel, OpenAiCredentials, OpenAiEmbedder};
pub use record_manager::RecordManager;
pub use secrets::{load_secrets, Secrets};
pub use session::{purge_upload_dir, ChatSession, SessionPhase};
pub use stores::{InMemoryVectorStore, QdrantStore};
pub use streaming::{respond, StreamedResponse};
pub use traits::{ChatModel, TokenStream, VectorStore};
