mod terminal;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use hermes_core::config::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_MANIFEST_PATH, DEFAULT_MODEL,
    DEFAULT_NAMESPACE, DEFAULT_SECRETS_PATH, DEFAULT_STORAGE_ROOT, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_K,
};
use hermes_core::{
    load_secrets, validate_base_url, CharacterNgramEmbedder, ChatModel, ChatProfile,
    ChatSession, ChatSettings, CleanupMode, Embedder, HermesRuntime, InMemoryVectorStore,
    OpenAiChatModel, OpenAiCredentials, OpenAiEmbedder, QdrantStore, RecordManager,
    SessionError, UploadPolicy, VectorStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use terminal::TerminalFrontend;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmbedderKind {
    /// OpenAI embeddings API.
    Openai,
    /// Offline character trigram hashing.
    Ngram,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreKind {
    Memory,
    Qdrant,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CleanupArg {
    None,
    Incremental,
    Full,
}

impl From<CleanupArg> for CleanupMode {
    fn from(value: CleanupArg) -> Self {
        match value {
            CleanupArg::None => CleanupMode::None,
            CleanupArg::Incremental => CleanupMode::Incremental,
            CleanupArg::Full => CleanupMode::Full,
        }
    }
}

#[derive(Parser)]
#[command(name = "hermes-chat", version)]
struct Cli {
    /// JSON file with OPENAI_API_KEY and friends.
    #[arg(long, env = "HERMES_SECRETS", default_value = DEFAULT_SECRETS_PATH)]
    secrets: PathBuf,

    /// Root directory for per-session uploads.
    #[arg(long, env = "HERMES_STORAGE", default_value = DEFAULT_STORAGE_ROOT)]
    storage: PathBuf,

    /// "AI Assistant" or "Documents"; asked interactively when omitted.
    #[arg(long, env = "HERMES_PROFILE")]
    profile: Option<String>,

    #[arg(long, env = "HERMES_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long, env = "HERMES_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    #[arg(long, env = "HERMES_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    #[arg(long, env = "HERMES_CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Chunks retrieved per question.
    #[arg(long, env = "HERMES_TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    #[arg(long, env = "HERMES_EMBEDDER", value_enum, default_value = "openai")]
    embedder: EmbedderKind,

    #[arg(long, env = "HERMES_VECTOR_STORE", value_enum, default_value = "memory")]
    vector_store: StoreKind,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "hermes_chunks")]
    collection: String,

    /// SQLite manifest used for incremental indexing.
    #[arg(long, env = "HERMES_MANIFEST", default_value = DEFAULT_MANIFEST_PATH)]
    manifest: PathBuf,

    #[arg(long, env = "HERMES_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    #[arg(long, env = "HERMES_CLEANUP", value_enum, default_value = "incremental")]
    cleanup: CleanupArg,

    /// Upload prompts before a documents session gives up.
    #[arg(long, env = "HERMES_UPLOAD_ATTEMPTS", default_value_t = 3)]
    upload_attempts: u32,

    /// Seconds each upload prompt waits.
    #[arg(long, env = "HERMES_UPLOAD_TIMEOUT", default_value_t = 180)]
    upload_timeout: u64,
}

impl Cli {
    fn settings(&self) -> ChatSettings {
        ChatSettings {
            model: self.model.clone(),
            temperature: self.temperature,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k: self.top_k,
            storage_root: self.storage.clone(),
            namespace: self.namespace.clone(),
            cleanup: self.cleanup.into(),
            upload: UploadPolicy {
                timeout: Duration::from_secs(self.upload_timeout),
                max_attempts: self.upload_attempts,
                ..UploadPolicy::default()
            },
        }
    }
}

async fn build_runtime(cli: &Cli, settings: ChatSettings) -> anyhow::Result<HermesRuntime> {
    let secrets = load_secrets(&cli.secrets);
    let credentials =
        OpenAiCredentials::from_secrets(&secrets).context("OpenAI credentials are required")?;
    validate_base_url("OPENAI_BASE_URL", &credentials.base_url)?;

    let model: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::new(
        credentials.clone(),
        &settings.model,
        settings.temperature,
    )?);

    let embedder: Arc<dyn Embedder> = match cli.embedder {
        EmbedderKind::Openai => Arc::new(OpenAiEmbedder::new(credentials)?),
        EmbedderKind::Ngram => Arc::new(CharacterNgramEmbedder::default()),
    };

    let store: Arc<dyn VectorStore> = match cli.vector_store {
        StoreKind::Memory => Arc::new(InMemoryVectorStore::new()),
        StoreKind::Qdrant => {
            validate_base_url("qdrant_url", &cli.qdrant_url)?;
            let qdrant = QdrantStore::new(&cli.qdrant_url, &cli.collection, embedder.dimensions());
            qdrant.ensure_collection().await?;
            Arc::new(qdrant)
        }
    };

    let records = RecordManager::open(&settings.namespace, &cli.manifest)
        .with_context(|| format!("opening manifest {}", cli.manifest.display()))?;

    Ok(HermesRuntime::new(settings, model, embedder, store, records))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the chat; logs go to stderr.
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = cli.settings();
    settings.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        model = %settings.model,
        "hermes-chat boot"
    );

    let runtime = build_runtime(&cli, settings).await?;
    let frontend = TerminalFrontend::new();

    let profile = match cli.profile.as_deref() {
        Some(name) => ChatProfile::from_name(name)
            .ok_or_else(|| anyhow::anyhow!("unknown chat profile {name}"))?,
        None => frontend.choose_profile().await?,
    };

    let mut session = ChatSession::new(runtime, profile);
    if let Err(error) = session.activate(&frontend).await {
        session.end().await?;
        return Err(error.into());
    }

    loop {
        let Some(line) = frontend.read_input().await? else {
            session.end().await?;
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" => {
                session.end().await?;
                break;
            }
            "/logout" => {
                session.logout().await?;
                break;
            }
            input => match session.on_message(input, &frontend).await {
                Ok(_) => {}
                Err(error @ SessionError::NotReady(_)) => {
                    session.end().await?;
                    return Err(error.into());
                }
                Err(error) => warn!(error = %error, "message failed"),
            },
        }
    }

    Ok(())
}
