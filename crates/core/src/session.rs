use crate::agents::Agent;
use crate::citations::SourceCollector;
use crate::config::UploadPolicy;
use crate::error::SessionError;
use crate::frontend::{AskFileRequest, ChatFrontend, ChatProfile, OutgoingMessage, UploadedFile};
use crate::orchestrator::HermesRuntime;
use crate::streaming::{respond, StreamedResponse};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

pub const ASSISTANT_GREETING: &str = "Hello! What can I help you with?";
pub const DOCUMENTS_GREETING: &str =
    "Hello! What questions do you have about the uploaded documents?";
pub const UPLOAD_PROMPT: &str = "Please upload PDF files to begin!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    ProfileSelected,
    Ingesting,
    Ready,
    Failed,
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::ProfileSelected => "profile-selected",
            SessionPhase::Ingesting => "ingesting",
            SessionPhase::Ready => "ready",
            SessionPhase::Failed => "failed",
            SessionPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

pub struct ChatSession {
    id: String,
    profile: ChatProfile,
    phase: SessionPhase,
    upload_dir: PathBuf,
    namespace: String,
    agent: Option<Agent>,
    runtime: HermesRuntime,
}

impl ChatSession {
    pub fn new(runtime: HermesRuntime, profile: ChatProfile) -> Self {
        Self::with_id(runtime, profile, Uuid::new_v4().to_string())
    }

    pub fn with_id(runtime: HermesRuntime, profile: ChatProfile, id: impl Into<String>) -> Self {
        let id = id.into();
        let upload_dir = runtime.settings().storage_root.join(&id);
        let namespace = runtime.session_namespace(&id);
        Self {
            id,
            profile,
            phase: SessionPhase::ProfileSelected,
            upload_dir,
            namespace,
            agent: None,
            runtime,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn profile(&self) -> ChatProfile {
        self.profile
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn activate(&mut self, frontend: &dyn ChatFrontend) -> Result<(), SessionError> {
        if self.phase != SessionPhase::ProfileSelected {
            return Err(SessionError::NotReady(self.phase.to_string()));
        }
        info!(session = %self.id, profile = self.profile.name(), "session started");

        let started = match self.profile {
            ChatProfile::Assistant => self.start_assistant(frontend).await,
            ChatProfile::Documents => self.start_documents(frontend).await,
        };
        if let Err(error) = &started {
            warn!(session = %self.id, error = %error, "session failed to start");
            self.phase = SessionPhase::Failed;
        }
        started
    }

    async fn start_assistant(&mut self, frontend: &dyn ChatFrontend) -> Result<(), SessionError> {
        self.agent = Some(self.runtime.chat_agent());
        self.phase = SessionPhase::Ready;
        frontend.send(&OutgoingMessage::new(ASSISTANT_GREETING)).await?;
        Ok(())
    }

    async fn start_documents(&mut self, frontend: &dyn ChatFrontend) -> Result<(), SessionError> {
        let policy = self.runtime.settings().upload.clone();
        let files = await_uploads(&policy, frontend).await?;
        validate_uploads(&policy, &files)?;

        self.phase = SessionPhase::Ingesting;
        self.store_uploads(&files, frontend).await?;

        let report = self
            .runtime
            .index_documents(&self.upload_dir, &self.namespace)
            .await?;
        info!(
            session = %self.id,
            files = files.len(),
            added = report.num_added,
            "uploads indexed"
        );

        self.agent = Some(self.runtime.rag_agent(&self.namespace));
        self.phase = SessionPhase::Ready;
        frontend.send(&OutgoingMessage::new(DOCUMENTS_GREETING)).await?;
        Ok(())
    }

    async fn store_uploads(
        &self,
        files: &[UploadedFile],
        frontend: &dyn ChatFrontend,
    ) -> Result<Vec<PathBuf>, SessionError> {
        fs::create_dir_all(&self.upload_dir)?;

        let mut progress = OutgoingMessage::new(format!(
            "Processing and saving `{}` files...\n",
            files.len()
        ))
        .without_feedback();
        let progress_id = frontend.send(&progress).await?;

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let file_name = Path::new(&file.name).file_name().ok_or_else(|| {
                SessionError::UploadRejected(format!("bad file name {}", file.name))
            })?;
            let target = self.upload_dir.join(file_name);
            fs::copy(&file.path, &target)?;
            info!(session = %self.id, file = %file.name, "upload saved");

            progress.content.push_str(&format!("- `{}`\n", file.name));
            frontend.update(&progress_id, &progress).await?;
            stored.push(target);
        }
        Ok(stored)
    }

    pub async fn on_message(
        &mut self,
        input: &str,
        frontend: &dyn ChatFrontend,
    ) -> Result<StreamedResponse, SessionError> {
        let agent = match (&self.agent, self.phase) {
            (Some(agent), SessionPhase::Ready) => agent,
            _ => return Err(SessionError::NotReady(self.phase.to_string())),
        };

        let mut collector = SourceCollector::new();
        respond(agent, input, &mut collector, frontend).await
    }

    pub async fn end(&mut self) -> Result<usize, SessionError> {
        self.close("end").await
    }

    pub async fn logout(&mut self) -> Result<usize, SessionError> {
        self.close("logout").await
    }

    /// Returns the number of uploaded files removed.
    async fn close(&mut self, reason: &str) -> Result<usize, SessionError> {
        self.agent = None;
        self.phase = SessionPhase::Closed;
        let removed = purge_upload_dir(&self.upload_dir)?;
        let dropped = self.runtime.drop_namespace(&self.namespace).await?;
        info!(session = %self.id, reason, removed, dropped, "session closed");
        Ok(removed)
    }
}

/// Asks for files until some arrive or `max_attempts` prompts time out.
pub async fn await_uploads(
    policy: &UploadPolicy,
    frontend: &dyn ChatFrontend,
) -> Result<Vec<UploadedFile>, SessionError> {
    let request = AskFileRequest {
        content: UPLOAD_PROMPT.to_string(),
        accept: policy.accept.clone(),
        max_size_mb: policy.max_size_mb,
        max_files: policy.max_files,
        timeout: policy.timeout,
    };

    for attempt in 1..=policy.max_attempts {
        match frontend.ask_files(&request).await? {
            Some(files) if !files.is_empty() => return Ok(files),
            _ => warn!(attempt, max_attempts = policy.max_attempts, "no files uploaded"),
        }
    }
    Err(SessionError::UploadTimedOut {
        attempts: policy.max_attempts,
    })
}

pub fn validate_uploads(policy: &UploadPolicy, files: &[UploadedFile]) -> Result<(), SessionError> {
    if files.len() > policy.max_files {
        return Err(SessionError::UploadRejected(format!(
            "{} files exceeds the limit of {}",
            files.len(),
            policy.max_files
        )));
    }
    for file in files {
        if !policy.accepts(&file.name) {
            return Err(SessionError::UploadRejected(format!(
                "{} is not one of: {}",
                file.name,
                policy.accept.join(", ")
            )));
        }
        if file.size > policy.max_size_bytes() {
            return Err(SessionError::UploadRejected(format!(
                "{} is larger than {} MB",
                file.name, policy.max_size_mb
            )));
        }
    }
    Ok(())
}

/// Removes every regular file directly inside `dir`; the directory stays.
pub fn purge_upload_dir(dir: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(error) => return Err(error),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::recording::{Event, RecordingFrontend};
    use crate::orchestrator::test_runtime::runtime;
    use crate::test_support::write_text_pdf;
    use crate::traits::VectorStore;
    use std::time::Duration;
    use tempfile::tempdir;

    fn upload(
        dir: &Path,
        name: &str,
        pages: &[&str],
    ) -> Result<UploadedFile, Box<dyn std::error::Error>> {
        let path = dir.join(name);
        write_text_pdf(&path, pages)?;
        let size = fs::metadata(&path)?.len();
        Ok(UploadedFile {
            name: name.to_string(),
            path,
            size,
        })
    }

    #[tokio::test]
    async fn assistant_profile_is_ready_immediately() -> Result<(), SessionError> {
        let (runtime, _) = runtime(PathBuf::from("/unused"), &["Hi", " there"]);
        let frontend = RecordingFrontend::default();
        let mut session = ChatSession::with_id(runtime, ChatProfile::Assistant, "s1");

        session.activate(&frontend).await?;
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert_eq!(
            frontend.events(),
            vec![Event::Sent(OutgoingMessage::new(ASSISTANT_GREETING))]
        );

        let response = session.on_message("hello", &frontend).await?;
        assert_eq!(response.message.content, "Hi there");
        assert!(response.message.elements.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn documents_profile_indexes_uploads_and_cites_them(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let storage = tempdir()?;
        let incoming = tempdir()?;
        let file = upload(incoming.path(), "guide.pdf", &["Hermes delivers messages quickly."])?;
        let (runtime, store) = runtime(storage.path().to_path_buf(), &["Quickly."]);
        let frontend = RecordingFrontend::with_uploads(vec![None, Some(vec![file])]);
        let mut session = ChatSession::with_id(runtime, ChatProfile::Documents, "s2");

        session.activate(&frontend).await?;

        assert_eq!(session.phase(), SessionPhase::Ready);
        assert!(session.upload_dir().join("guide.pdf").is_file());
        assert_eq!(store.count("hermes/documents/s2").await?, 1);

        let events = frontend.events();
        assert!(events.contains(&Event::Updated(
            OutgoingMessage::new("Processing and saving `1` files...\n- `guide.pdf`\n")
                .without_feedback()
        )));
        assert_eq!(
            events.last(),
            Some(&Event::Sent(OutgoingMessage::new(DOCUMENTS_GREETING)))
        );

        let response = session.on_message("How does Hermes deliver?", &frontend).await?;
        assert!(response
            .message
            .content
            .ends_with("\n\n**Sources:**\nguide.pdf, page 1"));
        assert_eq!(response.message.elements.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn upload_wait_gives_up_after_max_attempts() -> Result<(), Box<dyn std::error::Error>> {
        let storage = tempdir()?;
        let (base, _) = runtime(storage.path().to_path_buf(), &[]);
        let frontend = RecordingFrontend::with_uploads(vec![None, Some(Vec::new()), None]);
        let mut session = ChatSession::with_id(with_attempts(base, 2), ChatProfile::Documents, "s3");

        let result = session.activate(&frontend).await;

        assert!(matches!(result, Err(SessionError::UploadTimedOut { attempts: 2 })));
        assert_eq!(session.phase(), SessionPhase::Failed);
        let asked = frontend
            .events()
            .iter()
            .filter(|event| matches!(event, Event::Asked(_)))
            .count();
        assert_eq!(asked, 2);
        assert!(matches!(
            session.on_message("anyone?", &frontend).await,
            Err(SessionError::NotReady(_))
        ));
        Ok(())
    }

    fn with_attempts(runtime: HermesRuntime, attempts: u32) -> HermesRuntime {
        let mut settings = runtime.settings().clone();
        settings.upload.max_attempts = attempts;
        settings.upload.timeout = Duration::from_millis(10);
        runtime.with_settings(settings)
    }

    #[test]
    fn uploads_outside_the_policy_are_rejected() {
        let policy = UploadPolicy::default();
        let file = |name: &str, size: u64| UploadedFile {
            name: name.to_string(),
            path: PathBuf::from(name),
            size,
        };

        assert!(validate_uploads(&policy, &[file("a.pdf", 1024)]).is_ok());
        assert!(matches!(
            validate_uploads(&policy, &[file("a.docx", 1024)]),
            Err(SessionError::UploadRejected(_))
        ));
        assert!(matches!(
            validate_uploads(&policy, &[file("big.pdf", 21 * 1024 * 1024)]),
            Err(SessionError::UploadRejected(_))
        ));
        let many: Vec<UploadedFile> = (0..101).map(|i| file(&format!("{i}.pdf"), 1)).collect();
        assert!(matches!(
            validate_uploads(&policy, &many),
            Err(SessionError::UploadRejected(_))
        ));
    }

    #[tokio::test]
    async fn end_and_logout_purge_files_but_keep_directory(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let storage = tempdir()?;
        let (runtime, _) = runtime(storage.path().to_path_buf(), &[]);
        let mut session = ChatSession::with_id(runtime.clone(), ChatProfile::Documents, "s4");
        fs::create_dir_all(session.upload_dir())?;
        fs::write(session.upload_dir().join("a.pdf"), b"%PDF")?;
        fs::write(session.upload_dir().join("b.pdf"), b"%PDF")?;
        fs::create_dir(session.upload_dir().join("nested"))?;

        assert_eq!(session.end().await?, 2);
        assert_eq!(session.phase(), SessionPhase::Closed);
        assert!(session.upload_dir().is_dir());
        assert!(!session.upload_dir().join("a.pdf").exists());

        let mut other = ChatSession::with_id(runtime, ChatProfile::Documents, "s5");
        fs::create_dir_all(other.upload_dir())?;
        fs::write(other.upload_dir().join("c.pdf"), b"%PDF")?;
        assert_eq!(other.logout().await?, 1);
        assert!(other.upload_dir().is_dir());
        assert_eq!(fs::read_dir(other.upload_dir())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn ending_a_documents_session_drops_its_vectors(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let storage = tempdir()?;
        let incoming = tempdir()?;
        let file = upload(incoming.path(), "notes.pdf", &["First page.", "Second page."])?;
        let (runtime, store) = runtime(storage.path().to_path_buf(), &["ok"]);
        let frontend = RecordingFrontend::with_uploads(vec![Some(vec![file])]);
        let mut session = ChatSession::with_id(runtime, ChatProfile::Documents, "s6");

        session.activate(&frontend).await?;
        let namespace = session.namespace().to_string();
        assert_eq!(store.count(&namespace).await?, 2);

        assert_eq!(session.end().await?, 1);
        assert_eq!(store.count(&namespace).await?, 0);
        Ok(())
    }

    #[test]
    fn purging_a_missing_directory_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
        let storage = tempdir()?;
        assert_eq!(purge_upload_dir(&storage.path().join("never-created"))?, 0);
        Ok(())
    }
}
