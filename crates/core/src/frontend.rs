use crate::error::FrontendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatProfile {
    Assistant,
    Documents,
}

impl ChatProfile {
    pub const ALL: [ChatProfile; 2] = [ChatProfile::Assistant, ChatProfile::Documents];

    pub fn name(self) -> &'static str {
        match self {
            ChatProfile::Assistant => "AI Assistant",
            ChatProfile::Documents => "Documents",
        }
    }

    pub fn markdown_description(self) -> &'static str {
        match self {
            ChatProfile::Assistant => "Chat with Hermes.",
            ChatProfile::Documents => "Ask Hermes questions about the uploaded documents.",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            ChatProfile::Assistant => "/public/hermes.png",
            ChatProfile::Documents => "/public/docs.svg",
        }
    }

    /// Accepts the display name or a short alias, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|profile| {
            profile.name().eq_ignore_ascii_case(name)
                || profile.alias().eq_ignore_ascii_case(name)
        })
    }

    fn alias(self) -> &'static str {
        match self {
            ChatProfile::Assistant => "assistant",
            ChatProfile::Documents => "documents",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfElement {
    pub name: String,
    pub path: String,
    pub page: u32,
    pub display: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub content: String,
    pub elements: Vec<PdfElement>,
    pub disable_feedback: bool,
}

impl OutgoingMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn without_feedback(mut self) -> Self {
        self.disable_feedback = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

#[derive(Debug, Clone, PartialEq)]
pub struct AskFileRequest {
    pub content: String,
    pub accept: Vec<String>,
    pub max_size_mb: u64,
    pub max_files: usize,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[async_trait]
pub trait ChatFrontend: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<MessageId, FrontendError>;

    async fn update(&self, id: &MessageId, message: &OutgoingMessage) -> Result<(), FrontendError>;

    async fn begin_stream(&self) -> Result<MessageId, FrontendError>;

    async fn stream_token(&self, id: &MessageId, token: &str) -> Result<(), FrontendError>;

    /// Final content of a streamed message, including anything appended
    /// after the last token.
    async fn finish_stream(
        &self,
        id: &MessageId,
        message: &OutgoingMessage,
    ) -> Result<(), FrontendError>;

    /// `Ok(None)` when the request timed out without files.
    async fn ask_files(
        &self,
        request: &AskFileRequest,
    ) -> Result<Option<Vec<UploadedFile>>, FrontendError>;
}
