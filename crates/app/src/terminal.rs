use async_trait::async_trait;
use hermes_core::{
    AskFileRequest, ChatFrontend, ChatProfile, FrontendError, MessageId, OutgoingMessage,
    UploadedFile,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::warn;

/// Text already printed per message. Only the latest plain message and
/// in-flight streams are tracked.
#[derive(Default)]
struct Shown {
    text: HashMap<MessageId, String>,
    last_sent: Option<MessageId>,
}

impl Shown {
    /// What `content` adds beyond what is on screen for `id`.
    fn tail(&mut self, id: &MessageId, content: &str) -> String {
        let previous = self.text.entry(id.clone()).or_default();
        let tail = match content.strip_prefix(previous.as_str()) {
            Some(tail) => tail.to_string(),
            None => format!("\n{content}"),
        };
        *previous = content.to_string();
        tail
    }

    fn sent(&mut self, id: &MessageId) {
        if let Some(previous) = self.last_sent.replace(id.clone()) {
            self.text.remove(&previous);
        }
    }

    fn forget(&mut self, id: &MessageId) {
        self.text.remove(id);
        if self.last_sent.as_ref() == Some(id) {
            self.last_sent = None;
        }
    }
}

/// Line-oriented chat UI on stdin/stdout. Messages cannot be redrawn, so
/// updates print only the text added since the last write.
pub struct TerminalFrontend {
    input: Mutex<Lines<BufReader<Stdin>>>,
    output: Mutex<Stdout>,
    shown: Mutex<Shown>,
    next_id: AtomicU64,
}

impl TerminalFrontend {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            output: Mutex::new(tokio::io::stdout()),
            shown: Mutex::new(Shown::default()),
            next_id: AtomicU64::new(1),
        }
    }

    fn id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::Relaxed).to_string())
    }

    async fn write(&self, text: &str) -> Result<(), FrontendError> {
        let mut output = self.output.lock().await;
        output.write_all(text.as_bytes()).await?;
        output.flush().await?;
        Ok(())
    }

    async fn read_line(&self) -> Result<Option<String>, FrontendError> {
        Ok(self.input.lock().await.next_line().await?)
    }

    /// Prints whatever `message` adds beyond what is already on screen.
    async fn show(&self, id: &MessageId, message: &OutgoingMessage) -> Result<(), FrontendError> {
        let tail = self.shown.lock().await.tail(id, &message.content);
        self.write(&tail).await
    }

    async fn show_elements(&self, message: &OutgoingMessage) -> Result<(), FrontendError> {
        for element in &message.elements {
            self.write(&format!(
                "  [pdf] {} (page {}) {}\n",
                element.name, element.page, element.path
            ))
            .await?;
        }
        Ok(())
    }

    /// Next chat input; `None` once stdin is closed.
    pub async fn read_input(&self) -> Result<Option<String>, FrontendError> {
        self.write("\n> ").await?;
        self.read_line().await
    }

    pub async fn choose_profile(&self) -> Result<ChatProfile, FrontendError> {
        let mut menu = String::from("Choose a chat profile:\n");
        for (index, profile) in ChatProfile::ALL.iter().enumerate() {
            menu.push_str(&format!(
                "  {}. {} - {}\n",
                index + 1,
                profile.name(),
                profile.markdown_description()
            ));
        }

        loop {
            self.write(&menu).await?;
            self.write("> ").await?;
            let Some(line) = self.read_line().await? else {
                return Err(FrontendError::Closed);
            };
            let line = line.trim();
            let by_number = line
                .parse::<usize>()
                .ok()
                .and_then(|number| number.checked_sub(1))
                .and_then(|index| ChatProfile::ALL.get(index).copied());
            if let Some(profile) = by_number.or_else(|| ChatProfile::from_name(line)) {
                return Ok(profile);
            }
        }
    }
}

impl Default for TerminalFrontend {
    fn default() -> Self {
        Self::new()
    }
}

fn file_from_path(raw: &str) -> Option<UploadedFile> {
    let path = PathBuf::from(raw.trim());
    let metadata = match std::fs::metadata(&path) {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => {
            warn!(path = %path.display(), "not a file");
            return None;
        }
        Err(error) => {
            warn!(path = %path.display(), error = %error, "cannot read upload");
            return None;
        }
    };
    let name = path.file_name()?.to_string_lossy().to_string();
    Some(UploadedFile {
        name,
        path,
        size: metadata.len(),
    })
}

#[async_trait]
impl ChatFrontend for TerminalFrontend {
    async fn send(&self, message: &OutgoingMessage) -> Result<MessageId, FrontendError> {
        let id = self.id();
        self.shown.lock().await.sent(&id);
        self.write("\n").await?;
        self.show(&id, message).await?;
        self.show_elements(message).await?;
        Ok(id)
    }

    async fn update(&self, id: &MessageId, message: &OutgoingMessage) -> Result<(), FrontendError> {
        self.show(id, message).await
    }

    async fn begin_stream(&self) -> Result<MessageId, FrontendError> {
        let id = self.id();
        self.shown.lock().await.text.insert(id.clone(), String::new());
        Ok(id)
    }

    async fn stream_token(&self, id: &MessageId, token: &str) -> Result<(), FrontendError> {
        if let Some(shown) = self.shown.lock().await.text.get_mut(id) {
            shown.push_str(token);
        }
        self.write(token).await
    }

    async fn finish_stream(
        &self,
        id: &MessageId,
        message: &OutgoingMessage,
    ) -> Result<(), FrontendError> {
        self.show(id, message).await?;
        self.write("\n").await?;
        self.show_elements(message).await?;
        self.shown.lock().await.forget(id);
        Ok(())
    }

    async fn ask_files(
        &self,
        request: &AskFileRequest,
    ) -> Result<Option<Vec<UploadedFile>>, FrontendError> {
        self.write(&format!(
            "\n{}\n(accepts {}; up to {} files of {} MB; {}s to answer)\nfile paths, comma separated: ",
            request.content,
            request.accept.join(", "),
            request.max_files,
            request.max_size_mb,
            request.timeout.as_secs()
        ))
        .await?;

        let line = match tokio::time::timeout(request.timeout, self.read_line()).await {
            Ok(line) => line?,
            Err(_) => {
                self.write("\n").await?;
                return Ok(None);
            }
        };
        let Some(line) = line else {
            return Err(FrontendError::Closed);
        };

        let files: Vec<UploadedFile> = line
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .filter_map(file_from_path)
            .collect();
        Ok(Some(files))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> MessageId {
        MessageId(raw.to_string())
    }

    #[test]
    fn updates_print_only_new_text() {
        let mut shown = Shown::default();
        shown.sent(&id("1"));
        assert_eq!(shown.tail(&id("1"), "Processing `1` files...\n"), "Processing `1` files...\n");
        assert_eq!(
            shown.tail(&id("1"), "Processing `1` files...\n- `a.pdf`\n"),
            "- `a.pdf`\n"
        );
        assert_eq!(shown.tail(&id("1"), "rewritten"), "\nrewritten");
    }

    #[test]
    fn only_the_latest_sent_message_is_tracked() {
        let mut shown = Shown::default();
        for raw in ["1", "2", "3"] {
            shown.sent(&id(raw));
            shown.tail(&id(raw), "hello");
        }
        shown.text.insert(id("stream"), String::from("partial"));

        assert_eq!(shown.text.len(), 2);
        assert!(shown.text.contains_key(&id("3")));

        shown.forget(&id("stream"));
        shown.forget(&id("3"));
        assert!(shown.text.is_empty());
        assert!(shown.last_sent.is_none());
    }
}
