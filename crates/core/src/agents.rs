use crate::embeddings::Embedder;
use crate::error::AgentError;
use crate::frontend::OutgoingMessage;
use crate::models::RetrievedChunk;
use crate::prompt::{PromptTemplate, ASSISTANT_TEMPLATE, DOCUMENT_TEMPLATE};
use crate::traits::{ChatModel, TokenStream, VectorStore};
use std::sync::Arc;
use tracing::debug;

pub trait AgentCallbacks: Send {
    fn on_retriever_end(&mut self, _documents: &[RetrievedChunk]) {}

    /// Called after the last token, before the message is finalised.
    fn on_llm_end(&mut self, _message: &mut OutgoingMessage) {}
}

pub struct NoCallbacks;

impl AgentCallbacks for NoCallbacks {}

#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    namespace: String,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        namespace: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            namespace: namespace.into(),
            top_k,
        }
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, AgentError> {
        let query_vector = self.embedder.embed_query(question).await?;
        let documents = self
            .store
            .similarity_search(&self.namespace, &query_vector, self.top_k)
            .await?;
        debug!(namespace = %self.namespace, hits = documents.len(), "retrieved chunks");
        Ok(documents)
    }
}

pub fn format_docs(documents: &[RetrievedChunk]) -> String {
    documents
        .iter()
        .map(|document| document.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// prompt -> model -> text, optionally preceded by retrieval into `{context}`.
#[derive(Clone)]
pub struct Agent {
    prompt: PromptTemplate,
    model: Arc<dyn ChatModel>,
    retriever: Option<Retriever>,
}

pub fn chat_agent(model: Arc<dyn ChatModel>) -> Agent {
    Agent {
        prompt: PromptTemplate::from_template(ASSISTANT_TEMPLATE),
        model,
        retriever: None,
    }
}

pub fn rag_agent(model: Arc<dyn ChatModel>, retriever: Retriever) -> Agent {
    Agent {
        prompt: PromptTemplate::from_template(DOCUMENT_TEMPLATE),
        model,
        retriever: Some(retriever),
    }
}

impl Agent {
    pub fn uses_retrieval(&self) -> bool {
        self.retriever.is_some()
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Renders the prompt for `question`, running retrieval first when the
    /// agent has a retriever.
    pub async fn render(
        &self,
        question: &str,
        callbacks: &mut dyn AgentCallbacks,
    ) -> Result<String, AgentError> {
        match &self.retriever {
            Some(retriever) => {
                let documents = retriever.retrieve(question).await?;
                callbacks.on_retriever_end(&documents);
                let context = format_docs(&documents);
                self.prompt
                    .render(&[("context", &context), ("question", question)])
            }
            None => self.prompt.render(&[("question", question)]),
        }
    }

    pub async fn stream(
        &self,
        question: &str,
        callbacks: &mut dyn AgentCallbacks,
    ) -> Result<TokenStream, AgentError> {
        let prompt = self.render(question, callbacks).await?;
        Ok(self.model.stream(&prompt).await?)
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use crate::error::ProviderError;
    use crate::traits::{ChatModel, TokenStream};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    /// Streams a fixed reply and remembers the prompts it was given.
    pub(crate) struct ScriptedModel {
        pub(crate) tokens: Vec<String>,
        pub(crate) prompts: Mutex<Vec<String>>,
        pub(crate) fail_after: Option<usize>,
    }

    impl ScriptedModel {
        pub(crate) fn new(tokens: &[&str]) -> Self {
            Self {
                tokens: tokens.iter().map(|token| token.to_string()).collect(),
                prompts: Mutex::new(Vec::new()),
                fail_after: None,
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn stream(&self, prompt: &str) -> Result<TokenStream, ProviderError> {
            self.prompts.lock().push(prompt.to_string());
            let (tx, rx) = mpsc::channel(self.tokens.len() + 1);
            for (index, token) in self.tokens.iter().enumerate() {
                if self.fail_after == Some(index) {
                    let _ = tx.send(Err(ProviderError::Stream("cut off".to_string()))).await;
                    return Ok(rx);
                }
                let _ = tx.send(Ok(token.clone())).await;
            }
            Ok(rx)
        }
    }
}
