use crate::agents::{Agent, AgentCallbacks};
use crate::error::SessionError;
use crate::frontend::{ChatFrontend, MessageId, OutgoingMessage};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct StreamedResponse {
    pub id: MessageId,
    pub message: OutgoingMessage,
    pub token_count: usize,
}

/// Streams one answer to the frontend token by token. Callbacks see the
/// finished message before it is finalised, so anything they append lands
/// after the last token.
pub async fn respond(
    agent: &Agent,
    input: &str,
    callbacks: &mut dyn AgentCallbacks,
    frontend: &dyn ChatFrontend,
) -> Result<StreamedResponse, SessionError> {
    let mut tokens = agent.stream(input, callbacks).await?;
    let id = frontend.begin_stream().await?;

    let mut message = OutgoingMessage::default();
    let mut token_count = 0usize;
    while let Some(token) = tokens.recv().await {
        let token = match token {
            Ok(token) => token,
            Err(error) => {
                warn!(error = %error, tokens = token_count, "token stream failed");
                frontend.finish_stream(&id, &message).await?;
                return Err(error.into());
            }
        };
        frontend.stream_token(&id, &token).await?;
        message.content.push_str(&token);
        token_count += 1;
    }

    callbacks.on_llm_end(&mut message);
    frontend.finish_stream(&id, &message).await?;
    debug!(model = agent.model_name(), tokens = token_count, "response streamed");

    Ok(StreamedResponse {
        id,
        message,
        token_count,
    })
}
