pub mod openai;

pub use openai::{OpenAiChatModel, OpenAiCredentials, OpenAiEmbedder};
