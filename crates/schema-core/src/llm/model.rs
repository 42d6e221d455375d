use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use thiserror::Error;

use super::{AssistantMessage, ChatRequest, MessageAccumulator, MessageChunk};

/// Stream de chunks devuelto por el modelo.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<MessageChunk, ModelError>> + Send>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("model request timed out after {0} ms")]
    Timeout(u64),
    #[error("rate limited (retry after {retry_after_ms} ms)")]
    RateLimited { retry_after_ms: u64 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("tool call '{name}' has malformed arguments: {reason}")]
    MalformedToolArguments { name: String, reason: String },
    #[error("model refused the request: {0}")]
    Refused(String),
    #[error("no scripted response left")]
    ScriptExhausted,
}

impl ModelError {
    pub fn is_retryable(&self) -> bool {
        matches!(self,
                 ModelError::Timeout(_) | ModelError::RateLimited { .. } | ModelError::Transport(_))
    }
}

/// Colaborador LLM: recibe prompt + historial y devuelve un stream.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream, ModelError>;
}

/// Pliega el stream completo en un `AssistantMessage`.
pub async fn invoke(model: &dyn ChatModel, request: ChatRequest) -> Result<AssistantMessage, ModelError> {
    let mut stream = model.stream(request).await?;
    let mut acc = MessageAccumulator::new();
    while let Some(chunk) = stream.next().await {
        acc.push(chunk?);
    }
    acc.finish()
}
