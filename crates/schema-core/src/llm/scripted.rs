//! Modelo guionado para pruebas y demos: devuelve respuestas prefijadas
//! troceadas en chunks pequeños, y registra cada request recibido.

use std::collections::VecDeque;

use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;

use super::{AssistantMessage, ChatModel, ChatRequest, ChunkStream, MessageChunk, ModelError, ToolCall};

type Responder = Box<dyn Fn(&ChatRequest) -> Result<AssistantMessage, ModelError> + Send + Sync>;

enum Script {
    Queue(Mutex<VecDeque<Result<AssistantMessage, ModelError>>>),
    Responder(Responder),
}

pub struct ScriptedChatModel {
    script: Script,
    requests: Mutex<Vec<ChatRequest>>,
    chunk_size: usize,
}

impl ScriptedChatModel {
    /// Respuestas consumidas en orden; agotada la cola devuelve
    /// `ModelError::ScriptExhausted`.
    pub fn new(replies: Vec<Result<AssistantMessage, ModelError>>) -> Self {
        Self { script: Script::Queue(Mutex::new(replies.into())),
               requests: Mutex::new(Vec::new()),
               chunk_size: 7 }
    }

    /// Respuesta calculada a partir del request (útil con ramas concurrentes,
    /// donde el orden de llegada no es determinista).
    pub fn from_fn<F>(responder: F) -> Self
        where F: Fn(&ChatRequest) -> Result<AssistantMessage, ModelError> + Send + Sync + 'static
    {
        Self { script: Script::Responder(Box::new(responder)),
               requests: Mutex::new(Vec::new()),
               chunk_size: 7 }
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Requests recibidos hasta ahora.
    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_reply(&self, request: &ChatRequest) -> Result<AssistantMessage, ModelError> {
        match &self.script {
            Script::Queue(queue) => queue.lock().await.pop_front().unwrap_or(Err(ModelError::ScriptExhausted)),
            Script::Responder(f) => f(request),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn stream(&self, request: ChatRequest) -> Result<ChunkStream, ModelError> {
        self.requests.lock().await.push(request.clone());
        let reply = self.next_reply(&request).await?;
        debug!("scripted model reply: {} chars, {} tool calls", reply.text.len(), reply.tool_calls.len());
        let chunks = to_chunks(&reply, self.chunk_size);
        Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
    }
}

fn split_chars(s: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

fn to_chunks(reply: &AssistantMessage, size: usize) -> Vec<MessageChunk> {
    let mut chunks: Vec<MessageChunk> = split_chars(&reply.text, size).into_iter()
                                                                      .map(|text| MessageChunk::TextDelta { text })
                                                                      .collect();
    for (index, ToolCall { id, name, arguments }) in reply.tool_calls.iter().enumerate() {
        chunks.push(MessageChunk::ToolCallStart { index,
                                                  id: id.clone(),
                                                  name: name.clone() });
        for delta in split_chars(&arguments.to_string(), size) {
            chunks.push(MessageChunk::ToolCallDelta { index, delta });
        }
    }
    chunks.push(MessageChunk::Done);
    chunks
}

/// Atajo para construir respuestas con una sola tool call.
pub fn tool_reply(name: &str, arguments: serde_json::Value) -> AssistantMessage {
    AssistantMessage { text: String::new(),
                       tool_calls: vec![ToolCall { id: format!("call_{}", uuid::Uuid::new_v4().simple()),
                                                   name: name.to_string(),
                                                   arguments }] }
}

pub fn text_reply(text: &str) -> AssistantMessage {
    AssistantMessage { text: text.to_string(),
                       tool_calls: Vec::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::invoke;
    use serde_json::json;

    #[tokio::test]
    async fn replies_survive_chunking() {
        let reply = tool_reply("schemaDesignTool", json!({"operations": [{"op": "remove", "path": "/tables/x"}]}));
        let model = ScriptedChatModel::new(vec![Ok(reply.clone())]).with_chunk_size(3);
        let got = invoke(&model, ChatRequest::new("sys")).await.unwrap();
        assert_eq!(got.tool_calls, reply.tool_calls);
        assert_eq!(model.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let model = ScriptedChatModel::new(vec![]);
        assert_eq!(invoke(&model, ChatRequest::new("sys")).await, Err(ModelError::ScriptExhausted));
    }
}
