//! Interfaz con el modelo de lenguaje (colaborador opaco).

pub mod chunk;
pub mod message;
pub mod model;
pub mod scripted;

pub use chunk::{MessageAccumulator, MessageChunk};
pub use message::{AssistantMessage, ChatRequest, Message, ToolCall, ToolSpec};
pub use model::{invoke, ChatModel, ChunkStream, ModelError};
pub use scripted::{text_reply, tool_reply, ScriptedChatModel};
