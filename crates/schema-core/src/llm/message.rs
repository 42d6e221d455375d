use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mensaje de la conversación, discriminado por `role`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Resultado de una tool call, enlazado por `tool_call_id`.
    Tool {
        tool_call_id: String,
        content: String,
    },
}

/// Invocación estructurada de una herramienta por parte del modelo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Herramienta ofrecida al modelo (nombre + JSON schema de argumentos).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

/// Respuesta completa del modelo una vez plegado el stream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant { content: content.into(),
                             tool_calls: Vec::new() }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Message::Tool { tool_call_id: tool_call_id.into(),
                        content: content.into() }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::User { content } | Message::Assistant { content, .. } | Message::Tool { content, .. } => content,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }
}

impl From<AssistantMessage> for Message {
    fn from(m: AssistantMessage) -> Self {
        Message::Assistant { content: m.text,
                             tool_calls: m.tool_calls }
    }
}

impl ChatRequest {
    pub fn new(system: impl Into<String>) -> Self {
        Self { system: system.into(),
               ..Default::default() }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_tool(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool);
        self
    }

    /// Concatenación de todo el texto enviado (system + mensajes).
    pub fn prompt_text(&self) -> String {
        let mut out = self.system.clone();
        for m in &self.messages {
            out.push('\n');
            out.push_str(m.content());
        }
        out
    }
}

impl AssistantMessage {
    pub fn calls_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ToolCall> + 'a {
        self.tool_calls.iter().filter(move |c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_are_tagged_by_role() {
        let m = Message::tool("call_1", "ok");
        assert_eq!(serde_json::to_value(&m).unwrap(),
                   json!({"role": "tool", "tool_call_id": "call_1", "content": "ok"}));
        let back: Message = serde_json::from_value(json!({"role": "assistant", "content": "hi"})).unwrap();
        assert_eq!(back, Message::assistant("hi"));
    }
}
