//! Chunks de streaming y su acumulador.
//!
//! Los límites entre chunks son arbitrarios: un argumento JSON de una tool
//! call puede llegar partido en cualquier byte. El acumulador sólo interpreta
//! los argumentos en `finish`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AssistantMessage, ModelError, ToolCall};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageChunk {
    TextDelta { text: String },
    ToolCallStart { index: usize, id: String, name: String },
    /// Fragmento de los argumentos JSON de la tool call `index`.
    ToolCallDelta { index: usize, delta: String },
    Done,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageAccumulator {
    text: String,
    calls: BTreeMap<usize, PartialCall>,
    done: bool,
}

impl MessageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: MessageChunk) {
        match chunk {
            MessageChunk::TextDelta { text } => self.text.push_str(&text),
            MessageChunk::ToolCallStart { index, id, name } => {
                let call = self.calls.entry(index).or_default();
                if !id.is_empty() {
                    call.id = id;
                }
                if !name.is_empty() {
                    call.name = name;
                }
            }
            MessageChunk::ToolCallDelta { index, delta } => {
                self.calls.entry(index).or_default().arguments.push_str(&delta);
            }
            MessageChunk::Done => self.done = true,
        }
    }

    /// Une dos acumulaciones parciales; `other` se considera posterior.
    pub fn concat(mut self, other: MessageAccumulator) -> Self {
        self.text.push_str(&other.text);
        for (index, part) in other.calls {
            let call = self.calls.entry(index).or_default();
            if call.id.is_empty() {
                call.id = part.id;
            }
            if call.name.is_empty() {
                call.name = part.name;
            }
            call.arguments.push_str(&part.arguments);
        }
        self.done |= other.done;
        self
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Cierra la acumulación parseando los argumentos de cada tool call.
    pub fn finish(self) -> Result<AssistantMessage, ModelError> {
        let mut tool_calls = Vec::with_capacity(self.calls.len());
        for (index, call) in self.calls {
            let arguments = if call.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&call.arguments).map_err(|e| ModelError::MalformedToolArguments {
                    name: call.name.clone(),
                    reason: e.to_string(),
                })?
            };
            let id = if call.id.is_empty() { format!("call_{index}") } else { call.id };
            tool_calls.push(ToolCall { id,
                                       name: call.name,
                                       arguments });
        }
        Ok(AssistantMessage { text: self.text,
                              tool_calls })
    }
}
