//! Turn domain types.
//!
//! A [`Turn`] is one role-tagged message in a project's transcript. Its serde
//! representation is exactly the Messages API wire shape, and that same JSON
//! is what the store keeps per row:
//!
//! ```text
//! {"role": "user", "content": "list files"}
//! {"role": "assistant", "content": [{"type": "tool_use", "id": "toolu_1", "name": "list_files", "input": {...}}]}
//! {"role": "user", "content": [{"type": "tool_result", "tool_use_id": "toolu_1", "content": "a.txt"}]}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (also carries tool results back to the model)
    User,
    /// The model
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// What a turn carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireContent", into = "WireContent")]
pub enum TurnContent {
    /// Plain text from the user or the model.
    Text(String),

    /// A tool invocation requested by the model.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// The result of a tool invocation, tagged with the call it answers.
    ToolResult { tool_use_id: String, content: String },
}

/// One message in a project's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
}

impl Turn {
    /// A plain-text user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    /// A plain-text assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Text(text.into()),
        }
    }

    /// The assistant turn recording a tool call request.
    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::ToolUse {
                id: id.into(),
                name: name.into(),
                input,
            },
        }
    }

    /// The user turn carrying a tool result back to the model.
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
            },
        }
    }

    /// The text of a plain-text turn, `None` for tool envelopes.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Serialize to the stored payload.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a stored payload.
    pub fn decode(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

// --- Wire representation ---

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Blocks(Vec<WireBlock>),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

impl From<TurnContent> for WireContent {
    fn from(content: TurnContent) -> Self {
        match content {
            TurnContent::Text(text) => WireContent::Text(text),
            TurnContent::ToolUse { id, name, input } => {
                WireContent::Blocks(vec![WireBlock::ToolUse { id, name, input }])
            }
            TurnContent::ToolResult {
                tool_use_id,
                content,
            } => WireContent::Blocks(vec![WireBlock::ToolResult {
                tool_use_id,
                content,
            }]),
        }
    }
}

impl TryFrom<WireContent> for TurnContent {
    type Error = String;

    fn try_from(wire: WireContent) -> Result<Self, Self::Error> {
        let mut blocks = match wire {
            WireContent::Text(text) => return Ok(TurnContent::Text(text)),
            WireContent::Blocks(blocks) => blocks,
        };
        if blocks.len() != 1 {
            return Err(format!(
                "expected exactly one content block, found {}",
                blocks.len()
            ));
        }
        Ok(match blocks.remove(0) {
            WireBlock::Text { text } => TurnContent::Text(text),
            WireBlock::ToolUse { id, name, input } => TurnContent::ToolUse { id, name, input },
            WireBlock::ToolResult {
                tool_use_id,
                content,
            } => TurnContent::ToolResult {
                tool_use_id,
                content,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_turn_wire_shape() {
        let json = serde_json::to_value(Turn::user("list files")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "user", "content": "list files"})
        );
    }

    #[test]
    fn tool_use_turn_wire_shape() {
        let turn = Turn::tool_use("toolu_1", "list_files", serde_json::json!({"path": "."}));
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"][0]["type"], "tool_use");
        assert_eq!(json["content"][0]["id"], "toolu_1");
        assert_eq!(json["content"][0]["input"]["path"], ".");
    }

    #[test]
    fn tool_result_turn_is_user_role() {
        let turn = Turn::tool_result("toolu_1", "a.txt");
        assert_eq!(turn.role, Role::User);
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["content"][0]["type"], "tool_result");
        assert_eq!(json["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(json["content"][0]["content"], "a.txt");
    }

    #[test]
    fn decodes_stored_tool_envelope() {
        let stored = r#"{"role": "assistant", "content": [{"type": "tool_use", "id": "toolu_9", "name": "read_file", "input": {"path": "main.py"}}]}"#;
        let turn = Turn::decode(stored).unwrap();
        assert_eq!(turn.role, Role::Assistant);
        match turn.content {
            TurnContent::ToolUse { id, name, input } => {
                assert_eq!(id, "toolu_9");
                assert_eq!(name, "read_file");
                assert_eq!(input["path"], "main.py");
            }
            other => panic!("expected tool use, got {other:?}"),
        }
    }

    #[test]
    fn single_text_block_decodes_as_text() {
        let turn =
            Turn::decode(r#"{"role": "assistant", "content": [{"type": "text", "text": "hi"}]}"#)
                .unwrap();
        assert_eq!(turn.text(), Some("hi"));
    }

    #[test]
    fn multi_block_payload_is_rejected() {
        let stored = r#"{"role": "user", "content": [
            {"type": "tool_result", "tool_use_id": "a", "content": "x"},
            {"type": "tool_result", "tool_use_id": "b", "content": "y"}
        ]}"#;
        let err = Turn::decode(stored).unwrap_err();
        assert!(err.to_string().contains("exactly one content block"));
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(Turn::decode(r#"{"role": "system", "content": "x"}"#).is_err());
        assert!("tool".parse::<Role>().is_err());
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
    }

    #[test]
    fn encode_decode_preserves_turn() {
        let turn = Turn::tool_use("t", "edit_file", serde_json::json!({"start_line": 3}));
        let back = Turn::decode(&turn.encode().unwrap()).unwrap();
        assert_eq!(back, turn);
    }
}
