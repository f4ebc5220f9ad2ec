use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Who authored a turn in the conversation
pub enum Role {
    User,
    Assistant,
    /// Results of tool calls, fed back to the model
    Tool,
}
