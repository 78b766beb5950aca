mod lead;
mod property;
mod viewing;

pub use lead::*;
pub use property::*;
pub use viewing::*;

use serde::{Deserialize, Serialize};

/// Who performed a change on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Ai,
    Manual,
    System,
}

/// Summary of one automated action taken on a lead.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub action: String,
    pub success: bool,
    pub reasoning: String,
    pub outcome: String,
}

impl ActionResult {
    pub fn new(
        action: impl Into<String>,
        success: bool,
        reasoning: impl Into<String>,
        outcome: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            success,
            reasoning: reasoning.into(),
            outcome: outcome.into(),
        }
    }
}
