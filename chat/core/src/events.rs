//! Surface Intents
//!
//! What a presentation surface can ask the session to do. Surfaces forward
//! user actions as intents and re-render from snapshots; they never decide
//! what an action means.

use serde::{Deserialize, Serialize};

/// User intent forwarded by a surface
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionIntent {
    /// Open a session with an agent
    Start {
        /// Agent ID
        agent_id: String,
        /// Agent display name
        agent_name: String,
    },
    /// The input box changed
    SetDraft {
        /// New draft text
        text: String,
    },
    /// Send a message
    Submit {
        /// Message text
        text: String,
    },
    /// Send whatever is in the draft
    SubmitDraft,
    /// Show or hide the log inspector
    ToggleLogView,
    /// Close the session
    Close,
}

impl SessionIntent {
    /// Parse a line typed into a terminal surface
    ///
    /// `/quit` and `/close` close the session, `/logs` toggles the log
    /// inspector, anything else is submitted as-is.
    #[must_use]
    pub fn from_input_line(line: &str) -> Self {
        match line.trim() {
            "/quit" | "/close" => Self::Close,
            "/logs" => Self::ToggleLogView,
            _ => Self::Submit {
                text: line.to_string(),
            },
        }
    }
}
