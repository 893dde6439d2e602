use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::evidence::Clue;

/// Analysis mode. A clue is only discoverable while its own tool is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tool {
    #[default]
    Magnifier,
    UvLight,
    Scanner,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::Magnifier, Tool::UvLight, Tool::Scanner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Magnifier => "MAGNIFIER",
            Self::UvLight => "UV_LIGHT",
            Self::Scanner => "SCANNER",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the wire names plus lowercase/hyphenated spellings (`uv-light`, `uv`).
impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "magnifier" | "lens" => Ok(Self::Magnifier),
            "uv_light" | "uv" => Ok(Self::UvLight),
            "scanner" => Ok(Self::Scanner),
            other => Err(format!(
                "unknown tool '{other}' (expected MAGNIFIER, UV_LIGHT or SCANNER)"
            )),
        }
    }
}

/// Holds the active tool and decides which clues are candidates at all.
///
/// Any tool is reachable from any other; the only transition rule is that a
/// switch must not carry "hot" feedback from the previous tool's target.
/// `set_tool` reports whether the tool actually changed so the owner can
/// zero its proximity state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ToolGate {
    active: Tool,
}

impl ToolGate {
    pub fn new(active: Tool) -> Self {
        Self { active }
    }

    pub fn active(&self) -> Tool {
        self.active
    }

    /// Returns true when the active tool changed.
    pub fn set_tool(&mut self, tool: Tool) -> bool {
        let changed = self.active != tool;
        self.active = tool;
        changed
    }

    /// Hard gate: a clue for another tool is never a candidate.
    pub fn admits(&self, clue: &Clue) -> bool {
        clue.tool == self.active
    }
}
