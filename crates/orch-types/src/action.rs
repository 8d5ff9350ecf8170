use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of actions a validated intent may request (spec §4.4
/// step 4). Anything outside this set fails schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Look something up.
    Search,
    /// Evaluate a deterministic expression.
    Calculate,
    /// Condense the given content.
    Summarize,
    /// Translate content between languages.
    Translate,
}

impl Action {
    /// All members, in the order spec §4.4 lists them.
    pub const ALL: [Action; 4] = [
        Action::Search,
        Action::Calculate,
        Action::Summarize,
        Action::Translate,
    ];

    /// Canonical lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Search => "search",
            Action::Calculate => "calculate",
            Action::Summarize => "summarize",
            Action::Translate => "translate",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a member of the closed action set.
#[derive(Debug, thiserror::Error)]
#[error("unknown action {0:?}, expected one of search|calculate|summarize|translate")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search" => Ok(Action::Search),
            "calculate" => Ok(Action::Calculate),
            "summarize" => Ok(Action::Summarize),
            "translate" => Ok(Action::Translate),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}
