pub mod paths;

use serde::{Deserialize, Serialize};

/// Line break written into text the engine generates itself. Parsed text
/// keeps whatever it had.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Crlf,
    Lf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crlf => "\r\n",
            Self::Lf => "\n",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Extension families left out of the grammar, e.g. `"body"`.
    pub disabled_extensions: Vec<String>,
    pub line_ending: LineEnding,
}

impl EngineConfig {
    pub fn is_enabled(&self, extension: &str) -> bool {
        !self
            .disabled_extensions
            .iter()
            .any(|d| d.eq_ignore_ascii_case(extension))
    }
}
