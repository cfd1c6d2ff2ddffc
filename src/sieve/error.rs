use std::fmt;

/// A script could not be parsed.
///
/// `offset` is a byte offset into the original script text; `line` and
/// `column` are 1-based and computed from the same text so an editor can
/// highlight the span without re-scanning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected} at line {line}, column {column}, found {found}")]
pub struct SyntaxError {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub expected: String,
    pub found: Found,
}

/// What was sitting at the failing offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found {
    EndOfInput,
    Text(String),
}

impl fmt::Display for Found {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfInput => f.write_str("end of input"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl SyntaxError {
    pub(crate) fn at(source: &str, offset: usize, expected: impl Into<String>) -> Self {
        let (line, column) = line_column(source, offset);
        let rest = &source[offset..];
        let found = if rest.is_empty() {
            Found::EndOfInput
        } else {
            Found::Text(rest.lines().next().unwrap_or(rest).chars().take(16).collect())
        };
        Self {
            offset,
            line,
            column,
            expected: expected.into(),
            found,
        }
    }
}

fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    (line, before[line_start..].chars().count() + 1)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no rule `{name}` registered in category `{category}`")]
    UnknownRule { category: String, name: String },
    #[error("rule `{name}` is already registered in category `{category}`")]
    DuplicateRule { category: String, name: String },
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("script requires {actual:?}, expected {expected:?}")]
    Requirements {
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("node {0} not found")]
    NoSuchNode(u32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_on_second_line() {
        let src = "keep;\r\n  bogus;";
        let err = SyntaxError::at(src, 9, "command");
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 3);
        assert_eq!(err.found, Found::Text("bogus;".to_string()));
    }

    #[test]
    fn test_position_at_end() {
        let err = SyntaxError::at("removeflag", 10, "string list");
        assert_eq!((err.line, err.column), (1, 11));
        assert_eq!(err.found, Found::EndOfInput);
        assert_eq!(
            err.to_string(),
            "expected string list at line 1, column 11, found end of input"
        );
    }
}
