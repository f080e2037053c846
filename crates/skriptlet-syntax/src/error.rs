use thiserror::Error;

/// Renders a caret diagnostic pointing at byte `index` of a single-line `source`.
pub fn format_error_with_source(error_msg: &str, source: &str, index: usize) -> String {
    let index = index.min(source.len());
    let col = source
        .get(..index)
        .map(|prefix| prefix.chars().count())
        .unwrap_or(index);

    let mut output = String::new();
    output.push_str(&format!("  --> pattern, column {}\n", col + 1));
    output.push_str("   |\n");
    output.push_str(&format!("   | {}\n", source));
    output.push_str(&format!("   | {}^ {}\n", " ".repeat(col), error_msg));
    output.push_str("   |");

    output
}

/// Why a pattern string could not be compiled.
///
/// Every variant carries the byte offset into the pattern at which the problem was
/// detected, so [`CompileError::render`] can point at it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("unmatched '{open}' at index {index}")]
    UnmatchedOpening { open: char, index: usize },

    #[error("unmatched closing '{close}' at index {index}")]
    UnmatchedClosing { close: char, index: usize },

    #[error("unmatched '%' at index {index}")]
    UnmatchedPercent { index: usize },

    #[error("invalid placeholder '%{spec}%' at index {index}")]
    InvalidPlaceholder { spec: String, index: usize },

    #[error("unknown type '{name}' at index {index}")]
    UnknownType { name: String, index: usize },

    #[error("invalid regex <{regex}> at index {index}: {message}")]
    InvalidRegex {
        regex: String,
        index: usize,
        message: String,
    },

    #[error("parse mark '{mark}' at index {index} does not fit in 32 bits")]
    InvalidMark { mark: String, index: usize },

    #[error("trailing escape character at index {index}")]
    TrailingEscape { index: usize },
}

impl CompileError {
    pub fn index(&self) -> usize {
        match self {
            CompileError::UnmatchedOpening { index, .. }
            | CompileError::UnmatchedClosing { index, .. }
            | CompileError::UnmatchedPercent { index }
            | CompileError::InvalidPlaceholder { index, .. }
            | CompileError::UnknownType { index, .. }
            | CompileError::InvalidRegex { index, .. }
            | CompileError::InvalidMark { index, .. }
            | CompileError::TrailingEscape { index } => *index,
        }
    }

    /// Formats this error against the pattern it came from.
    pub fn render(&self, pattern: &str) -> String {
        format_error_with_source(&self.to_string(), pattern, self.index())
    }
}
