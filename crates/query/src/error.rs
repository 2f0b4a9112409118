use thiserror::Error;

/// A lexical failure: an invalid character at a known byte position.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("lex error at {line}:{column}: {message}")]
pub struct LexError {
    pub position: usize,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// A syntactic failure, including the depth-limit abort (spec §4.7,
/// `MAX_PARSER_DEPTH`) that protects against stack exhaustion on
/// adversarial inputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("parse error at {line}:{column}: {message}")]
pub struct ParseError {
    pub position: usize,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError { position: e.position, line: e.line, column: e.column, message: e.message }
    }
}
