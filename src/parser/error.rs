use crate::{
    error::ErrorDisplay,
    lexer::{error::LexerError, tokens::Token},
    source::CodeArea,
};

#[derive(Debug, Clone)]
pub enum ParserError {
    LexingError {
        error: LexerError,
        area: CodeArea,
    },
    UnexpectedToken {
        expected: &'static str,
        found: Token,
        area: CodeArea,
    },
    InvalidLiteral {
        literal: String,
        area: CodeArea,
    },
    InvalidAssignTarget {
        area: CodeArea,
    },
}

impl ParserError {
    pub fn area(&self) -> &CodeArea {
        match self {
            ParserError::LexingError { area, .. }
            | ParserError::UnexpectedToken { area, .. }
            | ParserError::InvalidLiteral { area, .. }
            | ParserError::InvalidAssignTarget { area } => area,
        }
    }

    pub fn msg(&self) -> String {
        match self {
            ParserError::LexingError { error, .. } => error.msg(),
            ParserError::UnexpectedToken {
                expected, found, ..
            } => format!("Expected {}, found {}", expected, found.to_str()),
            ParserError::InvalidLiteral { literal, .. } => {
                format!("Literal `{}` is out of range", literal)
            }
            ParserError::InvalidAssignTarget { .. } => "Cannot assign to this expression".into(),
        }
    }
}

impl From<ParserError> for ErrorDisplay {
    fn from(value: ParserError) -> Self {
        let typ = match value {
            ParserError::LexingError { .. } => "Lexing Error",
            _ => "Parsing Error",
        };
        ErrorDisplay {
            typ,
            msg: value.msg(),
            area: value.area().clone(),
        }
    }
}
