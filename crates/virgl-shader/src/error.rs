use thiserror::Error;

/// Why a TGSI program could not be turned into GLSL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("line {line}: {msg}")]
    Parse { line: usize, msg: String },
    #[error("too many {what}, max is {max}")]
    Overflow { what: &'static str, max: usize },
    #[error("{0} register is not declared")]
    Undeclared(String),
    #[error("unsupported {0}")]
    Unsupported(String),
    #[error("{opcode} expects {expected} source operand(s)")]
    MissingOperand { opcode: &'static str, expected: usize },
    #[error("program has no END instruction")]
    MissingEnd,
}

impl TranslateError {
    pub(crate) fn parse(line: usize, msg: impl Into<String>) -> Self {
        TranslateError::Parse {
            line,
            msg: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TranslateError>;
