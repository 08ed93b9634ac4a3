use thiserror::Error;

use tgsi::{CapacityError, ParseError, SanityReport};

/// What the translator found wrong at a given source position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    #[error("unknown header, expected `FRAG1.1', `VERT1.1' or `GEOM1.1'")]
    UnknownHeader,
    /// Statements must be separated by white space.
    #[error("expected white space")]
    MissingWhiteSpace,
    #[error("expected `DCL', `IMM' or a label")]
    ExpectedStatement,
    #[error("unknown opcode")]
    UnknownOpcode,
    #[error("unknown register file")]
    UnknownRegisterFile,
    /// A specific token was required; the payload names it, e.g. "`]'".
    #[error("expected {0}")]
    Expected(&'static str),
    #[error("writemask expected")]
    WritemaskExpected,
    #[error("index {value} is out of range, the maximum is {max}")]
    IndexOutOfRange { value: i64, max: i64 },
    #[error("last register index {last} is less than the first index {first}")]
    ReversedRange { first: u64, last: u64 },
    #[error("extended swizzle cannot be applied to a negated register")]
    NegatedExtSwizzle,
}

/// A syntax error with its position in the source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {kind}")]
pub struct SyntaxError {
    /// Byte offset into the source.
    pub offset: usize,
    /// 1-based.
    pub line: usize,
    /// 1-based, in bytes.
    pub column: usize,
    pub kind: SyntaxErrorKind,
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("program does not fit the token buffer")]
    OutOfTokens(#[source] CapacityError),
    /// The translated stream failed to parse back. Indicates a bug in the translator.
    #[error("translated tokens are malformed")]
    Malformed(#[source] ParseError),
    #[error("sanity check failed: {0}")]
    Sanity(SanityReport),
}

impl From<CapacityError> for TranslateError {
    fn from(err: CapacityError) -> Self {
        TranslateError::OutOfTokens(err)
    }
}

impl TranslateError {
    /// The syntax error, if translation stopped on one.
    pub fn syntax(&self) -> Option<&SyntaxError> {
        match self {
            TranslateError::Syntax(err) => Some(err),
            _ => None,
        }
    }
}
