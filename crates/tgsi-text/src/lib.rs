//! Text assembly front-end for TGSI token streams.
//!
//! The syntax is the one [`tgsi::dump`] prints:
//!
//! ```text
//! FRAG1.1
//! DCL IN[0], COLOR, LINEAR
//! DCL OUT[0], COLOR
//! MOV OUT[0], IN[0]
//! END
//! ```
//!
//! Any syntax error aborts the whole translation and is reported with its byte offset, line
//! and column.

#![forbid(unsafe_code)]

mod error;
mod scan;
mod translate;

pub use crate::error::{SyntaxError, SyntaxErrorKind, TranslateError};
pub use crate::translate::translate_into;

/// Default size of the token buffer used by [`translate`].
pub const DEFAULT_MAX_TOKENS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Capacity of the output buffer in words, prefix included.
    pub max_tokens: usize,
    /// Run [`tgsi::check`] over the result and reject programs with errors.
    pub sanity_check: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            sanity_check: true,
        }
    }
}

/// Translates assembly text into a new token stream.
pub fn translate(text: &str, options: &TranslateOptions) -> Result<Vec<u32>, TranslateError> {
    let mut tokens = vec![0u32; options.max_tokens];
    let len = translate_into(text, &mut tokens, options.sanity_check)?;
    tokens.truncate(len);
    Ok(tokens)
}
