//! TGSI token streams.
//!
//! A TGSI program is a flat sequence of 32-bit tokens: a version word, a header recording the
//! size of the rest of the stream, a processor word naming the shader stage, and then a body
//! of declarations, immediates and instructions. Each body record is a head token followed by
//! the tokens it owns; optional parts are chained through `Extended` bits or announced by
//! presence bits in the token before them.
//!
//! - [`build`] encodes [`full`] records into a caller-provided buffer.
//! - [`parse`] decodes a buffer back into [`full`] records, rejecting malformed input.
//! - [`sanity`] checks that a well-formed stream is also a sensible program.
//! - [`dump`] prints a stream for humans.
//! - [`util`] has per-component accessors for source operands.

#![forbid(unsafe_code)]

pub mod build;
pub mod dump;
pub mod full;
pub mod opcode;
pub mod parse;
pub mod sanity;
pub mod token;
pub mod util;

/// Helpers for assembling token streams in tests.
///
/// Only available to this crate's own tests or with the `test-utils` feature.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::build::{CapacityError, TokenBuilder};
pub use crate::dump::{dump, dump_to, DumpError, DumpFlags};
pub use crate::full::{
    FullDeclaration, FullDimension, FullDstRegister, FullImmediate, FullInstruction,
    FullSrcRegister, FullToken, MAX_DST_REGISTERS, MAX_SRC_REGISTERS,
};
pub use crate::opcode::{Opcode, OpcodeInfo};
pub use crate::parse::{dup_tokens, num_tokens, parse_all, ParseContext, ParseError, ParseErrorKind};
pub use crate::sanity::{check, sanity_check, SanityIssue, SanityReport};
pub use crate::token::{ProcessorType, RegisterFile, WriteMask};
