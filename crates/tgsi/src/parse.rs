//! Decoding of TGSI token streams into [`FullToken`] records.
//!
//! [`ParseContext`] walks a stream one body token at a time. Unlike the builder, the parser
//! treats its input as untrusted: malformed streams are reported as [`ParseError`]s rather
//! than panicking.

use core::fmt;

use tracing::trace;

use crate::full::{
    FullDeclaration, FullDimension, FullDstRegister, FullImmediate, FullInstruction,
    FullSrcRegister, FullToken, MAX_DST_REGISTERS, MAX_SRC_REGISTERS,
};
use crate::token::{
    is_extended, token_type_raw, Declaration, DeclarationRange, DeclarationSemantic, Dimension,
    DstExtType, DstRegister, DstRegisterExtConcode, DstRegisterExtModulate, FieldError, Header,
    Immediate, ImmediateDataType, Instruction, InstructionExtLabel, InstructionExtNv,
    InstructionExtTexture, InstructionExtType, Processor, SrcExtType, SrcRegister,
    SrcRegisterExtMod, SrcRegisterExtSwz, TokenType, Version, MAJOR_VERSION,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Index of the word at which decoding failed.
    pub at_token: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The stream ends before the header says it should.
    Truncated,
    UnsupportedVersion { major: u8, minor: u8 },
    UnknownTokenType { ty: u32 },
    UnknownExtension { token: &'static str, ty: u32 },
    UnsupportedImmediateType { ty: u32 },
    InvalidField(FieldError),
    TooManyRegisters { dst: u8, src: u8 },
    UnsupportedAddressing(&'static str),
    /// The words consumed by a record disagree with its `Size` field.
    SizeMismatch { declared: usize, consumed: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TGSI parse error at token {}: ", self.at_token)?;
        match &self.kind {
            ParseErrorKind::Truncated => write!(f, "unexpected end of token stream"),
            ParseErrorKind::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported version {major}.{minor}")
            }
            ParseErrorKind::UnknownTokenType { ty } => write!(f, "unknown token type {ty}"),
            ParseErrorKind::UnknownExtension { token, ty } => {
                write!(f, "unknown {token} extension type {ty}")
            }
            ParseErrorKind::UnsupportedImmediateType { ty } => {
                write!(f, "unsupported immediate data type {ty}")
            }
            ParseErrorKind::InvalidField(err) => write!(f, "{err}"),
            ParseErrorKind::TooManyRegisters { dst, src } => write!(
                f,
                "instruction has {dst} destination and {src} source registers \
                 (limits {MAX_DST_REGISTERS} and {MAX_SRC_REGISTERS})"
            ),
            ParseErrorKind::UnsupportedAddressing(msg) => {
                write!(f, "unsupported addressing: {msg}")
            }
            ParseErrorKind::SizeMismatch { declared, consumed } => write!(
                f,
                "record declares {declared} tokens but {consumed} were consumed"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Processor token as seen by the parser; absent when `HeaderSize < 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullHeader {
    pub header: Header,
    pub processor: Processor,
}

/// Cursor over a token stream.
#[derive(Debug)]
pub struct ParseContext<'a> {
    tokens: &'a [u32],
    position: usize,
    /// Reads at or past this index are truncated: the slice length until the header is
    /// known, then the end the header records.
    limit: usize,
    full_version: Version,
    full_header: FullHeader,
    full_token: Option<FullToken>,
}

impl<'a> ParseContext<'a> {
    /// Reads the stream prefix and positions the cursor on the first body token.
    pub fn init(tokens: &'a [u32]) -> Result<Self, ParseError> {
        let mut ctx = Self {
            tokens,
            position: 0,
            limit: tokens.len(),
            full_version: Version { major: 0, minor: 0 },
            full_header: FullHeader {
                header: Header {
                    header_size: 0,
                    body_size: 0,
                },
                processor: Processor::default(),
            },
            full_token: None,
        };

        let version = Version::decode(ctx.next_token()?);
        if version.major > MAJOR_VERSION {
            return Err(ParseError {
                at_token: 0,
                kind: ParseErrorKind::UnsupportedVersion {
                    major: version.major,
                    minor: version.minor,
                },
            });
        }
        ctx.full_version = version;

        let header = Header::decode(ctx.next_token()?);
        ctx.full_header.header = header;
        ctx.limit = ctx.stream_end().min(tokens.len());
        if header.header_size >= 2 {
            let at = ctx.position;
            ctx.full_header.processor = Processor::decode(ctx.next_token()?).map_err(|err| {
                ParseError {
                    at_token: at,
                    kind: ParseErrorKind::InvalidField(err),
                }
            })?;
        }
        // Skip prefix tokens this parser does not know about.
        ctx.position = 1 + usize::from(header.header_size);
        Ok(ctx)
    }

    pub fn full_version(&self) -> Version {
        self.full_version
    }

    pub fn full_header(&self) -> FullHeader {
        self.full_header
    }

    /// Index of the next word to be read.
    pub fn position(&self) -> usize {
        self.position
    }

    /// One past the last body word, as recorded by the header.
    pub fn stream_end(&self) -> usize {
        1 + usize::from(self.full_header.header.header_size)
            + self.full_header.header.body_size as usize
    }

    pub fn end_of_tokens(&self) -> bool {
        self.position >= self.stream_end()
    }

    /// The record produced by the last [`parse_token`](Self::parse_token), if it succeeded.
    pub fn full_token(&self) -> Option<&FullToken> {
        self.full_token.as_ref()
    }

    fn error(&self, at_token: usize, kind: ParseErrorKind) -> ParseError {
        ParseError { at_token, kind }
    }

    fn next_token(&mut self) -> Result<u32, ParseError> {
        let word = self
            .tokens
            .get(self.position)
            .copied()
            .filter(|_| self.position < self.limit)
            .ok_or_else(|| self.error(self.position, ParseErrorKind::Truncated))?;
        self.position += 1;
        Ok(word)
    }

    fn next_decoded<T>(
        &mut self,
        decode: impl FnOnce(u32) -> Result<T, FieldError>,
    ) -> Result<T, ParseError> {
        let at = self.position;
        let word = self.next_token()?;
        decode(word).map_err(|err| self.error(at, ParseErrorKind::InvalidField(err)))
    }

    /// Decodes the next body token and everything that belongs to it.
    pub fn parse_token(&mut self) -> Result<&FullToken, ParseError> {
        self.full_token = None;
        let start = self.position;
        if self.end_of_tokens() {
            return Err(self.error(start, ParseErrorKind::Truncated));
        }
        let word = *self
            .tokens
            .get(start)
            .ok_or_else(|| self.error(start, ParseErrorKind::Truncated))?;

        let ty = token_type_raw(word);
        let (token, declared) = match TokenType::from_raw(ty) {
            Some(TokenType::Declaration) => {
                let decl = self.parse_declaration()?;
                let size = usize::from(decl.declaration.size);
                (FullToken::Declaration(decl), size)
            }
            Some(TokenType::Immediate) => {
                let imm = self.parse_immediate()?;
                let size = usize::from(imm.immediate.size);
                (FullToken::Immediate(imm), size)
            }
            Some(TokenType::Instruction) => {
                let insn = self.parse_instruction()?;
                let size = usize::from(insn.instruction.size);
                (FullToken::Instruction(insn), size)
            }
            None => return Err(self.error(start, ParseErrorKind::UnknownTokenType { ty })),
        };

        let consumed = self.position - start;
        if consumed != declared {
            return Err(self.error(start, ParseErrorKind::SizeMismatch { declared, consumed }));
        }
        trace!(at = start, words = consumed, kind = ?token.token_type(), "parsed token");
        Ok(self.full_token.insert(token))
    }

    fn parse_declaration(&mut self) -> Result<FullDeclaration, ParseError> {
        let declaration = self.next_decoded(Declaration::decode)?;
        let range = DeclarationRange::decode(self.next_token()?);
        let semantic = if declaration.semantic {
            Some(self.next_decoded(DeclarationSemantic::decode)?)
        } else {
            None
        };
        Ok(FullDeclaration {
            declaration,
            range,
            semantic,
        })
    }

    fn parse_immediate(&mut self) -> Result<FullImmediate, ParseError> {
        let at = self.position;
        let word = self.next_token()?;
        let ty = Immediate::data_type_raw(word);
        let immediate = match ImmediateDataType::from_raw(ty) {
            Some(_) => Immediate::decode(word)
                .map_err(|err| self.error(at, ParseErrorKind::InvalidField(err)))?,
            None => return Err(self.error(at, ParseErrorKind::UnsupportedImmediateType { ty })),
        };
        let count = usize::from(immediate.size).saturating_sub(1);
        let mut data = Vec::with_capacity(count);
        for _ in 0..count {
            data.push(f32::from_bits(self.next_token()?));
        }
        Ok(FullImmediate { immediate, data })
    }

    fn parse_instruction(&mut self) -> Result<FullInstruction, ParseError> {
        let start = self.position;
        let head = self.next_token()?;
        let instruction =
            Instruction::decode(head).map_err(|err| self.error(start, ParseErrorKind::InvalidField(err)))?;
        if usize::from(instruction.num_dst_regs) > MAX_DST_REGISTERS
            || usize::from(instruction.num_src_regs) > MAX_SRC_REGISTERS
        {
            return Err(self.error(
                start,
                ParseErrorKind::TooManyRegisters {
                    dst: instruction.num_dst_regs,
                    src: instruction.num_src_regs,
                },
            ));
        }

        let mut full = FullInstruction {
            instruction,
            ..Default::default()
        };

        let mut extended = is_extended(head);
        while extended {
            let at = self.position;
            let word = self.next_token()?;
            extended = is_extended(word);
            let ty = token_type_raw(word);
            match InstructionExtType::from_raw(ty) {
                Some(InstructionExtType::Nv) => {
                    full.ext_nv = InstructionExtNv::decode(word)
                        .map_err(|err| self.error(at, ParseErrorKind::InvalidField(err)))?;
                }
                Some(InstructionExtType::Label) => {
                    full.ext_label = InstructionExtLabel::decode(word);
                }
                Some(InstructionExtType::Texture) => {
                    full.ext_texture = InstructionExtTexture::decode(word)
                        .map_err(|err| self.error(at, ParseErrorKind::InvalidField(err)))?;
                }
                None => {
                    return Err(self.error(
                        at,
                        ParseErrorKind::UnknownExtension {
                            token: "instruction",
                            ty,
                        },
                    ))
                }
            }
        }

        for _ in 0..instruction.num_dst_regs {
            let dst = self.parse_dst_register()?;
            full.dst.push(dst);
        }
        for _ in 0..instruction.num_src_regs {
            let src = self.parse_src_register()?;
            full.src.push(src);
        }
        Ok(full)
    }

    fn parse_dst_register(&mut self) -> Result<FullDstRegister, ParseError> {
        let at = self.position;
        let head = self.next_token()?;
        let register =
            DstRegister::decode(head).map_err(|err| self.error(at, ParseErrorKind::InvalidField(err)))?;
        if register.indirect || register.dimension {
            return Err(self.error(
                at,
                ParseErrorKind::UnsupportedAddressing("indirect or multi-dimensional destination"),
            ));
        }

        let mut full = FullDstRegister {
            register,
            ..Default::default()
        };
        let mut extended = is_extended(head);
        while extended {
            let at = self.position;
            let word = self.next_token()?;
            extended = is_extended(word);
            let ty = token_type_raw(word);
            match DstExtType::from_raw(ty) {
                Some(DstExtType::Condcode) => {
                    full.ext_concode = DstRegisterExtConcode::decode(word)
                        .map_err(|err| self.error(at, ParseErrorKind::InvalidField(err)))?;
                }
                Some(DstExtType::Modulate) => {
                    full.ext_modulate = DstRegisterExtModulate::decode(word)
                        .map_err(|err| self.error(at, ParseErrorKind::InvalidField(err)))?;
                }
                None => {
                    return Err(self.error(
                        at,
                        ParseErrorKind::UnknownExtension {
                            token: "destination register",
                            ty,
                        },
                    ))
                }
            }
        }
        Ok(full)
    }

    /// An address register used for indirection. It may not itself be indirect or
    /// multi-dimensional.
    fn parse_address_register(&mut self) -> Result<SrcRegister, ParseError> {
        let at = self.position;
        let register = self.next_decoded(SrcRegister::decode)?;
        if register.indirect || register.dimension {
            return Err(self.error(
                at,
                ParseErrorKind::UnsupportedAddressing("nested indirect addressing"),
            ));
        }
        Ok(register)
    }

    fn parse_src_register(&mut self) -> Result<FullSrcRegister, ParseError> {
        let at = self.position;
        let head = self.next_token()?;
        let register =
            SrcRegister::decode(head).map_err(|err| self.error(at, ParseErrorKind::InvalidField(err)))?;

        let mut full = FullSrcRegister {
            register,
            ..Default::default()
        };
        let mut extended = is_extended(head);
        while extended {
            let at = self.position;
            let word = self.next_token()?;
            extended = is_extended(word);
            let ty = token_type_raw(word);
            match SrcExtType::from_raw(ty) {
                Some(SrcExtType::Swz) => {
                    full.ext_swz = SrcRegisterExtSwz::decode(word)
                        .map_err(|err| self.error(at, ParseErrorKind::InvalidField(err)))?;
                }
                Some(SrcExtType::Mod) => {
                    full.ext_mod = SrcRegisterExtMod::decode(word);
                }
                None => {
                    return Err(self.error(
                        at,
                        ParseErrorKind::UnknownExtension {
                            token: "source register",
                            ty,
                        },
                    ))
                }
            }
        }

        if register.indirect {
            full.indirect = Some(self.parse_address_register()?);
        }

        if register.dimension {
            let at = self.position;
            let dimension = Dimension::decode(self.next_token()?);
            if dimension.dimension {
                return Err(self.error(
                    at,
                    ParseErrorKind::UnsupportedAddressing("nested dimension"),
                ));
            }
            let indirect = if dimension.indirect {
                Some(self.parse_address_register()?)
            } else {
                None
            };
            full.dimension = Some(FullDimension {
                dimension,
                indirect,
            });
        }
        Ok(full)
    }
}

/// Parses every body token of a stream.
pub fn parse_all(tokens: &[u32]) -> Result<Vec<FullToken>, ParseError> {
    let mut ctx = ParseContext::init(tokens)?;
    let mut out = Vec::new();
    while !ctx.end_of_tokens() {
        out.push(ctx.parse_token()?.clone());
    }
    Ok(out)
}

/// Total number of words in the stream, as recorded by its header.
pub fn num_tokens(tokens: &[u32]) -> Result<usize, ParseError> {
    let ctx = ParseContext::init(tokens)?;
    let total = ctx.stream_end();
    if tokens.len() < total {
        return Err(ParseError {
            at_token: tokens.len(),
            kind: ParseErrorKind::Truncated,
        });
    }
    Ok(total)
}

/// Copies exactly the words that make up the stream.
pub fn dup_tokens(tokens: &[u32]) -> Result<Vec<u32>, ParseError> {
    let n = num_tokens(tokens)?;
    Ok(tokens[..n].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{build_header, build_processor, build_version};
    use crate::token::{ProcessorType, RegisterFile, SrcRegister};

    fn prefix(body: &[u32]) -> Vec<u32> {
        let mut header = build_header();
        let processor = build_processor(ProcessorType::Vertex, &mut header);
        header.body_size = body.len() as u32;
        let mut out = vec![build_version().encode(), header.encode(), processor.encode()];
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn empty_program_has_no_tokens() {
        let tokens = prefix(&[]);
        let ctx = ParseContext::init(&tokens).unwrap();
        assert!(ctx.end_of_tokens());
        assert_eq!(ctx.full_header().processor.processor, ProcessorType::Vertex);
        assert_eq!(num_tokens(&tokens).unwrap(), 3);
    }

    #[test]
    fn short_header_defaults_to_fragment() {
        let header = Header {
            header_size: 1,
            body_size: 0,
        };
        let tokens = [build_version().encode(), header.encode()];
        let ctx = ParseContext::init(&tokens).unwrap();
        assert_eq!(ctx.full_header().processor.processor, ProcessorType::Fragment);
        assert_eq!(ctx.position(), 2);
    }

    #[test]
    fn newer_major_version_is_rejected() {
        let version = Version { major: 2, minor: 0 };
        let err = ParseContext::init(&[version.encode(), 0]).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UnsupportedVersion { major: 2, minor: 0 }
        );
    }

    #[test]
    fn body_past_end_of_slice_is_truncated() {
        let mut tokens = prefix(&[0]);
        tokens.pop();
        let mut ctx = ParseContext::init(&tokens).unwrap();
        assert_eq!(ctx.parse_token().unwrap_err().kind, ParseErrorKind::Truncated);
        assert_eq!(num_tokens(&tokens).unwrap_err().kind, ParseErrorKind::Truncated);
    }

    #[test]
    fn record_past_end_recorded_in_header_is_truncated() {
        let header = Header {
            header_size: 1,
            body_size: 1,
        };
        let decl = Declaration {
            size: 2,
            file: RegisterFile::Temporary,
            ..Default::default()
        };
        let tokens = [build_version().encode(), header.encode(), decl.encode(), 0];
        let mut ctx = ParseContext::init(&tokens).unwrap();
        assert_eq!(ctx.stream_end(), 3);
        let err = ctx.parse_token().unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::Truncated);
        assert_eq!(err.at_token, 3);
        assert!(ctx.position() <= ctx.stream_end());
    }

    #[test]
    fn failed_parse_clears_the_previous_record() {
        let decl = Declaration {
            size: 2,
            file: RegisterFile::Temporary,
            ..Default::default()
        };
        let tokens = prefix(&[decl.encode(), 0, 0xF]);
        let mut ctx = ParseContext::init(&tokens).unwrap();
        ctx.parse_token().unwrap();
        assert!(ctx.full_token().is_some());
        ctx.parse_token().unwrap_err();
        assert!(ctx.full_token().is_none());
    }

    #[test]
    fn unknown_token_type_is_reported() {
        let tokens = prefix(&[0xF]);
        let mut ctx = ParseContext::init(&tokens).unwrap();
        let err = ctx.parse_token().unwrap_err();
        assert_eq!(err.at_token, 3);
        assert_eq!(err.kind, ParseErrorKind::UnknownTokenType { ty: 0xF });
    }

    #[test]
    fn size_field_must_match_consumed_words() {
        let decl = Declaration {
            size: 3,
            file: RegisterFile::Temporary,
            ..Default::default()
        };
        let tokens = prefix(&[decl.encode(), 0, 0]);
        let mut ctx = ParseContext::init(&tokens).unwrap();
        assert_eq!(
            ctx.parse_token().unwrap_err().kind,
            ParseErrorKind::SizeMismatch {
                declared: 3,
                consumed: 2
            }
        );
    }

    #[test]
    fn nested_indirect_is_unsupported() {
        let insn = Instruction {
            size: 4,
            num_dst_regs: 0,
            num_src_regs: 1,
            ..Default::default()
        };
        let src = SrcRegister {
            file: RegisterFile::Constant,
            indirect: true,
            ..Default::default()
        };
        let address = SrcRegister {
            file: RegisterFile::Address,
            indirect: true,
            ..Default::default()
        };
        let tokens = prefix(&[insn.encode(), src.encode(), address.encode(), 0]);
        let mut ctx = ParseContext::init(&tokens).unwrap();
        assert!(matches!(
            ctx.parse_token().unwrap_err().kind,
            ParseErrorKind::UnsupportedAddressing(_)
        ));
    }

    #[test]
    fn dup_tokens_drops_trailing_words() {
        let mut tokens = prefix(&[]);
        tokens.extend([1, 2, 3]);
        let copy = dup_tokens(&tokens).unwrap();
        assert_eq!(copy.len(), 3);
        assert_eq!(copy[..], tokens[..3]);
    }
}
