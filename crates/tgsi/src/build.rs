//! Encoding of TGSI token streams.
//!
//! The `build_*` functions produce single tokens and keep the running sizes in sync: every
//! token added to a declaration, immediate or instruction grows that record's `Size` and the
//! stream header's `BodySize`. Extension builders additionally set the `Extended` bit on the
//! token that precedes them in the chain.
//!
//! The `build_full_*` functions emit a whole record into a caller-provided slice and return
//! the number of words written, or `0` if the slice is too small. They never write partially.
//! [`TokenBuilder`] wraps them into a complete stream with its prefix.
//!
//! Violating a structural limit (for example more than [`MAX_SRC_REGISTERS`] sources) is a
//! programming error and panics.

use thiserror::Error;
use tracing::trace;

use crate::full::{
    FullDeclaration, FullImmediate, FullInstruction, FullSrcRegister, MAX_DST_REGISTERS,
    MAX_SRC_REGISTERS,
};
use crate::opcode::Opcode;
use crate::token::{
    set_extended, CondCode, Declaration, DeclarationRange, DeclarationSemantic, Dimension,
    DstRegister, DstRegisterExtConcode, DstRegisterExtModulate, ExtSwizzle, Header, Immediate,
    ImmediateDataType, Instruction, InstructionExtLabel, InstructionExtNv, InstructionExtTexture,
    Interpolate, Modulate, Processor, ProcessorType, RegisterFile, Saturate, Semantic, SrcRegister,
    SrcRegisterExtMod, SrcRegisterExtSwz, Swizzle, Texture, Version, WriteMask, MAJOR_VERSION,
    MAX_BODY_SIZE, MAX_LABEL, MINOR_VERSION,
};

/// Words in the stream prefix: version, header and processor.
pub const PREFIX_TOKENS: usize = 3;

/// The destination buffer cannot hold the next record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("token buffer too small: need {needed} more words, {available} available")]
pub struct CapacityError {
    pub needed: usize,
    pub available: usize,
}

fn check_index(index: i32) -> i16 {
    assert!(
        (i32::from(i16::MIN)..=i32::from(i16::MAX)).contains(&index),
        "register index {index} out of range"
    );
    index as i16
}

fn header_headersize_grow(header: &mut Header) {
    assert!(header.header_size < 0xFF, "header size overflow");
    assert!(
        header.body_size == 0,
        "prefix tokens must precede every body token"
    );
    header.header_size += 1;
}

fn header_bodysize_grow(header: &mut Header) {
    assert!(header.body_size < MAX_BODY_SIZE, "body size overflow");
    header.body_size += 1;
}

fn record_grow(size: &mut u8, header: &mut Header) {
    assert!(*size < 0xFF, "record size overflow");
    *size += 1;
    header_bodysize_grow(header);
}

// ---- Stream prefix ----

pub fn build_version() -> Version {
    Version {
        major: MAJOR_VERSION,
        minor: MINOR_VERSION,
    }
}

pub fn build_header() -> Header {
    Header {
        header_size: 1,
        body_size: 0,
    }
}

pub fn build_processor(processor: ProcessorType, header: &mut Header) -> Processor {
    header_headersize_grow(header);
    Processor { processor }
}

// ---- Declarations ----

pub fn build_declaration(
    file: RegisterFile,
    usage_mask: WriteMask,
    interpolate: Interpolate,
    semantic: bool,
    header: &mut Header,
) -> Declaration {
    assert!(
        Interpolate::SUPPORTED.contains(&interpolate),
        "interpolate mode {interpolate} cannot be built"
    );
    header_bodysize_grow(header);
    Declaration {
        size: 1,
        file,
        usage_mask,
        interpolate,
        semantic,
    }
}

pub fn build_declaration_range(
    first: u32,
    last: u32,
    declaration: &mut Declaration,
    header: &mut Header,
) -> DeclarationRange {
    assert!(last >= first, "declaration range {first}..{last} is reversed");
    assert!(last <= 0xFFFF, "declaration range end {last} out of range");
    record_grow(&mut declaration.size, header);
    DeclarationRange {
        first: first as u16,
        last: last as u16,
    }
}

pub fn build_declaration_semantic(
    name: Semantic,
    index: u16,
    declaration: &mut Declaration,
    header: &mut Header,
) -> DeclarationSemantic {
    record_grow(&mut declaration.size, header);
    DeclarationSemantic { name, index }
}

pub fn build_full_declaration(
    full: &FullDeclaration,
    out: &mut [u32],
    header: &mut Header,
) -> usize {
    let needed = full.token_count();
    if out.len() < needed {
        return 0;
    }
    assert_eq!(
        full.declaration.semantic,
        full.semantic.is_some(),
        "semantic bit disagrees with semantic token"
    );

    let mut declaration = build_declaration(
        full.declaration.file,
        full.declaration.usage_mask,
        full.declaration.interpolate,
        full.declaration.semantic,
        header,
    );
    let range = build_declaration_range(
        full.range.first.into(),
        full.range.last.into(),
        &mut declaration,
        header,
    );
    out[1] = range.encode();
    if let Some(semantic) = full.semantic {
        out[2] = build_declaration_semantic(semantic.name, semantic.index, &mut declaration, header)
            .encode();
    }
    out[0] = declaration.encode();
    debug_assert_eq!(usize::from(declaration.size), needed);
    needed
}

// ---- Immediates ----

pub fn build_immediate(header: &mut Header) -> Immediate {
    header_bodysize_grow(header);
    Immediate {
        size: 1,
        data_type: ImmediateDataType::Float32,
    }
}

pub fn build_immediate_float32(value: f32, immediate: &mut Immediate, header: &mut Header) -> u32 {
    record_grow(&mut immediate.size, header);
    value.to_bits()
}

pub fn build_full_immediate(full: &FullImmediate, out: &mut [u32], header: &mut Header) -> usize {
    let needed = full.token_count();
    if out.len() < needed {
        return 0;
    }

    let mut immediate = build_immediate(header);
    match full.immediate.data_type {
        ImmediateDataType::Float32 => {
            for (slot, &value) in out[1..needed].iter_mut().zip(&full.data) {
                *slot = build_immediate_float32(value, &mut immediate, header);
            }
        }
    }
    out[0] = immediate.encode();
    needed
}

// ---- Instructions ----

pub fn build_instruction(
    opcode: Opcode,
    saturate: Saturate,
    num_dst_regs: usize,
    num_src_regs: usize,
    header: &mut Header,
) -> Instruction {
    assert!(
        num_dst_regs <= MAX_DST_REGISTERS,
        "{opcode}: {num_dst_regs} destination registers"
    );
    assert!(
        num_src_regs <= MAX_SRC_REGISTERS,
        "{opcode}: {num_src_regs} source registers"
    );
    header_bodysize_grow(header);
    Instruction {
        size: 1,
        opcode,
        saturate,
        num_dst_regs: num_dst_regs as u8,
        num_src_regs: num_src_regs as u8,
    }
}

pub fn build_instruction_ext_nv(
    ext: &InstructionExtNv,
    prev_token: &mut u32,
    instruction: &mut Instruction,
    header: &mut Header,
) -> u32 {
    assert!(ext.cond_dst_index <= 0xF && ext.cond_flow_index <= 0xF);
    set_extended(prev_token);
    record_grow(&mut instruction.size, header);
    ext.encode()
}

pub fn build_instruction_ext_label(
    label: u32,
    prev_token: &mut u32,
    instruction: &mut Instruction,
    header: &mut Header,
) -> u32 {
    assert!(label <= MAX_LABEL, "label {label} out of range");
    set_extended(prev_token);
    record_grow(&mut instruction.size, header);
    InstructionExtLabel { label }.encode()
}

pub fn build_instruction_ext_texture(
    texture: Texture,
    prev_token: &mut u32,
    instruction: &mut Instruction,
    header: &mut Header,
) -> u32 {
    set_extended(prev_token);
    record_grow(&mut instruction.size, header);
    InstructionExtTexture { texture }.encode()
}

#[allow(clippy::too_many_arguments)]
pub fn build_src_register(
    file: RegisterFile,
    swizzle: [Swizzle; 4],
    negate: bool,
    indirect: bool,
    dimension: bool,
    index: i32,
    instruction: &mut Instruction,
    header: &mut Header,
) -> SrcRegister {
    let index = check_index(index);
    record_grow(&mut instruction.size, header);
    SrcRegister {
        file,
        swizzle,
        negate,
        indirect,
        dimension,
        index,
    }
}

pub fn build_src_register_ext_swz(
    ext_swizzle: [ExtSwizzle; 4],
    negate: [bool; 4],
    prev_token: &mut u32,
    instruction: &mut Instruction,
    header: &mut Header,
) -> u32 {
    set_extended(prev_token);
    record_grow(&mut instruction.size, header);
    SrcRegisterExtSwz {
        ext_swizzle,
        negate,
    }
    .encode()
}

pub fn build_src_register_ext_mod(
    ext: &SrcRegisterExtMod,
    prev_token: &mut u32,
    instruction: &mut Instruction,
    header: &mut Header,
) -> u32 {
    set_extended(prev_token);
    record_grow(&mut instruction.size, header);
    ext.encode()
}

pub fn build_dimension(
    indirect: bool,
    index: i32,
    instruction: &mut Instruction,
    header: &mut Header,
) -> Dimension {
    let index = check_index(index);
    record_grow(&mut instruction.size, header);
    Dimension {
        indirect,
        dimension: false,
        index,
    }
}

pub fn build_dst_register(
    file: RegisterFile,
    write_mask: WriteMask,
    index: i32,
    instruction: &mut Instruction,
    header: &mut Header,
) -> DstRegister {
    let index = check_index(index);
    record_grow(&mut instruction.size, header);
    DstRegister {
        file,
        write_mask,
        indirect: false,
        dimension: false,
        index,
    }
}

pub fn build_dst_register_ext_concode(
    cond_mask: CondCode,
    cond_swizzle: [Swizzle; 4],
    cond_src_index: u8,
    prev_token: &mut u32,
    instruction: &mut Instruction,
    header: &mut Header,
) -> u32 {
    assert!(cond_src_index <= 0xF, "condition source index {cond_src_index} out of range");
    set_extended(prev_token);
    record_grow(&mut instruction.size, header);
    DstRegisterExtConcode {
        cond_mask,
        cond_swizzle,
        cond_src_index,
    }
    .encode()
}

pub fn build_dst_register_ext_modulate(
    modulate: Modulate,
    prev_token: &mut u32,
    instruction: &mut Instruction,
    header: &mut Header,
) -> u32 {
    set_extended(prev_token);
    record_grow(&mut instruction.size, header);
    DstRegisterExtModulate { modulate }.encode()
}

/// Sequential writer over a slice already known to be large enough.
struct Emitter<'a> {
    out: &'a mut [u32],
    pos: usize,
}

impl Emitter<'_> {
    fn push(&mut self, word: u32) -> usize {
        self.out[self.pos] = word;
        self.pos += 1;
        self.pos - 1
    }

    fn word(&mut self, at: usize) -> &mut u32 {
        &mut self.out[at]
    }
}

fn emit_address_register(
    reg: &SrcRegister,
    e: &mut Emitter<'_>,
    instruction: &mut Instruction,
    header: &mut Header,
) {
    assert!(
        !reg.indirect && !reg.dimension,
        "address registers cannot be indirect or multi-dimensional"
    );
    let reg = build_src_register(
        reg.file,
        reg.swizzle,
        reg.negate,
        false,
        false,
        reg.index.into(),
        instruction,
        header,
    );
    e.push(reg.encode());
}

fn emit_src(
    src: &FullSrcRegister,
    e: &mut Emitter<'_>,
    instruction: &mut Instruction,
    header: &mut Header,
) {
    assert_eq!(
        src.register.indirect,
        src.indirect.is_some(),
        "indirect bit disagrees with address register"
    );
    assert_eq!(
        src.register.dimension,
        src.dimension.is_some(),
        "dimension bit disagrees with dimension token"
    );

    let base = build_src_register(
        src.register.file,
        src.register.swizzle,
        src.register.negate,
        src.register.indirect,
        src.register.dimension,
        src.register.index.into(),
        instruction,
        header,
    );
    let mut prev = e.push(base.encode());

    if src.ext_swz != SrcRegisterExtSwz::default() {
        let word = build_src_register_ext_swz(
            src.ext_swz.ext_swizzle,
            src.ext_swz.negate,
            e.word(prev),
            instruction,
            header,
        );
        prev = e.push(word);
    }
    if src.ext_mod != SrcRegisterExtMod::default() {
        let word = build_src_register_ext_mod(&src.ext_mod, e.word(prev), instruction, header);
        e.push(word);
    }

    if let Some(address) = &src.indirect {
        emit_address_register(address, e, instruction, header);
    }

    if let Some(dim) = &src.dimension {
        assert!(
            !dim.dimension.dimension,
            "nested dimensions are not supported"
        );
        assert_eq!(
            dim.dimension.indirect,
            dim.indirect.is_some(),
            "dimension indirect bit disagrees with address register"
        );
        let dimension = build_dimension(
            dim.dimension.indirect,
            dim.dimension.index.into(),
            instruction,
            header,
        );
        e.push(dimension.encode());
        if let Some(address) = &dim.indirect {
            emit_address_register(address, e, instruction, header);
        }
    }
}

pub fn build_full_instruction(
    full: &FullInstruction,
    out: &mut [u32],
    header: &mut Header,
) -> usize {
    let needed = full.token_count();
    if out.len() < needed {
        return 0;
    }
    assert_eq!(
        usize::from(full.instruction.num_dst_regs),
        full.dst.len(),
        "NumDstRegs disagrees with destination operands"
    );
    assert_eq!(
        usize::from(full.instruction.num_src_regs),
        full.src.len(),
        "NumSrcRegs disagrees with source operands"
    );

    let mut instruction = build_instruction(
        full.instruction.opcode,
        full.instruction.saturate,
        full.dst.len(),
        full.src.len(),
        header,
    );

    let mut e = Emitter { out, pos: 0 };
    // Filled in once the final size is known; only the Extended bit may be set before that.
    let head = e.push(0);
    let mut prev = head;

    if full.ext_nv != InstructionExtNv::default() {
        let word = build_instruction_ext_nv(&full.ext_nv, e.word(prev), &mut instruction, header);
        prev = e.push(word);
    }
    if full.ext_label != InstructionExtLabel::default() {
        let word = build_instruction_ext_label(
            full.ext_label.label,
            e.word(prev),
            &mut instruction,
            header,
        );
        prev = e.push(word);
    }
    if full.ext_texture != InstructionExtTexture::default() {
        let word = build_instruction_ext_texture(
            full.ext_texture.texture,
            e.word(prev),
            &mut instruction,
            header,
        );
        e.push(word);
    }

    for dst in &full.dst {
        assert!(
            !dst.register.indirect && !dst.register.dimension,
            "indirect or multi-dimensional destinations are not supported"
        );
        let reg = build_dst_register(
            dst.register.file,
            dst.register.write_mask,
            dst.register.index.into(),
            &mut instruction,
            header,
        );
        let mut prev = e.push(reg.encode());

        if dst.ext_concode != DstRegisterExtConcode::default() {
            let word = build_dst_register_ext_concode(
                dst.ext_concode.cond_mask,
                dst.ext_concode.cond_swizzle,
                dst.ext_concode.cond_src_index,
                e.word(prev),
                &mut instruction,
                header,
            );
            prev = e.push(word);
        }
        if dst.ext_modulate != DstRegisterExtModulate::default() {
            let word = build_dst_register_ext_modulate(
                dst.ext_modulate.modulate,
                e.word(prev),
                &mut instruction,
                header,
            );
            e.push(word);
        }
    }

    for src in &full.src {
        emit_src(src, &mut e, &mut instruction, header);
    }

    *e.word(head) |= instruction.encode();
    debug_assert_eq!(e.pos, needed);
    debug_assert_eq!(usize::from(instruction.size), needed);
    needed
}

/// Builds a complete token stream into a fixed buffer.
///
/// The prefix is written on construction and the header's `BodySize` is rewritten after
/// every appended record, so the buffer is a valid stream after each successful append.
#[derive(Debug)]
pub struct TokenBuilder<'a> {
    tokens: &'a mut [u32],
    len: usize,
    header: Header,
}

impl<'a> TokenBuilder<'a> {
    pub fn new(tokens: &'a mut [u32], processor: ProcessorType) -> Result<Self, CapacityError> {
        if tokens.len() < PREFIX_TOKENS {
            return Err(CapacityError {
                needed: PREFIX_TOKENS,
                available: tokens.len(),
            });
        }
        let version = build_version();
        let mut header = build_header();
        let processor = build_processor(processor, &mut header);
        tokens[0] = version.encode();
        tokens[1] = header.encode();
        tokens[2] = processor.encode();
        Ok(Self {
            tokens,
            len: PREFIX_TOKENS,
            header,
        })
    }

    fn append(
        &mut self,
        needed: usize,
        build: impl FnOnce(&mut [u32], &mut Header) -> usize,
    ) -> Result<usize, CapacityError> {
        let written = build(&mut self.tokens[self.len..], &mut self.header);
        if written == 0 {
            return Err(CapacityError {
                needed,
                available: self.tokens.len() - self.len,
            });
        }
        trace!(at = self.len, words = written, "appended record");
        self.len += written;
        self.tokens[1] = self.header.encode();
        Ok(written)
    }

    pub fn append_declaration(&mut self, full: &FullDeclaration) -> Result<usize, CapacityError> {
        self.append(full.token_count(), |out, header| {
            build_full_declaration(full, out, header)
        })
    }

    pub fn append_immediate(&mut self, full: &FullImmediate) -> Result<usize, CapacityError> {
        self.append(full.token_count(), |out, header| {
            build_full_immediate(full, out, header)
        })
    }

    pub fn append_instruction(&mut self, full: &FullInstruction) -> Result<usize, CapacityError> {
        self.append(full.token_count(), |out, header| {
            build_full_instruction(full, out, header)
        })
    }

    pub fn header(&self) -> Header {
        self.header
    }

    /// Words written so far, prefix included.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the total number of words in the finished stream.
    pub fn finish(self) -> usize {
        self.len
    }
}
