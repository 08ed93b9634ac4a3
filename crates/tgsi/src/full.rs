//! Aggregate records: a token together with everything that belongs to it.
//!
//! The builder consumes these and the parser produces them. Optional extensions are
//! stored by value; an extension equal to its `Default` is not emitted.

use crate::opcode::Opcode;
use crate::token::{
    Declaration, DeclarationRange, DeclarationSemantic, Dimension, DstRegister,
    DstRegisterExtConcode, DstRegisterExtModulate, Immediate, ImmediateDataType, Instruction,
    InstructionExtLabel, InstructionExtNv, InstructionExtTexture, Interpolate, RegisterFile,
    Saturate, Semantic, SrcRegister, SrcRegisterExtMod, SrcRegisterExtSwz, TokenType, WriteMask,
};

/// Destination operands a single instruction may carry.
pub const MAX_DST_REGISTERS: usize = 2;
/// Source operands a single instruction may carry.
pub const MAX_SRC_REGISTERS: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullDeclaration {
    pub declaration: Declaration,
    pub range: DeclarationRange,
    pub semantic: Option<DeclarationSemantic>,
}

impl FullDeclaration {
    pub fn new(file: RegisterFile, first: u16, last: u16) -> Self {
        Self {
            declaration: Declaration {
                file,
                ..Default::default()
            },
            range: DeclarationRange { first, last },
            semantic: None,
        }
    }

    pub fn with_usage_mask(mut self, mask: WriteMask) -> Self {
        self.declaration.usage_mask = mask;
        self
    }

    pub fn with_interpolate(mut self, interpolate: Interpolate) -> Self {
        self.declaration.interpolate = interpolate;
        self
    }

    pub fn with_semantic(mut self, name: Semantic, index: u16) -> Self {
        self.declaration.semantic = true;
        self.semantic = Some(DeclarationSemantic { name, index });
        self
    }

    /// Tokens this declaration occupies.
    pub fn token_count(&self) -> usize {
        2 + usize::from(self.semantic.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FullImmediate {
    pub immediate: Immediate,
    pub data: Vec<f32>,
}

impl FullImmediate {
    pub fn float32(data: &[f32]) -> Self {
        Self {
            immediate: Immediate {
                data_type: ImmediateDataType::Float32,
                ..Default::default()
            },
            data: data.to_vec(),
        }
    }

    pub fn token_count(&self) -> usize {
        1 + self.data.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullDstRegister {
    pub register: DstRegister,
    pub ext_concode: DstRegisterExtConcode,
    pub ext_modulate: DstRegisterExtModulate,
}

impl FullDstRegister {
    pub fn new(file: RegisterFile, index: i16, write_mask: WriteMask) -> Self {
        Self {
            register: DstRegister {
                file,
                index,
                write_mask,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn token_count(&self) -> usize {
        1 + usize::from(self.ext_concode != DstRegisterExtConcode::default())
            + usize::from(self.ext_modulate != DstRegisterExtModulate::default())
    }
}

/// The second index of a two-dimensional source operand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullDimension {
    pub dimension: Dimension,
    pub indirect: Option<SrcRegister>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullSrcRegister {
    pub register: SrcRegister,
    pub ext_swz: SrcRegisterExtSwz,
    pub ext_mod: SrcRegisterExtMod,
    /// Address register supplying the relative part of the index.
    pub indirect: Option<SrcRegister>,
    pub dimension: Option<FullDimension>,
}

impl FullSrcRegister {
    pub fn new(file: RegisterFile, index: i16) -> Self {
        Self {
            register: SrcRegister {
                file,
                index,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Adds an address-register indirection, keeping the presence bit in sync.
    pub fn set_indirect(&mut self, address: SrcRegister) {
        self.register.indirect = true;
        self.indirect = Some(address);
    }

    pub fn set_dimension(&mut self, dimension: FullDimension) {
        self.register.dimension = true;
        self.dimension = Some(FullDimension {
            dimension: Dimension {
                indirect: dimension.indirect.is_some(),
                ..dimension.dimension
            },
            ..dimension
        });
    }

    pub fn token_count(&self) -> usize {
        1 + usize::from(self.ext_swz != SrcRegisterExtSwz::default())
            + usize::from(self.ext_mod != SrcRegisterExtMod::default())
            + usize::from(self.indirect.is_some())
            + self
                .dimension
                .map_or(0, |dim| 1 + usize::from(dim.indirect.is_some()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullInstruction {
    pub instruction: Instruction,
    pub ext_nv: InstructionExtNv,
    pub ext_label: InstructionExtLabel,
    pub ext_texture: InstructionExtTexture,
    pub dst: Vec<FullDstRegister>,
    pub src: Vec<FullSrcRegister>,
}

impl FullInstruction {
    /// An instruction with no operands yet.
    pub fn new(opcode: Opcode) -> Self {
        Self {
            instruction: Instruction {
                opcode,
                num_dst_regs: 0,
                num_src_regs: 0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_saturate(mut self, saturate: Saturate) -> Self {
        self.instruction.saturate = saturate;
        self
    }

    pub fn push_dst(&mut self, dst: FullDstRegister) {
        self.dst.push(dst);
        self.instruction.num_dst_regs = self.dst.len() as u8;
    }

    pub fn push_src(&mut self, src: FullSrcRegister) {
        self.src.push(src);
        self.instruction.num_src_regs = self.src.len() as u8;
    }

    pub fn token_count(&self) -> usize {
        1 + usize::from(self.ext_nv != InstructionExtNv::default())
            + usize::from(self.ext_label != InstructionExtLabel::default())
            + usize::from(self.ext_texture != InstructionExtTexture::default())
            + self.dst.iter().map(FullDstRegister::token_count).sum::<usize>()
            + self.src.iter().map(FullSrcRegister::token_count).sum::<usize>()
    }
}

/// One parsed body token.
#[derive(Debug, Clone, PartialEq)]
pub enum FullToken {
    Declaration(FullDeclaration),
    Immediate(FullImmediate),
    Instruction(FullInstruction),
}

impl FullToken {
    pub fn token_type(&self) -> TokenType {
        match self {
            FullToken::Declaration(_) => TokenType::Declaration,
            FullToken::Immediate(_) => TokenType::Immediate,
            FullToken::Instruction(_) => TokenType::Instruction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Modulate, SrcRegisterExtMod};

    #[test]
    fn token_counts_follow_extension_presence() {
        let mut insn = FullInstruction::new(Opcode::Add);
        insn.push_dst(FullDstRegister::new(RegisterFile::Temporary, 0, WriteMask::XYZW));
        insn.push_src(FullSrcRegister::new(RegisterFile::Input, 0));
        insn.push_src(FullSrcRegister::new(RegisterFile::Constant, 3));
        assert_eq!(insn.token_count(), 4);
        assert_eq!(insn.instruction.num_dst_regs, 1);
        assert_eq!(insn.instruction.num_src_regs, 2);

        insn.dst[0].ext_modulate.modulate = Modulate::X2;
        insn.src[1].ext_mod = SrcRegisterExtMod {
            absolute: true,
            ..Default::default()
        };
        insn.src[1].set_indirect(SrcRegister {
            file: RegisterFile::Address,
            ..Default::default()
        });
        insn.ext_label.label = 9;
        assert_eq!(insn.token_count(), 8);
    }

    #[test]
    fn set_dimension_tracks_indirect_bit() {
        let mut src = FullSrcRegister::new(RegisterFile::Constant, 2);
        src.set_dimension(FullDimension {
            dimension: Dimension {
                index: 1,
                ..Default::default()
            },
            indirect: Some(SrcRegister {
                file: RegisterFile::Address,
                ..Default::default()
            }),
        });
        assert!(src.register.dimension);
        assert!(src.dimension.unwrap().dimension.indirect);
        assert_eq!(src.token_count(), 3);
    }

    #[test]
    fn declaration_semantic_sets_presence_bit() {
        let decl = FullDeclaration::new(RegisterFile::Input, 0, 3).with_semantic(Semantic::Color, 1);
        assert!(decl.declaration.semantic);
        assert_eq!(decl.token_count(), 3);
    }
}
