use crate::build::{TokenBuilder, PREFIX_TOKENS};
use crate::full::{FullDstRegister, FullInstruction, FullSrcRegister, FullToken};
use crate::opcode::Opcode;
use crate::token::{ProcessorType, RegisterFile, WriteMask};

/// Builds a complete token stream from a list of records.
///
/// Panics if any record violates a builder limit.
pub fn build_program(processor: ProcessorType, records: &[FullToken]) -> Vec<u32> {
    let words = records
        .iter()
        .map(|record| match record {
            FullToken::Declaration(decl) => decl.token_count(),
            FullToken::Immediate(imm) => imm.token_count(),
            FullToken::Instruction(insn) => insn.token_count(),
        })
        .sum::<usize>();
    let mut buf = vec![0u32; PREFIX_TOKENS + words];

    let mut builder = TokenBuilder::new(&mut buf, processor).expect("prefix fits");
    for record in records {
        let appended = match record {
            FullToken::Declaration(decl) => builder.append_declaration(decl),
            FullToken::Immediate(imm) => builder.append_immediate(imm),
            FullToken::Instruction(insn) => builder.append_instruction(insn),
        };
        appended.expect("buffer was sized from token counts");
    }
    let len = builder.finish();
    assert_eq!(len, buf.len());
    buf
}

/// An instruction whose operands are plain `FILE[index]` registers with full write masks and
/// identity swizzles.
pub fn simple_instruction(
    opcode: Opcode,
    dst: &[(RegisterFile, i16)],
    src: &[(RegisterFile, i16)],
) -> FullInstruction {
    let mut insn = FullInstruction::new(opcode);
    for &(file, index) in dst {
        insn.push_dst(FullDstRegister::new(file, index, WriteMask::XYZW));
    }
    for &(file, index) in src {
        insn.push_src(FullSrcRegister::new(file, index));
    }
    insn
}
