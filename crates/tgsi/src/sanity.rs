//! Structural checks over a complete token stream.
//!
//! The parser only guarantees that a stream is well formed word by word. This module checks
//! that it also makes sense as a program: operand counts agree with the opcode table, every
//! register read or written is declared, and declarations precede instructions.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::full::{FullInstruction, FullSrcRegister, FullToken};
use crate::opcode::Opcode;
use crate::parse::{ParseContext, ParseError};
use crate::token::{RegisterFile, SrcRegister};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanityIssue {
    #[error(
        "instruction {instno} ({opcode}): expected {expected_dst} destination and \
         {expected_src} source operands, found {dst} and {src}"
    )]
    OperandCount {
        instno: usize,
        opcode: Opcode,
        expected_dst: u8,
        expected_src: u8,
        dst: u8,
        src: u8,
    },
    #[error("instruction {instno}: {file}[{index}] is not declared")]
    Undeclared {
        instno: usize,
        file: RegisterFile,
        index: i32,
    },
    #[error("{file}[{index}] is declared more than once")]
    Redeclared { file: RegisterFile, index: u32 },
    #[error("declaration of {file} follows instruction {instno}")]
    DeclarationAfterInstruction { instno: usize, file: RegisterFile },
    #[error("instruction {instno} follows END")]
    InstructionAfterEnd { instno: usize },
    #[error("instruction {instno}: indirect addressing through {file}, expected ADDR")]
    IndirectNotAddress { instno: usize, file: RegisterFile },
    #[error("program does not end with END")]
    MissingEnd,
    #[error("{file}[{index}] is declared but never used")]
    Unused { file: RegisterFile, index: u32 },
}

/// Result of [`check`]. Only `errors` make a program invalid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanityReport {
    pub errors: Vec<SanityIssue>,
    pub warnings: Vec<SanityIssue>,
}

impl SanityReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for SanityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s)", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

type RegisterKey = (RegisterFile, u32);

#[derive(Default)]
struct Checker {
    report: SanityReport,
    declared: BTreeSet<RegisterKey>,
    used: BTreeSet<RegisterKey>,
    /// Files accessed through indirect addressing; any declared register may be read.
    indirect_files: BTreeSet<RegisterFile>,
    immediates: u32,
    instno: usize,
    seen_end: bool,
}

impl Checker {
    fn error(&mut self, issue: SanityIssue) {
        debug!(%issue, "sanity error");
        self.report.errors.push(issue);
    }

    fn warning(&mut self, issue: SanityIssue) {
        warn!(%issue, "sanity warning");
        self.report.warnings.push(issue);
    }

    fn declare(&mut self, file: RegisterFile, first: u16, last: u16) {
        if self.instno > 0 {
            self.error(SanityIssue::DeclarationAfterInstruction {
                instno: self.instno - 1,
                file,
            });
        }
        for index in u32::from(first)..=u32::from(last) {
            if !self.declared.insert((file, index)) {
                self.error(SanityIssue::Redeclared { file, index });
            }
        }
    }

    fn is_declared(&self, file: RegisterFile, index: i32) -> bool {
        match file {
            RegisterFile::Null => true,
            RegisterFile::Immediate => (0..i64::from(self.immediates)).contains(&i64::from(index)),
            _ => u32::try_from(index).is_ok_and(|index| self.declared.contains(&(file, index))),
        }
    }

    fn use_register(&mut self, file: RegisterFile, index: i32) {
        if !self.is_declared(file, index) {
            self.error(SanityIssue::Undeclared {
                instno: self.instno,
                file,
                index,
            });
            return;
        }
        if let Ok(index) = u32::try_from(index) {
            self.used.insert((file, index));
        }
    }

    fn use_address(&mut self, address: &SrcRegister) {
        if address.file != RegisterFile::Address {
            self.error(SanityIssue::IndirectNotAddress {
                instno: self.instno,
                file: address.file,
            });
        }
        self.use_register(address.file, address.index.into());
    }

    fn use_src(&mut self, src: &FullSrcRegister) {
        if let Some(address) = &src.indirect {
            self.use_address(address);
            self.indirect_files.insert(src.register.file);
        } else {
            self.use_register(src.register.file, src.register.index.into());
        }
        if let Some(address) = src.dimension.as_ref().and_then(|dim| dim.indirect.as_ref()) {
            self.use_address(address);
        }
    }

    fn instruction(&mut self, insn: &FullInstruction) {
        if self.seen_end {
            self.error(SanityIssue::InstructionAfterEnd {
                instno: self.instno,
            });
        }

        let opcode = insn.instruction.opcode;
        let info = opcode.info();
        if info.num_dst != insn.instruction.num_dst_regs
            || info.num_src != insn.instruction.num_src_regs
        {
            self.error(SanityIssue::OperandCount {
                instno: self.instno,
                opcode,
                expected_dst: info.num_dst,
                expected_src: info.num_src,
                dst: insn.instruction.num_dst_regs,
                src: insn.instruction.num_src_regs,
            });
        }

        for dst in &insn.dst {
            self.use_register(dst.register.file, dst.register.index.into());
        }
        for src in &insn.src {
            self.use_src(src);
        }

        if opcode == Opcode::End {
            self.seen_end = true;
        }
        self.instno += 1;
    }

    fn finish(mut self) -> SanityReport {
        if !self.seen_end {
            self.warning(SanityIssue::MissingEnd);
        }
        let unused: Vec<RegisterKey> = self
            .declared
            .difference(&self.used)
            .filter(|(file, _)| !self.indirect_files.contains(file))
            .copied()
            .collect();
        for (file, index) in unused {
            self.warning(SanityIssue::Unused { file, index });
        }
        self.report
    }
}

/// Checks a token stream, returning every problem found.
///
/// Fails only if the stream cannot be parsed at all.
pub fn check(tokens: &[u32]) -> Result<SanityReport, ParseError> {
    let mut ctx = ParseContext::init(tokens)?;
    let mut checker = Checker::default();
    while !ctx.end_of_tokens() {
        match ctx.parse_token()? {
            FullToken::Declaration(decl) => checker.declare(
                decl.declaration.file,
                decl.range.first,
                decl.range.last,
            ),
            FullToken::Immediate(_) => checker.immediates += 1,
            FullToken::Instruction(insn) => checker.instruction(insn),
        }
    }
    Ok(checker.finish())
}

/// Returns `true` if `tokens` parse and contain no sanity errors.
pub fn sanity_check(tokens: &[u32]) -> bool {
    match check(tokens) {
        Ok(report) => report.is_ok(),
        Err(err) => {
            debug!(%err, "sanity check could not parse tokens");
            false
        }
    }
}
