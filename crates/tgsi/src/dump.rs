//! Human-readable listing of a token stream.
//!
//! Every record is printed as one line of assembly-like text. With [`DumpFlags::VERBOSE`]
//! each line is followed by a field-by-field listing of the tokens it was decoded from.

use core::fmt::{self, Write};

use bitflags::bitflags;
use thiserror::Error;

use crate::full::{FullDeclaration, FullImmediate, FullInstruction, FullSrcRegister, FullToken};
use crate::parse::{ParseContext, ParseError};
use crate::token::{
    Declaration, DstRegister, DstRegisterExtConcode, DstRegisterExtModulate, ExtSwizzle,
    Instruction, InstructionExtLabel, InstructionExtNv, InstructionExtTexture,
    InstructionExtType, DstExtType, Modulate, SrcExtType, SrcRegister, SrcRegisterExtMod,
    SrcRegisterExtSwz, Swizzle, Texture, TokenType, WriteMask,
};

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct DumpFlags: u32 {
        /// Follow each record with a listing of its fields.
        const VERBOSE = 1 << 0;
        /// Omit framing fields such as `Size` from the verbose listing.
        const NO_IGNORED = 1 << 1;
        /// Omit fields that hold their default value from the verbose listing.
        const NO_DEFAULT = 1 << 2;
    }
}

#[derive(Debug, Error)]
pub enum DumpError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("failed to write dump output")]
    Format(#[from] fmt::Error),
}

const BANNER_BEGIN: &str = "tgsi-dump begin -----------------";
const BANNER_END: &str = "\ntgsi-dump end -------------------\n";

struct Dumper<'w, W: Write> {
    out: &'w mut W,
    flags: DumpFlags,
}

impl<'w, W: Write> Dumper<'w, W> {
    fn new(out: &'w mut W, flags: DumpFlags) -> Self {
        Self { out, flags }
    }

    fn verbose(&self) -> bool {
        self.flags.contains(DumpFlags::VERBOSE)
    }

    fn ignored(&self) -> bool {
        !self.flags.contains(DumpFlags::NO_IGNORED)
    }

    fn field(&mut self, label: &str, value: impl fmt::Display) -> fmt::Result {
        write!(self.out, "\n    {label:<14}: {value}")
    }

    /// A field that is skipped under `NO_DEFAULT` when it holds its default value.
    fn opt_field(&mut self, label: &str, value: impl fmt::Display, is_default: bool) -> fmt::Result {
        if is_default && self.flags.contains(DumpFlags::NO_DEFAULT) {
            return Ok(());
        }
        self.field(label, value)
    }

    fn section(&mut self) -> fmt::Result {
        self.out.write_char('\n')
    }

    // ---- compact lines ----

    fn declaration(&mut self, decl: &FullDeclaration) -> fmt::Result {
        let d = &decl.declaration;
        write!(self.out, "\nDCL {}[{}", d.file.short_name(), decl.range.first)?;
        if decl.range.first != decl.range.last {
            write!(self.out, "..{}", decl.range.last)?;
        }
        self.out.write_char(']')?;
        if d.usage_mask != WriteMask::XYZW {
            write!(self.out, ".{}", d.usage_mask.letters())?;
        }
        if let Some(semantic) = &decl.semantic {
            write!(self.out, ", {}", semantic.name.short_name())?;
            if semantic.index != 0 {
                write!(self.out, "[{}]", semantic.index)?;
            }
        }
        write!(self.out, ", {}", d.interpolate.short_name())?;

        if self.verbose() {
            self.verbose_declaration(decl)?;
        }
        Ok(())
    }

    fn immediate(&mut self, imm: &FullImmediate) -> fmt::Result {
        write!(self.out, "\nIMM {} {{ ", imm.immediate.data_type.short_name())?;
        for (i, value) in imm.data.iter().enumerate() {
            if i > 0 {
                self.out.write_str(", ")?;
            }
            write!(self.out, "{value:10.4}")?;
        }
        self.out.write_str(" }")?;

        if self.verbose() {
            self.verbose_immediate(imm)?;
        }
        Ok(())
    }

    fn instruction(&mut self, insn: &FullInstruction, instno: usize) -> fmt::Result {
        let i = &insn.instruction;
        write!(
            self.out,
            "\n{instno}: {}{}",
            i.opcode.mnemonic(),
            i.saturate.short_name()
        )?;

        let mut first = true;
        let mut separator = |out: &mut W| -> fmt::Result {
            if !first {
                out.write_char(',')?;
            }
            first = false;
            out.write_char(' ')
        };

        for dst in &insn.dst {
            separator(&mut *self.out)?;
            let reg = &dst.register;
            write!(self.out, "{}[{}]", reg.file.short_name(), reg.index)?;
            self.out.write_str(dst.ext_modulate.modulate.short_name())?;
            if reg.write_mask != WriteMask::XYZW {
                write!(self.out, ".{}", reg.write_mask.letters())?;
            }
        }

        for src in &insn.src {
            separator(&mut *self.out)?;
            self.src_operand(src)?;
        }

        if insn.ext_texture.texture != Texture::Unknown {
            write!(self.out, ", {}", insn.ext_texture.texture.short_name())?;
        }
        if i.opcode.info().is_branch {
            write!(self.out, " :{}", insn.ext_label.label)?;
        }

        if self.verbose() {
            self.verbose_instruction(insn)?;
        }
        Ok(())
    }

    fn src_operand(&mut self, src: &FullSrcRegister) -> fmt::Result {
        let m = &src.ext_mod;
        let reg = &src.register;

        if m.negate {
            self.out.write_str("-(")?;
        }
        if m.absolute {
            self.out.write_char('|')?;
        }
        if m.scale_2x {
            self.out.write_str("2*(")?;
        }
        if m.bias {
            self.out.write_char('(')?;
        }
        if m.complement {
            self.out.write_str("1-(")?;
        }
        if reg.negate {
            self.out.write_char('-')?;
        }

        self.out.write_str(reg.file.short_name())?;
        if let Some(dim) = &src.dimension {
            self.out.write_char('[')?;
            match &dim.indirect {
                Some(address) => self.indirect_index(address, dim.dimension.index)?,
                None => write!(self.out, "{}", dim.dimension.index)?,
            }
            self.out.write_char(']')?;
        }
        self.out.write_char('[')?;
        match &src.indirect {
            Some(address) => self.indirect_index(address, reg.index)?,
            None => write!(self.out, "{}", reg.index)?,
        }
        self.out.write_char(']')?;

        if reg.swizzle != Swizzle::IDENTITY {
            self.out.write_char('.')?;
            for s in reg.swizzle {
                self.out.write_str(s.short_name())?;
            }
        }
        if src.ext_swz.ext_swizzle != ExtSwizzle::IDENTITY {
            self.out.write_char('.')?;
            for s in src.ext_swz.ext_swizzle {
                self.out.write_str(s.short_name())?;
            }
        }

        if m.complement {
            self.out.write_char(')')?;
        }
        if m.bias {
            self.out.write_str(")-.5")?;
        }
        if m.scale_2x {
            self.out.write_char(')')?;
        }
        if m.absolute {
            self.out.write_char('|')?;
        }
        if m.negate {
            self.out.write_char(')')?;
        }
        Ok(())
    }

    /// `ADDR[i].c+offset`
    fn indirect_index(&mut self, address: &SrcRegister, offset: i16) -> fmt::Result {
        write!(
            self.out,
            "{}[{}].{}",
            address.file.short_name(),
            address.index,
            address.swizzle[0].short_name()
        )?;
        match offset {
            0 => Ok(()),
            o if o > 0 => write!(self.out, "+{o}"),
            o => write!(self.out, "{o}"),
        }
    }

    // ---- verbose listings ----

    fn token_head(&mut self, ty: TokenType, size: u8, extended: bool) -> fmt::Result {
        self.section()?;
        self.field("Type", ty.name())?;
        if self.ignored() {
            self.field("Size", size)?;
            self.opt_field("Extended", u8::from(extended), !extended)?;
        }
        Ok(())
    }

    fn verbose_declaration(&mut self, decl: &FullDeclaration) -> fmt::Result {
        let d = &decl.declaration;
        let def = Declaration::default();
        self.token_head(TokenType::Declaration, d.size, false)?;
        self.field("File", d.file.name())?;
        self.opt_field(
            "UsageMask",
            format_args!("{:#x}", d.usage_mask.bits()),
            d.usage_mask == def.usage_mask,
        )?;
        self.opt_field(
            "Interpolate",
            d.interpolate.name(),
            d.interpolate == def.interpolate,
        )?;
        self.opt_field("Semantic", u8::from(d.semantic), !d.semantic)?;

        self.section()?;
        self.field("First", decl.range.first)?;
        self.field("Last", decl.range.last)?;

        if let Some(semantic) = &decl.semantic {
            self.section()?;
            self.field("SemanticName", semantic.name.name())?;
            self.opt_field("SemanticIndex", semantic.index, semantic.index == 0)?;
        }
        Ok(())
    }

    fn verbose_immediate(&mut self, imm: &FullImmediate) -> fmt::Result {
        self.token_head(TokenType::Immediate, imm.immediate.size, false)?;
        self.field("DataType", imm.immediate.data_type.name())?;
        for value in &imm.data {
            self.section()?;
            self.field("Float", value)?;
        }
        Ok(())
    }

    fn verbose_instruction(&mut self, insn: &FullInstruction) -> fmt::Result {
        let i = &insn.instruction;
        let def = Instruction::default();
        let has_nv = insn.ext_nv != InstructionExtNv::default();
        let has_label = insn.ext_label != InstructionExtLabel::default();
        let has_texture = insn.ext_texture != InstructionExtTexture::default();

        self.token_head(
            TokenType::Instruction,
            i.size,
            has_nv || has_label || has_texture,
        )?;
        self.field("Opcode", i.opcode.mnemonic())?;
        self.opt_field("Saturate", i.saturate.name(), i.saturate == def.saturate)?;
        self.opt_field(
            "NumDstRegs",
            i.num_dst_regs,
            i.num_dst_regs == def.num_dst_regs,
        )?;
        self.opt_field(
            "NumSrcRegs",
            i.num_src_regs,
            i.num_src_regs == def.num_src_regs,
        )?;

        let deflt = !self.flags.contains(DumpFlags::NO_DEFAULT);
        if deflt || has_nv {
            let nv = &insn.ext_nv;
            let def = InstructionExtNv::default();
            self.section()?;
            self.field("Type", InstructionExtType::Nv.name())?;
            self.opt_field("Precision", nv.precision.name(), nv.precision == def.precision)?;
            self.opt_field(
                "CondDstIndex",
                nv.cond_dst_index,
                nv.cond_dst_index == def.cond_dst_index,
            )?;
            self.opt_field(
                "CondFlowIndex",
                nv.cond_flow_index,
                nv.cond_flow_index == def.cond_flow_index,
            )?;
            self.opt_field("CondMask", nv.cond_mask.name(), nv.cond_mask == def.cond_mask)?;
            self.swizzle_fields("CondSwizzle", nv.cond_swizzle)?;
            self.opt_field(
                "CondDstUpdate",
                u8::from(nv.cond_dst_update),
                !nv.cond_dst_update,
            )?;
            self.opt_field(
                "CondFlowEnable",
                u8::from(nv.cond_flow_enable),
                !nv.cond_flow_enable,
            )?;
        }
        if deflt || has_label {
            self.section()?;
            self.field("Type", InstructionExtType::Label.name())?;
            self.opt_field("Label", insn.ext_label.label, !has_label)?;
        }
        if deflt || has_texture {
            self.section()?;
            self.field("Type", InstructionExtType::Texture.name())?;
            self.opt_field("Texture", insn.ext_texture.texture.name(), !has_texture)?;
        }

        for dst in &insn.dst {
            self.verbose_dst(&dst.register, &dst.ext_concode, &dst.ext_modulate)?;
        }
        for src in &insn.src {
            self.verbose_src(src)?;
        }
        Ok(())
    }

    fn swizzle_fields(&mut self, prefix: &str, swizzle: [Swizzle; 4]) -> fmt::Result {
        for (component, (s, identity)) in ["X", "Y", "Z", "W"]
            .into_iter()
            .zip(swizzle.into_iter().zip(Swizzle::IDENTITY))
        {
            self.opt_field(&format!("{prefix}{component}"), s.name(), s == identity)?;
        }
        Ok(())
    }

    fn verbose_dst(
        &mut self,
        reg: &DstRegister,
        concode: &DstRegisterExtConcode,
        modulate: &DstRegisterExtModulate,
    ) -> fmt::Result {
        let deflt = !self.flags.contains(DumpFlags::NO_DEFAULT);
        self.section()?;
        self.field("File", reg.file.name())?;
        self.opt_field(
            "WriteMask",
            format_args!("{:#x}", reg.write_mask.bits()),
            reg.write_mask == WriteMask::XYZW,
        )?;
        self.opt_field("Index", reg.index, reg.index == 0)?;

        let def = DstRegisterExtConcode::default();
        if deflt || *concode != def {
            self.section()?;
            self.field("Type", DstExtType::Condcode.name())?;
            self.opt_field(
                "CondMask",
                concode.cond_mask.name(),
                concode.cond_mask == def.cond_mask,
            )?;
            self.swizzle_fields("CondSwizzle", concode.cond_swizzle)?;
            self.opt_field(
                "CondSrcIndex",
                concode.cond_src_index,
                concode.cond_src_index == 0,
            )?;
        }
        if deflt || modulate.modulate != Modulate::X1 {
            self.section()?;
            self.field("Type", DstExtType::Modulate.name())?;
            self.opt_field(
                "Modulate",
                modulate.modulate.name(),
                modulate.modulate == Modulate::X1,
            )?;
        }
        Ok(())
    }

    fn verbose_src_register(&mut self, reg: &SrcRegister) -> fmt::Result {
        self.section()?;
        self.field("File", reg.file.name())?;
        self.swizzle_fields("Swizzle", reg.swizzle)?;
        self.opt_field("Negate", u8::from(reg.negate), !reg.negate)?;
        if self.ignored() {
            self.opt_field("Indirect", u8::from(reg.indirect), !reg.indirect)?;
            self.opt_field("Dimension", u8::from(reg.dimension), !reg.dimension)?;
        }
        self.opt_field("Index", reg.index, reg.index == 0)
    }

    fn verbose_src(&mut self, src: &FullSrcRegister) -> fmt::Result {
        let deflt = !self.flags.contains(DumpFlags::NO_DEFAULT);
        self.verbose_src_register(&src.register)?;

        let swz = &src.ext_swz;
        if deflt || *swz != SrcRegisterExtSwz::default() {
            self.section()?;
            self.field("Type", SrcExtType::Swz.name())?;
            for (component, (s, identity)) in ["X", "Y", "Z", "W"]
                .into_iter()
                .zip(swz.ext_swizzle.into_iter().zip(ExtSwizzle::IDENTITY))
            {
                self.opt_field(&format!("ExtSwizzle{component}"), s.name(), s == identity)?;
            }
            for (component, negate) in ["X", "Y", "Z", "W"].into_iter().zip(swz.negate) {
                self.opt_field(&format!("Negate{component}"), u8::from(negate), !negate)?;
            }
        }

        let m: &SrcRegisterExtMod = &src.ext_mod;
        if deflt || *m != SrcRegisterExtMod::default() {
            self.section()?;
            self.field("Type", SrcExtType::Mod.name())?;
            for (label, value) in [
                ("Complement", m.complement),
                ("Bias", m.bias),
                ("Scale2X", m.scale_2x),
                ("Absolute", m.absolute),
                ("Negate", m.negate),
            ] {
                self.opt_field(label, u8::from(value), !value)?;
            }
        }

        if let Some(address) = &src.indirect {
            self.verbose_src_register(address)?;
        }
        if let Some(dim) = &src.dimension {
            self.section()?;
            self.opt_field(
                "Indirect",
                u8::from(dim.dimension.indirect),
                !dim.dimension.indirect,
            )?;
            self.field("Index", dim.dimension.index)?;
            if let Some(address) = &dim.indirect {
                self.verbose_src_register(address)?;
            }
        }
        Ok(())
    }
}

/// Writes the one-line form of a declaration (and its field listing when verbose).
pub fn dump_declaration(
    out: &mut impl Write,
    decl: &FullDeclaration,
    flags: DumpFlags,
) -> fmt::Result {
    Dumper::new(out, flags).declaration(decl)
}

pub fn dump_immediate(out: &mut impl Write, imm: &FullImmediate, flags: DumpFlags) -> fmt::Result {
    Dumper::new(out, flags).immediate(imm)
}

/// `instno` is the zero-based instruction number printed as the line prefix.
pub fn dump_instruction(
    out: &mut impl Write,
    insn: &FullInstruction,
    instno: usize,
    flags: DumpFlags,
) -> fmt::Result {
    Dumper::new(out, flags).instruction(insn, instno)
}

/// Dumps a complete token stream into `out`.
pub fn dump_to(out: &mut impl Write, tokens: &[u32], flags: DumpFlags) -> Result<(), DumpError> {
    let mut ctx = ParseContext::init(tokens)?;
    let mut d = Dumper::new(out, flags);

    d.out.write_str(BANNER_BEGIN)?;
    let version = ctx.full_version();
    let header = ctx.full_header();
    write!(
        d.out,
        "\n{}{}.{}",
        header.processor.processor.short_name(),
        version.major,
        version.minor
    )?;
    if d.verbose() {
        d.section()?;
        d.field("MajorVersion", version.major)?;
        d.field("MinorVersion", version.minor)?;
        d.section()?;
        d.field("HeaderSize", header.header.header_size)?;
        d.field("BodySize", header.header.body_size)?;
        d.field("Processor", header.processor.processor.name())?;
    }

    let mut instno = 0;
    while !ctx.end_of_tokens() {
        match ctx.parse_token()? {
            FullToken::Declaration(decl) => d.declaration(decl)?,
            FullToken::Immediate(imm) => d.immediate(imm)?,
            FullToken::Instruction(insn) => {
                d.instruction(insn, instno)?;
                instno += 1;
            }
        }
    }
    d.out.write_str(BANNER_END)?;
    Ok(())
}

/// Dumps a complete token stream into a new string.
pub fn dump(tokens: &[u32], flags: DumpFlags) -> Result<String, DumpError> {
    let mut out = String::new();
    dump_to(&mut out, tokens, flags)?;
    Ok(out)
}
