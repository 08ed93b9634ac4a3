//! Recursive-descent translation of assembly text into a token stream.

use tracing::debug;

use tgsi::full::FullDimension;
use tgsi::token::{
    Dimension, ExtSwizzle, Interpolate, Modulate, ProcessorType, RegisterFile, Saturate, Semantic,
    SrcRegister, Swizzle, Texture, MAJOR_VERSION, MAX_LABEL, MINOR_VERSION,
};
use tgsi::{
    FullDeclaration, FullDstRegister, FullImmediate, FullInstruction, FullSrcRegister, Opcode,
    TokenBuilder, WriteMask,
};

use crate::error::{SyntaxError, SyntaxErrorKind, TranslateError};
use crate::scan::Scanner;

type Result<T, E = TranslateError> = std::result::Result<T, E>;

/// Largest declaration index.
const MAX_DECL_INDEX: u64 = 0xFFFF;
/// Largest operand index; operand indices are signed 16-bit.
const MAX_OPERAND_INDEX: i64 = i16::MAX as i64;
const MIN_OPERAND_INDEX: i64 = i16::MIN as i64;

/// A swizzle as written after `.`.
enum ParsedSwizzle {
    Simple([Swizzle; 4]),
    /// Uses `0` or `1` in at least one component.
    Extended([ExtSwizzle; 4]),
}

/// The contents of one `[...]` register index.
enum Index {
    Direct(i16),
    /// `ADDR[i].c+offset`
    Indirect(SrcRegister, i16),
}

impl Index {
    fn split(self) -> (i16, Option<SrcRegister>) {
        match self {
            Index::Direct(index) => (index, None),
            Index::Indirect(address, offset) => (offset, Some(address)),
        }
    }
}

struct Translator<'t, 'b> {
    scan: Scanner<'t>,
    builder: TokenBuilder<'b>,
    instructions: usize,
}

fn syntax_at(scan: &Scanner<'_>, kind: SyntaxErrorKind) -> TranslateError {
    let offset = scan.pos();
    let (line, column) = scan.location(offset);
    TranslateError::Syntax(SyntaxError {
        offset,
        line,
        column,
        kind,
    })
}

fn parse_header(scan: &mut Scanner<'_>) -> Result<ProcessorType> {
    for &processor in ProcessorType::ALL {
        let header = format!(
            "{}{}.{}",
            processor.short_name(),
            MAJOR_VERSION,
            MINOR_VERSION
        );
        if scan.match_no_case(&header) {
            return Ok(processor);
        }
    }
    Err(syntax_at(scan, SyntaxErrorKind::UnknownHeader))
}

/// Converts a parsed unsigned literal to an operand index.
fn operand_index(value: u64, negative: bool) -> Option<i16> {
    let value = i64::try_from(value).ok()?;
    let value = if negative { -value } else { value };
    i16::try_from(value).ok()
}

impl<'t, 'b> Translator<'t, 'b> {
    fn syntax(&self, kind: SyntaxErrorKind) -> TranslateError {
        syntax_at(&self.scan, kind)
    }

    fn expect(&mut self, c: u8, what: &'static str) -> Result<()> {
        if self.scan.eat(c) {
            Ok(())
        } else {
            Err(self.syntax(SyntaxErrorKind::Expected(what)))
        }
    }

    fn expect_uint(&mut self) -> Result<u64> {
        self.scan
            .parse_uint()
            .ok_or_else(|| self.syntax(SyntaxErrorKind::Expected("literal integer")))
    }

    fn run(&mut self) -> Result<()> {
        loop {
            let separated = self.scan.eat_white();
            if self.scan.at_end() {
                return Ok(());
            }
            if !separated {
                return Err(self.syntax(SyntaxErrorKind::MissingWhiteSpace));
            }

            if self.parse_label().is_some() {
                self.scan.eat_opt_white();
                self.parse_instruction(true)?;
            } else if self.scan.match_word("DCL") {
                self.parse_declaration()?;
            } else if self.scan.match_word("IMM") {
                self.parse_immediate()?;
            } else {
                self.parse_instruction(false)?;
            }
        }
    }

    /// `uint ':'`. Labels only number instructions for the reader; their value is not
    /// recorded.
    fn parse_label(&mut self) -> Option<u64> {
        let mut probe = self.scan;
        let label = probe.parse_uint()?;
        probe.eat_opt_white();
        if !probe.eat(b':') {
            return None;
        }
        self.scan = probe;
        Some(label)
    }

    fn parse_file(&mut self) -> Result<RegisterFile> {
        RegisterFile::ALL
            .iter()
            .copied()
            .find(|file| self.scan.match_word(file.short_name()))
            .ok_or_else(|| self.syntax(SyntaxErrorKind::UnknownRegisterFile))
    }

    /// `file '['`
    fn parse_register_prefix(&mut self) -> Result<RegisterFile> {
        let file = self.parse_file()?;
        self.scan.eat_opt_white();
        self.expect(b'[', "`['")?;
        self.scan.eat_opt_white();
        Ok(file)
    }

    fn parse_operand_index(&mut self) -> Result<i16> {
        let start = self.scan;
        let value = self.expect_uint()?;
        operand_index(value, false).ok_or_else(|| {
            syntax_at(
                &start,
                SyntaxErrorKind::IndexOutOfRange {
                    value: i64::try_from(value).unwrap_or(i64::MAX),
                    max: MAX_OPERAND_INDEX,
                },
            )
        })
    }

    fn parse_component(&mut self) -> Result<Swizzle> {
        let component = match self.scan.peek().map(|c| c.to_ascii_lowercase()) {
            Some(b'x') => Swizzle::X,
            Some(b'y') => Swizzle::Y,
            Some(b'z') => Swizzle::Z,
            Some(b'w') => Swizzle::W,
            _ => {
                return Err(self.syntax(SyntaxErrorKind::Expected(
                    "register component `x', `y', `z' or `w'",
                )))
            }
        };
        self.scan.bump();
        Ok(component)
    }

    /// The inside of a source operand's brackets: a literal index, or
    /// `ADDR[i].c` followed by an optional signed offset. Trailing white space is consumed.
    fn parse_index(&mut self) -> Result<Index> {
        if self.scan.peek().is_some_and(|c| c.is_ascii_digit()) {
            let index = self.parse_operand_index()?;
            self.scan.eat_opt_white();
            return Ok(Index::Direct(index));
        }

        let file = self.parse_register_prefix()?;
        let index = self.parse_operand_index()?;
        self.scan.eat_opt_white();
        self.expect(b']', "`]'")?;
        self.scan.eat_opt_white();
        self.expect(b'.', "`.'")?;
        self.scan.eat_opt_white();
        let component = self.parse_component()?;
        let address = SrcRegister {
            file,
            swizzle: [component; 4],
            index,
            ..Default::default()
        };

        self.scan.eat_opt_white();
        let start = self.scan;
        let offset = match self.scan.peek() {
            Some(b'+' | b'-') => {
                let value = self.scan.parse_int().ok_or_else(|| {
                    self.syntax(SyntaxErrorKind::Expected("literal integer"))
                })?;
                i16::try_from(value).map_err(|_| {
                    syntax_at(
                        &start,
                        SyntaxErrorKind::IndexOutOfRange {
                            value,
                            max: if value < 0 {
                                MIN_OPERAND_INDEX
                            } else {
                                MAX_OPERAND_INDEX
                            },
                        },
                    )
                })?
            }
            _ => 0,
        };
        self.scan.eat_opt_white();
        Ok(Index::Indirect(address, offset))
    }

    /// `'.' [xX][yY]?[zZ]?[wW]?`, all components when absent.
    fn parse_opt_writemask(&mut self) -> Result<WriteMask> {
        let mut probe = self.scan;
        probe.eat_opt_white();
        if !probe.eat(b'.') {
            return Ok(WriteMask::XYZW);
        }
        probe.eat_opt_white();
        let mut mask = WriteMask::empty();
        for (bit, c) in [
            (WriteMask::X, b'x'),
            (WriteMask::Y, b'y'),
            (WriteMask::Z, b'z'),
            (WriteMask::W, b'w'),
        ] {
            if probe.peek().map(|p| p.to_ascii_lowercase()) == Some(c) {
                probe.bump();
                mask |= bit;
            }
        }
        if mask.is_empty() {
            return Err(syntax_at(&probe, SyntaxErrorKind::WritemaskExpected));
        }
        self.scan = probe;
        Ok(mask)
    }

    /// `'.'` followed by four components, or by a single `x`/`y`/`z`/`w` that is replicated.
    fn parse_opt_swizzle(&mut self) -> Result<Option<ParsedSwizzle>> {
        let mut probe = self.scan;
        probe.eat_opt_white();
        if !probe.eat(b'.') {
            return Ok(None);
        }
        probe.eat_opt_white();

        let mut components = [ExtSwizzle::X; 4];
        let mut count = 0;
        while count < 4 {
            let component = match probe.peek().map(|c| c.to_ascii_lowercase()) {
                Some(b'x') => ExtSwizzle::X,
                Some(b'y') => ExtSwizzle::Y,
                Some(b'z') => ExtSwizzle::Z,
                Some(b'w') => ExtSwizzle::W,
                Some(b'0') => ExtSwizzle::Zero,
                Some(b'1') => ExtSwizzle::One,
                _ => break,
            };
            probe.bump();
            components[count] = component;
            count += 1;
        }

        let swizzle = match (count, components[0].component()) {
            (4, _) => components,
            (1, Some(_)) => [components[0]; 4],
            _ => {
                return Err(syntax_at(
                    &probe,
                    SyntaxErrorKind::Expected(
                        "register swizzle component `x', `y', `z', `w', `0' or `1'",
                    ),
                ))
            }
        };
        self.scan = probe;

        let simple = swizzle.map(ExtSwizzle::component);
        Ok(Some(match simple {
            [Some(x), Some(y), Some(z), Some(w)] => ParsedSwizzle::Simple([x, y, z, w]),
            _ => ParsedSwizzle::Extended(swizzle),
        }))
    }

    fn parse_dst_operand(&mut self) -> Result<FullDstRegister> {
        let file = self.parse_register_prefix()?;
        let index = self.parse_operand_index()?;
        self.scan.eat_opt_white();
        self.expect(b']', "`]'")?;

        let modulate = Modulate::ALL
            .iter()
            .copied()
            .filter(|m| !m.short_name().is_empty())
            .find(|m| self.scan.match_word(m.short_name()))
            .unwrap_or(Modulate::X1);
        let mask = self.parse_opt_writemask()?;

        let mut dst = FullDstRegister::new(file, index, mask);
        dst.ext_modulate.modulate = modulate;
        Ok(dst)
    }

    /// Consumes `value` followed by `rest`, e.g. `2*(`. Leaves the cursor untouched and
    /// returns `false` if the input does not start with the literal `value`.
    fn parse_float_prefix(&mut self, value: f32, rest: &[(u8, &'static str)]) -> Result<bool> {
        let mut probe = self.scan;
        if probe.parse_float() != Some(value) {
            return Ok(false);
        }
        probe.eat_opt_white();
        self.scan = probe;
        for &(c, what) in rest {
            self.expect(c, what)?;
        }
        self.scan.eat_opt_white();
        Ok(true)
    }

    fn parse_src_operand(&mut self) -> Result<FullSrcRegister> {
        let mut outer_negate = false;
        let mut probe = self.scan;
        if probe.eat(b'-') {
            probe.eat_opt_white();
            if probe.eat(b'(') {
                probe.eat_opt_white();
                outer_negate = true;
                self.scan = probe;
            }
        }

        let absolute = self.scan.eat(b'|');
        if absolute {
            self.scan.eat_opt_white();
        }

        let mut negate = self.scan.eat(b'-');
        if negate {
            self.scan.eat_opt_white();
        }

        let scale_2x = self.parse_float_prefix(2.0, &[(b'*', "`*'"), (b'(', "`('")])?;

        let bias = self.scan.eat(b'(');
        if bias {
            self.scan.eat_opt_white();
        }

        let complement = self.parse_float_prefix(1.0, &[(b'-', "`-'"), (b'(', "`('")])?;

        // The dump writes the register's own negation right before the file name.
        if !negate && self.scan.eat(b'-') {
            self.scan.eat_opt_white();
            negate = true;
        }

        let file = self.parse_register_prefix()?;
        let first = self.parse_index()?;
        self.expect(b']', "`]'")?;

        let mut probe = self.scan;
        probe.eat_opt_white();
        let (index, indirect, dimension) = if probe.eat(b'[') {
            self.scan = probe;
            self.scan.eat_opt_white();
            let second = self.parse_index()?;
            self.expect(b']', "`]'")?;
            let (index, indirect) = second.split();
            (index, indirect, Some(first.split()))
        } else {
            let (index, indirect) = first.split();
            (index, indirect, None)
        };

        let mut src = FullSrcRegister::new(file, index);
        src.register.negate = negate;
        if let Some(address) = indirect {
            src.set_indirect(address);
        }
        if let Some((dim_index, dim_indirect)) = dimension {
            src.set_dimension(FullDimension {
                dimension: Dimension {
                    index: dim_index,
                    ..Default::default()
                },
                indirect: dim_indirect,
            });
        }

        let swizzle_at = self.scan;
        match self.parse_opt_swizzle()? {
            Some(ParsedSwizzle::Simple(swizzle)) => src.register.swizzle = swizzle,
            Some(ParsedSwizzle::Extended(swizzle)) => {
                if negate {
                    let mut at = swizzle_at;
                    at.eat_opt_white();
                    return Err(syntax_at(&at, SyntaxErrorKind::NegatedExtSwizzle));
                }
                src.ext_swz.ext_swizzle = swizzle;
            }
            None => {}
        }

        if complement {
            self.scan.eat_opt_white();
            self.expect(b')', "`)'")?;
        }
        if bias {
            self.parse_bias_close()?;
        }
        if scale_2x {
            self.scan.eat_opt_white();
            self.expect(b')', "`)'")?;
        }
        if absolute {
            self.scan.eat_opt_white();
            self.expect(b'|', "`|'")?;
        }
        if outer_negate {
            self.scan.eat_opt_white();
            self.expect(b')', "`)'")?;
        }

        src.ext_mod.complement = complement;
        src.ext_mod.bias = bias;
        src.ext_mod.scale_2x = scale_2x;
        src.ext_mod.absolute = absolute;
        src.ext_mod.negate = outer_negate;
        Ok(src)
    }

    /// Closes a bias group with either `) - 0.5` or `- 0.5)`.
    fn parse_bias_close(&mut self) -> Result<()> {
        self.scan.eat_opt_white();
        let paren_first = self.scan.eat(b')');
        if paren_first {
            self.scan.eat_opt_white();
        }
        self.expect(b'-', "`-'")?;
        self.scan.eat_opt_white();
        if self.scan.parse_float() != Some(0.5) {
            return Err(self.syntax(SyntaxErrorKind::Expected("`0.5'")));
        }
        if !paren_first {
            self.scan.eat_opt_white();
            self.expect(b')', "`)'")?;
        }
        Ok(())
    }

    fn parse_texture(&mut self) -> Result<Texture> {
        Texture::ALL
            .iter()
            .copied()
            .find(|texture| self.scan.match_word(texture.short_name()))
            .ok_or_else(|| self.syntax(SyntaxErrorKind::Expected("texture target")))
    }

    fn match_opcode(&mut self) -> Option<(Opcode, Saturate)> {
        for opcode in Opcode::iter() {
            let info = opcode.info();
            let mut probe = self.scan;
            if !probe.match_no_case(info.mnemonic) {
                continue;
            }
            let saturate = if probe.match_no_case("_SATNV") {
                Saturate::MinusPlusOne
            } else if probe.match_no_case("_SAT") {
                Saturate::ZeroOne
            } else {
                Saturate::None
            };

            let operands = info.num_dst + info.num_src + u8::from(info.is_tex);
            let terminated = if operands == 0 {
                !probe.at_ident_char()
            } else {
                probe.at_end() || probe.eat_white()
            };
            if terminated {
                self.scan = probe;
                return Some((opcode, saturate));
            }
        }
        None
    }

    fn parse_instruction(&mut self, has_label: bool) -> Result<()> {
        let Some((opcode, saturate)) = self.match_opcode() else {
            return Err(self.syntax(if has_label {
                SyntaxErrorKind::UnknownOpcode
            } else {
                SyntaxErrorKind::ExpectedStatement
            }));
        };
        let info = opcode.info();
        let mut insn = FullInstruction::new(opcode).with_saturate(saturate);

        let num_dst = usize::from(info.num_dst);
        let num_src = usize::from(info.num_src);
        for i in 0..num_dst + num_src + usize::from(info.is_tex) {
            if i > 0 {
                self.scan.eat_opt_white();
                self.expect(b',', "`,'")?;
                self.scan.eat_opt_white();
            }
            if i < num_dst {
                let dst = self.parse_dst_operand()?;
                insn.push_dst(dst);
            } else if i < num_dst + num_src {
                let src = self.parse_src_operand()?;
                insn.push_src(src);
            } else {
                insn.ext_texture.texture = self.parse_texture()?;
            }
        }

        if info.is_branch {
            self.scan.eat_opt_white();
            self.expect(b':', "`:'")?;
            self.scan.eat_opt_white();
            let start = self.scan;
            let label = self
                .scan
                .parse_uint()
                .ok_or_else(|| self.syntax(SyntaxErrorKind::Expected("a label")))?;
            insn.ext_label.label = u32::try_from(label)
                .ok()
                .filter(|&label| label <= MAX_LABEL)
                .ok_or_else(|| {
                    syntax_at(
                        &start,
                        SyntaxErrorKind::IndexOutOfRange {
                            value: i64::try_from(label).unwrap_or(i64::MAX),
                            max: i64::from(MAX_LABEL),
                        },
                    )
                })?;
        }

        self.builder.append_instruction(&insn)?;
        self.instructions += 1;
        Ok(())
    }

    fn parse_declaration(&mut self) -> Result<()> {
        if !self.scan.eat_white() {
            return Err(self.syntax(SyntaxErrorKind::MissingWhiteSpace));
        }
        let file = self.parse_register_prefix()?;

        let first_at = self.scan;
        let first = self.expect_uint()?;
        self.scan.eat_opt_white();
        let mut last_at = first_at;
        let mut last = first;
        if self.scan.match_no_case("..") {
            self.scan.eat_opt_white();
            last_at = self.scan;
            last = self.expect_uint()?;
            self.scan.eat_opt_white();
        }
        self.expect(b']', "`]'")?;

        for (value, at) in [(first, first_at), (last, last_at)] {
            if value > MAX_DECL_INDEX {
                return Err(syntax_at(
                    &at,
                    SyntaxErrorKind::IndexOutOfRange {
                        value: i64::try_from(value).unwrap_or(i64::MAX),
                        max: MAX_DECL_INDEX as i64,
                    },
                ));
            }
        }
        if last < first {
            return Err(syntax_at(
                &last_at,
                SyntaxErrorKind::ReversedRange { first, last },
            ));
        }

        let mask = self.parse_opt_writemask()?;
        let mut decl = FullDeclaration::new(file, first as u16, last as u16).with_usage_mask(mask);

        let mut probe = self.scan;
        probe.eat_opt_white();
        if probe.eat(b',') {
            probe.eat_opt_white();
            if let Some(name) = Semantic::ALL
                .iter()
                .copied()
                .find(|s| probe.match_word(s.short_name()))
            {
                self.scan = probe;
                let index = self.parse_semantic_index()?;
                decl = decl.with_semantic(name, index);
            }
        }

        let mut probe = self.scan;
        probe.eat_opt_white();
        if probe.eat(b',') {
            probe.eat_opt_white();
            self.scan = probe;
            let interpolate = Interpolate::SUPPORTED
                .iter()
                .copied()
                .find(|i| self.scan.match_word(i.short_name()))
                .ok_or_else(|| {
                    self.syntax(SyntaxErrorKind::Expected(
                        "semantic or interpolate attribute",
                    ))
                })?;
            decl = decl.with_interpolate(interpolate);
        }

        self.builder.append_declaration(&decl)?;
        Ok(())
    }

    /// Optional `[n]` after a semantic name.
    fn parse_semantic_index(&mut self) -> Result<u16> {
        let mut probe = self.scan;
        probe.eat_opt_white();
        if !probe.eat(b'[') {
            return Ok(0);
        }
        self.scan = probe;
        self.scan.eat_opt_white();
        let at = self.scan;
        let index = self.expect_uint()?;
        let index = u16::try_from(index).map_err(|_| {
            syntax_at(
                &at,
                SyntaxErrorKind::IndexOutOfRange {
                    value: i64::try_from(index).unwrap_or(i64::MAX),
                    max: MAX_DECL_INDEX as i64,
                },
            )
        })?;
        self.scan.eat_opt_white();
        self.expect(b']', "`]'")?;
        Ok(index)
    }

    fn parse_immediate(&mut self) -> Result<()> {
        if !self.scan.eat_white() {
            return Err(self.syntax(SyntaxErrorKind::MissingWhiteSpace));
        }
        if !self.scan.match_word("FLT32") {
            return Err(self.syntax(SyntaxErrorKind::Expected("`FLT32'")));
        }
        self.scan.eat_opt_white();
        self.expect(b'{', "`{'")?;

        let mut values = [0f32; 4];
        for (i, value) in values.iter_mut().enumerate() {
            self.scan.eat_opt_white();
            if i > 0 {
                self.expect(b',', "`,'")?;
                self.scan.eat_opt_white();
            }
            *value = self.scan.parse_float().ok_or_else(|| {
                self.syntax(SyntaxErrorKind::Expected("literal floating point"))
            })?;
        }
        self.scan.eat_opt_white();
        self.expect(b'}', "`}'")?;

        self.builder
            .append_immediate(&FullImmediate::float32(&values))?;
        Ok(())
    }
}

/// Translates `text` into `tokens`, returning the number of words written.
///
/// On error the contents of `tokens` are unspecified.
pub fn translate_into(text: &str, tokens: &mut [u32], sanity_check: bool) -> Result<usize> {
    let mut scan = Scanner::new(text);
    scan.eat_opt_white();
    let processor = parse_header(&mut scan)?;
    debug!(%processor, "parsed header");

    let mut translator = Translator {
        scan,
        builder: TokenBuilder::new(tokens, processor)?,
        instructions: 0,
    };
    translator.run()?;
    let instructions = translator.instructions;
    let len = translator.builder.finish();
    debug!(tokens = len, instructions, "translated program");

    if sanity_check {
        let report = tgsi::check(&tokens[..len]).map_err(TranslateError::Malformed)?;
        if !report.is_ok() {
            return Err(TranslateError::Sanity(report));
        }
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_ignore_case() {
        for (text, processor) in [
            ("FRAG1.1", ProcessorType::Fragment),
            ("vert1.1", ProcessorType::Vertex),
            ("Geom1.1", ProcessorType::Geometry),
        ] {
            let mut scan = Scanner::new(text);
            assert_eq!(parse_header(&mut scan).unwrap(), processor);
            assert!(scan.at_end());
        }

        let mut scan = Scanner::new("FRAG2.0");
        let err = parse_header(&mut scan).unwrap_err();
        assert_eq!(
            err.syntax().map(|e| e.kind.clone()),
            Some(SyntaxErrorKind::UnknownHeader)
        );
    }

    #[test]
    fn operand_indices_are_signed_16_bit() {
        assert_eq!(operand_index(0, false), Some(0));
        assert_eq!(operand_index(32767, false), Some(i16::MAX));
        assert_eq!(operand_index(32768, false), None);
        assert_eq!(operand_index(32768, true), Some(i16::MIN));
        assert_eq!(operand_index(u64::MAX, false), None);
    }

    #[test]
    fn labels_need_a_colon() {
        let mut tokens = [0u32; 16];
        let mut translator = Translator {
            scan: Scanner::new("12 : MOV"),
            builder: TokenBuilder::new(&mut tokens, ProcessorType::Fragment).unwrap(),
            instructions: 0,
        };
        assert_eq!(translator.parse_label(), Some(12));
        translator.scan.eat_opt_white();
        assert!(translator.scan.match_word("MOV"));

        translator.scan = Scanner::new("12 MOV");
        assert_eq!(translator.parse_label(), None);
        assert_eq!(translator.scan.pos(), 0);
    }
}
