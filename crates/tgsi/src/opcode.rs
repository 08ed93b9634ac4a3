//! Instruction opcodes and their static metadata.
//!
//! The numbering is the legacy dense layout (`ARL = 0` through `END = 117`). Each opcode
//! carries the mnemonic used by the text syntax and the dump, the operand counts the
//! sanity checker validates against, and whether it takes a texture target or a branch
//! label.

use core::fmt;

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub mnemonic: &'static str,
    pub num_dst: u8,
    pub num_src: u8,
    /// Takes a texture target operand.
    pub is_tex: bool,
    /// Takes a `:label` operand.
    pub is_branch: bool,
}

macro_rules! opcodes {
    ($($variant:ident = $raw:literal, $mnemonic:literal, $dst:literal, $src:literal, $tex:literal, $branch:literal;)+) => {
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Opcode {
            $($variant = $raw,)+
        }

        static INFO: &[OpcodeInfo] = &[
            $(OpcodeInfo {
                mnemonic: $mnemonic,
                num_dst: $dst,
                num_src: $src,
                is_tex: $tex != 0,
                is_branch: $branch != 0,
            },)+
        ];

        static ALL: &[Opcode] = &[$(Opcode::$variant,)+];

        impl Opcode {
            pub fn from_raw(raw: u32) -> Option<Self> {
                match raw {
                    $($raw => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    Arl = 0, "ARL", 1, 1, 0, 0;
    Mov = 1, "MOV", 1, 1, 0, 0;
    Lit = 2, "LIT", 1, 1, 0, 0;
    Rcp = 3, "RCP", 1, 1, 0, 0;
    Rsq = 4, "RSQ", 1, 1, 0, 0;
    Exp = 5, "EXP", 1, 1, 0, 0;
    Log = 6, "LOG", 1, 1, 0, 0;
    Mul = 7, "MUL", 1, 2, 0, 0;
    Add = 8, "ADD", 1, 2, 0, 0;
    Dp3 = 9, "DP3", 1, 2, 0, 0;
    Dp4 = 10, "DP4", 1, 2, 0, 0;
    Dst = 11, "DST", 1, 2, 0, 0;
    Min = 12, "MIN", 1, 2, 0, 0;
    Max = 13, "MAX", 1, 2, 0, 0;
    Slt = 14, "SLT", 1, 2, 0, 0;
    Sge = 15, "SGE", 1, 2, 0, 0;
    Mad = 16, "MAD", 1, 3, 0, 0;
    Sub = 17, "SUB", 1, 2, 0, 0;
    Lerp = 18, "LERP", 1, 3, 0, 0;
    Cnd = 19, "CND", 1, 3, 0, 0;
    Cnd0 = 20, "CND0", 1, 3, 0, 0;
    Dot2Add = 21, "DOT2ADD", 1, 3, 0, 0;
    Index = 22, "INDEX", 1, 2, 0, 0;
    Negate = 23, "NEGATE", 1, 1, 0, 0;
    Frac = 24, "FRAC", 1, 1, 0, 0;
    Clamp = 25, "CLAMP", 1, 3, 0, 0;
    Floor = 26, "FLOOR", 1, 1, 0, 0;
    Round = 27, "ROUND", 1, 1, 0, 0;
    ExpBase2 = 28, "EXPBASE2", 1, 1, 0, 0;
    LogBase2 = 29, "LOGBASE2", 1, 1, 0, 0;
    Power = 30, "POWER", 1, 2, 0, 0;
    CrossProduct = 31, "CROSSPRODUCT", 1, 2, 0, 0;
    MultiplyMatrix = 32, "MULTIPLYMATRIX", 1, 2, 0, 0;
    Abs = 33, "ABS", 1, 1, 0, 0;
    Rcc = 34, "RCC", 1, 1, 0, 0;
    Dph = 35, "DPH", 1, 2, 0, 0;
    Cos = 36, "COS", 1, 1, 0, 0;
    Ddx = 37, "DDX", 1, 1, 0, 0;
    Ddy = 38, "DDY", 1, 1, 0, 0;
    Kilp = 39, "KILP", 0, 0, 0, 0;
    Pk2h = 40, "PK2H", 1, 1, 0, 0;
    Pk2us = 41, "PK2US", 1, 1, 0, 0;
    Pk4b = 42, "PK4B", 1, 1, 0, 0;
    Pk4ub = 43, "PK4UB", 1, 1, 0, 0;
    Rfl = 44, "RFL", 1, 2, 0, 0;
    Seq = 45, "SEQ", 1, 2, 0, 0;
    Sfl = 46, "SFL", 1, 2, 0, 0;
    Sgt = 47, "SGT", 1, 2, 0, 0;
    Sin = 48, "SIN", 1, 1, 0, 0;
    Sle = 49, "SLE", 1, 2, 0, 0;
    Sne = 50, "SNE", 1, 2, 0, 0;
    Str = 51, "STR", 1, 2, 0, 0;
    Tex = 52, "TEX", 1, 2, 1, 0;
    Txd = 53, "TXD", 1, 4, 1, 0;
    Txp = 54, "TXP", 1, 2, 1, 0;
    Up2h = 55, "UP2H", 1, 1, 0, 0;
    Up2us = 56, "UP2US", 1, 1, 0, 0;
    Up4b = 57, "UP4B", 1, 1, 0, 0;
    Up4ub = 58, "UP4UB", 1, 1, 0, 0;
    X2d = 59, "X2D", 1, 3, 0, 0;
    Ara = 60, "ARA", 1, 1, 0, 0;
    Arr = 61, "ARR", 1, 1, 0, 0;
    Bra = 62, "BRA", 0, 1, 0, 0;
    Cal = 63, "CAL", 0, 0, 0, 1;
    Ret = 64, "RET", 0, 0, 0, 0;
    Ssg = 65, "SSG", 1, 1, 0, 0;
    Cmp = 66, "CMP", 1, 3, 0, 0;
    Scs = 67, "SCS", 1, 1, 0, 0;
    Txb = 68, "TXB", 1, 2, 1, 0;
    Nrm = 69, "NRM", 1, 1, 0, 0;
    Div = 70, "DIV", 1, 2, 0, 0;
    Dp2 = 71, "DP2", 1, 2, 0, 0;
    Txl = 72, "TXL", 1, 2, 1, 0;
    Brk = 73, "BRK", 0, 0, 0, 0;
    If = 74, "IF", 0, 1, 0, 1;
    Loop = 75, "LOOP", 1, 1, 0, 0;
    Rep = 76, "REP", 0, 1, 0, 0;
    Else = 77, "ELSE", 0, 0, 0, 1;
    EndIf = 78, "ENDIF", 0, 0, 0, 0;
    EndLoop = 79, "ENDLOOP", 1, 0, 0, 0;
    EndRep = 80, "ENDREP", 0, 0, 0, 0;
    PushA = 81, "PUSHA", 0, 1, 0, 0;
    PopA = 82, "POPA", 1, 0, 0, 0;
    Ceil = 83, "CEIL", 1, 1, 0, 0;
    I2f = 84, "I2F", 1, 1, 0, 0;
    Not = 85, "NOT", 1, 1, 0, 0;
    Trunc = 86, "TRUNC", 1, 1, 0, 0;
    Shl = 87, "SHL", 1, 2, 0, 0;
    Shr = 88, "SHR", 1, 2, 0, 0;
    And = 89, "AND", 1, 2, 0, 0;
    Or = 90, "OR", 1, 2, 0, 0;
    Mod = 91, "MOD", 1, 2, 0, 0;
    Xor = 92, "XOR", 1, 2, 0, 0;
    Sad = 93, "SAD", 1, 3, 0, 0;
    Txf = 94, "TXF", 1, 2, 1, 0;
    Txq = 95, "TXQ", 1, 2, 1, 0;
    Cont = 96, "CONT", 0, 0, 0, 0;
    Emit = 97, "EMIT", 0, 0, 0, 0;
    EndPrim = 98, "ENDPRIM", 0, 0, 0, 0;
    BgnLoop2 = 99, "BGNLOOP2", 0, 0, 0, 1;
    BgnSub = 100, "BGNSUB", 0, 0, 0, 0;
    EndLoop2 = 101, "ENDLOOP2", 0, 0, 0, 1;
    EndSub = 102, "ENDSUB", 0, 0, 0, 0;
    Noise1 = 103, "NOISE1", 1, 1, 0, 0;
    Noise2 = 104, "NOISE2", 1, 1, 0, 0;
    Noise3 = 105, "NOISE3", 1, 1, 0, 0;
    Noise4 = 106, "NOISE4", 1, 1, 0, 0;
    Nop = 107, "NOP", 0, 0, 0, 0;
    M4x3 = 108, "M4X3", 1, 2, 0, 0;
    M3x4 = 109, "M3X4", 1, 2, 0, 0;
    M3x3 = 110, "M3X3", 1, 2, 0, 0;
    M3x2 = 111, "M3X2", 1, 2, 0, 0;
    Nrm4 = 112, "NRM4", 1, 1, 0, 0;
    CallNz = 113, "CALLNZ", 0, 1, 0, 0;
    Ifc = 114, "IFC", 0, 1, 0, 0;
    BreakC = 115, "BREAKC", 0, 1, 0, 0;
    Kil = 116, "KIL", 0, 1, 0, 0;
    End = 117, "END", 0, 0, 0, 0;
}

/// Number of opcodes in the table.
pub const NUM_OPCODES: usize = 118;

impl Opcode {
    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn info(self) -> &'static OpcodeInfo {
        &INFO[self as usize]
    }

    pub fn mnemonic(self) -> &'static str {
        self.info().mnemonic
    }

    /// All opcodes in numeric order; the text translator matches mnemonics in this order.
    pub fn iter() -> impl Iterator<Item = Opcode> {
        ALL.iter().copied()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Looks up the metadata of a raw opcode value.
pub fn opcode_info(raw: u32) -> Option<&'static OpcodeInfo> {
    Opcode::from_raw(raw).map(Opcode::info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_dense_and_ordered() {
        assert_eq!(INFO.len(), NUM_OPCODES);
        assert_eq!(ALL.len(), NUM_OPCODES);
        for (i, op) in Opcode::iter().enumerate() {
            assert_eq!(op.raw() as usize, i);
            assert_eq!(Opcode::from_raw(i as u32), Some(op));
        }
        assert_eq!(Opcode::from_raw(NUM_OPCODES as u32), None);
    }

    #[test]
    fn mnemonics_are_unique() {
        let mut names: Vec<_> = Opcode::iter().map(Opcode::mnemonic).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), NUM_OPCODES);
    }

    #[test]
    fn texture_and_branch_metadata() {
        assert!(Opcode::Tex.info().is_tex);
        assert_eq!(Opcode::Txd.info().num_src, 4);
        assert!(!Opcode::Mov.info().is_tex);
        for op in [Opcode::If, Opcode::Else, Opcode::BgnLoop2, Opcode::EndLoop2, Opcode::Cal] {
            assert!(op.info().is_branch, "{op}");
        }
        assert_eq!(
            *Opcode::Mad.info(),
            OpcodeInfo {
                mnemonic: "MAD",
                num_dst: 1,
                num_src: 3,
                is_tex: false,
                is_branch: false,
            }
        );
        assert_eq!(Opcode::End.raw(), 117);
        assert_eq!(Opcode::Kilp.raw(), 39);
    }

    #[test]
    fn operand_counts_fit_the_instruction_token() {
        for op in Opcode::iter() {
            assert!(op.info().num_dst <= 2, "{op}");
            assert!(op.info().num_src <= 4, "{op}");
        }
    }
}
