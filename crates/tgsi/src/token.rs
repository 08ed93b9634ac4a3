//! Bit layouts of the individual TGSI tokens.
//!
//! Every token is a single 32-bit word. The structs in this module hold the
//! decoded fields of one token each. Framing bits (`Extended`, `Padding`) are
//! not stored: they only exist in the encoded words and are maintained by the
//! builder and consumed by the parser.

use core::fmt;

use bitflags::bitflags;

use crate::opcode::Opcode;

/// A bit field inside a token word.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Field {
    shift: u32,
    width: u32,
}

impl Field {
    const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    const fn mask(self) -> u32 {
        ((1u64 << self.width) - 1) as u32
    }

    pub(crate) fn get(self, word: u32) -> u32 {
        (word >> self.shift) & self.mask()
    }

    pub(crate) fn put(self, value: u32) -> u32 {
        debug_assert!(value <= self.mask(), "value {value} does not fit {self:?}");
        (value & self.mask()) << self.shift
    }

    fn flag(self, word: u32) -> bool {
        self.get(word) != 0
    }

    fn put_flag(self, value: bool) -> u32 {
        self.put(u32::from(value))
    }

    fn get_i16(self, word: u32) -> i16 {
        self.get(word) as u16 as i16
    }

    fn put_i16(self, value: i16) -> u32 {
        self.put(u32::from(value as u16))
    }
}

/// Common `Type` field of declaration, immediate and instruction tokens, and of every
/// extension token.
pub(crate) const TYPE: Field = Field::new(0, 4);
/// Common `Size` field of declaration, immediate and instruction tokens.
pub(crate) const SIZE: Field = Field::new(4, 8);

/// If set, another extension token follows this one.
pub const EXTENDED_BIT: u32 = 0x8000_0000;

/// Current token stream version.
pub const MAJOR_VERSION: u8 = 1;
pub const MINOR_VERSION: u8 = 1;

/// Returns the `Type` field shared by all body tokens.
pub fn token_type_raw(word: u32) -> u32 {
    TYPE.get(word)
}

/// Returns the `Size` field shared by declaration, immediate and instruction tokens.
pub fn token_size(word: u32) -> u8 {
    SIZE.get(word) as u8
}

pub fn is_extended(word: u32) -> bool {
    word & EXTENDED_BIT != 0
}

/// Marks `word` as being followed by an extension token.
pub fn set_extended(word: &mut u32) {
    *word |= EXTENDED_BIT;
}

/// A token field holding a value that has no meaning in the current format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub value: u32,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} value {}", self.field, self.value)
    }
}

impl std::error::Error for FieldError {}

fn decode_enum<T>(
    field: &'static str,
    raw: u32,
    from_raw: impl FnOnce(u32) -> Option<T>,
) -> Result<T, FieldError> {
    from_raw(raw).ok_or(FieldError { field, value: raw })
}

/// Declares a dense `#[repr(u8)]` token enum together with its raw conversions and the
/// short (text syntax) and long (verbose dump) names of each value.
macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $raw:literal => $short:literal, $long:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant = $raw,)+
        }

        impl $name {
            /// All values in numeric order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn from_raw(raw: u32) -> Option<Self> {
                match raw {
                    $($raw => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn raw(self) -> u32 {
                self as u32
            }

            /// Name used by the text syntax and the compact dump.
            pub fn short_name(self) -> &'static str {
                match self {
                    $(Self::$variant => $short,)+
                }
            }

            /// Name used by the verbose dump.
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $long,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.short_name())
            }
        }
    };
}

token_enum! {
    /// Shader stage recorded in the processor token.
    pub enum ProcessorType {
        Fragment = 0 => "FRAG", "PROCESSOR_FRAGMENT";
        Vertex = 1 => "VERT", "PROCESSOR_VERTEX";
        Geometry = 2 => "GEOM", "PROCESSOR_GEOMETRY";
    }
}

token_enum! {
    pub enum TokenType {
        Declaration = 0 => "DCL", "TOKEN_TYPE_DECLARATION";
        Immediate = 1 => "IMM", "TOKEN_TYPE_IMMEDIATE";
        Instruction = 2 => "INSN", "TOKEN_TYPE_INSTRUCTION";
    }
}

token_enum! {
    pub enum RegisterFile {
        Null = 0 => "NULL", "FILE_NULL";
        Constant = 1 => "CONST", "FILE_CONSTANT";
        Input = 2 => "IN", "FILE_INPUT";
        Output = 3 => "OUT", "FILE_OUTPUT";
        Temporary = 4 => "TEMP", "FILE_TEMPORARY";
        Sampler = 5 => "SAMP", "FILE_SAMPLER";
        Address = 6 => "ADDR", "FILE_ADDRESS";
        Immediate = 7 => "IMM", "FILE_IMMEDIATE";
    }
}

token_enum! {
    pub enum Interpolate {
        Constant = 0 => "CONSTANT", "INTERPOLATE_CONSTANT";
        Linear = 1 => "LINEAR", "INTERPOLATE_LINEAR";
        Perspective = 2 => "PERSPECTIVE", "INTERPOLATE_PERSPECTIVE";
        Attrib = 3 => "ATTRIB", "INTERPOLATE_ATTRIB";
    }
}

impl Interpolate {
    /// Modes the builder and the text syntax accept. `Attrib` is only ever decoded.
    pub const SUPPORTED: &'static [Interpolate] = &[
        Interpolate::Constant,
        Interpolate::Linear,
        Interpolate::Perspective,
    ];
}

token_enum! {
    pub enum Semantic {
        Position = 0 => "POSITION", "SEMANTIC_POSITION";
        Color = 1 => "COLOR", "SEMANTIC_COLOR";
        BColor = 2 => "BCOLOR", "SEMANTIC_BCOLOR";
        Fog = 3 => "FOG", "SEMANTIC_FOG";
        PSize = 4 => "PSIZE", "SEMANTIC_PSIZE";
        Generic = 5 => "GENERIC", "SEMANTIC_GENERIC";
        Normal = 6 => "NORMAL", "SEMANTIC_NORMAL";
    }
}

token_enum! {
    pub enum ImmediateDataType {
        Float32 = 0 => "FLT32", "IMM_FLOAT32";
    }
}

token_enum! {
    pub enum Saturate {
        None = 0 => "", "SAT_NONE";
        ZeroOne = 1 => "_SAT", "SAT_ZERO_ONE";
        MinusPlusOne = 2 => "_SAT[-1,1]", "SAT_MINUS_PLUS_ONE";
    }
}

token_enum! {
    pub enum InstructionExtType {
        Nv = 0 => "NV", "INSTRUCTION_EXT_TYPE_NV";
        Label = 1 => "LABEL", "INSTRUCTION_EXT_TYPE_LABEL";
        Texture = 2 => "TEXTURE", "INSTRUCTION_EXT_TYPE_TEXTURE";
    }
}

token_enum! {
    pub enum Precision {
        Default = 0 => "DEFAULT", "PRECISION_DEFAULT";
        Float32 = 1 => "FLOAT32", "PRECISION_FLOAT32";
        Float16 = 2 => "FLOAT16", "PRECISION_FLOAT16";
        Fixed12 = 3 => "FIXED12", "PRECISION_FIXED12";
    }
}

token_enum! {
    /// Condition code tested by NV-style conditional execution.
    pub enum CondCode {
        Gt = 0 => "GT", "CC_GT";
        Eq = 1 => "EQ", "CC_EQ";
        Lt = 2 => "LT", "CC_LT";
        Un = 3 => "UN", "CC_UN";
        Ge = 4 => "GE", "CC_GE";
        Le = 5 => "LE", "CC_LE";
        Ne = 6 => "NE", "CC_NE";
        Tr = 7 => "TR", "CC_TR";
        Fl = 8 => "FL", "CC_FL";
    }
}

token_enum! {
    pub enum Texture {
        Unknown = 0 => "UNKNOWN", "TEXTURE_UNKNOWN";
        Tex1D = 1 => "1D", "TEXTURE_1D";
        Tex2D = 2 => "2D", "TEXTURE_2D";
        Tex3D = 3 => "3D", "TEXTURE_3D";
        Cube = 4 => "CUBE", "TEXTURE_CUBE";
        Rect = 5 => "RECT", "TEXTURE_RECT";
        Shadow1D = 6 => "SHADOW1D", "TEXTURE_SHADOW1D";
        Shadow2D = 7 => "SHADOW2D", "TEXTURE_SHADOW2D";
        ShadowRect = 8 => "SHADOWRECT", "TEXTURE_SHADOWRECT";
    }
}

token_enum! {
    /// Source component selected by a simple swizzle.
    pub enum Swizzle {
        X = 0 => "x", "SWIZZLE_X";
        Y = 1 => "y", "SWIZZLE_Y";
        Z = 2 => "z", "SWIZZLE_Z";
        W = 3 => "w", "SWIZZLE_W";
    }
}

token_enum! {
    /// Source component selected by an extended swizzle, which may also produce constants.
    pub enum ExtSwizzle {
        X = 0 => "x", "EXTSWIZZLE_X";
        Y = 1 => "y", "EXTSWIZZLE_Y";
        Z = 2 => "z", "EXTSWIZZLE_Z";
        W = 3 => "w", "EXTSWIZZLE_W";
        Zero = 4 => "0", "EXTSWIZZLE_ZERO";
        One = 5 => "1", "EXTSWIZZLE_ONE";
    }
}

token_enum! {
    pub enum SrcExtType {
        Swz = 0 => "SWZ", "SRC_REGISTER_EXT_TYPE_SWZ";
        Mod = 1 => "MOD", "SRC_REGISTER_EXT_TYPE_MOD";
    }
}

token_enum! {
    pub enum DstExtType {
        Condcode = 0 => "CONDCODE", "DST_REGISTER_EXT_TYPE_CONDCODE";
        Modulate = 1 => "MODULATE", "DST_REGISTER_EXT_TYPE_MODULATE";
    }
}

token_enum! {
    /// Result scaling applied when writing a destination register.
    pub enum Modulate {
        X1 = 0 => "", "MODULATE_1X";
        X2 = 1 => "_2X", "MODULATE_2X";
        X4 = 2 => "_4X", "MODULATE_4X";
        X8 = 3 => "_8X", "MODULATE_8X";
        Half = 4 => "_D2", "MODULATE_HALF";
        Quarter = 5 => "_D4", "MODULATE_QUARTER";
        Eighth = 6 => "_D8", "MODULATE_EIGHTH";
    }
}

impl Swizzle {
    /// The swizzle that selects each component from itself.
    pub const IDENTITY: [Swizzle; 4] = [Swizzle::X, Swizzle::Y, Swizzle::Z, Swizzle::W];
}

impl ExtSwizzle {
    pub const IDENTITY: [ExtSwizzle; 4] =
        [ExtSwizzle::X, ExtSwizzle::Y, ExtSwizzle::Z, ExtSwizzle::W];

    /// The plain component this extended swizzle selects, or `None` for `0`/`1`.
    pub fn component(self) -> Option<Swizzle> {
        Swizzle::from_raw(self.raw())
    }
}

impl From<Swizzle> for ExtSwizzle {
    fn from(value: Swizzle) -> Self {
        match value {
            Swizzle::X => ExtSwizzle::X,
            Swizzle::Y => ExtSwizzle::Y,
            Swizzle::Z => ExtSwizzle::Z,
            Swizzle::W => ExtSwizzle::W,
        }
    }
}

bitflags! {
    /// Component write/usage mask.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct WriteMask: u8 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const Z = 1 << 2;
        const W = 1 << 3;
        const XY = Self::X.bits() | Self::Y.bits();
        const XYZ = Self::XY.bits() | Self::Z.bits();
        const XYZW = Self::XYZ.bits() | Self::W.bits();
    }
}

impl WriteMask {
    /// Lowercase component letters, e.g. `xz`.
    pub fn letters(self) -> String {
        [(Self::X, 'x'), (Self::Y, 'y'), (Self::Z, 'z'), (Self::W, 'w')]
            .into_iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, c)| c)
            .collect()
    }
}

fn swizzle_fields(first_shift: u32) -> [Field; 4] {
    [0, 1, 2, 3].map(|i| Field::new(first_shift + 2 * i, 2))
}

fn decode_swizzle(word: u32, first_shift: u32, field: &'static str) -> Result<[Swizzle; 4], FieldError> {
    let fields = swizzle_fields(first_shift);
    let mut out = Swizzle::IDENTITY;
    for (slot, f) in out.iter_mut().zip(fields) {
        *slot = decode_enum(field, f.get(word), Swizzle::from_raw)?;
    }
    Ok(out)
}

fn encode_swizzle(swizzle: [Swizzle; 4], first_shift: u32) -> u32 {
    swizzle_fields(first_shift)
        .into_iter()
        .zip(swizzle)
        .fold(0, |acc, (f, s)| acc | f.put(s.raw()))
}

// ---- Stream prefix ----

const VERSION_MAJOR: Field = Field::new(0, 8);
const VERSION_MINOR: Field = Field::new(8, 8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub fn decode(word: u32) -> Self {
        Self {
            major: VERSION_MAJOR.get(word) as u8,
            minor: VERSION_MINOR.get(word) as u8,
        }
    }

    pub fn encode(&self) -> u32 {
        VERSION_MAJOR.put(self.major.into()) | VERSION_MINOR.put(self.minor.into())
    }
}

const HEADER_SIZE: Field = Field::new(0, 8);
const HEADER_BODY_SIZE: Field = Field::new(8, 24);

/// Largest `BodySize` the header can record.
pub const MAX_BODY_SIZE: u32 = 0xFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Prefix tokens after the version token, including the header itself.
    pub header_size: u8,
    /// Tokens following the prefix.
    pub body_size: u32,
}

impl Header {
    pub fn decode(word: u32) -> Self {
        Self {
            header_size: HEADER_SIZE.get(word) as u8,
            body_size: HEADER_BODY_SIZE.get(word),
        }
    }

    pub fn encode(&self) -> u32 {
        HEADER_SIZE.put(self.header_size.into()) | HEADER_BODY_SIZE.put(self.body_size)
    }
}

const PROCESSOR: Field = Field::new(0, 4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Processor {
    pub processor: ProcessorType,
}

impl Default for Processor {
    fn default() -> Self {
        Self {
            processor: ProcessorType::Fragment,
        }
    }
}

impl Processor {
    pub fn decode(word: u32) -> Result<Self, FieldError> {
        Ok(Self {
            processor: decode_enum("processor", PROCESSOR.get(word), ProcessorType::from_raw)?,
        })
    }

    pub fn encode(&self) -> u32 {
        PROCESSOR.put(self.processor.raw())
    }
}

// ---- Declarations ----

const DECL_FILE: Field = Field::new(12, 4);
const DECL_USAGE_MASK: Field = Field::new(16, 4);
const DECL_INTERPOLATE: Field = Field::new(20, 4);
const DECL_SEMANTIC: Field = Field::new(24, 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration {
    /// Tokens belonging to this declaration, including this one.
    pub size: u8,
    pub file: RegisterFile,
    pub usage_mask: WriteMask,
    pub interpolate: Interpolate,
    /// A semantic token follows the range token.
    pub semantic: bool,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            size: 1,
            file: RegisterFile::Null,
            usage_mask: WriteMask::XYZW,
            interpolate: Interpolate::Constant,
            semantic: false,
        }
    }
}

impl Declaration {
    pub fn decode(word: u32) -> Result<Self, FieldError> {
        Ok(Self {
            size: token_size(word),
            file: decode_enum("file", DECL_FILE.get(word), RegisterFile::from_raw)?,
            usage_mask: WriteMask::from_bits_truncate(DECL_USAGE_MASK.get(word) as u8),
            interpolate: decode_enum(
                "interpolate",
                DECL_INTERPOLATE.get(word),
                Interpolate::from_raw,
            )?,
            semantic: DECL_SEMANTIC.flag(word),
        })
    }

    pub fn encode(&self) -> u32 {
        TYPE.put(TokenType::Declaration.raw())
            | SIZE.put(self.size.into())
            | DECL_FILE.put(self.file.raw())
            | DECL_USAGE_MASK.put(self.usage_mask.bits().into())
            | DECL_INTERPOLATE.put(self.interpolate.raw())
            | DECL_SEMANTIC.put_flag(self.semantic)
    }
}

const RANGE_FIRST: Field = Field::new(0, 16);
const RANGE_LAST: Field = Field::new(16, 16);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeclarationRange {
    pub first: u16,
    pub last: u16,
}

impl DeclarationRange {
    pub fn decode(word: u32) -> Self {
        Self {
            first: RANGE_FIRST.get(word) as u16,
            last: RANGE_LAST.get(word) as u16,
        }
    }

    pub fn encode(&self) -> u32 {
        RANGE_FIRST.put(self.first.into()) | RANGE_LAST.put(self.last.into())
    }
}

const SEMANTIC_NAME: Field = Field::new(0, 8);
const SEMANTIC_INDEX: Field = Field::new(8, 16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeclarationSemantic {
    pub name: Semantic,
    pub index: u16,
}

impl Default for DeclarationSemantic {
    fn default() -> Self {
        Self {
            name: Semantic::Position,
            index: 0,
        }
    }
}

impl DeclarationSemantic {
    pub fn decode(word: u32) -> Result<Self, FieldError> {
        Ok(Self {
            name: decode_enum("semantic name", SEMANTIC_NAME.get(word), Semantic::from_raw)?,
            index: SEMANTIC_INDEX.get(word) as u16,
        })
    }

    pub fn encode(&self) -> u32 {
        SEMANTIC_NAME.put(self.name.raw()) | SEMANTIC_INDEX.put(self.index.into())
    }
}

// ---- Immediates ----

const IMM_DATA_TYPE: Field = Field::new(12, 4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Immediate {
    /// One plus the number of data tokens.
    pub size: u8,
    pub data_type: ImmediateDataType,
}

impl Default for Immediate {
    fn default() -> Self {
        Self {
            size: 1,
            data_type: ImmediateDataType::Float32,
        }
    }
}

impl Immediate {
    /// Returns the raw `DataType` field; the parser decides what to do with unknown types.
    pub fn data_type_raw(word: u32) -> u32 {
        IMM_DATA_TYPE.get(word)
    }

    pub fn decode(word: u32) -> Result<Self, FieldError> {
        Ok(Self {
            size: token_size(word),
            data_type: decode_enum(
                "immediate data type",
                IMM_DATA_TYPE.get(word),
                ImmediateDataType::from_raw,
            )?,
        })
    }

    pub fn encode(&self) -> u32 {
        TYPE.put(TokenType::Immediate.raw())
            | SIZE.put(self.size.into())
            | IMM_DATA_TYPE.put(self.data_type.raw())
    }
}

// ---- Instructions ----

const INSN_OPCODE: Field = Field::new(12, 8);
const INSN_SATURATE: Field = Field::new(20, 2);
const INSN_NUM_DST: Field = Field::new(22, 2);
const INSN_NUM_SRC: Field = Field::new(24, 4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Tokens belonging to this instruction, including this one.
    pub size: u8,
    pub opcode: Opcode,
    pub saturate: Saturate,
    pub num_dst_regs: u8,
    pub num_src_regs: u8,
}

impl Default for Instruction {
    fn default() -> Self {
        Self {
            size: 1,
            opcode: Opcode::Mov,
            saturate: Saturate::None,
            num_dst_regs: 1,
            num_src_regs: 1,
        }
    }
}

impl Instruction {
    pub fn decode(word: u32) -> Result<Self, FieldError> {
        Ok(Self {
            size: token_size(word),
            opcode: decode_enum("opcode", INSN_OPCODE.get(word), Opcode::from_raw)?,
            saturate: decode_enum("saturate", INSN_SATURATE.get(word), Saturate::from_raw)?,
            num_dst_regs: INSN_NUM_DST.get(word) as u8,
            num_src_regs: INSN_NUM_SRC.get(word) as u8,
        })
    }

    pub fn encode(&self) -> u32 {
        TYPE.put(TokenType::Instruction.raw())
            | SIZE.put(self.size.into())
            | INSN_OPCODE.put(self.opcode.raw())
            | INSN_SATURATE.put(self.saturate.raw())
            | INSN_NUM_DST.put(self.num_dst_regs.into())
            | INSN_NUM_SRC.put(self.num_src_regs.into())
    }
}

const NV_PRECISION: Field = Field::new(4, 4);
const NV_COND_DST_INDEX: Field = Field::new(8, 4);
const NV_COND_FLOW_INDEX: Field = Field::new(12, 4);
const NV_COND_MASK: Field = Field::new(16, 4);
const NV_COND_SWIZZLE_SHIFT: u32 = 20;
const NV_COND_DST_UPDATE: Field = Field::new(28, 1);
const NV_COND_FLOW_ENABLE: Field = Field::new(29, 1);

/// NV-style precision and condition code controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionExtNv {
    pub precision: Precision,
    pub cond_dst_index: u8,
    pub cond_flow_index: u8,
    pub cond_mask: CondCode,
    pub cond_swizzle: [Swizzle; 4],
    pub cond_dst_update: bool,
    pub cond_flow_enable: bool,
}

impl Default for InstructionExtNv {
    fn default() -> Self {
        Self {
            precision: Precision::Default,
            cond_dst_index: 0,
            cond_flow_index: 0,
            cond_mask: CondCode::Tr,
            cond_swizzle: Swizzle::IDENTITY,
            cond_dst_update: false,
            cond_flow_enable: false,
        }
    }
}

impl InstructionExtNv {
    pub fn decode(word: u32) -> Result<Self, FieldError> {
        Ok(Self {
            precision: decode_enum("precision", NV_PRECISION.get(word), Precision::from_raw)?,
            cond_dst_index: NV_COND_DST_INDEX.get(word) as u8,
            cond_flow_index: NV_COND_FLOW_INDEX.get(word) as u8,
            cond_mask: decode_enum("condition mask", NV_COND_MASK.get(word), CondCode::from_raw)?,
            cond_swizzle: decode_swizzle(word, NV_COND_SWIZZLE_SHIFT, "condition swizzle")?,
            cond_dst_update: NV_COND_DST_UPDATE.flag(word),
            cond_flow_enable: NV_COND_FLOW_ENABLE.flag(word),
        })
    }

    pub fn encode(&self) -> u32 {
        TYPE.put(InstructionExtType::Nv.raw())
            | NV_PRECISION.put(self.precision.raw())
            | NV_COND_DST_INDEX.put(self.cond_dst_index.into())
            | NV_COND_FLOW_INDEX.put(self.cond_flow_index.into())
            | NV_COND_MASK.put(self.cond_mask.raw())
            | encode_swizzle(self.cond_swizzle, NV_COND_SWIZZLE_SHIFT)
            | NV_COND_DST_UPDATE.put_flag(self.cond_dst_update)
            | NV_COND_FLOW_ENABLE.put_flag(self.cond_flow_enable)
    }
}

const LABEL: Field = Field::new(4, 24);

/// Largest label value the label extension can hold.
pub const MAX_LABEL: u32 = 0xFF_FFFF;

/// Branch target, as an instruction number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstructionExtLabel {
    pub label: u32,
}

impl InstructionExtLabel {
    pub fn decode(word: u32) -> Self {
        Self {
            label: LABEL.get(word),
        }
    }

    pub fn encode(&self) -> u32 {
        TYPE.put(InstructionExtType::Label.raw()) | LABEL.put(self.label)
    }
}

const TEXTURE: Field = Field::new(4, 8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionExtTexture {
    pub texture: Texture,
}

impl Default for InstructionExtTexture {
    fn default() -> Self {
        Self {
            texture: Texture::Unknown,
        }
    }
}

impl InstructionExtTexture {
    pub fn decode(word: u32) -> Result<Self, FieldError> {
        Ok(Self {
            texture: decode_enum("texture", TEXTURE.get(word), Texture::from_raw)?,
        })
    }

    pub fn encode(&self) -> u32 {
        TYPE.put(InstructionExtType::Texture.raw()) | TEXTURE.put(self.texture.raw())
    }
}

// ---- Registers ----

const REG_FILE: Field = Field::new(0, 4);
const REG_INDEX: Field = Field::new(15, 16);

const SRC_SWIZZLE_SHIFT: u32 = 4;
const SRC_NEGATE: Field = Field::new(12, 1);
const SRC_INDIRECT: Field = Field::new(13, 1);
const SRC_DIMENSION: Field = Field::new(14, 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrcRegister {
    pub file: RegisterFile,
    pub swizzle: [Swizzle; 4],
    pub negate: bool,
    /// An indirect-address register follows the extension chain.
    pub indirect: bool,
    /// A dimension token follows.
    pub dimension: bool,
    pub index: i16,
}

impl Default for SrcRegister {
    fn default() -> Self {
        Self {
            file: RegisterFile::Null,
            swizzle: Swizzle::IDENTITY,
            negate: false,
            indirect: false,
            dimension: false,
            index: 0,
        }
    }
}

impl SrcRegister {
    pub fn decode(word: u32) -> Result<Self, FieldError> {
        Ok(Self {
            file: decode_enum("file", REG_FILE.get(word), RegisterFile::from_raw)?,
            swizzle: decode_swizzle(word, SRC_SWIZZLE_SHIFT, "swizzle")?,
            negate: SRC_NEGATE.flag(word),
            indirect: SRC_INDIRECT.flag(word),
            dimension: SRC_DIMENSION.flag(word),
            index: REG_INDEX.get_i16(word),
        })
    }

    pub fn encode(&self) -> u32 {
        REG_FILE.put(self.file.raw())
            | encode_swizzle(self.swizzle, SRC_SWIZZLE_SHIFT)
            | SRC_NEGATE.put_flag(self.negate)
            | SRC_INDIRECT.put_flag(self.indirect)
            | SRC_DIMENSION.put_flag(self.dimension)
            | REG_INDEX.put_i16(self.index)
    }
}

const EXT_SWZ_SHIFT: u32 = 4;
const EXT_SWZ_NEGATE_SHIFT: u32 = 20;

fn ext_swizzle_fields() -> [Field; 4] {
    [0, 1, 2, 3].map(|i| Field::new(EXT_SWZ_SHIFT + 4 * i, 4))
}

fn ext_negate_fields() -> [Field; 4] {
    [0, 1, 2, 3].map(|i| Field::new(EXT_SWZ_NEGATE_SHIFT + i, 1))
}

/// Extended swizzle: per-component selection including the constants 0 and 1, plus
/// per-component negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrcRegisterExtSwz {
    pub ext_swizzle: [ExtSwizzle; 4],
    pub negate: [bool; 4],
}

impl Default for SrcRegisterExtSwz {
    fn default() -> Self {
        Self {
            ext_swizzle: ExtSwizzle::IDENTITY,
            negate: [false; 4],
        }
    }
}

impl SrcRegisterExtSwz {
    pub fn decode(word: u32) -> Result<Self, FieldError> {
        let mut out = Self::default();
        for (slot, f) in out.ext_swizzle.iter_mut().zip(ext_swizzle_fields()) {
            *slot = decode_enum("extended swizzle", f.get(word), ExtSwizzle::from_raw)?;
        }
        for (slot, f) in out.negate.iter_mut().zip(ext_negate_fields()) {
            *slot = f.flag(word);
        }
        Ok(out)
    }

    pub fn encode(&self) -> u32 {
        let swizzle = ext_swizzle_fields()
            .into_iter()
            .zip(self.ext_swizzle)
            .fold(0, |acc, (f, s)| acc | f.put(s.raw()));
        let negate = ext_negate_fields()
            .into_iter()
            .zip(self.negate)
            .fold(0, |acc, (f, n)| acc | f.put_flag(n));
        TYPE.put(SrcExtType::Swz.raw()) | swizzle | negate
    }
}

const MOD_COMPLEMENT: Field = Field::new(4, 1);
const MOD_BIAS: Field = Field::new(5, 1);
const MOD_SCALE_2X: Field = Field::new(6, 1);
const MOD_ABSOLUTE: Field = Field::new(7, 1);
const MOD_NEGATE: Field = Field::new(8, 1);

/// Source modifiers, applied in the order complement, bias, scale, absolute, negate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SrcRegisterExtMod {
    /// `1 - x`
    pub complement: bool,
    /// `x - 0.5`
    pub bias: bool,
    /// `2 * x`
    pub scale_2x: bool,
    pub absolute: bool,
    /// Negation applied after the absolute value.
    pub negate: bool,
}

impl SrcRegisterExtMod {
    pub fn decode(word: u32) -> Self {
        Self {
            complement: MOD_COMPLEMENT.flag(word),
            bias: MOD_BIAS.flag(word),
            scale_2x: MOD_SCALE_2X.flag(word),
            absolute: MOD_ABSOLUTE.flag(word),
            negate: MOD_NEGATE.flag(word),
        }
    }

    pub fn encode(&self) -> u32 {
        TYPE.put(SrcExtType::Mod.raw())
            | MOD_COMPLEMENT.put_flag(self.complement)
            | MOD_BIAS.put_flag(self.bias)
            | MOD_SCALE_2X.put_flag(self.scale_2x)
            | MOD_ABSOLUTE.put_flag(self.absolute)
            | MOD_NEGATE.put_flag(self.negate)
    }
}

const DIM_INDIRECT: Field = Field::new(0, 1);
const DIM_DIMENSION: Field = Field::new(1, 1);

/// Second-level register index, e.g. the constant buffer of a `CONST[b][i]` operand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dimension {
    pub indirect: bool,
    pub dimension: bool,
    pub index: i16,
}

impl Dimension {
    pub fn decode(word: u32) -> Self {
        Self {
            indirect: DIM_INDIRECT.flag(word),
            dimension: DIM_DIMENSION.flag(word),
            index: REG_INDEX.get_i16(word),
        }
    }

    pub fn encode(&self) -> u32 {
        DIM_INDIRECT.put_flag(self.indirect)
            | DIM_DIMENSION.put_flag(self.dimension)
            | REG_INDEX.put_i16(self.index)
    }
}

const DST_WRITE_MASK: Field = Field::new(4, 4);
const DST_INDIRECT: Field = Field::new(8, 1);
const DST_DIMENSION: Field = Field::new(9, 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstRegister {
    pub file: RegisterFile,
    pub write_mask: WriteMask,
    pub indirect: bool,
    pub dimension: bool,
    pub index: i16,
}

impl Default for DstRegister {
    fn default() -> Self {
        Self {
            file: RegisterFile::Null,
            write_mask: WriteMask::XYZW,
            indirect: false,
            dimension: false,
            index: 0,
        }
    }
}

impl DstRegister {
    pub fn decode(word: u32) -> Result<Self, FieldError> {
        Ok(Self {
            file: decode_enum("file", REG_FILE.get(word), RegisterFile::from_raw)?,
            write_mask: WriteMask::from_bits_truncate(DST_WRITE_MASK.get(word) as u8),
            indirect: DST_INDIRECT.flag(word),
            dimension: DST_DIMENSION.flag(word),
            index: REG_INDEX.get_i16(word),
        })
    }

    pub fn encode(&self) -> u32 {
        REG_FILE.put(self.file.raw())
            | DST_WRITE_MASK.put(self.write_mask.bits().into())
            | DST_INDIRECT.put_flag(self.indirect)
            | DST_DIMENSION.put_flag(self.dimension)
            | REG_INDEX.put_i16(self.index)
    }
}

const CONCODE_MASK: Field = Field::new(4, 4);
const CONCODE_SWIZZLE_SHIFT: u32 = 8;
const CONCODE_SRC_INDEX: Field = Field::new(16, 4);

/// Condition code that gates the destination write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstRegisterExtConcode {
    pub cond_mask: CondCode,
    pub cond_swizzle: [Swizzle; 4],
    pub cond_src_index: u8,
}

impl Default for DstRegisterExtConcode {
    fn default() -> Self {
        Self {
            cond_mask: CondCode::Tr,
            cond_swizzle: Swizzle::IDENTITY,
            cond_src_index: 0,
        }
    }
}

impl DstRegisterExtConcode {
    pub fn decode(word: u32) -> Result<Self, FieldError> {
        Ok(Self {
            cond_mask: decode_enum("condition mask", CONCODE_MASK.get(word), CondCode::from_raw)?,
            cond_swizzle: decode_swizzle(word, CONCODE_SWIZZLE_SHIFT, "condition swizzle")?,
            cond_src_index: CONCODE_SRC_INDEX.get(word) as u8,
        })
    }

    pub fn encode(&self) -> u32 {
        TYPE.put(DstExtType::Condcode.raw())
            | CONCODE_MASK.put(self.cond_mask.raw())
            | encode_swizzle(self.cond_swizzle, CONCODE_SWIZZLE_SHIFT)
            | CONCODE_SRC_INDEX.put(self.cond_src_index.into())
    }
}

const MODULATE: Field = Field::new(4, 4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstRegisterExtModulate {
    pub modulate: Modulate,
}

impl Default for DstRegisterExtModulate {
    fn default() -> Self {
        Self {
            modulate: Modulate::X1,
        }
    }
}

impl DstRegisterExtModulate {
    pub fn decode(word: u32) -> Result<Self, FieldError> {
        Ok(Self {
            modulate: decode_enum("modulate", MODULATE.get(word), Modulate::from_raw)?,
        })
    }

    pub fn encode(&self) -> u32 {
        TYPE.put(DstExtType::Modulate.raw()) | MODULATE.put(self.modulate.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_packs_body_size_above_header_size() {
        let header = Header {
            header_size: 2,
            body_size: 0x12_3456,
        };
        assert_eq!(header.encode(), 0x1234_5602);
        assert_eq!(Header::decode(0x1234_5602), header);
    }

    #[test]
    fn negative_register_index_survives_encoding() {
        let reg = SrcRegister {
            file: RegisterFile::Temporary,
            index: -32768,
            ..Default::default()
        };
        let word = reg.encode();
        assert!(!is_extended(word));
        assert_eq!(SrcRegister::decode(word).unwrap(), reg);

        let reg = DstRegister {
            file: RegisterFile::Output,
            index: 32767,
            write_mask: WriteMask::XY,
            ..Default::default()
        };
        assert_eq!(DstRegister::decode(reg.encode()).unwrap(), reg);
    }

    #[test]
    fn extension_tokens_carry_their_type_tag() {
        assert_eq!(token_type_raw(InstructionExtNv::default().encode()), 0);
        assert_eq!(token_type_raw(InstructionExtLabel { label: 7 }.encode()), 1);
        assert_eq!(
            token_type_raw(InstructionExtTexture::default().encode()),
            InstructionExtType::Texture.raw()
        );
        assert_eq!(token_type_raw(SrcRegisterExtMod::default().encode()), 1);
        assert_eq!(token_type_raw(DstRegisterExtModulate::default().encode()), 1);
    }

    #[test]
    fn instruction_token_layout() {
        let insn = Instruction {
            size: 5,
            opcode: Opcode::Mad,
            saturate: Saturate::ZeroOne,
            num_dst_regs: 1,
            num_src_regs: 3,
        };
        let word = insn.encode();
        assert_eq!(token_type_raw(word), TokenType::Instruction.raw());
        assert_eq!(token_size(word), 5);
        assert_eq!((word >> 12) & 0xFF, Opcode::Mad.raw());
        assert_eq!(Instruction::decode(word).unwrap(), insn);
    }

    #[test]
    fn invalid_enum_fields_are_reported() {
        let err = Declaration::decode(TYPE.put(0) | DECL_FILE.put(0xF)).unwrap_err();
        assert_eq!(
            err,
            FieldError {
                field: "file",
                value: 0xF
            }
        );
    }

    #[test]
    fn write_mask_letters() {
        assert_eq!(WriteMask::XYZW.letters(), "xyzw");
        assert_eq!((WriteMask::X | WriteMask::W).letters(), "xw");
        assert_eq!(WriteMask::empty().letters(), "");
    }
}
