/// UML value types.
///
/// Integer ops at `I32` operate on the low 32 bits of their operands and
/// zero-extend the result into the destination; the translator is
/// responsible for any sign extension the guest requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Type {
    I32 = 0,
    I64 = 1,
    F32 = 2,
    F64 = 3,
}

pub const TYPE_COUNT: usize = 4;

impl Type {
    pub const fn size_bits(self) -> u32 {
        match self {
            Type::I32 | Type::F32 => 32,
            Type::I64 | Type::F64 => 64,
        }
    }

    pub const fn size_bytes(self) -> u32 {
        self.size_bits() / 8
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    /// Mask covering the significant bits of a value of this type.
    pub const fn mask(self) -> u64 {
        match self {
            Type::I32 | Type::F32 => 0xffff_ffff,
            Type::I64 | Type::F64 => u64::MAX,
        }
    }
}

/// Width of a guest memory transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemSize {
    Byte = 0,
    Half = 1,
    Word = 2,
    Dword = 3,
}

impl MemSize {
    pub const ALL: [MemSize; 4] =
        [MemSize::Byte, MemSize::Half, MemSize::Word, MemSize::Dword];

    pub const fn bytes(self) -> u32 {
        1 << (self as u32)
    }

    pub const fn mask(self) -> u64 {
        match self {
            MemSize::Byte => 0xff,
            MemSize::Half => 0xffff,
            MemSize::Word => 0xffff_ffff,
            MemSize::Dword => u64::MAX,
        }
    }

    pub const fn from_bytes(bytes: u32) -> Option<MemSize> {
        match bytes {
            1 => Some(MemSize::Byte),
            2 => Some(MemSize::Half),
            4 => Some(MemSize::Word),
            8 => Some(MemSize::Dword),
            _ => None,
        }
    }
}

/// Result flags produced by flag-setting ops (`Add`, `Sub`, `Cmp`,
/// `Test`, `Fcmp`) and consumed by conditional ops.
pub mod flags {
    pub const C: u8 = 1 << 0;
    pub const V: u8 = 1 << 1;
    pub const Z: u8 = 1 << 2;
    pub const S: u8 = 1 << 3;
    pub const U: u8 = 1 << 4;
}

/// Condition codes evaluated against the current flags.
///
/// Integer comparisons follow a preceding `Cmp a, b`; `Ltu` means the
/// borrow flag is set, `Lt` means sign differs from overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cond {
    Never = 0,
    Always = 1,
    Eq = 2,
    Ne = 3,
    // Signed
    Lt = 4,
    Ge = 5,
    Le = 6,
    Gt = 7,
    // Unsigned
    Ltu = 8,
    Geu = 9,
    Leu = 10,
    Gtu = 11,
    // Single flags
    Neg = 12,
    Pos = 13,
    Ov = 14,
    NoOv = 15,
    Unord = 16,
    Ord = 17,
}

impl Cond {
    /// Return the inverted condition.
    pub const fn invert(self) -> Cond {
        match self {
            Cond::Never => Cond::Always,
            Cond::Always => Cond::Never,
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Lt => Cond::Ge,
            Cond::Ge => Cond::Lt,
            Cond::Le => Cond::Gt,
            Cond::Gt => Cond::Le,
            Cond::Ltu => Cond::Geu,
            Cond::Geu => Cond::Ltu,
            Cond::Leu => Cond::Gtu,
            Cond::Gtu => Cond::Leu,
            Cond::Neg => Cond::Pos,
            Cond::Pos => Cond::Neg,
            Cond::Ov => Cond::NoOv,
            Cond::NoOv => Cond::Ov,
            Cond::Unord => Cond::Ord,
            Cond::Ord => Cond::Unord,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, Cond::Lt | Cond::Ge | Cond::Le | Cond::Gt)
    }

    pub const fn is_unsigned(self) -> bool {
        matches!(self, Cond::Ltu | Cond::Geu | Cond::Leu | Cond::Gtu)
    }

    /// Evaluate the condition against a flags byte.
    pub const fn holds(self, f: u8) -> bool {
        let c = f & flags::C != 0;
        let v = f & flags::V != 0;
        let z = f & flags::Z != 0;
        let s = f & flags::S != 0;
        let u = f & flags::U != 0;
        match self {
            Cond::Never => false,
            Cond::Always => true,
            Cond::Eq => z,
            Cond::Ne => !z,
            Cond::Lt => s != v,
            Cond::Ge => s == v,
            Cond::Le => z || s != v,
            Cond::Gt => !z && s == v,
            Cond::Ltu => c,
            Cond::Geu => !c,
            Cond::Leu => c || z,
            Cond::Gtu => !c && !z,
            Cond::Neg => s,
            Cond::Pos => !s,
            Cond::Ov => v,
            Cond::NoOv => !v,
            Cond::Unord => u,
            Cond::Ord => !u,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Cond::Never => "never",
            Cond::Always => "",
            Cond::Eq => "eq",
            Cond::Ne => "ne",
            Cond::Lt => "lt",
            Cond::Ge => "ge",
            Cond::Le => "le",
            Cond::Gt => "gt",
            Cond::Ltu => "ltu",
            Cond::Geu => "geu",
            Cond::Leu => "leu",
            Cond::Gtu => "gtu",
            Cond::Neg => "s",
            Cond::Pos => "ns",
            Cond::Ov => "v",
            Cond::NoOv => "nv",
            Cond::Unord => "u",
            Cond::Ord => "nu",
        }
    }
}

/// Floating point rounding mode, encoded as the guest's FCR31 RM field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum RoundMode {
    #[default]
    Nearest = 0,
    Trunc = 1,
    Ceil = 2,
    Floor = 3,
    /// Use whatever mode was last installed with `SetFmod`.
    Current = 4,
}

impl RoundMode {
    pub const fn from_bits(bits: u64) -> RoundMode {
        match bits & 3 {
            0 => RoundMode::Nearest,
            1 => RoundMode::Trunc,
            2 => RoundMode::Ceil,
            _ => RoundMode::Floor,
        }
    }

    /// Round `v` to an integral value.
    pub fn apply(self, v: f64) -> f64 {
        match self {
            RoundMode::Nearest | RoundMode::Current => {
                let r = v.round();
                // ties to even
                if (v - v.trunc()).abs() == 0.5 && r % 2.0 != 0.0 {
                    r - v.signum()
                } else {
                    r
                }
            }
            RoundMode::Trunc => v.trunc(),
            RoundMode::Ceil => v.ceil(),
            RoundMode::Floor => v.floor(),
        }
    }
}
