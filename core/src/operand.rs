use std::fmt;

use crate::handle::Handle;
use crate::label::Label;

/// Index of a 64-bit slot in the guest state block.
pub type FieldOffset = u16;

/// Number of integer host registers an op may name.
pub const MAX_HOST_REGS: usize = 16;

/// An instruction operand.
///
/// `Imm` is a constant, `Mem` a slot in the guest state block that
/// survives across blocks, `Reg` a host register that is only valid
/// while generated code is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operand {
    #[default]
    None,
    Imm(u64),
    Reg(u8),
    Mem(FieldOffset),
    /// Branch target inside the current block, before assembly.
    Label(Label),
    Handle(Handle),
    /// Resolved code pointer, produced by the backend.
    Code(u32),
}

impl Operand {
    /// Host scratch registers used by generated code.
    pub const I0: Operand = Operand::Reg(0);
    pub const I1: Operand = Operand::Reg(1);
    pub const I2: Operand = Operand::Reg(2);
    pub const I3: Operand = Operand::Reg(3);

    pub const fn imm(val: u64) -> Operand {
        Operand::Imm(val)
    }

    /// Sign-extend a 32-bit immediate into a 64-bit operand.
    pub const fn simm(val: i32) -> Operand {
        Operand::Imm(val as i64 as u64)
    }

    pub const fn is_imm(&self) -> bool {
        matches!(self, Operand::Imm(_))
    }

    /// Whether this operand can be written by an op.
    pub const fn is_writable(&self) -> bool {
        matches!(self, Operand::Reg(_) | Operand::Mem(_))
    }

    pub const fn as_imm(&self) -> Option<u64> {
        match self {
            Operand::Imm(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => write!(f, "-"),
            Operand::Imm(v) => write!(f, "${v:#x}"),
            Operand::Reg(r) => write!(f, "i{r}"),
            Operand::Mem(o) => write!(f, "[{o}]"),
            Operand::Label(l) => write!(f, "L{}", l.0),
            Operand::Handle(h) => write!(f, "h{}", h.0),
            Operand::Code(c) => write!(f, "@{c:#x}"),
        }
    }
}
