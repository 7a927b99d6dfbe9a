use crate::opcode::Opcode;
use crate::operand::Operand;
use crate::types::{Cond, Type};

/// Maximum number of operands an instruction carries.
pub const MAX_OP_ARGS: usize = 4;

/// A single UML instruction.
///
/// Records are plain `Copy` data so the backend can store them
/// verbatim in the code cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inst {
    pub opc: Opcode,
    pub ty: Type,
    pub cond: Cond,
    pub args: [Operand; MAX_OP_ARGS],
}

impl Inst {
    pub fn new(opc: Opcode, ty: Type) -> Self {
        Self {
            opc,
            ty,
            cond: Cond::Always,
            args: [Operand::None; MAX_OP_ARGS],
        }
    }

    pub fn with_args(opc: Opcode, ty: Type, args: &[Operand]) -> Self {
        let mut inst = Self::new(opc, ty);
        let n = args.len().min(MAX_OP_ARGS);
        inst.args[..n].copy_from_slice(&args[..n]);
        inst
    }

    pub fn with_cond(mut self, cond: Cond) -> Self {
        self.cond = cond;
        self
    }

    /// Output operands.
    pub fn oargs(&self) -> &[Operand] {
        let def = self.opc.def();
        &self.args[..def.nb_oargs as usize]
    }

    /// Input operands.
    pub fn iargs(&self) -> &[Operand] {
        let def = self.opc.def();
        let start = def.nb_oargs as usize;
        &self.args[start..start + def.nb_iargs as usize]
    }

    /// Constant arguments.
    pub fn cargs(&self) -> &[Operand] {
        let def = self.opc.def();
        let start = (def.nb_oargs + def.nb_iargs) as usize;
        &self.args[start..start + def.nb_cargs as usize]
    }

    /// Whether this instruction writes `dst`.
    pub fn writes(&self, dst: Operand) -> bool {
        self.oargs().contains(&dst)
    }
}
