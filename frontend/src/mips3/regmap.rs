use drc_core::{Block, FieldOffset, Operand, Type};

use super::cpu::{self, gpr_slot, HI, LO};

/// Where a guest integer register lives while compiled code runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegBinding {
    /// Register 0: reads as zero, writes are dropped.
    ImmediateZero,
    Memory(FieldOffset),
    /// Bound to a host register for the life of the cache.
    Host(u8),
}

/// Map entries: 32 general registers, then LO and HI.
pub const REGMAP_SIZE: usize = 34;
pub const REGMAP_LO: usize = 32;
pub const REGMAP_HI: usize = 33;

/// Binding of every guest integer register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterMap {
    map: [RegBinding; REGMAP_SIZE],
}

impl RegisterMap {
    /// Build the map for a backend offering `host_regs` registers.
    ///
    /// $2, $3, $4, LO and HI get host registers 4..=8 in that order
    /// when the backend has that many; everything else stays in the
    /// state block.
    pub fn new(host_regs: u32) -> Self {
        let mut map = [RegBinding::ImmediateZero; REGMAP_SIZE];
        for (i, b) in map.iter_mut().enumerate().skip(1) {
            *b = RegBinding::Memory(Self::home(i));
        }
        let fast = [2usize, 3, 4, REGMAP_LO, REGMAP_HI];
        for (n, &idx) in fast.iter().enumerate() {
            let host = 4 + n as u32;
            if host_regs > host {
                map[idx] = RegBinding::Host(host as u8);
            }
        }
        Self { map }
    }

    /// State block slot backing map entry `idx`.
    pub const fn home(idx: usize) -> FieldOffset {
        match idx {
            REGMAP_LO => LO,
            REGMAP_HI => HI,
            _ => gpr_slot(idx),
        }
    }

    pub fn binding(&self, idx: usize) -> RegBinding {
        self.map[idx]
    }

    /// Operand for guest register `idx`.
    pub fn operand(&self, idx: usize) -> Operand {
        match self.map[idx] {
            RegBinding::ImmediateZero => Operand::Imm(0),
            RegBinding::Memory(slot) => cpu::mem(slot),
            RegBinding::Host(r) => Operand::Reg(r),
        }
    }

    pub fn lo(&self) -> Operand {
        self.operand(REGMAP_LO)
    }

    pub fn hi(&self) -> Operand {
        self.operand(REGMAP_HI)
    }

    fn fast(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.map.iter().enumerate().filter_map(|(i, b)| match *b {
            RegBinding::Host(r) => Some((i, r)),
            _ => None,
        })
    }

    pub fn fast_count(&self) -> usize {
        self.fast().count()
    }

    /// Emit loads of every host-bound register from the state block.
    pub fn load_fast_regs(&self, block: &mut Block) {
        for (i, r) in self.fast() {
            block.gen_mov(Type::I64, Operand::Reg(r), cpu::mem(Self::home(i)));
        }
    }

    /// Emit stores of every host-bound register to the state block.
    pub fn save_fast_regs(&self, block: &mut Block) {
        for (i, r) in self.fast() {
            block.gen_mov(Type::I64, cpu::mem(Self::home(i)), Operand::Reg(r));
        }
    }
}
