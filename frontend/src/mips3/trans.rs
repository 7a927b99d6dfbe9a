//! Integer instruction translation: primary opcodes, SPECIAL, REGIMM
//! and loads/stores.

use drc_core::{Cond, MemSize, Operand, Type};

use super::compiler::{CompilerState, Translator};
use super::cpu::{cop0, cpr0_slot, fcr31, mem, Exception, I0, I1, I2, FCR31, JMPDEST, LLBIT};
use super::describe::InstructionDescriptor;
use super::handlers::Access;

#[inline]
pub(super) fn rs(op: u32) -> usize {
    ((op >> 21) & 31) as usize
}

#[inline]
pub(super) fn rt(op: u32) -> usize {
    ((op >> 16) & 31) as usize
}

#[inline]
pub(super) fn rd(op: u32) -> usize {
    ((op >> 11) & 31) as usize
}

#[inline]
fn sa(op: u32) -> u64 {
    ((op >> 6) & 31) as u64
}

/// Sign-extended 16-bit immediate.
#[inline]
pub(super) fn simm(op: u32) -> Operand {
    Operand::simm(op as u16 as i16 as i32)
}

#[inline]
fn uimm(op: u32) -> Operand {
    Operand::Imm((op & 0xffff) as u64)
}

pub(super) fn imm(v: u64) -> Operand {
    Operand::Imm(v)
}

/// A 32-bit value sign-extended to a register image.
pub(super) fn sext32(v: u32) -> Operand {
    Operand::simm(v as i32)
}

/// How a loaded value is widened into the destination.
#[derive(Clone, Copy)]
enum Extend {
    Signed,
    Zero,
}

impl Translator<'_> {
    pub(super) fn r(&self, i: usize) -> Operand {
        self.regmap.operand(i)
    }

    /// Sign-extend the 32-bit value in `src` into guest register `d`.
    pub(super) fn set_sext32(&mut self, d: usize, src: Operand) {
        if d != 0 {
            self.b.gen_sext(Type::I64, self.r(d), src, MemSize::Word);
        }
    }

    fn link(&mut self, reg: usize, pc: u32) {
        if reg != 0 {
            self.b.gen_mov(Type::I64, self.r(reg), sext32(pc.wrapping_add(8)));
        }
    }

    /// Translate the instruction; `false` when the opcode is
    /// recognised but has no translation.
    pub fn gen_opcode(&mut self, c: &mut CompilerState, d: &InstructionDescriptor) -> bool {
        let op = d.opcode;
        let (rs, rt) = (rs(op), rt(op));
        match op >> 26 {
            0x00 => self.gen_special(c, d),
            0x01 => self.gen_regimm(c, d),

            0x02 => {
                self.gen_delay_slot_and_branch(c, d, Some(d.target_pc));
                true
            }
            0x03 => {
                self.link(31, d.pc);
                self.gen_delay_slot_and_branch(c, d, Some(d.target_pc));
                true
            }

            0x04 | 0x14 if rs == rt => {
                self.gen_delay_slot_and_branch(c, d, Some(d.target_pc));
                true
            }
            0x04 | 0x14 => self.gen_cond_branch(c, d, Cond::Ne, self.r(rs), self.r(rt)),
            0x05 | 0x15 => self.gen_cond_branch(c, d, Cond::Eq, self.r(rs), self.r(rt)),
            0x06 | 0x16 => self.gen_cond_branch(c, d, Cond::Gt, self.r(rs), imm(0)),
            0x07 | 0x17 => self.gen_cond_branch(c, d, Cond::Le, self.r(rs), imm(0)),

            0x08 => self.gen_add_trap(Type::I32, rt, self.r(rs), simm(op), false),
            0x09 => {
                if rt != 0 {
                    self.b.gen_add(Type::I32, I0, self.r(rs), simm(op));
                    self.set_sext32(rt, I0);
                }
                true
            }
            0x0a | 0x0b => {
                if rt != 0 {
                    let cond = if op >> 26 == 0x0a { Cond::Lt } else { Cond::Ltu };
                    self.b.gen_cmp(Type::I64, self.r(rs), simm(op));
                    self.b.gen_setc(cond, Type::I64, self.r(rt));
                }
                true
            }
            0x0c..=0x0e => {
                if rt != 0 {
                    let (dst, src) = (self.r(rt), self.r(rs));
                    match op >> 26 {
                        0x0c => self.b.gen_and(Type::I64, dst, src, uimm(op)),
                        0x0d => self.b.gen_or(Type::I64, dst, src, uimm(op)),
                        _ => self.b.gen_xor(Type::I64, dst, src, uimm(op)),
                    };
                }
                true
            }
            0x0f => {
                if rt != 0 {
                    self.b.gen_mov(Type::I64, self.r(rt), sext32((op & 0xffff) << 16));
                }
                true
            }

            0x10 => self.gen_cop0(c, d),
            0x11 => self.gen_cop1(c, d),
            0x13 => self.gen_cop1x(c, d),

            0x18 => self.gen_add_trap(Type::I64, rt, self.r(rs), simm(op), false),
            0x19 => {
                if rt != 0 {
                    self.b.gen_add(Type::I64, self.r(rt), self.r(rs), simm(op));
                }
                true
            }

            0x1a => self.gen_load_left_right(op, true, true),
            0x1b => self.gen_load_left_right(op, true, false),
            0x20 => self.gen_load(op, Access::Byte, Extend::Signed),
            0x21 => self.gen_load(op, Access::Half, Extend::Signed),
            0x22 => self.gen_load_left_right(op, false, true),
            0x23 => self.gen_load(op, Access::Word, Extend::Signed),
            0x24 => self.gen_load(op, Access::Byte, Extend::Zero),
            0x25 => self.gen_load(op, Access::Half, Extend::Zero),
            0x26 => self.gen_load_left_right(op, false, false),
            0x27 => self.gen_load(op, Access::Word, Extend::Zero),
            0x37 => self.gen_load(op, Access::Dword, Extend::Zero),

            0x28 => self.gen_store(op, Access::Byte),
            0x29 => self.gen_store(op, Access::Half),
            0x2a => self.gen_store_left_right(op, false, true),
            0x2b => self.gen_store(op, Access::Word),
            0x2c => self.gen_store_left_right(op, true, true),
            0x2d => self.gen_store_left_right(op, true, false),
            0x2e => self.gen_store_left_right(op, false, false),
            0x3f => self.gen_store(op, Access::Dword),

            0x30 => self.gen_load_linked(op, Access::Word),
            0x34 => self.gen_load_linked(op, Access::Dword),
            0x38 => self.gen_store_conditional(c, op, Access::Word),
            0x3c => self.gen_store_conditional(c, op, Access::Dword),

            0x31 | 0x35 | 0x39 | 0x3d => self.gen_cop1_memory(d),

            // CACHE, PREF
            0x2f | 0x33 => true,

            _ => {
                self.gen_invalid();
                true
            }
        }
    }

    /// Reserved instruction exception.
    pub(super) fn gen_invalid(&mut self) {
        let h = self.h.exception(Exception::Invalid);
        self.b.gen_exh(h, imm(0));
    }

    /// Branch taken when `a` compared with `b` does not satisfy
    /// `skip`.
    pub(super) fn gen_cond_branch(
        &mut self,
        c: &mut CompilerState,
        d: &InstructionDescriptor,
        skip: Cond,
        a: Operand,
        b: Operand,
    ) -> bool {
        self.b.gen_cmp(Type::I64, a, b);
        self.gen_branch_on_flags(c, d, skip)
    }

    /// Conditional branch on flags already set, skipped when `skip`
    /// holds.
    pub(super) fn gen_branch_on_flags(
        &mut self,
        c: &mut CompilerState,
        d: &InstructionDescriptor,
        skip: Cond,
    ) -> bool {
        let l = c.new_label();
        self.b.gen_jmpc(skip, l);
        self.gen_delay_slot_and_branch(c, d, Some(d.target_pc));
        self.b.gen_label(l);
        self.gen_fallthrough_delay(c, d);
        true
    }

    /// ADD/ADDI/DADD/DADDI and SUB/DSUB: trap on signed overflow when
    /// enabled, leaving the destination untouched.
    fn gen_add_trap(&mut self, ty: Type, dst: usize, a: Operand, b: Operand, sub: bool) -> bool {
        let traps = self.config.overflow_traps;
        if !traps && dst == 0 {
            return true;
        }
        if sub {
            self.b.gen_sub(ty, I0, a, b);
        } else {
            self.b.gen_add(ty, I0, a, b);
        }
        if traps {
            let h = self.h.exception(Exception::Overflow);
            self.b.gen_exhc(Cond::Ov, h, imm(0));
        }
        match ty {
            Type::I32 => self.set_sext32(dst, I0),
            _ if dst != 0 => {
                self.b.gen_mov(Type::I64, self.r(dst), I0);
            }
            _ => {}
        }
        true
    }

    fn gen_special(&mut self, c: &mut CompilerState, d: &InstructionDescriptor) -> bool {
        let op = d.opcode;
        let (rs, rt, rd) = (rs(op), rt(op), rd(op));
        match op & 0x3f {
            0x00 | 0x02 | 0x03 | 0x04 | 0x06 | 0x07 => {
                if rd != 0 {
                    let amount = if op & 4 != 0 { self.r(rs) } else { imm(sa(op)) };
                    let src = self.r(rt);
                    match op & 3 {
                        0 => self.b.gen_shl(Type::I32, I0, src, amount),
                        2 => self.b.gen_shr(Type::I32, I0, src, amount),
                        _ => self.b.gen_sar(Type::I32, I0, src, amount),
                    };
                    self.set_sext32(rd, I0);
                }
                true
            }
            0x01 => {
                // MOVF/MOVT
                if rd != 0 {
                    let cc = (op >> 18) & 7;
                    let cond = if op & (1 << 16) != 0 { Cond::Ne } else { Cond::Eq };
                    self.b.gen_test(Type::I32, mem(FCR31), imm(fcr31::cc_bit(cc)));
                    self.b.gen_movc(cond, Type::I64, self.r(rd), self.r(rs));
                }
                true
            }
            0x08 | 0x09 => {
                self.b.gen_and(Type::I32, mem(JMPDEST), self.r(rs), imm(!3u32 as u64));
                if op & 1 != 0 {
                    self.link(rd, d.pc);
                }
                self.gen_delay_slot_and_branch(c, d, None);
                true
            }
            0x0a | 0x0b => {
                // MOVZ/MOVN
                if rd != 0 {
                    let cond = if op & 1 == 0 { Cond::Eq } else { Cond::Ne };
                    self.b.gen_cmp(Type::I64, self.r(rt), imm(0));
                    self.b.gen_movc(cond, Type::I64, self.r(rd), self.r(rs));
                }
                true
            }
            0x0c => {
                let h = self.h.exception(Exception::Syscall);
                self.b.gen_exh(h, imm(0));
                true
            }
            0x0d => {
                let h = self.h.exception(Exception::Break);
                self.b.gen_exh(h, imm(0));
                true
            }
            // SYNC
            0x0f => true,
            0x10 | 0x12 => {
                if rd != 0 {
                    let src = if op & 2 == 0 { self.regmap.hi() } else { self.regmap.lo() };
                    self.b.gen_mov(Type::I64, self.r(rd), src);
                }
                true
            }
            0x11 | 0x13 => {
                let dst = if op & 2 == 0 { self.regmap.hi() } else { self.regmap.lo() };
                self.b.gen_mov(Type::I64, dst, self.r(rs));
                true
            }
            0x14 | 0x16 | 0x17 => {
                if rd != 0 {
                    let (dst, src, amount) = (self.r(rd), self.r(rt), self.r(rs));
                    match op & 3 {
                        0 => self.b.gen_shl(Type::I64, dst, src, amount),
                        2 => self.b.gen_shr(Type::I64, dst, src, amount),
                        _ => self.b.gen_sar(Type::I64, dst, src, amount),
                    };
                }
                true
            }
            0x18 | 0x19 => {
                let (a, b) = (self.r(rs), self.r(rt));
                if op & 1 == 0 {
                    self.b.gen_muls(Type::I32, I0, I1, a, b);
                } else {
                    self.b.gen_mulu(Type::I32, I0, I1, a, b);
                }
                self.b.gen_sext(Type::I64, self.regmap.lo(), I0, MemSize::Word);
                self.b.gen_sext(Type::I64, self.regmap.hi(), I1, MemSize::Word);
                true
            }
            0x1a | 0x1b => {
                // Division by zero leaves HI and LO unchanged.
                let skip = c.new_label();
                let (a, b) = (self.r(rs), self.r(rt));
                self.b.gen_cmp(Type::I32, b, imm(0));
                self.b.gen_jmpc(Cond::Eq, skip);
                if op & 1 == 0 {
                    self.b.gen_divs(Type::I32, I0, I1, a, b);
                } else {
                    self.b.gen_divu(Type::I32, I0, I1, a, b);
                }
                self.b.gen_sext(Type::I64, self.regmap.lo(), I0, MemSize::Word);
                self.b.gen_sext(Type::I64, self.regmap.hi(), I1, MemSize::Word);
                self.b.gen_label(skip);
                true
            }
            0x1c | 0x1d => {
                let (lo, hi, a, b) = (self.regmap.lo(), self.regmap.hi(), self.r(rs), self.r(rt));
                if op & 1 == 0 {
                    self.b.gen_muls(Type::I64, I0, I1, a, b);
                } else {
                    self.b.gen_mulu(Type::I64, I0, I1, a, b);
                }
                self.b.gen_mov(Type::I64, lo, I0);
                self.b.gen_mov(Type::I64, hi, I1);
                true
            }
            0x1e | 0x1f => {
                let skip = c.new_label();
                let (lo, hi, a, b) = (self.regmap.lo(), self.regmap.hi(), self.r(rs), self.r(rt));
                self.b.gen_cmp(Type::I64, b, imm(0));
                self.b.gen_jmpc(Cond::Eq, skip);
                if op & 1 == 0 {
                    self.b.gen_divs(Type::I64, I0, I1, a, b);
                } else {
                    self.b.gen_divu(Type::I64, I0, I1, a, b);
                }
                self.b.gen_mov(Type::I64, lo, I0);
                self.b.gen_mov(Type::I64, hi, I1);
                self.b.gen_label(skip);
                true
            }
            0x20 => self.gen_add_trap(Type::I32, rd, self.r(rs), self.r(rt), false),
            0x22 => self.gen_add_trap(Type::I32, rd, self.r(rs), self.r(rt), true),
            0x2c => self.gen_add_trap(Type::I64, rd, self.r(rs), self.r(rt), false),
            0x2e => self.gen_add_trap(Type::I64, rd, self.r(rs), self.r(rt), true),
            0x21 | 0x23 => {
                if rd != 0 {
                    let (a, b) = (self.r(rs), self.r(rt));
                    if op & 2 == 0 {
                        self.b.gen_add(Type::I32, I0, a, b);
                    } else {
                        self.b.gen_sub(Type::I32, I0, a, b);
                    }
                    self.set_sext32(rd, I0);
                }
                true
            }
            0x2d | 0x2f => {
                if rd != 0 {
                    let (dst, a, b) = (self.r(rd), self.r(rs), self.r(rt));
                    if op & 2 == 0 {
                        self.b.gen_add(Type::I64, dst, a, b);
                    } else {
                        self.b.gen_sub(Type::I64, dst, a, b);
                    }
                }
                true
            }
            0x24..=0x27 => {
                if rd != 0 {
                    let (dst, a, b) = (self.r(rd), self.r(rs), self.r(rt));
                    match op & 3 {
                        0 => self.b.gen_and(Type::I64, dst, a, b),
                        1 => self.b.gen_or(Type::I64, dst, a, b),
                        2 => self.b.gen_xor(Type::I64, dst, a, b),
                        _ => {
                            self.b.gen_or(Type::I64, I0, a, b);
                            self.b.gen_xor(Type::I64, dst, I0, imm(u64::MAX))
                        }
                    };
                }
                true
            }
            0x2a | 0x2b => {
                if rd != 0 {
                    let cond = if op & 1 == 0 { Cond::Lt } else { Cond::Ltu };
                    self.b.gen_cmp(Type::I64, self.r(rs), self.r(rt));
                    self.b.gen_setc(cond, Type::I64, self.r(rd));
                }
                true
            }
            0x30..=0x34 | 0x36 => {
                let cond = match op & 0x3f {
                    0x30 => Cond::Ge,
                    0x31 => Cond::Geu,
                    0x32 => Cond::Lt,
                    0x33 => Cond::Ltu,
                    0x34 => Cond::Eq,
                    _ => Cond::Ne,
                };
                self.gen_trap(cond, self.r(rs), self.r(rt));
                true
            }
            0x38 | 0x3a | 0x3b | 0x3c | 0x3e | 0x3f => {
                if rd != 0 {
                    let amount = sa(op) + if op & 4 != 0 { 32 } else { 0 };
                    let (dst, src) = (self.r(rd), self.r(rt));
                    match op & 3 {
                        0 => self.b.gen_shl(Type::I64, dst, src, imm(amount)),
                        2 => self.b.gen_shr(Type::I64, dst, src, imm(amount)),
                        _ => self.b.gen_sar(Type::I64, dst, src, imm(amount)),
                    };
                }
                true
            }
            _ => {
                self.gen_invalid();
                true
            }
        }
    }

    fn gen_regimm(&mut self, c: &mut CompilerState, d: &InstructionDescriptor) -> bool {
        let op = d.opcode;
        let rs = rs(op);
        match rt(op) {
            0x00 | 0x02 => self.gen_cond_branch(c, d, Cond::Ge, self.r(rs), imm(0)),
            0x01 | 0x03 => self.gen_cond_branch(c, d, Cond::Lt, self.r(rs), imm(0)),
            0x10..=0x13 => {
                // The link register is written whether or not the
                // branch is taken; flags from the compare survive it.
                let skip = if op & (1 << 16) != 0 { Cond::Lt } else { Cond::Ge };
                self.b.gen_cmp(Type::I64, self.r(rs), imm(0));
                self.link(31, d.pc);
                self.gen_branch_on_flags(c, d, skip)
            }
            0x08..=0x0c | 0x0e => {
                let cond = match rt(op) {
                    0x08 => Cond::Ge,
                    0x09 => Cond::Geu,
                    0x0a => Cond::Lt,
                    0x0b => Cond::Ltu,
                    0x0c => Cond::Eq,
                    _ => Cond::Ne,
                };
                self.gen_trap(cond, self.r(rs), simm(op));
                true
            }
            _ => {
                self.gen_invalid();
                true
            }
        }
    }

    fn gen_trap(&mut self, cond: Cond, a: Operand, b: Operand) {
        let h = self.h.exception(Exception::Trap);
        self.b.gen_cmp(Type::I64, a, b);
        self.b.gen_exhc(cond, h, imm(0));
    }

    // -- Memory --

    /// Effective address into I0.
    pub(super) fn gen_ea(&mut self, op: u32) {
        self.b.gen_add(Type::I32, I0, self.r(rs(op)), simm(op));
    }

    /// Call the read accessor for the current privilege; value in I0.
    pub(super) fn gen_read(&mut self, access: Access) {
        let h = self.h.read(self.privilege(), access);
        self.b.gen_callh(h);
    }

    /// Call the write accessor; address in I0, value in I1, mask in I2.
    pub(super) fn gen_write(&mut self, access: Access) {
        let h = self.h.write(self.privilege(), access);
        self.b.gen_callh(h);
    }

    fn gen_load(&mut self, op: u32, access: Access, extend: Extend) -> bool {
        let rt = rt(op);
        self.gen_ea(op);
        self.gen_read(access);
        if rt != 0 {
            let size = access.size();
            match (extend, size) {
                (_, MemSize::Dword) | (Extend::Zero, _) => {
                    self.b.gen_mov(Type::I64, self.r(rt), I0);
                }
                (Extend::Signed, _) => {
                    self.b.gen_sext(Type::I64, self.r(rt), I0, size);
                }
            }
        }
        true
    }

    fn gen_store(&mut self, op: u32, access: Access) -> bool {
        self.gen_ea(op);
        self.b.gen_mov(Type::I64, I1, self.r(rt(op)));
        self.gen_write(access);
        true
    }

    /// Shift amount into I1 for the unaligned forms: the byte offset
    /// within the aligned unit, in bits, flipped for the byte order
    /// where the instruction counts from the other end.
    fn gen_unaligned_shift(&mut self, dword: bool, flip: bool) {
        let (low, flipbits) = if dword { (7, 0x38) } else { (3, 0x18) };
        self.b.gen_and(Type::I32, I1, I0, imm(low));
        self.b.gen_shl(Type::I32, I1, I1, imm(3));
        if flip {
            self.b.gen_xor(Type::I32, I1, I1, imm(flipbits));
        }
        self.b.gen_and(Type::I32, I0, I0, imm(!low as u32 as u64));
    }

    /// LWL/LWR/LDL/LDR.
    fn gen_load_left_right(&mut self, op: u32, dword: bool, left: bool) -> bool {
        let rt = rt(op);
        let (ty, access, all) = if dword {
            (Type::I64, Access::DwordMasked, u64::MAX)
        } else {
            (Type::I32, Access::WordMasked, 0xffff_ffff)
        };
        let big = self.config.big_endian;
        self.gen_ea(op);
        self.gen_unaligned_shift(dword, if left { !big } else { big });
        self.gen_read(access);
        if rt == 0 {
            return true;
        }
        // Memory bytes shifted into place; I2 holds the register bits
        // that survive.
        if left {
            self.b.gen_shl(ty, I0, I0, I1);
            self.b.gen_shl(ty, I2, imm(all), I1);
        } else {
            self.b.gen_shr(ty, I0, I0, I1);
            self.b.gen_shr(ty, I2, imm(all), I1);
        }
        self.b.gen_xor(ty, I2, I2, imm(all));
        self.b.gen_and(ty, I2, I2, self.r(rt));
        self.b.gen_or(ty, I0, I0, I2);
        if dword {
            self.b.gen_mov(Type::I64, self.r(rt), I0);
        } else {
            self.set_sext32(rt, I0);
        }
        true
    }

    /// SWL/SWR/SDL/SDR through the masked accessors.
    fn gen_store_left_right(&mut self, op: u32, dword: bool, left: bool) -> bool {
        let (ty, access, all) = if dword {
            (Type::I64, Access::DwordMasked, u64::MAX)
        } else {
            (Type::I32, Access::WordMasked, 0xffff_ffff)
        };
        let big = self.config.big_endian;
        self.gen_ea(op);
        self.gen_unaligned_shift(dword, if left { !big } else { big });
        if left {
            self.b.gen_shr(ty, I2, imm(all), I1);
            self.b.gen_shr(ty, I1, self.r(rt(op)), I1);
        } else {
            self.b.gen_shl(ty, I2, imm(all), I1);
            self.b.gen_shl(ty, I1, self.r(rt(op)), I1);
        }
        self.gen_write(access);
        true
    }

    fn gen_load_linked(&mut self, op: u32, access: Access) -> bool {
        self.gen_ea(op);
        self.b.gen_mov(Type::I64, mem(cpr0_slot(cop0::LL_ADDR)), I0);
        let extend = if access == Access::Dword { Extend::Zero } else { Extend::Signed };
        let rt = rt(op);
        self.gen_read(access);
        if rt != 0 {
            match extend {
                Extend::Zero => {
                    self.b.gen_mov(Type::I64, self.r(rt), I0);
                }
                Extend::Signed => self.set_sext32(rt, I0),
            }
        }
        self.b.gen_mov(Type::I64, mem(LLBIT), imm(1));
        true
    }

    fn gen_store_conditional(&mut self, c: &mut CompilerState, op: u32, access: Access) -> bool {
        let rt = rt(op);
        let fail = c.new_label();
        let done = c.new_label();
        self.b.gen_cmp(Type::I64, mem(LLBIT), imm(0));
        self.b.gen_jmpc(Cond::Eq, fail);
        self.gen_ea(op);
        self.b.gen_mov(Type::I64, I1, self.r(rt));
        self.gen_write(access);
        if rt != 0 {
            self.b.gen_mov(Type::I64, self.r(rt), imm(1));
        }
        self.b.gen_jmp(done);
        self.b.gen_label(fail);
        if rt != 0 {
            self.b.gen_mov(Type::I64, self.r(rt), imm(0));
        }
        self.b.gen_label(done);
        true
    }
}
