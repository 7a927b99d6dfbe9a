//! COP0 (system control) and COP1/COP1X (floating point) translation.

use drc_core::{Cond, MemSize, Opcode, Operand, RoundMode, Type};

use super::compiler::{CompilerState, Translator};
use super::cpu::{
    cause, cop0, cpr0_slot, fcr31, fpr_slot, mem, mode_fr, sr, Exception, NativeCall, Privilege,
    ARG0, FCR0, FCR31, I0, I1, I2, I3, JMPDEST, LLBIT, MODE, WAIT_RESUME,
};
use super::describe::InstructionDescriptor;
use super::handlers::Access;
use super::trans::{imm, rd, rs, rt};

fn cpr0(reg: usize) -> Operand {
    mem(cpr0_slot(reg))
}

fn fpr(i: usize) -> Operand {
    mem(fpr_slot(i))
}

/// COP1 operand formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fmt {
    S,
    D,
    W,
    L,
}

impl Fmt {
    fn from_field(f: usize) -> Option<Fmt> {
        match f {
            16 => Some(Fmt::S),
            17 => Some(Fmt::D),
            20 => Some(Fmt::W),
            21 => Some(Fmt::L),
            _ => None,
        }
    }

    /// Occupies a 64-bit register.
    fn wide(self) -> bool {
        matches!(self, Fmt::D | Fmt::L)
    }

    fn float_type(self) -> Option<Type> {
        match self {
            Fmt::S => Some(Type::F32),
            Fmt::D => Some(Type::F64),
            _ => None,
        }
    }
}

#[inline]
fn fs(op: u32) -> usize {
    rd(op)
}

#[inline]
fn ft(op: u32) -> usize {
    rt(op)
}

#[inline]
fn fd(op: u32) -> usize {
    ((op >> 6) & 31) as usize
}

impl Translator<'_> {
    // -- COP0 --

    pub(super) fn gen_cop0(&mut self, c: &mut CompilerState, d: &InstructionDescriptor) -> bool {
        let op = d.opcode;
        if self.privilege() != Privilege::Kernel {
            self.b.gen_test(Type::I64, cpr0(cop0::STATUS), imm(sr::CU0));
            let h = self.h.exception(Exception::BadCop);
            self.b.gen_exhc(Cond::Eq, h, imm(0));
        }

        match rs(op) {
            0x00 | 0x01 => {
                let (rt, reg) = (rt(op), rd(op));
                let src = match reg {
                    cop0::COUNT => {
                        self.gen_native(c, NativeCall::ReadCount);
                        mem(ARG0)
                    }
                    cop0::RANDOM => {
                        self.gen_native(c, NativeCall::ReadRandom);
                        mem(ARG0)
                    }
                    _ => cpr0(reg),
                };
                if rt != 0 {
                    if rs(op) == 0 {
                        self.set_sext32(rt, src);
                    } else {
                        self.b.gen_mov(Type::I64, self.r(rt), src);
                    }
                }
                true
            }
            0x04 | 0x05 => {
                let (val, reg) = (self.r(rt(op)), rd(op));
                let wide = rs(op) == 5;
                match reg {
                    cop0::COUNT => self.gen_cop0_native(c, val, NativeCall::WriteCount),
                    cop0::COMPARE => self.gen_cop0_native(c, val, NativeCall::WriteCompare),
                    cop0::STATUS => {
                        self.gen_cop0_native(c, val, NativeCall::WriteStatus);
                        c.check_interrupts = true;
                    }
                    cop0::ENTRY_HI => self.gen_cop0_native(c, val, NativeCall::WriteEntryHi),
                    cop0::CAUSE => {
                        let reg = cpr0(cop0::CAUSE);
                        self.b.gen_and(Type::I64, I0, val, imm(cause::IP_SOFT));
                        self.b.gen_and(Type::I64, reg, reg, imm(!cause::IP_SOFT));
                        self.b.gen_or(Type::I64, reg, reg, I0);
                        c.check_soft_interrupts = true;
                    }
                    cop0::PRID | cop0::RANDOM => {}
                    _ if wide => {
                        self.b.gen_mov(Type::I64, cpr0(reg), val);
                    }
                    _ => {
                        self.b.gen_sext(Type::I64, cpr0(reg), val, MemSize::Word);
                    }
                }
                true
            }
            0x10..=0x1f => match op & 0x3f {
                0x01 => self.gen_native_true(c, NativeCall::TlbRead),
                0x02 => self.gen_native_true(c, NativeCall::TlbWriteIndexed),
                0x06 => self.gen_native_true(c, NativeCall::TlbWriteRandom),
                0x08 => self.gen_native_true(c, NativeCall::TlbProbe),
                0x18 => {
                    self.gen_eret(c);
                    true
                }
                // WAIT: the sequence loops on itself, checking for
                // interrupts each time around.
                0x20 => {
                    let resume = d.pc as u64 + 4;
                    self.b.gen_mov(Type::I64, mem(WAIT_RESUME), imm(resume));
                    c.check_interrupts = true;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    fn gen_cop0_native(&mut self, c: &CompilerState, val: Operand, call: NativeCall) {
        self.b.gen_mov(Type::I64, mem(ARG0), val);
        self.gen_native(c, call);
    }

    fn gen_native_true(&mut self, c: &CompilerState, call: NativeCall) -> bool {
        self.gen_native(c, call);
        true
    }

    /// Return from exception: ErrorEPC when ERL is set, EPC otherwise.
    fn gen_eret(&mut self, c: &mut CompilerState) {
        let status = cpr0(cop0::STATUS);
        let noerl = c.new_label();
        let done = c.new_label();
        self.b.gen_mov(Type::I64, mem(LLBIT), imm(0));
        self.b.gen_test(Type::I64, status, imm(sr::ERL));
        self.b.gen_jmpc(Cond::Eq, noerl);
        self.b.gen_and(Type::I64, I0, status, imm(!sr::ERL));
        self.b.gen_mov(Type::I32, mem(JMPDEST), cpr0(cop0::ERROR_EPC));
        self.b.gen_jmp(done);
        self.b.gen_label(noerl);
        self.b.gen_and(Type::I64, I0, status, imm(!sr::EXL));
        self.b.gen_mov(Type::I32, mem(JMPDEST), cpr0(cop0::EPC));
        self.b.gen_label(done);
        self.gen_cop0_native(c, I0, NativeCall::WriteStatus);
        c.check_interrupts = true;

        let dest = mem(JMPDEST);
        self.update_cycles(c, dest, true);
        self.b.gen_hashjmp(mem(MODE), dest, self.h.nocode);
    }

    // -- COP1 register access --

    fn fr(&self) -> bool {
        mode_fr(self.mode)
    }

    /// Coprocessor-unusable check for FPU instructions.
    fn gen_cop1_usable(&mut self) {
        if self.config.strict_cop1 {
            self.b.gen_test(Type::I64, cpr0(cop0::STATUS), imm(sr::CU1));
            let h = self.h.exception(Exception::BadCop);
            self.b.gen_exhc(Cond::Eq, h, imm(1));
        }
    }

    /// Operand holding FPR `i`. With FR=0 a 64-bit value lives in an
    /// even/odd pair and is assembled into `tmp`.
    fn fsrc(&mut self, i: usize, wide: bool, tmp: Operand) -> Operand {
        if !wide || self.fr() {
            return fpr(i);
        }
        self.b.gen_shl(Type::I64, tmp, fpr(i | 1), imm(32));
        self.b.gen_or(Type::I64, tmp, tmp, fpr(i & !1));
        tmp
    }

    /// Destination operand for FPR `i`; pair with `fcommit`.
    fn fdst(&self, i: usize, wide: bool, tmp: Operand) -> Operand {
        if !wide || self.fr() {
            fpr(i)
        } else {
            tmp
        }
    }

    /// Split a 64-bit result in `tmp` across an FR=0 register pair.
    fn fcommit(&mut self, i: usize, wide: bool, tmp: Operand) {
        if wide && !self.fr() {
            self.b.gen_mov(Type::I32, fpr(i & !1), tmp);
            self.b.gen_shr(Type::I64, fpr(i | 1), tmp, imm(32));
        }
    }

    fn fmove(&mut self, dst: usize, src: usize, wide: bool) {
        if wide && !self.fr() {
            self.b.gen_mov(Type::I32, fpr(dst & !1), fpr(src & !1));
            self.b.gen_mov(Type::I32, fpr(dst | 1), fpr(src | 1));
        } else if wide {
            self.b.gen_mov(Type::I64, fpr(dst), fpr(src));
        } else {
            self.b.gen_mov(Type::I32, fpr(dst), fpr(src));
        }
    }

    pub(super) fn gen_cop1(&mut self, c: &mut CompilerState, d: &InstructionDescriptor) -> bool {
        let op = d.opcode;
        self.gen_cop1_usable();
        let rt = rt(op);
        match rs(op) {
            0x00 => {
                self.set_sext32(rt, fpr(fs(op)));
                true
            }
            0x01 => {
                let src = self.fsrc(fs(op), true, I0);
                if rt != 0 {
                    self.b.gen_mov(Type::I64, self.r(rt), src);
                }
                true
            }
            0x02 => {
                let src = match fs(op) {
                    0 => mem(FCR0),
                    31 => mem(FCR31),
                    _ => imm(0),
                };
                self.set_sext32(rt, src);
                true
            }
            0x04 => {
                self.b.gen_mov(Type::I32, fpr(fs(op)), self.r(rt));
                true
            }
            0x05 => {
                let dst = self.fdst(fs(op), true, I2);
                self.b.gen_mov(Type::I64, dst, self.r(rt));
                self.fcommit(fs(op), true, I2);
                true
            }
            0x06 => {
                if fs(op) == 31 {
                    self.b.gen_mov(Type::I32, mem(FCR31), self.r(rt));
                    self.b.gen_and(Type::I32, I0, mem(FCR31), imm(fcr31::RM_MASK));
                    self.b.gen_setfmod(I0);
                }
                true
            }
            0x08 => {
                // BC1F/BC1T/BC1FL/BC1TL
                let cc = (op >> 18) & 7;
                let skip = if op & (1 << 16) != 0 { Cond::Eq } else { Cond::Ne };
                self.b.gen_test(Type::I32, mem(FCR31), imm(fcr31::cc_bit(cc)));
                self.gen_branch_on_flags(c, d, skip)
            }
            f => match Fmt::from_field(f) {
                Some(fmt) => self.gen_cop1_arith(c, op, fmt),
                None => {
                    self.gen_invalid();
                    true
                }
            },
        }
    }

    fn gen_cop1_arith(&mut self, c: &mut CompilerState, op: u32, fmt: Fmt) -> bool {
        let funct = op & 0x3f;
        let wide = fmt.wide();
        let (fs, ft, fd) = (fs(op), ft(op), fd(op));

        // Conversions accept every format as a source.
        match funct {
            0x20 => return self.gen_cvt_float(fmt, Type::F32, fs, fd),
            0x21 => return self.gen_cvt_float(fmt, Type::F64, fs, fd),
            _ => {}
        }

        let Some(ty) = fmt.float_type() else {
            self.gen_invalid();
            return true;
        };

        match funct {
            0x00..=0x03 => {
                let a = self.fsrc(fs, wide, I0);
                let b = self.fsrc(ft, wide, I1);
                let dst = self.fdst(fd, wide, I2);
                match funct {
                    0 => self.b.gen_fadd(ty, dst, a, b),
                    1 => self.b.gen_fsub(ty, dst, a, b),
                    2 => self.b.gen_fmul(ty, dst, a, b),
                    _ => self.b.gen_fdiv(ty, dst, a, b),
                };
                self.fcommit(fd, wide, I2);
            }
            0x04 | 0x05 | 0x07 | 0x15 | 0x16 => {
                let opc = match funct {
                    0x04 => Opcode::Fsqrt,
                    0x05 => Opcode::Fabs,
                    0x07 => Opcode::Fneg,
                    0x15 => Opcode::Frecip,
                    _ => Opcode::Frsqrt,
                };
                let a = self.fsrc(fs, wide, I0);
                let dst = self.fdst(fd, wide, I2);
                self.b.gen_funary(opc, ty, dst, a);
                self.fcommit(fd, wide, I2);
            }
            0x06 => self.fmove(fd, fs, wide),
            0x08..=0x0f => {
                // ROUND/TRUNC/CEIL/FLOOR, .L then .W
                let to_long = funct < 0x0c;
                let size = if to_long { MemSize::Dword } else { MemSize::Word };
                let a = self.fsrc(fs, wide, I0);
                let dst = self.fdst(fd, to_long, I2);
                self.b
                    .gen_ftoint(ty, dst, a, size, RoundMode::from_bits((funct & 3) as u64));
                self.fcommit(fd, to_long, I2);
            }
            0x11..=0x13 => {
                let skip = c.new_label();
                if funct == 0x11 {
                    let cc = (op >> 18) & 7;
                    let cond = if op & (1 << 16) != 0 { Cond::Eq } else { Cond::Ne };
                    self.b.gen_test(Type::I32, mem(FCR31), imm(fcr31::cc_bit(cc)));
                    self.b.gen_jmpc(cond, skip);
                } else {
                    let cond = if funct == 0x12 { Cond::Ne } else { Cond::Eq };
                    self.b.gen_cmp(Type::I64, self.r(ft), imm(0));
                    self.b.gen_jmpc(cond, skip);
                }
                self.fmove(fd, fs, wide);
                self.b.gen_label(skip);
            }
            0x24 | 0x25 => {
                let to_long = funct == 0x25;
                let size = if to_long { MemSize::Dword } else { MemSize::Word };
                let a = self.fsrc(fs, wide, I0);
                let dst = self.fdst(fd, to_long, I2);
                self.b.gen_ftoint(ty, dst, a, size, RoundMode::Current);
                self.fcommit(fd, to_long, I2);
            }
            0x30..=0x3f => self.gen_fcompare(op, ty, wide),
            _ => {
                self.gen_invalid();
            }
        }
        true
    }

    /// CVT.S and CVT.D from any source format.
    fn gen_cvt_float(&mut self, from: Fmt, to: Type, fs: usize, fd: usize) -> bool {
        if from.float_type() == Some(to) {
            self.gen_invalid();
            return true;
        }
        let wide_dst = to == Type::F64;
        let src = self.fsrc(fs, from.wide(), I0);
        let dst = self.fdst(fd, wide_dst, I2);
        match from {
            Fmt::S => self.b.gen_ffrflt(to, dst, src, Type::F32),
            Fmt::D => self.b.gen_ffrflt(to, dst, src, Type::F64),
            Fmt::W => self.b.gen_ffrint(to, dst, src, MemSize::Word),
            Fmt::L => self.b.gen_ffrint(to, dst, src, MemSize::Dword),
        };
        self.fcommit(fd, wide_dst, I2);
        true
    }

    /// C.cond.fmt: set the selected FCR31 condition bit from the
    /// unordered, equal and less-than predicates named in the low
    /// bits of the condition field.
    fn gen_fcompare(&mut self, op: u32, ty: Type, wide: bool) {
        let cond = op & 0xf;
        let cc = (op >> 8) & 7;
        let a = self.fsrc(fs(op), wide, I0);
        let b = self.fsrc(ft(op), wide, I1);
        self.b.gen_fcmp(ty, a, b);

        // Every setc must run before the ORs clobber the flags.
        let mut parts = Vec::with_capacity(3);
        for (bit, pred, reg) in [
            (1, Cond::Unord, I0),
            (2, Cond::Eq, I1),
            (4, Cond::Ltu, I2),
        ] {
            if cond & bit != 0 {
                self.b.gen_setc(pred, Type::I32, reg);
                parts.push(reg);
            }
        }
        self.b.gen_mov(Type::I32, I3, imm(0));
        for reg in parts {
            self.b.gen_or(Type::I32, I3, I3, reg);
        }
        let bit = fcr31::cc_bit(cc);
        self.b.gen_shl(Type::I32, I3, I3, imm(bit.trailing_zeros() as u64));
        self.b.gen_and(Type::I32, mem(FCR31), mem(FCR31), imm(!bit & 0xffff_ffff));
        self.b.gen_or(Type::I32, mem(FCR31), mem(FCR31), I3);
    }

    // -- FPU memory --

    /// Value in I0 into FPR `ft`.
    fn gen_fpr_load_result(&mut self, ft: usize, wide: bool) {
        if wide {
            let dst = self.fdst(ft, true, I0);
            if dst != I0 {
                self.b.gen_mov(Type::I64, dst, I0);
            }
            self.fcommit(ft, true, I0);
        } else {
            self.b.gen_mov(Type::I32, fpr(ft), I0);
        }
    }

    /// FPR `ft` into I1 for a store; the address in I0 is preserved.
    fn gen_fpr_store_value(&mut self, ft: usize, wide: bool) {
        if wide {
            let src = self.fsrc(ft, true, I1);
            if src != I1 {
                self.b.gen_mov(Type::I64, I1, src);
            }
        } else {
            self.b.gen_mov(Type::I32, I1, fpr(ft));
        }
    }

    /// LWC1/LDC1/SWC1/SDC1.
    pub(super) fn gen_cop1_memory(&mut self, d: &InstructionDescriptor) -> bool {
        let op = d.opcode;
        let ft = ft(op);
        self.gen_cop1_usable();
        self.gen_ea(op);
        match op >> 26 {
            0x31 => {
                self.gen_read(Access::Word);
                self.gen_fpr_load_result(ft, false);
            }
            0x35 => {
                self.gen_read(Access::Dword);
                self.gen_fpr_load_result(ft, true);
            }
            0x39 => {
                self.gen_fpr_store_value(ft, false);
                self.gen_write(Access::Word);
            }
            _ => {
                self.gen_fpr_store_value(ft, true);
                self.gen_write(Access::Dword);
            }
        }
        true
    }

    /// Indexed FPU memory access and the fused multiply-add family.
    pub(super) fn gen_cop1x(&mut self, _c: &mut CompilerState, d: &InstructionDescriptor) -> bool {
        let op = d.opcode;
        self.gen_cop1_usable();
        match op & 0x3f {
            0x00 | 0x01 | 0x08 | 0x09 => {
                let wide = op & 1 != 0;
                let access = if wide { Access::Dword } else { Access::Word };
                self.b
                    .gen_add(Type::I32, I0, self.r(rs(op)), self.r(rt(op)));
                if op & 8 == 0 {
                    self.gen_read(access);
                    self.gen_fpr_load_result(fd(op), wide);
                } else {
                    self.gen_fpr_store_value(fs(op), wide);
                    self.gen_write(access);
                }
                true
            }
            // PREFX
            0x0f => true,
            0x20 | 0x21 | 0x28 | 0x29 | 0x30 | 0x31 | 0x38 | 0x39 => {
                let funct = op & 0x3f;
                let wide = funct & 1 != 0;
                let ty = if wide { Type::F64 } else { Type::F32 };
                let (fr, fs, ft, fd) = (rs(op), fs(op), ft(op), fd(op));

                let s = self.fsrc(fs, wide, I1);
                let t = self.fsrc(ft, wide, I2);
                self.b.gen_fmul(ty, I3, s, t);
                let r = self.fsrc(fr, wide, I0);
                let dst = self.fdst(fd, wide, I3);
                if funct & 0x08 == 0 {
                    self.b.gen_fadd(ty, dst, I3, r);
                } else {
                    self.b.gen_fsub(ty, dst, I3, r);
                }
                if funct & 0x10 != 0 {
                    self.b.gen_funary(Opcode::Fneg, ty, dst, dst);
                }
                self.fcommit(fd, wide, I3);
                true
            }
            _ => {
                self.gen_invalid();
                true
            }
        }
    }
}
