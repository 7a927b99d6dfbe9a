//! Interpreting backend.
//!
//! Assembles UML blocks into fixed-size records stored in the code
//! cache and executes them directly. Labels are resolved to record
//! offsets at assembly time; handles and hash entries are registered
//! once the whole block has been stored.

use std::collections::HashMap;
use std::mem;

use drc_core::block::Block;
use drc_core::handle::{Handle, MapVar, MAPVAR_COUNT};
use drc_core::hash::HashTable;
use drc_core::ir_builder::unpack_fast;
use drc_core::op::Inst;
use drc_core::opcode::{OpFlags, Opcode};
use drc_core::operand::{Operand, MAX_HOST_REGS};
use drc_core::types::{flags, MemSize, RoundMode, Type};

use crate::code_cache::CodeCache;
use crate::error::{CacheError, ExecError};
use crate::handle_table::HandleTable;
use crate::machine::Machine;
use crate::Backend;

/// Size of one stored instruction record.
pub const RECORD_SIZE: usize = mem::size_of::<Inst>();

/// Maximum nesting of `Callh`/`Exh` frames.
const MAX_CALL_DEPTH: usize = 64;

/// Number of scratch registers the translator may always use.
pub const SCRATCH_REGS: u32 = 4;

#[derive(Debug, Clone, Copy)]
struct Frame {
    ret: u32,
    mapvars: [u64; MAPVAR_COUNT],
}

/// UML interpreter backend.
pub struct Interpreter {
    regs: [u64; MAX_HOST_REGS],
    nregs: u32,
    flags: u8,
    exp: u64,
    fmod: RoundMode,
    mapvars: [u64; MAPVAR_COUNT],
    frames: Vec<Frame>,
    /// Records executed since creation.
    executed: u64,
}

impl Interpreter {
    /// Create an interpreter exposing `host_registers` integer
    /// registers (clamped to `SCRATCH_REGS..=MAX_HOST_REGS`).
    pub fn new(host_registers: u32) -> Self {
        Self {
            regs: [0; MAX_HOST_REGS],
            nregs: host_registers.clamp(SCRATCH_REGS, MAX_HOST_REGS as u32),
            flags: 0,
            exp: 0,
            fmod: RoundMode::Nearest,
            mapvars: [0; MAPVAR_COUNT],
            frames: Vec::with_capacity(MAX_CALL_DEPTH),
            executed: 0,
        }
    }

    /// Current value of host register `r`.
    pub fn reg(&self, r: u8) -> u64 {
        self.regs[r as usize]
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }

    fn get(&self, m: &dyn Machine, op: Operand, ty: Type) -> u64 {
        let v = match op {
            Operand::Imm(v) => v,
            Operand::Reg(r) => self.regs[r as usize],
            Operand::Mem(o) => m.state()[o as usize],
            Operand::Code(c) => c as u64,
            _ => 0,
        };
        v & ty.mask()
    }

    fn set(&mut self, m: &mut dyn Machine, op: Operand, ty: Type, val: u64) {
        let val = val & ty.mask();
        match op {
            Operand::Reg(r) => self.regs[r as usize] = val,
            Operand::Mem(o) => m.state_mut()[o as usize] = val,
            _ => {}
        }
    }

    fn resolve(handles: &HandleTable, h: Operand) -> Result<u32, ExecError> {
        match h {
            Operand::Handle(h) => handles.resolve(h).ok_or(ExecError::UndefinedHandle {
                name: handles.name(h),
            }),
            _ => Err(ExecError::UndefinedHandle { name: "?" }),
        }
    }

    fn push_frame(&mut self, ret: u32) -> Result<(), ExecError> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(ExecError::CallStackOverflow);
        }
        self.frames.push(Frame {
            ret,
            mapvars: self.mapvars,
        });
        Ok(())
    }

    /// Map variable as seen at the outermost call site.
    fn recover(&self, var: MapVar) -> u64 {
        match self.frames.first() {
            Some(f) => f.mapvars[var as usize],
            None => self.mapvars[var as usize],
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(MAX_HOST_REGS as u32)
    }
}

fn logic_flags(r: u64, ty: Type) -> u8 {
    let sign = 1u64 << (ty.size_bits() - 1);
    let mut f = 0;
    if r == 0 {
        f |= flags::Z;
    }
    if r & sign != 0 {
        f |= flags::S;
    }
    f
}

fn add_flags(a: u64, b: u64, ty: Type) -> (u64, u8) {
    let mask = ty.mask();
    let sum = a as u128 + b as u128;
    let r = sum as u64 & mask;
    let sign = 1u64 << (ty.size_bits() - 1);
    let mut f = logic_flags(r, ty);
    if (sum >> ty.size_bits()) & 1 != 0 {
        f |= flags::C;
    }
    if !(a ^ b) & (a ^ r) & sign != 0 {
        f |= flags::V;
    }
    (r, f)
}

fn sub_flags(a: u64, b: u64, ty: Type) -> (u64, u8) {
    let r = a.wrapping_sub(b) & ty.mask();
    let sign = 1u64 << (ty.size_bits() - 1);
    let mut f = logic_flags(r, ty);
    if a < b {
        f |= flags::C;
    }
    if (a ^ b) & (a ^ r) & sign != 0 {
        f |= flags::V;
    }
    (r, f)
}

fn sext(v: u64, size: MemSize) -> u64 {
    match size {
        MemSize::Byte => v as u8 as i8 as i64 as u64,
        MemSize::Half => v as u16 as i16 as i64 as u64,
        MemSize::Word => v as u32 as i32 as i64 as u64,
        MemSize::Dword => v,
    }
}

fn mem_size(op: Operand) -> MemSize {
    match op.as_imm().unwrap_or(3) {
        0 => MemSize::Byte,
        1 => MemSize::Half,
        2 => MemSize::Word,
        _ => MemSize::Dword,
    }
}

fn float_type(op: Operand) -> Type {
    match op.as_imm().unwrap_or(3) {
        2 => Type::F32,
        _ => Type::F64,
    }
}

fn f_get(v: u64, ty: Type) -> f64 {
    match ty {
        Type::F32 | Type::I32 => f32::from_bits(v as u32) as f64,
        Type::F64 | Type::I64 => f64::from_bits(v),
    }
}

fn f_put(x: f64, ty: Type) -> u64 {
    match ty {
        Type::F32 | Type::I32 => (x as f32).to_bits() as u64,
        Type::F64 | Type::I64 => x.to_bits(),
    }
}

/// Convert an integral `r` to a word or doubleword. NaN and values
/// outside the destination range give the largest positive integer.
fn float_to_int(r: f64, size: MemSize) -> u64 {
    match size {
        MemSize::Dword => {
            if r.is_nan() || r < i64::MIN as f64 || r >= i64::MAX as f64 {
                i64::MAX as u64
            } else {
                r as i64 as u64
            }
        }
        _ => {
            if r.is_nan() || r < i32::MIN as f64 || r > i32::MAX as f64 {
                i32::MAX as u32 as u64
            } else {
                r as i32 as u32 as u64
            }
        }
    }
}

impl Backend for Interpreter {
    fn host_registers(&self) -> u32 {
        self.nregs
    }

    fn generate(
        &mut self,
        cache: &mut CodeCache,
        handles: &mut HandleTable,
        hash: &mut HashTable,
        block: &Block,
    ) -> Result<u32, CacheError> {
        let nrec = block.record_count().max(1);
        let base = cache.begin_code(nrec * RECORD_SIZE)?;

        // Pass 1: place labels, handles and hash entries.
        let mut labels: HashMap<u32, u32> = HashMap::new();
        let mut defs = Vec::new();
        let mut entries = Vec::new();
        let mut pos = base;
        for inst in block.insts() {
            match inst.opc {
                Opcode::Label => {
                    if let Operand::Label(l) = inst.args[0] {
                        labels.insert(l.0, pos);
                    }
                }
                Opcode::Handle => {
                    if let Operand::Handle(h) = inst.args[0] {
                        defs.push((h, pos));
                    }
                }
                Opcode::Hash => {
                    let mode = inst.args[0].as_imm().unwrap_or(0) as u8;
                    let pc = inst.args[1].as_imm().unwrap_or(0) as u32;
                    entries.push((mode, pc, pos));
                }
                Opcode::Comment => {}
                _ => pos += RECORD_SIZE as u32,
            }
        }

        // Pass 2: store records with labels resolved.
        let mut pos = base;
        for inst in block.insts() {
            if inst.opc.def().flags.contains(OpFlags::PSEUDO) {
                continue;
            }
            let mut rec = *inst;
            for arg in rec.args.iter_mut() {
                if let Operand::Label(l) = *arg {
                    *arg = match labels.get(&l.0).copied() {
                        Some(code) => Operand::Code(code),
                        None => Operand::None,
                    };
                }
            }
            cache.write_record(pos, rec);
            pos += RECORD_SIZE as u32;
        }
        if block.record_count() == 0 {
            cache.write_record(base, Inst::new(Opcode::Nop, Type::I32));
        }

        for (h, code) in defs {
            handles.define(h, code);
        }
        for (mode, pc, code) in entries {
            hash.install(mode, pc, code);
        }
        Ok(base)
    }

    fn execute(
        &mut self,
        cache: &CodeCache,
        handles: &HandleTable,
        hash: &mut HashTable,
        entry: Handle,
        m: &mut dyn Machine,
    ) -> Result<u32, ExecError> {
        let mut ip = Self::resolve(handles, Operand::Handle(entry))?;
        self.frames.clear();

        loop {
            let inst: Inst = cache
                .read_record(ip)
                .ok_or(ExecError::BadCodePointer(ip))?;
            let next = ip + RECORD_SIZE as u32;
            ip = next;
            self.executed += 1;

            let def = inst.opc.def();
            if inst.opc != Opcode::Setc
                && def.flags.contains(OpFlags::COND)
                && !inst.cond.holds(self.flags)
            {
                continue;
            }

            let ty = inst.ty;
            let a = inst.args;
            match inst.opc {
                Opcode::Nop
                | Opcode::Handle
                | Opcode::Hash
                | Opcode::Label
                | Opcode::Comment
                | Opcode::Count => {}
                Opcode::Mapvar => {
                    let var = a[0].as_imm().and_then(MapVar::from_index);
                    if let Some(var) = var {
                        self.mapvars[var as usize] = a[1].as_imm().unwrap_or(0);
                    }
                }

                // -- Control flow --
                Opcode::Jmp => match a[0] {
                    Operand::Code(c) => ip = c,
                    _ => return Err(ExecError::UnresolvedLabel),
                },
                Opcode::Callh => {
                    let target = Self::resolve(handles, a[0])?;
                    self.push_frame(next)?;
                    ip = target;
                }
                Opcode::Exh => {
                    let target = Self::resolve(handles, a[1])?;
                    self.exp = self.get(m, a[0], Type::I64);
                    self.push_frame(next)?;
                    ip = target;
                }
                Opcode::Ret => {
                    let frame = self.frames.pop().ok_or(ExecError::CallStackUnderflow)?;
                    ip = frame.ret;
                }
                Opcode::Hashjmp => {
                    let mode = self.get(m, a[0], Type::I32) as u8;
                    let pc = self.get(m, a[1], Type::I32) as u32;
                    self.frames.clear();
                    match hash.lookup(mode, pc) {
                        Some(code) => ip = code,
                        None => {
                            self.exp = pc as u64;
                            ip = Self::resolve(handles, a[2])?;
                        }
                    }
                }
                Opcode::Exit => {
                    let code = self.get(m, a[0], Type::I32) as u32;
                    self.frames.clear();
                    return Ok(code);
                }
                Opcode::Callc => {
                    let func = a[0].as_imm().unwrap_or(0) as u32;
                    m.call(func);
                }
                Opcode::Recover => {
                    let var = a[1].as_imm().and_then(MapVar::from_index);
                    let v = var.map_or(0, |var| self.recover(var));
                    self.set(m, a[0], Type::I64, v);
                }
                Opcode::GetExp => {
                    let v = self.exp;
                    self.set(m, a[0], Type::I64, v);
                }
                Opcode::SetFmod => {
                    self.fmod = RoundMode::from_bits(self.get(m, a[0], Type::I32));
                }
                Opcode::GetFmod => {
                    let v = self.fmod as u64;
                    self.set(m, a[0], Type::I32, v);
                }

                // -- Integer --
                Opcode::Mov => {
                    let v = self.get(m, a[1], ty);
                    self.set(m, a[0], ty, v);
                }
                Opcode::Setc => {
                    let v = inst.cond.holds(self.flags) as u64;
                    self.set(m, a[0], ty, v);
                }
                Opcode::Add | Opcode::Sub | Opcode::Cmp => {
                    let (x, y) = if inst.opc == Opcode::Cmp {
                        (self.get(m, a[0], ty), self.get(m, a[1], ty))
                    } else {
                        (self.get(m, a[1], ty), self.get(m, a[2], ty))
                    };
                    let (r, f) = if inst.opc == Opcode::Add {
                        add_flags(x, y, ty)
                    } else {
                        sub_flags(x, y, ty)
                    };
                    self.flags = f;
                    if inst.opc != Opcode::Cmp {
                        self.set(m, a[0], ty, r);
                    }
                }
                Opcode::Test => {
                    let r = self.get(m, a[0], ty) & self.get(m, a[1], ty);
                    self.flags = logic_flags(r, ty);
                }
                Opcode::And | Opcode::Or | Opcode::Xor => {
                    let x = self.get(m, a[1], ty);
                    let y = self.get(m, a[2], ty);
                    let r = match inst.opc {
                        Opcode::And => x & y,
                        Opcode::Or => x | y,
                        _ => x ^ y,
                    };
                    self.flags = logic_flags(r, ty);
                    self.set(m, a[0], ty, r);
                }
                Opcode::Shl | Opcode::Shr | Opcode::Sar => {
                    let x = self.get(m, a[1], ty);
                    let n = (self.get(m, a[2], ty) as u32) & (ty.size_bits() - 1);
                    let r = match (inst.opc, ty) {
                        (Opcode::Shl, _) => x << n,
                        (Opcode::Shr, _) => x >> n,
                        (_, Type::I32) => ((x as u32 as i32) >> n) as u32 as u64,
                        _ => ((x as i64) >> n) as u64,
                    };
                    self.set(m, a[0], ty, r);
                }
                Opcode::Muls | Opcode::Mulu => {
                    let x = self.get(m, a[2], ty);
                    let y = self.get(m, a[3], ty);
                    let (lo, hi) = match (inst.opc, ty) {
                        (Opcode::Muls, Type::I32) => {
                            let p = (x as u32 as i32 as i64) * (y as u32 as i32 as i64);
                            (p as u64, (p >> 32) as u64)
                        }
                        (Opcode::Mulu, Type::I32) => {
                            let p = x * y;
                            (p, p >> 32)
                        }
                        (Opcode::Muls, _) => {
                            let p = (x as i64 as i128) * (y as i64 as i128);
                            (p as u64, (p >> 64) as u64)
                        }
                        _ => {
                            let p = (x as u128) * (y as u128);
                            (p as u64, (p >> 64) as u64)
                        }
                    };
                    self.set(m, a[0], ty, lo);
                    self.set(m, a[1], ty, hi);
                }
                Opcode::Divs | Opcode::Divu => {
                    let x = self.get(m, a[2], ty);
                    let y = self.get(m, a[3], ty);
                    // Results are left untouched on division by zero.
                    if y != 0 {
                        let (q, r) = match (inst.opc, ty) {
                            (Opcode::Divs, Type::I32) => {
                                let (x, y) = (x as u32 as i32, y as u32 as i32);
                                (x.wrapping_div(y) as u32 as u64, x.wrapping_rem(y) as u32 as u64)
                            }
                            (Opcode::Divs, _) => {
                                let (x, y) = (x as i64, y as i64);
                                (x.wrapping_div(y) as u64, x.wrapping_rem(y) as u64)
                            }
                            _ => (x / y, x % y),
                        };
                        self.set(m, a[0], ty, q);
                        self.set(m, a[1], ty, r);
                    }
                }
                Opcode::Sext => {
                    let v = sext(self.get(m, a[1], Type::I64), mem_size(a[2]));
                    self.set(m, a[0], ty, v);
                }

                // -- Guest memory --
                Opcode::TlbLookup => {
                    let vaddr = self.get(m, a[1], Type::I32) as u32;
                    let v = m.tlb_entry(vaddr) as u64;
                    self.set(m, a[0], Type::I32, v);
                }
                Opcode::LoadCode => {
                    let paddr = self.get(m, a[1], Type::I32) as u32;
                    let v = m.fetch(paddr) as u64;
                    self.set(m, a[0], Type::I32, v);
                }
                Opcode::Read => {
                    let paddr = self.get(m, a[1], Type::I32) as u32;
                    let v = m.read(paddr, mem_size(a[2]));
                    self.set(m, a[0], Type::I64, v);
                }
                Opcode::Write => {
                    let paddr = self.get(m, a[0], Type::I32) as u32;
                    let size = mem_size(a[2]);
                    let v = self.get(m, a[1], Type::I64) & size.mask();
                    m.write(paddr, size, v, size.mask());
                }
                Opcode::WriteM => {
                    let paddr = self.get(m, a[0], Type::I32) as u32;
                    let size = mem_size(a[3]);
                    let v = self.get(m, a[1], Type::I64) & size.mask();
                    let mask = self.get(m, a[2], Type::I64) & size.mask();
                    m.write(paddr, size, v, mask);
                }
                Opcode::FastRead => {
                    let offset = self.get(m, a[1], Type::I32) as u32;
                    let (region, size) = unpack_fast(a[2].as_imm().unwrap_or(0));
                    let v = m.fast_read(region, offset, size);
                    self.set(m, a[0], Type::I64, v);
                }
                Opcode::FastWrite => {
                    let offset = self.get(m, a[0], Type::I32) as u32;
                    let (region, size) = unpack_fast(a[3].as_imm().unwrap_or(0));
                    let v = self.get(m, a[1], Type::I64) & size.mask();
                    let mask = self.get(m, a[2], Type::I64) & size.mask();
                    m.fast_write(region, offset, size, v, mask);
                }

                // -- Floating point --
                Opcode::Fadd | Opcode::Fsub | Opcode::Fmul | Opcode::Fdiv => {
                    let x = f_get(self.get(m, a[1], ty), ty);
                    let y = f_get(self.get(m, a[2], ty), ty);
                    let r = match inst.opc {
                        Opcode::Fadd => x + y,
                        Opcode::Fsub => x - y,
                        Opcode::Fmul => x * y,
                        _ => x / y,
                    };
                    self.set(m, a[0], ty, f_put(r, ty));
                }
                Opcode::Fsqrt
                | Opcode::Fabs
                | Opcode::Fneg
                | Opcode::Frecip
                | Opcode::Frsqrt => {
                    let bits = self.get(m, a[1], ty);
                    let r = match inst.opc {
                        // Sign manipulation works on the raw bits so
                        // NaN payloads survive.
                        Opcode::Fabs => bits & !(1u64 << (ty.size_bits() - 1)),
                        Opcode::Fneg => bits ^ (1u64 << (ty.size_bits() - 1)),
                        Opcode::Fsqrt => f_put(f_get(bits, ty).sqrt(), ty),
                        Opcode::Frecip => f_put(1.0 / f_get(bits, ty), ty),
                        _ => f_put(1.0 / f_get(bits, ty).sqrt(), ty),
                    };
                    self.set(m, a[0], ty, r);
                }
                Opcode::Fcmp => {
                    let x = f_get(self.get(m, a[0], ty), ty);
                    let y = f_get(self.get(m, a[1], ty), ty);
                    self.flags = if x.is_nan() || y.is_nan() {
                        flags::U
                    } else if x == y {
                        flags::Z
                    } else if x < y {
                        flags::C
                    } else {
                        0
                    };
                }
                Opcode::Ftoint => {
                    let x = f_get(self.get(m, a[1], ty), ty);
                    let mode = match a[3].as_imm().unwrap_or(4) {
                        4 => self.fmod,
                        bits => RoundMode::from_bits(bits),
                    };
                    let v = float_to_int(mode.apply(x), mem_size(a[2]));
                    self.set(m, a[0], Type::I64, v);
                }
                Opcode::Ffrint => {
                    let v = self.get(m, a[1], Type::I64);
                    let r = match (mem_size(a[2]), ty) {
                        (MemSize::Dword, Type::F32) => (v as i64 as f32).to_bits() as u64,
                        (MemSize::Dword, _) => (v as i64 as f64).to_bits(),
                        (_, Type::F32) => (v as u32 as i32 as f32).to_bits() as u64,
                        _ => (v as u32 as i32 as f64).to_bits(),
                    };
                    self.set(m, a[0], ty, r);
                }
                Opcode::Ffrflt => {
                    let from = float_type(a[2]);
                    let x = f_get(self.get(m, a[1], from), from);
                    self.set(m, a[0], ty, f_put(x, ty));
                }
            }
        }
    }
}
