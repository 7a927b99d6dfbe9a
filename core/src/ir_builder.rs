use crate::block::Block;
use crate::handle::{Handle, MapVar};
use crate::label::Label;
use crate::op::Inst;
use crate::opcode::Opcode;
use crate::operand::Operand;
use crate::types::{Cond, MemSize, RoundMode, Type};

// Constant args are encoded as immediates.
fn carg(val: u64) -> Operand {
    Operand::Imm(val)
}

/// Pack a fast-RAM region index and a transfer size into one carg.
pub fn pack_fast(region: usize, size: MemSize) -> u64 {
    ((region as u64) << 8) | size as u64
}

/// Inverse of [`pack_fast`].
pub fn unpack_fast(packed: u64) -> (usize, MemSize) {
    let size = match packed & 0xff {
        0 => MemSize::Byte,
        1 => MemSize::Half,
        2 => MemSize::Word,
        _ => MemSize::Dword,
    };
    ((packed >> 8) as usize, size)
}

impl Block {
    // -- Internal helpers --

    fn emit_binary(
        &mut self,
        opc: Opcode,
        ty: Type,
        dst: Operand,
        a: Operand,
        b: Operand,
    ) -> Operand {
        self.emit(Inst::with_args(opc, ty, &[dst, a, b]));
        dst
    }

    fn emit_unary(
        &mut self,
        opc: Opcode,
        ty: Type,
        dst: Operand,
        src: Operand,
    ) -> Operand {
        self.emit(Inst::with_args(opc, ty, &[dst, src]));
        dst
    }

    // -- Code structure --

    pub fn gen_handle(&mut self, h: Handle) {
        self.emit(Inst::with_args(
            Opcode::Handle,
            Type::I32,
            &[Operand::Handle(h)],
        ));
    }

    pub fn gen_hash(&mut self, mode: u8, pc: u32) {
        self.emit(Inst::with_args(
            Opcode::Hash,
            Type::I32,
            &[carg(mode as u64), carg(pc as u64)],
        ));
    }

    pub fn gen_label(&mut self, l: Label) {
        self.emit(Inst::with_args(
            Opcode::Label,
            Type::I32,
            &[Operand::Label(l)],
        ));
    }

    pub fn gen_mapvar(&mut self, var: MapVar, value: u64) {
        self.emit(Inst::with_args(
            Opcode::Mapvar,
            Type::I64,
            &[carg(var as u64), carg(value)],
        ));
    }

    pub fn gen_comment(&mut self, pc: u32) {
        self.emit(Inst::with_args(Opcode::Comment, Type::I32, &[carg(pc as u64)]));
    }

    // -- Control flow --

    pub fn gen_jmp(&mut self, l: Label) {
        self.gen_jmpc(Cond::Always, l);
    }

    pub fn gen_jmpc(&mut self, cond: Cond, l: Label) {
        self.emit(
            Inst::with_args(Opcode::Jmp, Type::I32, &[Operand::Label(l)])
                .with_cond(cond),
        );
    }

    pub fn gen_callh(&mut self, h: Handle) {
        self.gen_callhc(Cond::Always, h);
    }

    pub fn gen_callhc(&mut self, cond: Cond, h: Handle) {
        self.emit(
            Inst::with_args(Opcode::Callh, Type::I32, &[Operand::Handle(h)])
                .with_cond(cond),
        );
    }

    pub fn gen_exh(&mut self, h: Handle, param: Operand) {
        self.gen_exhc(Cond::Always, h, param);
    }

    pub fn gen_exhc(&mut self, cond: Cond, h: Handle, param: Operand) {
        self.emit(
            Inst::with_args(
                Opcode::Exh,
                Type::I64,
                &[param, Operand::Handle(h)],
            )
            .with_cond(cond),
        );
    }

    pub fn gen_ret(&mut self) {
        self.emit(Inst::new(Opcode::Ret, Type::I32));
    }

    pub fn gen_hashjmp(&mut self, mode: Operand, pc: Operand, nocode: Handle) {
        self.emit(Inst::with_args(
            Opcode::Hashjmp,
            Type::I32,
            &[mode, pc, Operand::Handle(nocode)],
        ));
    }

    pub fn gen_exit(&mut self, code: Operand) {
        self.gen_exitc(Cond::Always, code);
    }

    pub fn gen_exitc(&mut self, cond: Cond, code: Operand) {
        self.emit(
            Inst::with_args(Opcode::Exit, Type::I32, &[code]).with_cond(cond),
        );
    }

    pub fn gen_callc(&mut self, func: u32) {
        self.emit(Inst::with_args(
            Opcode::Callc,
            Type::I64,
            &[carg(func as u64)],
        ));
    }

    pub fn gen_recover(&mut self, dst: Operand, var: MapVar) {
        self.emit(Inst::with_args(
            Opcode::Recover,
            Type::I64,
            &[dst, carg(var as u64)],
        ));
    }

    pub fn gen_getexp(&mut self, dst: Operand) {
        self.emit(Inst::with_args(Opcode::GetExp, Type::I64, &[dst]));
    }

    pub fn gen_setfmod(&mut self, src: Operand) {
        self.emit(Inst::with_args(Opcode::SetFmod, Type::I32, &[src]));
    }

    pub fn gen_getfmod(&mut self, dst: Operand) {
        self.emit(Inst::with_args(Opcode::GetFmod, Type::I32, &[dst]));
    }

    // -- Data movement --

    pub fn gen_mov(&mut self, ty: Type, d: Operand, s: Operand) -> Operand {
        self.emit_unary(Opcode::Mov, ty, d, s)
    }

    /// Conditional move: `d = s` if `cond` holds.
    pub fn gen_movc(
        &mut self,
        cond: Cond,
        ty: Type,
        d: Operand,
        s: Operand,
    ) -> Operand {
        self.emit(
            Inst::with_args(Opcode::Mov, ty, &[d, s]).with_cond(cond),
        );
        d
    }

    /// `d = cond ? 1 : 0`.
    pub fn gen_setc(&mut self, cond: Cond, ty: Type, d: Operand) -> Operand {
        self.emit(Inst::with_args(Opcode::Setc, ty, &[d]).with_cond(cond));
        d
    }

    pub fn gen_sext(
        &mut self,
        ty: Type,
        d: Operand,
        s: Operand,
        size: MemSize,
    ) -> Operand {
        self.emit(Inst::with_args(
            Opcode::Sext,
            ty,
            &[d, s, carg(size as u64)],
        ));
        d
    }

    // -- Binary ALU (1 oarg, 2 iargs) --

    pub fn gen_add(&mut self, ty: Type, d: Operand, a: Operand, b: Operand) -> Operand {
        self.emit_binary(Opcode::Add, ty, d, a, b)
    }

    pub fn gen_sub(&mut self, ty: Type, d: Operand, a: Operand, b: Operand) -> Operand {
        self.emit_binary(Opcode::Sub, ty, d, a, b)
    }

    pub fn gen_and(&mut self, ty: Type, d: Operand, a: Operand, b: Operand) -> Operand {
        self.emit_binary(Opcode::And, ty, d, a, b)
    }

    pub fn gen_or(&mut self, ty: Type, d: Operand, a: Operand, b: Operand) -> Operand {
        self.emit_binary(Opcode::Or, ty, d, a, b)
    }

    pub fn gen_xor(&mut self, ty: Type, d: Operand, a: Operand, b: Operand) -> Operand {
        self.emit_binary(Opcode::Xor, ty, d, a, b)
    }

    pub fn gen_shl(&mut self, ty: Type, d: Operand, a: Operand, b: Operand) -> Operand {
        self.emit_binary(Opcode::Shl, ty, d, a, b)
    }

    pub fn gen_shr(&mut self, ty: Type, d: Operand, a: Operand, b: Operand) -> Operand {
        self.emit_binary(Opcode::Shr, ty, d, a, b)
    }

    pub fn gen_sar(&mut self, ty: Type, d: Operand, a: Operand, b: Operand) -> Operand {
        self.emit_binary(Opcode::Sar, ty, d, a, b)
    }

    // -- Flag producers --

    pub fn gen_cmp(&mut self, ty: Type, a: Operand, b: Operand) {
        self.emit(Inst::with_args(Opcode::Cmp, ty, &[a, b]));
    }

    pub fn gen_test(&mut self, ty: Type, a: Operand, b: Operand) {
        self.emit(Inst::with_args(Opcode::Test, ty, &[a, b]));
    }

    // -- Widening multiply / divide (2 oargs, 2 iargs) --

    pub fn gen_muls(&mut self, ty: Type, lo: Operand, hi: Operand, a: Operand, b: Operand) {
        self.emit(Inst::with_args(Opcode::Muls, ty, &[lo, hi, a, b]));
    }

    pub fn gen_mulu(&mut self, ty: Type, lo: Operand, hi: Operand, a: Operand, b: Operand) {
        self.emit(Inst::with_args(Opcode::Mulu, ty, &[lo, hi, a, b]));
    }

    pub fn gen_divs(&mut self, ty: Type, q: Operand, r: Operand, a: Operand, b: Operand) {
        self.emit(Inst::with_args(Opcode::Divs, ty, &[q, r, a, b]));
    }

    pub fn gen_divu(&mut self, ty: Type, q: Operand, r: Operand, a: Operand, b: Operand) {
        self.emit(Inst::with_args(Opcode::Divu, ty, &[q, r, a, b]));
    }

    // -- Guest memory --

    pub fn gen_tlblookup(&mut self, d: Operand, vaddr: Operand) -> Operand {
        self.emit_unary(Opcode::TlbLookup, Type::I32, d, vaddr)
    }

    pub fn gen_loadcode(&mut self, d: Operand, paddr: Operand) -> Operand {
        self.emit_unary(Opcode::LoadCode, Type::I32, d, paddr)
    }

    pub fn gen_read(&mut self, d: Operand, paddr: Operand, size: MemSize) -> Operand {
        self.emit(Inst::with_args(
            Opcode::Read,
            Type::I64,
            &[d, paddr, carg(size as u64)],
        ));
        d
    }

    pub fn gen_write(&mut self, paddr: Operand, val: Operand, size: MemSize) {
        self.emit(Inst::with_args(
            Opcode::Write,
            Type::I64,
            &[paddr, val, carg(size as u64)],
        ));
    }

    pub fn gen_writem(
        &mut self,
        paddr: Operand,
        val: Operand,
        mask: Operand,
        size: MemSize,
    ) {
        self.emit(Inst::with_args(
            Opcode::WriteM,
            Type::I64,
            &[paddr, val, mask, carg(size as u64)],
        ));
    }

    /// Read from fast-RAM `region`; `offset` is relative to its base.
    pub fn gen_fastread(
        &mut self,
        d: Operand,
        offset: Operand,
        region: usize,
        size: MemSize,
    ) -> Operand {
        self.emit(Inst::with_args(
            Opcode::FastRead,
            Type::I64,
            &[d, offset, carg(pack_fast(region, size))],
        ));
        d
    }

    pub fn gen_fastwrite(
        &mut self,
        offset: Operand,
        val: Operand,
        mask: Operand,
        region: usize,
        size: MemSize,
    ) {
        self.emit(Inst::with_args(
            Opcode::FastWrite,
            Type::I64,
            &[offset, val, mask, carg(pack_fast(region, size))],
        ));
    }

    // -- Floating point --

    pub fn gen_fadd(&mut self, ty: Type, d: Operand, a: Operand, b: Operand) -> Operand {
        self.emit_binary(Opcode::Fadd, ty, d, a, b)
    }

    pub fn gen_fsub(&mut self, ty: Type, d: Operand, a: Operand, b: Operand) -> Operand {
        self.emit_binary(Opcode::Fsub, ty, d, a, b)
    }

    pub fn gen_fmul(&mut self, ty: Type, d: Operand, a: Operand, b: Operand) -> Operand {
        self.emit_binary(Opcode::Fmul, ty, d, a, b)
    }

    pub fn gen_fdiv(&mut self, ty: Type, d: Operand, a: Operand, b: Operand) -> Operand {
        self.emit_binary(Opcode::Fdiv, ty, d, a, b)
    }

    pub fn gen_funary(&mut self, opc: Opcode, ty: Type, d: Operand, s: Operand) -> Operand {
        self.emit_unary(opc, ty, d, s)
    }

    pub fn gen_fcmp(&mut self, ty: Type, a: Operand, b: Operand) {
        self.emit(Inst::with_args(Opcode::Fcmp, ty, &[a, b]));
    }

    /// Float of type `ty` to an integer of `size` bytes.
    pub fn gen_ftoint(
        &mut self,
        ty: Type,
        d: Operand,
        s: Operand,
        size: MemSize,
        round: RoundMode,
    ) -> Operand {
        self.emit(Inst::with_args(
            Opcode::Ftoint,
            ty,
            &[d, s, carg(size as u64), carg(round as u64)],
        ));
        d
    }

    /// Signed integer of `size` bytes to a float of type `ty`.
    pub fn gen_ffrint(&mut self, ty: Type, d: Operand, s: Operand, size: MemSize) -> Operand {
        self.emit(Inst::with_args(
            Opcode::Ffrint,
            ty,
            &[d, s, carg(size as u64)],
        ));
        d
    }

    /// Float of type `from` to a float of type `ty`.
    pub fn gen_ffrflt(&mut self, ty: Type, d: Operand, s: Operand, from: Type) -> Operand {
        self.emit(Inst::with_args(
            Opcode::Ffrflt,
            ty,
            &[d, s, carg(from as u64)],
        ));
        d
    }
}
