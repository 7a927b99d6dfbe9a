use drc_core::dump::{dump_block, format_inst};
use drc_core::*;

#[test]
fn pseudo_ops_are_not_records() {
    let mut b = Block::new();
    b.gen_handle(Handle(0));
    b.gen_hash(0, 0x1000);
    b.gen_comment(0x1000);
    let l = b.new_label();
    b.gen_label(l);
    b.gen_mov(Type::I32, Operand::Reg(0), Operand::Imm(1));
    b.gen_exit(Operand::Imm(0));
    assert_eq!(b.len(), 6);
    assert_eq!(b.record_count(), 2);
    assert_eq!(b.count_op(Opcode::Mov), 1);
    assert!(!b.overflowed());
}

#[test]
fn reset_clears_labels() {
    let mut b = Block::new();
    assert_eq!(b.new_label(), Label(0));
    assert_eq!(b.new_label(), Label(1));
    b.gen_ret();
    b.reset();
    assert!(b.is_empty());
    assert_eq!(b.nb_labels(), 0);
    assert_eq!(b.new_label(), Label(0));
}

#[test]
fn operand_args() {
    let mut b = Block::new();
    b.gen_add(Type::I64, Operand::Mem(3), Operand::Reg(4), Operand::simm(-1));
    let inst = b.inst(0);
    assert_eq!(inst.oargs(), &[Operand::Mem(3)]);
    assert_eq!(inst.iargs(), &[Operand::Reg(4), Operand::Imm(u64::MAX)]);
    assert!(inst.writes(Operand::Mem(3)));
    assert!(!inst.writes(Operand::Reg(4)));
}

#[test]
fn fast_access_packing() {
    for size in MemSize::ALL {
        let packed = ir_builder::pack_fast(3, size);
        assert_eq!(ir_builder::unpack_fast(packed), (3, size));
    }
}

#[test]
fn dump_format() {
    let mut b = Block::new();
    b.gen_hash(1, 0x80);
    b.gen_sub(Type::I64, Operand::Mem(35), Operand::Mem(35), Operand::Imm(2));
    b.gen_exhc(Cond::Neg, Handle(2), Operand::Imm(0x84));
    assert_eq!(format_inst(b.inst(1)), "sub.i64 [35], [35], $0x2");
    assert_eq!(format_inst(b.inst(2)), "exh,s $0x84, h2");

    let mut out = Vec::new();
    dump_block(&b, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("hash $0x1, $0x80:"));
    assert_eq!(text.lines().count(), 3);
}
