use drc_backend::{CodeCache, HandleTable};
use drc_core::{Block, Cond, HashTable, Opcode, Operand};
use drc_frontend::mips3::cpu::{gpr_slot, mem, HI, ICOUNT, LO, WAIT_RESUME};
use drc_frontend::mips3::regmap::{RegBinding, REGMAP_HI, REGMAP_LO};
use drc_frontend::mips3::{
    compile_block, CompileContext, Hotspot, Mips3Config, Mips3Describer, RegisterMap,
    StaticHandles,
};

use super::state_with;
use crate::asm::*;
use crate::support::KSEG0;

const BASE: u32 = KSEG0 + 0x1000;

/// Describe `code` at BASE and compile it into a fresh block.
fn compile(config: &Mips3Config, hash: &HashTable, hotspots: &[Hotspot], code: &[u32]) -> Block {
    let (mut state, _) = state_with(0x1000, code, 0x4000);
    let window = code.len() as u32 * 4;
    let descs = Mips3Describer::new(window, config.max_sequence, config.max_instructions)
        .describe(&mut state, 0, BASE);

    let mut cache = CodeCache::allocate(64 * 1024).unwrap();
    let mut table = HandleTable::new(&mut cache, 256).unwrap();
    let handles = StaticHandles::alloc(&mut table).unwrap();
    let regmap = RegisterMap::new(config.host_registers);
    let ctx = CompileContext {
        handles: &handles,
        regmap: &regmap,
        config,
        hotspots,
    };
    let mut block = Block::new();
    compile_block(&mut block, hash, ctx, 0, &descs);
    block
}

fn count(block: &Block, opc: Opcode, cond: Cond) -> usize {
    block
        .insts()
        .iter()
        .filter(|i| i.opc == opc && i.cond == cond)
        .count()
}

#[test]
fn writes_to_register_zero_are_dropped() {
    let config = Mips3Config::default();
    let hash = HashTable::new();
    let block = compile(&config, &hash, &[], &[addiu(0, 1, 5)]);
    assert_eq!(block.count_op(Opcode::Sext), 0);
    assert_eq!(block.count_op(Opcode::Add), 0);

    let block = compile(&config, &hash, &[], &[addiu(2, 1, 5)]);
    assert_eq!(block.count_op(Opcode::Sext), 1);
}

fn dispatch_targets(block: &Block) -> Vec<Operand> {
    block
        .insts()
        .iter()
        .filter(|i| i.opc == Opcode::Hashjmp)
        .map(|i| i.args[1])
        .collect()
}

#[test]
fn sequences_fall_through_to_the_next_pc() {
    let config = Mips3Config::default();
    let hash = HashTable::new();
    let block = compile(&config, &hash, &[], &[addiu(2, 0, 1)]);
    assert_eq!(dispatch_targets(&block), [Operand::Imm(BASE as u64 + 4)]);
}

#[test]
fn wait_loops_back_to_itself() {
    let config = Mips3Config::default();
    let hash = HashTable::new();
    let block = compile(&config, &hash, &[], &[wait()]);
    assert_eq!(dispatch_targets(&block), [Operand::Imm(BASE as u64)]);

    let armed = block
        .insts()
        .iter()
        .any(|i| i.opc == Opcode::Mov && i.args[0] == mem(WAIT_RESUME));
    assert!(armed);
    // Pending interrupts are checked on every pass.
    assert_eq!(count(&block, Opcode::Exh, Cond::Always), 1);
}

#[test]
fn overflow_checks_follow_config() {
    let hash = HashTable::new();
    let mut config = Mips3Config::default();
    let block = compile(&config, &hash, &[], &[addi(2, 1, 1)]);
    assert_eq!(count(&block, Opcode::Exh, Cond::Ov), 1);

    config.overflow_traps = false;
    let block = compile(&config, &hash, &[], &[addi(2, 1, 1)]);
    assert_eq!(count(&block, Opcode::Exh, Cond::Ov), 0);
    assert_eq!(block.count_op(Opcode::Sext), 1);
}

#[test]
fn hotspot_cycles_are_charged() {
    let config = Mips3Config::default();
    let hash = HashTable::new();
    let charged = |block: &Block| {
        block
            .insts()
            .iter()
            .filter(|i| i.opc == Opcode::Sub && i.args[0] == mem(ICOUNT))
            .map(|i| i.args[2])
            .collect::<Vec<Operand>>()
    };

    let block = compile(&config, &hash, &[], &[NOP]);
    assert_eq!(charged(&block), vec![Operand::Imm(1)]);

    let spot = [Hotspot { pc: BASE, opcode: NOP, cycles: 50 }];
    let block = compile(&config, &hash, &spot, &[NOP]);
    assert_eq!(charged(&block), vec![Operand::Imm(51)]);

    // A different opcode at the same pc is not a hit.
    let miss = [Hotspot { pc: BASE, opcode: 1, cycles: 50 }];
    let block = compile(&config, &hash, &miss, &[NOP]);
    assert_eq!(charged(&block), vec![Operand::Imm(1)]);
}

#[test]
fn known_sequences_become_redispatch_stubs() {
    let config = Mips3Config {
        max_sequence: 1,
        ..Mips3Config::default()
    };
    let code = [addiu(2, 0, 1), addiu(3, 0, 1)];

    let mut hash = HashTable::new();
    let block = compile(&config, &hash, &[], &code);
    assert_eq!(block.count_op(Opcode::Hash), 2);

    hash.install(0, BASE + 4, 0);
    let block = compile(&config, &hash, &[], &code);
    assert_eq!(block.count_op(Opcode::Hash), 1);
    assert_eq!(block.count_op(Opcode::Sext), 1);

    // Recompiling the head re-registers everything.
    hash.install(0, BASE, 0);
    let block = compile(&config, &hash, &[], &code);
    assert_eq!(block.count_op(Opcode::Hash), 2);
    assert_eq!(block.count_op(Opcode::Sext), 2);
}

#[test]
fn checksums_cover_the_sequence() {
    let code = [addiu(2, 0, 1), addiu(3, 0, 1), addiu(4, 0, 1)];
    let hash = HashTable::new();

    let block = compile(&Mips3Config::default(), &hash, &[], &code);
    assert_eq!(block.count_op(Opcode::LoadCode), 1);
    assert_eq!(count(&block, Opcode::Exh, Cond::Ne), 1);

    let strict = Mips3Config {
        strict_verify: true,
        ..Mips3Config::default()
    };
    let block = compile(&strict, &hash, &[], &code);
    assert_eq!(block.count_op(Opcode::LoadCode), 3);
    assert_eq!(count(&block, Opcode::Exh, Cond::Ne), 1);
}

#[test]
fn fast_registers_need_enough_host_registers() {
    let map = RegisterMap::new(9);
    assert_eq!(map.binding(0), RegBinding::ImmediateZero);
    assert_eq!(map.binding(2), RegBinding::Host(4));
    assert_eq!(map.binding(4), RegBinding::Host(6));
    assert_eq!(map.binding(REGMAP_LO), RegBinding::Host(7));
    assert_eq!(map.binding(REGMAP_HI), RegBinding::Host(8));
    assert_eq!(map.binding(5), RegBinding::Memory(gpr_slot(5)));
    assert_eq!(map.operand(0), Operand::Imm(0));
    assert_eq!(map.fast_count(), 5);

    let map = RegisterMap::new(6);
    assert_eq!(map.fast_count(), 2);
    assert_eq!(map.binding(4), RegBinding::Memory(gpr_slot(4)));
    assert_eq!(map.lo(), mem(LO));
    assert_eq!(map.hi(), mem(HI));

    let mut block = Block::new();
    RegisterMap::new(9).save_fast_regs(&mut block);
    assert_eq!(block.count_op(Opcode::Mov), 5);
    assert!(RegisterMap::new(4).fast_count() == 0);
}
