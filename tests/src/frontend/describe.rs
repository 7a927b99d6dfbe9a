use drc_backend::Machine;
use drc_frontend::mips3::describe::descflags::*;
use drc_frontend::mips3::describe::BRANCH_TARGET_DYNAMIC;
use drc_frontend::mips3::Mips3Describer;

use super::state_with;
use crate::asm::*;
use crate::support::{identity_entry, KSEG0};

const BASE: u32 = KSEG0 + 0x1000;

fn describer() -> Mips3Describer {
    Mips3Describer::new(512, 64, 256)
}

#[test]
fn jump_carries_its_delay_slot() {
    let code = [addiu(2, 0, 1), addiu(3, 0, 2), j(0x8000_2000), addiu(4, 0, 3)];
    let (mut state, _) = state_with(0x1000, &code, 0x4000);
    let descs = describer().describe(&mut state, 0, BASE);

    assert_eq!(descs.len(), 3);
    let jump = &descs[2];
    assert!(jump.has(IS_UNCONDITIONAL_BRANCH | END_SEQUENCE));
    assert_eq!(jump.target_pc, 0x8000_2000);
    assert_eq!(jump.next_pc(), BASE + 16);
    assert_eq!(jump.total_cycles(), 2);

    let slot = jump.delay.as_deref().unwrap();
    assert_eq!(slot.pc, BASE + 12);
    assert_eq!(slot.opcode, addiu(4, 0, 3));
    assert!(slot.has(IN_DELAY_SLOT));
    assert!(!slot.has(END_SEQUENCE));
    assert_eq!(descs[0].physpc, 0x1000);
}

#[test]
fn register_jump_has_dynamic_target() {
    let code = [jr(31), NOP];
    let (mut state, _) = state_with(0x1000, &code, 0x4000);
    let descs = describer().describe(&mut state, 0, BASE);
    assert_eq!(descs.len(), 1);
    assert_eq!(descs[0].target_pc, BRANCH_TARGET_DYNAMIC);
}

#[test]
fn backward_branch_targets_the_head() {
    let code = [addiu(2, 2, 1), bne(2, 3, -2), NOP];
    let (mut state, _) = state_with(0x1000, &code, 0x4000);
    let descs = describer().describe(&mut state, 0, BASE);

    assert!(descs[0].has(IS_BRANCH_TARGET));
    let branch = &descs[1];
    assert!(branch.has(IS_CONDITIONAL_BRANCH));
    assert!(!branch.has(RETURN_TO_START));
    assert_eq!(branch.target_pc, BASE);
    // Conditional branches do not end the walk.
    assert!(descs.len() > 2);
    assert!(descs.last().unwrap().has(END_SEQUENCE));
}

#[test]
fn wait_is_a_sequence_of_its_own() {
    let code = [addiu(2, 0, 1), wait(), addiu(3, 0, 1)];
    let (mut state, _) = state_with(0x1000, &code, 0x4000);
    let descs = describer().describe(&mut state, 0, BASE);

    assert_eq!(descs.len(), 2);
    assert!(descs[0].has(END_SEQUENCE));
    assert!(!descs[0].has(RETURN_TO_START));
    assert_eq!(descs[1].pc, BASE + 4);
    assert!(descs[1].has(RETURN_TO_START | END_SEQUENCE));
}

#[test]
fn forward_target_starts_a_sequence() {
    let code = [beq(0, 1, 2), NOP, addiu(2, 0, 1), addiu(3, 0, 1)];
    let (mut state, _) = state_with(0x1000, &code, 0x4000);
    let descs = describer().describe(&mut state, 0, BASE);

    assert_eq!(descs[0].target_pc, BASE + 12);
    assert_eq!(descs[1].pc, BASE + 8);
    assert!(descs[1].has(END_SEQUENCE));
    assert_eq!(descs[2].pc, BASE + 12);
    assert!(descs[2].has(IS_BRANCH_TARGET));
}

#[test]
fn likely_branches_are_flagged() {
    let code = [beql(1, 2, 4), NOP];
    let (mut state, _) = state_with(0x1000, &code, 0x4000);
    let descs = describer().describe(&mut state, 0, BASE);
    assert!(descs[0].has(LIKELY));
}

#[test]
fn unbacked_memory_ends_the_walk() {
    let code = [addiu(2, 0, 1), addiu(3, 0, 1)];
    let (mut state, _) = state_with(0x1ff8, &code, 0x2000);
    let descs = describer().describe(&mut state, 0, KSEG0 + 0x1ff8);

    assert_eq!(descs.len(), 3);
    let last = &descs[2];
    assert!(last.has(COMPILER_UNMAPPED | END_SEQUENCE));
    assert_eq!(last.physpc, 0x2000);
}

#[test]
fn unbacked_fetch_reads_as_zero() {
    let (mut state, _) = state_with(0x1ff8, &[addiu(2, 0, 1)], 0x2000);
    assert_eq!(state.fetch(0x1ff8), addiu(2, 0, 1));
    assert_eq!(state.fetch(0x2000), 0);
}

#[test]
fn unmapped_page_is_a_compile_time_fault() {
    let (mut state, _) = state_with(0x1000, &[addiu(2, 0, 1)], 0x4000);
    let descs = describer().describe(&mut state, 0, 0x1000);
    assert_eq!(descs.len(), 1);
    assert!(descs[0].has(COMPILER_PAGE_FAULT | CAN_CAUSE_EXCEPTION));
}

#[test]
fn mapped_pages_are_validated_once() {
    let code = [addiu(2, 0, 1), addiu(3, 0, 1)];
    let (mut state, _) = state_with(0x1000, &code, 0x4000);
    state.tlb_write(0, identity_entry());
    let descs = Mips3Describer::new(8, 64, 256).describe(&mut state, 0, 0x1000);

    assert_eq!(descs.len(), 2);
    assert!(descs[0].has(VALIDATE_TLB));
    assert!(!descs[1].has(VALIDATE_TLB));
    assert_eq!(descs[0].pte & 0xffff_f000, 0x1000);

    // Fixed windows never need validation.
    let descs = Mips3Describer::new(4, 64, 256).describe(&mut state, 0, BASE);
    assert!(!descs[0].has(VALIDATE_TLB));
}

#[test]
fn sequence_length_is_bounded() {
    let code = [NOP; 8];
    let (mut state, _) = state_with(0x1000, &code, 0x4000);
    let descs = Mips3Describer::new(32, 3, 256).describe(&mut state, 0, BASE);

    assert_eq!(descs.len(), 8);
    let ends: Vec<usize> = descs
        .iter()
        .enumerate()
        .filter(|(_, d)| d.has(END_SEQUENCE))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(ends, vec![2, 5, 7]);
    assert!(descs.iter().all(|d| d.has(VIRTUAL_NOOP)));
}

#[test]
fn declared_cycle_costs() {
    let code = [mult(1, 2), div(1, 2), addiu(1, 1, 1)];
    let (mut state, _) = state_with(0x1000, &code, 0x4000);
    let descs = Mips3Describer::new(12, 64, 256).describe(&mut state, 0, BASE);
    let cycles: Vec<u32> = descs.iter().map(|d| d.cycles).collect();
    assert_eq!(cycles, vec![5, 36, 1]);
}
