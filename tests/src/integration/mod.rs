//! End-to-end runs through `CpuContext`.

use drc_frontend::mips3::cpu::{cause, cop0, sr, RESET_VECTOR};
use drc_frontend::mips3::state::StateImage;
use drc_frontend::mips3::tlb::TlbEntry;
use drc_mips3::{
    AddressSpace, ConfigError, ContextError, CpuContext, DrcError, Intent, Mips3Config,
};

use proptest::prelude::*;

use crate::asm::*;
use crate::support::*;

const BASE: u32 = KSEG0 + 0x1000;
const GENERAL_VECTOR: u32 = KSEG0 + 0x180;

fn cop0_reg(ctx: &CpuContext, reg: usize) -> u64 {
    ctx.state().cop0(reg)
}

fn exc_code(ctx: &CpuContext) -> u64 {
    (cop0_reg(ctx, cop0::CAUSE) & cause::EXCCODE_MASK) >> cause::EXCCODE_SHIFT
}

/// Single-stepping context running `code` from kseg0.
fn kseg0_context(code: &[u32]) -> (CpuContext, FlatMemory) {
    let (mut ctx, mem) = context(single_step_config(), 0x1000, code);
    set_pc(&mut ctx, BASE);
    (ctx, mem)
}

#[test]
fn single_instruction_through_the_tlb() {
    let (mut ctx, _) = context(single_step_config(), 0x1000, &[addiu(2, 0, 5)]);
    map_identity(&mut ctx);
    set_pc(&mut ctx, 0x1000);

    assert_eq!(ctx.execute(0).unwrap(), 1);
    assert_eq!(gpr(&ctx, 2), 5);
    assert_eq!(ctx.state().pc(), 0x1004);
}

#[test]
fn stores_to_fast_ram_bypass_memory() {
    let mem = FlatMemory::new(0);
    let mut ctx = CpuContext::init(single_step_config(), Box::new(mem.clone())).unwrap();
    set_status(&mut ctx, 0);

    let mut ram = vec![0u8; 0x10000];
    ram[0x1000..0x1004].copy_from_slice(&sw(1, 2, 0).to_be_bytes());
    ctx.add_fastram(0, 0xffff, false, ram).unwrap();
    map_identity(&mut ctx);
    set_pc(&mut ctx, 0x1000);
    set_gpr(&mut ctx, 2, 0x100);
    set_gpr(&mut ctx, 1, 0xdead_beef);

    ctx.execute(0).unwrap();
    let region = ctx.fastram(0).unwrap();
    assert_eq!(&region.data()[0x100..0x104], &[0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(mem.writes(), 0);
    assert_eq!(ctx.state().pc(), 0x1004);
}

#[test]
fn hotspots_add_cycles() {
    let (mut ctx, _) = context(single_step_config(), 0x2000, &[NOP]);
    map_identity(&mut ctx);
    set_pc(&mut ctx, 0x2000);
    assert_eq!(ctx.execute(0).unwrap(), 1);

    let (mut ctx, _) = context(single_step_config(), 0x2000, &[NOP]);
    map_identity(&mut ctx);
    set_pc(&mut ctx, 0x2000);
    ctx.add_hotspot(0x2000, NOP, 50).unwrap();
    assert_eq!(ctx.execute(0).unwrap(), 51);
    assert_eq!(ctx.state().pc(), 0x2004);
}

fn tlb_fault_context() -> (CpuContext, FlatMemory) {
    let (ctx, mem) = kseg0_context(&[lui(4, 0x0400), lw(3, 4, 0)]);
    mem.load(0x000, &[addiu(5, 0, 1)]);
    mem.load(0x180, &[addiu(5, 0, 2)]);
    (ctx, mem)
}

#[test]
fn load_from_unmapped_page_takes_the_refill_vector() {
    let (mut ctx, _) = tlb_fault_context();

    assert_eq!(ctx.execute(2).unwrap(), 3);
    assert_eq!(gpr(&ctx, 5), 1);
    assert_eq!(ctx.state().pc(), KSEG0 + 4);
    assert_eq!(cop0_reg(&ctx, cop0::EPC), sext(BASE + 4));
    assert_eq!(exc_code(&ctx), 2);
    assert_eq!(cop0_reg(&ctx, cop0::BAD_VADDR), 0x0400_0000);
    assert_ne!(cop0_reg(&ctx, cop0::STATUS) & sr::EXL, 0);
    assert_eq!(cop0_reg(&ctx, cop0::CAUSE) & cause::BD, 0);
}

#[test]
fn load_from_invalid_entry_takes_the_general_vector() {
    let (mut ctx, _) = tlb_fault_context();
    let entry = TlbEntry {
        page_mask: 0,
        entry_hi: 0x0400_0000,
        entry_lo: [1, 1],
    };
    ctx.state_mut().tlb_write(0, entry);

    ctx.execute(2).unwrap();
    assert_eq!(gpr(&ctx, 5), 2);
    assert_eq!(ctx.state().pc(), GENERAL_VECTOR + 4);
    assert_eq!(exc_code(&ctx), 2);
    assert_eq!(cop0_reg(&ctx, cop0::EPC), sext(BASE + 4));
}

#[test]
fn loop_cycles_are_conserved() {
    let code = [addiu(2, 2, 1), beq(0, 0, -2), NOP];
    let (mut ctx, _) = context(Mips3Config::default(), 0x1000, &code);
    set_pc(&mut ctx, BASE);

    assert_eq!(ctx.execute(30).unwrap(), 33);
    assert_eq!(gpr(&ctx, 2), 11);
    assert_eq!(ctx.state().pc(), BASE);

    // The next call resumes where the budget ran out.
    assert_eq!(ctx.execute(0).unwrap(), 3);
    assert_eq!(gpr(&ctx, 2), 12);
    assert_eq!(ctx.state().total_cycles(), 36);
}

#[test]
fn compare_match_raises_the_timer_line() {
    let code = [addiu(2, 2, 1), beq(0, 0, -2), NOP];
    let (mut ctx, _) = context(Mips3Config::default(), 0x1000, &code);
    set_pc(&mut ctx, BASE);
    ctx.state_mut().set_compare(10, 0);

    let consumed = ctx.execute(100).unwrap();
    assert!(consumed > 100);
    assert_ne!(cop0_reg(&ctx, cop0::CAUSE) & cause::IP7, 0);
    assert_eq!(ctx.state().total_cycles(), consumed);
    assert_eq!(ctx.state().count() as u64, consumed / 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn word_results_are_sign_extended(a in any::<u32>(), imm in any::<i16>()) {
        let (mut ctx, _) = kseg0_context(&[addiu(2, 1, imm), addu(3, 1, 1)]);
        set_gpr(&mut ctx, 1, sext(a));
        ctx.execute(1).unwrap();
        prop_assert_eq!(gpr(&ctx, 2), sext(a.wrapping_add(imm as i32 as u32)));
        prop_assert_eq!(gpr(&ctx, 3), sext(a.wrapping_add(a)));
    }
}

#[test]
fn jump_target_is_read_before_the_delay_slot() {
    let (mut ctx, mem) = kseg0_context(&[jr(31), addiu(31, 0, 7)]);
    mem.load(0x1100, &[addiu(2, 0, 9)]);
    set_gpr(&mut ctx, 31, sext(BASE + 0x100));

    assert_eq!(ctx.execute(0).unwrap(), 2);
    assert_eq!(gpr(&ctx, 31), 7);
    assert_eq!(ctx.state().pc(), BASE + 0x100);

    ctx.execute(0).unwrap();
    assert_eq!(gpr(&ctx, 2), 9);
}

#[test]
fn link_register_holds_the_return_address() {
    let (mut ctx, _) = kseg0_context(&[bgezal(0, 8), NOP]);
    ctx.execute(0).unwrap();
    assert_eq!(gpr(&ctx, 31), sext(BASE + 8));
    assert_eq!(ctx.state().pc(), BASE + 4 + 32);
}

#[test]
fn break_in_delay_slot_reports_the_branch() {
    let (mut ctx, _) = kseg0_context(&[beq(0, 0, 0x10), break_()]);

    assert_eq!(ctx.execute(0).unwrap(), 2);
    assert_eq!(cop0_reg(&ctx, cop0::EPC), sext(BASE));
    assert_ne!(cop0_reg(&ctx, cop0::CAUSE) & cause::BD, 0);
    assert_eq!(exc_code(&ctx), 9);
    assert_eq!(ctx.state().pc(), GENERAL_VECTOR);
}

#[test]
fn exception_with_no_budget_still_updates_cop0() {
    let (mut ctx, _) = kseg0_context(&[syscall()]);

    assert_eq!(ctx.execute(0).unwrap(), 1);
    assert_eq!(cop0_reg(&ctx, cop0::EPC), sext(BASE));
    assert_eq!(exc_code(&ctx), 8);
    assert_eq!(ctx.state().pc(), GENERAL_VECTOR);
}

#[test]
fn signed_overflow_traps() {
    let code = [addi(2, 1, 1)];
    let (mut ctx, _) = kseg0_context(&code);
    set_gpr(&mut ctx, 1, 0x7fff_ffff);
    set_gpr(&mut ctx, 2, 0x55);
    ctx.execute(0).unwrap();
    assert_eq!(gpr(&ctx, 2), 0x55);
    assert_eq!(exc_code(&ctx), 12);
    assert_eq!(ctx.state().pc(), GENERAL_VECTOR);

    let config = Mips3Config {
        overflow_traps: false,
        ..single_step_config()
    };
    let (mut ctx, _) = context(config, 0x1000, &code);
    set_pc(&mut ctx, BASE);
    set_gpr(&mut ctx, 1, 0x7fff_ffff);
    ctx.execute(0).unwrap();
    assert_eq!(gpr(&ctx, 2), sext(0x8000_0000));
    assert_eq!(ctx.state().pc(), BASE + 4);
}

#[test]
fn loads_extend_by_width() {
    let code = [
        lw(2, 4, 0),
        lwu(3, 4, 0),
        lb(6, 4, 0),
        lbu(7, 4, 0),
        addiu(5, 0, -1),
        addiu(0, 0, 5),
        lw(0, 4, 0),
    ];
    let (mut ctx, mem) = context(Mips3Config::default(), 0x1000, &code);
    mem.load(0x2000, &[0x8000_00f0]);
    set_pc(&mut ctx, BASE);
    set_gpr(&mut ctx, 4, sext(KSEG0 + 0x2000));

    ctx.execute(0).unwrap();
    assert_eq!(gpr(&ctx, 2), 0xffff_ffff_8000_00f0);
    assert_eq!(gpr(&ctx, 3), 0x8000_00f0);
    assert_eq!(gpr(&ctx, 6), 0xffff_ffff_ffff_ff80);
    assert_eq!(gpr(&ctx, 7), 0x80);
    assert_eq!(gpr(&ctx, 5), u64::MAX);
    assert_eq!(gpr(&ctx, 0), 0);
}

#[test]
fn unaligned_word_pair() {
    let (mut ctx, mem) = context(Mips3Config::default(), 0x1000, &[lwl(2, 4, 1), lwr(2, 4, 4)]);
    mem.load(0x2000, &[0x0011_2233, 0x4455_6677]);
    set_pc(&mut ctx, BASE);
    set_gpr(&mut ctx, 4, sext(KSEG0 + 0x2000));

    ctx.execute(0).unwrap();
    assert_eq!(gpr(&ctx, 2), 0x1122_3344);
}

#[test]
fn misaligned_load_is_an_address_error() {
    let (mut ctx, _) = kseg0_context(&[lw(2, 4, 2)]);
    set_gpr(&mut ctx, 4, sext(KSEG0 + 0x2000));
    ctx.execute(0).unwrap();
    assert_eq!(exc_code(&ctx), 4);
    assert_eq!(cop0_reg(&ctx, cop0::BAD_VADDR), sext(KSEG0 + 0x2002));
}

#[test]
fn store_conditional_needs_a_link() {
    let code = [sc(5, 4, 4), ll(2, 4, 0), sc(3, 4, 0)];
    let (mut ctx, mem) = context(Mips3Config::default(), 0x1000, &code);
    mem.load(0x2000, &[0x1111_1111]);
    set_pc(&mut ctx, BASE);
    set_gpr(&mut ctx, 4, sext(KSEG0 + 0x2000));
    set_gpr(&mut ctx, 5, 9);
    set_gpr(&mut ctx, 3, 0x1234);

    ctx.execute(0).unwrap();
    assert_eq!(gpr(&ctx, 5), 0);
    assert_eq!(mem.word(0x2004), 0);
    assert_eq!(gpr(&ctx, 2), 0x1111_1111);
    assert_eq!(gpr(&ctx, 3), 1);
    assert_eq!(mem.word(0x2000), 0x1234);
}

#[test]
fn modified_code_is_recompiled() {
    let (mut ctx, mem) = kseg0_context(&[addiu(2, 0, 1)]);
    ctx.execute(0).unwrap();
    assert_eq!(gpr(&ctx, 2), 1);

    mem.load(0x1000, &[addiu(2, 0, 2)]);
    set_pc(&mut ctx, BASE);
    assert_eq!(ctx.execute(0).unwrap(), 1);
    assert_eq!(gpr(&ctx, 2), 2);
    assert_eq!(ctx.state().pc(), BASE + 4);
}

#[test]
fn multiply_and_divide() {
    let code = [mult(1, 2), mflo(3), mfhi(4), div(1, 5), mflo(6), mfhi(7)];
    let (mut ctx, _) = context(Mips3Config::default(), 0x1000, &code);
    set_pc(&mut ctx, BASE);
    set_gpr(&mut ctx, 1, 0x10);
    set_gpr(&mut ctx, 2, sext(0xffff_fffd));
    set_gpr(&mut ctx, 5, 3);

    ctx.execute(0).unwrap();
    assert_eq!(gpr(&ctx, 3), sext(0xffff_ffd0));
    assert_eq!(gpr(&ctx, 4), u64::MAX);
    assert_eq!(gpr(&ctx, 6), 5);
    assert_eq!(gpr(&ctx, 7), 1);
}

#[test]
fn eret_returns_to_epc() {
    let (mut ctx, mem) = kseg0_context(&[eret()]);
    mem.load(0x1040, &[addiu(2, 0, 3)]);
    set_status(&mut ctx, sr::EXL);
    ctx.state_mut().set_cop0(cop0::EPC, sext(BASE + 0x40));

    assert_eq!(ctx.execute(0).unwrap(), 1);
    assert_eq!(ctx.state().pc(), BASE + 0x40);
    assert_eq!(cop0_reg(&ctx, cop0::STATUS) & sr::EXL, 0);

    ctx.execute(0).unwrap();
    assert_eq!(gpr(&ctx, 2), 3);
}

#[test]
fn pending_interrupt_is_taken_at_entry() {
    let (mut ctx, mem) = kseg0_context(&[addiu(2, 0, 1)]);
    mem.load(0x180, &[addiu(5, 0, 2)]);
    set_status(&mut ctx, sr::IE | 0x0400);
    ctx.set_irq_line(0, true);

    assert_eq!(ctx.execute(0).unwrap(), 1);
    assert_eq!(gpr(&ctx, 2), 0);
    assert_eq!(gpr(&ctx, 5), 2);
    assert_eq!(exc_code(&ctx), 0);
    assert_eq!(cop0_reg(&ctx, cop0::EPC), sext(BASE));
    assert_eq!(ctx.state().pc(), GENERAL_VECTOR + 4);
}

#[test]
fn enabling_interrupts_takes_the_pending_one() {
    let (mut ctx, _) = kseg0_context(&[mtc0(1, cop0::STATUS as u32), addiu(2, 0, 1)]);
    set_gpr(&mut ctx, 1, sr::IE | 0x0400);
    ctx.set_irq_line(0, true);

    // One cycle for MTC0, one for the NOP at the vector.
    assert_eq!(ctx.execute(0).unwrap(), 2);
    assert_eq!(gpr(&ctx, 2), 0);
    assert_eq!(exc_code(&ctx), 0);
    assert_eq!(cop0_reg(&ctx, cop0::EPC), sext(BASE + 4));
    assert_eq!(ctx.state().pc(), GENERAL_VECTOR + 4);
}

#[test]
fn masked_interrupt_is_ignored() {
    let (mut ctx, _) = kseg0_context(&[addiu(2, 0, 1)]);
    set_status(&mut ctx, 0x0400);
    ctx.set_irq_line(0, true);
    ctx.execute(0).unwrap();
    assert_eq!(gpr(&ctx, 2), 1);
    assert_ne!(cop0_reg(&ctx, cop0::CAUSE) & 0x0400, 0);
}

#[test]
fn wait_idles_until_the_budget_runs_out() {
    let code = [wait(), addiu(2, 0, 1)];
    let (mut ctx, _) = context(Mips3Config::default(), 0x1000, &code);
    set_pc(&mut ctx, BASE);

    assert_eq!(ctx.execute(10).unwrap(), 11);
    assert_eq!(ctx.state().pc(), BASE);
    assert_eq!(gpr(&ctx, 2), 0);

    assert_eq!(ctx.execute(0).unwrap(), 1);
    assert_eq!(ctx.state().pc(), BASE);
}

#[test]
fn interrupt_wakes_a_waiting_cpu() {
    let code = [wait(), addiu(2, 0, 1)];
    let (mut ctx, mem) = context(Mips3Config::default(), 0x1000, &code);
    mem.load(0x180, &[addiu(5, 0, 2)]);
    set_pc(&mut ctx, BASE);
    set_status(&mut ctx, sr::IE | 0x0400);

    assert_eq!(ctx.execute(10).unwrap(), 11);
    assert_eq!(ctx.state().pc(), BASE);

    ctx.set_irq_line(0, true);
    ctx.execute(0).unwrap();
    assert_eq!(exc_code(&ctx), 0);
    // The handler returns to the instruction after the WAIT.
    assert_eq!(cop0_reg(&ctx, cop0::EPC), sext(BASE + 4));
    assert_eq!(gpr(&ctx, 5), 2);
    assert_eq!(gpr(&ctx, 2), 0);
}

#[test]
fn processor_id_reads_back() {
    let (mut ctx, _) = kseg0_context(&[mfc0(2, cop0::PRID as u32)]);
    ctx.execute(0).unwrap();
    assert_eq!(gpr(&ctx, 2), 0x0b00);
}

#[test]
fn single_precision_add() {
    let code = [mtc1(1, 2), mtc1(2, 4), add_s(6, 2, 4), mfc1(3, 6)];
    let (mut ctx, _) = context(Mips3Config::default(), 0x1000, &code);
    set_pc(&mut ctx, BASE);
    set_gpr(&mut ctx, 1, 1.5f32.to_bits() as u64);
    set_gpr(&mut ctx, 2, 2.25f32.to_bits() as u64);

    ctx.execute(0).unwrap();
    assert_eq!(gpr(&ctx, 3), 3.75f32.to_bits() as u64);
}

#[test]
fn integer_conversion_round_trip() {
    let code = [mtc1(1, 2), cvt_d_w(4, 2), add_d(4, 4, 4), trunc_w_d(6, 4), mfc1(3, 6)];
    let (mut ctx, _) = context(Mips3Config::default(), 0x1000, &code);
    set_pc(&mut ctx, BASE);
    set_gpr(&mut ctx, 1, 21);

    ctx.execute(0).unwrap();
    assert_eq!(gpr(&ctx, 3), 42);
}

#[test]
fn invalid_conversions_give_the_default_result() {
    for input in [f32::NAN, -1.0e10, 3.0e9] {
        let code = [mtc1(1, 2), trunc_w_s(6, 2), mfc1(3, 6)];
        let (mut ctx, _) = context(Mips3Config::default(), 0x1000, &code);
        set_pc(&mut ctx, BASE);
        set_gpr(&mut ctx, 1, input.to_bits() as u64);

        ctx.execute(0).unwrap();
        assert_eq!(gpr(&ctx, 3), 0x7fff_ffff, "trunc.w.s of {input}");
    }
}

#[test]
fn float_compare_drives_branch() {
    let code = [
        mtc1(1, 2),
        mtc1(2, 4),
        c_lt_s(2, 4),
        bc1t(2),
        NOP,
        addiu(3, 0, 1),
        addiu(5, 0, 1),
    ];
    let (mut ctx, _) = context(Mips3Config::default(), 0x1000, &code);
    set_pc(&mut ctx, BASE);
    set_gpr(&mut ctx, 1, 1.0f32.to_bits() as u64);
    set_gpr(&mut ctx, 2, 2.0f32.to_bits() as u64);

    // Enough budget to follow the branch into the next sequence.
    ctx.execute(100).unwrap();
    assert_eq!(gpr(&ctx, 3), 0);
    assert_eq!(gpr(&ctx, 5), 1);
}

#[test]
fn executing_unbacked_memory_fails() {
    let (mut ctx, _) = context(single_step_config(), 0x1000, &[]);
    set_pc(&mut ctx, KSEG0 + 0x0002_0000);
    let err = ctx.execute(0).unwrap_err();
    assert!(matches!(err, DrcError::UnmappedCode { pc: 0x8002_0000 }));
}

#[test]
fn context_round_trip() {
    let (mut ctx, _) = kseg0_context(&[]);
    set_gpr(&mut ctx, 7, 0x1234);
    map_identity(&mut ctx);
    let blob = ctx.get_context().unwrap();

    set_gpr(&mut ctx, 7, 0);
    ctx.state_mut().tlb_write(0, TlbEntry::default());
    assert_eq!(ctx.translate_address(AddressSpace::Data, Intent::Read, 0x1000), None);

    ctx.set_context(&blob).unwrap();
    assert_eq!(gpr(&ctx, 7), 0x1234);
    assert_eq!(ctx.state().pc(), BASE);
    assert_eq!(
        ctx.translate_address(AddressSpace::Data, Intent::Read, 0x1000),
        Some(0x1000)
    );
}

#[test]
fn context_from_other_configuration_is_rejected() {
    let (ctx, _) = kseg0_context(&[]);
    let blob = ctx.get_context().unwrap();

    let config = Mips3Config {
        tlb_entries: 32,
        ..single_step_config()
    };
    let (mut other, _) = context(config, 0x1000, &[]);
    let err = other.set_context(&blob).unwrap_err();
    assert!(matches!(err, ContextError::TlbSize { expected: 32, found: 48 }));

    let err = other.set_context(&[1, 2, 3]).unwrap_err();
    assert!(matches!(err, ContextError::Decode(_)));
}

#[test]
fn truncated_register_file_is_rejected() {
    let (mut ctx, _) = kseg0_context(&[]);
    let blob = ctx.get_context().unwrap();
    let mut image: StateImage = bincode::deserialize(&blob).unwrap();
    image.regs.truncate(8);
    let blob = bincode::serialize(&image).unwrap();

    let err = ctx.set_context(&blob).unwrap_err();
    assert!(matches!(err, ContextError::SlotCount { found: 8, .. }));
}

#[test]
fn runtime_configuration_limits() {
    let (mut ctx, _) = kseg0_context(&[]);
    ctx.execute(0).unwrap();
    assert!(!ctx.is_dirty());

    assert_eq!(
        ctx.add_fastram(0x100, 0xff, false, Vec::new()),
        Err(ConfigError::InvertedWindow { start: 0x100, end: 0xff })
    );
    assert!(!ctx.is_dirty());
    for i in 0..4u32 {
        ctx.add_fastram(i * 0x1000, i * 0x1000 + 0xfff, true, vec![0; 0x1000]).unwrap();
    }
    assert!(ctx.is_dirty());
    assert_eq!(
        ctx.add_fastram(0x8000, 0x8fff, true, vec![0; 0x1000]),
        Err(ConfigError::TooManyFastRam { max: 4 })
    );

    for i in 0..16 {
        ctx.add_hotspot(i * 4, NOP, 1).unwrap();
    }
    assert_eq!(
        ctx.add_hotspot(0x100, NOP, 1),
        Err(ConfigError::TooManyHotspots { max: 16 })
    );
}

#[test]
fn address_translation_follows_privilege() {
    let (mut ctx, _) = kseg0_context(&[]);
    let data = AddressSpace::Data;
    assert_eq!(ctx.translate_address(data, Intent::Read, 0x8000_1234), Some(0x1234));
    assert_eq!(ctx.translate_address(data, Intent::Write, 0xa000_1234), Some(0x1234));
    assert_eq!(ctx.translate_address(data, Intent::Read, 0x1000), None);

    map_identity(&mut ctx);
    assert_eq!(ctx.translate_address(data, Intent::Read, 0x1000), Some(0x1000));
    assert_eq!(
        ctx.translate_address(AddressSpace::Program, Intent::Read, 0x1000),
        Some(0x1000)
    );

    set_status(&mut ctx, 2 << sr::KSU_SHIFT);
    assert_eq!(ctx.translate_address(data, Intent::Read, 0x8000_1234), None);
    assert_eq!(ctx.translate_address(data, Intent::Write, 0x1000), Some(0x1000));
}

#[test]
fn reset_restores_power_on_state() {
    let (mut ctx, _) = kseg0_context(&[addiu(2, 0, 1)]);
    ctx.execute(0).unwrap();
    ctx.reset();
    assert!(ctx.is_dirty());
    assert_eq!(ctx.state().pc(), RESET_VECTOR);
    assert_eq!(gpr(&ctx, 2), 0);
    assert_eq!(cop0_reg(&ctx, cop0::STATUS), sr::BEV | sr::ERL);
    ctx.exit();
}
