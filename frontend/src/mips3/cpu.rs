//! MIPS III/IV CPU state layout.
//!
//! Guest state lives in a flat block of 64-bit slots so generated code
//! can name any field as `Operand::Mem(slot)`.

use drc_core::{FieldOffset, Operand};

/// Number of general-purpose registers.
pub const NUM_GPRS: usize = 32;
/// Number of FPU registers.
pub const NUM_FPRS: usize = 32;

// Slot indices into the state block.

pub const fn gpr_slot(i: usize) -> FieldOffset {
    i as FieldOffset
}
pub const HI: FieldOffset = 32;
pub const LO: FieldOffset = 33;
pub const PC: FieldOffset = 34;
/// Remaining cycles in the current `execute` slice (signed).
pub const ICOUNT: FieldOffset = 35;
/// Current hash mode: `(privilege << 1) | fr`.
pub const MODE: FieldOffset = 36;
/// Argument/result slots for native calls.
pub const ARG0: FieldOffset = 37;
pub const ARG1: FieldOffset = 38;
pub const FCR0: FieldOffset = 39;
pub const FCR31: FieldOffset = 40;
pub const LLBIT: FieldOffset = 41;
/// Total cycle count at which Count read as zero.
pub const COUNT_ZERO_TIME: FieldOffset = 42;
/// Cycle budget handed to the current `execute` slice.
pub const BUDGET: FieldOffset = 43;
/// Total cycles executed before the current slice.
pub const CYCLES_BASE: FieldOffset = 44;
/// Target of a register-indirect jump, captured before its delay slot.
pub const JMPDEST: FieldOffset = 45;
/// Pc following the WAIT the cpu is idling in, zero when not waiting.
pub const WAIT_RESUME: FieldOffset = 46;
pub const CPR0_BASE: FieldOffset = 48;
pub const FPR_BASE: FieldOffset = 80;
/// Total number of slots in the state block.
pub const STATE_SLOTS: usize = 112;

pub const fn cpr0_slot(reg: usize) -> FieldOffset {
    CPR0_BASE + reg as FieldOffset
}

pub const fn fpr_slot(reg: usize) -> FieldOffset {
    FPR_BASE + reg as FieldOffset
}

pub const fn mem(slot: FieldOffset) -> Operand {
    Operand::Mem(slot)
}

// Scratch registers.
pub const I0: Operand = Operand::I0;
pub const I1: Operand = Operand::I1;
pub const I2: Operand = Operand::I2;
pub const I3: Operand = Operand::I3;

/// Coprocessor 0 register indices.
pub mod cop0 {
    pub const INDEX: usize = 0;
    pub const RANDOM: usize = 1;
    pub const ENTRY_LO0: usize = 2;
    pub const ENTRY_LO1: usize = 3;
    pub const CONTEXT: usize = 4;
    pub const PAGE_MASK: usize = 5;
    pub const WIRED: usize = 6;
    pub const BAD_VADDR: usize = 8;
    pub const COUNT: usize = 9;
    pub const ENTRY_HI: usize = 10;
    pub const COMPARE: usize = 11;
    pub const STATUS: usize = 12;
    pub const CAUSE: usize = 13;
    pub const EPC: usize = 14;
    pub const PRID: usize = 15;
    pub const CONFIG: usize = 16;
    pub const LL_ADDR: usize = 17;
    pub const XCONTEXT: usize = 20;
    pub const ERROR_EPC: usize = 30;
}

/// Status register bits.
pub mod sr {
    pub const IE: u64 = 1 << 0;
    pub const EXL: u64 = 1 << 1;
    pub const ERL: u64 = 1 << 2;
    pub const KSU_MASK: u64 = 3 << 3;
    pub const KSU_SHIFT: u32 = 3;
    pub const IM_MASK: u64 = 0xff00;
    /// Software interrupt mask bits IM0/IM1.
    pub const IM_SOFT: u64 = 0x0300;
    pub const BEV: u64 = 1 << 22;
    pub const FR: u64 = 1 << 26;
    pub const FR_SHIFT: u32 = 26;
    pub const CU0: u64 = 1 << 28;
    pub const CU1: u64 = 1 << 29;
}

/// Cause register bits.
pub mod cause {
    pub const EXCCODE_MASK: u64 = 0x7c;
    pub const EXCCODE_SHIFT: u32 = 2;
    pub const IP_MASK: u64 = 0xff00;
    pub const IP_SOFT: u64 = 0x0300;
    /// Timer interrupt (Count == Compare).
    pub const IP7: u64 = 1 << 15;
    pub const CE_SHIFT: u32 = 28;
    pub const CE_MASK: u64 = 3 << 28;
    pub const BD: u64 = 1 << 31;
}

/// FCR31 bits.
pub mod fcr31 {
    pub const RM_MASK: u64 = 3;
    /// Condition bit for cc 0.
    pub const C: u64 = 1 << 23;

    /// Condition bit for cc `n` (MIPS IV has eight).
    pub const fn cc_bit(n: u32) -> u64 {
        if n == 0 {
            C
        } else {
            1 << (24 + n)
        }
    }
}

/// Privilege levels encoded in the KSU field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Privilege {
    Kernel = 0,
    Supervisor = 1,
    User = 2,
}

pub const PRIVILEGES: [Privilege; 3] =
    [Privilege::Kernel, Privilege::Supervisor, Privilege::User];

impl Privilege {
    pub const fn from_mode(mode: u8) -> Privilege {
        match mode >> 1 {
            0 => Privilege::Kernel,
            1 => Privilege::Supervisor,
            _ => Privilege::User,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Privilege::Kernel => "kernel",
            Privilege::Supervisor => "supervisor",
            Privilege::User => "user",
        }
    }
}

/// Hash mode for a Status register value.
pub const fn mode_from_status(status: u64) -> u8 {
    let fr = ((status >> sr::FR_SHIFT) & 1) as u8;
    let privilege = if status & (sr::EXL | sr::ERL) != 0 {
        0
    } else {
        match (status & sr::KSU_MASK) >> sr::KSU_SHIFT {
            0 => 0,
            1 => 1,
            // 3 is reserved and behaves as user mode.
            _ => 2,
        }
    };
    (privilege << 1) | fr
}

/// Whether a hash mode selects the FR=1 register layout.
pub const fn mode_fr(mode: u8) -> bool {
    mode & 1 != 0
}

/// Guest architectural exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Exception {
    Interrupt = 0,
    TlbMod,
    TlbLoad,
    TlbStore,
    TlbLoadFill,
    TlbStoreFill,
    AddressLoad,
    AddressStore,
    Syscall,
    Break,
    Invalid,
    BadCop,
    Overflow,
    Trap,
}

pub const EXCEPTION_COUNT: usize = 14;

pub const EXCEPTIONS: [Exception; EXCEPTION_COUNT] = [
    Exception::Interrupt,
    Exception::TlbMod,
    Exception::TlbLoad,
    Exception::TlbStore,
    Exception::TlbLoadFill,
    Exception::TlbStoreFill,
    Exception::AddressLoad,
    Exception::AddressStore,
    Exception::Syscall,
    Exception::Break,
    Exception::Invalid,
    Exception::BadCop,
    Exception::Overflow,
    Exception::Trap,
];

impl Exception {
    /// ExcCode field value.
    pub const fn code(self) -> u64 {
        match self {
            Exception::Interrupt => 0,
            Exception::TlbMod => 1,
            Exception::TlbLoad | Exception::TlbLoadFill => 2,
            Exception::TlbStore | Exception::TlbStoreFill => 3,
            Exception::AddressLoad => 4,
            Exception::AddressStore => 5,
            Exception::Syscall => 8,
            Exception::Break => 9,
            Exception::Invalid => 10,
            Exception::BadCop => 11,
            Exception::Overflow => 12,
            Exception::Trap => 13,
        }
    }

    /// Offset from the vector base.
    pub const fn vector_offset(self) -> u32 {
        match self {
            Exception::TlbLoadFill | Exception::TlbStoreFill => 0x000,
            _ => 0x180,
        }
    }

    /// Whether the exception records a faulting address.
    pub const fn has_bad_vaddr(self) -> bool {
        matches!(
            self,
            Exception::TlbMod
                | Exception::TlbLoad
                | Exception::TlbStore
                | Exception::TlbLoadFill
                | Exception::TlbStoreFill
                | Exception::AddressLoad
                | Exception::AddressStore
        )
    }

    pub const fn is_tlb(self) -> bool {
        matches!(
            self,
            Exception::TlbMod
                | Exception::TlbLoad
                | Exception::TlbStore
                | Exception::TlbLoadFill
                | Exception::TlbStoreFill
        )
    }

    pub const fn name(self) -> &'static str {
        match self {
            Exception::Interrupt => "interrupt",
            Exception::TlbMod => "tlbmod",
            Exception::TlbLoad => "tlbload",
            Exception::TlbStore => "tlbstore",
            Exception::TlbLoadFill => "tlbload_fill",
            Exception::TlbStoreFill => "tlbstore_fill",
            Exception::AddressLoad => "addrerr_load",
            Exception::AddressStore => "addrerr_store",
            Exception::Syscall => "syscall",
            Exception::Break => "break",
            Exception::Invalid => "invalid",
            Exception::BadCop => "badcop",
            Exception::Overflow => "overflow",
            Exception::Trap => "trap",
        }
    }
}

/// Exception vector bases.
pub const VECTOR_BASE: u32 = 0x8000_0000;
pub const BEV_VECTOR_BASE: u32 = 0xbfc0_0200;
/// Reset vector.
pub const RESET_VECTOR: u32 = 0xbfc0_0000;

/// Marker set in the PC map variable for instructions in a delay slot.
pub const DELAY_SLOT_FLAG: u64 = 1;

/// Exit codes returned by generated code.
pub mod exit {
    pub const OUT_OF_CYCLES: u32 = 0;
    pub const MISSING_CODE: u32 = 1;
    pub const UNMAPPED_CODE: u32 = 2;
    pub const RESET_CACHE: u32 = 3;
    pub const UNIMPLEMENTED: u32 = 4;
}

/// Native functions reachable through `Callc`.
///
/// Arguments and results travel in ARG0. ARG1 always holds the cycles
/// the calling sequence has consumed but not yet charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum NativeCall {
    ReadCount = 0,
    WriteCount,
    WriteCompare,
    WriteStatus,
    WriteEntryHi,
    ReadRandom,
    TlbRead,
    TlbWriteIndexed,
    TlbWriteRandom,
    TlbProbe,
}

impl NativeCall {
    pub const fn from_u32(v: u32) -> Option<NativeCall> {
        match v {
            0 => Some(NativeCall::ReadCount),
            1 => Some(NativeCall::WriteCount),
            2 => Some(NativeCall::WriteCompare),
            3 => Some(NativeCall::WriteStatus),
            4 => Some(NativeCall::WriteEntryHi),
            5 => Some(NativeCall::ReadRandom),
            6 => Some(NativeCall::TlbRead),
            7 => Some(NativeCall::TlbWriteIndexed),
            8 => Some(NativeCall::TlbWriteRandom),
            9 => Some(NativeCall::TlbProbe),
            _ => None,
        }
    }
}
