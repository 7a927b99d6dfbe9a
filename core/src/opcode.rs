/// UML opcodes.
///
/// Integer ops are type-polymorphic over `I32`/`I64`, floating point
/// ops over `F32`/`F64`; the actual type is carried in `Inst::ty`.
/// Floating point values travel as raw bit patterns in integer slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // -- Code structure --
    Nop = 0,
    Handle,  // define a handle at this point
    Hash,    // register (mode, pc) at this point
    Label,   // define a local label
    Mapvar,  // set a map variable's value from here on
    Comment, // no-op carrying a guest pc for dumps

    // -- Control flow --
    Jmp,     // jump to label
    Callh,   // call handle
    Exh,     // set exception parameter and call handle
    Ret,     // return from handle
    Hashjmp, // dispatch through the hash table
    Exit,    // return an exit code to the execute loop
    Callc,   // call a native function
    Recover, // read a map variable as seen at the outermost call site
    GetExp,  // read the exception parameter
    SetFmod, // install rounding mode
    GetFmod, // read rounding mode

    // -- Integer --
    Mov,
    Setc,
    Add,
    Sub,
    Cmp,
    Test,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Sar,
    Muls, // signed widening multiply -> lo, hi
    Mulu,
    Divs, // signed divide -> quotient, remainder
    Divu,
    Sext,

    // -- Guest memory --
    TlbLookup, // page table entry for a virtual address
    LoadCode,  // instruction word at a physical address
    Read,
    Write,
    WriteM, // masked write
    FastRead,
    FastWrite,

    // -- Floating point --
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
    Fsqrt,
    Fabs,
    Fneg,
    Frecip,
    Frsqrt,
    Fcmp,
    Ftoint, // float -> integer with rounding
    Ffrint, // integer -> float
    Ffrflt, // float -> float of the other width

    // Sentinel, must be last
    Count,
}

/// Flags describing properties of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpFlags(u16);

impl OpFlags {
    pub const NONE: OpFlags = OpFlags(0);
    /// Never falls through to the next record.
    pub const BB_END: OpFlags = OpFlags(0x01);
    /// May transfer control elsewhere.
    pub const BRANCH: OpFlags = OpFlags(0x02);
    /// Accepts a condition code.
    pub const COND: OpFlags = OpFlags(0x04);
    /// Writes the flags register.
    pub const SETS_FLAGS: OpFlags = OpFlags(0x08);
    /// Integer type-polymorphic.
    pub const INT: OpFlags = OpFlags(0x10);
    /// Float type-polymorphic.
    pub const FLOAT: OpFlags = OpFlags(0x20);
    /// Touches guest memory or calls out of generated code.
    pub const SIDE_EFFECTS: OpFlags = OpFlags(0x40);
    /// Emits no record; consumed by the assembler.
    pub const PSEUDO: OpFlags = OpFlags(0x80);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: OpFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: OpFlags) -> Self {
        Self(self.0 | other.0)
    }
}

/// Static definition of an opcode.
///
/// Output operands come first in `Inst::args`, then inputs, then
/// constant arguments.
#[derive(Debug, Clone, Copy)]
pub struct OpDef {
    pub name: &'static str,
    pub nb_oargs: u8,
    pub nb_iargs: u8,
    pub nb_cargs: u8,
    pub flags: OpFlags,
}

impl OpDef {
    pub const fn nb_args(&self) -> u8 {
        self.nb_oargs + self.nb_iargs + self.nb_cargs
    }
}

const fn f(a: OpFlags, b: OpFlags) -> OpFlags {
    OpFlags(a.0 | b.0)
}

const fn d(
    name: &'static str,
    nb_oargs: u8,
    nb_iargs: u8,
    nb_cargs: u8,
    flags: OpFlags,
) -> OpDef {
    OpDef {
        name,
        nb_oargs,
        nb_iargs,
        nb_cargs,
        flags,
    }
}

const N: OpFlags = OpFlags::NONE;
const END: OpFlags = OpFlags::BB_END;
const BR: OpFlags = OpFlags::BRANCH;
const CD: OpFlags = OpFlags::COND;
const FL: OpFlags = OpFlags::SETS_FLAGS;
const INT: OpFlags = OpFlags::INT;
const FLT: OpFlags = OpFlags::FLOAT;
const SE: OpFlags = OpFlags::SIDE_EFFECTS;
const PS: OpFlags = OpFlags::PSEUDO;

/// Static opcode definition table, indexed by `Opcode as usize`.
pub static OPCODE_DEFS: [OpDef; Opcode::Count as usize] = [
    d("nop", 0, 0, 0, N),
    d("handle", 0, 0, 1, PS),
    d("hash", 0, 0, 2, PS),
    d("label", 0, 0, 1, PS),
    d("mapvar", 0, 0, 2, N),
    d("comment", 0, 0, 1, PS),
    d("jmp", 0, 0, 1, f(BR, CD)),
    d("callh", 0, 0, 1, f(f(BR, CD), SE)),
    d("exh", 0, 1, 1, f(f(BR, CD), SE)),
    d("ret", 0, 0, 0, f(f(BR, CD), END)),
    d("hashjmp", 0, 2, 1, f(f(BR, END), SE)),
    d("exit", 0, 1, 0, f(f(BR, CD), f(END, SE))),
    d("callc", 0, 0, 1, f(CD, SE)),
    d("recover", 1, 0, 1, N),
    d("getexp", 1, 0, 0, N),
    d("setfmod", 0, 1, 0, SE),
    d("getfmod", 1, 0, 0, N),
    d("mov", 1, 1, 0, f(INT, CD)),
    d("setc", 1, 0, 0, f(INT, CD)),
    d("add", 1, 2, 0, f(INT, FL)),
    d("sub", 1, 2, 0, f(INT, FL)),
    d("cmp", 0, 2, 0, f(INT, FL)),
    d("test", 0, 2, 0, f(INT, FL)),
    d("and", 1, 2, 0, f(INT, FL)),
    d("or", 1, 2, 0, f(INT, FL)),
    d("xor", 1, 2, 0, f(INT, FL)),
    d("shl", 1, 2, 0, INT),
    d("shr", 1, 2, 0, INT),
    d("sar", 1, 2, 0, INT),
    d("muls", 2, 2, 0, INT),
    d("mulu", 2, 2, 0, INT),
    d("divs", 2, 2, 0, INT),
    d("divu", 2, 2, 0, INT),
    d("sext", 1, 1, 1, INT),
    d("tlblookup", 1, 1, 0, N),
    d("loadcode", 1, 1, 0, SE),
    d("read", 1, 1, 1, SE),
    d("write", 0, 2, 1, SE),
    d("writem", 0, 3, 1, SE),
    d("fastread", 1, 1, 1, SE),
    d("fastwrite", 0, 3, 1, SE),
    d("fadd", 1, 2, 0, FLT),
    d("fsub", 1, 2, 0, FLT),
    d("fmul", 1, 2, 0, FLT),
    d("fdiv", 1, 2, 0, FLT),
    d("fsqrt", 1, 1, 0, FLT),
    d("fabs", 1, 1, 0, FLT),
    d("fneg", 1, 1, 0, FLT),
    d("frecip", 1, 1, 0, FLT),
    d("frsqrt", 1, 1, 0, FLT),
    d("fcmp", 0, 2, 0, f(FLT, FL)),
    d("ftoint", 1, 1, 2, FLT),
    d("ffrint", 1, 1, 1, FLT),
    d("ffrflt", 1, 1, 1, FLT),
];

impl Opcode {
    /// Look up this opcode's static definition.
    #[inline]
    pub fn def(self) -> &'static OpDef {
        &OPCODE_DEFS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.def().name
    }

    /// Whether control never continues with the next record.
    ///
    /// Conditional forms of `Ret` and `Exit` fall through when the
    /// condition fails, so callers check the condition as well.
    pub fn ends_block(self) -> bool {
        self.def().flags.contains(OpFlags::BB_END)
    }
}
