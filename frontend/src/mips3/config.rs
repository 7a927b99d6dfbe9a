use serde::{Deserialize, Serialize};

/// Maximum number of fast-RAM regions.
pub const MAX_FASTRAM: usize = 4;
/// Maximum number of hotspot entries.
pub const MAX_HOTSPOTS: usize = 16;

/// Configuration applied when a CPU context is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mips3Config {
    pub big_endian: bool,
    /// Code cache arena size in bytes.
    pub cache_size: usize,
    /// Host registers offered by the backend.
    pub host_registers: u32,
    /// Sum every instruction word when checking for modified code.
    pub strict_verify: bool,
    /// Raise a coprocessor-unusable exception for FPU ops when CU1 is
    /// clear.
    pub strict_cop1: bool,
    /// Trap on signed overflow in ADD/SUB/ADDI/DADD/DSUB/DADDI.
    pub overflow_traps: bool,
    /// Bytes described ahead of the requested pc.
    pub window_end: u32,
    /// Instructions per sequence.
    pub max_sequence: u32,
    /// Instructions per compile request.
    pub max_instructions: u32,
    pub tlb_entries: usize,
    /// PRId register value.
    pub prid: u32,
}

impl Default for Mips3Config {
    fn default() -> Self {
        Self {
            big_endian: true,
            cache_size: 32 * 1024 * 1024,
            host_registers: 9,
            strict_verify: false,
            strict_cop1: false,
            overflow_traps: true,
            window_end: 512,
            max_sequence: 64,
            max_instructions: 256,
            tlb_entries: 48,
            prid: 0x0b00,
        }
    }
}
