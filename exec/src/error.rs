use drc_backend::{CacheError, ExecError};
use thiserror::Error;

/// Failures surfaced by the execution loop.
#[derive(Debug, Error)]
pub enum DrcError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("unable to fit code for mode {mode} pc {pc:#010x} in an empty cache")]
    CacheExhausted { mode: u8, pc: u32 },
    #[error("attempt to execute unmapped memory at pc {pc:#010x}")]
    UnmappedCode { pc: u32 },
    #[error("unimplemented instruction {opcode:#010x} at pc {pc:#010x}")]
    Unimplemented { pc: u32, opcode: u32 },
}
