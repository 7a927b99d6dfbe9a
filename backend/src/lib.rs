pub mod code_cache;
pub mod error;
pub mod handle_table;
pub mod interp;
pub mod machine;

pub use code_cache::{CodeCache, DEFAULT_CACHE_SIZE};
pub use error::{CacheError, ExecError};
pub use handle_table::{HandleTable, DEFAULT_HANDLE_CAPACITY};
pub use interp::{Interpreter, RECORD_SIZE, SCRATCH_REGS};
pub use machine::Machine;

use drc_core::{Block, Handle, HashTable};

/// Trait for UML execution engines.
///
/// A backend turns finished blocks into code stored in the cache and
/// runs that code against a guest `Machine`.
pub trait Backend {
    /// Number of integer host registers generated code may name.
    /// Registers below `SCRATCH_REGS` are always scratch.
    fn host_registers(&self) -> u32;

    /// Assemble `block` into the cache.
    ///
    /// Handles defined in the block are bound and `Hash` points are
    /// installed only after the whole block fits; on `Err` nothing is
    /// registered. Returns the code pointer of the first record.
    fn generate(
        &mut self,
        cache: &mut CodeCache,
        handles: &mut HandleTable,
        hash: &mut HashTable,
        block: &Block,
    ) -> Result<u32, CacheError>;

    /// Run generated code starting at `entry` until an `Exit` op, and
    /// return its exit code.
    fn execute(
        &mut self,
        cache: &CodeCache,
        handles: &HandleTable,
        hash: &mut HashTable,
        entry: Handle,
        machine: &mut dyn Machine,
    ) -> Result<u32, ExecError>;
}
