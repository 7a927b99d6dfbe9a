//! Execution engine: owns the code cache and drives the
//! translate → execute cycle for a guest CPU.

pub mod error;
pub mod exec_loop;

pub use error::DrcError;
pub use exec_loop::{cpu_exec_loop, ExitReason};

use drc_backend::{Backend, CacheError, CodeCache, HandleTable, Machine, DEFAULT_HANDLE_CAPACITY};
use drc_core::{Block, Handle, HashTable};

/// Guest architecture as seen by the execution loop.
pub trait GuestCpu {
    /// Build the static handler blocks. The first call allocates the
    /// handles they define; later calls reuse them.
    fn static_blocks(&mut self, handles: &mut HandleTable) -> Result<Vec<Block>, CacheError>;

    /// Translate code at (`mode`, `pc`) into `block`. `hash` reports
    /// what is already compiled.
    fn translate(&mut self, hash: &HashTable, mode: u8, pc: u32, block: &mut Block);

    /// Handle that execution starts from.
    fn entry_handle(&self) -> Option<Handle>;

    fn machine(&mut self) -> &mut dyn Machine;

    /// Decode an exit code produced by generated code.
    fn exit_reason(&self, code: u32) -> ExitReason;
}

/// Execution environment holding all shared translation state.
pub struct ExecEnv<B: Backend> {
    pub cache: CodeCache,
    pub handles: HandleTable,
    pub hash: HashTable,
    pub backend: B,
    /// Scratch block reused by every compile request.
    pub block: Block,
    /// Static code must be regenerated before the next run.
    pub dirty: bool,
}

impl<B: Backend> ExecEnv<B> {
    /// Reserve a cache of `cache_size` bytes with its handle table
    /// carved from near memory.
    pub fn new(backend: B, cache_size: usize) -> Result<Self, CacheError> {
        let mut cache = CodeCache::allocate(cache_size)?;
        let handles = HandleTable::new(&mut cache, DEFAULT_HANDLE_CAPACITY)?;
        Ok(Self {
            cache,
            handles,
            hash: HashTable::new(),
            backend,
            block: Block::new(),
            dirty: true,
        })
    }

    /// Discard all generated code and regenerate the static handlers.
    pub fn flush<C: GuestCpu>(&mut self, cpu: &mut C) -> Result<(), CacheError> {
        self.cache.reset();
        self.handles.clear_definitions();
        self.hash.reset();
        let blocks = cpu.static_blocks(&mut self.handles)?;
        for block in &blocks {
            self.backend
                .generate(&mut self.cache, &mut self.handles, &mut self.hash, block)?;
        }
        self.dirty = false;
        tracing::info!(
            handlers = blocks.len(),
            used = self.cache.code_size(),
            "code cache flushed"
        );
        Ok(())
    }
}
