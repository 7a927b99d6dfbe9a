use std::io;

use thiserror::Error;

/// Failures of the code cache arena.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to reserve {size} bytes for the code cache: {source}")]
    OutOfMemory {
        size: usize,
        #[source]
        source: io::Error,
    },
    #[error("code cache full: requested {requested} bytes, {remaining} remaining")]
    Full { requested: usize, remaining: usize },
    #[error("handle table exhausted ({capacity} handles)")]
    HandlesExhausted { capacity: usize },
}

/// Failures while running generated code.
///
/// All of these indicate a translator or configuration bug; guest
/// exceptions are handled inside generated code.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("call to undefined handle '{name}'")]
    UndefinedHandle { name: &'static str },
    #[error("jump to unresolved label")]
    UnresolvedLabel,
    #[error("handle call stack overflow")]
    CallStackOverflow,
    #[error("return with empty call stack")]
    CallStackUnderflow,
    #[error("bad code pointer {0:#x}")]
    BadCodePointer(u32),
}
