use thiserror::Error;

/// Failures restoring a saved context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("malformed context blob: {0}")]
    Decode(#[from] bincode::Error),
    #[error("context holds {found} state slots, expected {expected}")]
    SlotCount { expected: usize, found: usize },
    #[error("context holds {found} TLB entries, expected {expected}")]
    TlbSize { expected: usize, found: usize },
}

/// Rejected runtime configuration changes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at most {max} fast-RAM regions may be installed")]
    TooManyFastRam { max: usize },
    #[error("fast-RAM window {start:#010x}..={end:#010x} is inverted")]
    InvertedWindow { start: u32, end: u32 },
    #[error("at most {max} hotspots may be installed")]
    TooManyHotspots { max: usize },
}
