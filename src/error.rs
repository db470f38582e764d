//! Error types for the coherence simulator.
//!
//! Fatal, well-defined conditions (bad configuration, malformed trace input)
//! are represented here and propagated with `?`. Invariant violations that
//! can only arise from a bug in this crate itself are not represented as
//! `SimError` variants; they panic via `unreachable!`/`debug_assert!` at the
//! point of violation instead, since by contract they never occur on
//! well-formed input.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout library code.
pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("block size {block_size_bytes} is not a power of two")]
    BlockSizeNotPowerOfTwo { block_size_bytes: u64 },

    #[error("cache size {cache_size_bytes} is not evenly divisible by block_size * associativity ({block_size_bytes} * {associativity})")]
    NonIntegralSetCount {
        cache_size_bytes: u64,
        block_size_bytes: u64,
        associativity: u64,
    },

    #[error("set count {set_count} is not a power of two")]
    SetCountNotPowerOfTwo { set_count: u64 },

    #[error("associativity must be at least 1")]
    ZeroAssociativity,

    #[error("protocol '{0}' is not implemented")]
    UnimplementedProtocol(String),

    #[error("unknown protocol '{0}', expected MESI or Dragon")]
    UnknownProtocol(String),

    #[error("trace file not found: {0}")]
    TraceFileMissing(PathBuf),

    #[error("{path}:{line_no}: malformed trace line: {line:?}")]
    TraceParse {
        path: PathBuf,
        line_no: usize,
        line: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
