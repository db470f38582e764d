//! Resolved run configuration: cache geometry, protocol selection, and the
//! fixed timing constants charged by the bus and core state machine.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, SimError};

pub const NUM_CORES: usize = 4;

/// Coherence protocol selector. `Dragon` is parsed but rejected by
/// [`Config::new`] — the interface is reserved, not implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Protocol {
    #[value(name = "MESI")]
    Mesi,
    #[value(name = "Dragon")]
    Dragon,
}

impl FromStr for Protocol {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MESI" => Ok(Protocol::Mesi),
            "DRAGON" => Ok(Protocol::Dragon),
            other => Err(SimError::UnknownProtocol(other.to_string())),
        }
    }
}

/// Fixed timing constants (reference values from the external interface).
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub l1_cache_hit_cc: u64,
    pub mem_fetch_cc: u64,
    pub bus_update_word_cc: u64,
    pub evict_dirty_cache_block_cc: u64,
    pub word_size_bits: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            l1_cache_hit_cc: 1,
            mem_fetch_cc: 100,
            bus_update_word_cc: 2,
            evict_dirty_cache_block_cc: 100,
            word_size_bits: 32,
        }
    }
}

impl Timing {
    /// Cycles to move one block across the bus (cache-to-cache transfer or
    /// flush), derived from word size.
    pub fn block_transfer_cc(&self, block_size_bytes: u64) -> u64 {
        let bits = block_size_bytes * 8;
        let words = bits.div_ceil(self.word_size_bits).max(1);
        self.bus_update_word_cc * words
    }
}

/// Resolved simulation configuration, validated once at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    pub protocol: Protocol,
    pub trace_base: PathBuf,
    pub cache_size_bytes: u64,
    pub associativity: u64,
    pub block_size_bytes: u64,
    pub set_count: u64,
    pub timing: Timing,
}

pub const DEFAULT_CACHE_SIZE_BYTES: u64 = 4096;
pub const DEFAULT_ASSOCIATIVITY: u64 = 2;
pub const DEFAULT_BLOCK_SIZE_BYTES: u64 = 32;

impl Config {
    /// Validate and resolve a configuration. Performs every check from the
    /// configuration-error policy: power-of-two block size, integral and
    /// power-of-two set count, a known (and implemented) protocol, and the
    /// presence of all four per-core trace files.
    pub fn new(
        protocol: Protocol,
        trace_base: impl Into<PathBuf>,
        cache_size_bytes: u64,
        associativity: u64,
        block_size_bytes: u64,
    ) -> Result<Self> {
        let trace_base = trace_base.into();
        let cfg = Self::geometry_only(protocol, trace_base.clone(), cache_size_bytes, associativity, block_size_bytes)?;
        for core_id in 0..NUM_CORES {
            let path = trace_path(&trace_base, core_id);
            if !path.exists() {
                return Err(SimError::TraceFileMissing(path));
            }
        }
        Ok(cfg)
    }

    /// Resolve a configuration without requiring trace files to exist on
    /// disk. Used by scenario tests that drive the driver with in-memory
    /// instruction vectors instead of real trace files.
    pub fn new_without_trace_files(
        protocol: Protocol,
        cache_size_bytes: u64,
        associativity: u64,
        block_size_bytes: u64,
    ) -> Result<Self> {
        Self::geometry_only(protocol, PathBuf::new(), cache_size_bytes, associativity, block_size_bytes)
    }

    fn geometry_only(
        protocol: Protocol,
        trace_base: PathBuf,
        cache_size_bytes: u64,
        associativity: u64,
        block_size_bytes: u64,
    ) -> Result<Self> {
        if protocol == Protocol::Dragon {
            return Err(SimError::UnimplementedProtocol("Dragon".to_string()));
        }
        if associativity == 0 {
            return Err(SimError::ZeroAssociativity);
        }
        if !block_size_bytes.is_power_of_two() {
            return Err(SimError::BlockSizeNotPowerOfTwo { block_size_bytes });
        }
        let denom = block_size_bytes * associativity;
        if denom == 0 || cache_size_bytes % denom != 0 {
            return Err(SimError::NonIntegralSetCount {
                cache_size_bytes,
                block_size_bytes,
                associativity,
            });
        }
        let set_count = cache_size_bytes / denom;
        if !set_count.is_power_of_two() {
            return Err(SimError::SetCountNotPowerOfTwo { set_count });
        }

        Ok(Config {
            protocol,
            trace_base,
            cache_size_bytes,
            associativity,
            block_size_bytes,
            set_count,
            timing: Timing::default(),
        })
    }

    pub fn offset_bits(&self) -> u32 {
        self.block_size_bytes.trailing_zeros()
    }

    pub fn index_bits(&self) -> u32 {
        self.set_count.trailing_zeros()
    }
}

/// Per-core trace file path: `<base>_<core_id>.data`.
pub fn trace_path(base: &Path, core_id: usize) -> PathBuf {
    let mut name = base
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!("_{core_id}.data"));
    base.with_file_name(name)
}
