//! Cycle-accurate simulator of a private-L1 MESI coherence subsystem over a
//! shared snooping bus.
//!
//! The hard core — address decoding, LRU eviction, the per-core cache,
//! the MESI protocol, the snooping bus, the core state machine, and the
//! lock-step driver — lives in this library and has no file-system or CLI
//! dependency. [`main`](../src/main.rs) is a thin binary wrapper that
//! parses argv, reads trace files, builds a [`driver::Simulation`], and
//! prints its [`report::Report`].

pub mod addr;
pub mod bus;
pub mod cache;
pub mod config;
pub mod core;
pub mod driver;
pub mod error;
pub mod eviction;
pub mod instr;
pub mod protocol;
pub mod report;
pub mod trace;
