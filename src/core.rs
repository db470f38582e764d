//! Per-core instruction state machine.
//!
//! A `Core` does not own its cache — the `Simulation` owns a flat
//! `Vec<Cache>` indexed by core id, and hands this core `&mut Cache` for
//! the duration of each step. This is what lets the bus later borrow the
//! same `Vec<Cache>` as a whole slice during its own tick, without any
//! core holding a reference into it across cycles.

use log::trace;

use crate::addr::Addr;
use crate::bus::{Bus, BusRequest, BusRequestKind, BusResponse};
use crate::cache::{BlockState, Cache};
use crate::config::Timing;
use crate::instr::Instruction;
use crate::protocol::{AccessOutcome, CoherenceProtocol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreState {
    Ready,
    ExecuteNonMem { remaining: u64 },
    AwaitBusLoad,
    AwaitBusStore,
    ExecuteLoad { remaining: u64 },
    ExecuteStore { remaining: u64 },
    Done,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CoreStats {
    pub load_instrs: u64,
    pub store_instrs: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub compute_cycles: u64,
    pub idle_cycles: u64,
}

impl CoreStats {
    pub fn execution_cycles(&self) -> u64 {
        self.compute_cycles + self.idle_cycles
    }
}

/// A core's in-flight access, kept until the bus response resolves it.
#[derive(Debug, Clone, Copy)]
struct PendingAccess {
    addr: Addr,
    is_store: bool,
}

pub struct Core<P: CoherenceProtocol> {
    pub id: usize,
    pub protocol: P,
    pub stats: CoreStats,
    state: CoreState,
    trace: Vec<Instruction>,
    pc: usize,
    pending: Option<PendingAccess>,
}

impl<P: CoherenceProtocol> Core<P> {
    pub fn new(id: usize, protocol: P, trace: Vec<Instruction>) -> Self {
        Core {
            id,
            protocol,
            stats: CoreStats::default(),
            state: CoreState::Ready,
            trace,
            pc: 0,
            pending: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == CoreState::Done
    }

    fn next_instruction(&mut self) -> Option<Instruction> {
        let instr = self.trace.get(self.pc).copied();
        if instr.is_some() {
            self.pc += 1;
        }
        instr
    }

    /// Advance this core by one cycle: fetch if READY, act on a posted bus
    /// response if awaiting one, or burn down a compute/post-miss countdown.
    pub fn step(&mut self, cache: &mut Cache, bus: &mut Bus, timing: &Timing) {
        match self.state {
            CoreState::Ready => self.step_ready(cache, bus),
            CoreState::ExecuteNonMem { remaining } => {
                self.stats.compute_cycles += 1;
                let remaining = remaining.saturating_sub(1);
                self.state = if remaining == 0 {
                    CoreState::Ready
                } else {
                    CoreState::ExecuteNonMem { remaining }
                };
            }
            CoreState::AwaitBusLoad | CoreState::AwaitBusStore => {
                if let Some(response) = bus.take_response(self.id) {
                    self.resolve_miss(cache, response, timing);
                } else {
                    self.stats.idle_cycles += 1;
                }
            }
            CoreState::ExecuteLoad { remaining } | CoreState::ExecuteStore { remaining } => {
                self.stats.idle_cycles += 1;
                let remaining = remaining.saturating_sub(1);
                self.state = if remaining == 0 {
                    CoreState::Ready
                } else if matches!(self.state, CoreState::ExecuteLoad { .. }) {
                    CoreState::ExecuteLoad { remaining }
                } else {
                    CoreState::ExecuteStore { remaining }
                };
            }
            CoreState::Done => {}
        }
    }

    fn step_ready(&mut self, cache: &mut Cache, bus: &mut Bus) {
        let Some(instr) = self.next_instruction() else {
            self.state = CoreState::Done;
            return;
        };
        trace!("core {}: fetched {:?}", self.id, instr);
        match instr {
            Instruction::Load(addr) => {
                self.stats.load_instrs += 1;
                match self.protocol.on_read(cache, addr) {
                    AccessOutcome::Hit => {
                        cache.touch(addr);
                        self.stats.cache_hits += 1;
                        self.stats.idle_cycles += 1;
                        self.state = CoreState::Ready;
                    }
                    AccessOutcome::Miss(kind) => {
                        self.issue_miss(cache, bus, addr, kind, false);
                    }
                }
            }
            Instruction::Store(addr) => {
                self.stats.store_instrs += 1;
                match self.protocol.on_write(cache, addr) {
                    AccessOutcome::Hit => {
                        cache.touch(addr);
                        self.stats.cache_hits += 1;
                        self.stats.idle_cycles += 1;
                        self.state = CoreState::Ready;
                    }
                    AccessOutcome::Miss(kind) => {
                        self.issue_miss(cache, bus, addr, kind, true);
                    }
                }
            }
            Instruction::Other(cycles) => {
                self.stats.compute_cycles += 1;
                self.state = if cycles == 0 {
                    CoreState::Ready
                } else {
                    CoreState::ExecuteNonMem { remaining: cycles - 1 }
                };
            }
        }
    }

    fn issue_miss(
        &mut self,
        cache: &Cache,
        bus: &mut Bus,
        addr: Addr,
        kind: BusRequestKind,
        is_store: bool,
    ) {
        self.stats.cache_misses += 1;
        self.stats.idle_cycles += 1;
        let origin_state_when_issued = cache.state_of(addr);
        bus.enqueue(BusRequest {
            kind,
            origin_core_id: self.id,
            address: addr,
            origin_state_when_issued,
        });
        self.pending = Some(PendingAccess { addr, is_store });
        self.state = if is_store {
            CoreState::AwaitBusStore
        } else {
            CoreState::AwaitBusLoad
        };
    }

    fn resolve_miss(&mut self, cache: &mut Cache, response: BusResponse, timing: &Timing) {
        let pending = self
            .pending
            .take()
            .expect("a posted response implies a pending access");
        let addr = pending.addr;
        let mut extra_cycles = 0u64;

        if !cache.is_present(addr) {
            if cache.is_set_full(addr) {
                let victim = cache.evict_target(addr);
                if victim.state == BlockState::Modified {
                    extra_cycles += timing.evict_dirty_cache_block_cc;
                }
            }
            cache.install(addr);
        }
        cache.touch(addr);
        self.protocol.on_bus_response(cache, addr, &response);

        self.stats.idle_cycles += 1;
        self.state = if extra_cycles == 0 {
            CoreState::Ready
        } else if pending.is_store {
            CoreState::ExecuteStore { remaining: extra_cycles - 1 }
        } else {
            CoreState::ExecuteLoad { remaining: extra_cycles - 1 }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Protocol as ProtoSel};
    use crate::protocol::Mesi;
    use std::fs;

    fn cfg() -> Config {
        let dir = std::env::temp_dir().join(format!("cachesim_core_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let base = dir.join("trace");
        for i in 0..4 {
            fs::write(format!("{}_{}.data", base.display(), i), "").unwrap();
        }
        Config::new(ProtoSel::Mesi, base, 64, 2, 16).unwrap()
    }

    fn make_core(id: usize, trace: Vec<Instruction>) -> Core<Mesi> {
        Core::new(id, Mesi::default(), trace)
    }

    #[test]
    fn other_instruction_consumes_k_cycles_of_compute() {
        let cfg = cfg();
        let mut cache = Cache::new(&cfg);
        let mut bus = Bus::new();
        let mut core = make_core(0, vec![Instruction::Other(3)]);
        core.step(&mut cache, &mut bus, &cfg.timing); // ExecuteNonMem{remaining:2}
        assert_eq!(core.stats.compute_cycles, 1);
        core.step(&mut cache, &mut bus, &cfg.timing); // remaining 2->1
        assert_eq!(core.stats.compute_cycles, 2);
        core.step(&mut cache, &mut bus, &cfg.timing); // remaining 1->0 -> Ready
        assert_eq!(core.stats.compute_cycles, 3);
        assert_eq!(core.state, CoreState::Ready);
    }

    #[test]
    fn load_on_invalid_block_issues_busrd_and_awaits() {
        let cfg = cfg();
        let mut cache = Cache::new(&cfg);
        let addr = Addr(0x00);
        let mut bus = Bus::new();
        let mut core = make_core(0, vec![Instruction::Load(addr)]);

        core.step(&mut cache, &mut bus, &cfg.timing);
        assert_eq!(core.state, CoreState::AwaitBusLoad);
        assert_eq!(core.stats.cache_misses, 1);
        assert_eq!(core.stats.load_instrs, 1);

        // idles while no response has been posted yet
        core.step(&mut cache, &mut bus, &cfg.timing);
        assert_eq!(core.state, CoreState::AwaitBusLoad);
        assert_eq!(core.stats.idle_cycles, 2);
    }

    #[test]
    fn store_on_shared_block_issues_busrdx() {
        let cfg = cfg();
        let mut cache = Cache::new(&cfg);
        let addr = Addr(0x00);
        cache.install(addr);
        cache.set_state(addr, BlockState::Shared);
        let mut bus = Bus::new();
        let mut core = make_core(0, vec![Instruction::Store(addr)]);

        core.step(&mut cache, &mut bus, &cfg.timing);
        assert_eq!(core.state, CoreState::AwaitBusStore);
        assert_eq!(core.stats.cache_misses, 1);
    }

    #[test]
    fn exhausted_trace_reaches_done() {
        let cfg = cfg();
        let mut cache = Cache::new(&cfg);
        let mut bus = Bus::new();
        let mut core = make_core(0, vec![]);
        core.step(&mut cache, &mut bus, &cfg.timing);
        assert!(core.is_done());
    }
}
