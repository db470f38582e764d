//! Lock-step cycle driver: advances every core then the bus, once per tick.

use log::info;

use crate::bus::Bus;
use crate::cache::Cache;
use crate::config::{Config, Timing, NUM_CORES};
use crate::core::{Core, CoreStats};
use crate::instr::Instruction;
use crate::protocol::{AccessLocality, CoherenceProtocol};
use crate::report::Report;

/// Owns the flat per-core arrays the design calls for: `caches` and `cores`
/// are indexed by core id, so the bus can borrow `caches` as a whole slice
/// during its tick without any core holding a reference into it.
pub struct Simulation<P: CoherenceProtocol + Default> {
    cores: Vec<Core<P>>,
    caches: Vec<Cache>,
    bus: Bus,
    timing: Timing,
    block_size_bytes: u64,
}

impl<P: CoherenceProtocol + Default> Simulation<P> {
    pub fn new(cfg: &Config, traces: Vec<Vec<Instruction>>) -> Self {
        assert_eq!(traces.len(), NUM_CORES, "one trace per core is required");
        let caches = (0..NUM_CORES).map(|_| Cache::new(cfg)).collect();
        let cores = traces
            .into_iter()
            .enumerate()
            .map(|(id, trace)| Core::new(id, P::default(), trace))
            .collect();
        Simulation {
            cores,
            caches,
            bus: Bus::new(),
            timing: cfg.timing,
            block_size_bytes: cfg.block_size_bytes,
        }
    }

    fn all_done(&self) -> bool {
        self.cores.iter().all(Core::is_done)
    }

    /// Run to completion and return the aggregate report.
    pub fn run(self) -> Report {
        self.run_keeping_caches().0
    }

    /// Run to completion, returning both the report and the final per-core
    /// caches. Scenario tests use this to assert on block state after the
    /// run (e.g. "0x40 ends EXCLUSIVE in core0"), which the report alone
    /// does not expose.
    pub fn run_keeping_caches(mut self) -> (Report, Vec<Cache>) {
        let mut cycle = 0u64;
        info!("simulation starting across {} cores", self.cores.len());
        while !self.all_done() {
            self.tick();
            cycle += 1;
        }
        info!("simulation completed after {cycle} driver ticks");
        let caches = std::mem::take(&mut self.caches);
        (self.into_report(), caches)
    }

    fn tick(&mut self) {
        let Simulation {
            cores,
            caches,
            bus,
            timing,
            block_size_bytes,
        } = self;
        for (core, cache) in cores.iter_mut().zip(caches.iter_mut()) {
            if !core.is_done() {
                core.step(cache, bus, timing);
            }
        }
        bus.tick(caches.as_mut_slice(), timing, *block_size_bytes);
    }

    fn into_report(self) -> Report {
        let per_core: Vec<CoreStats> = self.cores.iter().map(|c| c.stats).collect();
        let overall_cycles = per_core
            .iter()
            .map(CoreStats::execution_cycles)
            .max()
            .unwrap_or(0);
        let locality = self.cores.iter().fold(AccessLocality::default(), |mut acc, c| {
            let l = c.protocol.locality();
            acc.private_accesses += l.private_accesses;
            acc.shared_accesses += l.shared_accesses;
            acc
        });
        Report {
            overall_cycles,
            per_core,
            traffic_bytes: self.bus.traffic_bytes,
            invalidations_or_updates: self.bus.invalidations_or_updates,
            locality,
        }
    }
}
