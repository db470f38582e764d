//! Coherence protocol decision logic.
//!
//! A protocol is a pure decision module: it inspects the requesting core's
//! own cache and either completes the access locally or reports the
//! bus request kind the core must issue. It never mutates peer caches —
//! peer mutation happens only during the bus's own snoop.

use crate::addr::Addr;
use crate::bus::{BusRequestKind, BusResponse};
use crate::cache::{BlockState, Cache};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    Hit,
    Miss(BusRequestKind),
}

/// Access-locality tallies, incremented on every processor access based on
/// the block's state *before* the access is resolved.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessLocality {
    pub private_accesses: u64,
    pub shared_accesses: u64,
}

impl AccessLocality {
    fn record(&mut self, pre_state: BlockState) {
        match pre_state {
            BlockState::Modified | BlockState::Exclusive => self.private_accesses += 1,
            BlockState::Shared => self.shared_accesses += 1,
            BlockState::Invalid => {}
        }
    }
}

/// Three-operation interface a coherence protocol must implement. MESI is
/// the only implementor shipped; a Dragon (write-update) variant would
/// implement the same trait with its own state set and bus semantics.
pub trait CoherenceProtocol {
    fn on_read(&mut self, cache: &Cache, addr: Addr) -> AccessOutcome;
    fn on_write(&mut self, cache: &mut Cache, addr: Addr) -> AccessOutcome;
    fn on_bus_response(&mut self, cache: &mut Cache, addr: Addr, response: &BusResponse);
    /// Access-locality tallies accumulated by this protocol instance so far.
    fn locality(&self) -> AccessLocality;
}

#[derive(Debug, Default)]
pub struct Mesi {
    pub locality: AccessLocality,
}

impl CoherenceProtocol for Mesi {
    fn on_read(&mut self, cache: &Cache, addr: Addr) -> AccessOutcome {
        let pre_state = cache.state_of(addr);
        self.locality.record(pre_state);
        match pre_state {
            BlockState::Modified | BlockState::Exclusive | BlockState::Shared => {
                AccessOutcome::Hit
            }
            BlockState::Invalid => AccessOutcome::Miss(BusRequestKind::BusRd),
        }
    }

    fn on_write(&mut self, cache: &mut Cache, addr: Addr) -> AccessOutcome {
        let pre_state = cache.state_of(addr);
        self.locality.record(pre_state);
        match pre_state {
            BlockState::Modified => AccessOutcome::Hit,
            BlockState::Exclusive => {
                cache.set_state(addr, BlockState::Modified);
                AccessOutcome::Hit
            }
            BlockState::Shared | BlockState::Invalid => {
                AccessOutcome::Miss(BusRequestKind::BusRdX)
            }
        }
    }

    fn on_bus_response(&mut self, cache: &mut Cache, addr: Addr, response: &BusResponse) {
        let new_state = match response.request.kind {
            BusRequestKind::BusRd => {
                if response.sharers_existed {
                    BlockState::Shared
                } else {
                    BlockState::Exclusive
                }
            }
            BusRequestKind::BusRdX => BlockState::Modified,
            BusRequestKind::Flush => {
                unreachable!("a core never awaits a response to its own Flush")
            }
        };
        cache.set_state(addr, new_state);
    }

    fn locality(&self) -> AccessLocality {
        self.locality
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusRequest;
    use crate::config::{Config, Protocol as ProtoSel};
    use std::fs;

    fn cfg() -> Config {
        let dir = std::env::temp_dir().join(format!("cachesim_protocol_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let base = dir.join("trace");
        for i in 0..4 {
            fs::write(format!("{}_{}.data", base.display(), i), "").unwrap();
        }
        Config::new(ProtoSel::Mesi, base, 64, 2, 16).unwrap()
    }

    #[test]
    fn read_on_invalid_misses_with_busrd() {
        let cfg = cfg();
        let cache = Cache::new(&cfg);
        let mut mesi = Mesi::default();
        let outcome = mesi.on_read(&cache, Addr(0x00));
        assert_eq!(outcome, AccessOutcome::Miss(BusRequestKind::BusRd));
        assert_eq!(mesi.locality.private_accesses, 0);
        assert_eq!(mesi.locality.shared_accesses, 0);
    }

    #[test]
    fn load_on_exclusive_is_hit_with_no_mutation() {
        let cfg = cfg();
        let mut cache = Cache::new(&cfg);
        let addr = Addr(0x00);
        cache.install(addr);
        cache.set_state(addr, BlockState::Exclusive);
        let mut mesi = Mesi::default();
        let outcome = mesi.on_read(&cache, addr);
        assert_eq!(outcome, AccessOutcome::Hit);
        assert_eq!(cache.state_of(addr), BlockState::Exclusive);
        assert_eq!(mesi.locality.private_accesses, 1);
    }

    #[test]
    fn store_on_exclusive_upgrades_silently_to_modified() {
        let cfg = cfg();
        let mut cache = Cache::new(&cfg);
        let addr = Addr(0x00);
        cache.install(addr);
        cache.set_state(addr, BlockState::Exclusive);
        let mut mesi = Mesi::default();
        let outcome = mesi.on_write(&mut cache, addr);
        assert_eq!(outcome, AccessOutcome::Hit);
        assert_eq!(cache.state_of(addr), BlockState::Modified);
        assert_eq!(mesi.locality.private_accesses, 1);
    }

    #[test]
    fn store_on_shared_misses_with_busrdx() {
        let cfg = cfg();
        let mut cache = Cache::new(&cfg);
        let addr = Addr(0x00);
        cache.install(addr);
        cache.set_state(addr, BlockState::Shared);
        let mut mesi = Mesi::default();
        let outcome = mesi.on_write(&mut cache, addr);
        assert_eq!(outcome, AccessOutcome::Miss(BusRequestKind::BusRdX));
        assert_eq!(mesi.locality.shared_accesses, 1);
    }

    #[test]
    fn bus_response_sets_shared_or_exclusive_for_busrd() {
        let cfg = cfg();
        let mut cache = Cache::new(&cfg);
        let addr = Addr(0x00);
        cache.install(addr);
        let mut mesi = Mesi::default();

        let req = BusRequest {
            kind: BusRequestKind::BusRd,
            origin_core_id: 0,
            address: addr,
            origin_state_when_issued: BlockState::Invalid,
        };
        mesi.on_bus_response(
            &mut cache,
            addr,
            &BusResponse { request: req, sharers_existed: true },
        );
        assert_eq!(cache.state_of(addr), BlockState::Shared);

        let req2 = BusRequest {
            kind: BusRequestKind::BusRd,
            origin_core_id: 0,
            address: addr,
            origin_state_when_issued: BlockState::Invalid,
        };
        mesi.on_bus_response(
            &mut cache,
            addr,
            &BusResponse { request: req2, sharers_existed: false },
        );
        assert_eq!(cache.state_of(addr), BlockState::Exclusive);
    }
}
