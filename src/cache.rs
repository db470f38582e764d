//! Private per-core L1 cache: sets of blocks with MESI coherence state.

use std::collections::HashMap;

use crate::addr::Addr;
use crate::config::Config;
use crate::eviction::LruEvictionHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Modified,
    Exclusive,
    Shared,
    Invalid,
}

impl BlockState {
    pub fn is_valid(self) -> bool {
        self != BlockState::Invalid
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheBlock {
    pub tag: u64,
    pub state: BlockState,
}

/// One set of `associativity` blocks, keyed by tag, with its own LRU order.
struct CacheSet {
    blocks: HashMap<u64, CacheBlock>,
    lru: LruEvictionHandler,
    associativity: usize,
}

impl CacheSet {
    fn new(associativity: usize) -> Self {
        CacheSet {
            blocks: HashMap::with_capacity(associativity),
            lru: LruEvictionHandler::new(associativity),
            associativity,
        }
    }

    fn is_full(&self) -> bool {
        self.blocks.len() >= self.associativity
    }
}

/// A private L1 cache: `set_count` sets, each holding `associativity` blocks.
pub struct Cache {
    sets: Vec<CacheSet>,
    offset_bits: u32,
    index_bits: u32,
}

impl Cache {
    pub fn new(cfg: &Config) -> Self {
        let set_count = cfg.set_count as usize;
        let associativity = cfg.associativity as usize;
        Cache {
            sets: (0..set_count).map(|_| CacheSet::new(associativity)).collect(),
            offset_bits: cfg.offset_bits(),
            index_bits: cfg.index_bits(),
        }
    }

    fn set_index_tag(&self, addr: Addr) -> (usize, u64) {
        let n = self.offset_bits;
        let m = self.index_bits;
        let set_index = ((addr.0 >> n) & ((1u64 << m) - 1)) as usize;
        let tag = addr.0 >> (n + m);
        (set_index, tag)
    }

    pub fn is_present(&self, addr: Addr) -> bool {
        let (idx, tag) = self.set_index_tag(addr);
        self.sets[idx].blocks.contains_key(&tag)
    }

    pub fn is_valid(&self, addr: Addr) -> bool {
        let (idx, tag) = self.set_index_tag(addr);
        self.sets[idx]
            .blocks
            .get(&tag)
            .is_some_and(|b| b.state.is_valid())
    }

    pub fn state_of(&self, addr: Addr) -> BlockState {
        let (idx, tag) = self.set_index_tag(addr);
        self.sets[idx]
            .blocks
            .get(&tag)
            .map(|b| b.state)
            .unwrap_or(BlockState::Invalid)
    }

    /// Requires the block to be present; an absent block here is a
    /// programming error, never a well-formed runtime condition.
    pub fn set_state(&mut self, addr: Addr, state: BlockState) {
        let (idx, tag) = self.set_index_tag(addr);
        let block = self.sets[idx]
            .blocks
            .get_mut(&tag)
            .expect("set_state called on a block that is not present");
        block.state = state;
    }

    pub fn is_set_full(&self, addr: Addr) -> bool {
        let (idx, _) = self.set_index_tag(addr);
        self.sets[idx].is_full()
    }

    /// Choose a victim via LRU, remove it, and return it. The set must be
    /// full (checked by the caller via [`Cache::is_set_full`]).
    pub fn evict_target(&mut self, addr: Addr) -> CacheBlock {
        let (idx, _) = self.set_index_tag(addr);
        let set = &mut self.sets[idx];
        let victim_tag = set.lru.evict();
        set.blocks
            .remove(&victim_tag)
            .expect("lru-tracked tag must be present in the set")
    }

    /// Insert a new block in INVALID state; the caller (protocol) sets the
    /// real state afterward via [`Cache::set_state`].
    pub fn install(&mut self, addr: Addr) {
        let (idx, tag) = self.set_index_tag(addr);
        let set = &mut self.sets[idx];
        set.blocks.insert(
            tag,
            CacheBlock {
                tag,
                state: BlockState::Invalid,
            },
        );
        set.lru.touch(tag);
    }

    pub fn invalidate(&mut self, addr: Addr) {
        let (idx, tag) = self.set_index_tag(addr);
        if let Some(block) = self.sets[idx].blocks.get_mut(&tag) {
            block.state = BlockState::Invalid;
        }
    }

    pub fn touch(&mut self, addr: Addr) {
        let (idx, tag) = self.set_index_tag(addr);
        self.sets[idx].lru.touch(tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;
    use std::fs;

    fn cfg(cache_size: u64, assoc: u64, block_size: u64) -> Config {
        let dir = std::env::temp_dir().join(format!(
            "cachesim_cache_test_{cache_size}_{assoc}_{block_size}_{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        let base = dir.join("trace");
        for i in 0..4 {
            fs::write(format!("{}_{}.data", base.display(), i), "").unwrap();
        }
        Config::new(Protocol::Mesi, base, cache_size, assoc, block_size).unwrap()
    }

    fn tag_of(addr: Addr, cfg: &Config) -> u64 {
        addr.0 >> (cfg.offset_bits() + cfg.index_bits())
    }

    #[test]
    fn install_then_valid_after_set_state() {
        let cfg = cfg(64, 2, 16);
        let mut cache = Cache::new(&cfg);
        let a = Addr(0x00);
        assert!(!cache.is_present(a));
        cache.install(a);
        assert!(cache.is_present(a));
        assert!(!cache.is_valid(a)); // still INVALID until set_state
        cache.set_state(a, BlockState::Exclusive);
        assert!(cache.is_valid(a));
        assert_eq!(cache.state_of(a), BlockState::Exclusive);
    }

    #[test]
    fn lru_eviction_picks_least_recently_used_in_set() {
        // block_size=16 gives a 1-bit set index, so only every other block
        // index lands back in set 0; 0x00/0x20/0x40 are the distinct-tag
        // addresses that actually collide there (assoc=2).
        let cfg = cfg(64, 2, 16);
        let mut cache = Cache::new(&cfg);
        let a0 = Addr(0x00);
        let a1 = Addr(0x20);
        let a2 = Addr(0x40);

        cache.install(a0);
        cache.set_state(a0, BlockState::Shared);
        cache.install(a1);
        cache.set_state(a1, BlockState::Shared);
        assert!(cache.is_set_full(a2));

        let victim = cache.evict_target(a2);
        assert_eq!(victim.tag, tag_of(a0, &cfg));
        assert!(!cache.is_present(a0));
        assert!(cache.is_present(a1));
    }

    #[test]
    fn invalidate_is_noop_on_absent_block() {
        let cfg = cfg(64, 2, 16);
        let mut cache = Cache::new(&cfg);
        cache.invalidate(Addr(0x00)); // must not panic
        assert!(!cache.is_present(Addr(0x00)));
    }
}
