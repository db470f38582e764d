//! Snooping bus: FIFO request arbitration, peer snooping, and cycle costing.

use std::collections::VecDeque;

use log::debug;

use crate::addr::Addr;
use crate::cache::{BlockState, Cache};
use crate::config::{Timing, NUM_CORES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusRequestKind {
    BusRd,
    BusRdX,
    Flush,
}

#[derive(Debug, Clone, Copy)]
pub struct BusRequest {
    pub kind: BusRequestKind,
    pub origin_core_id: usize,
    pub address: Addr,
    pub origin_state_when_issued: BlockState,
}

#[derive(Debug, Clone, Copy)]
pub struct BusResponse {
    pub request: BusRequest,
    pub sharers_existed: bool,
}

enum BusState {
    Ready,
    Busy {
        request: BusRequest,
        cycles_remaining: u64,
    },
}

pub struct Bus {
    queue: VecDeque<BusRequest>,
    state: BusState,
    responses: [Option<BusResponse>; NUM_CORES],
    /// `sharers_existed` computed at snoop time, carried until the response
    /// is posted when `cycles_remaining` reaches zero.
    pending_sharers_existed: Option<bool>,
    pub traffic_bytes: u64,
    pub invalidations_or_updates: u64,
}

impl Default for Bus {
    fn default() -> Self {
        Bus {
            queue: VecDeque::new(),
            state: BusState::Ready,
            responses: Default::default(),
            pending_sharers_existed: None,
            traffic_bytes: 0,
            invalidations_or_updates: 0,
        }
    }
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a coherence request. The core state machine is responsible
    /// for never issuing more than one outstanding request per core.
    pub fn enqueue(&mut self, request: BusRequest) {
        self.queue.push_back(request);
    }

    /// Take the posted response for `core_id`, clearing the slot.
    pub fn take_response(&mut self, core_id: usize) -> Option<BusResponse> {
        self.responses[core_id].take()
    }

    /// Advance the bus by one cycle. `caches` is indexed by core id and
    /// must contain every core's cache so peers can be snooped by index.
    pub fn tick(&mut self, caches: &mut [Cache], timing: &Timing, block_size_bytes: u64) {
        match &mut self.state {
            BusState::Ready => {
                if let Some(request) = self.queue.pop_front() {
                    debug!("bus: dequeued {:?} from core {}", request.kind, request.origin_core_id);
                    let (cycles, _) =
                        self.snoop_and_schedule(&request, caches, timing, block_size_bytes);
                    self.state = BusState::Busy {
                        request,
                        cycles_remaining: cycles,
                    };
                }
            }
            BusState::Busy {
                request,
                cycles_remaining,
            } => {
                *cycles_remaining = cycles_remaining.saturating_sub(1);
                if *cycles_remaining == 0 {
                    let request = *request;
                    let sharers_existed = self.pending_sharers_existed.take().unwrap_or(false);
                    self.responses[request.origin_core_id] = Some(BusResponse {
                        request,
                        sharers_existed,
                    });
                    self.state = BusState::Ready;
                }
            }
        }
    }

    /// Compute the cycle cost of servicing `request`, mutating peer caches
    /// and bus counters immediately (snoop happens at dequeue time, not at
    /// response delivery). Stashes `sharers_existed` for delivery alongside
    /// the response once `cycles_remaining` reaches zero.
    fn snoop_and_schedule(
        &mut self,
        request: &BusRequest,
        caches: &mut [Cache],
        timing: &Timing,
        block_size_bytes: u64,
    ) -> (u64, bool) {
        let (cycles, sharers_existed) = match request.kind {
            BusRequestKind::BusRd => self.snoop_busrd(request, caches, timing, block_size_bytes),
            BusRequestKind::BusRdX => {
                (self.snoop_busrdx(request, caches, timing, block_size_bytes), false)
            }
            BusRequestKind::Flush => (0, false),
        };
        self.pending_sharers_existed = Some(sharers_existed);
        (cycles, sharers_existed)
    }

    fn snoop_busrd(
        &mut self,
        request: &BusRequest,
        caches: &mut [Cache],
        timing: &Timing,
        block_size_bytes: u64,
    ) -> (u64, bool) {
        let addr = request.address;
        let mut transferred = false;
        let mut sharers_existed = false;
        let mut cycles = 0u64;

        for peer_id in 0..caches.len() {
            if peer_id == request.origin_core_id {
                continue;
            }
            let peer_state = caches[peer_id].state_of(addr);
            match peer_state {
                BlockState::Modified | BlockState::Exclusive => {
                    sharers_existed = true;
                    if !transferred {
                        let t = timing.block_transfer_cc(block_size_bytes);
                        cycles += t + t; // transfer + flush
                        self.traffic_bytes += block_size_bytes * 2;
                        transferred = true;
                    }
                    caches[peer_id].set_state(addr, BlockState::Shared);
                }
                BlockState::Shared => {
                    sharers_existed = true;
                    if !transferred {
                        cycles += timing.block_transfer_cc(block_size_bytes);
                        self.traffic_bytes += block_size_bytes;
                        transferred = true;
                    }
                }
                BlockState::Invalid => {}
            }
        }

        if !transferred {
            cycles += timing.mem_fetch_cc;
        }
        (cycles, sharers_existed)
    }

    fn snoop_busrdx(
        &mut self,
        request: &BusRequest,
        caches: &mut [Cache],
        timing: &Timing,
        block_size_bytes: u64,
    ) -> u64 {
        let addr = request.address;
        let mut transferred = false;
        let mut cycles = 0u64;

        for peer_id in 0..caches.len() {
            if peer_id == request.origin_core_id {
                continue;
            }
            let peer_state = caches[peer_id].state_of(addr);
            if matches!(peer_state, BlockState::Modified | BlockState::Exclusive) && !transferred
            {
                let t = timing.block_transfer_cc(block_size_bytes);
                cycles += t + t;
                self.traffic_bytes += block_size_bytes * 2;
                transferred = true;
            }
        }

        for peer_id in 0..caches.len() {
            if peer_id == request.origin_core_id {
                continue;
            }
            if caches[peer_id].is_valid(addr) {
                caches[peer_id].invalidate(addr);
                self.invalidations_or_updates += 1;
            }
        }

        if !transferred && request.origin_state_when_issued == BlockState::Invalid {
            cycles += timing.mem_fetch_cc;
        }
        cycles
    }
}
