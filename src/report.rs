//! Final textual report rendering.

use std::fmt;

use crate::core::CoreStats;
use crate::protocol::AccessLocality;

pub struct Report {
    pub overall_cycles: u64,
    pub per_core: Vec<CoreStats>,
    pub traffic_bytes: u64,
    pub invalidations_or_updates: u64,
    pub locality: AccessLocality,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "overall_execution_cycles: {}", self.overall_cycles)?;
        for (id, stats) in self.per_core.iter().enumerate() {
            writeln!(
                f,
                "core {id}: execution={} compute={} idle={} loads={} stores={} hits={} misses={}",
                stats.execution_cycles(),
                stats.compute_cycles,
                stats.idle_cycles,
                stats.load_instrs,
                stats.store_instrs,
                stats.cache_hits,
                stats.cache_misses,
            )?;
        }
        writeln!(
            f,
            "bus: invalidations_or_updates={} traffic_bytes={}",
            self.invalidations_or_updates, self.traffic_bytes
        )?;
        write!(
            f,
            "protocol: private_accesses={} shared_accesses={}",
            self.locality.private_accesses, self.locality.shared_accesses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_every_field_name() {
        let report = Report {
            overall_cycles: 42,
            per_core: vec![CoreStats::default()],
            traffic_bytes: 64,
            invalidations_or_updates: 3,
            locality: AccessLocality { private_accesses: 2, shared_accesses: 1 },
        };
        let rendered = report.to_string();
        assert!(rendered.contains("overall_execution_cycles: 42"));
        assert!(rendered.contains("core 0:"));
        assert!(rendered.contains("traffic_bytes=64"));
        assert!(rendered.contains("private_accesses=2"));
    }
}
