use crate::size_class::NUM_SIZE_CLASSES;
use std::time::Duration;

/// Aggregate counters maintained alongside every mutating operation.
/// Byte and block counts describe the current arena; allocation, free and
/// request totals are cumulative over the heap's lifetime.
#[derive(Debug, Clone, Default)]
pub struct HeapStats {
    pub allocated_bytes: usize,
    pub free_bytes: usize,
    pub allocated_blocks: usize,
    pub free_blocks: usize,
    pub total_allocations: u64,
    pub total_frees: u64,
    pub failed_allocations: u64,
    /// Number of free blocks, recomputed from the free lists.
    pub fragmentation_count: usize,
    pub largest_free_block: usize,
    pub smallest_free_block: usize,
    /// Cumulative user-requested bytes.
    pub requested_bytes: usize,
    /// Header/footer metadata plus alignment padding currently in the arena.
    pub overhead_bytes: usize,
    /// Live payload bytes per size class.
    pub class_usage: [usize; NUM_SIZE_CLASSES],
    pub total_alloc_time: Duration,
    pub total_free_time: Duration,
}

impl HeapStats {
    /// 0.0 when the free space is one block, approaching 1.0 as it shatters.
    pub fn fragmentation_index(&self) -> f64 {
        if self.free_blocks > 1 && self.free_bytes > 0 {
            1.0 - self.largest_free_block as f64 / self.free_bytes as f64
        } else {
            0.0
        }
    }
}

/// Percentage view of the arena, for dashboards and the demo dumpers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageSummary {
    pub used_percent: f64,
    pub free_percent: f64,
    pub overhead_percent: f64,
    pub fragmentation_percent: f64,
}

impl UsageSummary {
    pub fn from_stats(stats: &HeapStats) -> Self {
        let total = stats.allocated_bytes + stats.free_bytes + stats.overhead_bytes;
        if total == 0 {
            return UsageSummary::default();
        }
        UsageSummary {
            used_percent: stats.allocated_bytes as f64 / total as f64 * 100.0,
            free_percent: stats.free_bytes as f64 / total as f64 * 100.0,
            overhead_percent: stats.overhead_bytes as f64 / total as f64 * 100.0,
            fragmentation_percent: stats.fragmentation_index() * 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragmentation_index_of_single_block_is_zero() {
        let stats = HeapStats {
            free_blocks: 1,
            free_bytes: 1024,
            largest_free_block: 1024,
            ..HeapStats::default()
        };
        assert_eq!(stats.fragmentation_index(), 0.0);
    }

    #[test]
    fn fragmentation_index_grows_with_shatter() {
        let stats = HeapStats {
            free_blocks: 4,
            free_bytes: 1000,
            largest_free_block: 250,
            ..HeapStats::default()
        };
        assert!((stats.fragmentation_index() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn usage_summary_percentages_sum_to_hundred() {
        let stats = HeapStats {
            allocated_bytes: 300,
            free_bytes: 500,
            overhead_bytes: 200,
            ..HeapStats::default()
        };
        let summary = UsageSummary::from_stats(&stats);
        let sum = summary.used_percent + summary.free_percent + summary.overhead_percent;
        assert!((sum - 100.0).abs() < 1e-9);
    }
}
