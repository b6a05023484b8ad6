//! Read-only renderers over the published engine state: heap map, ASCII
//! memory chart, statistics summary and leak report. The formats are for
//! humans; nothing parses them.

use crate::block::{block_span, FOOTER_SIZE, HEADER_SIZE};
use crate::heap::Heap;
use crate::size_class::NUM_SIZE_CLASSES;
use std::fmt::Write;

const CHART_WIDTH: usize = 60;
const USED_CHAR: char = '#';
const FREE_CHAR: char = '.';
const OVERHEAD_CHAR: char = 'o';

impl Heap {
    /// One line per physical block, low to high address.
    pub fn heap_map(&self) -> String {
        let mut out = String::from("===== HEAP MAP =====\n");
        if !self.is_initialized() {
            out.push_str("Heap not initialized\n");
            return out;
        }
        let blocks = self.blocks();
        let mut walked = 0usize;
        for (index, info) in blocks.iter().enumerate() {
            let _ = writeln!(
                out,
                "Block {} [+0x{:x}]: {} bytes, {}, ID {}",
                index + 1,
                info.offset,
                info.payload_size,
                if info.free { "FREE" } else { "USED" },
                info.alloc_id
            );
            walked = info.offset + block_span(info.payload_size);
        }
        if walked != self.arena_size() {
            let _ = writeln!(out, "[CORRUPTED at +0x{:x}]", walked);
        }
        out.push_str("====================\n");
        out
    }

    /// Fixed-width bar of the arena: `#` used, `.` free, `o` metadata.
    pub fn memory_chart(&self) -> String {
        let mut out = String::from("===== MEMORY VISUALIZATION =====\n");
        if !self.is_initialized() {
            out.push_str("Heap not initialized\n");
            return out;
        }
        let bytes_per_char = self.arena_size() as f64 / CHART_WIDTH as f64;
        let mut chart = [FREE_CHAR; CHART_WIDTH];

        for info in self.blocks() {
            let start = (info.offset as f64 / bytes_per_char) as usize;
            let header_end = start + (HEADER_SIZE as f64 / bytes_per_char) as usize;
            let data_end = header_end + (info.payload_size as f64 / bytes_per_char) as usize;
            let footer_end = data_end + (FOOTER_SIZE as f64 / bytes_per_char) as usize;

            let clamp = |pos: usize| pos.min(CHART_WIDTH);
            for slot in chart.iter_mut().take(clamp(header_end)).skip(clamp(start)) {
                *slot = OVERHEAD_CHAR;
            }
            let data_char = if info.free { FREE_CHAR } else { USED_CHAR };
            for slot in chart
                .iter_mut()
                .take(clamp(data_end))
                .skip(clamp(header_end))
            {
                *slot = data_char;
            }
            for slot in chart
                .iter_mut()
                .take(clamp(footer_end))
                .skip(clamp(data_end))
            {
                *slot = OVERHEAD_CHAR;
            }
        }

        let bar: String = chart.iter().collect();
        let _ = writeln!(out, "{}", bar);
        let _ = writeln!(
            out,
            "Legend: {}=Used, {}=Free, {}=Overhead",
            USED_CHAR, FREE_CHAR, OVERHEAD_CHAR
        );
        out
    }

    /// Human-readable rendering of the statistics snapshot.
    pub fn stats_summary(&self) -> String {
        let stats = self.stats();
        let mut out = String::from("=== Memory Allocator Statistics ===\n");
        let avg = |bytes: usize, blocks: usize| {
            if blocks > 0 {
                bytes as f64 / blocks as f64
            } else {
                0.0
            }
        };
        let _ = writeln!(
            out,
            "Allocated: {} bytes in {} blocks (avg: {:.2})",
            stats.allocated_bytes,
            stats.allocated_blocks,
            avg(stats.allocated_bytes, stats.allocated_blocks)
        );
        let _ = writeln!(
            out,
            "Free: {} bytes in {} blocks (avg: {:.2})",
            stats.free_bytes,
            stats.free_blocks,
            avg(stats.free_bytes, stats.free_blocks)
        );
        let total = stats.allocated_bytes + stats.free_bytes + 1;
        let _ = writeln!(
            out,
            "Memory overhead: {} bytes ({:.2}%)",
            stats.overhead_bytes,
            stats.overhead_bytes as f64 / total as f64 * 100.0
        );
        let _ = writeln!(
            out,
            "Total allocations: {} (failed: {})",
            stats.total_allocations, stats.failed_allocations
        );
        let _ = writeln!(out, "Total frees: {}", stats.total_frees);
        let _ = writeln!(out, "Fragmentation index: {:.4}", stats.fragmentation_index());
        out.push_str("\nSize class distribution:\n");
        for class in 0..NUM_SIZE_CLASSES {
            let _ = writeln!(out, "Class {}: {} bytes", class, stats.class_usage[class]);
        }
        out.push_str("================================\n");
        out
    }

    /// Every live tracking record with its allocation site, plus totals.
    pub fn leak_report(&self) -> String {
        let mut out = String::from("=== Memory Leak Check ===\n");
        let records = self.live_allocations();
        let mut leak_bytes = 0usize;
        for record in &records {
            let _ = writeln!(
                out,
                "Potential leak: 0x{:x}, {} bytes, ID {}, allocated at {}:{}",
                record.ptr, record.size, record.alloc_id, record.file, record.line
            );
            leak_bytes += record.size;
        }
        if records.is_empty() {
            out.push_str("No memory leaks detected.\n");
        } else {
            let _ = writeln!(out, "Total: {} leaks, {} bytes", records.len(), leak_bytes);
        }
        out.push_str("========================\n");
        out
    }
}
