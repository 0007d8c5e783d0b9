//! Running counters for a context table, mirroring the reference
//! workbench's `SchcCompressorStats`/`SchcStats` (atomics so the table
//! can be shared across threads partitioned by disjoint CID sets, spec
//! §5).

use std::sync::atomic::{AtomicU64, Ordering};

/// Compression-side counters: how many frames were compressed, how many
/// bits their headers took before and after, and how many were rejected.
#[derive(Debug, Default)]
pub struct CompressorStats {
    pub frames_compressed: AtomicU64,
    pub frames_rejected: AtomicU64,
    pub contexts_created: AtomicU64,
    pub contexts_evicted: AtomicU64,
    pub original_header_bits: AtomicU64,
    pub compressed_header_bits: AtomicU64,
}

impl CompressorStats {
    pub fn record_compressed(&self, original_bits: u64, compressed_bits: u64) {
        self.frames_compressed.fetch_add(1, Ordering::Relaxed);
        self.original_header_bits.fetch_add(original_bits, Ordering::Relaxed);
        self.compressed_header_bits.fetch_add(compressed_bits, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_context_created(&self) {
        self.contexts_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_context_evicted(&self) {
        self.contexts_evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// A snapshot summary, logged at `info` level rather than printed —
    /// the workbench is a library, its binary consumer (`rohc-cli`)
    /// decides how to surface it to a human.
    pub fn report(&self) -> StatsSnapshot {
        let original = self.original_header_bits.load(Ordering::Relaxed);
        let compressed = self.compressed_header_bits.load(Ordering::Relaxed);
        StatsSnapshot {
            frames: self.frames_compressed.load(Ordering::Relaxed),
            rejected: self.frames_rejected.load(Ordering::Relaxed),
            contexts_created: self.contexts_created.load(Ordering::Relaxed),
            contexts_evicted: self.contexts_evicted.load(Ordering::Relaxed),
            original_header_bits: original,
            compressed_header_bits: compressed,
        }
    }
}

/// Decompression-side counters: successes, CRC/malformed failures and
/// feedback emitted.
#[derive(Debug, Default)]
pub struct DecompressorStats {
    pub frames_decompressed: AtomicU64,
    pub frames_failed: AtomicU64,
    pub contexts_created: AtomicU64,
    pub contexts_evicted: AtomicU64,
    pub feedback_emitted: AtomicU64,
}

impl DecompressorStats {
    pub fn record_decompressed(&self) {
        self.frames_decompressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.frames_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_context_created(&self) {
        self.contexts_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_context_evicted(&self) {
        self.contexts_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_feedback(&self) {
        self.feedback_emitted.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames: u64,
    pub rejected: u64,
    pub contexts_created: u64,
    pub contexts_evicted: u64,
    pub original_header_bits: u64,
    pub compressed_header_bits: u64,
}

impl StatsSnapshot {
    pub fn saved_bits(&self) -> u64 {
        self.original_header_bits.saturating_sub(self.compressed_header_bits)
    }

    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_header_bits == 0 {
            0.0
        } else {
            self.original_header_bits as f64 / self.compressed_header_bits as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_computes_savings() {
        let stats = CompressorStats::default();
        stats.record_compressed(224, 48);
        stats.record_compressed(224, 8);
        let snap = stats.report();
        assert_eq!(snap.frames, 2);
        assert_eq!(snap.saved_bits(), 392);
        assert!(snap.compression_ratio() > 1.0);
    }
}
