//! Compresses a stream of captured frames across many flows, routing
//! each to its own ROHC context. This is the compressor-side
//! counterpart of the reference workbench's `SchcCompressor`: same
//! shape (stats, per-flow state, a single `compress` entry point), but
//! driving [`rohc::Compressor`] instead of SCHC rule matching.

use tracing::{debug, warn};

use rohc::{CidMode, Compressor, Mode, ProfileId, RohcConfig};

use crate::context_table::CompressorTable;
use crate::error::WorkbenchError;
use crate::frame::parse_frame;
use crate::stats::{CompressorStats, StatsSnapshot};

/// IPv4 (no options) + UDP header size, the "original" side of the
/// compression-ratio stats this workbench tracks.
const UNCOMPRESSED_HEADER_BITS: u64 = (20 + 8) * 8;

pub struct WorkbenchCompressor {
    table: CompressorTable,
    stats: CompressorStats,
    cfg: RohcConfig,
    mode: Mode,
    cid_mode: CidMode,
}

impl WorkbenchCompressor {
    pub fn new(capacity: usize, cid_mode: CidMode, mode: Mode, cfg: RohcConfig) -> Self {
        let max_cid = match cid_mode {
            CidMode::Small => rohc::types::MAX_SMALL_CID,
            CidMode::Large => rohc::types::MAX_LARGE_CID,
        };
        Self {
            table: CompressorTable::new(capacity, max_cid),
            stats: CompressorStats::default(),
            cfg,
            mode,
            cid_mode,
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.report()
    }

    /// Compresses one captured Ethernet frame, creating a context for
    /// its flow on first sight. Returns the ROHC packet followed by the
    /// untouched application payload, ready to hand to a peer
    /// [`crate::decompressor::WorkbenchDecompressor`].
    pub fn compress_frame(&mut self, frame: &[u8], now: u64) -> Result<Vec<u8>, WorkbenchError> {
        let parsed = match parse_frame(frame) {
            Ok(p) => p,
            Err(e) => {
                self.stats.record_rejected();
                return Err(e.into());
            }
        };

        let rohc_bytes = if let Some(cid) = self.table.cid_for_flow(&parsed.flow_key) {
            let ctx = self.table.contexts.get_mut(cid).ok_or(WorkbenchError::NoContext(cid))?;
            match ctx.compress(&parsed.chain, now) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.stats.record_rejected();
                    return Err(e.into());
                }
            }
        } else {
            let cid = self.table.contexts.next_free_cid().unwrap_or(0);
            let mut ctx = Compressor::new(
                cid,
                ProfileId::Udp,
                self.mode,
                self.cid_mode,
                &parsed.chain,
                self.cfg,
                now,
            )?;
            let bytes = ctx.compress(&parsed.chain, now)?;
            debug!(cid, flow = ?parsed.flow_key, "new compression context");
            self.stats.record_context_created();
            if let Some(evicted) = self.table.insert(parsed.flow_key, ctx) {
                warn!(evicted, "context table full, evicted least-recently-used flow");
                self.stats.record_context_evicted();
            }
            bytes
        };

        self.stats.record_compressed(UNCOMPRESSED_HEADER_BITS, rohc_bytes.len() as u64 * 8);

        let mut out = rohc_bytes;
        out.extend_from_slice(&parsed.payload);
        Ok(out)
    }

    /// Applies feedback received from the peer decompressor to the
    /// context it names (spec §4.4/§4.9). `feedback` is the unwrapped
    /// FEEDBACK-2 body (see [`rohc::feedback::decode_feedback2`]); the
    /// caller is expected to route it to the right CID out of band,
    /// since ROHC feedback itself carries no CID when small-CID framing
    /// implies a single context per channel.
    pub fn handle_feedback(&mut self, cid: rohc::Cid, fb: &rohc::feedback::Feedback2) -> Result<(), WorkbenchError> {
        let ctx = self.table.contexts.get_mut(cid).ok_or(WorkbenchError::NoContext(cid))?;
        ctx.handle_feedback(fb);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::build_frame;
    use rohc::{HeaderChain, Ipv4Header, UdpHeader};

    fn frame(id: u16) -> Vec<u8> {
        let chain = HeaderChain {
            outer_ip: Ipv4Header {
                tos: 0,
                identification: id,
                df: true,
                mf: false,
                fragment_offset: 0,
                ttl: 64,
                protocol: 17,
                src: [10, 0, 0, 1],
                dst: [10, 0, 0, 2],
            },
            inner_ip: None,
            udp: Some(UdpHeader { src_port: 4000, dst_port: 5000, checksum: 0 }),
        };
        build_frame(&chain, b"payload")
    }

    #[test]
    fn first_frame_creates_a_context() {
        let mut comp = WorkbenchCompressor::new(16, CidMode::Small, Mode::Unidirectional, RohcConfig::default());
        let out = comp.compress_frame(&frame(0), 0).unwrap();
        assert!(!out.is_empty());
        assert_eq!(comp.stats().frames, 1);
        assert_eq!(comp.stats().contexts_created, 1);
    }

    #[test]
    fn repeated_flow_reuses_context() {
        let mut comp = WorkbenchCompressor::new(16, CidMode::Small, Mode::Unidirectional, RohcConfig::default());
        comp.compress_frame(&frame(0), 0).unwrap();
        comp.compress_frame(&frame(1), 1).unwrap();
        assert_eq!(comp.stats().contexts_created, 1);
        assert_eq!(comp.stats().frames, 2);
    }

    #[test]
    fn non_ip_frame_is_rejected_and_counted() {
        let mut comp = WorkbenchCompressor::new(16, CidMode::Small, Mode::Unidirectional, RohcConfig::default());
        assert!(comp.compress_frame(&[0u8; 4], 0).is_err());
        assert_eq!(comp.stats().rejected, 1);
    }
}
