//! Decompresses a stream of ROHC packets across many contexts, the
//! mirror image of [`crate::compressor::WorkbenchCompressor`]. This is
//! the decompressor-side counterpart of the reference workbench's
//! `SchcObserver`/`SchcCompressor::decompress`: same shape (stats,
//! per-context state, a single entry point that also hands back the
//! trailing application payload), but driving [`rohc::Decompressor`]
//! instead of SCHC rule matching.

use tracing::{debug, warn};

use rohc::packet::{decode_large_cid, detect_packet_type, parse_add_cid, PacketDiscriminator};
use rohc::types::{MAX_LARGE_CID, MAX_SMALL_CID};
use rohc::{Cid, CidMode, Decompressor, HeaderChain, Mode, ProfileId, RohcConfig};

use crate::context_table::ContextTable;
use crate::error::WorkbenchError;
use crate::frame::build_frame;
use crate::stats::DecompressorStats;

/// A decompressed frame: the rebuilt Ethernet/IPv4/UDP bytes, plus any
/// feedback the context wants sent back to its compressor peer.
pub struct DecompressedFrame {
    pub frame: Vec<u8>,
    pub feedback: Option<Vec<u8>>,
}

pub struct WorkbenchDecompressor {
    contexts: ContextTable<Decompressor>,
    stats: DecompressorStats,
    cfg: RohcConfig,
    mode: Mode,
    cid_mode: CidMode,
}

impl WorkbenchDecompressor {
    pub fn new(capacity: usize, cid_mode: CidMode, mode: Mode, cfg: RohcConfig) -> Self {
        let max_cid = match cid_mode {
            CidMode::Small => MAX_SMALL_CID,
            CidMode::Large => MAX_LARGE_CID,
        };
        Self { contexts: ContextTable::new(capacity, max_cid), stats: DecompressorStats::default(), cfg, mode, cid_mode }
    }

    pub fn stats(&self) -> &DecompressorStats {
        &self.stats
    }

    /// Decompresses one ROHC packet (header plus untouched application
    /// payload appended, as [`crate::compressor::WorkbenchCompressor`]
    /// produces it) back into a full frame.
    pub fn decompress_packet(&mut self, packet: &[u8], now: u64) -> Result<DecompressedFrame, WorkbenchError> {
        let cid = self.peek_cid(packet)?;

        if !self.contexts.contains(cid) {
            let profile = self.peek_profile(packet)?;
            let ctx = Decompressor::new(cid, profile, self.mode, self.cid_mode, self.cfg, now)?;
            debug!(cid, ?profile, "new decompression context");
            self.stats.record_context_created();
            if let Some(evicted) = self.contexts.insert(ctx) {
                warn!(evicted, "context table full, evicted least-recently-used flow");
                self.stats.record_context_evicted();
            }
        }

        let ctx = self.contexts.get_mut(cid).ok_or(WorkbenchError::NoContext(cid))?;
        let chain = match ctx.decompress(packet, now) {
            Ok(chain) => chain,
            Err(e) => {
                self.stats.record_failed();
                return Err(e.into());
            }
        };
        let payload = &packet[ctx.last_consumed()..];
        let feedback = ctx.take_feedback();
        if feedback.is_some() {
            self.stats.record_feedback();
        }

        self.stats.record_decompressed();
        Ok(DecompressedFrame { frame: build_frame(&chain, payload), feedback })
    }

    /// Routes a FEEDBACK-2 payload to its owning context, decoded
    /// elsewhere, same split as
    /// [`crate::compressor::WorkbenchCompressor::handle_feedback`]. Not
    /// used on the decompressor side in this workbench — kept for a
    /// bidirectional (O-mode) deployment where the decompressor also
    /// sees feedback it sent itself echoed back for diagnostics.
    pub fn context(&self, cid: Cid) -> Option<&Decompressor> {
        self.contexts.get(cid)
    }

    fn peek_cid(&self, packet: &[u8]) -> Result<Cid, WorkbenchError> {
        let mut pos = 0;
        if let CidMode::Small = self.cid_mode {
            if let Some(cid) = packet.first().copied().and_then(parse_add_cid) {
                return Ok(cid);
            }
            return Ok(0);
        }
        let type_byte = *packet.get(pos).ok_or_else(|| malformed("empty packet"))?;
        pos += 1;
        let _ = detect_packet_type(type_byte).map_err(|e| WorkbenchError::Decompress(e.into()))?;
        let (cid, _) =
            decode_large_cid(&packet[pos..]).map_err(|e| WorkbenchError::Decompress(e.into()))?;
        Ok(cid)
    }

    /// Reads the profile byte out of a first-seen IR packet, without a
    /// context to check it against. `rohc::Decompressor::new` needs the
    /// profile up front (spec §4.1 "IR packet ... only packet type that
    /// can create a context"); this mirrors that one field of
    /// [`Decompressor::decompress`]'s own parsing, just far enough to
    /// pick the right profile.
    fn peek_profile(&self, packet: &[u8]) -> Result<ProfileId, WorkbenchError> {
        let mut pos = 0;
        if let CidMode::Small = self.cid_mode {
            if packet.first().copied().and_then(parse_add_cid).is_some() {
                pos += 1;
            }
        }
        let type_byte = *packet.get(pos).ok_or_else(|| malformed("empty packet"))?;
        pos += 1;
        let discriminator = detect_packet_type(type_byte).map_err(|e| WorkbenchError::Decompress(e.into()))?;
        if !matches!(discriminator, PacketDiscriminator::Ir { dynamic_chain_present: true }) {
            return Err(malformed("first packet for a CID must be an IR packet"));
        }
        if let CidMode::Large = self.cid_mode {
            let (_, len) =
                decode_large_cid(&packet[pos..]).map_err(|e| WorkbenchError::Decompress(e.into()))?;
            pos += len;
        }
        let profile_byte = *packet.get(pos).ok_or_else(|| malformed("truncated IR packet"))?;
        ProfileId::from_wire_value(profile_byte as u16)
            .ok_or_else(|| malformed("unknown profile in IR packet"))
    }
}

fn malformed(msg: &str) -> WorkbenchError {
    WorkbenchError::Decompress(rohc::DecompressError::Codec(rohc::RohcError::Malformed(msg.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::WorkbenchCompressor;
    use rohc::{Ipv4Header, UdpHeader};

    fn frame(id: u16, payload: &[u8]) -> Vec<u8> {
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
        build_frame(&chain, payload)
    }

    #[test]
    fn round_trips_first_ir_packet() {
        let mut comp = WorkbenchCompressor::new(16, CidMode::Small, Mode::Unidirectional, RohcConfig::default());
        let mut decomp = WorkbenchDecompressor::new(16, CidMode::Small, Mode::Unidirectional, RohcConfig::default());

        let rohc_packet = comp.compress_frame(&frame(7, b"payload"), 0).unwrap();
        let out = decomp.decompress_packet(&rohc_packet, 0).unwrap();

        let parsed = crate::frame::parse_frame(&out.frame).unwrap();
        assert_eq!(parsed.chain.outer_ip.identification, 7);
        assert_eq!(parsed.payload, b"payload");
    }

    #[test]
    fn second_packet_on_same_flow_reuses_context() {
        let mut comp = WorkbenchCompressor::new(16, CidMode::Small, Mode::Unidirectional, RohcConfig::default());
        let mut decomp = WorkbenchDecompressor::new(16, CidMode::Small, Mode::Unidirectional, RohcConfig::default());

        let p0 = comp.compress_frame(&frame(1, b"a"), 0).unwrap();
        decomp.decompress_packet(&p0, 0).unwrap();
        let p1 = comp.compress_frame(&frame(2, b"bb"), 1).unwrap();
        let out = decomp.decompress_packet(&p1, 1).unwrap();

        assert_eq!(decomp.stats().frames_decompressed.load(std::sync::atomic::Ordering::Relaxed), 2);
        let parsed = crate::frame::parse_frame(&out.frame).unwrap();
        assert_eq!(parsed.payload, b"bb");
    }

    #[test]
    fn unknown_first_packet_type_is_rejected() {
        let mut decomp = WorkbenchDecompressor::new(16, CidMode::Small, Mode::Unidirectional, RohcConfig::default());
        // A UO-0 packet (top bit clear) can never open a context.
        assert!(decomp.decompress_packet(&[0x00], 0).is_err());
    }
}
