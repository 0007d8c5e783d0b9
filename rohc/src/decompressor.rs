//! Decompressor core: NC/SC/FC state machine and the inverse of
//! [`crate::compressor`]'s packet encoding.
//!
//! One [`Decompressor`] drives one context (one CID, one direction),
//! mirroring [`crate::compressor::Compressor`]'s shape. The per-CID
//! table, eviction policy and statistics aggregation this needs to be
//! useful for a whole flow set are `rohc-workbench`'s job.

use tracing::{debug, trace};

use crate::bits::BitReader;
use crate::config::RohcConfig;
use crate::context::{DecompressorContext, DecompressorState};
use crate::crc::{crc_calculate_masked, CrcType};
use crate::error::{DecompressError, RohcError};
use crate::feedback::{encode_feedback2, wrap_feedback, AckType, Feedback2};
use crate::ipid::{self, IpIdBehavior};
use crate::packet::{
    decode_ext0, decode_ext1, decode_ext2, decode_ext3, decode_large_cid, decode_uo0, decode_uo1,
    decode_uo2, detect_packet_type, parse_add_cid, read_sn, PacketDiscriminator,
};
use crate::profiles::{self, DynamicChain, StaticChain, StaticIpFields, StaticUdpFields};
use crate::types::{Cid, CidMode, HeaderChain, Ipv4Header, Mode, ProfileId, UdpHeader};
use crate::wlsb::{self, LsbShift};

/// One ROHC context's decompressor half. Owns the context state and
/// turns successive wire packets back into [`HeaderChain`]s.
pub struct Decompressor {
    pub context: DecompressorContext,
    cfg: RohcConfig,
    cid_mode: CidMode,
    /// Feedback produced by the last [`Decompressor::decompress`] call
    /// (an ACK on success once context is full, a NACK/STATIC-NACK on a
    /// state downgrade), waiting to be piggybacked or sent out-of-band by
    /// the caller.
    pending_feedback: Option<Vec<u8>>,
    /// Bytes of `packet` the last successful [`Decompressor::decompress`]
    /// call consumed as ROHC header, i.e. the offset where any trailing
    /// application payload starts. A caller multiplexing payload after
    /// the ROHC packet (as `rohc-workbench` does) needs this since
    /// nothing in the wire format itself declares the header's length.
    last_consumed: usize,
}

impl Decompressor {
    pub fn new(
        cid: Cid,
        profile: ProfileId,
        mode: Mode,
        cid_mode: CidMode,
        cfg: RohcConfig,
        now: u64,
    ) -> Result<Self, DecompressError> {
        if !profile.is_implemented() {
            return Err(DecompressError::Codec(RohcError::Malformed(format!(
                "profile {profile:?} has no decompressor implementation"
            ))));
        }
        Ok(Self {
            context: DecompressorContext::new(cid, profile, mode, now),
            cfg,
            cid_mode,
            pending_feedback: None,
            last_consumed: 0,
        })
    }

    /// Bytes the last successful [`Decompressor::decompress`] call
    /// consumed as ROHC header; anything after that offset in the
    /// packet slice passed to that call is application payload.
    pub fn last_consumed(&self) -> usize {
        self.last_consumed
    }

    /// Takes the feedback queued by the last `decompress` call, if any.
    pub fn take_feedback(&mut self) -> Option<Vec<u8>> {
        self.pending_feedback.take()
    }

    /// Decompresses one packet, advancing the context.
    pub fn decompress(&mut self, packet: &[u8], now: u64) -> Result<HeaderChain, DecompressError> {
        self.context.touch(now);
        self.context.stats.num_recv_packets += 1;

        let mut pos = 0;
        if let CidMode::Small = self.cid_mode {
            if let Some(cid) = packet.first().copied().and_then(parse_add_cid) {
                if cid != self.context.cid {
                    return Err(malformed("Add-CID octet names a different context"));
                }
                pos += 1;
            }
        }
        let type_byte = *packet.get(pos).ok_or_else(|| malformed("empty packet"))?;
        pos += 1;
        let discriminator = detect_packet_type(type_byte).map_err(DecompressError::Codec)?;

        if let CidMode::Large = self.cid_mode {
            let (cid, len) = decode_large_cid(&packet[pos..]).map_err(DecompressError::Codec)?;
            if cid != self.context.cid {
                return Err(malformed("large-CID field names a different context"));
            }
            pos += len;
        }

        if self.context.state == DecompressorState::NoContext
            && !matches!(
                discriminator,
                PacketDiscriminator::Ir { dynamic_chain_present: true }
            )
        {
            return Err(DecompressError::NoContext);
        }
        if self.context.state == DecompressorState::StaticContext
            && matches!(discriminator, PacketDiscriminator::Uo0 | PacketDiscriminator::Uo1 | PacketDiscriminator::Uo2)
        {
            return Err(malformed("dynamic context not yet (re-)established"));
        }

        trace!(
            cid = self.context.cid,
            state = ?self.context.state,
            discriminator = ?discriminator,
            "decompressor packet dispatch"
        );

        let result = match discriminator {
            PacketDiscriminator::Ir { dynamic_chain_present } => {
                self.decompress_ir(packet, pos, dynamic_chain_present)
            }
            PacketDiscriminator::IrDyn => self.decompress_ir(packet, pos, false),
            PacketDiscriminator::Uo0 => self.decompress_uo0(packet, pos, type_byte),
            PacketDiscriminator::Uo1 => self.decompress_uo1(packet, pos, type_byte),
            PacketDiscriminator::Uo2 => self.decompress_uo2(packet, pos, type_byte),
        };

        match &result {
            Ok((_, consumed)) => {
                self.last_consumed = *consumed;
                self.on_success();
            }
            Err(DecompressError::CrcMismatch { expected, actual }) => {
                debug!(cid = self.context.cid, expected, actual, "CRC mismatch");
                self.on_crc_failure();
            }
            Err(_) => {}
        }
        result.map(|(chain, _)| chain)
    }

    fn context_static_chain(&self) -> StaticChain {
        StaticChain {
            outer_ip: StaticIpFields {
                protocol: self.context.outer.protocol,
                src: self.context.outer.src,
                dst: self.context.outer.dst,
            },
            inner_ip: self.context.inner.map(|h| StaticIpFields {
                protocol: h.protocol,
                src: h.src,
                dst: h.dst,
            }),
            udp: self.context.udp.map(|u| StaticUdpFields {
                src_port: u.src_port,
                dst_port: u.dst_port,
            }),
        }
    }

    fn decompress_ir(
        &mut self,
        packet: &[u8],
        mut pos: usize,
        has_static: bool,
    ) -> Result<(HeaderChain, usize), DecompressError> {
        let profile = profiles::lookup(self.context.profile)
            .ok_or_else(|| malformed("profile not implemented"))?;

        let profile_byte = *packet.get(pos).ok_or_else(|| malformed("truncated IR packet"))?;
        pos += 1;
        if profile_byte as u16 != self.context.profile.wire_value() {
            return Err(malformed("IR profile byte does not match context"));
        }

        let crc_pos = pos;
        let received_crc = *packet.get(pos).ok_or_else(|| malformed("truncated IR packet"))?;
        pos += 1;

        let mut reader = BitReader::new(&packet[pos..]);
        let static_chain = if has_static {
            profile.decode_static_chain(&mut reader).map_err(DecompressError::Codec)?
        } else {
            self.context_static_chain()
        };
        let two_ip_headers = static_chain.has_two_ip_headers();
        let dynamic_chain = profile
            .decode_dynamic_chain(&mut reader, two_ip_headers)
            .map_err(DecompressError::Codec)?;
        let sn = read_sn(&mut reader).map_err(DecompressError::Codec)?;
        let end = pos + reader.byte_offset();

        let mut crc_buf = packet.to_vec();
        crc_buf[crc_pos] = 0;
        let expected = crc_calculate_masked(CrcType::Crc8, &crc_buf, CrcType::Crc8.init());
        if expected != received_crc {
            return Err(DecompressError::CrcMismatch { expected, actual: received_crc });
        }

        let chain = profile.reconstruct(&static_chain, &dynamic_chain);
        self.commit(
            chain.outer_ip,
            dynamic_chain.outer_ip.rnd,
            dynamic_chain.outer_ip.nbo,
            chain.inner_ip,
            dynamic_chain.inner_ip.map_or(false, |d| d.rnd),
            dynamic_chain.inner_ip.map_or(true, |d| d.nbo),
            chain.udp,
            sn,
        );
        self.context.state = DecompressorState::FullContext;
        if has_static {
            self.context.stats.num_recv_ir += 1;
        } else {
            self.context.stats.num_recv_ir_dyn += 1;
        }
        Ok((chain, end))
    }

    fn decompress_uo0(
        &mut self,
        packet: &[u8],
        pos: usize,
        type_byte: u8,
    ) -> Result<(HeaderChain, usize), DecompressError> {
        let fields = decode_uo0(type_byte);
        let candidate_sn = wlsb::decode(LsbShift::Sn, 16, 4, fields.sn_bits, self.context.sn as i64) as u16;

        let (outer_id, inner_id, checksum, end) = decode_uo_tail(
            packet,
            pos,
            self.context.outer_rnd,
            self.context.outer.identification,
            self.context.inner.map(|h| (self.context.inner_rnd, h.identification)),
            self.context.udp.is_some_and(|u| u.checksum != 0),
            self.context.udp.map_or(0, |u| u.checksum),
        )?;

        let candidate_outer = Ipv4Header { identification: outer_id, ..self.context.outer };
        let candidate_inner = self.context.inner.map(|h| Ipv4Header {
            identification: inner_id.unwrap_or(h.identification),
            ..h
        });
        let candidate_udp = self.context.udp.map(|u| UdpHeader { checksum, ..u });

        let crc_input = crc_input_bytes(&candidate_outer, candidate_inner.as_ref(), candidate_udp.as_ref(), candidate_sn);
        let crc = crc_calculate_masked(CrcType::Crc3, &crc_input, CrcType::Crc3.init());
        if crc != fields.crc {
            return Err(DecompressError::CrcMismatch { expected: crc, actual: fields.crc });
        }

        let chain = HeaderChain { outer_ip: candidate_outer, inner_ip: candidate_inner, udp: candidate_udp };
        self.commit(
            chain.outer_ip,
            self.context.outer_rnd,
            self.context.outer_nbo,
            chain.inner_ip,
            self.context.inner_rnd,
            self.context.inner_nbo,
            chain.udp,
            candidate_sn,
        );
        Ok((chain, end))
    }

    fn decompress_uo1(
        &mut self,
        packet: &[u8],
        pos: usize,
        type_byte: u8,
    ) -> Result<(HeaderChain, usize), DecompressError> {
        let byte1 = *packet.get(pos).ok_or_else(|| malformed("truncated UO-1 packet"))?;
        let fields = decode_uo1([type_byte, byte1]);
        let candidate_sn = wlsb::decode(LsbShift::Sn, 16, 5, fields.sn_bits, self.context.sn as i64) as u16;

        // The compressor sends these as literal low bits of the raw
        // identification field, the same convention EXT-0/1/2 use, not a
        // W-LSB'd oriented value.
        let lsb_outer_id = combine_low_bits(self.context.outer.identification, fields.ip_id_bits, 6);

        let (outer_id, inner_id, checksum, end) = decode_uo_tail(
            packet,
            pos + 1,
            self.context.outer_rnd,
            lsb_outer_id,
            self.context.inner.map(|h| (self.context.inner_rnd, h.identification)),
            self.context.udp.is_some_and(|u| u.checksum != 0),
            self.context.udp.map_or(0, |u| u.checksum),
        )?;

        let candidate_outer = Ipv4Header { identification: outer_id, ..self.context.outer };
        let candidate_inner = self.context.inner.map(|h| Ipv4Header {
            identification: inner_id.unwrap_or(h.identification),
            ..h
        });
        let candidate_udp = self.context.udp.map(|u| UdpHeader { checksum, ..u });

        let crc_input = crc_input_bytes(&candidate_outer, candidate_inner.as_ref(), candidate_udp.as_ref(), candidate_sn);
        let crc = crc_calculate_masked(CrcType::Crc3, &crc_input, CrcType::Crc3.init());
        if crc != fields.crc {
            return Err(DecompressError::CrcMismatch { expected: crc, actual: fields.crc });
        }

        let chain = HeaderChain { outer_ip: candidate_outer, inner_ip: candidate_inner, udp: candidate_udp };
        self.commit(
            chain.outer_ip,
            self.context.outer_rnd,
            self.context.outer_nbo,
            chain.inner_ip,
            self.context.inner_rnd,
            self.context.inner_nbo,
            chain.udp,
            candidate_sn,
        );
        Ok((chain, end))
    }

    fn decompress_uo2(
        &mut self,
        packet: &[u8],
        pos: usize,
        type_byte: u8,
    ) -> Result<(HeaderChain, usize), DecompressError> {
        let byte1 = *packet.get(pos).ok_or_else(|| malformed("truncated UO-2 packet"))?;
        let mut cursor = pos + 1;
        let fields = decode_uo2([type_byte, byte1]);

        let mut outer_rnd = self.context.outer_rnd;
        let mut outer_nbo = self.context.outer_nbo;
        let mut inner_rnd = self.context.inner_rnd;
        let mut inner_nbo = self.context.inner_nbo;
        let mut outer_id = self.context.outer.identification;
        let mut inner_id = self.context.inner.map(|h| h.identification);
        let mut outer_tos = self.context.outer.tos;
        let mut outer_ttl = self.context.outer.ttl;
        let mut outer_protocol = self.context.outer.protocol;
        let mut outer_df = self.context.outer.df;
        let mut inner_tos = self.context.inner.map(|h| h.tos);
        let mut inner_ttl = self.context.inner.map(|h| h.ttl);
        let mut inner_protocol = self.context.inner.map(|h| h.protocol);
        let mut inner_df = self.context.inner.map(|h| h.df);
        let mut extra_sn: u32 = 0;
        let mut extra_sn_width: u32 = 0;

        if fields.extension_present {
            let ext_byte0 = *packet.get(cursor).ok_or_else(|| malformed("truncated UO-2 extension"))?;
            match ext_byte0 >> 6 {
                0b00 => {
                    let ef = decode_ext0(ext_byte0);
                    cursor += 1;
                    extra_sn = ef.extra_sn_bits;
                    extra_sn_width = ef.extra_sn_width;
                    outer_id = combine_low_bits(outer_id, ef.ip_id_bits, ef.ip_id_width);
                }
                0b01 => {
                    let b1 = *packet.get(cursor + 1).ok_or_else(|| malformed("truncated EXT-1"))?;
                    let ef = decode_ext1([ext_byte0, b1]);
                    cursor += 2;
                    extra_sn = ef.extra_sn_bits;
                    extra_sn_width = ef.extra_sn_width;
                    outer_id = combine_low_bits(outer_id, ef.ip_id_bits, ef.ip_id_width);
                }
                0b10 => {
                    let b1 = *packet.get(cursor + 1).ok_or_else(|| malformed("truncated EXT-2"))?;
                    let b2 = *packet.get(cursor + 2).ok_or_else(|| malformed("truncated EXT-2"))?;
                    let ef = decode_ext2([ext_byte0, b1, b2]);
                    cursor += 3;
                    extra_sn = ef.extra_sn_bits;
                    extra_sn_width = ef.extra_sn_width;
                    outer_id = combine_low_bits(outer_id, ef.ip_id_bits, ef.ip_id_width);
                    if let Some(id) = &mut inner_id {
                        *id = combine_low_bits(*id, ef.ip_id2_bits, ef.ip_id2_width);
                    }
                }
                _ => {
                    let mut reader = BitReader::new(&packet[cursor..]);
                    let ef = decode_ext3(&mut reader).map_err(DecompressError::Codec)?;
                    cursor += reader.byte_offset();
                    extra_sn = ef.extra_sn_bits;
                    extra_sn_width = ef.extra_sn_width;
                    if ef.ip_id_width > 0 {
                        outer_id = ef.ip_id_bits as u16;
                    }
                    if ef.ip_id2_width > 0 {
                        inner_id = Some(ef.ip_id2_bits as u16);
                    }
                    if let Some(flags) = ef.ip_flags {
                        outer_rnd = flags.rnd;
                        outer_nbo = flags.nbo;
                        outer_df = flags.df;
                        if let Some(tos) = flags.tos {
                            outer_tos = tos;
                        }
                        if let Some(ttl) = flags.ttl {
                            outer_ttl = ttl;
                        }
                        if let Some(p) = flags.protocol {
                            outer_protocol = p;
                        }
                    }
                    if let Some(flags) = ef.ip2_flags {
                        inner_rnd = flags.rnd;
                        inner_nbo = flags.nbo;
                        inner_df = Some(flags.df);
                        if let Some(tos) = flags.tos {
                            inner_tos = Some(tos);
                        }
                        if let Some(ttl) = flags.ttl {
                            inner_ttl = Some(ttl);
                        }
                        if let Some(p) = flags.protocol {
                            inner_protocol = Some(p);
                        }
                    }
                }
            }
        }

        let candidate_sn = if extra_sn_width > 0 {
            ((extra_sn << 5) | fields.sn_bits) as u16
        } else {
            wlsb::decode(LsbShift::Sn, 16, 5, fields.sn_bits, self.context.sn as i64) as u16
        };

        let (tail_outer_id, tail_inner_id, checksum, end) = decode_uo_tail(
            packet,
            cursor,
            outer_rnd,
            outer_id,
            inner_id.map(|id| (inner_rnd, id)),
            self.context.udp.is_some_and(|u| u.checksum != 0),
            self.context.udp.map_or(0, |u| u.checksum),
        )?;

        let candidate_outer = Ipv4Header {
            tos: outer_tos,
            identification: tail_outer_id,
            df: outer_df,
            mf: false,
            fragment_offset: 0,
            ttl: outer_ttl,
            protocol: outer_protocol,
            src: self.context.outer.src,
            dst: self.context.outer.dst,
        };
        let candidate_inner = self.context.inner.map(|ctx_inner| Ipv4Header {
            tos: inner_tos.unwrap_or(ctx_inner.tos),
            identification: tail_inner_id.unwrap_or(ctx_inner.identification),
            df: inner_df.unwrap_or(ctx_inner.df),
            mf: false,
            fragment_offset: 0,
            ttl: inner_ttl.unwrap_or(ctx_inner.ttl),
            protocol: inner_protocol.unwrap_or(ctx_inner.protocol),
            src: ctx_inner.src,
            dst: ctx_inner.dst,
        });
        let candidate_udp = self.context.udp.map(|u| UdpHeader { checksum, ..u });

        let crc_input = crc_input_bytes(&candidate_outer, candidate_inner.as_ref(), candidate_udp.as_ref(), candidate_sn);
        let crc = crc_calculate_masked(CrcType::Crc7, &crc_input, CrcType::Crc7.init());
        if crc != fields.crc {
            return Err(DecompressError::CrcMismatch { expected: crc, actual: fields.crc });
        }

        let chain = HeaderChain { outer_ip: candidate_outer, inner_ip: candidate_inner, udp: candidate_udp };
        self.commit(chain.outer_ip, outer_rnd, outer_nbo, chain.inner_ip, inner_rnd, inner_nbo, chain.udp, candidate_sn);
        Ok((chain, end))
    }

    /// Commits a successfully verified candidate as the context's new
    /// reference state.
    fn commit(
        &mut self,
        outer: Ipv4Header,
        outer_rnd: bool,
        outer_nbo: bool,
        inner: Option<Ipv4Header>,
        inner_rnd: bool,
        inner_nbo: bool,
        udp: Option<UdpHeader>,
        sn: u16,
    ) {
        self.context.sn = sn;
        self.context.outer = outer;
        self.context.outer_rnd = outer_rnd;
        self.context.outer_nbo = outer_nbo;
        self.context.outer_id_delta =
            ipid::id_delta(outer.identification, sn, ipid_behavior(outer_rnd, outer_nbo));
        if let Some(inner) = inner {
            self.context.inner = Some(inner);
            self.context.inner_rnd = inner_rnd;
            self.context.inner_nbo = inner_nbo;
            self.context.inner_id_delta =
                ipid::id_delta(inner.identification, sn, ipid_behavior(inner_rnd, inner_nbo));
        }
        self.context.udp = udp;
    }

    /// A packet decoded cleanly: resets the failure streak and, outside
    /// U-mode, queues an ACK (spec §4.8/§4.9).
    fn on_success(&mut self) {
        if self.context.consecutive_failures > 0 {
            self.context.stats.num_decomp_repairs += 1;
        }
        self.context.consecutive_failures = 0;
        if self.context.mode != Mode::Unidirectional {
            self.queue_feedback(AckType::Ack);
        }
    }

    /// A CRC check failed: counts the failure and, once the threshold
    /// for the current state is reached, downgrades FC -> SC -> NC,
    /// notifying the compressor outside U-mode.
    fn on_crc_failure(&mut self) {
        self.context.stats.num_decomp_failures += 1;
        self.context.consecutive_failures = self.context.consecutive_failures.saturating_add(1);
        match self.context.state {
            DecompressorState::FullContext => {
                if self.context.consecutive_failures >= self.cfg.fc_to_sc_failure_threshold {
                    self.context.state = DecompressorState::StaticContext;
                    debug!(cid = self.context.cid, "FC -> SC after repeated CRC failures");
                    if self.context.mode != Mode::Unidirectional {
                        self.queue_feedback(AckType::Nack);
                    }
                }
            }
            DecompressorState::StaticContext => {
                if self.context.consecutive_failures >= self.cfg.sc_to_nc_failure_threshold {
                    self.context.state = DecompressorState::NoContext;
                    debug!(cid = self.context.cid, "SC -> NC after repeated CRC failures");
                    if self.context.mode != Mode::Unidirectional {
                        self.queue_feedback(AckType::StaticNack);
                    }
                }
            }
            DecompressorState::NoContext => {}
        }
    }

    fn queue_feedback(&mut self, ack_type: AckType) {
        let fb = Feedback2 {
            ack_type,
            mode: self.context.mode,
            sn: self.context.sn,
            options: vec![],
        };
        let body = encode_feedback2(&fb);
        self.pending_feedback = Some(wrap_feedback(&body));
        self.context.stats.num_sent_feedbacks += 1;
    }
}

fn malformed(msg: &str) -> DecompressError {
    DecompressError::Codec(RohcError::Malformed(msg.to_string()))
}

fn ipid_behavior(rnd: bool, nbo: bool) -> IpIdBehavior {
    if rnd {
        IpIdBehavior::Random
    } else if nbo {
        IpIdBehavior::SequentialNbo
    } else {
        IpIdBehavior::SequentialByteSwapped
    }
}

fn mask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

/// Replaces the low `width` bits of `old` with `bits`, leaving the
/// higher-order bits (assumed unchanged since the compressor only sends
/// these literal low bits when the header isn't otherwise diverging).
fn combine_low_bits(old: u16, bits: u32, width: u32) -> u16 {
    let old32 = old as u32;
    ((old32 & !mask(width)) | (bits & mask(width))) as u16
}

/// Reads the UO tail shared by UO-0/UO-1/UO-2: full IP-ID for any header
/// currently classified random, plus the UDP checksum whenever the flow
/// carries one. The presence gates must be known before reading (they
/// reflect state already established, not this packet's new values);
/// `outer_fallback`/`inner`'s fallback supply the otherwise-unchanged
/// value when a gate is closed.
#[allow(clippy::type_complexity)]
fn decode_uo_tail(
    packet: &[u8],
    mut pos: usize,
    outer_rnd: bool,
    outer_fallback: u16,
    inner: Option<(bool, u16)>,
    udp_active: bool,
    udp_fallback: u16,
) -> Result<(u16, Option<u16>, u16, usize), DecompressError> {
    let outer_id = if outer_rnd {
        let bytes = packet.get(pos..pos + 2).ok_or_else(|| malformed("truncated UO tail"))?;
        pos += 2;
        u16::from_be_bytes(bytes.try_into().expect("2 bytes"))
    } else {
        outer_fallback
    };
    let inner_id = match inner {
        Some((true, _)) => {
            let bytes = packet.get(pos..pos + 2).ok_or_else(|| malformed("truncated UO tail"))?;
            pos += 2;
            Some(u16::from_be_bytes(bytes.try_into().expect("2 bytes")))
        }
        Some((false, fallback)) => Some(fallback),
        None => None,
    };
    let checksum = if udp_active {
        let bytes = packet.get(pos..pos + 2).ok_or_else(|| malformed("truncated UO tail"))?;
        pos += 2;
        u16::from_be_bytes(bytes.try_into().expect("2 bytes"))
    } else {
        udp_fallback
    };
    Ok((outer_id, inner_id, checksum, pos))
}

/// Bytes the UO-0/UO-1/UO-2 CRC covers: the candidate reconstructed
/// header fields together with the candidate SN. Must mirror
/// [`crate::compressor::Compressor`]'s `crc_input_bytes` exactly, built
/// from the candidate (not yet committed) values rather than the
/// context's last-committed ones.
fn crc_input_bytes(outer: &Ipv4Header, inner: Option<&Ipv4Header>, udp: Option<&UdpHeader>, sn: u16) -> Vec<u8> {
    let mut buf = Vec::new();
    push_ip_header(&mut buf, outer);
    if let Some(inner) = inner {
        push_ip_header(&mut buf, inner);
    }
    if let Some(udp) = udp {
        buf.extend_from_slice(&udp.src_port.to_be_bytes());
        buf.extend_from_slice(&udp.dst_port.to_be_bytes());
        buf.extend_from_slice(&udp.checksum.to_be_bytes());
    }
    buf.extend_from_slice(&sn.to_be_bytes());
    buf
}

fn push_ip_header(buf: &mut Vec<u8>, header: &Ipv4Header) {
    buf.push(header.tos);
    buf.extend_from_slice(&header.identification.to_be_bytes());
    buf.push(header.ttl);
    buf.push(header.protocol);
    buf.extend_from_slice(&header.src);
    buf.extend_from_slice(&header.dst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::Compressor;
    use crate::context::CompressorState;
    use crate::types::{Ipv4Header, UdpHeader};

    fn chain(id: u16, ttl: u8) -> HeaderChain {
        HeaderChain {
            outer_ip: Ipv4Header {
                tos: 0,
                identification: id,
                df: true,
                mf: false,
                fragment_offset: 0,
                ttl,
                protocol: 17,
                src: [1, 2, 3, 4],
                dst: [5, 6, 7, 8],
            },
            inner_ip: None,
            udp: Some(UdpHeader {
                src_port: 1000,
                dst_port: 2000,
                checksum: 0,
            }),
        }
    }

    fn pair(first: &HeaderChain, cid: Cid, cid_mode: CidMode) -> (Compressor, Decompressor) {
        let cfg = RohcConfig::default();
        let comp = Compressor::new(cid, ProfileId::Udp, Mode::Unidirectional, cid_mode, first, cfg, 0).unwrap();
        let decomp = Decompressor::new(cid, ProfileId::Udp, Mode::Unidirectional, cid_mode, cfg, 0).unwrap();
        (comp, decomp)
    }

    #[test]
    fn ir_round_trips() {
        let first = chain(0, 64);
        let (mut comp, mut decomp) = pair(&first, 0, CidMode::Small);
        let pkt = comp.compress(&first, 0).unwrap();
        let out = decomp.decompress(&pkt, 0).unwrap();
        assert_eq!(out, first);
        assert_eq!(decomp.context.state, DecompressorState::FullContext);
    }

    #[test]
    fn stable_flow_round_trips_into_so() {
        let first = chain(0, 64);
        let (mut comp, mut decomp) = pair(&first, 0, CidMode::Small);
        let pkt = comp.compress(&first, 0).unwrap();
        decomp.decompress(&pkt, 0).unwrap();
        for i in 1..20u16 {
            let next = chain(i, 64);
            let bytes = comp.compress(&next, i as u64).unwrap();
            let out = decomp.decompress(&bytes, i as u64).unwrap();
            assert_eq!(out, next);
        }
        assert_eq!(comp.context.state, CompressorState::SecondOrder);
        assert_eq!(decomp.context.sn, comp.context.sn);
    }

    #[test]
    fn dynamic_change_round_trips_through_ir_dyn() {
        let first = chain(0, 64);
        let (mut comp, mut decomp) = pair(&first, 0, CidMode::Small);
        let pkt = comp.compress(&first, 0).unwrap();
        decomp.decompress(&pkt, 0).unwrap();
        for i in 1..10u16 {
            let bytes = comp.compress(&chain(i, 64), i as u64).unwrap();
            decomp.decompress(&bytes, i as u64).unwrap();
        }
        let changed = chain(10, 63);
        let bytes = comp.compress(&changed, 10).unwrap();
        let out = decomp.decompress(&bytes, 10).unwrap();
        assert_eq!(out, changed);
    }

    #[test]
    fn large_cid_round_trips() {
        let first = chain(0, 64);
        let (mut comp, mut decomp) = pair(&first, 300, CidMode::Large);
        let pkt = comp.compress(&first, 0).unwrap();
        let out = decomp.decompress(&pkt, 0).unwrap();
        assert_eq!(out, first);
    }

    #[test]
    fn corrupted_packet_is_rejected_and_counted() {
        let first = chain(0, 64);
        let (mut comp, mut decomp) = pair(&first, 0, CidMode::Small);
        let pkt = comp.compress(&first, 0).unwrap();
        decomp.decompress(&pkt, 0).unwrap();
        let mut corrupt = comp.compress(&chain(1, 64), 1).unwrap();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xff;
        assert!(decomp.decompress(&corrupt, 1).is_err());
        assert_eq!(decomp.context.stats.num_decomp_failures, 1);
    }

    #[test]
    fn nack_feedback_is_queued_in_bidirectional_mode() {
        let first = chain(0, 64);
        let cfg = RohcConfig::default();
        let mut comp =
            Compressor::new(0, ProfileId::Udp, Mode::BidirectionalOptimistic, CidMode::Small, &first, cfg, 0).unwrap();
        let mut decomp =
            Decompressor::new(0, ProfileId::Udp, Mode::BidirectionalOptimistic, CidMode::Small, cfg, 0).unwrap();
        let pkt = comp.compress(&first, 0).unwrap();
        decomp.decompress(&pkt, 0).unwrap();
        assert!(decomp.take_feedback().is_some());

        let mut corrupt = comp.compress(&chain(1, 64), 1).unwrap();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xff;
        for sn in 1..=cfg.fc_to_sc_failure_threshold {
            let _ = decomp.decompress(&corrupt, sn as u64);
        }
        assert_eq!(decomp.context.state, DecompressorState::StaticContext);
        assert!(decomp.take_feedback().is_some());
    }
}
