//! Compressor core: IR/FO/SO state machine, packet-type and extension
//! selection, and the bit encoding that turns a [`HeaderChain`] diff
//! into a ROHC packet. Spec §4.4–§4.7.
//!
//! One [`Compressor`] drives one context (one CID, one direction). The
//! per-CID table, eviction policy and statistics counters this needs to
//! be useful for a whole flow set are `rohc-workbench`'s job (spec §1:
//! "external collaborators").

use tracing::{debug, trace};

use crate::bits::BitWriter;
use crate::config::RohcConfig;
use crate::context::{CompressorContext, CompressorState, HeaderInfo};
use crate::crc::{crc_calculate_masked, CrcType};
use crate::error::CompressError;
use crate::feedback::{AckType, Feedback2};
use crate::ipid::{self, IpIdBehavior};
use crate::packet::{
    encode_ext0, encode_ext1, encode_ext2, encode_ext3, encode_large_cid, encode_small_cid_prefix,
    encode_uo0, encode_uo1, encode_uo2, write_sn, Ext3IpFlags, Ext3Plan,
};
use crate::profiles::{self, Profile};
use crate::types::{Cid, CidMode, HeaderChain, Ipv4Header, Mode, ProfileId, UdpHeader};

/// ROHC packet format the state/packet-type decision selected, spec §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Ir,
    IrDyn,
    Uo0,
    Uo1,
    Uo2,
}

/// One IP header's per-packet diff against its context, spec §4.4/§4.7.
#[derive(Debug, Clone, Copy)]
struct IpDiff {
    behavior: IpIdBehavior,
    rnd: bool,
    nbo: bool,
    rnd_changed: bool,
    nbo_changed: bool,
    tos_changed: bool,
    ttl_changed: bool,
    df_changed: bool,
    protocol_changed: bool,
    id_delta: i32,
    nr_ip_id_bits: u32,
    ip_id_window_value: i64,
}

/// The field behaves as if `identification` were read in the order
/// `nbo` claims; used to keep W-LSB window comparisons in a stable
/// frame regardless of which byte order happens to be sequential today.
fn oriented_ip_id(id: u16, nbo: bool) -> i64 {
    (if nbo { id } else { id.swap_bytes() }) as i64
}

fn diff_ip_header(info: &mut HeaderInfo, header: &Ipv4Header, sn: u16, cfg: &RohcConfig) -> IpDiff {
    let behavior = ipid::classify(info.last.identification, header.identification, cfg.ipid_max_delta);
    let rnd = behavior.rnd();
    let nbo = behavior.nbo();
    let rnd_changed = rnd != info.rnd;
    let nbo_changed = nbo != info.nbo;
    let tos_changed = header.tos != info.last.tos;
    let ttl_changed = header.ttl != info.last.ttl;
    let df_changed = header.df != info.last.df;
    let protocol_changed = header.protocol != info.last.protocol;

    if tos_changed {
        info.tos_count = 0;
    } else {
        HeaderInfo::bump(&mut info.tos_count, cfg.max_fo_count);
    }
    if ttl_changed {
        info.ttl_count = 0;
    } else {
        HeaderInfo::bump(&mut info.ttl_count, cfg.max_fo_count);
    }
    if df_changed {
        info.df_count = 0;
    } else {
        HeaderInfo::bump(&mut info.df_count, cfg.max_fo_count);
    }
    if protocol_changed {
        info.protocol_count = 0;
    } else {
        HeaderInfo::bump(&mut info.protocol_count, cfg.max_fo_count);
    }
    if rnd_changed || nbo_changed {
        info.rnd_count = 0;
        info.nbo_count = 0;
    } else {
        HeaderInfo::bump(&mut info.rnd_count, cfg.max_fo_count);
        HeaderInfo::bump(&mut info.nbo_count, cfg.max_fo_count);
    }

    let id_delta = ipid::id_delta(header.identification, sn, behavior);
    let oriented = oriented_ip_id(header.identification, nbo);
    let nr_ip_id_bits = if rnd { 16 } else { info.ip_id_window.get_k(oriented) as u32 };

    IpDiff {
        behavior,
        rnd,
        nbo,
        rnd_changed,
        nbo_changed,
        tos_changed,
        ttl_changed,
        df_changed,
        protocol_changed,
        id_delta,
        nr_ip_id_bits,
        ip_id_window_value: oriented,
    }
}

impl IpDiff {
    fn any_dynamic_change(&self) -> bool {
        self.tos_changed || self.ttl_changed || self.df_changed || self.rnd_changed || self.nbo_changed
    }
}

/// Everything the packet/extension-type decision needs about this
/// packet's diff against the context.
struct Diff {
    outer: IpDiff,
    inner: Option<IpDiff>,
    udp_checksum_changed: bool,
    send_static: u32,
    send_dynamic: u32,
    nr_sn_bits: u32,
}

/// One ROHC context's compressor half. Owns the context state and knows
/// how to turn successive [`HeaderChain`]s into ROHC packets.
pub struct Compressor {
    pub context: CompressorContext,
    cfg: RohcConfig,
    cid_mode: CidMode,
}

impl Compressor {
    /// Creates a new context for `cid`/`profile`, seeded with the first
    /// packet's headers. The context starts in IR state; the caller
    /// should immediately call [`Compressor::compress`] with the same
    /// `chain` to obtain the first wire packet.
    pub fn new(
        cid: Cid,
        profile: ProfileId,
        mode: Mode,
        cid_mode: CidMode,
        chain: &HeaderChain,
        cfg: RohcConfig,
        now: u64,
    ) -> Result<Self, CompressError> {
        let profile_impl = profiles::lookup(profile).ok_or(CompressError::ProfileMismatch)?;
        if !profile_impl.matches(chain) {
            return Err(CompressError::ProfileMismatch);
        }
        if chain.outer_ip.is_fragmented() || chain.inner_ip.is_some_and(|h| h.is_fragmented()) {
            return Err(CompressError::Fragmented);
        }
        let context = CompressorContext::new(
            cid,
            profile,
            mode,
            chain.outer_ip,
            chain.inner_ip,
            chain.udp,
            &cfg,
            now,
        );
        Ok(Self { context, cfg, cid_mode })
    }

    fn profile(&self) -> &'static dyn Profile {
        profiles::lookup(self.context.profile).expect("context created with an implemented profile")
    }

    /// Processes feedback received from the decompressor, spec §4.4/§4.9.
    pub fn handle_feedback(&mut self, fb: &Feedback2) {
        match fb.ack_type {
            AckType::Ack => {
                let sn = fb.combined_sn() as u16;
                self.context.sn_window.ack(sn);
                self.context.outer.ip_id_window.ack(sn);
                if let Some(inner) = &mut self.context.inner {
                    inner.ip_id_window.ack(sn);
                }
                debug!(cid = self.context.cid, sn, "ACK received, windows trimmed");
            }
            AckType::Nack => {
                self.context.state = CompressorState::FirstOrder;
                self.context.ir_dyn_count = 0;
                debug!(cid = self.context.cid, "NACK received, falling back to FO");
            }
            AckType::StaticNack => {
                self.context.state = CompressorState::InitAndRefresh;
                self.context.ir_count = 0;
                debug!(cid = self.context.cid, "STATIC-NACK received, falling back to IR");
            }
            AckType::Reserved => {}
        }
    }

    /// Compresses one packet, advancing the context.
    pub fn compress(&mut self, chain: &HeaderChain, now: u64) -> Result<Vec<u8>, CompressError> {
        let profile = self.profile();
        if !profile.matches(chain) {
            return Err(CompressError::ProfileMismatch);
        }
        if chain.outer_ip.is_fragmented() || chain.inner_ip.is_some_and(|h| h.is_fragmented()) {
            return Err(CompressError::Fragmented);
        }
        if chain.has_two_ip_headers() != self.context.inner.is_some() {
            return Err(CompressError::ProfileMismatch);
        }

        self.context.touch(now);
        self.context.sn = self.context.sn.wrapping_add(1);
        let sn = self.context.sn;

        let outer_diff = diff_ip_header(&mut self.context.outer, &chain.outer_ip, sn, &self.cfg);
        let inner_diff = match (&mut self.context.inner, chain.inner_ip) {
            (Some(info), Some(header)) => Some(diff_ip_header(info, &header, sn, &self.cfg)),
            _ => None,
        };
        let udp_checksum_changed = match (&mut self.context.udp, chain.udp) {
            (Some(ctx), Some(udp)) => {
                let changed = udp.checksum != ctx.last.checksum;
                if changed {
                    ctx.checksum_change_count = 0;
                } else {
                    HeaderInfo::bump(&mut ctx.checksum_change_count, self.cfg.max_fo_count);
                }
                changed
            }
            _ => false,
        };

        let send_static = (outer_diff.protocol_changed as u32)
            + inner_diff.as_ref().map_or(0, |d| d.protocol_changed as u32);
        // The UDP checksum is not counted here: it rides the UO tail on
        // every packet for which the context already carries a nonzero
        // checksum, so seeing it differ from last time is not a context
        // desync risk the way a TOS/TTL/DF/RND change is.
        let send_dynamic = outer_diff.any_dynamic_change() as u32
            + inner_diff.as_ref().map_or(0, |d| d.any_dynamic_change() as u32);

        let nr_sn_bits = self.context.sn_window.get_k(sn as i64) as u32;

        let diff = Diff {
            outer: outer_diff,
            inner: inner_diff,
            udp_checksum_changed,
            send_static,
            send_dynamic,
            nr_sn_bits,
        };

        self.decide_state(&diff);
        let packet_type = self.decide_packet_type(&diff);
        trace!(
            cid = self.context.cid,
            sn,
            state = ?self.context.state,
            packet_type = ?packet_type,
            "compressor packet decision"
        );

        let bytes = self.encode_packet(packet_type, chain, &diff)?;
        self.advance_counters(packet_type);
        self.update_context(chain, &diff);
        Ok(bytes)
    }

    /// State transitions, spec §4.4.
    fn decide_state(&mut self, diff: &Diff) {
        let any_change = diff.send_static > 0 || diff.send_dynamic > 0;
        match self.context.state {
            CompressorState::InitAndRefresh => {
                if self.context.ir_count >= self.cfg.max_ir_count {
                    self.context.state = if any_change {
                        CompressorState::FirstOrder
                    } else {
                        CompressorState::SecondOrder
                    };
                }
            }
            CompressorState::FirstOrder => {
                if any_change {
                    self.context.fo_count = 0;
                } else if self.context.fo_count >= self.cfg.max_fo_count {
                    self.context.state = CompressorState::SecondOrder;
                }
            }
            CompressorState::SecondOrder => {
                if any_change {
                    self.context.state = CompressorState::FirstOrder;
                    self.context.fo_count = 0;
                }
            }
        }

        // Periodic downward transitions, U-mode only (spec §4.4's
        // robustness mechanism against silent desynchronization).
        if self.context.mode == Mode::Unidirectional {
            if matches!(self.context.state, CompressorState::SecondOrder)
                && self.context.go_back_fo_count >= self.cfg.change_to_fo_count
            {
                self.context.state = CompressorState::FirstOrder;
                self.context.go_back_fo_count = 0;
            }
            if matches!(
                self.context.state,
                CompressorState::FirstOrder | CompressorState::SecondOrder
            ) && self.context.go_back_ir_count >= self.cfg.change_to_ir_count
            {
                self.context.state = CompressorState::InitAndRefresh;
                self.context.ir_count = 0;
                self.context.go_back_ir_count = 0;
            }
        }
    }

    /// Packet-type selection, spec §4.5.
    fn decide_packet_type(&self, diff: &Diff) -> PacketType {
        match self.context.state {
            CompressorState::InitAndRefresh => PacketType::Ir,
            CompressorState::FirstOrder => {
                let dynamic_threshold = if self.context.inner.is_some() { 4 } else { 2 };
                if self.context.ir_dyn_count < self.cfg.max_fo_count {
                    PacketType::IrDyn
                } else if diff.send_dynamic > dynamic_threshold {
                    PacketType::IrDyn
                } else {
                    PacketType::Uo2
                }
            }
            CompressorState::SecondOrder => self.decide_so_packet_type(diff),
        }
    }

    fn decide_so_packet_type(&self, diff: &Diff) -> PacketType {
        let outer_id_ok = diff.outer.rnd || diff.outer.nr_ip_id_bits == 0;
        if self.context.inner.is_none() {
            if diff.nr_sn_bits <= 4 && outer_id_ok {
                PacketType::Uo0
            } else if diff.nr_sn_bits == 5 && diff.outer.nr_ip_id_bits == 0 {
                PacketType::Uo2
            } else if diff.nr_sn_bits <= 5 && diff.outer.nr_ip_id_bits <= 6 {
                PacketType::Uo1
            } else {
                PacketType::Uo2
            }
        } else {
            // Two IP headers: the outer header behaves analogously
            // (spec §4.5); the inner header's bits ride in the
            // extension when one is needed.
            let inner_ok = diff
                .inner
                .as_ref()
                .is_some_and(|d| d.rnd || d.nr_ip_id_bits == 0);
            if diff.nr_sn_bits <= 4 && outer_id_ok && inner_ok {
                PacketType::Uo0
            } else if diff.nr_sn_bits == 5 && diff.outer.nr_ip_id_bits == 0 {
                PacketType::Uo2
            } else if diff.nr_sn_bits <= 5 && diff.outer.nr_ip_id_bits <= 6 && inner_ok {
                PacketType::Uo1
            } else {
                PacketType::Uo2
            }
        }
    }

    /// Extension selection for UO-2, spec §4.6.
    fn decide_extension(&self, diff: &Diff) -> ExtensionChoice {
        let any_change = diff.send_static > 0 || diff.send_dynamic > 0;
        if !any_change && diff.nr_sn_bits < 5 && diff.outer.nr_ip_id_bits == 0 {
            return ExtensionChoice::None;
        }
        if diff.nr_sn_bits <= 8 && diff.outer.nr_ip_id_bits <= 3 && !any_change {
            return ExtensionChoice::Ext0;
        }
        if diff.nr_sn_bits <= 8 && diff.outer.nr_ip_id_bits <= 11 && !any_change {
            return ExtensionChoice::Ext1;
        }
        if self.context.inner.is_some() && !any_change {
            if let Some(inner) = &diff.inner {
                if diff.nr_sn_bits <= 3 && inner.nr_ip_id_bits <= 11 && diff.outer.nr_ip_id_bits <= 8 {
                    return ExtensionChoice::Ext2;
                }
            }
        }
        ExtensionChoice::Ext3
    }

    fn advance_counters(&mut self, packet_type: PacketType) {
        match packet_type {
            PacketType::Ir => {
                HeaderInfo::bump(&mut self.context.ir_count, self.cfg.max_ir_count);
            }
            PacketType::IrDyn => {
                HeaderInfo::bump(&mut self.context.ir_dyn_count, self.cfg.max_fo_count);
                HeaderInfo::bump(&mut self.context.fo_count, self.cfg.max_fo_count);
            }
            PacketType::Uo0 | PacketType::Uo1 | PacketType::Uo2 => {
                HeaderInfo::bump(&mut self.context.so_count, u32::MAX);
            }
        }
        if matches!(self.context.state, CompressorState::FirstOrder | CompressorState::SecondOrder) {
            self.context.go_back_fo_count = self.context.go_back_fo_count.saturating_add(1);
            self.context.go_back_ir_count = self.context.go_back_ir_count.saturating_add(1);
        }
    }

    /// Records the just-sent header as the context's new reference and
    /// feeds the W-LSB windows, spec §4.1.
    fn update_context(&mut self, chain: &HeaderChain, diff: &Diff) {
        let sn = self.context.sn;
        self.context.sn_window.add(sn, sn as i64);

        self.context.outer.last = chain.outer_ip;
        self.context.outer.rnd = diff.outer.rnd;
        self.context.outer.nbo = diff.outer.nbo;
        self.context.outer.id_delta = diff.outer.id_delta;
        if !diff.outer.rnd {
            self.context.outer.ip_id_window.add(sn, diff.outer.ip_id_window_value);
        }

        if let (Some(info), Some(header), Some(d)) = (&mut self.context.inner, chain.inner_ip, &diff.inner) {
            info.last = header;
            info.rnd = d.rnd;
            info.nbo = d.nbo;
            info.id_delta = d.id_delta;
            if !d.rnd {
                info.ip_id_window.add(sn, d.ip_id_window_value);
            }
        }

        if let (Some(ctx), Some(udp)) = (&mut self.context.udp, chain.udp) {
            ctx.last = udp;
        }
    }

    fn encode_packet(
        &self,
        packet_type: PacketType,
        chain: &HeaderChain,
        diff: &Diff,
    ) -> Result<Vec<u8>, CompressError> {
        let mut out = Vec::new();
        if let CidMode::Small = self.cid_mode {
            if let Some(prefix) = encode_small_cid_prefix(self.context.cid) {
                out.push(prefix);
            }
        }

        match packet_type {
            PacketType::Ir => self.encode_ir(&mut out, chain, true)?,
            PacketType::IrDyn => self.encode_ir(&mut out, chain, false)?,
            PacketType::Uo0 => self.encode_uo0(&mut out, chain, diff)?,
            PacketType::Uo1 => self.encode_uo1(&mut out, chain, diff)?,
            PacketType::Uo2 => self.encode_uo2(&mut out, chain, diff)?,
        }
        Ok(out)
    }

    fn write_cid_continuation(&self, out: &mut Vec<u8>) -> Result<(), CompressError> {
        if let CidMode::Large = self.cid_mode {
            let bytes = encode_large_cid(self.context.cid).map_err(CompressError::Codec)?;
            out.extend_from_slice(&bytes);
        }
        Ok(())
    }

    /// Encodes an IR packet (`full = true`, both static and dynamic
    /// chains) or an IR-DYN packet (`full = false`, dynamic chain only).
    fn encode_ir(&self, out: &mut Vec<u8>, chain: &HeaderChain, full: bool) -> Result<(), CompressError> {
        let profile = self.profile();
        let (static_chain, dynamic_chain) = profile.build_chains(
            chain,
            self.context.outer.rnd,
            self.context.outer.nbo,
            self.context.inner.as_ref().map_or(false, |i| i.rnd),
            self.context.inner.as_ref().map_or(true, |i| i.nbo),
        );

        let type_byte = if full { 0b1111_1101u8 } else { 0b1111_1000u8 };
        out.push(type_byte);
        self.write_cid_continuation(out)?;
        out.push(self.context.profile.wire_value() as u8);

        let crc_index = out.len();
        out.push(0); // CRC-8 placeholder, spec §6.

        let mut w = BitWriter::new();
        if full {
            profile.encode_static_chain(&mut w, &static_chain);
        }
        profile.encode_dynamic_chain(&mut w, &dynamic_chain);
        out.extend_from_slice(&w.into_bytes());
        write_sn_bytes(out, self.context.sn);

        let crc = crc_calculate_masked(CrcType::Crc8, out, CrcType::Crc8.init());
        out[crc_index] = crc;
        Ok(())
    }

    fn encode_uo0(&self, out: &mut Vec<u8>, chain: &HeaderChain, diff: &Diff) -> Result<(), CompressError> {
        let sn_lsbs = (self.context.sn as u32) & mask(diff.nr_sn_bits.max(1).min(4));
        let crc_input = self.crc_input_bytes(chain);
        let crc = crc_calculate_masked(CrcType::Crc3, &crc_input, CrcType::Crc3.init());
        out.push(encode_uo0(sn_lsbs, crc));
        self.write_cid_continuation(out)?;
        self.encode_uo_tail(out, chain, diff);
        Ok(())
    }

    fn encode_uo1(&self, out: &mut Vec<u8>, chain: &HeaderChain, diff: &Diff) -> Result<(), CompressError> {
        let ip_id_lsbs = (chain.outer_ip.identification as u32) & mask(6);
        let sn_lsbs = (self.context.sn as u32) & mask(5);
        let crc_input = self.crc_input_bytes(chain);
        let crc = crc_calculate_masked(CrcType::Crc3, &crc_input, CrcType::Crc3.init());
        let bytes = encode_uo1(ip_id_lsbs, sn_lsbs, crc);
        out.push(bytes[0]);
        self.write_cid_continuation(out)?;
        out.push(bytes[1]);
        self.encode_uo_tail(out, chain, diff);
        Ok(())
    }

    fn encode_uo2(&self, out: &mut Vec<u8>, chain: &HeaderChain, diff: &Diff) -> Result<(), CompressError> {
        let sn_lsbs = (self.context.sn as u32) & mask(5);
        let extension = self.decide_extension(diff);
        let crc_input = self.crc_input_bytes(chain);
        let crc = crc_calculate_masked(CrcType::Crc7, &crc_input, CrcType::Crc7.init());
        let extension_present = !matches!(extension, ExtensionChoice::None);
        let bytes = encode_uo2(sn_lsbs, extension_present, crc);
        out.push(bytes[0]);
        self.write_cid_continuation(out)?;
        out.push(bytes[1]);

        let extra_sn = (self.context.sn as u32) >> 5;
        match extension {
            ExtensionChoice::None => {}
            ExtensionChoice::Ext0 => {
                let extra = extra_sn & mask(3);
                let ip = (chain.outer_ip.identification as u32) & mask(3);
                out.push(encode_ext0(extra, ip));
            }
            ExtensionChoice::Ext1 => {
                let extra = extra_sn & mask(3);
                let ip = (chain.outer_ip.identification as u32) & mask(11);
                out.extend_from_slice(&encode_ext1(extra, ip));
            }
            ExtensionChoice::Ext2 => {
                let extra = extra_sn & mask(3);
                let inner_id = chain.inner_ip.map_or(0, |h| h.identification as u32) & mask(11);
                let outer_id = (chain.outer_ip.identification as u32) & mask(8);
                out.extend_from_slice(&encode_ext2(extra, inner_id, outer_id));
            }
            ExtensionChoice::Ext3 => {
                out.extend_from_slice(&encode_ext3(&self.build_ext3_plan(chain, diff)));
            }
        }

        self.encode_uo_tail(out, chain, diff);
        Ok(())
    }

    /// The UO tail, spec §6: full IP-ID for any header whose behavior is
    /// random (it can never be W-LSB'd), plus the UDP checksum whenever
    /// the flow carries one. Shared by UO-0/1/2 since the tail's
    /// composition depends only on the diff, not the base format.
    ///
    /// The presence gates (`rnd`, "checksum in use") must be decidable by
    /// the decompressor *before* it has read the tail, so they test the
    /// context's last-committed state, not this packet's new values —
    /// the new value only decides what gets written once a gate is open.
    fn encode_uo_tail(&self, out: &mut Vec<u8>, chain: &HeaderChain, diff: &Diff) {
        if diff.outer.rnd {
            out.extend_from_slice(&chain.outer_ip.identification.to_be_bytes());
        }
        if let Some(inner) = chain.inner_ip {
            if diff.inner.as_ref().is_some_and(|d| d.rnd) {
                out.extend_from_slice(&inner.identification.to_be_bytes());
            }
        }
        if self.context.udp.as_ref().is_some_and(|ctx| ctx.last.checksum != 0) {
            let checksum = chain.udp.map_or(0, |u| u.checksum);
            out.extend_from_slice(&checksum.to_be_bytes());
        }
    }

    fn build_ext3_plan(&self, chain: &HeaderChain, diff: &Diff) -> Ext3Plan {
        let mut plan = Ext3Plan::default();
        if self.context.sn > 0x1f {
            plan.extra_sn_bits = Some(((self.context.sn as u32) >> 5, 8));
        }
        plan.ip_id = Some((chain.outer_ip.identification as u32, 16));
        if diff.outer.any_dynamic_change() {
            plan.ip_flags = Some(Ext3IpFlags {
                tos: diff.outer.tos_changed.then_some(chain.outer_ip.tos),
                ttl: diff.outer.ttl_changed.then_some(chain.outer_ip.ttl),
                protocol: diff.outer.protocol_changed.then_some(chain.outer_ip.protocol),
                df: chain.outer_ip.df,
                rnd: diff.outer.rnd,
                nbo: diff.outer.nbo,
            });
        }
        if let (Some(inner_header), Some(inner_diff)) = (chain.inner_ip, &diff.inner) {
            plan.ip_id2 = Some((inner_header.identification as u32, 16));
            if inner_diff.any_dynamic_change() {
                plan.ip2_flags = Some(Ext3IpFlags {
                    tos: inner_diff.tos_changed.then_some(inner_header.tos),
                    ttl: inner_diff.ttl_changed.then_some(inner_header.ttl),
                    protocol: inner_diff.protocol_changed.then_some(inner_header.protocol),
                    df: inner_header.df,
                    rnd: inner_diff.rnd,
                    nbo: inner_diff.nbo,
                });
            }
        }
        plan
    }

    /// Bytes the UO-0/UO-1/UO-2 CRC covers: the reconstructed header
    /// fields (the outer and optional inner IP header, plus UDP header,
    /// exactly as the decompressor will rebuild them) together with the
    /// current SN.
    fn crc_input_bytes(&self, chain: &HeaderChain) -> Vec<u8> {
        let mut buf = Vec::new();
        push_ip_header(&mut buf, &chain.outer_ip);
        if let Some(inner) = chain.inner_ip {
            push_ip_header(&mut buf, &inner);
        }
        if let Some(udp) = chain.udp {
            buf.extend_from_slice(&udp.src_port.to_be_bytes());
            buf.extend_from_slice(&udp.dst_port.to_be_bytes());
            buf.extend_from_slice(&udp.checksum.to_be_bytes());
        }
        buf.extend_from_slice(&self.context.sn.to_be_bytes());
        buf
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtensionChoice {
    None,
    Ext0,
    Ext1,
    Ext2,
    Ext3,
}

fn push_ip_header(buf: &mut Vec<u8>, header: &Ipv4Header) {
    buf.push(header.tos);
    buf.extend_from_slice(&header.identification.to_be_bytes());
    buf.push(header.ttl);
    buf.push(header.protocol);
    buf.extend_from_slice(&header.src);
    buf.extend_from_slice(&header.dst);
}

fn write_sn_bytes(out: &mut Vec<u8>, sn: u16) {
    let mut w = BitWriter::new();
    write_sn(&mut w, sn);
    out.extend_from_slice(&w.into_bytes());
}

fn mask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn new_compressor(first: &HeaderChain) -> Compressor {
        Compressor::new(
            0,
            ProfileId::Udp,
            Mode::Unidirectional,
            CidMode::Small,
            first,
            RohcConfig::default(),
            0,
        )
        .unwrap()
    }

    #[test]
    fn first_packet_is_ir() {
        let first = chain(0, 64);
        let mut comp = new_compressor(&first);
        let bytes = comp.compress(&first, 0).unwrap();
        assert_eq!(bytes[0] & 0b1111_1110, 0b1111_1100);
        assert_eq!(comp.context.ir_count, 1);
    }

    #[test]
    fn stable_flow_reaches_so_state() {
        let first = chain(0, 64);
        let mut comp = new_compressor(&first);
        comp.compress(&first, 0).unwrap();
        for i in 1..20u16 {
            let pkt = chain(i, 64);
            comp.compress(&pkt, i as u64).unwrap();
        }
        assert_eq!(comp.context.state, CompressorState::SecondOrder);
    }

    #[test]
    fn dynamic_field_change_forces_fo() {
        let first = chain(0, 64);
        let mut comp = new_compressor(&first);
        comp.compress(&first, 0).unwrap();
        for i in 1..10u16 {
            comp.compress(&chain(i, 64), i as u64).unwrap();
        }
        assert_eq!(comp.context.state, CompressorState::SecondOrder);
        let changed = chain(10, 63);
        comp.compress(&changed, 10).unwrap();
        assert_eq!(comp.context.state, CompressorState::FirstOrder);
    }

    #[test]
    fn fragmented_packet_rejected() {
        let first = chain(0, 64);
        let mut comp = new_compressor(&first);
        comp.compress(&first, 0).unwrap();
        let mut frag = chain(1, 64);
        frag.outer_ip.fragment_offset = 10;
        assert_eq!(comp.compress(&frag, 1), Err(CompressError::Fragmented));
    }

    #[test]
    fn ack_feedback_trims_windows() {
        let first = chain(0, 64);
        let mut comp = new_compressor(&first);
        comp.compress(&first, 0).unwrap();
        for i in 1..4u16 {
            comp.compress(&chain(i, 64), i as u64).unwrap();
        }
        let before = comp.context.sn_window.len();
        comp.handle_feedback(&Feedback2 {
            ack_type: AckType::Ack,
            mode: Mode::Unidirectional,
            sn: comp.context.sn,
            options: vec![],
        });
        assert!(comp.context.sn_window.len() <= before);
    }

    #[test]
    fn nack_drops_state_to_fo() {
        let first = chain(0, 64);
        let mut comp = new_compressor(&first);
        comp.compress(&first, 0).unwrap();
        for i in 1..20u16 {
            comp.compress(&chain(i, 64), i as u64).unwrap();
        }
        assert_eq!(comp.context.state, CompressorState::SecondOrder);
        comp.handle_feedback(&Feedback2 {
            ack_type: AckType::Nack,
            mode: Mode::Unidirectional,
            sn: comp.context.sn,
            options: vec![],
        });
        assert_eq!(comp.context.state, CompressorState::FirstOrder);
    }
}
