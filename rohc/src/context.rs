//! Per-CID context state, spec §3 "Data Model".
//!
//! A context is split between the compressor's view
//! ([`CompressorContext`]) and the decompressor's view
//! ([`DecompressorContext`]); they are not the same struct because the
//! two sides track different things (the compressor keeps sliding
//! windows of *candidate* reference values, the decompressor only ever
//! needs its single last-accepted header).

use crate::config::RohcConfig;
use crate::types::{Ipv4Header, Mode, ProfileId, UdpHeader};
use crate::wlsb::{LsbShift, WlsbWindow};

/// Compressor state machine, RFC 3095 §4.3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressorState {
    InitAndRefresh,
    FirstOrder,
    SecondOrder,
}

/// Decompressor state machine, RFC 3095 §4.3.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompressorState {
    NoContext,
    StaticContext,
    FullContext,
}

/// Per-IP-header tracked state shared by outer and (optional) inner
/// headers, compressor side.
#[derive(Debug, Clone)]
pub struct HeaderInfo {
    pub last: Ipv4Header,
    pub rnd: bool,
    pub nbo: bool,
    /// `id_delta = IPID - SN`, two's-complement.
    pub id_delta: i32,
    pub tos_count: u32,
    pub ttl_count: u32,
    pub df_count: u32,
    pub protocol_count: u32,
    pub rnd_count: u32,
    pub nbo_count: u32,
    pub ip_id_window: WlsbWindow,
}

impl HeaderInfo {
    pub fn new(header: Ipv4Header, window_width: usize, max_fo_count: u32) -> Self {
        Self {
            last: header,
            // A freshly created context has no behavior history yet;
            // nbo=1/rnd=0 is the optimistic default, corrected on the
            // very first diff.
            rnd: false,
            nbo: true,
            id_delta: 0,
            tos_count: max_fo_count,
            ttl_count: max_fo_count,
            df_count: max_fo_count,
            protocol_count: max_fo_count,
            rnd_count: max_fo_count,
            nbo_count: max_fo_count,
            ip_id_window: WlsbWindow::new(16, window_width, LsbShift::IpId),
        }
    }

    /// Increments a change counter, capping at `max`.
    pub fn bump(counter: &mut u32, max: u32) {
        if *counter < max {
            *counter += 1;
        }
    }
}

/// UDP-specific context tail (profile 0x0002).
#[derive(Debug, Clone)]
pub struct UdpContext {
    pub last: UdpHeader,
    pub checksum_change_count: u32,
}

/// The compressor's view of one flow.
#[derive(Debug, Clone)]
pub struct CompressorContext {
    pub cid: u16,
    pub profile: ProfileId,
    pub mode: Mode,
    pub state: CompressorState,
    pub sn: u16,
    pub outer: HeaderInfo,
    pub inner: Option<HeaderInfo>,
    pub udp: Option<UdpContext>,
    pub sn_window: WlsbWindow,
    pub ir_count: u32,
    pub fo_count: u32,
    pub so_count: u32,
    pub ir_dyn_count: u32,
    pub go_back_fo_count: u32,
    pub go_back_ir_count: u32,
    pub first_used: u64,
    pub latest_used: u64,
}

impl CompressorContext {
    pub fn new(
        cid: u16,
        profile: ProfileId,
        mode: Mode,
        outer: Ipv4Header,
        inner: Option<Ipv4Header>,
        udp: Option<UdpHeader>,
        cfg: &RohcConfig,
        now: u64,
    ) -> Self {
        Self {
            cid,
            profile,
            mode,
            state: CompressorState::InitAndRefresh,
            sn: 0,
            outer: HeaderInfo::new(outer, cfg.window_width, cfg.max_fo_count),
            inner: inner.map(|h| HeaderInfo::new(h, cfg.window_width, cfg.max_fo_count)),
            udp: udp.map(|u| UdpContext {
                last: u,
                checksum_change_count: cfg.max_fo_count,
            }),
            sn_window: WlsbWindow::new(16, cfg.window_width, LsbShift::Sn),
            ir_count: 0,
            fo_count: 0,
            so_count: 0,
            ir_dyn_count: 0,
            go_back_fo_count: 0,
            go_back_ir_count: 0,
            first_used: now,
            latest_used: now,
        }
    }

    pub fn touch(&mut self, now: u64) {
        self.latest_used = now;
    }
}

/// Running counters mirroring `struct d_context`'s statistics fields
/// (spec §3 supplement in SPEC_FULL.md §3).
#[derive(Debug, Clone, Copy, Default)]
pub struct DecompressorStats {
    pub num_recv_packets: u64,
    pub num_recv_ir: u64,
    pub num_recv_ir_dyn: u64,
    pub num_decomp_failures: u64,
    pub num_decomp_repairs: u64,
    pub num_sent_feedbacks: u64,
}

/// The decompressor's view of one flow.
#[derive(Debug, Clone)]
pub struct DecompressorContext {
    pub cid: u16,
    pub profile: ProfileId,
    pub mode: Mode,
    pub state: DecompressorState,
    pub sn: u16,
    pub outer: Ipv4Header,
    pub outer_rnd: bool,
    pub outer_nbo: bool,
    pub outer_id_delta: i32,
    pub inner: Option<Ipv4Header>,
    pub inner_rnd: bool,
    pub inner_nbo: bool,
    pub inner_id_delta: i32,
    pub udp: Option<UdpHeader>,
    pub stats: DecompressorStats,
    /// Consecutive CRC failures since the last success, the basis for
    /// state downgrade (spec §4.8).
    pub consecutive_failures: u32,
    pub first_used: u64,
    pub latest_used: u64,
}

impl DecompressorContext {
    pub fn new(cid: u16, profile: ProfileId, mode: Mode, now: u64) -> Self {
        Self {
            cid,
            profile,
            mode,
            state: DecompressorState::NoContext,
            sn: 0,
            outer: Ipv4Header {
                tos: 0,
                identification: 0,
                df: false,
                mf: false,
                fragment_offset: 0,
                ttl: 0,
                protocol: 0,
                src: [0; 4],
                dst: [0; 4],
            },
            outer_rnd: false,
            outer_nbo: true,
            outer_id_delta: 0,
            inner: None,
            inner_rnd: false,
            inner_nbo: true,
            inner_id_delta: 0,
            udp: None,
            stats: DecompressorStats::default(),
            consecutive_failures: 0,
            first_used: now,
            latest_used: now,
        }
    }

    pub fn touch(&mut self, now: u64) {
        self.latest_used = now;
    }
}
