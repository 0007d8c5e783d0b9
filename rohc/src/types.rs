//! Shared domain types: context identifiers, profile ids, operating
//! modes and the uncompressed header structs the generic engine diffs.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Context Identifier. `0..=15` in small-CID mode (implicit for CID 0,
/// carried in a one-byte Add-CID prefix otherwise), `0..=16383` in
/// large-CID mode (SDVL-encoded).
pub type Cid = u16;

/// Largest CID representable in small-CID mode.
pub const MAX_SMALL_CID: Cid = 15;
/// Largest CID representable in large-CID mode.
pub const MAX_LARGE_CID: Cid = 16383;

/// Which CID space a compressor/decompressor pair has negotiated. This
/// is a per-association choice made by the framework that owns the
/// channel (spec §6); the codec only needs to know which framing to
/// apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CidMode {
    /// CIDs `0..=15`; CID 0 is implicit, others carried by a one-byte
    /// Add-CID prefix.
    Small,
    /// CIDs `0..=16383`, SDVL-encoded after the packet-type octet.
    Large,
}

/// RFC-assigned ROHC profile numbers. Only the four named in the hard
/// core are implemented; others are recognized so a mismatch reports a
/// sensible error instead of "unknown profile".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProfileId {
    /// 0x0000 — Uncompressed.
    Uncompressed,
    /// 0x0001 — RTP (out of scope: no static/dynamic chain is defined
    /// for it here, recognized only for correct profile-mismatch errors).
    Rtp,
    /// 0x0002 — UDP (IP + UDP).
    Udp,
    /// 0x0003 — ESP (out of scope).
    Esp,
    /// 0x0004 — IP-only.
    IpOnly,
    /// 0x0008 — UDP-Lite.
    UdpLite,
}

impl ProfileId {
    pub const fn wire_value(self) -> u16 {
        match self {
            ProfileId::Uncompressed => 0x0000,
            ProfileId::Rtp => 0x0001,
            ProfileId::Udp => 0x0002,
            ProfileId::Esp => 0x0003,
            ProfileId::IpOnly => 0x0004,
            ProfileId::UdpLite => 0x0008,
        }
    }

    pub const fn from_wire_value(v: u16) -> Option<Self> {
        match v {
            0x0000 => Some(ProfileId::Uncompressed),
            0x0001 => Some(ProfileId::Rtp),
            0x0002 => Some(ProfileId::Udp),
            0x0003 => Some(ProfileId::Esp),
            0x0004 => Some(ProfileId::IpOnly),
            0x0008 => Some(ProfileId::UdpLite),
            _ => None,
        }
    }

    /// Whether this core implements compression/decompression for the
    /// profile (only UDP and IP-only — see spec §1).
    pub const fn is_implemented(self) -> bool {
        matches!(self, ProfileId::Udp | ProfileId::IpOnly)
    }
}

/// Operating mode, RFC 3095 §4.3. Only U-mode's periodic downward state
/// transitions are modeled; O-mode and R-mode differ chiefly in how
/// aggressively the compressor trusts positive vs. only negative
/// feedback, which this core exposes as the `mode` field without
/// building the full ACK-driven confirmation machinery the bidirectional
/// modes imply beyond feedback processing already specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    /// Unidirectional: periodic downward transitions drive robustness.
    Unidirectional,
    /// Bidirectional Optimistic: transitions are feedback-driven.
    BidirectionalOptimistic,
    /// Bidirectional Reliable.
    BidirectionalReliable,
}

/// A minimal IPv4 header, carrying only the fields ROHC's IP static/
/// dynamic chains need. `identification` is kept in host byte order
/// throughout this crate; callers parsing real wire bytes convert once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub tos: u8,
    pub identification: u16,
    /// The `DF` flag (don't fragment).
    pub df: bool,
    /// `MF` (more fragments); a non-zero `fragment_offset` or `mf` marks
    /// the packet fragmented, which every profile here rejects.
    pub mf: bool,
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

impl Ipv4Header {
    pub fn is_fragmented(&self) -> bool {
        self.mf || self.fragment_offset != 0
    }
}

/// A minimal UDP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub checksum: u16,
}

/// The uncompressed headers of a single packet as seen by the generic
/// engine: one or two IP headers (the inner one present for IP-in-IP
/// tunnels) and an optional UDP header when the packet's immediate
/// payload is the final header for the flow's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderChain {
    pub outer_ip: Ipv4Header,
    pub inner_ip: Option<Ipv4Header>,
    pub udp: Option<UdpHeader>,
}

impl HeaderChain {
    pub fn has_two_ip_headers(&self) -> bool {
        self.inner_ip.is_some()
    }

    /// The innermost IP header the flow terminates at (used for protocol
    /// matching and the "last" IP header's static/dynamic chain).
    pub fn last_ip(&self) -> &Ipv4Header {
        self.inner_ip.as_ref().unwrap_or(&self.outer_ip)
    }
}

/// Identifies a flow for context lookup: the tuple of fields a profile's
/// static chain covers and that must match bit-for-bit for a packet to
/// belong to an existing context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub profile: ProfileId,
    pub src: [u8; 4],
    pub dst: [u8; 4],
    pub protocol: u8,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
}
