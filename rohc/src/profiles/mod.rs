//! Profile dispatch: "a table of function capabilities... one implementer
//! per profile" (spec §9 design notes), plus the IPv4 static/dynamic
//! chain codec both implemented profiles share.

mod ip;
mod udp;

use crate::bits::{BitReader, BitWriter};
use crate::error::RohcError;
use crate::types::{HeaderChain, Ipv4Header, ProfileId, UdpHeader};

pub use ip::IpOnlyProfile;
pub use udp::UdpProfile;

/// Fixed-width size of one IPv4 static chain fragment, bytes (spec §6:
/// version/pad nibbles + protocol + 4-byte src + 4-byte dst).
pub const IP_STATIC_CHAIN_LEN: usize = 10;
/// Fixed-width size of one IPv4 dynamic chain fragment, bytes (TOS, TTL,
/// 2-byte IP-ID, flags octet, empty extension-header-list octet).
pub const IP_DYNAMIC_CHAIN_LEN: usize = 6;
/// UDP static chain: 2-byte source port + 2-byte destination port.
pub const UDP_STATIC_CHAIN_LEN: usize = 4;
/// UDP dynamic chain: 2-byte checksum.
pub const UDP_DYNAMIC_CHAIN_LEN: usize = 2;

const IPPROTO_IPIP: u8 = 4;

/// One IP header's static fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIpFields {
    pub protocol: u8,
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

/// One IP header's dynamic fields, including the RND/NBO classification
/// decided by the caller (compressor context or decompressor context).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicIpFields {
    pub tos: u8,
    pub ttl: u8,
    pub ip_id: u16,
    pub df: bool,
    pub rnd: bool,
    pub nbo: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticUdpFields {
    pub src_port: u16,
    pub dst_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicUdpFields {
    pub checksum: u16,
}

/// The full static chain of an IR packet: one or two IP fragments plus
/// an optional transport fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticChain {
    pub outer_ip: StaticIpFields,
    pub inner_ip: Option<StaticIpFields>,
    pub udp: Option<StaticUdpFields>,
}

impl StaticChain {
    pub fn has_two_ip_headers(&self) -> bool {
        self.inner_ip.is_some()
    }
}

/// The full dynamic chain of an IR / IR-DYN packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicChain {
    pub outer_ip: DynamicIpFields,
    pub inner_ip: Option<DynamicIpFields>,
    pub udp: Option<DynamicUdpFields>,
}

pub fn encode_ip_static(w: &mut BitWriter, f: &StaticIpFields) {
    // Version nibble (4, IPv4) + a zero pad nibble, per spec §6.
    w.write_bits(4, 4);
    w.write_bits(0, 4);
    w.write_u8(f.protocol);
    w.write_bytes(&f.src);
    w.write_bytes(&f.dst);
}

pub fn decode_ip_static(r: &mut BitReader) -> Result<StaticIpFields, RohcError> {
    let version = r.read_bits(4)?;
    let _pad = r.read_bits(4)?;
    if version != 4 {
        return Err(RohcError::Malformed(format!(
            "unsupported IP version {version} in static chain"
        )));
    }
    let protocol = r.read_u8()?;
    let src = r.read_bytes(4)?.try_into().expect("4 bytes read");
    let dst = r.read_bytes(4)?.try_into().expect("4 bytes read");
    Ok(StaticIpFields { protocol, src, dst })
}

pub fn encode_ip_dynamic(w: &mut BitWriter, f: &DynamicIpFields) {
    w.write_u8(f.tos);
    w.write_u8(f.ttl);
    w.write_u16(f.ip_id);
    let flags = ((f.df as u8) << 7) | ((f.rnd as u8) << 6) | ((f.nbo as u8) << 5);
    w.write_u8(flags);
    // Generic extension header list: empty, spec §6.
    w.write_u8(0);
}

pub fn decode_ip_dynamic(r: &mut BitReader) -> Result<DynamicIpFields, RohcError> {
    let tos = r.read_u8()?;
    let ttl = r.read_u8()?;
    let ip_id = r.read_u16()?;
    let flags = r.read_u8()?;
    let ext_list_len = r.read_u8()?;
    if ext_list_len != 0 {
        return Err(RohcError::Malformed(
            "non-empty generic extension header list is not supported".into(),
        ));
    }
    Ok(DynamicIpFields {
        tos,
        ttl,
        ip_id,
        df: flags & 0x80 != 0,
        rnd: flags & 0x40 != 0,
        nbo: flags & 0x20 != 0,
    })
}

pub fn encode_udp_static(w: &mut BitWriter, f: &StaticUdpFields) {
    w.write_u16(f.src_port);
    w.write_u16(f.dst_port);
}

pub fn decode_udp_static(r: &mut BitReader) -> Result<StaticUdpFields, RohcError> {
    Ok(StaticUdpFields {
        src_port: r.read_u16()?,
        dst_port: r.read_u16()?,
    })
}

pub fn encode_udp_dynamic(w: &mut BitWriter, f: &DynamicUdpFields) {
    w.write_u16(f.checksum);
}

pub fn decode_udp_dynamic(r: &mut BitReader) -> Result<DynamicUdpFields, RohcError> {
    Ok(DynamicUdpFields {
        checksum: r.read_u16()?,
    })
}

/// Reads one or two chained IP static fragments, recursing into a second
/// fragment whenever the first's protocol is IP-in-IP.
pub fn decode_ip_static_chain(
    r: &mut BitReader,
) -> Result<(StaticIpFields, Option<StaticIpFields>), RohcError> {
    let outer = decode_ip_static(r)?;
    if outer.protocol == IPPROTO_IPIP {
        let inner = decode_ip_static(r)?;
        Ok((outer, Some(inner)))
    } else {
        Ok((outer, None))
    }
}

pub fn encode_ip_static_chain(w: &mut BitWriter, outer: &StaticIpFields, inner: Option<&StaticIpFields>) {
    encode_ip_static(w, outer);
    if let Some(inner) = inner {
        encode_ip_static(w, inner);
    }
}

pub fn decode_ip_dynamic_chain(
    r: &mut BitReader,
    two_ip_headers: bool,
) -> Result<(DynamicIpFields, Option<DynamicIpFields>), RohcError> {
    let outer = decode_ip_dynamic(r)?;
    if two_ip_headers {
        let inner = decode_ip_dynamic(r)?;
        Ok((outer, Some(inner)))
    } else {
        Ok((outer, None))
    }
}

pub fn encode_ip_dynamic_chain(w: &mut BitWriter, outer: &DynamicIpFields, inner: Option<&DynamicIpFields>) {
    encode_ip_dynamic(w, outer);
    if let Some(inner) = inner {
        encode_ip_dynamic(w, inner);
    }
}

/// Profile-specific static/dynamic chain codec and packet-membership
/// test. Mirrors `c_udp_create`/`c_udp_check_context`'s role in the
/// reference source, generalized to a trait so the compressor/
/// decompressor cores stay profile-agnostic.
pub trait Profile: Send + Sync {
    fn id(&self) -> ProfileId;

    /// Whether `chain` is a packet this profile compresses (spec §3
    /// "check-packet-belongs?").
    fn matches(&self, chain: &HeaderChain) -> bool;

    fn encode_static_chain(&self, w: &mut BitWriter, chain: &StaticChain);
    fn decode_static_chain(&self, r: &mut BitReader) -> Result<StaticChain, RohcError>;

    fn encode_dynamic_chain(&self, w: &mut BitWriter, chain: &DynamicChain);
    fn decode_dynamic_chain(
        &self,
        r: &mut BitReader,
        two_ip_headers: bool,
    ) -> Result<DynamicChain, RohcError>;

    /// Static chain length in bytes, spec §3 "detect-IR-size".
    fn static_chain_len(&self, two_ip_headers: bool) -> usize;
    /// Dynamic chain length in bytes, spec §3 "detect-IR-DYN-size".
    fn dynamic_chain_len(&self, two_ip_headers: bool) -> usize;

    /// Builds the static/dynamic chain representation from an
    /// uncompressed packet plus the freshly classified RND/NBO flags
    /// for each IP header present.
    fn build_chains(
        &self,
        chain: &HeaderChain,
        outer_rnd: bool,
        outer_nbo: bool,
        inner_rnd: bool,
        inner_nbo: bool,
    ) -> (StaticChain, DynamicChain);

    /// Reassembles the uncompressed header chain from decoded static +
    /// dynamic fields.
    fn reconstruct(&self, static_chain: &StaticChain, dynamic_chain: &DynamicChain) -> HeaderChain;
}

pub(super) fn ip_fields(header: &Ipv4Header, rnd: bool, nbo: bool) -> (StaticIpFields, DynamicIpFields) {
    (
        StaticIpFields {
            protocol: header.protocol,
            src: header.src,
            dst: header.dst,
        },
        DynamicIpFields {
            tos: header.tos,
            ttl: header.ttl,
            ip_id: header.identification,
            df: header.df,
            rnd,
            nbo,
        },
    )
}

pub(super) fn ip_from_fields(s: &StaticIpFields, d: &DynamicIpFields) -> Ipv4Header {
    Ipv4Header {
        tos: d.tos,
        identification: d.ip_id,
        df: d.df,
        mf: false,
        fragment_offset: 0,
        ttl: d.ttl,
        protocol: s.protocol,
        src: s.src,
        dst: s.dst,
    }
}

pub(super) fn udp_from_fields(s: &StaticUdpFields, d: &DynamicUdpFields) -> UdpHeader {
    UdpHeader {
        src_port: s.src_port,
        dst_port: s.dst_port,
        checksum: d.checksum,
    }
}

/// Looks up the implemented profile for a wire profile id. Mirrors the
/// reference source's `C_NUM_PROFILES` dispatch table, restricted to the
/// two profiles this core implements (spec §1).
pub fn lookup(id: ProfileId) -> Option<&'static dyn Profile> {
    match id {
        ProfileId::Udp => Some(&UdpProfile),
        ProfileId::IpOnly => Some(&IpOnlyProfile),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_static_roundtrip() {
        let f = StaticIpFields {
            protocol: 17,
            src: [1, 2, 3, 4],
            dst: [5, 6, 7, 8],
        };
        let mut w = BitWriter::new();
        encode_ip_static(&mut w, &f);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), IP_STATIC_CHAIN_LEN);
        let mut r = BitReader::new(&bytes);
        assert_eq!(decode_ip_static(&mut r).unwrap(), f);
    }

    #[test]
    fn ip_dynamic_roundtrip() {
        let f = DynamicIpFields {
            tos: 7,
            ttl: 63,
            ip_id: 0xbeef,
            df: true,
            rnd: false,
            nbo: true,
        };
        let mut w = BitWriter::new();
        encode_ip_dynamic(&mut w, &f);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), IP_DYNAMIC_CHAIN_LEN);
        let mut r = BitReader::new(&bytes);
        assert_eq!(decode_ip_dynamic(&mut r).unwrap(), f);
    }

    #[test]
    fn two_ip_header_static_chain_detected_via_ipip_protocol() {
        let outer = StaticIpFields {
            protocol: IPPROTO_IPIP,
            src: [10, 0, 0, 1],
            dst: [10, 0, 0, 2],
        };
        let inner = StaticIpFields {
            protocol: 17,
            src: [192, 168, 0, 1],
            dst: [192, 168, 0, 2],
        };
        let mut w = BitWriter::new();
        encode_ip_static_chain(&mut w, &outer, Some(&inner));
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        let (decoded_outer, decoded_inner) = decode_ip_static_chain(&mut r).unwrap();
        assert_eq!(decoded_outer, outer);
        assert_eq!(decoded_inner, Some(inner));
    }

    #[test]
    fn lookup_resolves_implemented_profiles_only() {
        assert!(lookup(ProfileId::Udp).is_some());
        assert!(lookup(ProfileId::IpOnly).is_some());
        assert!(lookup(ProfileId::Rtp).is_none());
    }
}
