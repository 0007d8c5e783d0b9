//! Ethernet + IPv4 (+ UDP) framing around the codec core's
//! [`rohc::HeaderChain`], mirroring the synthetic-frame builder in the
//! reference workbench's SCHC compressor/observer but in both
//! directions: parsing real captured frames into the header chain the
//! compressor diffs, and rebuilding a frame from a decompressed chain.

use pnet_packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet_packet::ip::IpNextHeaderProtocol;
use pnet_packet::ipv4::{self, Ipv4Packet, MutableIpv4Packet};
use pnet_packet::udp::{self, MutableUdpPacket, UdpPacket};
use pnet_packet::Packet;

use rohc::{FlowKey, HeaderChain, Ipv4Header, ProfileId, UdpHeader};

const ETH_HEADER_LEN: usize = 14;
const IPV4_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;
const IPPROTO_UDP: u8 = 17;

/// DF/MF bits of the IPv4 flags field.
const FLAG_DF: u8 = 0b010;
const FLAG_MF: u8 = 0b001;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short to carry an Ethernet header")]
    ShortEthernet,
    #[error("frame is not IPv4 (ethertype {0:#06x})")]
    NotIpv4(u16),
    #[error("truncated or malformed IPv4 header")]
    MalformedIpv4,
    #[error("IPv4 payload protocol {0} is not UDP; only UDP flows are framed here")]
    NotUdp(u8),
    #[error("truncated or malformed UDP header")]
    MalformedUdp,
}

/// One parsed Ethernet/IPv4/UDP frame: the [`HeaderChain`] the codec
/// core diffs, the application payload that rides untouched, and the
/// [`FlowKey`] used to find or create this flow's compression context.
pub struct ParsedFrame {
    pub chain: HeaderChain,
    pub payload: Vec<u8>,
    pub flow_key: FlowKey,
}

/// Parses a captured Ethernet frame down to its IPv4/UDP headers.
/// Rejects anything that is not a plain (non-fragmented) IPv4-over-UDP
/// frame; every profile this workbench drives needs exactly that
/// (spec §7 `Fragmented`/`ProfileMismatch`).
pub fn parse_frame(frame: &[u8]) -> Result<ParsedFrame, FrameError> {
    let eth = EthernetPacket::new(frame).ok_or(FrameError::ShortEthernet)?;
    if eth.get_ethertype() != EtherTypes::Ipv4 {
        return Err(FrameError::NotIpv4(eth.get_ethertype().0));
    }
    let ip = Ipv4Packet::new(eth.payload()).ok_or(FrameError::MalformedIpv4)?;
    if ip.get_next_level_protocol() != IpNextHeaderProtocol::new(IPPROTO_UDP) {
        return Err(FrameError::NotUdp(ip.get_next_level_protocol().0));
    }
    let flags = ip.get_flags();
    let outer_ip = Ipv4Header {
        tos: (ip.get_dscp() << 2) | ip.get_ecn(),
        identification: ip.get_identification(),
        df: flags & FLAG_DF != 0,
        mf: flags & FLAG_MF != 0,
        fragment_offset: ip.get_fragment_offset(),
        ttl: ip.get_ttl(),
        protocol: ip.get_next_level_protocol().0,
        src: ip.get_source().octets(),
        dst: ip.get_destination().octets(),
    };

    let udp = UdpPacket::new(ip.payload()).ok_or(FrameError::MalformedUdp)?;
    let udp_header = UdpHeader {
        src_port: udp.get_source(),
        dst_port: udp.get_destination(),
        checksum: udp.get_checksum(),
    };
    let payload = udp.payload().to_vec();

    let flow_key = FlowKey {
        profile: ProfileId::Udp,
        src: outer_ip.src,
        dst: outer_ip.dst,
        protocol: outer_ip.protocol,
        src_port: Some(udp_header.src_port),
        dst_port: Some(udp_header.dst_port),
    };

    Ok(ParsedFrame {
        chain: HeaderChain { outer_ip, inner_ip: None, udp: Some(udp_header) },
        payload,
        flow_key,
    })
}

/// Rebuilds an Ethernet/IPv4/UDP frame from a decompressed
/// [`HeaderChain`] and its payload. MAC addresses are left zeroed: this
/// workbench only round-trips header fields, it does not model a real
/// link layer.
pub fn build_frame(chain: &HeaderChain, payload: &[u8]) -> Vec<u8> {
    let udp = chain.udp.unwrap_or(UdpHeader { src_port: 0, dst_port: 0, checksum: 0 });
    let udp_len = UDP_HEADER_LEN + payload.len();
    let ip_len = IPV4_HEADER_LEN + udp_len;
    let total_len = ETH_HEADER_LEN + ip_len;

    let mut buffer = vec![0u8; total_len];
    {
        let mut eth = MutableEthernetPacket::new(&mut buffer).expect("buffer sized for ethernet header");
        eth.set_ethertype(EtherTypes::Ipv4);
    }

    let src_ip = chain.outer_ip.src.into();
    let dst_ip = chain.outer_ip.dst.into();
    {
        let ip_buf = &mut buffer[ETH_HEADER_LEN..];
        let mut udp_writer = MutableUdpPacket::new(&mut ip_buf[IPV4_HEADER_LEN..]).expect("buffer sized for udp header");
        udp_writer.set_source(udp.src_port);
        udp_writer.set_destination(udp.dst_port);
        udp_writer.set_length(udp_len as u16);
        udp_writer.set_payload(payload);
        let checksum = udp::ipv4_checksum(&udp_writer.to_immutable(), &src_ip, &dst_ip);
        udp_writer.set_checksum(checksum);
    }
    {
        let ip_buf = &mut buffer[ETH_HEADER_LEN..];
        let mut ip_writer = MutableIpv4Packet::new(ip_buf).expect("buffer sized for ipv4 header");
        ip_writer.set_version(4);
        ip_writer.set_header_length(5);
        ip_writer.set_dscp(chain.outer_ip.tos >> 2);
        ip_writer.set_ecn(chain.outer_ip.tos & 0x3);
        ip_writer.set_total_length(ip_len as u16);
        ip_writer.set_identification(chain.outer_ip.identification);
        let flags = (chain.outer_ip.df as u8 * FLAG_DF) | (chain.outer_ip.mf as u8 * FLAG_MF);
        ip_writer.set_flags(flags);
        ip_writer.set_fragment_offset(chain.outer_ip.fragment_offset);
        ip_writer.set_ttl(chain.outer_ip.ttl);
        ip_writer.set_next_level_protocol(IpNextHeaderProtocol::new(chain.outer_ip.protocol));
        ip_writer.set_source(src_ip);
        ip_writer.set_destination(dst_ip);
        let checksum = ipv4::checksum(&ip_writer.to_immutable());
        ip_writer.set_checksum(checksum);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame(id: u16, payload: &[u8]) -> Vec<u8> {
        let chain = HeaderChain {
            outer_ip: Ipv4Header {
                tos: 0,
                identification: id,
                df: true,
                mf: false,
                fragment_offset: 0,
                ttl: 64,
                protocol: IPPROTO_UDP,
                src: [10, 0, 0, 1],
                dst: [10, 0, 0, 2],
            },
            inner_ip: None,
            udp: Some(UdpHeader { src_port: 5000, dst_port: 6000, checksum: 0 }),
        };
        build_frame(&chain, payload)
    }

    #[test]
    fn parse_roundtrips_build() {
        let frame = sample_frame(42, b"hello");
        let parsed = parse_frame(&frame).unwrap();
        assert_eq!(parsed.chain.outer_ip.identification, 42);
        assert_eq!(parsed.chain.udp.unwrap().src_port, 5000);
        assert_eq!(parsed.payload, b"hello");
    }

    #[test]
    fn non_ipv4_ethertype_rejected() {
        let mut frame = sample_frame(1, b"x");
        frame[12] = 0x86;
        frame[13] = 0xdd; // IPv6 ethertype
        assert_eq!(parse_frame(&frame), Err(FrameError::NotIpv4(0x86dd)));
    }

    #[test]
    fn non_udp_protocol_rejected() {
        let mut frame = sample_frame(1, b"x");
        frame[ETH_HEADER_LEN + 9] = 6; // TCP
        // Recompute nothing: parse should fail before trusting the checksum.
        assert_eq!(parse_frame(&frame), Err(FrameError::NotUdp(6)));
    }
}
