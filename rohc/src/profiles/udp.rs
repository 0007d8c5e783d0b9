//! Profile 0x0002, UDP: grounded on `c_udp.c`'s `c_udp_create`/
//! `c_udp_check_context`/`udp_code_static_udp_part`/
//! `udp_code_dynamic_udp_part`.

use super::{
    decode_ip_dynamic_chain, decode_ip_static_chain, decode_udp_dynamic, decode_udp_static,
    encode_ip_dynamic_chain, encode_ip_static_chain, encode_udp_dynamic, encode_udp_static,
    ip_fields, ip_from_fields, udp_from_fields, DynamicChain, Profile, StaticChain,
    IP_DYNAMIC_CHAIN_LEN, IP_STATIC_CHAIN_LEN, UDP_DYNAMIC_CHAIN_LEN, UDP_STATIC_CHAIN_LEN,
};
use crate::bits::{BitReader, BitWriter};
use crate::error::RohcError;
use crate::types::{HeaderChain, ProfileId};

const IPPROTO_UDP: u8 = 17;

pub struct UdpProfile;

impl Profile for UdpProfile {
    fn id(&self) -> ProfileId {
        ProfileId::Udp
    }

    fn matches(&self, chain: &HeaderChain) -> bool {
        chain.udp.is_some() && chain.last_ip().protocol == IPPROTO_UDP && !chain.last_ip().is_fragmented()
    }

    fn encode_static_chain(&self, w: &mut BitWriter, chain: &StaticChain) {
        encode_ip_static_chain(w, &chain.outer_ip, chain.inner_ip.as_ref());
        encode_udp_static(w, chain.udp.as_ref().expect("UDP profile always has a UDP static fragment"));
    }

    fn decode_static_chain(&self, r: &mut BitReader) -> Result<StaticChain, RohcError> {
        let (outer_ip, inner_ip) = decode_ip_static_chain(r)?;
        let last = inner_ip.as_ref().unwrap_or(&outer_ip);
        if last.protocol != IPPROTO_UDP {
            return Err(RohcError::Malformed(format!(
                "UDP profile requires protocol 17 at the last IP header, found {}",
                last.protocol
            )));
        }
        let udp = decode_udp_static(r)?;
        Ok(StaticChain {
            outer_ip,
            inner_ip,
            udp: Some(udp),
        })
    }

    fn encode_dynamic_chain(&self, w: &mut BitWriter, chain: &DynamicChain) {
        encode_ip_dynamic_chain(w, &chain.outer_ip, chain.inner_ip.as_ref());
        encode_udp_dynamic(w, chain.udp.as_ref().expect("UDP profile always has a UDP dynamic fragment"));
    }

    fn decode_dynamic_chain(
        &self,
        r: &mut BitReader,
        two_ip_headers: bool,
    ) -> Result<DynamicChain, RohcError> {
        let (outer_ip, inner_ip) = decode_ip_dynamic_chain(r, two_ip_headers)?;
        let udp = decode_udp_dynamic(r)?;
        Ok(DynamicChain {
            outer_ip,
            inner_ip,
            udp: Some(udp),
        })
    }

    fn static_chain_len(&self, two_ip_headers: bool) -> usize {
        IP_STATIC_CHAIN_LEN * if two_ip_headers { 2 } else { 1 } + UDP_STATIC_CHAIN_LEN
    }

    fn dynamic_chain_len(&self, two_ip_headers: bool) -> usize {
        IP_DYNAMIC_CHAIN_LEN * if two_ip_headers { 2 } else { 1 } + UDP_DYNAMIC_CHAIN_LEN
    }

    fn build_chains(
        &self,
        chain: &HeaderChain,
        outer_rnd: bool,
        outer_nbo: bool,
        inner_rnd: bool,
        inner_nbo: bool,
    ) -> (StaticChain, DynamicChain) {
        let (outer_s, outer_d) = ip_fields(&chain.outer_ip, outer_rnd, outer_nbo);
        let inner = chain
            .inner_ip
            .map(|h| ip_fields(&h, inner_rnd, inner_nbo));
        let udp = chain.udp.expect("UDP profile requires a UDP header");
        let static_chain = StaticChain {
            outer_ip: outer_s,
            inner_ip: inner.map(|(s, _)| s),
            udp: Some(super::StaticUdpFields {
                src_port: udp.src_port,
                dst_port: udp.dst_port,
            }),
        };
        let dynamic_chain = DynamicChain {
            outer_ip: outer_d,
            inner_ip: inner.map(|(_, d)| d),
            udp: Some(super::DynamicUdpFields { checksum: udp.checksum }),
        };
        (static_chain, dynamic_chain)
    }

    fn reconstruct(&self, static_chain: &StaticChain, dynamic_chain: &DynamicChain) -> HeaderChain {
        let outer_ip = ip_from_fields(&static_chain.outer_ip, &dynamic_chain.outer_ip);
        let inner_ip = match (&static_chain.inner_ip, &dynamic_chain.inner_ip) {
            (Some(s), Some(d)) => Some(ip_from_fields(s, d)),
            _ => None,
        };
        let udp = udp_from_fields(
            static_chain.udp.as_ref().expect("UDP static fragment present"),
            dynamic_chain.udp.as_ref().expect("UDP dynamic fragment present"),
        );
        HeaderChain {
            outer_ip,
            inner_ip,
            udp: Some(udp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Ipv4Header, UdpHeader};

    fn sample_chain() -> HeaderChain {
        HeaderChain {
            outer_ip: Ipv4Header {
                tos: 0,
                identification: 1,
                df: true,
                mf: false,
                fragment_offset: 0,
                ttl: 64,
                protocol: IPPROTO_UDP,
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

    #[test]
    fn matches_requires_udp_and_no_fragmentation() {
        let profile = UdpProfile;
        assert!(profile.matches(&sample_chain()));
        let mut fragmented = sample_chain();
        fragmented.outer_ip.fragment_offset = 10;
        assert!(!profile.matches(&fragmented));
        let mut no_udp = sample_chain();
        no_udp.udp = None;
        assert!(!profile.matches(&no_udp));
    }

    #[test]
    fn build_and_reconstruct_roundtrip() {
        let profile = UdpProfile;
        let chain = sample_chain();
        let (static_chain, dynamic_chain) = profile.build_chains(&chain, false, true, false, true);
        let rebuilt = profile.reconstruct(&static_chain, &dynamic_chain);
        assert_eq!(rebuilt, chain);
    }

    #[test]
    fn static_and_dynamic_chain_wire_roundtrip() {
        let profile = UdpProfile;
        let chain = sample_chain();
        let (static_chain, dynamic_chain) = profile.build_chains(&chain, false, true, false, true);

        let mut w = BitWriter::new();
        profile.encode_static_chain(&mut w, &static_chain);
        let static_bytes = w.into_bytes();
        assert_eq!(static_bytes.len(), profile.static_chain_len(false));
        let mut r = BitReader::new(&static_bytes);
        let decoded_static = profile.decode_static_chain(&mut r).unwrap();
        assert_eq!(decoded_static, static_chain);

        let mut w = BitWriter::new();
        profile.encode_dynamic_chain(&mut w, &dynamic_chain);
        let dynamic_bytes = w.into_bytes();
        assert_eq!(dynamic_bytes.len(), profile.dynamic_chain_len(false));
        let mut r = BitReader::new(&dynamic_bytes);
        let decoded_dynamic = profile.decode_dynamic_chain(&mut r, false).unwrap();
        assert_eq!(decoded_dynamic, dynamic_chain);
    }
}
