//! Profile 0x0004, IP-only: the IP static/dynamic chain with no
//! transport fragment; everything after the IP header is opaque payload.

use super::{
    decode_ip_dynamic_chain, decode_ip_static_chain, encode_ip_dynamic_chain, encode_ip_static_chain,
    ip_fields, ip_from_fields, DynamicChain, Profile, StaticChain, IP_DYNAMIC_CHAIN_LEN,
    IP_STATIC_CHAIN_LEN,
};
use crate::bits::{BitReader, BitWriter};
use crate::error::RohcError;
use crate::types::{HeaderChain, ProfileId};

pub struct IpOnlyProfile;

impl Profile for IpOnlyProfile {
    fn id(&self) -> ProfileId {
        ProfileId::IpOnly
    }

    fn matches(&self, chain: &HeaderChain) -> bool {
        chain.udp.is_none() && !chain.last_ip().is_fragmented()
    }

    fn encode_static_chain(&self, w: &mut BitWriter, chain: &StaticChain) {
        encode_ip_static_chain(w, &chain.outer_ip, chain.inner_ip.as_ref());
    }

    fn decode_static_chain(&self, r: &mut BitReader) -> Result<StaticChain, RohcError> {
        let (outer_ip, inner_ip) = decode_ip_static_chain(r)?;
        Ok(StaticChain {
            outer_ip,
            inner_ip,
            udp: None,
        })
    }

    fn encode_dynamic_chain(&self, w: &mut BitWriter, chain: &DynamicChain) {
        encode_ip_dynamic_chain(w, &chain.outer_ip, chain.inner_ip.as_ref());
    }

    fn decode_dynamic_chain(
        &self,
        r: &mut BitReader,
        two_ip_headers: bool,
    ) -> Result<DynamicChain, RohcError> {
        let (outer_ip, inner_ip) = decode_ip_dynamic_chain(r, two_ip_headers)?;
        Ok(DynamicChain {
            outer_ip,
            inner_ip,
            udp: None,
        })
    }

    fn static_chain_len(&self, two_ip_headers: bool) -> usize {
        IP_STATIC_CHAIN_LEN * if two_ip_headers { 2 } else { 1 }
    }

    fn dynamic_chain_len(&self, two_ip_headers: bool) -> usize {
        IP_DYNAMIC_CHAIN_LEN * if two_ip_headers { 2 } else { 1 }
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
        let inner = chain.inner_ip.map(|h| ip_fields(&h, inner_rnd, inner_nbo));
        let static_chain = StaticChain {
            outer_ip: outer_s,
            inner_ip: inner.map(|(s, _)| s),
            udp: None,
        };
        let dynamic_chain = DynamicChain {
            outer_ip: outer_d,
            inner_ip: inner.map(|(_, d)| d),
            udp: None,
        };
        (static_chain, dynamic_chain)
    }

    fn reconstruct(&self, static_chain: &StaticChain, dynamic_chain: &DynamicChain) -> HeaderChain {
        let outer_ip = ip_from_fields(&static_chain.outer_ip, &dynamic_chain.outer_ip);
        let inner_ip = match (&static_chain.inner_ip, &dynamic_chain.inner_ip) {
            (Some(s), Some(d)) => Some(ip_from_fields(s, d)),
            _ => None,
        };
        HeaderChain {
            outer_ip,
            inner_ip,
            udp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Ipv4Header;

    fn sample_chain() -> HeaderChain {
        HeaderChain {
            outer_ip: Ipv4Header {
                tos: 0,
                identification: 42,
                df: false,
                mf: false,
                fragment_offset: 0,
                ttl: 30,
                protocol: 41, // arbitrary opaque next header
                src: [10, 0, 0, 1],
                dst: [10, 0, 0, 2],
            },
            inner_ip: None,
            udp: None,
        }
    }

    #[test]
    fn matches_requires_no_parsed_udp() {
        let profile = IpOnlyProfile;
        assert!(profile.matches(&sample_chain()));
        let mut with_udp = sample_chain();
        with_udp.udp = Some(crate::types::UdpHeader {
            src_port: 1,
            dst_port: 2,
            checksum: 0,
        });
        assert!(!profile.matches(&with_udp));
    }

    #[test]
    fn build_and_reconstruct_roundtrip() {
        let profile = IpOnlyProfile;
        let chain = sample_chain();
        let (static_chain, dynamic_chain) = profile.build_chains(&chain, true, false, false, true);
        let rebuilt = profile.reconstruct(&static_chain, &dynamic_chain);
        assert_eq!(rebuilt, chain);
    }
}
