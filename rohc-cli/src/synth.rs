//! Synthetic packet-flow generator, standing in for a pcap replay when
//! no capture is given. Each flow is one (src, dst, port) 5-tuple
//! sending a run of packets with a monotonically increasing IP-ID,
//! occasionally jittered to exercise the compressor's IR-DYN fallback.

use rohc::{HeaderChain, Ipv4Header, UdpHeader};
use rohc_workbench::build_frame;

pub struct Flow {
    pub src: [u8; 4],
    pub dst: [u8; 4],
    pub src_port: u16,
    pub dst_port: u16,
}

pub fn flows(count: u32) -> Vec<Flow> {
    (0..count)
        .map(|i| Flow {
            src: [10, 0, 0, 1 + (i % 250) as u8],
            dst: [10, 0, 1, 1],
            src_port: 40000 + i as u16,
            dst_port: 7000,
        })
        .collect()
}

/// Builds one frame for `flow`'s `seq`-th packet. `jitter_percent` is
/// the chance (0-100) this packet's IP-ID jumps by more than a small
/// sequential step, simulating reordering or a shared NAT pool.
pub fn build_packet(flow: &Flow, seq: u16, jitter_percent: u8, rng: &mut fastrand::Rng) -> Vec<u8> {
    let jump = if rng.u8(0..100) < jitter_percent { rng.u16(20..500) } else { 0 };
    let identification = seq.wrapping_add(jump);

    let chain = HeaderChain {
        outer_ip: Ipv4Header {
            tos: 0,
            identification,
            df: true,
            mf: false,
            fragment_offset: 0,
            ttl: 64,
            protocol: 17,
            src: flow.src,
            dst: flow.dst,
        },
        inner_ip: None,
        udp: Some(UdpHeader { src_port: flow.src_port, dst_port: flow.dst_port, checksum: 0 }),
    };
    let payload_len = rng.usize(8..64);
    let payload: Vec<u8> = (0..payload_len).map(|_| rng.u8(..)).collect();
    build_frame(&chain, &payload)
}
