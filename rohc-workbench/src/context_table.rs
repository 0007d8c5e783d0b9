//! Per-CID context table: creation, lookup and LRU eviction.
//!
//! Spec §1 calls this plumbing "external collaborators" the codec core
//! doesn't need to know about — "`rohc_comp`/`rohc_decomp` allocation,
//! per-context array housekeeping". This module is that housekeeping.
//! The table itself is a small `HashMap` scanned linearly on eviction
//! (spec §5: contexts are few, a tree would be overkill — the same
//! reasoning the core applies to its W-LSB windows).

use std::collections::HashMap;

use rohc::{Cid, Compressor, Decompressor, FlowKey};

/// Common surface a context table needs regardless of which half
/// (`Compressor` or `Decompressor`) it stores.
pub trait ContextLike {
    fn cid(&self) -> Cid;
    fn latest_used(&self) -> u64;
}

impl ContextLike for Compressor {
    fn cid(&self) -> Cid {
        self.context.cid
    }
    fn latest_used(&self) -> u64 {
        self.context.latest_used
    }
}

impl ContextLike for Decompressor {
    fn cid(&self) -> Cid {
        self.context.cid
    }
    fn latest_used(&self) -> u64 {
        self.context.latest_used
    }
}

/// A fixed-capacity table of contexts keyed by CID, evicting the
/// globally least-recently-used entry (by `latest_used`) to make room
/// for a new one (spec §3(d): "evicted by an LRU/timestamp policy when
/// the context array is full").
pub struct ContextTable<T> {
    capacity: usize,
    max_cid: Cid,
    entries: HashMap<Cid, T>,
}

impl<T: ContextLike> ContextTable<T> {
    pub fn new(capacity: usize, max_cid: Cid) -> Self {
        Self { capacity, max_cid, entries: HashMap::with_capacity(capacity) }
    }

    pub fn get(&self, cid: Cid) -> Option<&T> {
        self.entries.get(&cid)
    }

    pub fn get_mut(&mut self, cid: Cid) -> Option<&mut T> {
        self.entries.get_mut(&cid)
    }

    pub fn contains(&self, cid: Cid) -> bool {
        self.entries.contains_key(&cid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The lowest unused CID in `0..=max_cid`, if the table isn't
    /// already full of live contexts in that range.
    pub fn next_free_cid(&self) -> Option<Cid> {
        (0..=self.max_cid).find(|cid| !self.entries.contains_key(cid))
    }

    /// Inserts a freshly created context, evicting the least-recently-
    /// used entry first if the table is at capacity. Returns the CID
    /// evicted to make room, if any.
    pub fn insert(&mut self, ctx: T) -> Option<Cid> {
        let cid = ctx.cid();
        let evicted = if self.entries.len() >= self.capacity && !self.entries.contains_key(&cid) {
            self.evict_lru()
        } else {
            None
        };
        self.entries.insert(cid, ctx);
        evicted
    }

    pub fn remove(&mut self, cid: Cid) -> Option<T> {
        self.entries.remove(&cid)
    }

    fn evict_lru(&mut self) -> Option<Cid> {
        let victim = self
            .entries
            .values()
            .min_by_key(|ctx| ctx.latest_used())
            .map(|ctx| ctx.cid())?;
        self.entries.remove(&victim);
        Some(victim)
    }
}

/// The compressor side additionally routes inbound flows to a CID by
/// matching static fields (spec §3 "Profile... check-packet-belongs?").
/// Lookup by [`FlowKey`] is this workbench's approximation of that
/// match: two packets with the same protocol/addresses/ports are the
/// same flow and share a context.
pub struct CompressorTable {
    pub contexts: ContextTable<Compressor>,
    flows: HashMap<FlowKey, Cid>,
}

impl CompressorTable {
    pub fn new(capacity: usize, max_cid: Cid) -> Self {
        Self { contexts: ContextTable::new(capacity, max_cid), flows: HashMap::new() }
    }

    pub fn cid_for_flow(&self, key: &FlowKey) -> Option<Cid> {
        self.flows.get(key).copied()
    }

    /// Registers `cid` as the context compressing `key`'s flow, evicting
    /// whatever context previously occupied the CID (if eviction
    /// happened) from the flow map too, so a later packet for the
    /// evicted flow is treated as new.
    pub fn insert(&mut self, key: FlowKey, ctx: Compressor) -> Option<Cid> {
        let cid = ctx.cid();
        let evicted = self.contexts.insert(ctx);
        if let Some(evicted_cid) = evicted {
            self.flows.retain(|_, v| *v != evicted_cid);
        }
        self.flows.insert(key, cid);
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rohc::{CidMode, HeaderChain, Ipv4Header, Mode, ProfileId, RohcConfig, UdpHeader};

    fn chain(id: u16) -> HeaderChain {
        HeaderChain {
            outer_ip: Ipv4Header {
                tos: 0,
                identification: id,
                df: true,
                mf: false,
                fragment_offset: 0,
                ttl: 64,
                protocol: 17,
                src: [1, 2, 3, 4],
                dst: [5, 6, 7, 8],
            },
            inner_ip: None,
            udp: Some(UdpHeader { src_port: 1000, dst_port: 2000, checksum: 0 }),
        }
    }

    fn compressor(cid: Cid, now: u64) -> Compressor {
        let c = chain(0);
        Compressor::new(cid, ProfileId::Udp, Mode::Unidirectional, CidMode::Small, &c, RohcConfig::default(), now)
            .unwrap()
    }

    #[test]
    fn evicts_least_recently_used_when_full() {
        let mut table: ContextTable<Compressor> = ContextTable::new(2, 15);
        table.insert(compressor(0, 10));
        table.insert(compressor(1, 20));
        let evicted = table.insert(compressor(2, 30));
        assert_eq!(evicted, Some(0));
        assert!(table.get(0).is_none());
        assert!(table.get(1).is_some());
        assert!(table.get(2).is_some());
    }

    #[test]
    fn next_free_cid_skips_occupied_slots() {
        let mut table: ContextTable<Compressor> = ContextTable::new(16, 15);
        table.insert(compressor(0, 0));
        table.insert(compressor(1, 0));
        assert_eq!(table.next_free_cid(), Some(2));
    }
}
