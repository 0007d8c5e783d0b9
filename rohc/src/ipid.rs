//! IP-ID behavior classification, spec §4.7.
//!
//! Every packet the compressor compares the new 16-bit IP-ID against the
//! last one it sent and classifies the field as sequential-NBO,
//! sequential-byte-swapped, or random, which in turn drives whether the
//! field can be W-LSB compressed at all.

/// Default maximum forward jump, in host order, that is still considered
/// "sequential". RFC 3095 does not fix this value; it is a tunable here
/// (see [`crate::config::RohcConfig::ipid_max_delta`]).
pub const DEFAULT_IPID_MAX_DELTA: u16 = 20;

/// Classification of how an IP-ID field is behaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpIdBehavior {
    /// The field increases by a small positive step per packet when read
    /// in network byte order (`rnd = 0`, `nbo = 1`).
    SequentialNbo,
    /// As above, but the field increases when byte-swapped first
    /// (`rnd = 0`, `nbo = 0`) — common on little-endian stacks that
    /// increment the IP-ID in host order before it is sent on the wire.
    SequentialByteSwapped,
    /// Neither NBO nor byte-swapped order is sequential (`rnd = 1`).
    Random,
}

impl IpIdBehavior {
    pub fn rnd(self) -> bool {
        matches!(self, IpIdBehavior::Random)
    }

    pub fn nbo(self) -> bool {
        matches!(self, IpIdBehavior::SequentialNbo)
    }
}

/// Classifies the transition from `old_id` to `new_id` (both as they
/// appear on the wire, i.e. network byte order as transmitted).
///
/// Mirrors the two-pass check in `c_generic.c`: first try host-order
/// deltas directly, then retry after swapping the bytes of both values.
pub fn classify(old_id: u16, new_id: u16, max_delta: u16) -> IpIdBehavior {
    if is_sequential_forward(old_id, new_id, max_delta) {
        return IpIdBehavior::SequentialNbo;
    }
    let old_swapped = old_id.swap_bytes();
    let new_swapped = new_id.swap_bytes();
    if is_sequential_forward(old_swapped, new_swapped, max_delta) {
        return IpIdBehavior::SequentialByteSwapped;
    }
    IpIdBehavior::Random
}

/// True if `new_id` is a small forward (possibly wrapping) step from
/// `old_id`, i.e. `0 < (new_id - old_id) <= max_delta` modulo 2^16.
fn is_sequential_forward(old_id: u16, new_id: u16, max_delta: u16) -> bool {
    let delta = new_id.wrapping_sub(old_id);
    delta != 0 && delta <= max_delta
}

/// The 16-bit two's-complement delta stored per spec §3: `id_delta =
/// IPID - SN`, computed in whichever byte order the field is currently
/// classified as behaving in.
pub fn id_delta(ip_id: u16, sn: u16, behavior: IpIdBehavior) -> i32 {
    let ip_id = if behavior.nbo() { ip_id } else { ip_id.swap_bytes() };
    (ip_id as i32) - (sn as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_forward_step_is_sequential_nbo() {
        assert_eq!(classify(100, 101, 20), IpIdBehavior::SequentialNbo);
        assert_eq!(classify(100, 120, 20), IpIdBehavior::SequentialNbo);
    }

    #[test]
    fn zero_delta_is_not_sequential() {
        // RFC requires the delta to be > 0; a stuck IP-ID is random-ish
        // from the compressor's point of view (it cannot be W-LSB'd
        // against an always-zero step the same way).
        assert_eq!(classify(100, 100, 20), IpIdBehavior::Random);
    }

    #[test]
    fn large_jump_is_random() {
        assert_eq!(classify(100, 5000, 20), IpIdBehavior::Random);
    }

    #[test]
    fn byte_swapped_sequential_detected() {
        // Pick wire values whose *swapped* forms are a small forward step.
        let old = 50u16.swap_bytes();
        let new = 51u16.swap_bytes();
        assert_eq!(classify(old, new, 20), IpIdBehavior::SequentialByteSwapped);
    }

    #[test]
    fn wraparound_is_still_sequential() {
        assert_eq!(classify(0xfffe, 0x0001, 20), IpIdBehavior::SequentialNbo);
    }

    #[test]
    fn id_delta_uses_correct_byte_order() {
        let d = id_delta(105, 100, IpIdBehavior::SequentialNbo);
        assert_eq!(d, 5);
    }
}
