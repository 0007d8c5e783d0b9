//! Tunables collected in one place, mirroring `QuinnJsonConfig`'s
//! one-doc-comment-per-field style: every constant the original C source
//! hard-coded is named here and independently overridable.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Compressor and decompressor tunables. `Default` reproduces the values
/// the reference implementation hard-codes; every field can be
/// overridden (e.g. deserialized from a JSON config by `rohc-cli`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RohcConfig {
    /// Consecutive stable IR packets before the compressor may advance
    /// to FO (and, with no further changes, on to SO).
    pub max_ir_count: u32,
    /// Consecutive stable FO packets before the compressor may advance
    /// to SO. Also bounds how many IR-DYN packets are sent right after
    /// entering FO (`ir_dyn_count < MAX_FO_COUNT`).
    pub max_fo_count: u32,
    /// In U-mode, number of SO packets sent before unconditionally
    /// stepping back down to FO (robustness against undetected
    /// desynchronization when no feedback is available).
    pub change_to_fo_count: u32,
    /// In U-mode, number of FO/SO packets sent before unconditionally
    /// stepping back down to IR.
    pub change_to_ir_count: u32,
    /// Width of each field's W-LSB sliding window (`C_WINDOW_WIDTH`).
    pub window_width: usize,
    /// Largest forward IP-ID jump (host order) still classified as
    /// sequential. RFC 3095 leaves this choice to the implementation.
    pub ipid_max_delta: u16,
    /// Consecutive CRC failures in Full Context before the decompressor
    /// downgrades to Static Context.
    pub fc_to_sc_failure_threshold: u32,
    /// Consecutive CRC failures in Static Context before the
    /// decompressor downgrades to No Context.
    pub sc_to_nc_failure_threshold: u32,
}

impl Default for RohcConfig {
    fn default() -> Self {
        Self {
            max_ir_count: 3,
            max_fo_count: 3,
            change_to_fo_count: 15,
            change_to_ir_count: 30,
            window_width: crate::wlsb::DEFAULT_WINDOW_WIDTH,
            ipid_max_delta: crate::ipid::DEFAULT_IPID_MAX_DELTA,
            fc_to_sc_failure_threshold: 3,
            sc_to_nc_failure_threshold: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let cfg = RohcConfig::default();
        assert!(cfg.max_ir_count >= 1);
        assert!(cfg.change_to_ir_count > cfg.change_to_fo_count);
    }
}
