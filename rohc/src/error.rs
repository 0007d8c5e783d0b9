//! Error taxonomy shared by the compressor, decompressor and codec layers.

use thiserror::Error;

/// Errors that can occur while encoding or interpreting wire-level data
/// (bit I/O, SDVL, packet framing) independent of any context state.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RohcError {
    /// The packet is too short, carries an unknown discriminator, or an
    /// SDVL value overflowed its 29-bit range.
    #[error("malformed ROHC data: {0}")]
    Malformed(String),

    /// A value could not be represented because it is >= 2^29.
    #[error("SDVL overflow: value {0} does not fit in 29 bits")]
    SdvlOverflow(u32),
}

/// Errors surfaced by [`crate::compressor::Compressor::compress`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CompressError {
    #[error(transparent)]
    Codec(#[from] RohcError),

    /// The packet's next-header protocol does not match this context's
    /// profile; the framework may retry with a different profile.
    #[error("packet does not match this context's profile")]
    ProfileMismatch,

    /// An IPv4 packet with MF=1 or a non-zero fragment offset; out of
    /// scope for every profile implemented here.
    #[error("fragmented IP packets are not supported")]
    Fragmented,
}

/// The decompressor-side counterpart. Unlike [`CompressError`], a failure
/// here never tears down the context; the decompressor always stays in a
/// valid state and the caller is expected to inspect `feedback` for
/// anything that should be sent back to the compressor.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DecompressError {
    #[error(transparent)]
    Codec(#[from] RohcError),

    /// CRC verification failed; `expected` and `actual` are the low
    /// `width` bits of the CRC field.
    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch { expected: u8, actual: u8 },

    /// A non-IR packet arrived while the context was in No-Context state.
    /// There is no previously-decoded SN to reference, so no feedback is
    /// emitted.
    #[error("no context established for this CID")]
    NoContext,

    #[error("fragmented IP packets are not supported")]
    Fragmented,
}
