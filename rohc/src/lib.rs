//! RObust Header Compression (RFC 3095) for IPv4, IPv4/UDP and
//! IPv4/UDP-Lite flows — profiles 0x0000, 0x0001 (recognized only),
//! 0x0002 and 0x0004 (implemented), plus the profile-independent W-LSB
//! engine, SDVL, CRC family and feedback channel that every profile
//! shares.
//!
//! This crate is the codec core only: one [`compressor::Compressor`] and
//! one [`decompressor::Decompressor`] per `(CID, direction)`. Per-CID
//! context tables, LRU eviction, statistics aggregation and tracing
//! wiring for a whole flow set are a consuming crate's job (spec §1's
//! "external collaborators"); `rohc-workbench` is that consumer for this
//! repository.

pub mod bits;
pub mod compressor;
pub mod config;
pub mod context;
pub mod crc;
pub mod decompressor;
pub mod error;
pub mod feedback;
pub mod ipid;
pub mod packet;
pub mod profiles;
pub mod sdvl;
pub mod types;
pub mod wlsb;

pub use compressor::{Compressor, PacketType};
pub use config::RohcConfig;
pub use context::{CompressorContext, CompressorState, DecompressorContext, DecompressorState};
pub use decompressor::Decompressor;
pub use error::{CompressError, DecompressError, RohcError};
pub use types::{Cid, CidMode, FlowKey, HeaderChain, Ipv4Header, Mode, ProfileId, UdpHeader};
