//! Framework scaffolding around the `rohc` codec core: per-CID context
//! tables with LRU eviction, Ethernet/IPv4/UDP framing, and running
//! statistics. Spec §1 calls this the "external collaborators" a codec
//! core deliberately leaves out — allocation, context array
//! housekeeping, byte-stream framing — and this crate is that
//! collaborator for the repository, shaped after the reference
//! workbench's `SchcCompressor`/`SchcObserver`.

pub mod compressor;
pub mod context_table;
pub mod decompressor;
pub mod error;
pub mod frame;
pub mod stats;

pub use compressor::WorkbenchCompressor;
pub use context_table::{CompressorTable, ContextLike, ContextTable};
pub use decompressor::{DecompressedFrame, WorkbenchDecompressor};
pub use error::WorkbenchError;
pub use frame::{build_frame, parse_frame, FrameError, ParsedFrame};
pub use stats::{CompressorStats, DecompressorStats, StatsSnapshot};

/// A compressor shared across threads, the same `Arc<RwLock<_>>` shape
/// as the reference workbench's `SharedSchcCompressor` — a single
/// context table fed by several capture/send tasks at once.
pub type SharedCompressor = std::sync::Arc<parking_lot::RwLock<WorkbenchCompressor>>;

/// The decompressor-side counterpart of [`SharedCompressor`].
pub type SharedDecompressor = std::sync::Arc<parking_lot::RwLock<WorkbenchDecompressor>>;
