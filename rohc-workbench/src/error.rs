use thiserror::Error;

use crate::frame::FrameError;

#[derive(Debug, Error)]
pub enum WorkbenchError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Compress(#[from] rohc::CompressError),

    #[error(transparent)]
    Decompress(#[from] rohc::DecompressError),

    #[error("no compression context for CID {0}")]
    NoContext(u16),
}
