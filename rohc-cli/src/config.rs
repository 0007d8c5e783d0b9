//! Command-line surface, shaped after the reference workbench's
//! `config/cli.rs`: one top-level `CliOpt` with a `Command` subcommand
//! enum, each variant flattening a shared `FlowOpt` for the parameters
//! every run needs regardless of what it does with the result.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use rohc::{CidMode, Mode};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Drives the rohc codec over synthetic packet flows")]
pub struct CliOpt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compress and decompress a batch of synthetic flows, reporting
    /// compression-ratio and context-churn statistics.
    Bench(BenchOpt),
    /// Print the default tunable configuration as JSON, or validate one
    /// given on `--config`.
    ShowConfig(ShowConfigOpt),
}

#[derive(Parser, Debug, Clone)]
pub struct FlowOpt {
    /// Number of distinct (address, port) flows to generate.
    #[arg(long, default_value_t = 4)]
    pub flows: u32,

    /// Number of packets sent per flow, in order, on one simulated
    /// unidirectional channel.
    #[arg(long, default_value_t = 50)]
    pub packets_per_flow: u32,

    /// Random seed for IP-ID jitter and payload sizes, for reproducible
    /// runs (mirrors `quinn_rng_seed`/`network_rng_seed`'s role).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// CID space to use: `small` (4-bit Add-CID, 0-15) or `large`
    /// (SDVL-encoded, 0-16383).
    #[arg(long, value_enum, default_value = "small")]
    pub cid_mode: CliCidMode,

    /// ROHC operating mode. Only `u` (Unidirectional) avoids modeling a
    /// feedback channel back to the compressor in this simulation.
    #[arg(long, value_enum, default_value = "u")]
    pub mode: CliMode,

    /// Probability (0-100) that a given packet's IP-ID jumps by more
    /// than the configured delta, forcing the compressor to widen its
    /// W-LSB window or fall back to IR-DYN.
    #[arg(long, default_value_t = 5)]
    pub jitter_percent: u8,

    /// Path to a JSON `RohcConfig` overriding the built-in defaults
    /// (same role as `QuinnJsonConfig` on the teacher's QUIC side).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct BenchOpt {
    #[command(flatten)]
    pub flow: FlowOpt,
}

#[derive(Parser, Debug, Clone)]
pub struct ShowConfigOpt {
    /// Path to a JSON `RohcConfig` to validate instead of printing the
    /// built-in defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum CliCidMode {
    Small,
    Large,
}

impl From<CliCidMode> for CidMode {
    fn from(v: CliCidMode) -> Self {
        match v {
            CliCidMode::Small => CidMode::Small,
            CliCidMode::Large => CidMode::Large,
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
pub enum CliMode {
    U,
    O,
    R,
}

impl From<CliMode> for Mode {
    fn from(v: CliMode) -> Self {
        match v {
            CliMode::U => Mode::Unidirectional,
            CliMode::O => Mode::BidirectionalOptimistic,
            CliMode::R => Mode::BidirectionalReliable,
        }
    }
}
