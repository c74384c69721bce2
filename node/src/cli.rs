//! # CLI Interface
//!
//! Command-line structure for `nullifier-node`, via `clap` derive. Every
//! flag that matters in deployment also reads a `NULLIFIER_*` env var.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use nullifier_protocol::config::{CHAIN_ID_DEVNET, DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT};
use nullifier_protocol::identity::Address;

use crate::devnet::EVENT_LOG_CAPACITY;

/// Nullifier devnet node.
///
/// Hosts the credential registry, the asset tokens and the compliant vaults
/// defined in `genesis.json`, serves them over HTTP/WS, and exposes
/// Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "nullifier-node",
    about = "Nullifier accreditation devnet node",
    version,
    propagate_version = true
)]
pub struct NullifierNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a data directory with a fresh genesis (admin, attestor, vaults).
    Init(InitArgs),
    /// Start the node.
    Run(RunArgs),
    /// Issue a signed development attestation for a holder.
    Attest(AttestArgs),
    /// Print the account address of a key.
    Address(AddressArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Data directory to initialize.
    #[arg(long, short = 'd', env = "NULLIFIER_DATA_DIR", default_value = ".nullifier")]
    pub data_dir: PathBuf,

    /// Chain id recorded in genesis.
    #[arg(long, env = "NULLIFIER_CHAIN_ID", default_value_t = CHAIN_ID_DEVNET)]
    pub chain_id: u64,

    /// Overwrite an existing genesis and discard saved state.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Data directory holding `genesis.json` and `state.json`.
    #[arg(long, short = 'd', env = "NULLIFIER_DATA_DIR", default_value = ".nullifier")]
    pub data_dir: PathBuf,

    /// Interface to bind.
    #[arg(long, env = "NULLIFIER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the REST/WS API.
    #[arg(long, env = "NULLIFIER_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "NULLIFIER_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Log format: `pretty` or `json`.
    #[arg(long, env = "NULLIFIER_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Start from genesis even if a saved state exists.
    #[arg(long)]
    pub fresh: bool,

    /// Number of contract events kept for `/registry/events` and `state.json`.
    #[arg(long, env = "NULLIFIER_EVENT_LOG_CAPACITY", default_value_t = EVENT_LOG_CAPACITY)]
    pub event_log_capacity: usize,
}

/// Arguments for the `attest` subcommand.
#[derive(Parser, Debug)]
pub struct AttestArgs {
    /// Data directory whose genesis holds the attestor key.
    #[arg(long, short = 'd', env = "NULLIFIER_DATA_DIR", default_value = ".nullifier")]
    pub data_dir: PathBuf,

    /// Holder address (`0x…`).
    #[arg(long)]
    pub holder: Address,

    /// Accreditation type: `income`, `net-worth`, `both`, or a tag 1-3.
    #[arg(long, default_value = "income")]
    pub accreditation_type: String,

    /// Claim timestamp in Unix seconds. Defaults to now.
    #[arg(long)]
    pub timestamp: Option<u64>,

    /// Attest a failed check instead of a passing one.
    #[arg(long)]
    pub failing: bool,

    /// Print the proof as JSON instead of hex-encoded bytes.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `address` subcommand.
#[derive(Parser, Debug)]
pub struct AddressArgs {
    /// Hex-encoded Ed25519 public key.
    #[arg(long, conflicts_with = "secret_key", required_unless_present = "secret_key")]
    pub public_key: Option<String>,

    /// Hex-encoded Ed25519 secret key.
    #[arg(long, env = "NULLIFIER_SECRET_KEY")]
    pub secret_key: Option<String>,
}
