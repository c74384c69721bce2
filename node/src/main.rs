// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Nullifier Devnet Node
//!
//! Entry point for the `nullifier-node` binary. Parses CLI arguments,
//! initializes logging and metrics, deploys the contracts from genesis and
//! serves the HTTP/WS API.
//!
//! Subcommands:
//!
//! - `init`   : create a data directory with a fresh genesis
//! - `run`    : start the node
//! - `attest` : issue a development attestation proof
//! - `address`: print the account address of a key
//! - `version`: print build version information

mod api;
mod cli;
mod devnet;
mod genesis;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{broadcast, Mutex};

use nullifier_protocol::attestation::{AccreditationType, AttestationRequest, Attestor};
use nullifier_protocol::config::{chain_name, PROTOCOL_VERSION};
use nullifier_protocol::context::now_unix;
use nullifier_protocol::crypto::{Keypair, PublicKey};
use nullifier_protocol::identity::Address;

use cli::{Commands, NullifierNodeCli};
use devnet::{Devnet, STATE_FILE};
use genesis::{Genesis, GENESIS_FILE};
use logging::{LogFormat, COMMAND_LOG_FILTER, NODE_LOG_FILTER};
use metrics::NodeMetrics;

/// Broadcast channel capacity for live event streaming.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How often the expiry-sensitive gauges are recomputed.
const GAUGE_REFRESH_SECS: u64 = 15;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = NullifierNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Attest(args) => attest(args),
        Commands::Address(args) => print_address(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Deploys the devnet and serves it until a shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(NODE_LOG_FILTER, LogFormat::from_str_lossy(&args.log_format));

    let genesis = Genesis::load(&args.data_dir.join(GENESIS_FILE))
        .context("no usable genesis; run `nullifier-node init` first")?;
    let state_path = args.data_dir.join(STATE_FILE);
    let devnet =
        load_devnet(&genesis, &state_path, args.fresh)?.with_event_capacity(args.event_log_capacity);

    tracing::info!(
        chain_id = genesis.chain_id,
        chain = %chain_name(genesis.chain_id),
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting nullifier-node"
    );

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Application state ---
    let devnet = Arc::new(Mutex::new(devnet));
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            PROTOCOL_VERSION,
        ),
        chain_id: genesis.chain_id,
        devnet: Arc::clone(&devnet),
        event_tx,
        metrics: Arc::clone(&node_metrics),
        clock: Arc::new(now_unix),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("{}:{}", args.host, args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("{}:{}", args.host, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Gauge refresh ---
    // Credentials expire with no call to observe it; poll.
    let devnet_ref = Arc::clone(&devnet);
    let metrics_ref = Arc::clone(&node_metrics);
    let gauge_loop = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(GAUGE_REFRESH_SECS));
        loop {
            interval.tick().await;
            let devnet = devnet_ref.lock().await;
            let live = devnet.live_credentials(now_unix());
            metrics_ref.live_credentials.set(live as i64);
            metrics_ref
                .total_value_locked
                .set(devnet.total_value_locked() as f64);
            tracing::debug!(live_credentials = live, "gauges refreshed");
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    gauge_loop.abort();

    let devnet = devnet.lock().await;
    devnet.save(&state_path)?;
    tracing::info!(path = %state_path.display(), "state saved");
    tracing::info!("nullifier-node stopped");
    Ok(())
}

/// Restores saved state unless `fresh`, falling back to genesis.
fn load_devnet(genesis: &Genesis, state_path: &Path, fresh: bool) -> Result<Devnet> {
    if !fresh && state_path.exists() {
        let snapshot = Devnet::load_snapshot(state_path)?;
        if snapshot.chain_id != genesis.chain_id {
            bail!(
                "{} belongs to chain {}, genesis is chain {}; use --fresh to start over",
                state_path.display(),
                snapshot.chain_id,
                genesis.chain_id
            );
        }
        let devnet = Devnet::restore(genesis, snapshot)?;
        tracing::info!(path = %state_path.display(), "state restored");
        return Ok(devnet);
    }
    Devnet::from_genesis(genesis)
}

/// Creates the data directory and writes a fresh genesis.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging(COMMAND_LOG_FILTER, LogFormat::Pretty);

    let data_dir = &args.data_dir;
    let genesis_path = data_dir.join(GENESIS_FILE);
    if genesis_path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            genesis_path.display()
        );
    }

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let genesis = Genesis::generate(args.chain_id, now_unix());
    genesis.save(&genesis_path)?;

    // State from an older genesis would not restore against the new keys.
    let state_path = data_dir.join(STATE_FILE);
    if state_path.exists() {
        std::fs::remove_file(&state_path)
            .with_context(|| format!("failed to remove {}", state_path.display()))?;
    }

    let admin = Address::from_public_key(&genesis.admin_keypair()?.public_key());
    let attestor = genesis.attestor_keypair()?.public_key();

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Chain          : {} ({})", chain_name(genesis.chain_id), genesis.chain_id);
    println!("  Registry       : {}", genesis.registry_address());
    println!("  Admin          : {}", admin);
    println!("  Attestor key   : {}", attestor.to_hex());
    for vault in &genesis.vaults {
        println!(
            "  Vault          : {} {} over {}",
            Address::derive(&vault.label),
            vault.symbol,
            Address::derive(&vault.asset)
        );
    }

    Ok(())
}

/// Parses `income`, `net-worth`, `both` or a numeric tag.
fn parse_accreditation_type(s: &str) -> Result<AccreditationType> {
    let ty = match s.to_lowercase().as_str() {
        "income" => AccreditationType::Income,
        "net-worth" | "networth" | "net_worth" => AccreditationType::NetWorth,
        "both" => AccreditationType::Both,
        other => {
            let tag: u8 = other
                .parse()
                .with_context(|| format!("unknown accreditation type: {}", s))?;
            AccreditationType::try_from(tag)?
        }
    };
    if !ty.is_accreditation() {
        bail!("accreditation type must be income, net-worth or both");
    }
    Ok(ty)
}

/// Signs a development attestation with the genesis attestor key.
fn attest(args: cli::AttestArgs) -> Result<()> {
    logging::init_logging(COMMAND_LOG_FILTER, LogFormat::Pretty);

    let genesis = Genesis::load(&args.data_dir.join(GENESIS_FILE))?;
    let ty = parse_accreditation_type(&args.accreditation_type)?;

    let mut request =
        AttestationRequest::passing(args.holder, ty, args.timestamp.unwrap_or_else(now_unix));
    if args.failing {
        request.meets_threshold = false;
    }

    let attestor = Attestor::new(genesis.attestor_keypair()?).with_url(genesis.attestor_url.clone());
    let proof = attestor.attest(&request);
    tracing::info!(
        holder = %args.holder,
        accreditation_type = %ty,
        nullifier = %proof.nullifier(),
        "attestation issued"
    );

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&proof).context("failed to encode proof")?
        );
    } else {
        println!("{}", hex::encode(proof.to_bytes()));
    }
    Ok(())
}

/// Prints the account address of a public or secret key.
fn print_address(args: cli::AddressArgs) -> Result<()> {
    let key = match (args.public_key, args.secret_key) {
        (Some(public), _) => PublicKey::from_hex(&public).context("invalid public key")?,
        (None, Some(secret)) => Keypair::from_hex(&secret)
            .context("invalid secret key")?
            .public_key(),
        (None, None) => bail!("pass --public-key or --secret-key"),
    };
    println!("{}", Address::from_public_key(&key));
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("nullifier-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol       {}", PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// If a handler cannot be installed, that branch never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
