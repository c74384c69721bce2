//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the devnet over HTTP. All endpoints
//! share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                                   | Description                      |
//! |--------|----------------------------------------|----------------------------------|
//! | GET    | `/health`                              | Liveness probe                   |
//! | GET    | `/status`                              | Chain, registry and vault summary|
//! | GET    | `/registry/credentials/:holder`        | Credential view for a holder     |
//! | POST   | `/registry/mint`                       | Signed `mintCredential`          |
//! | POST   | `/registry/revoke`                     | Signed `revokeCredential`        |
//! | POST   | `/registry/admin`                      | Signed `transferAdmin`           |
//! | GET    | `/registry/events`                     | Registry event log               |
//! | GET    | `/vaults`                              | Vault list                       |
//! | GET    | `/vaults/:vault/positions/:account`    | Position and limits              |
//! | POST   | `/vaults/:vault/{deposit,mint,...}`    | Signed vault calls               |
//! | POST   | `/assets/:asset/{faucet,approve}`      | Signed asset calls               |
//! | GET    | `/ws`                                  | Live contract events             |
//!
//! ## Signed calls
//!
//! Every POST body is a [`SignedCall`]: the JSON payload as a string, the
//! caller's Ed25519 public key, and a signature over the payload bytes. The
//! caller of the contract call is the address of that key. There is no
//! nonce; a captured envelope can be replayed against the devnet.
//!
//! Amounts travel as decimal strings in both directions.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use nullifier_contracts::asset_token::AssetError;
use nullifier_contracts::compliant_vault::VaultError;
use nullifier_contracts::oracle::OracleError;
use nullifier_contracts::credential_registry::{
    Credential, CredentialStatus, RegistryError, TokenId,
};
use nullifier_protocol::config::{chain_name, SECONDS_PER_DAY};
use nullifier_protocol::context::{CallContext, Timestamp};
use nullifier_protocol::crypto::{Keypair, PublicKey, Signature};
use nullifier_protocol::identity::Address;

use crate::devnet::{Devnet, DevnetError, NodeEvent, Receipt};
use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Source of "now" for contract calls. Swapped for a fixed value in tests.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    pub chain_id: u64,
    /// The ledger. One lock, so calls execute one at a time.
    pub devnet: Arc<Mutex<Devnet>>,
    /// Broadcast channel for live contract events.
    pub event_tx: broadcast::Sender<NodeEvent>,
    pub metrics: SharedMetrics,
    pub clock: Clock,
}

impl AppState {
    fn now(&self) -> Timestamp {
        (self.clock)()
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/registry/credentials/:holder", get(credential_handler))
        .route("/registry/mint", post(mint_credential_handler))
        .route("/registry/revoke", post(revoke_credential_handler))
        .route("/registry/admin", post(transfer_admin_handler))
        .route("/registry/events", get(registry_events_handler))
        .route("/vaults", get(vaults_handler))
        .route("/vaults/:vault/positions/:account", get(position_handler))
        .route("/vaults/:vault/deposit", post(deposit_handler))
        .route("/vaults/:vault/mint", post(mint_shares_handler))
        .route("/vaults/:vault/withdraw", post(withdraw_handler))
        .route("/vaults/:vault/redeem", post(redeem_handler))
        .route("/vaults/:vault/approve", post(approve_shares_handler))
        .route("/assets/:asset/faucet", post(faucet_handler))
        .route("/assets/:asset/approve", post(approve_asset_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Signed Calls
// ---------------------------------------------------------------------------

/// A signed request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedCall {
    /// Hex-encoded Ed25519 public key of the caller.
    pub public_key: String,
    /// Hex-encoded signature over the bytes of `payload`.
    pub signature: String,
    /// The call arguments, as a JSON document.
    pub payload: String,
}

impl SignedCall {
    /// Serializes `payload` and signs it with `keypair`.
    pub fn sign<T: Serialize>(keypair: &Keypair, payload: &T) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_string(payload)?;
        Ok(Self {
            public_key: keypair.public_key().to_hex(),
            signature: keypair.sign(payload.as_bytes()).to_hex(),
            payload,
        })
    }

    /// Checks the signature and decodes the payload. Returns the caller.
    pub fn open<T: DeserializeOwned>(&self) -> Result<(Address, T), ApiError> {
        let key = PublicKey::from_hex(&self.public_key)
            .map_err(|e| ApiError::BadEnvelope(format!("public_key: {}", e)))?;
        let signature = Signature::from_hex(&self.signature)
            .map_err(|e| ApiError::BadEnvelope(format!("signature: {}", e)))?;
        if !key.verify(self.payload.as_bytes(), &signature) {
            return Err(ApiError::BadSignature);
        }
        let payload = serde_json::from_str(&self.payload)
            .map_err(|e| ApiError::BadPayload(e.to_string()))?;
        Ok((Address::from_public_key(&key), payload))
    }
}

/// `POST /registry/mint`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintCredentialPayload {
    /// Hex-encoded proof bytes.
    pub proof: String,
    pub accreditation_type: u8,
}

/// `POST /registry/revoke`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeCredentialPayload {
    pub holder: Address,
}

/// `POST /registry/admin`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferAdminPayload {
    pub new_admin: Address,
}

/// `POST /vaults/:vault/deposit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositPayload {
    #[serde(with = "nullifier_contracts::amount")]
    pub assets: u128,
    pub receiver: Address,
}

/// `POST /vaults/:vault/mint`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintSharesPayload {
    #[serde(with = "nullifier_contracts::amount")]
    pub shares: u128,
    pub receiver: Address,
}

/// `POST /vaults/:vault/withdraw`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawPayload {
    #[serde(with = "nullifier_contracts::amount")]
    pub assets: u128,
    pub receiver: Address,
    pub owner: Address,
}

/// `POST /vaults/:vault/redeem`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemPayload {
    #[serde(with = "nullifier_contracts::amount")]
    pub shares: u128,
    pub receiver: Address,
    pub owner: Address,
}

/// `POST /vaults/:vault/approve` and `POST /assets/:asset/approve`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovePayload {
    pub spender: Address,
    #[serde(with = "nullifier_contracts::amount")]
    pub amount: u128,
}

/// `POST /assets/:asset/faucet`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetPayload {
    pub to: Address,
    #[serde(with = "nullifier_contracts::amount")]
    pub amount: u128,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("malformed envelope: {0}")]
    BadEnvelope(String),

    #[error("signature does not match payload")]
    BadSignature,

    #[error("malformed payload: {0}")]
    BadPayload(String),

    #[error(transparent)]
    Devnet(#[from] DevnetError),
}

impl From<VaultError> for ApiError {
    fn from(e: VaultError) -> Self {
        ApiError::Devnet(e.into())
    }
}

impl ApiError {
    /// Stable error code and HTTP status. One code per failure condition.
    fn classify(&self) -> (&'static str, StatusCode) {
        match self {
            ApiError::BadEnvelope(_) => ("bad_envelope", StatusCode::BAD_REQUEST),
            ApiError::BadSignature => ("bad_signature", StatusCode::UNAUTHORIZED),
            ApiError::BadPayload(_) => ("bad_payload", StatusCode::BAD_REQUEST),
            ApiError::Devnet(DevnetError::Registry(e)) => registry_error_code(e),
            ApiError::Devnet(DevnetError::Vault(e)) => vault_error_code(e),
            ApiError::Devnet(DevnetError::Asset(e)) => asset_error_code(e),
            ApiError::Devnet(DevnetError::UnknownVault(_)) => {
                ("unknown_vault", StatusCode::NOT_FOUND)
            }
            ApiError::Devnet(DevnetError::UnknownAsset(_)) => {
                ("unknown_asset", StatusCode::NOT_FOUND)
            }
        }
    }
}

fn registry_error_code(e: &RegistryError) -> (&'static str, StatusCode) {
    match e {
        RegistryError::AlreadyHasCredential(_) => ("already_has_credential", StatusCode::CONFLICT),
        RegistryError::InvalidAccreditationType(_) => {
            ("invalid_accreditation_type", StatusCode::BAD_REQUEST)
        }
        RegistryError::InvalidProof(_) => ("invalid_proof", StatusCode::UNPROCESSABLE_ENTITY),
        RegistryError::Unauthorized(_) => ("unauthorized", StatusCode::FORBIDDEN),
        RegistryError::CredentialNotFound(_) => ("credential_not_found", StatusCode::NOT_FOUND),
        RegistryError::CredentialIsRevoked(_) => ("credential_revoked", StatusCode::FORBIDDEN),
        RegistryError::CredentialExpired { .. } => ("credential_expired", StatusCode::FORBIDDEN),
        RegistryError::TokenNotFound(_) => ("token_not_found", StatusCode::NOT_FOUND),
        RegistryError::SoulboundToken => ("soulbound_token", StatusCode::UNPROCESSABLE_ENTITY),
        RegistryError::ZeroAddress => ("zero_address", StatusCode::BAD_REQUEST),
        RegistryError::InvalidConfig(_) => ("invalid_config", StatusCode::INTERNAL_SERVER_ERROR),
        RegistryError::ArithmeticOverflow => {
            ("arithmetic_overflow", StatusCode::UNPROCESSABLE_ENTITY)
        }
    }
}

fn vault_error_code(e: &VaultError) -> (&'static str, StatusCode) {
    match e {
        VaultError::NotAccredited(_) => ("not_accredited", StatusCode::FORBIDDEN),
        VaultError::ZeroAddress => ("zero_address", StatusCode::BAD_REQUEST),
        // The devnet wires each vault to its own asset; a mismatch is a node bug.
        VaultError::AssetMismatch { .. } => ("asset_mismatch", StatusCode::INTERNAL_SERVER_ERROR),
        VaultError::Oracle(OracleError::Unavailable) => {
            ("oracle_unavailable", StatusCode::SERVICE_UNAVAILABLE)
        }
        VaultError::Asset(e) => asset_error_code(e),
        VaultError::ArithmeticOverflow => {
            ("arithmetic_overflow", StatusCode::UNPROCESSABLE_ENTITY)
        }
        VaultError::ExceedsMaxWithdraw { .. } => {
            ("exceeds_max_withdraw", StatusCode::UNPROCESSABLE_ENTITY)
        }
        VaultError::ExceedsMaxRedeem { .. } => {
            ("exceeds_max_redeem", StatusCode::UNPROCESSABLE_ENTITY)
        }
        VaultError::InsufficientAllowance { .. } => {
            ("insufficient_share_allowance", StatusCode::UNPROCESSABLE_ENTITY)
        }
    }
}

fn asset_error_code(e: &AssetError) -> (&'static str, StatusCode) {
    match e {
        AssetError::UnauthorizedMint => ("unauthorized_mint", StatusCode::FORBIDDEN),
        AssetError::ZeroAddress => ("zero_address", StatusCode::BAD_REQUEST),
        AssetError::InsufficientBalance { .. } => {
            ("insufficient_balance", StatusCode::UNPROCESSABLE_ENTITY)
        }
        AssetError::InsufficientAllowance { .. } => {
            ("insufficient_allowance", StatusCode::UNPROCESSABLE_ENTITY)
        }
        AssetError::SupplyOverflow { .. } => ("supply_overflow", StatusCode::UNPROCESSABLE_ENTITY),
    }
}

/// Error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, status) = self.classify();
        let body = ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// A call result amount, as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(#[serde(with = "nullifier_contracts::amount")] pub u128);

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub chain_id: u64,
    pub chain: String,
    pub registry: Address,
    pub admin: Address,
    /// Credentials ever minted.
    pub credentials_issued: u64,
    pub live_credentials: usize,
    pub assets: usize,
    pub vaults: usize,
    #[serde(with = "nullifier_contracts::amount")]
    pub total_value_locked: u128,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /registry/credentials/:holder`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialView {
    pub holder: Address,
    pub status: CredentialStatus,
    pub accredited: bool,
    /// Why the holder cannot deposit: `credential_not_found`,
    /// `credential_revoked` or `credential_expired`.
    pub reason: Option<String>,
    pub token_id: Option<TokenId>,
    pub label: Option<String>,
    pub days_until_expiry: Option<u64>,
    pub credential: Option<Credential>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VaultSummary {
    pub address: Address,
    pub asset: Address,
    pub name: String,
    pub symbol: String,
    #[serde(with = "nullifier_contracts::amount")]
    pub total_assets: u128,
    #[serde(with = "nullifier_contracts::amount")]
    pub total_supply: u128,
}

/// Response payload for `GET /vaults/:vault/positions/:account`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PositionView {
    pub vault: Address,
    pub account: Address,
    #[serde(with = "nullifier_contracts::amount")]
    pub shares: u128,
    #[serde(with = "nullifier_contracts::amount")]
    pub assets: u128,
    pub can_deposit: bool,
    #[serde(with = "nullifier_contracts::amount")]
    pub max_deposit: u128,
    #[serde(with = "nullifier_contracts::amount")]
    pub max_mint: u128,
    #[serde(with = "nullifier_contracts::amount")]
    pub max_withdraw: u128,
    #[serde(with = "nullifier_contracts::amount")]
    pub max_redeem: u128,
    #[serde(with = "nullifier_contracts::amount")]
    pub total_assets: u128,
}

// ---------------------------------------------------------------------------
// Read Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let now = state.now();
    let devnet = state.devnet.lock().await;
    let (registry, admin, issued) = {
        let r = devnet.registry().read();
        (r.address(), r.admin(), r.total_supply())
    };
    Json(StatusResponse {
        version: state.version.clone(),
        chain_id: state.chain_id,
        chain: chain_name(state.chain_id),
        registry,
        admin,
        credentials_issued: issued,
        live_credentials: devnet.live_credentials(now),
        assets: devnet.assets().count(),
        vaults: devnet.vaults().count(),
        total_value_locked: devnet.total_value_locked(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `GET /registry/credentials/:holder`
///
/// Always 200: a holder with no credential gets `status: "None"`.
async fn credential_handler(
    Path(holder): Path<Address>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let now = state.now();
    let devnet = state.devnet.lock().await;
    let registry = devnet.registry().read();
    let credential = registry.get_credential(&holder).ok().cloned();
    let reason = registry
        .require_accredited(&holder, now)
        .err()
        .map(|e| registry_error_code(&e).0.to_string());

    let view = CredentialView {
        holder,
        status: registry.credential_status(&holder, now),
        accredited: reason.is_none(),
        reason,
        token_id: credential.as_ref().map(|c| c.token_id),
        label: credential
            .as_ref()
            .map(|c| c.accreditation_type.label().to_string()),
        days_until_expiry: credential
            .as_ref()
            .filter(|c| c.is_live(now))
            .map(|c| (c.expires_at - now) / SECONDS_PER_DAY),
        credential,
    };
    Json(view)
}

async fn registry_events_handler(State(state): State<AppState>) -> impl IntoResponse {
    let devnet = state.devnet.lock().await;
    let events: Vec<&NodeEvent> = devnet
        .events()
        .iter()
        .filter(|e| matches!(e, NodeEvent::Registry { .. }))
        .collect();
    Json(serde_json::json!({ "events": events }))
}

async fn vaults_handler(State(state): State<AppState>) -> impl IntoResponse {
    let devnet = state.devnet.lock().await;
    let vaults: Vec<VaultSummary> = devnet
        .vaults()
        .map(|v| VaultSummary {
            address: v.address(),
            asset: v.asset(),
            name: v.name().to_string(),
            symbol: v.symbol().to_string(),
            total_assets: v.total_assets(),
            total_supply: v.total_supply(),
        })
        .collect();
    Json(vaults)
}

async fn position_handler(
    Path((vault, account)): Path<(Address, Address)>,
    State(state): State<AppState>,
) -> Result<Json<PositionView>, ApiError> {
    let now = state.now();
    let devnet = state.devnet.lock().await;
    let v = devnet
        .vault(&vault)
        .ok_or(DevnetError::UnknownVault(vault))?;

    let shares = v.balance_of(&account);
    Ok(Json(PositionView {
        vault,
        account,
        shares,
        assets: v.convert_to_assets(shares)?,
        can_deposit: v.can_deposit(&account, now)?,
        max_deposit: v.max_deposit(&account, now)?,
        max_mint: v.max_mint(&account, now)?,
        max_withdraw: v.max_withdraw(&account)?,
        max_redeem: v.max_redeem(&account),
        total_assets: v.total_assets(),
    }))
}

// ---------------------------------------------------------------------------
// Signed Call Handlers
// ---------------------------------------------------------------------------

/// Opens the envelope, runs `op` against the devnet under the lock, then
/// publishes the receipt's events.
async fn execute<P, T, E, F>(
    state: &AppState,
    call: SignedCall,
    name: &'static str,
    op: F,
) -> Result<Receipt<T>, ApiError>
where
    P: DeserializeOwned,
    E: Into<ApiError> + std::fmt::Display,
    F: FnOnce(&mut Devnet, &CallContext, P) -> Result<Receipt<T>, E>,
{
    let (caller, payload) = call.open::<P>().map_err(|e| {
        state.metrics.rejected_calls_total.inc();
        tracing::warn!(call = name, error = %e, "envelope rejected");
        e
    })?;
    let ctx = CallContext::new(caller, state.now());

    let mut devnet = state.devnet.lock().await;
    let timer = state.metrics.call_latency_seconds.start_timer();
    let result = op(&mut *devnet, &ctx, payload);
    timer.observe_duration();

    match result {
        Ok(receipt) => {
            state
                .metrics
                .live_credentials
                .set(devnet.live_credentials(ctx.timestamp) as i64);
            state
                .metrics
                .total_value_locked
                .set(devnet.total_value_locked() as f64);
            drop(devnet);

            for event in &receipt.events {
                // No subscribers is not an error.
                let _ = state.event_tx.send(event.clone());
            }
            tracing::info!(call = name, caller = %caller, tx_id = %receipt.tx_id, "call executed");
            Ok(receipt)
        }
        Err(e) => {
            state.metrics.rejected_calls_total.inc();
            tracing::warn!(call = name, caller = %caller, error = %e, "call rejected");
            Err(e.into())
        }
    }
}

async fn mint_credential_handler(
    State(state): State<AppState>,
    Json(call): Json<SignedCall>,
) -> Result<Json<Receipt<TokenId>>, ApiError> {
    let receipt = execute(
        &state,
        call,
        "mint_credential",
        |d, ctx, p: MintCredentialPayload| -> Result<Receipt<TokenId>, ApiError> {
            let proof = hex::decode(p.proof.trim_start_matches("0x"))
                .map_err(|e| ApiError::BadPayload(format!("proof: {}", e)))?;
            Ok(d.mint_credential(ctx, &proof, p.accreditation_type)?)
        },
    )
    .await?;
    state.metrics.credentials_minted_total.inc();
    Ok(Json(receipt))
}

async fn revoke_credential_handler(
    State(state): State<AppState>,
    Json(call): Json<SignedCall>,
) -> Result<Json<Receipt<bool>>, ApiError> {
    let receipt = execute(
        &state,
        call,
        "revoke_credential",
        |d, ctx, p: RevokeCredentialPayload| d.revoke_credential(ctx, &p.holder),
    )
    .await?;
    if receipt.result {
        state.metrics.credentials_revoked_total.inc();
    }
    Ok(Json(receipt))
}

async fn transfer_admin_handler(
    State(state): State<AppState>,
    Json(call): Json<SignedCall>,
) -> Result<Json<Receipt<()>>, ApiError> {
    let receipt = execute(
        &state,
        call,
        "transfer_admin",
        |d, ctx, p: TransferAdminPayload| d.transfer_admin(ctx, p.new_admin),
    )
    .await?;
    Ok(Json(receipt))
}

async fn deposit_handler(
    Path(vault): Path<Address>,
    State(state): State<AppState>,
    Json(call): Json<SignedCall>,
) -> Result<Json<Receipt<Amount>>, ApiError> {
    let receipt = execute(&state, call, "deposit", |d, ctx, p: DepositPayload| {
        d.deposit(ctx, &vault, p.assets, p.receiver)
    })
    .await?;
    state.metrics.deposits_total.inc();
    Ok(Json(receipt.map(Amount)))
}

async fn mint_shares_handler(
    Path(vault): Path<Address>,
    State(state): State<AppState>,
    Json(call): Json<SignedCall>,
) -> Result<Json<Receipt<Amount>>, ApiError> {
    let receipt = execute(&state, call, "mint_shares", |d, ctx, p: MintSharesPayload| {
        d.mint_shares(ctx, &vault, p.shares, p.receiver)
    })
    .await?;
    state.metrics.deposits_total.inc();
    Ok(Json(receipt.map(Amount)))
}

async fn withdraw_handler(
    Path(vault): Path<Address>,
    State(state): State<AppState>,
    Json(call): Json<SignedCall>,
) -> Result<Json<Receipt<Amount>>, ApiError> {
    let receipt = execute(&state, call, "withdraw", |d, ctx, p: WithdrawPayload| {
        d.withdraw(ctx, &vault, p.assets, p.receiver, p.owner)
    })
    .await?;
    state.metrics.withdrawals_total.inc();
    Ok(Json(receipt.map(Amount)))
}

async fn redeem_handler(
    Path(vault): Path<Address>,
    State(state): State<AppState>,
    Json(call): Json<SignedCall>,
) -> Result<Json<Receipt<Amount>>, ApiError> {
    let receipt = execute(&state, call, "redeem", |d, ctx, p: RedeemPayload| {
        d.redeem(ctx, &vault, p.shares, p.receiver, p.owner)
    })
    .await?;
    state.metrics.withdrawals_total.inc();
    Ok(Json(receipt.map(Amount)))
}

async fn approve_shares_handler(
    Path(vault): Path<Address>,
    State(state): State<AppState>,
    Json(call): Json<SignedCall>,
) -> Result<Json<Receipt<()>>, ApiError> {
    let receipt = execute(&state, call, "approve_shares", |d, ctx, p: ApprovePayload| {
        d.approve_shares(ctx, &vault, p.spender, p.amount)
    })
    .await?;
    Ok(Json(receipt))
}

async fn faucet_handler(
    Path(asset): Path<Address>,
    State(state): State<AppState>,
    Json(call): Json<SignedCall>,
) -> Result<Json<Receipt<()>>, ApiError> {
    let receipt = execute(&state, call, "faucet", |d, ctx, p: FaucetPayload| {
        d.faucet(ctx, &asset, p.to, p.amount)
    })
    .await?;
    Ok(Json(receipt))
}

async fn approve_asset_handler(
    Path(asset): Path<Address>,
    State(state): State<AppState>,
    Json(call): Json<SignedCall>,
) -> Result<Json<Receipt<()>>, ApiError> {
    let receipt = execute(&state, call, "approve_asset", |d, ctx, p: ApprovePayload| {
        d.approve_asset(ctx, &asset, p.spender, p.amount)
    })
    .await?;
    Ok(Json(receipt))
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// `GET /ws`: WebSocket upgrade for live event streaming.
///
/// Clients receive JSON-encoded [`NodeEvent`]s as calls commit. Client
/// messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
