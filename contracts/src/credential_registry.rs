//! # Credential Registry Contract
//!
//! Issues soulbound accreditation credentials. A holder brings an attestation
//! proof, the registry checks it, and if everything lines up the holder gets
//! a non-transferable token that says "accredited until `expires_at`".
//!
//! ```text
//!              mint_credential                 revoke_credential
//! NoCredential ───────────────▶ Active ──────────────────────────▶ Revoked
//!                                  │                                  (terminal)
//!                                  │ now >= expires_at
//!                                  ▼
//!                               Expired (derived, never stored)
//! ```
//!
//! A holder whose credential expired or was revoked may mint again with a
//! fresh proof and receives a new token id. Old records stay addressable by
//! token id forever; nothing is ever deleted.
//!
//! ## Security Model
//!
//! - **Proof binding**: the claim's holder must be the caller, and the
//!   attested type must be exactly the requested type.
//! - **Freshness**: claims older than `max_claim_age_secs`, or stamped more
//!   than `MAX_CLOCK_SKEW_SECS` in the future, are rejected.
//! - **Single use**: every accepted proof's nullifier is consumed.
//! - **Soulbound**: every transfer and approval entry point fails.
//! - **Admin**: only revocation and admin handover are privileged.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use nullifier_protocol::attestation::{
    AccreditationType, Claim, Nullifier, ProofVerifier, VerificationError,
};
use nullifier_protocol::config::{
    CREDENTIAL_TOKEN_NAME, CREDENTIAL_TOKEN_SYMBOL, CREDENTIAL_VALIDITY_SECS, MAX_CLAIM_AGE_SECS,
    MAX_CLOCK_SKEW_SECS,
};
use nullifier_protocol::context::{CallContext, Timestamp};
use nullifier_protocol::identity::Address;

/// Credential token id. Assigned from 1 upward, never reused.
pub type TokenId = u64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a proof was not good enough to mint.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProofRejection {
    /// The verifier refused the proof bytes.
    #[error("verification failed: {0}")]
    Verification(#[from] VerificationError),

    /// The proof was issued for someone else.
    #[error("proof holder {found} does not match caller {expected}")]
    HolderMismatch { expected: Address, found: Address },

    /// The proof attests a different accreditation basis.
    #[error("proof attests {attested}, but {requested} was requested")]
    TypeMismatch {
        requested: AccreditationType,
        attested: AccreditationType,
    },

    /// The attestor looked and said no.
    #[error("accreditation threshold not met")]
    ThresholdNotMet,

    /// The claim is older than the registry accepts.
    #[error("claim from {claimed_at} is stale at {now}")]
    Stale { claimed_at: Timestamp, now: Timestamp },

    /// The claim is stamped in the future.
    #[error("claim from {claimed_at} is in the future at {now}")]
    FromFuture { claimed_at: Timestamp, now: Timestamp },

    /// This proof has already minted a credential.
    #[error("nullifier {0} already used")]
    NullifierUsed(Nullifier),
}

/// Errors that can occur during registry operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The caller already holds a live credential.
    #[error("{0} already holds an active credential")]
    AlreadyHasCredential(Address),

    /// The requested type tag is not Income, NetWorth or Both.
    #[error("invalid accreditation type tag: {0}")]
    InvalidAccreditationType(u8),

    /// The proof was rejected.
    #[error("invalid proof: {0}")]
    InvalidProof(#[from] ProofRejection),

    /// The caller is not the registry admin.
    #[error("unauthorized: caller {0} is not the registry admin")]
    Unauthorized(Address),

    /// The holder has never had a credential.
    #[error("no credential for {0}")]
    CredentialNotFound(Address),

    /// The holder's latest credential was revoked.
    #[error("credential {0} is revoked")]
    CredentialIsRevoked(TokenId),

    /// The holder's latest credential has expired.
    #[error("credential {token_id} expired at {expires_at}")]
    CredentialExpired {
        token_id: TokenId,
        expires_at: Timestamp,
    },

    /// No credential carries this token id.
    #[error("token {0} does not exist")]
    TokenNotFound(TokenId),

    /// Credentials cannot be transferred or approved.
    #[error("credential tokens are soulbound")]
    SoulboundToken,

    /// A zero address was supplied.
    #[error("zero address")]
    ZeroAddress,

    /// The registry configuration is unusable.
    #[error("invalid registry config: {0}")]
    InvalidConfig(String),

    /// Token id or expiry arithmetic overflowed.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Per-instance registry parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// How long a credential stays valid after minting.
    pub validity_period_secs: u64,
    /// Oldest claim accepted at mint time.
    pub max_claim_age_secs: u64,
    pub name: String,
    pub symbol: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            validity_period_secs: CREDENTIAL_VALIDITY_SECS,
            max_claim_age_secs: MAX_CLAIM_AGE_SECS,
            name: CREDENTIAL_TOKEN_NAME.to_string(),
            symbol: CREDENTIAL_TOKEN_SYMBOL.to_string(),
        }
    }
}

impl RegistryConfig {
    fn validate(&self) -> Result<(), RegistryError> {
        if self.validity_period_secs == 0 {
            return Err(RegistryError::InvalidConfig(
                "validity period must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// A credential record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub token_id: TokenId,
    pub holder: Address,
    pub accreditation_type: AccreditationType,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub revoked: bool,
}

impl Credential {
    /// Not revoked and not yet expired.
    pub fn is_live(&self, now: Timestamp) -> bool {
        !self.revoked && now < self.expires_at
    }

    pub fn status(&self, now: Timestamp) -> CredentialStatus {
        if self.revoked {
            CredentialStatus::Revoked
        } else if now >= self.expires_at {
            CredentialStatus::Expired
        } else {
            CredentialStatus::Active
        }
    }
}

/// Where a holder stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
    /// Never minted.
    None,
    Active,
    Expired,
    Revoked,
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialStatus::None => write!(f, "None"),
            CredentialStatus::Active => write!(f, "Active"),
            CredentialStatus::Expired => write!(f, "Expired"),
            CredentialStatus::Revoked => write!(f, "Revoked"),
        }
    }
}

/// Events emitted by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum RegistryEvent {
    CredentialMinted {
        holder: Address,
        token_id: TokenId,
        accreditation_type: AccreditationType,
        expires_at: Timestamp,
    },
    CredentialRevoked {
        holder: Address,
        token_id: TokenId,
    },
    AdminTransferred {
        previous: Address,
        new: Address,
    },
}

/// Everything the registry stores, in serializable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    pub address: Address,
    pub admin: Address,
    pub config: RegistryConfig,
    pub next_token_id: TokenId,
    pub credentials: BTreeMap<TokenId, Credential>,
    /// Latest token per holder.
    pub latest: BTreeMap<Address, TokenId>,
    /// Tokens ever bound per holder.
    pub balances: BTreeMap<Address, u64>,
    pub nullifiers: BTreeSet<Nullifier>,
    pub events: Vec<RegistryEvent>,
}

// ---------------------------------------------------------------------------
// CredentialRegistry
// ---------------------------------------------------------------------------

/// The soulbound credential registry.
pub struct CredentialRegistry {
    state: RegistryState,
    verifier: Arc<dyn ProofVerifier>,
}

impl fmt::Debug for CredentialRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRegistry")
            .field("address", &self.state.address)
            .field("admin", &self.state.admin)
            .field("total_supply", &self.total_supply())
            .finish_non_exhaustive()
    }
}

impl CredentialRegistry {
    /// Deploys a registry at `address` administered by `admin`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ZeroAddress`] for a zero address or admin,
    /// [`RegistryError::InvalidConfig`] for a zero validity period.
    pub fn new(
        address: Address,
        admin: Address,
        verifier: Arc<dyn ProofVerifier>,
        config: RegistryConfig,
    ) -> Result<Self, RegistryError> {
        if address.is_zero() || admin.is_zero() {
            return Err(RegistryError::ZeroAddress);
        }
        config.validate()?;
        Ok(Self {
            state: RegistryState {
                address,
                admin,
                config,
                next_token_id: 1,
                credentials: BTreeMap::new(),
                latest: BTreeMap::new(),
                balances: BTreeMap::new(),
                nullifiers: BTreeSet::new(),
                events: Vec::new(),
            },
            verifier,
        })
    }

    /// Rebuilds a registry from a snapshot.
    pub fn restore(
        state: RegistryState,
        verifier: Arc<dyn ProofVerifier>,
    ) -> Result<Self, RegistryError> {
        if state.address.is_zero() || state.admin.is_zero() {
            return Err(RegistryError::ZeroAddress);
        }
        state.config.validate()?;
        Ok(Self { state, verifier })
    }

    /// A copy of the full registry state.
    pub fn snapshot(&self) -> RegistryState {
        self.state.clone()
    }

    // ---- Mutations ----

    /// Mints a credential for the caller from an attestation proof.
    ///
    /// Checks run in a fixed order: live credential, type tag, then the
    /// proof itself. Nothing is written unless every check passes.
    ///
    /// # Errors
    ///
    /// [`RegistryError::AlreadyHasCredential`],
    /// [`RegistryError::InvalidAccreditationType`],
    /// [`RegistryError::InvalidProof`].
    pub fn mint_credential(
        &mut self,
        ctx: &CallContext,
        proof: &[u8],
        type_tag: u8,
    ) -> Result<TokenId, RegistryError> {
        let (claim, accreditation_type) = match self.check_mint(ctx, proof, type_tag) {
            Ok(ok) => ok,
            Err(e) => {
                warn!(holder = %ctx.caller, type_tag, error = %e, "credential mint rejected");
                return Err(e);
            }
        };

        let token_id = self.state.next_token_id;
        let next = token_id
            .checked_add(1)
            .ok_or(RegistryError::ArithmeticOverflow)?;
        let expires_at = ctx
            .timestamp
            .checked_add(self.state.config.validity_period_secs)
            .ok_or(RegistryError::ArithmeticOverflow)?;

        let holder = ctx.caller;
        self.state.next_token_id = next;
        self.state.credentials.insert(
            token_id,
            Credential {
                token_id,
                holder,
                accreditation_type,
                issued_at: ctx.timestamp,
                expires_at,
                revoked: false,
            },
        );
        self.state.latest.insert(holder, token_id);
        *self.state.balances.entry(holder).or_insert(0) += 1;
        self.state.nullifiers.insert(claim.nullifier);
        self.state.events.push(RegistryEvent::CredentialMinted {
            holder,
            token_id,
            accreditation_type,
            expires_at,
        });

        info!(
            holder = %holder,
            token_id,
            accreditation_type = %accreditation_type,
            expires_at,
            provider = %claim.provider,
            "credential minted"
        );
        Ok(token_id)
    }

    fn check_mint(
        &self,
        ctx: &CallContext,
        proof: &[u8],
        type_tag: u8,
    ) -> Result<(Claim, AccreditationType), RegistryError> {
        let now = ctx.timestamp;
        if self.is_accredited(&ctx.caller, now) {
            return Err(RegistryError::AlreadyHasCredential(ctx.caller));
        }

        let requested = AccreditationType::try_from(type_tag)
            .ok()
            .filter(|t| t.is_accreditation())
            .ok_or(RegistryError::InvalidAccreditationType(type_tag))?;

        let claim = self
            .verifier
            .verify(proof)
            .map_err(ProofRejection::Verification)?;

        if claim.holder != ctx.caller {
            return Err(ProofRejection::HolderMismatch {
                expected: ctx.caller,
                found: claim.holder,
            }
            .into());
        }
        if claim.accreditation_type != requested {
            return Err(ProofRejection::TypeMismatch {
                requested,
                attested: claim.accreditation_type,
            }
            .into());
        }
        if !claim.meets_threshold {
            return Err(ProofRejection::ThresholdNotMet.into());
        }
        if claim.timestamp > now.saturating_add(MAX_CLOCK_SKEW_SECS) {
            return Err(ProofRejection::FromFuture {
                claimed_at: claim.timestamp,
                now,
            }
            .into());
        }
        if now.saturating_sub(claim.timestamp) > self.state.config.max_claim_age_secs {
            return Err(ProofRejection::Stale {
                claimed_at: claim.timestamp,
                now,
            }
            .into());
        }
        if self.state.nullifiers.contains(&claim.nullifier) {
            return Err(ProofRejection::NullifierUsed(claim.nullifier).into());
        }

        Ok((claim, requested))
    }

    /// Revokes `holder`'s latest credential. Admin only.
    ///
    /// Returns `true` if this call revoked it, `false` if it was already
    /// revoked (no event is emitted the second time).
    ///
    /// # Errors
    ///
    /// [`RegistryError::Unauthorized`], [`RegistryError::CredentialNotFound`].
    pub fn revoke_credential(
        &mut self,
        ctx: &CallContext,
        holder: &Address,
    ) -> Result<bool, RegistryError> {
        if ctx.caller != self.state.admin {
            warn!(caller = %ctx.caller, holder = %holder, "unauthorized revocation attempt");
            return Err(RegistryError::Unauthorized(ctx.caller));
        }
        let token_id = self.token_id_of(holder)?;
        let credential = self
            .state
            .credentials
            .get_mut(&token_id)
            .ok_or(RegistryError::TokenNotFound(token_id))?;

        if credential.revoked {
            return Ok(false);
        }
        credential.revoked = true;
        self.state.events.push(RegistryEvent::CredentialRevoked {
            holder: *holder,
            token_id,
        });

        info!(holder = %holder, token_id, "credential revoked");
        Ok(true)
    }

    /// Hands the admin role to `new_admin`.
    pub fn transfer_admin(
        &mut self,
        ctx: &CallContext,
        new_admin: Address,
    ) -> Result<(), RegistryError> {
        if ctx.caller != self.state.admin {
            return Err(RegistryError::Unauthorized(ctx.caller));
        }
        if new_admin.is_zero() {
            return Err(RegistryError::ZeroAddress);
        }
        let previous = std::mem::replace(&mut self.state.admin, new_admin);
        self.state.events.push(RegistryEvent::AdminTransferred {
            previous,
            new: new_admin,
        });
        info!(previous = %previous, new = %new_admin, "registry admin transferred");
        Ok(())
    }

    // ---- Soulbound stubs ----

    pub fn transfer_from(
        &mut self,
        ctx: &CallContext,
        _from: Address,
        _to: Address,
        token_id: TokenId,
    ) -> Result<(), RegistryError> {
        warn!(caller = %ctx.caller, token_id, "transfer of soulbound credential refused");
        Err(RegistryError::SoulboundToken)
    }

    pub fn safe_transfer_from(
        &mut self,
        ctx: &CallContext,
        from: Address,
        to: Address,
        token_id: TokenId,
    ) -> Result<(), RegistryError> {
        self.transfer_from(ctx, from, to, token_id)
    }

    pub fn approve(
        &mut self,
        _ctx: &CallContext,
        _to: Address,
        _token_id: TokenId,
    ) -> Result<(), RegistryError> {
        Err(RegistryError::SoulboundToken)
    }

    pub fn set_approval_for_all(
        &mut self,
        _ctx: &CallContext,
        _operator: Address,
        _approved: bool,
    ) -> Result<(), RegistryError> {
        Err(RegistryError::SoulboundToken)
    }

    // ---- Queries ----

    /// Whether `holder` has a live credential at `now`. Never fails.
    pub fn is_accredited(&self, holder: &Address, now: Timestamp) -> bool {
        self.latest_credential(holder)
            .map(|c| c.is_live(now))
            .unwrap_or(false)
    }

    /// Whether `holder` has ever had a credential.
    pub fn has_credential(&self, holder: &Address) -> bool {
        self.state.latest.contains_key(holder)
    }

    /// The holder's latest credential, live or not.
    pub fn get_credential(&self, holder: &Address) -> Result<&Credential, RegistryError> {
        self.latest_credential(holder)
            .ok_or(RegistryError::CredentialNotFound(*holder))
    }

    pub fn token_id_of(&self, holder: &Address) -> Result<TokenId, RegistryError> {
        self.state
            .latest
            .get(holder)
            .copied()
            .ok_or(RegistryError::CredentialNotFound(*holder))
    }

    pub fn credential_status(&self, holder: &Address, now: Timestamp) -> CredentialStatus {
        self.latest_credential(holder)
            .map(|c| c.status(now))
            .unwrap_or(CredentialStatus::None)
    }

    /// The live credential of `holder`, or the specific reason there isn't one.
    pub fn require_accredited(
        &self,
        holder: &Address,
        now: Timestamp,
    ) -> Result<&Credential, RegistryError> {
        let credential = self.get_credential(holder)?;
        match credential.status(now) {
            CredentialStatus::Active => Ok(credential),
            CredentialStatus::Revoked => Err(RegistryError::CredentialIsRevoked(credential.token_id)),
            CredentialStatus::Expired | CredentialStatus::None => {
                Err(RegistryError::CredentialExpired {
                    token_id: credential.token_id,
                    expires_at: credential.expires_at,
                })
            }
        }
    }

    pub fn owner_of(&self, token_id: TokenId) -> Result<Address, RegistryError> {
        self.credential_by_token(token_id).map(|c| c.holder)
    }

    pub fn credential_by_token(&self, token_id: TokenId) -> Result<&Credential, RegistryError> {
        self.state
            .credentials
            .get(&token_id)
            .ok_or(RegistryError::TokenNotFound(token_id))
    }

    /// Number of tokens ever bound to `holder`.
    pub fn balance_of(&self, holder: &Address) -> u64 {
        self.state.balances.get(holder).copied().unwrap_or(0)
    }

    /// Number of tokens ever minted.
    pub fn total_supply(&self) -> u64 {
        self.state.credentials.len() as u64
    }

    /// Number of credentials live at `now`.
    pub fn live_count(&self, now: Timestamp) -> usize {
        self.state
            .latest
            .values()
            .filter_map(|id| self.state.credentials.get(id))
            .filter(|c| c.is_live(now))
            .count()
    }

    pub fn is_nullifier_used(&self, nullifier: &Nullifier) -> bool {
        self.state.nullifiers.contains(nullifier)
    }

    pub fn name(&self) -> &str {
        &self.state.config.name
    }

    pub fn symbol(&self) -> &str {
        &self.state.config.symbol
    }

    pub fn admin(&self) -> Address {
        self.state.admin
    }

    pub fn address(&self) -> Address {
        self.state.address
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.state.config
    }

    /// The full event log.
    pub fn events(&self) -> &[RegistryEvent] {
        &self.state.events
    }

    /// Drains the event log.
    pub fn take_events(&mut self) -> Vec<RegistryEvent> {
        std::mem::take(&mut self.state.events)
    }

    fn latest_credential(&self, holder: &Address) -> Option<&Credential> {
        self.state
            .latest
            .get(holder)
            .and_then(|id| self.state.credentials.get(id))
    }
}
