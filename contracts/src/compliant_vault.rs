//! # Compliant Vault Contract
//!
//! An ERC-4626-style vault that only lets accredited investors in. Getting
//! *out* is never gated: a holder whose credential expired or was revoked
//! can always withdraw what is theirs. Locking people's money because a
//! piece of paper lapsed is not compliance, it is a lawsuit.
//!
//! The gate is the receiver of the shares, the same address `max_deposit`
//! and `max_mint` are asked about. Paying for someone else's deposit is fine
//! as long as *they* are accredited.
//!
//! ## Security Model
//!
//! - **Entry gating**: `deposit` and `mint` ask the oracle on every call.
//!   No caching, no grace period.
//! - **Rounding**: always in the vault's favour (see [`crate::share_math`]).
//! - **Atomicity**: every amount is computed and checked before the asset
//!   transfer, and vault state is only written once the transfer succeeds.
//! - **Reentrancy**: mutations take `&mut self` and `&mut dyn AssetLedger`,
//!   so the ledger cannot call back into the vault mid-operation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use nullifier_protocol::context::{CallContext, Timestamp};
use nullifier_protocol::identity::Address;

use crate::asset_token::{AssetError, AssetLedger};
use crate::oracle::{AccreditationOracle, OracleError};
use crate::share_math::{self, Rounding, ShareMathError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during vault operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// The share receiver does not hold a live credential.
    #[error("{0} is not an accredited investor")]
    NotAccredited(Address),

    /// A zero address was supplied.
    #[error("zero address")]
    ZeroAddress,

    /// The ledger passed in is not this vault's asset.
    #[error("asset mismatch: vault holds {expected}, got {found}")]
    AssetMismatch { expected: Address, found: Address },

    /// The accreditation oracle could not answer.
    #[error("accreditation oracle failed: {0}")]
    Oracle(#[from] OracleError),

    /// The underlying asset transfer failed.
    #[error("asset transfer failed: {0}")]
    Asset(#[from] AssetError),

    /// Share or asset arithmetic overflowed.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// Owner cannot withdraw that many assets.
    #[error("withdraw of {assets} exceeds max {max} for {owner}")]
    ExceedsMaxWithdraw {
        owner: Address,
        assets: u128,
        max: u128,
    },

    /// Owner cannot redeem that many shares.
    #[error("redeem of {shares} exceeds max {max} for {owner}")]
    ExceedsMaxRedeem {
        owner: Address,
        shares: u128,
        max: u128,
    },

    /// Caller's share allowance from the owner is too small.
    #[error("insufficient share allowance: {allowance} approved, {needed} needed")]
    InsufficientAllowance { allowance: u128, needed: u128 },
}

impl From<ShareMathError> for VaultError {
    fn from(_: ShareMathError) -> Self {
        VaultError::ArithmeticOverflow
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Events emitted by a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum VaultEvent {
    Deposit {
        caller: Address,
        owner: Address,
        #[serde(with = "crate::amount")]
        assets: u128,
        #[serde(with = "crate::amount")]
        shares: u128,
    },
    Withdraw {
        caller: Address,
        receiver: Address,
        owner: Address,
        #[serde(with = "crate::amount")]
        assets: u128,
        #[serde(with = "crate::amount")]
        shares: u128,
    },
    Approval {
        owner: Address,
        spender: Address,
        #[serde(with = "crate::amount")]
        shares: u128,
    },
}

/// Everything a vault stores, in serializable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    pub address: Address,
    pub asset: Address,
    pub name: String,
    pub symbol: String,
    /// Assets under management. Tracked, not read from the ledger, so a
    /// direct donation cannot move the share price.
    pub total_assets: u128,
    pub total_supply: u128,
    pub balances: BTreeMap<Address, u128>,
    /// `owner -> (spender -> shares)`.
    pub allowances: BTreeMap<Address, BTreeMap<Address, u128>>,
    pub events: Vec<VaultEvent>,
}

// ---------------------------------------------------------------------------
// CompliantVault
// ---------------------------------------------------------------------------

pub struct CompliantVault {
    state: VaultState,
    oracle: Arc<dyn AccreditationOracle>,
}

impl fmt::Debug for CompliantVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompliantVault")
            .field("address", &self.state.address)
            .field("asset", &self.state.asset)
            .field("total_assets", &self.state.total_assets)
            .field("total_supply", &self.state.total_supply)
            .finish_non_exhaustive()
    }
}

impl CompliantVault {
    /// Deploys a vault for `asset` gated by `oracle`.
    ///
    /// # Errors
    ///
    /// [`VaultError::ZeroAddress`] if the vault, the asset or the oracle's
    /// registry address is zero.
    pub fn new(
        address: Address,
        asset: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
        oracle: Arc<dyn AccreditationOracle>,
    ) -> Result<Self, VaultError> {
        if address.is_zero() || asset.is_zero() || oracle.registry_address().is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        Ok(Self {
            state: VaultState {
                address,
                asset,
                name: name.into(),
                symbol: symbol.into(),
                total_assets: 0,
                total_supply: 0,
                balances: BTreeMap::new(),
                allowances: BTreeMap::new(),
                events: Vec::new(),
            },
            oracle,
        })
    }

    /// Rebuilds a vault from a snapshot.
    pub fn restore(
        state: VaultState,
        oracle: Arc<dyn AccreditationOracle>,
    ) -> Result<Self, VaultError> {
        if state.address.is_zero() || state.asset.is_zero() || oracle.registry_address().is_zero()
        {
            return Err(VaultError::ZeroAddress);
        }
        Ok(Self { state, oracle })
    }

    pub fn snapshot(&self) -> VaultState {
        self.state.clone()
    }

    // ---- Gate ----

    /// Asks the oracle whether `user` may receive shares at `now`.
    pub fn can_deposit(&self, user: &Address, now: Timestamp) -> Result<bool, VaultError> {
        Ok(self.oracle.is_accredited(user, now)?)
    }

    fn require_can_deposit(&self, receiver: &Address, now: Timestamp) -> Result<(), VaultError> {
        if receiver.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        if !self.can_deposit(receiver, now)? {
            warn!(vault = %self.state.address, receiver = %receiver, "deposit blocked: not accredited");
            return Err(VaultError::NotAccredited(*receiver));
        }
        Ok(())
    }

    fn check_ledger(&self, ledger: &dyn AssetLedger) -> Result<(), VaultError> {
        if ledger.address() != self.state.asset {
            return Err(VaultError::AssetMismatch {
                expected: self.state.asset,
                found: ledger.address(),
            });
        }
        Ok(())
    }

    // ---- Entry ----

    /// Deposits `assets` from the caller, minting shares to `receiver`.
    pub fn deposit(
        &mut self,
        ctx: &CallContext,
        ledger: &mut dyn AssetLedger,
        assets: u128,
        receiver: Address,
    ) -> Result<u128, VaultError> {
        self.check_ledger(ledger)?;
        self.require_can_deposit(&receiver, ctx.timestamp)?;
        let shares = self.preview_deposit(assets)?;
        self.enter(ctx, ledger, assets, shares, receiver)?;
        Ok(shares)
    }

    /// Mints exactly `shares` to `receiver`, pulling the required assets.
    pub fn mint(
        &mut self,
        ctx: &CallContext,
        ledger: &mut dyn AssetLedger,
        shares: u128,
        receiver: Address,
    ) -> Result<u128, VaultError> {
        self.check_ledger(ledger)?;
        self.require_can_deposit(&receiver, ctx.timestamp)?;
        let assets = self.preview_mint(shares)?;
        self.enter(ctx, ledger, assets, shares, receiver)?;
        Ok(assets)
    }

    fn enter(
        &mut self,
        ctx: &CallContext,
        ledger: &mut dyn AssetLedger,
        assets: u128,
        shares: u128,
        receiver: Address,
    ) -> Result<(), VaultError> {
        let total_assets = self
            .state
            .total_assets
            .checked_add(assets)
            .ok_or(VaultError::ArithmeticOverflow)?;
        let total_supply = self
            .state
            .total_supply
            .checked_add(shares)
            .ok_or(VaultError::ArithmeticOverflow)?;
        // Balance <= supply.
        let balance = self.balance_of(&receiver) + shares;

        ledger.transfer_from(self.state.address, ctx.caller, self.state.address, assets)?;

        self.state.total_assets = total_assets;
        self.state.total_supply = total_supply;
        self.state.balances.insert(receiver, balance);
        self.state.events.push(VaultEvent::Deposit {
            caller: ctx.caller,
            owner: receiver,
            assets,
            shares,
        });

        info!(
            vault = %self.state.address,
            caller = %ctx.caller,
            receiver = %receiver,
            assets,
            shares,
            "deposit"
        );
        Ok(())
    }

    // ---- Exit ----

    /// Burns shares from `owner` to send exactly `assets` to `receiver`.
    pub fn withdraw(
        &mut self,
        ctx: &CallContext,
        ledger: &mut dyn AssetLedger,
        assets: u128,
        receiver: Address,
        owner: Address,
    ) -> Result<u128, VaultError> {
        self.check_ledger(ledger)?;
        let max = self.max_withdraw(&owner)?;
        if assets > max {
            return Err(VaultError::ExceedsMaxWithdraw { owner, assets, max });
        }
        let shares = self.preview_withdraw(assets)?;
        self.exit(ctx, ledger, assets, shares, receiver, owner)?;
        Ok(shares)
    }

    /// Burns exactly `shares` from `owner`, sending the assets to `receiver`.
    pub fn redeem(
        &mut self,
        ctx: &CallContext,
        ledger: &mut dyn AssetLedger,
        shares: u128,
        receiver: Address,
        owner: Address,
    ) -> Result<u128, VaultError> {
        self.check_ledger(ledger)?;
        let max = self.max_redeem(&owner);
        if shares > max {
            return Err(VaultError::ExceedsMaxRedeem { owner, shares, max });
        }
        let assets = self.preview_redeem(shares)?;
        self.exit(ctx, ledger, assets, shares, receiver, owner)?;
        Ok(assets)
    }

    fn exit(
        &mut self,
        ctx: &CallContext,
        ledger: &mut dyn AssetLedger,
        assets: u128,
        shares: u128,
        receiver: Address,
        owner: Address,
    ) -> Result<(), VaultError> {
        if receiver.is_zero() {
            return Err(VaultError::ZeroAddress);
        }

        let remaining_allowance = if ctx.caller != owner {
            let allowance = self.allowance(&owner, &ctx.caller);
            if allowance < shares {
                return Err(VaultError::InsufficientAllowance {
                    allowance,
                    needed: shares,
                });
            }
            Some(allowance - shares)
        } else {
            None
        };

        let balance = self.balance_of(&owner);
        // Rounding up in withdraw can ask for one share more than the
        // owner has only if max_withdraw was wrong; keep the check anyway.
        let new_balance = balance
            .checked_sub(shares)
            .ok_or(VaultError::ExceedsMaxRedeem {
                owner,
                shares,
                max: balance,
            })?;
        let total_supply = self
            .state
            .total_supply
            .checked_sub(shares)
            .ok_or(VaultError::ArithmeticOverflow)?;
        let total_assets = self
            .state
            .total_assets
            .checked_sub(assets)
            .ok_or(VaultError::ArithmeticOverflow)?;

        ledger.transfer(self.state.address, receiver, assets)?;

        if let Some(remaining) = remaining_allowance {
            self.state
                .allowances
                .entry(owner)
                .or_default()
                .insert(ctx.caller, remaining);
        }
        self.state.balances.insert(owner, new_balance);
        self.state.total_supply = total_supply;
        self.state.total_assets = total_assets;
        self.state.events.push(VaultEvent::Withdraw {
            caller: ctx.caller,
            receiver,
            owner,
            assets,
            shares,
        });

        info!(
            vault = %self.state.address,
            caller = %ctx.caller,
            owner = %owner,
            receiver = %receiver,
            assets,
            shares,
            "withdraw"
        );
        Ok(())
    }

    // ---- Share allowances ----

    /// Lets `spender` withdraw or redeem up to `shares` of the caller's shares.
    pub fn approve(
        &mut self,
        ctx: &CallContext,
        spender: Address,
        shares: u128,
    ) -> Result<(), VaultError> {
        if spender.is_zero() {
            return Err(VaultError::ZeroAddress);
        }
        self.state
            .allowances
            .entry(ctx.caller)
            .or_default()
            .insert(spender, shares);
        self.state.events.push(VaultEvent::Approval {
            owner: ctx.caller,
            spender,
            shares,
        });
        Ok(())
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.state
            .allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    // ---- Conversions ----

    pub fn convert_to_shares(&self, assets: u128) -> Result<u128, VaultError> {
        self.to_shares(assets, Rounding::Floor)
    }

    pub fn convert_to_assets(&self, shares: u128) -> Result<u128, VaultError> {
        self.to_assets(shares, Rounding::Floor)
    }

    pub fn preview_deposit(&self, assets: u128) -> Result<u128, VaultError> {
        self.to_shares(assets, Rounding::Floor)
    }

    pub fn preview_mint(&self, shares: u128) -> Result<u128, VaultError> {
        self.to_assets(shares, Rounding::Ceil)
    }

    pub fn preview_withdraw(&self, assets: u128) -> Result<u128, VaultError> {
        self.to_shares(assets, Rounding::Ceil)
    }

    pub fn preview_redeem(&self, shares: u128) -> Result<u128, VaultError> {
        self.to_assets(shares, Rounding::Floor)
    }

    fn to_shares(&self, assets: u128, rounding: Rounding) -> Result<u128, VaultError> {
        Ok(share_math::convert_to_shares(
            assets,
            self.state.total_assets,
            self.state.total_supply,
            rounding,
        )?)
    }

    fn to_assets(&self, shares: u128, rounding: Rounding) -> Result<u128, VaultError> {
        Ok(share_math::convert_to_assets(
            shares,
            self.state.total_assets,
            self.state.total_supply,
            rounding,
        )?)
    }

    // ---- Limits ----

    /// Unlimited for an accredited receiver, zero otherwise.
    pub fn max_deposit(&self, receiver: &Address, now: Timestamp) -> Result<u128, VaultError> {
        Ok(if self.can_deposit(receiver, now)? {
            u128::MAX
        } else {
            0
        })
    }

    pub fn max_mint(&self, receiver: &Address, now: Timestamp) -> Result<u128, VaultError> {
        self.max_deposit(receiver, now)
    }

    pub fn max_withdraw(&self, owner: &Address) -> Result<u128, VaultError> {
        self.to_assets(self.balance_of(owner), Rounding::Floor)
    }

    pub fn max_redeem(&self, owner: &Address) -> u128 {
        self.balance_of(owner)
    }

    // ---- Views ----

    pub fn total_assets(&self) -> u128 {
        self.state.total_assets
    }

    pub fn total_supply(&self) -> u128 {
        self.state.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.state.balances.get(account).copied().unwrap_or(0)
    }

    pub fn asset(&self) -> Address {
        self.state.asset
    }

    pub fn address(&self) -> Address {
        self.state.address
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn symbol(&self) -> &str {
        &self.state.symbol
    }

    pub fn events(&self) -> &[VaultEvent] {
        &self.state.events
    }

    pub fn take_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.state.events)
    }
}
