//! # Asset Token Contract
//!
//! The fungible token a vault accepts. Think USDC on a test chain: an issuer
//! that can mint, plus the usual `transfer`, `approve` and `transfer_from`.
//! Vaults never touch an [`AssetToken`] directly. They go through the
//! [`AssetLedger`] trait, which is the only thing a vault needs from "the
//! token contract over there".
//!
//! ## Security Model
//!
//! - **Mint gating**: only the issuer fixed at construction can mint.
//! - **Allowances**: `transfer_from` spends exactly the allowance it uses
//!   and fails without touching anything if the allowance or balance falls
//!   short.
//! - **Supply tracking**: total supply and balances move together. Overflow
//!   is checked on every operation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use nullifier_protocol::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during asset token operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// The caller is not the issuer of this token.
    #[error("unauthorized: only the issuer can mint this token")]
    UnauthorizedMint,

    /// A zero address was supplied where an account is required.
    #[error("zero address")]
    ZeroAddress,

    /// The account does not hold enough tokens.
    #[error("insufficient balance: account has {balance}, needs {needed}")]
    InsufficientBalance {
        /// Current balance of the account.
        balance: u128,
        /// Amount the operation needed.
        needed: u128,
    },

    /// The spender's allowance does not cover the transfer.
    #[error("insufficient allowance: {allowance} approved, {needed} requested")]
    InsufficientAllowance {
        /// Remaining allowance.
        allowance: u128,
        /// Amount the spender tried to move.
        needed: u128,
    },

    /// A supply or balance overflow would occur.
    #[error("supply overflow: minting {amount} would exceed u128::MAX")]
    SupplyOverflow {
        /// The amount that was attempted.
        amount: u128,
    },
}

// ---------------------------------------------------------------------------
// AssetLedger
// ---------------------------------------------------------------------------

/// What a vault needs from its underlying token.
///
/// `spender` is whoever executes the transfer on the owner's behalf: the
/// vault itself when pulling a deposit.
pub trait AssetLedger {
    /// Address of the token contract.
    fn address(&self) -> Address;

    fn balance_of(&self, account: &Address) -> u128;

    /// Move `amount` from `from` to `to`, charged against the allowance
    /// `from` granted `spender`.
    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), AssetError>;

    /// Move `amount` out of `from`'s own balance.
    fn transfer(&mut self, from: Address, to: Address, amount: u128) -> Result<(), AssetError>;
}

// ---------------------------------------------------------------------------
// AssetToken
// ---------------------------------------------------------------------------

/// An ERC-20-shaped token ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetToken {
    /// Contract address.
    address: Address,
    /// Human-readable name (e.g., "Test USD Coin").
    name: String,
    /// Ticker symbol (e.g., "tUSDC").
    symbol: String,
    /// Number of decimal places.
    decimals: u8,
    /// The only account allowed to mint.
    issuer: Address,
    total_supply: u128,
    balances: BTreeMap<Address, u128>,
    /// `owner -> (spender -> remaining)`.
    allowances: BTreeMap<Address, BTreeMap<Address, u128>>,
}

impl AssetToken {
    /// Creates a token with zero supply.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::ZeroAddress`] if the contract or issuer address
    /// is zero.
    pub fn new(
        address: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
        decimals: u8,
        issuer: Address,
    ) -> Result<Self, AssetError> {
        if address.is_zero() || issuer.is_zero() {
            return Err(AssetError::ZeroAddress);
        }
        Ok(Self {
            address,
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            issuer,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        })
    }

    /// Mints `amount` to `to`. Only the issuer may call this.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::UnauthorizedMint`] if `caller` is not the issuer,
    /// [`AssetError::ZeroAddress`] for a zero recipient, and
    /// [`AssetError::SupplyOverflow`] if supply would overflow.
    pub fn mint(&mut self, caller: Address, to: Address, amount: u128) -> Result<(), AssetError> {
        if caller != self.issuer {
            return Err(AssetError::UnauthorizedMint);
        }
        if to.is_zero() {
            return Err(AssetError::ZeroAddress);
        }

        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(AssetError::SupplyOverflow { amount })?;
        // Balance <= supply, so this cannot overflow once supply didn't.
        let new_balance = self.balance_of(&to) + amount;

        self.total_supply = new_supply;
        self.balances.insert(to, new_balance);

        tracing::debug!(token = %self.symbol, to = %to, amount, "asset minted");
        Ok(())
    }

    /// Sets `spender`'s allowance over `owner`'s tokens to `amount`.
    pub fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        amount: u128,
    ) -> Result<(), AssetError> {
        if spender.is_zero() {
            return Err(AssetError::ZeroAddress);
        }
        self.allowances
            .entry(owner)
            .or_default()
            .insert(spender, amount);
        Ok(())
    }

    /// Remaining allowance `owner` granted `spender`.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn issuer(&self) -> Address {
        self.issuer
    }

    /// Moves balance with every check done before any write.
    fn move_balance(&mut self, from: Address, to: Address, amount: u128) -> Result<(), AssetError> {
        if to.is_zero() {
            return Err(AssetError::ZeroAddress);
        }
        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(AssetError::InsufficientBalance {
                balance: from_balance,
                needed: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(AssetError::SupplyOverflow { amount })?;

        self.balances.insert(from, from_balance - amount);
        self.balances.insert(to, to_balance);
        Ok(())
    }
}

impl AssetLedger for AssetToken {
    fn address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(), AssetError> {
        let allowance = self.allowance(&from, &spender);
        if allowance < amount {
            return Err(AssetError::InsufficientAllowance {
                allowance,
                needed: amount,
            });
        }
        self.move_balance(from, to, amount)?;
        // Only spend the allowance once the move has gone through.
        self.allowances
            .entry(from)
            .or_default()
            .insert(spender, allowance - amount);
        Ok(())
    }

    fn transfer(&mut self, from: Address, to: Address, amount: u128) -> Result<(), AssetError> {
        self.move_balance(from, to, amount)
    }
}
