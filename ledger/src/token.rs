//! # Token Ledger
//!
//! Fungible balance and allowance bookkeeping for a single asset. One
//! [`TokenLedger`] instance is the primary INGOT token; further instances
//! stand in for the external backing assets accepted as collateral.
//!
//! ## Security Model
//!
//! - **Supply gating**: the public [`mint`](FungibleLedger::mint) and
//!   [`burn`](FungibleLedger::burn) entry points exist for standard-interface
//!   compatibility and fail unconditionally. Supply changes go through the
//!   crate-internal primitives, reachable only from the collateral engine.
//! - **Burn-by-allowance**: burning reuses the one authorization primitive
//!   the ledger already has. A holder pre-approves the system account as
//!   spender; the burn consumes that allowance like a transfer to a sink.
//! - **No wrapping**: every balance and supply update is overflow-checked.
//!   Insufficient funds fail loudly; nothing saturates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::config::TOKEN_DECIMALS;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during token ledger operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The account does not hold enough tokens for this operation.
    #[error("insufficient balance: account has {balance}, needs {amount}")]
    InsufficientBalance {
        /// Current balance of the account.
        balance: u64,
        /// Amount the operation required.
        amount: u64,
    },

    /// The spender's authorized budget does not cover this operation.
    #[error("insufficient allowance: granted {allowance}, needs {amount}")]
    InsufficientAllowance {
        /// Currently authorized amount.
        allowance: u64,
        /// Amount the operation required.
        amount: u64,
    },

    /// A supply or balance counter would overflow `u64`.
    #[error("amount overflow: operation on {amount} would exceed u64::MAX")]
    AmountOverflow {
        /// The amount that was attempted.
        amount: u64,
    },

    /// Direct minting is forbidden — supply expands only through the
    /// collateral engine.
    #[error("mint is restricted to the collateral engine")]
    MintRestricted,

    /// Direct burning is forbidden — supply contracts only through the
    /// collateral engine.
    #[error("burn is restricted to the collateral engine")]
    BurnRestricted,
}

// ---------------------------------------------------------------------------
// Capability interface
// ---------------------------------------------------------------------------

/// The fungible-ledger capability the collateral engine consumes.
///
/// The engine never assumes its backing assets are [`TokenLedger`]s — any
/// balance store that can report allowances and move funds on behalf of an
/// owner will do. Callers are identified by plain account strings; there is
/// no ambient "message sender", so every operation names its actor
/// explicitly.
pub trait FungibleLedger {
    /// Stable identifier of this asset, used to key vaults.
    fn asset_id(&self) -> &str;

    /// Human-readable token name.
    fn name(&self) -> &str;

    /// Ticker symbol.
    fn symbol(&self) -> &str;

    /// Decimal places. Display metadata only — amounts are base units.
    fn decimals(&self) -> u8;

    /// Current total supply.
    fn total_supply(&self) -> u64;

    /// Balance of `account`, 0 if the account has never been credited.
    fn balance_of(&self, account: &str) -> u64;

    /// Remaining budget `spender` may move on behalf of `owner`.
    fn allowance(&self, owner: &str, spender: &str) -> u64;

    /// Moves `amount` from `from` to `to`.
    fn transfer(&mut self, from: &str, to: &str, amount: u64) -> Result<(), TokenError>;

    /// Sets the allowance of `spender` over `owner`'s funds to `amount`.
    fn approve(&mut self, owner: &str, spender: &str, amount: u64) -> Result<(), TokenError>;

    /// Raises the allowance of `spender` over `owner`'s funds by `amount`.
    fn increase_allowance(
        &mut self,
        owner: &str,
        spender: &str,
        amount: u64,
    ) -> Result<(), TokenError>;

    /// Moves `amount` from `owner` to `to`, authorized by and deducted from
    /// `spender`'s allowance.
    fn transfer_from(
        &mut self,
        spender: &str,
        owner: &str,
        to: &str,
        amount: u64,
    ) -> Result<(), TokenError>;

    /// Public mint entry point. Always fails — see the module docs.
    fn mint(&mut self, account: &str, amount: u64) -> Result<(), TokenError>;

    /// Public burn entry point. Always fails — see the module docs.
    fn burn(&mut self, account: &str, amount: u64) -> Result<(), TokenError>;
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// In-memory fungible ledger: supply, balances, and allowances for one asset.
///
/// Invariant: the sum of all balance entries equals `total_supply`. Both
/// only change together, through the transfer and (privileged) mint/burn
/// paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLedger {
    /// Stable asset identifier (vault key for backing assets).
    asset_id: String,
    /// Human-readable token name.
    name: String,
    /// Ticker symbol.
    symbol: String,
    /// Sum of all balances.
    total_supply: u64,
    /// Per-account balances. Absence means zero.
    balances: HashMap<String, u64>,
    /// Authorized-transfer budgets: `owner -> spender -> amount`.
    allowances: HashMap<String, HashMap<String, u64>>,
}

impl TokenLedger {
    /// Creates a ledger and mints `initial_supply` to `deployer`.
    pub fn new(asset_id: &str, name: &str, symbol: &str, initial_supply: u64, deployer: &str) -> Self {
        let mut balances = HashMap::new();
        if initial_supply > 0 {
            balances.insert(deployer.to_string(), initial_supply);
        }
        Self {
            asset_id: asset_id.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            total_supply: initial_supply,
            balances,
            allowances: HashMap::new(),
        }
    }

    // -- privileged primitives ---------------------------------------------

    /// Expands supply in favor of `account`. Crate-internal: only the
    /// collateral and reward paths may create tokens.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::AmountOverflow`] if supply or the recipient
    /// balance would exceed `u64::MAX`.
    pub(crate) fn mint_internal(&mut self, account: &str, amount: u64) -> Result<(), TokenError> {
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::AmountOverflow { amount })?;
        let balance = self.balances.entry(account.to_string()).or_insert(0);
        let new_balance = balance
            .checked_add(amount)
            .ok_or(TokenError::AmountOverflow { amount })?;
        *balance = new_balance;
        self.total_supply = new_supply;
        Ok(())
    }

    /// Contracts supply at `owner`'s expense, spending the allowance `owner`
    /// granted to `spender`. Crate-internal: this is the transfer-to-sink
    /// burn the engine uses during redemption.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InsufficientAllowance`] if `owner` has not
    /// authorized at least `amount` to `spender`, and
    /// [`TokenError::InsufficientBalance`] if the funds are not there.
    pub(crate) fn burn_internal(
        &mut self,
        owner: &str,
        spender: &str,
        amount: u64,
    ) -> Result<(), TokenError> {
        let granted = self.allowance(owner, spender);
        if granted < amount {
            return Err(TokenError::InsufficientAllowance {
                allowance: granted,
                amount,
            });
        }
        let balance = self.balance_of(owner);
        if balance < amount {
            return Err(TokenError::InsufficientBalance { balance, amount });
        }

        self.set_allowance(owner, spender, granted - amount);
        self.set_balance(owner, balance - amount);
        self.total_supply -= amount;
        Ok(())
    }

    // -- internals ---------------------------------------------------------

    fn set_allowance(&mut self, owner: &str, spender: &str, amount: u64) {
        self.allowances
            .entry(owner.to_string())
            .or_default()
            .insert(spender.to_string(), amount);
    }

    /// Writes an absolute balance. Zero balances are dropped so that
    /// "no entry" and "zero" stay the same observable state.
    fn set_balance(&mut self, account: &str, new_balance: u64) {
        if new_balance == 0 {
            self.balances.remove(account);
        } else {
            self.balances.insert(account.to_string(), new_balance);
        }
    }
}

impl FungibleLedger for TokenLedger {
    fn asset_id(&self) -> &str {
        &self.asset_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn decimals(&self) -> u8 {
        TOKEN_DECIMALS
    }

    fn total_supply(&self) -> u64 {
        self.total_supply
    }

    fn balance_of(&self, account: &str) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &str, spender: &str) -> u64 {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(&mut self, from: &str, to: &str, amount: u64) -> Result<(), TokenError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(TokenError::InsufficientBalance {
                balance: from_balance,
                amount,
            });
        }
        if from == to {
            return Ok(()); // a self-transfer moves nothing
        }
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::AmountOverflow { amount })?;

        self.set_balance(from, from_balance - amount);
        self.set_balance(to, to_balance);
        Ok(())
    }

    fn approve(&mut self, owner: &str, spender: &str, amount: u64) -> Result<(), TokenError> {
        self.set_allowance(owner, spender, amount);
        Ok(())
    }

    fn increase_allowance(
        &mut self,
        owner: &str,
        spender: &str,
        amount: u64,
    ) -> Result<(), TokenError> {
        let current = self.allowance(owner, spender);
        let raised = current
            .checked_add(amount)
            .ok_or(TokenError::AmountOverflow { amount })?;
        self.set_allowance(owner, spender, raised);
        Ok(())
    }

    fn transfer_from(
        &mut self,
        spender: &str,
        owner: &str,
        to: &str,
        amount: u64,
    ) -> Result<(), TokenError> {
        let granted = self.allowance(owner, spender);
        if granted < amount {
            return Err(TokenError::InsufficientAllowance {
                allowance: granted,
                amount,
            });
        }
        self.transfer(owner, to, amount)?;
        self.set_allowance(owner, spender, granted - amount);
        Ok(())
    }

    fn mint(&mut self, _account: &str, _amount: u64) -> Result<(), TokenError> {
        Err(TokenError::MintRestricted)
    }

    fn burn(&mut self, _account: &str, _amount: u64) -> Result<(), TokenError> {
        Err(TokenError::BurnRestricted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> TokenLedger {
        TokenLedger::new("EE", "DAEE", "EE", 20_000, "alice")
    }

    #[test]
    fn initial_supply_goes_to_deployer() {
        let l = ledger();
        assert_eq!(l.total_supply(), 20_000);
        assert_eq!(l.balance_of("alice"), 20_000);
        assert_eq!(l.symbol(), "EE");
        assert_eq!(l.name(), "DAEE");
        assert_eq!(l.decimals(), 18);
    }

    #[test]
    fn transfer_moves_balance() {
        let mut l = ledger();
        l.transfer("alice", "bob", 10).unwrap();
        assert_eq!(l.balance_of("alice"), 19_990);
        assert_eq!(l.balance_of("bob"), 10);
        assert_eq!(l.total_supply(), 20_000);
    }

    #[test]
    fn transfer_beyond_balance_rejected() {
        let mut l = ledger();
        assert!(l.transfer("bob", "alice", 1).is_err());
        assert!(l.transfer("alice", "bob", 20_001).is_err());
    }

    #[test]
    fn self_transfer_is_a_noop() {
        let mut l = ledger();
        l.transfer("alice", "alice", 500).unwrap();
        assert_eq!(l.balance_of("alice"), 20_000);
    }

    #[test]
    fn transfer_from_consumes_allowance() {
        let mut l = ledger();
        l.increase_allowance("alice", "bob", 10).unwrap();
        assert_eq!(l.allowance("alice", "bob"), 10);

        l.transfer_from("bob", "alice", "bob", 10).unwrap();
        assert_eq!(l.allowance("alice", "bob"), 0);
        assert_eq!(l.balance_of("bob"), 10);
        assert_eq!(l.balance_of("alice"), 19_990);
    }

    #[test]
    fn transfer_from_without_allowance_rejected() {
        let mut l = ledger();
        let result = l.transfer_from("bob", "alice", "bob", 1);
        assert!(matches!(
            result,
            Err(TokenError::InsufficientAllowance { .. })
        ));
    }

    #[test]
    fn approve_overwrites_increase_adds() {
        let mut l = ledger();
        l.approve("alice", "bob", 7).unwrap();
        l.approve("alice", "bob", 3).unwrap();
        assert_eq!(l.allowance("alice", "bob"), 3);
        l.increase_allowance("alice", "bob", 4).unwrap();
        assert_eq!(l.allowance("alice", "bob"), 7);
    }

    #[test]
    fn public_mint_and_burn_always_fail() {
        let mut l = ledger();
        assert!(matches!(
            l.mint("alice", 100),
            Err(TokenError::MintRestricted)
        ));
        assert!(matches!(
            l.burn("alice", 100),
            Err(TokenError::BurnRestricted)
        ));
        assert_eq!(l.balance_of("alice"), 20_000);
    }

    #[test]
    fn internal_mint_and_burn_move_supply() {
        let mut l = ledger();
        l.mint_internal("bob", 50).unwrap();
        assert_eq!(l.total_supply(), 20_050);
        assert_eq!(l.balance_of("bob"), 50);

        l.increase_allowance("bob", "sys", 50).unwrap();
        l.burn_internal("bob", "sys", 50).unwrap();
        assert_eq!(l.total_supply(), 20_000);
        assert_eq!(l.balance_of("bob"), 0);
        assert_eq!(l.allowance("bob", "sys"), 0);
    }

    #[test]
    fn internal_burn_requires_allowance() {
        let mut l = ledger();
        let result = l.burn_internal("alice", "sys", 1);
        assert!(matches!(
            result,
            Err(TokenError::InsufficientAllowance { .. })
        ));
        assert_eq!(l.total_supply(), 20_000);
    }

    #[test]
    fn internal_mint_overflow_rejected() {
        let mut l = ledger();
        assert!(l.mint_internal("bob", u64::MAX).is_err());
        assert_eq!(l.total_supply(), 20_000);
        assert_eq!(l.balance_of("bob"), 0);
    }

    #[test]
    fn zero_balance_equals_absent_entry() {
        let mut l = ledger();
        l.transfer("alice", "bob", 5).unwrap();
        l.transfer("bob", "alice", 5).unwrap();
        // Bob is back to zero; the entry must be gone, not a stored 0.
        assert_eq!(l.balance_of("bob"), 0);
        let json = serde_json::to_string(&l).unwrap();
        assert!(!json.contains("bob"));
    }

    #[test]
    fn serialization_roundtrip() {
        let mut l = ledger();
        l.increase_allowance("alice", "bob", 42).unwrap();
        let json = serde_json::to_string(&l).unwrap();
        let restored: TokenLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.total_supply(), 20_000);
        assert_eq!(restored.allowance("alice", "bob"), 42);
        assert_eq!(restored.asset_id(), "EE");
    }
}
