//! # Collateral Engine
//!
//! The aggregate that owns the primary [`TokenLedger`] and every
//! [`BackingVault`], and the only place primary supply is ever created or
//! destroyed. Two operations do the heavy lifting:
//!
//! - **cast** — mint primary tokens against a backing-asset deposit, at
//!   the vault's target collateral ratio.
//! - **destroy** — burn primary tokens and withdraw a pro-rata share of
//!   the vault's deposit.
//!
//! The reward mint ([`CollateralEngine::reward_distribute`]) spends
//! accrued over-collateralization without ever dropping below the
//! configured floor, and vault administration (create / remove /
//! deprecate) rounds out the surface. The staged re-peg machinery lives
//! in [`crate::transition`].
//!
//! ## Atomicity
//!
//! Every operation is a single atomic unit: all checks run before the
//! first mutation, internal accounting is updated before the external
//! backing asset moves, and a per-vault busy flag guards the transfer
//! window (checks-effects-interactions, plus a belt to go with the
//! braces). A failed operation leaves no partial state behind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::{DEFAULT_REWARD_FLOOR_RATIO, DEFAULT_TARGET_COLLATERAL_RATIO, SCALE, SYSTEM_ACCOUNT};
use crate::math;
use crate::token::{FungibleLedger, TokenError, TokenLedger};
use crate::vault::BackingVault;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during collateral operations.
#[derive(Debug, Error)]
pub enum CollateralError {
    /// The referenced backing asset has no vault.
    #[error("unknown backing asset: {0}")]
    UnknownAsset(String),

    /// The vault is deprecated — new casts are disabled.
    #[error("vault for {0} is deprecated: casting is disabled")]
    VaultDeprecated(String),

    /// A ratio transition is already pending on this vault.
    #[error("a ratio transition is already pending for {0}")]
    TransitionAlreadyPending(String),

    /// No ratio transition is pending on this vault.
    #[error("no ratio transition is pending for {0}")]
    NoPendingTransition(String),

    /// The operation would drop collateralization below the required floor.
    #[error("collateral floor violated: ratio would fall to {ratio}, floor is {floor}")]
    CollateralFloorViolated {
        /// The aggregate ratio the operation would produce (scaled).
        ratio: u64,
        /// The floor the operation must respect (scaled).
        floor: u64,
    },

    /// A vault with recorded collateral cannot be removed.
    #[error("vault for {asset} still holds {deposited} backing units")]
    CollateralOutstanding {
        /// The backing asset of the vault.
        asset: String,
        /// Raw units still recorded in the vault.
        deposited: u64,
    },

    /// An operation on this vault is already in progress.
    #[error("reentrant call rejected on vault for {0}")]
    ReentrantCall(String),

    /// Zero-amount operations are rejected rather than silently accepted.
    #[error("amount must be nonzero")]
    ZeroAmount,

    /// An exchange rate or re-peg target of zero is the none-sentinel and
    /// never a valid rate.
    #[error("invalid exchange rate: {0}")]
    InvalidRate(u64),

    /// The primary token cannot back itself.
    #[error("asset {0} is the primary token and cannot be its own collateral")]
    SelfCollateral(String),

    /// A counter would overflow, or a divisor was zero.
    #[error("amount overflow in collateral arithmetic")]
    AmountOverflow,

    /// Accounting would go negative. With the checks above this is
    /// unreachable; it exists so the engine never subtracts blindly.
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),

    /// An underlying token-ledger operation failed.
    #[error(transparent)]
    Token(#[from] TokenError),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The collateralized ledger: one primary token plus a vault per accepted
/// backing asset.
///
/// All state is owned here and mutated only through `&mut self`
/// operations — no ambient globals, no interior mutability. Backing-asset
/// ledgers are external collaborators passed into each operation that
/// needs to move them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralEngine {
    /// The primary fungible ledger.
    pub(crate) token: TokenLedger,
    /// Vaults keyed by backing-asset id. BTreeMap so that listing order
    /// is deterministic.
    pub(crate) vaults: BTreeMap<String, BackingVault>,
    /// Minimum aggregate ratio the reward mint must preserve (scaled).
    reward_floor_ratio: u64,
}

impl CollateralEngine {
    /// Creates an engine whose primary ledger mints `initial_supply` to
    /// `deployer`. Starts with no vaults and the default reward floor.
    pub fn new(
        asset_id: &str,
        name: &str,
        symbol: &str,
        initial_supply: u64,
        deployer: &str,
    ) -> Self {
        Self {
            token: TokenLedger::new(asset_id, name, symbol, initial_supply, deployer),
            vaults: BTreeMap::new(),
            reward_floor_ratio: DEFAULT_REWARD_FLOOR_RATIO,
        }
    }

    /// Overrides the reward-mint floor ratio (scaled by [`SCALE`]).
    pub fn with_reward_floor(mut self, ratio: u64) -> Self {
        self.reward_floor_ratio = ratio;
        self
    }

    /// The primary token ledger.
    pub fn token(&self) -> &TokenLedger {
        &self.token
    }

    /// Mutable access to the primary ledger for ordinary transfer and
    /// allowance operations. The privileged mint/burn primitives stay
    /// crate-internal regardless.
    pub fn token_mut(&mut self) -> &mut TokenLedger {
        &mut self.token
    }

    /// The account custodying deposits and receiving burn authorizations.
    pub fn system_account(&self) -> &'static str {
        SYSTEM_ACCOUNT
    }

    /// The configured reward-mint floor (scaled).
    pub fn reward_floor_ratio(&self) -> u64 {
        self.reward_floor_ratio
    }

    // -- vault administration ----------------------------------------------

    /// Registers `asset` as accepted collateral at `exchange_rate`, or
    /// updates the rate if the asset is already accepted. Re-registration
    /// is idempotent: the accepted list does not grow and any recorded
    /// deposit is re-normalized at the new rate.
    ///
    /// # Errors
    ///
    /// Returns [`CollateralError::InvalidRate`] for a zero rate,
    /// [`CollateralError::SelfCollateral`] if `asset` is the primary
    /// token, and [`CollateralError::TransitionAlreadyPending`] if a
    /// staged re-peg is in flight (rates move through the transition
    /// machinery while one is pending, not through re-registration).
    pub fn create_vault(&mut self, asset: &str, exchange_rate: u64) -> Result<(), CollateralError> {
        if exchange_rate == 0 {
            return Err(CollateralError::InvalidRate(exchange_rate));
        }
        if asset == self.token.asset_id() {
            return Err(CollateralError::SelfCollateral(asset.to_string()));
        }

        match self.vaults.get_mut(asset) {
            Some(vault) => {
                if vault.pending_target.is_some() {
                    return Err(CollateralError::TransitionAlreadyPending(asset.to_string()));
                }
                vault.exchange_rate = exchange_rate;
                vault.renormalize()?;
                vault.touch();
                tracing::info!(asset, exchange_rate, "vault re-registered");
            }
            None => {
                let vault =
                    BackingVault::new(asset, exchange_rate, DEFAULT_TARGET_COLLATERAL_RATIO);
                tracing::info!(asset, exchange_rate, vault_id = %vault.vault_id, "vault created");
                self.vaults.insert(asset.to_string(), vault);
            }
        }
        Ok(())
    }

    /// Removes the vault for `asset`.
    ///
    /// # Errors
    ///
    /// Returns [`CollateralError::CollateralOutstanding`] if the vault
    /// still records any deposit — removal must never strand collateral.
    pub fn remove_vault(&mut self, asset: &str) -> Result<(), CollateralError> {
        let vault = self
            .vaults
            .get(asset)
            .ok_or_else(|| CollateralError::UnknownAsset(asset.to_string()))?;
        if vault.deposited != 0 || vault.normalized != 0 {
            return Err(CollateralError::CollateralOutstanding {
                asset: asset.to_string(),
                deposited: vault.deposited,
            });
        }
        self.vaults.remove(asset);
        tracing::info!(asset, "vault removed");
        Ok(())
    }

    /// Flips the deprecation switch on `asset`'s vault and returns the new
    /// state. While deprecated, casts fail; redemption is unaffected.
    pub fn toggle_deprecated(&mut self, asset: &str) -> Result<bool, CollateralError> {
        let vault = self.vault_mut(asset)?;
        let state = vault.toggle_deprecated();
        tracing::info!(asset, deprecated = state, "vault deprecation toggled");
        Ok(state)
    }

    // -- queries -----------------------------------------------------------

    /// Backing-asset ids with an active vault, in deterministic order.
    pub fn accepted_assets(&self) -> Vec<String> {
        self.vaults.keys().cloned().collect()
    }

    /// The vault for `asset`, if one exists.
    pub fn vault(&self, asset: &str) -> Option<&BackingVault> {
        self.vaults.get(asset)
    }

    /// Exchange rate for `asset`, 0 if the asset is not accepted. Zero is
    /// never a valid rate, so it doubles as the not-accepted sentinel.
    pub fn exchange_rate(&self, asset: &str) -> u64 {
        self.vaults.get(asset).map(|v| v.exchange_rate).unwrap_or(0)
    }

    /// Target collateral ratio in force for `asset`, 0 if not accepted.
    pub fn target_ratio(&self, asset: &str) -> u64 {
        self.vaults.get(asset).map(|v| v.target_ratio).unwrap_or(0)
    }

    /// Raw backing units deposited in `asset`'s vault, 0 if not accepted.
    pub fn collateral_of(&self, asset: &str) -> u64 {
        self.vaults.get(asset).map(|v| v.deposited).unwrap_or(0)
    }

    /// Sum of normalized collateral across all vaults. Saturates at
    /// `u64::MAX`; the floor checks that matter run in `u128`.
    pub fn total_collateral(&self) -> u64 {
        self.vaults
            .values()
            .fold(0u64, |acc, v| acc.saturating_add(v.normalized))
    }

    /// `round(total_collateral * SCALE / total_supply)`, or 0 while no
    /// supply is outstanding.
    pub fn current_collateral_ratio(&self) -> u64 {
        let supply = self.token.total_supply();
        if supply == 0 {
            return 0;
        }
        math::mul_div_round(self.total_collateral(), SCALE, supply).unwrap_or(u64::MAX)
    }

    // -- cast --------------------------------------------------------------

    /// Mints `amount` primary tokens to `caller` against a backing-asset
    /// deposit pulled from `caller`'s pre-authorized budget on `backing`.
    ///
    /// The required deposit is `floor(amount * target_ratio /
    /// exchange_rate)`, computed once; the vault's normalized collateral
    /// grows by `floor(deposit * exchange_rate / SCALE)` so the raw and
    /// normalized counters never drift apart.
    ///
    /// Returns the number of backing units deposited.
    ///
    /// # Errors
    ///
    /// Fails if the vault is unknown, deprecated, or mid-operation; if any
    /// counter would overflow; or if `caller`'s allowance or balance on
    /// `backing` does not cover the deposit. No partial state on failure.
    pub fn cast(
        &mut self,
        backing: &mut dyn FungibleLedger,
        caller: &str,
        amount: u64,
    ) -> Result<u64, CollateralError> {
        if amount == 0 {
            return Err(CollateralError::ZeroAmount);
        }
        let asset = backing.asset_id().to_string();
        let vault = self
            .vaults
            .get_mut(&asset)
            .ok_or_else(|| CollateralError::UnknownAsset(asset.clone()))?;
        if vault.deprecated {
            return Err(CollateralError::VaultDeprecated(asset));
        }
        if vault.busy {
            return Err(CollateralError::ReentrantCall(asset));
        }

        // Checks: price the deposit and validate every counter update.
        let required = math::mul_div_floor(amount, vault.target_ratio, vault.exchange_rate)?;
        let normalized_add = math::mul_div_floor(required, vault.exchange_rate, SCALE)?;
        let new_deposited = vault
            .deposited
            .checked_add(required)
            .ok_or(CollateralError::AmountOverflow)?;
        let new_normalized = vault
            .normalized
            .checked_add(normalized_add)
            .ok_or(CollateralError::AmountOverflow)?;

        let granted = backing.allowance(caller, SYSTEM_ACCOUNT);
        if granted < required {
            return Err(TokenError::InsufficientAllowance {
                allowance: granted,
                amount: required,
            }
            .into());
        }
        let held = backing.balance_of(caller);
        if held < required {
            return Err(TokenError::InsufficientBalance {
                balance: held,
                amount: required,
            }
            .into());
        }

        // Effects: guard up, mint, then commit the pre-validated counters.
        vault.busy = true;
        if let Err(e) = self.token.mint_internal(caller, amount) {
            vault.busy = false;
            return Err(e.into());
        }
        vault.deposited = new_deposited;
        vault.normalized = new_normalized;
        vault.touch();

        // Interaction: pull the deposit. Pre-flighted above, so this
        // cannot fail against an honest ledger.
        let pulled = backing.transfer_from(SYSTEM_ACCOUNT, caller, SYSTEM_ACCOUNT, required);
        if let Some(v) = self.vaults.get_mut(&asset) {
            v.busy = false;
        }
        pulled?;

        tracing::debug!(asset = %asset, caller, amount, deposit = required, "cast");
        Ok(required)
    }

    // -- destroy -----------------------------------------------------------

    /// Burns `amount` primary tokens from `caller` and returns their
    /// pro-rata share of the vault's deposit:
    /// `floor(amount * deposited / total_supply_before_burn)`.
    ///
    /// Pro-rata, not rate-derived, so partial redemptions by different
    /// accounts stay fair while the exchange rate moves. Redeeming the
    /// entire supply returns the entire deposit and zeroes the vault's
    /// counters exactly. Works on deprecated vaults — holders can always
    /// exit.
    ///
    /// Returns the number of backing units released.
    ///
    /// # Errors
    ///
    /// Requires `caller` to hold `amount` and to have pre-authorized at
    /// least that much to the system account on the primary ledger.
    pub fn destroy(
        &mut self,
        backing: &mut dyn FungibleLedger,
        caller: &str,
        amount: u64,
    ) -> Result<u64, CollateralError> {
        if amount == 0 {
            return Err(CollateralError::ZeroAmount);
        }
        let asset = backing.asset_id().to_string();
        let supply = self.token.total_supply();
        let vault = self
            .vaults
            .get_mut(&asset)
            .ok_or_else(|| CollateralError::UnknownAsset(asset.clone()))?;
        if vault.busy {
            return Err(CollateralError::ReentrantCall(asset));
        }

        // Checks. `amount <= supply` follows from the balance check inside
        // the burn, but the redemption share needs it up front.
        if amount > supply {
            return Err(TokenError::InsufficientBalance {
                balance: self.token.balance_of(caller),
                amount,
            }
            .into());
        }
        let returned = math::mul_div_floor(amount, vault.deposited, supply)?;
        let new_deposited = vault
            .deposited
            .checked_sub(returned)
            .ok_or(CollateralError::InvariantViolation(
                "redemption exceeds vault deposit",
            ))?;
        let normalized_sub = math::mul_div_floor(returned, vault.exchange_rate, SCALE)?;
        // Floor rounding on incremental deposits can leave the normalized
        // counter a unit or two behind the subtraction; the residual is
        // dust and clamps to zero. An emptied vault must read exactly zero.
        let new_normalized = if new_deposited == 0 {
            0
        } else {
            vault.normalized.saturating_sub(normalized_sub)
        };

        let reserve = backing.balance_of(SYSTEM_ACCOUNT);
        if reserve < returned {
            return Err(CollateralError::InvariantViolation(
                "reserve holds less than the recorded deposit",
            ));
        }

        // Effects: burn first (it re-validates balance and allowance),
        // then commit the counters.
        vault.busy = true;
        if let Err(e) = self.token.burn_internal(caller, SYSTEM_ACCOUNT, amount) {
            vault.busy = false;
            return Err(e.into());
        }
        vault.deposited = new_deposited;
        vault.normalized = new_normalized;
        vault.touch();

        // Interaction: release the backing asset.
        let released = backing.transfer(SYSTEM_ACCOUNT, caller, returned);
        if let Some(v) = self.vaults.get_mut(&asset) {
            v.busy = false;
        }
        released?;

        tracing::debug!(asset = %asset, caller, amount, returned, "destroy");
        Ok(returned)
    }

    // -- reward ------------------------------------------------------------

    /// Mints `amount` to `account` without a deposit, spending collateral
    /// surplus. Permitted only while the aggregate ratio stays at or above
    /// the configured floor; the comparison is exact (`u128`), with no
    /// rounding in the protocol's favor.
    ///
    /// # Errors
    ///
    /// Returns [`CollateralError::CollateralFloorViolated`] when the mint
    /// would breach the floor.
    pub fn reward_distribute(&mut self, account: &str, amount: u64) -> Result<(), CollateralError> {
        if amount == 0 {
            return Err(CollateralError::ZeroAmount);
        }
        let supply_after = self
            .token
            .total_supply()
            .checked_add(amount)
            .ok_or(CollateralError::AmountOverflow)?;
        let collateral = self.total_collateral();

        // collateral / supply_after >= floor, cross-multiplied in u128.
        if (collateral as u128) * (SCALE as u128)
            < (self.reward_floor_ratio as u128) * (supply_after as u128)
        {
            let ratio = math::mul_div_round(collateral, SCALE, supply_after).unwrap_or(0);
            return Err(CollateralError::CollateralFloorViolated {
                ratio,
                floor: self.reward_floor_ratio,
            });
        }

        self.token.mint_internal(account, amount)?;
        tracing::info!(account, amount, "reward distributed");
        Ok(())
    }

    // -- internals ---------------------------------------------------------

    pub(crate) fn vault_mut(&mut self, asset: &str) -> Result<&mut BackingVault, CollateralError> {
        self.vaults
            .get_mut(asset)
            .ok_or_else(|| CollateralError::UnknownAsset(asset.to_string()))
    }
}
