//! # Ratio Transition
//!
//! The staged re-peg state machine. An administrator never changes a
//! vault's exchange rate in one jump — that would instantly re-price all
//! outstanding supply and can leave it under-collateralized. Instead the
//! rate moves through a two-state machine layered on the vault:
//!
//! ```text
//! Stable --require_change_exchange_rate--> PendingChange(target)
//! PendingChange --stake reaches target----> Stable
//! PendingChange --cancel-----------------> Stable
//! ```
//!
//! While a change is pending, `stake` accepts additional backing deposits
//! and advances the rate toward the target in proportion to the deposit.
//! The contract this module guarantees:
//!
//! 1. The rate only ever moves monotonically toward the target.
//! 2. Reaching the target clears the pending state; the public query
//!    reports the 0 sentinel again.
//! 3. No step may drop aggregate collateralization below 100%.
//!
//! ## Interpolation
//!
//! The deposit required for a *full* transition is the amount that keeps
//! the vault at its target collateral ratio once the target rate is in
//! force: `full = ceil(supply * target_ratio / target_rate)` raw units.
//! A stake covering the remainder of that requirement completes the
//! transition outright; a smaller stake moves the rate linearly by its
//! share of the remainder. Truncation always lands short of the target,
//! never past it.

use crate::config::{FULL_COLLATERAL_RATIO, SCALE, SYSTEM_ACCOUNT};
use crate::engine::{CollateralEngine, CollateralError};
use crate::math;
use crate::token::{FungibleLedger, TokenError};

impl CollateralEngine {
    /// Opens a ratio transition on `asset`'s vault toward `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CollateralError::TransitionAlreadyPending`] if a change
    /// is in flight, and [`CollateralError::InvalidRate`] for a zero
    /// target (the none-sentinel) or a target equal to the current rate
    /// (a no-op request is a caller bug, not a transition).
    pub fn require_change_exchange_rate(
        &mut self,
        asset: &str,
        target: u64,
    ) -> Result<(), CollateralError> {
        let vault = self.vault_mut(asset)?;
        if vault.pending_target.is_some() {
            return Err(CollateralError::TransitionAlreadyPending(asset.to_string()));
        }
        if target == 0 || target == vault.exchange_rate {
            return Err(CollateralError::InvalidRate(target));
        }
        vault.pending_target = Some(target);
        vault.touch();
        tracing::info!(asset, target, "ratio transition opened");
        Ok(())
    }

    /// Cancels the pending transition on `asset`'s vault. The rate stays
    /// wherever staking has moved it so far.
    ///
    /// # Errors
    ///
    /// Returns [`CollateralError::NoPendingTransition`] if the vault is
    /// stable.
    pub fn cancel_change_exchange_rate(&mut self, asset: &str) -> Result<(), CollateralError> {
        let vault = self.vault_mut(asset)?;
        if vault.pending_target.take().is_none() {
            return Err(CollateralError::NoPendingTransition(asset.to_string()));
        }
        vault.touch();
        tracing::info!(asset, "ratio transition cancelled");
        Ok(())
    }

    /// The pending re-peg target for `asset`, 0 while the vault is stable
    /// or the asset unknown.
    pub fn pending_exchange_rate(&self, asset: &str) -> u64 {
        self.vault(asset)
            .and_then(|v| v.pending_target)
            .unwrap_or(0)
    }

    /// Deposits `extra` backing units from `caller` and advances the
    /// exchange rate toward the pending target. Returns the rate now in
    /// force.
    ///
    /// # Errors
    ///
    /// Fails while no transition is pending (a plain deposit is not a
    /// stake), for zero amounts, if the step would breach the 100%
    /// collateral floor, or if `caller`'s allowance or balance on
    /// `backing` does not cover the deposit.
    pub fn stake(
        &mut self,
        backing: &mut dyn FungibleLedger,
        caller: &str,
        extra: u64,
    ) -> Result<u64, CollateralError> {
        if extra == 0 {
            return Err(CollateralError::ZeroAmount);
        }
        let asset = backing.asset_id().to_string();
        let supply = self.token.total_supply();
        let aggregate = self.total_collateral();
        let vault = self
            .vaults
            .get_mut(&asset)
            .ok_or_else(|| CollateralError::UnknownAsset(asset.clone()))?;
        if vault.busy {
            return Err(CollateralError::ReentrantCall(asset));
        }
        let target = vault
            .pending_target
            .ok_or_else(|| CollateralError::NoPendingTransition(asset.clone()))?;

        // Checks: size the step and validate every counter update.
        let new_deposited = vault
            .deposited
            .checked_add(extra)
            .ok_or(CollateralError::AmountOverflow)?;
        let full_needed = math::mul_div_ceil(supply, vault.target_ratio, target)?;
        let remaining = full_needed.saturating_sub(vault.deposited);
        let new_rate = if extra >= remaining {
            target
        } else {
            // remaining > extra > 0. Signed step, truncated toward zero:
            // always short of the target, never past it.
            let step = ((target as i128) - (vault.exchange_rate as i128)) * (extra as i128)
                / (remaining as i128);
            ((vault.exchange_rate as i128) + step) as u64
        };
        let new_normalized = math::mul_div_floor(new_deposited, new_rate, SCALE)?;

        // Guard: the step may not leave supply backed below 100%.
        let total_after =
            (aggregate as u128) - (vault.normalized as u128) + (new_normalized as u128);
        if supply > 0 && total_after < supply as u128 {
            let ratio = (total_after * SCALE as u128 / supply as u128) as u64;
            return Err(CollateralError::CollateralFloorViolated {
                ratio,
                floor: FULL_COLLATERAL_RATIO,
            });
        }

        let granted = backing.allowance(caller, SYSTEM_ACCOUNT);
        if granted < extra {
            return Err(TokenError::InsufficientAllowance {
                allowance: granted,
                amount: extra,
            }
            .into());
        }
        let held = backing.balance_of(caller);
        if held < extra {
            return Err(TokenError::InsufficientBalance {
                balance: held,
                amount: extra,
            }
            .into());
        }

        // Effects.
        vault.busy = true;
        vault.deposited = new_deposited;
        vault.exchange_rate = new_rate;
        vault.normalized = new_normalized;
        if new_rate == target {
            vault.pending_target = None;
        }
        vault.touch();

        // Interaction: pull the stake. Pre-flighted above.
        let pulled = backing.transfer_from(SYSTEM_ACCOUNT, caller, SYSTEM_ACCOUNT, extra);
        if let Some(v) = self.vaults.get_mut(&asset) {
            v.busy = false;
        }
        pulled?;

        tracing::debug!(asset = %asset, caller, extra, new_rate, "stake applied");
        Ok(new_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenLedger;

    fn fixture() -> (CollateralEngine, TokenLedger) {
        let engine = CollateralEngine::new("EE", "DAEE", "EE", 0, "alice");
        let backing = TokenLedger::new("ATU", "AATTUU", "ATU", 20_000, "alice");
        (engine, backing)
    }

    fn cast(engine: &mut CollateralEngine, backing: &mut TokenLedger, amount: u64, budget: u64) {
        backing
            .increase_allowance("alice", SYSTEM_ACCOUNT, budget)
            .unwrap();
        engine.cast(backing, "alice", amount).unwrap();
    }

    #[test]
    fn stake_while_stable_rejected() {
        let (mut engine, mut backing) = fixture();
        engine.create_vault("ATU", 250_000).unwrap();
        cast(&mut engine, &mut backing, 25, 12);

        assert!(matches!(
            engine.stake(&mut backing, "alice", 20),
            Err(CollateralError::NoPendingTransition(_))
        ));
    }

    #[test]
    fn cancel_while_stable_rejected() {
        let (mut engine, _) = fixture();
        engine.create_vault("ATU", 250_000).unwrap();
        assert!(matches!(
            engine.cancel_change_exchange_rate("ATU"),
            Err(CollateralError::NoPendingTransition(_))
        ));
    }

    #[test]
    fn double_require_rejected() {
        let (mut engine, _) = fixture();
        engine.create_vault("ATU", 250_000).unwrap();
        engine.require_change_exchange_rate("ATU", 200_000).unwrap();
        assert!(matches!(
            engine.require_change_exchange_rate("ATU", 150_000),
            Err(CollateralError::TransitionAlreadyPending(_))
        ));
    }

    #[test]
    fn zero_and_noop_targets_rejected() {
        let (mut engine, _) = fixture();
        engine.create_vault("ATU", 250_000).unwrap();
        assert!(matches!(
            engine.require_change_exchange_rate("ATU", 0),
            Err(CollateralError::InvalidRate(0))
        ));
        assert!(matches!(
            engine.require_change_exchange_rate("ATU", 250_000),
            Err(CollateralError::InvalidRate(250_000))
        ));
    }

    #[test]
    fn covering_stake_completes_transition() {
        // The reference scenario: cast 25 at 250%/120%, re-peg to 200%.
        // Full transition needs ceil(25 * 120000 / 200000) = 15 units;
        // 12 are already deposited, so a 50-unit stake overshoots the
        // remainder and completes outright.
        let (mut engine, mut backing) = fixture();
        engine.create_vault("ATU", 250_000).unwrap();
        cast(&mut engine, &mut backing, 25, 12);

        engine.require_change_exchange_rate("ATU", 200_000).unwrap();
        assert_eq!(engine.pending_exchange_rate("ATU"), 200_000);

        backing
            .increase_allowance("alice", SYSTEM_ACCOUNT, 50)
            .unwrap();
        let rate = engine.stake(&mut backing, "alice", 50).unwrap();

        assert_eq!(rate, 200_000);
        assert_eq!(engine.exchange_rate("ATU"), 200_000);
        assert_eq!(engine.pending_exchange_rate("ATU"), 0);
        assert_eq!(engine.collateral_of("ATU"), 62);
        assert_eq!(engine.total_collateral(), 124);
        // Completed: cancelling now is a state-machine misuse.
        assert!(matches!(
            engine.cancel_change_exchange_rate("ATU"),
            Err(CollateralError::NoPendingTransition(_))
        ));
    }

    #[test]
    fn partial_stake_interpolates_monotonically() {
        let (mut engine, mut backing) = fixture();
        engine.create_vault("ATU", 250_000).unwrap();
        cast(&mut engine, &mut backing, 250, 120);

        // Full transition to 100% needs ceil(250*120000/100000) = 300
        // units; 120 are in, so 180 remain. Staking half of that moves
        // the rate halfway: 250000 + (100000-250000)*90/180 = 175000.
        engine.require_change_exchange_rate("ATU", 100_000).unwrap();
        backing
            .increase_allowance("alice", SYSTEM_ACCOUNT, 180)
            .unwrap();
        let rate = engine.stake(&mut backing, "alice", 90).unwrap();
        assert_eq!(rate, 175_000);
        assert_eq!(engine.pending_exchange_rate("ATU"), 100_000);
        assert_eq!(engine.collateral_of("ATU"), 210);
        // floor(210 * 175000 / 100000) = 367.
        assert_eq!(engine.total_collateral(), 367);

        // The second half completes: remaining = 300 - 210 = 90.
        let rate = engine.stake(&mut backing, "alice", 90).unwrap();
        assert_eq!(rate, 100_000);
        assert_eq!(engine.pending_exchange_rate("ATU"), 0);
        assert_eq!(engine.collateral_of("ATU"), 300);
        assert_eq!(engine.total_collateral(), 300);
    }

    #[test]
    fn rate_never_overshoots_and_floor_holds() {
        let (mut engine, mut backing) = fixture();
        engine.create_vault("ATU", 250_000).unwrap();
        cast(&mut engine, &mut backing, 250, 120);
        engine.require_change_exchange_rate("ATU", 100_000).unwrap();
        backing
            .increase_allowance("alice", SYSTEM_ACCOUNT, 1_000)
            .unwrap();

        let mut last = engine.exchange_rate("ATU");
        for _ in 0..40 {
            if engine.pending_exchange_rate("ATU") == 0 {
                break;
            }
            let rate = engine.stake(&mut backing, "alice", 7).unwrap();
            // Monotone toward a lower target, never past it.
            assert!(rate <= last);
            assert!(rate >= 100_000);
            last = rate;
            // Supply stays fully backed after every step.
            assert!(engine.current_collateral_ratio() >= 100_000);
        }
        assert_eq!(engine.exchange_rate("ATU"), 100_000);
        assert_eq!(engine.pending_exchange_rate("ATU"), 0);
    }

    #[test]
    fn upward_repeg_also_interpolates() {
        let (mut engine, mut backing) = fixture();
        engine.create_vault("ATU", 200_000).unwrap();
        // cast 100 at 200%/120%: deposit = 60, normalized = 120.
        cast(&mut engine, &mut backing, 100, 60);

        // Raising the rate devalues nothing; the requirement at the new
        // rate is ceil(100*120000/250000) = 48 <= 60 deposited, so any
        // stake completes immediately.
        engine.require_change_exchange_rate("ATU", 250_000).unwrap();
        backing
            .increase_allowance("alice", SYSTEM_ACCOUNT, 1)
            .unwrap();
        let rate = engine.stake(&mut backing, "alice", 1).unwrap();
        assert_eq!(rate, 250_000);
        assert_eq!(engine.pending_exchange_rate("ATU"), 0);
        // floor(61 * 250000 / 100000) = 152.
        assert_eq!(engine.total_collateral(), 152);
    }

    #[test]
    fn stake_requires_allowance() {
        let (mut engine, mut backing) = fixture();
        engine.create_vault("ATU", 250_000).unwrap();
        cast(&mut engine, &mut backing, 25, 12);
        engine.require_change_exchange_rate("ATU", 200_000).unwrap();

        let result = engine.stake(&mut backing, "alice", 50);
        assert!(matches!(
            result,
            Err(CollateralError::Token(TokenError::InsufficientAllowance { .. }))
        ));
        // Nothing moved, transition still pending.
        assert_eq!(engine.exchange_rate("ATU"), 250_000);
        assert_eq!(engine.pending_exchange_rate("ATU"), 200_000);
        assert_eq!(engine.collateral_of("ATU"), 12);
    }

    #[test]
    fn zero_stake_rejected() {
        let (mut engine, mut backing) = fixture();
        engine.create_vault("ATU", 250_000).unwrap();
        engine.require_change_exchange_rate("ATU", 200_000).unwrap();
        assert!(matches!(
            engine.stake(&mut backing, "alice", 0),
            Err(CollateralError::ZeroAmount)
        ));
    }

    #[test]
    fn reregistration_blocked_while_pending() {
        let (mut engine, _) = fixture();
        engine.create_vault("ATU", 250_000).unwrap();
        engine.require_change_exchange_rate("ATU", 200_000).unwrap();
        assert!(matches!(
            engine.create_vault("ATU", 300_000),
            Err(CollateralError::TransitionAlreadyPending(_))
        ));
    }

    #[test]
    fn cancel_keeps_partial_progress() {
        let (mut engine, mut backing) = fixture();
        engine.create_vault("ATU", 250_000).unwrap();
        cast(&mut engine, &mut backing, 250, 120);
        engine.require_change_exchange_rate("ATU", 100_000).unwrap();
        backing
            .increase_allowance("alice", SYSTEM_ACCOUNT, 90)
            .unwrap();
        engine.stake(&mut backing, "alice", 90).unwrap();

        engine.cancel_change_exchange_rate("ATU").unwrap();
        // The rate stays where staking left it; only the target is gone.
        assert_eq!(engine.exchange_rate("ATU"), 175_000);
        assert_eq!(engine.pending_exchange_rate("ATU"), 0);
    }
}
