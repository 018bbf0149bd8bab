//! # Backing Vault
//!
//! Per-backing-asset custody state. One vault exists per asset the
//! protocol accepts as collateral, and everything the engine needs to
//! price a cast or a redemption against that asset lives here: the
//! exchange rate, the target ratio, the raw deposit counter, and its
//! normalized (rate-adjusted) value.
//!
//! A vault is dumb on purpose. It holds numbers and flips flags; the
//! arithmetic that decides *which* numbers lives in [`crate::engine`] and
//! [`crate::transition`], where it can see the primary ledger too.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SCALE;
use crate::engine::CollateralError;
use crate::math;

/// Custody and rate state for one accepted backing asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackingVault {
    /// Unique identifier, assigned at creation.
    pub vault_id: String,
    /// Identifier of the backing asset this vault custodies.
    pub asset: String,
    /// Conversion factor between raw backing units and normalized
    /// collateral value, scaled by [`SCALE`].
    pub exchange_rate: u64,
    /// Required backing value per unit of primary supply minted against
    /// this vault, scaled by [`SCALE`].
    pub target_ratio: u64,
    /// Raw backing-asset units held by this vault.
    pub deposited: u64,
    /// `floor(deposited * exchange_rate / SCALE)` — the value counted
    /// toward aggregate collateralization.
    pub normalized: u64,
    /// When set, new casts fail. Redemption is never blocked.
    pub deprecated: bool,
    /// Re-peg target while a ratio transition is pending; `None` when the
    /// vault is stable. The public query reports 0 for `None`.
    pub pending_target: Option<u64>,
    /// Operation-in-progress flag. Second line of defense against
    /// reentrant calls during external-asset transfers.
    pub(crate) busy: bool,
    /// Timestamp when the vault was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent state change.
    pub updated_at: DateTime<Utc>,
}

impl BackingVault {
    /// Creates an empty vault for `asset` at the given exchange rate.
    pub fn new(asset: &str, exchange_rate: u64, target_ratio: u64) -> Self {
        let now = Utc::now();
        Self {
            vault_id: Uuid::new_v4().to_string(),
            asset: asset.to_string(),
            exchange_rate,
            target_ratio,
            deposited: 0,
            normalized: 0,
            deprecated: false,
            pending_target: None,
            busy: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Flips the deprecation switch and returns the new state.
    /// Toggling twice restores the original behavior.
    pub fn toggle_deprecated(&mut self) -> bool {
        self.deprecated = !self.deprecated;
        self.touch();
        self.deprecated
    }

    /// Recomputes `normalized` from the current deposit and rate. Used
    /// after an exchange-rate change, where the incremental bookkeeping
    /// the engine does on deposits no longer applies.
    pub(crate) fn renormalize(&mut self) -> Result<(), CollateralError> {
        self.normalized = math::mul_div_floor(self.deposited, self.exchange_rate, SCALE)?;
        Ok(())
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
