//! # State Store
//!
//! Loads and saves the ledger universe — the collateral engine plus every
//! backing-asset ledger it collaborates with — as a single JSON file.
//! Writes go through a temp file and an atomic rename so a crash mid-save
//! never leaves a half-written ledger behind.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use ingot_ledger::{CollateralEngine, TokenLedger};

/// Everything one `ingot` state file holds: the engine (primary ledger +
/// vaults) and the backing-asset ledgers, keyed by asset id.
#[derive(Debug, Serialize, Deserialize)]
pub struct Universe {
    /// The collateral engine.
    pub engine: CollateralEngine,
    /// External backing-asset ledgers available for vault creation.
    pub backing: BTreeMap<String, TokenLedger>,
}

impl Universe {
    /// Creates a universe around a fresh engine with no backing assets.
    pub fn new(engine: CollateralEngine) -> Self {
        Self {
            engine,
            backing: BTreeMap::new(),
        }
    }
}

/// Reads a universe from `path`.
pub fn load(path: &Path) -> Result<Universe> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("state file {} is not a valid ledger", path.display()))
}

/// Writes `universe` to `path` atomically (temp file + rename).
pub fn save(path: &Path, universe: &Universe) -> Result<()> {
    let raw = serde_json::to_string_pretty(universe).context("failed to serialize ledger state")?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, raw)
        .with_context(|| format!("failed to write state file {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move state file into place at {}", path.display()))?;
    Ok(())
}
