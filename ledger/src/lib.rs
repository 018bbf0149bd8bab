// Copyright (c) 2026 Ingot Labs. MIT License.
// See LICENSE for details.

//! # INGOT Ledger — Core Library
//!
//! INGOT is a collateralized fungible-token ledger: a primary token whose
//! supply only ever grows by depositing a backing asset and only ever
//! shrinks by redeeming it, at a protocol-controlled ratio. No oracle, no
//! governance theater — the exchange rate is an administrator parameter,
//! and the arithmetic is the product.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual concerns of a
//! collateralization engine:
//!
//! - **token** — Fungible balance and allowance bookkeeping. The one place
//!   balances move.
//! - **vault** — Per-backing-asset custody: deposits, exchange rate,
//!   deprecation state.
//! - **engine** — Cast (mint against collateral) and destroy (redeem),
//!   plus vault administration and the reward mint.
//! - **transition** — The staged re-peg state machine. Exchange rates move
//!   gradually, funded by stake deposits, never by fiat.
//! - **math** — Fixed-point helpers. `u128` intermediates, no floats, ever.
//! - **config** — Protocol constants. If you're hardcoding a ratio
//!   somewhere else, you're doing it wrong.
//!
//! ## Design Philosophy
//!
//! 1. All monetary operations check for overflow — wrapping arithmetic and
//!    money do not mix.
//! 2. Every operation is atomic: it validates everything first, then
//!    mutates, then touches the external asset last.
//! 3. Privileged mint/burn are crate-internal. The public entry points
//!    exist for interface compatibility and always fail.
//! 4. Every public type is serializable (serde) for persistence.

pub mod config;
pub mod engine;
pub mod math;
pub mod token;
pub mod transition;
pub mod vault;

pub use engine::{CollateralEngine, CollateralError};
pub use token::{FungibleLedger, TokenError, TokenLedger};
pub use vault::BackingVault;
