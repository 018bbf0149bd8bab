//! # CLI Interface
//!
//! Defines the command-line argument structure for `ingot` using `clap`
//! derive. Every public operation of the collateral engine is a
//! subcommand; the ledger universe lives in a JSON state file between
//! invocations, and `--actor` names the account performing the call;
//! there is no ambient identity.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// INGOT collateralized-ledger workbench.
///
/// Operates a primary token whose supply is expanded only by depositing
/// backing collateral and contracted only by redeeming it. State is a
/// plain JSON file; every command loads it, applies one atomic operation,
/// and writes it back.
#[derive(Parser, Debug)]
#[command(
    name = "ingot",
    about = "INGOT collateralized-ledger workbench",
    version,
    propagate_version = true
)]
pub struct IngotCli {
    /// Path to the JSON ledger state file.
    #[arg(long, short = 's', env = "INGOT_STATE", default_value = "ingot.json", global = true)]
    pub state: PathBuf,

    /// Account performing the operation.
    #[arg(long, short = 'a', env = "INGOT_ACTOR", default_value = "admin", global = true)]
    pub actor: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `ingot` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a fresh ledger universe: the primary token plus an empty
    /// vault registry. The initial supply is minted to the actor.
    Init {
        /// Human-readable name of the primary token.
        #[arg(long)]
        name: String,
        /// Ticker symbol; doubles as the primary token's asset id.
        #[arg(long)]
        symbol: String,
        /// Initial supply minted to the actor.
        #[arg(long, default_value_t = 0)]
        supply: u64,
        /// Reward-mint floor ratio, scaled by 100000. Defaults to 110%.
        #[arg(long)]
        reward_floor: Option<u64>,
    },
    /// Register a standalone backing-asset ledger in the universe.
    CreateToken {
        /// Asset id (vault key).
        #[arg(long)]
        id: String,
        /// Human-readable token name.
        #[arg(long)]
        name: String,
        /// Ticker symbol.
        #[arg(long)]
        symbol: String,
        /// Initial supply minted to the actor.
        #[arg(long, default_value_t = 0)]
        supply: u64,
    },
    /// Accept an asset as collateral at the given exchange rate, or
    /// update the rate of an already-accepted asset.
    CreateVault {
        /// Backing-asset id.
        #[arg(long)]
        asset: String,
        /// Exchange rate, scaled by 100000 (100000 = 100%).
        #[arg(long)]
        rate: u64,
    },
    /// Remove an empty vault from the accepted list.
    RemoveVault {
        /// Backing-asset id.
        #[arg(long)]
        asset: String,
    },
    /// Mint primary tokens against a backing deposit pulled from the
    /// actor's pre-authorized budget.
    Cast {
        /// Backing-asset id.
        #[arg(long)]
        asset: String,
        /// Primary tokens to mint.
        #[arg(long)]
        amount: u64,
    },
    /// Burn primary tokens and withdraw the pro-rata backing share.
    Destroy {
        /// Backing-asset id.
        #[arg(long)]
        asset: String,
        /// Primary tokens to redeem.
        #[arg(long)]
        amount: u64,
    },
    /// Open a staged exchange-rate transition on a vault.
    Repeg {
        /// Backing-asset id.
        #[arg(long)]
        asset: String,
        /// Target exchange rate, scaled by 100000.
        #[arg(long)]
        target: u64,
    },
    /// Cancel the pending transition on a vault.
    CancelRepeg {
        /// Backing-asset id.
        #[arg(long)]
        asset: String,
    },
    /// Deposit backing units to advance a pending rate transition.
    Stake {
        /// Backing-asset id.
        #[arg(long)]
        asset: String,
        /// Backing units to deposit.
        #[arg(long)]
        amount: u64,
    },
    /// Mint collateral surplus to an account as a reward.
    Reward {
        /// Recipient account.
        #[arg(long)]
        account: String,
        /// Primary tokens to mint.
        #[arg(long)]
        amount: u64,
    },
    /// Flip the deprecation switch on a vault.
    Deprecate {
        /// Backing-asset id.
        #[arg(long)]
        asset: String,
    },
    /// Move tokens from the actor to another account.
    Transfer {
        /// Token to move: the primary symbol or a backing-asset id.
        #[arg(long)]
        token: String,
        /// Recipient account.
        #[arg(long)]
        to: String,
        /// Amount to move.
        #[arg(long)]
        amount: u64,
    },
    /// Raise a spender's budget over the actor's funds. Use the spender
    /// `system` to authorize the protocol itself (required before `cast`,
    /// `stake`, and `destroy`).
    Approve {
        /// Token: the primary symbol or a backing-asset id.
        #[arg(long)]
        token: String,
        /// Spender account, or `system`.
        #[arg(long)]
        spender: String,
        /// Allowance increase.
        #[arg(long)]
        amount: u64,
    },
    /// Print supply, collateral, and vault state.
    Status {
        /// Limit output to one vault.
        #[arg(long)]
        asset: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        IngotCli::command().debug_assert();
    }

    #[test]
    fn cast_parses() {
        let cli = IngotCli::parse_from([
            "ingot", "--actor", "alice", "cast", "--asset", "ATU", "--amount", "250",
        ]);
        assert_eq!(cli.actor, "alice");
        match cli.command {
            Commands::Cast { asset, amount } => {
                assert_eq!(asset, "ATU");
                assert_eq!(amount, 250);
            }
            other => panic!("parsed wrong command: {:?}", other),
        }
    }
}
