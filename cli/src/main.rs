// Copyright (c) 2026 Ingot Labs. MIT License.
// See LICENSE for details.

//! # INGOT Workbench
//!
//! Entry point for the `ingot` binary. Parses CLI arguments, initializes
//! logging, loads the JSON ledger state, applies exactly one atomic
//! engine operation, and writes the state back.
//!
//! There is no daemon and no network surface: the call surface of the
//! protocol *is* the command set, and the state file is the persisted
//! data model. Set `INGOT_LOG_FORMAT=json` for machine-readable logs.

mod cli;
mod logging;
mod store;

use anyhow::{bail, Context, Result};
use clap::Parser;

use ingot_ledger::{CollateralEngine, FungibleLedger, TokenLedger};

use cli::{Commands, IngotCli};
use logging::LogFormat;
use store::Universe;

fn main() -> Result<()> {
    let cli = IngotCli::parse();

    let format = std::env::var("INGOT_LOG_FORMAT")
        .map(|s| LogFormat::from_str_lossy(&s))
        .unwrap_or(LogFormat::Pretty);
    logging::init_logging("ingot_cli=info,ingot_ledger=info", format);

    run(cli)
}

fn run(cli: IngotCli) -> Result<()> {
    let state = cli.state;
    let actor = cli.actor;
    tracing::debug!(state = %state.display(), actor = %actor, "dispatching command");

    match cli.command {
        Commands::Init {
            name,
            symbol,
            supply,
            reward_floor,
        } => {
            if state.exists() {
                bail!("state file {} already exists", state.display());
            }
            let mut engine = CollateralEngine::new(&symbol, &name, &symbol, supply, &actor);
            if let Some(floor) = reward_floor {
                engine = engine.with_reward_floor(floor);
            }
            store::save(&state, &Universe::new(engine))?;
            println!(
                "initialized {} ({}) with supply {} held by {}",
                name, symbol, supply, actor
            );
        }

        Commands::CreateToken {
            id,
            name,
            symbol,
            supply,
        } => {
            let mut u = store::load(&state)?;
            if id == u.engine.token().asset_id() {
                bail!("asset id {} is taken by the primary token", id);
            }
            if u.backing.contains_key(&id) {
                bail!("backing asset {} already exists", id);
            }
            u.backing
                .insert(id.clone(), TokenLedger::new(&id, &name, &symbol, supply, &actor));
            store::save(&state, &u)?;
            println!("created backing asset {} with supply {} held by {}", id, supply, actor);
        }

        Commands::CreateVault { asset, rate } => {
            let mut u = store::load(&state)?;
            if !u.backing.contains_key(&asset) {
                bail!("backing asset {} does not exist; create-token it first", asset);
            }
            u.engine.create_vault(&asset, rate)?;
            store::save(&state, &u)?;
            println!("vault for {} at rate {}", asset, pct(rate));
        }

        Commands::RemoveVault { asset } => {
            let mut u = store::load(&state)?;
            u.engine.remove_vault(&asset)?;
            store::save(&state, &u)?;
            println!("vault for {} removed", asset);
        }

        Commands::Cast { asset, amount } => {
            let mut u = store::load(&state)?;
            let backing = backing_mut(&mut u.backing, &asset)?;
            let deposit = u.engine.cast(backing, &actor, amount)?;
            store::save(&state, &u)?;
            println!(
                "cast {} {}; deposited {} {} ({} backed at {})",
                amount,
                u.engine.token().symbol(),
                deposit,
                asset,
                u.engine.token().total_supply(),
                pct(u.engine.current_collateral_ratio()),
            );
        }

        Commands::Destroy { asset, amount } => {
            let mut u = store::load(&state)?;
            let backing = backing_mut(&mut u.backing, &asset)?;
            let returned = u.engine.destroy(backing, &actor, amount)?;
            store::save(&state, &u)?;
            println!(
                "destroyed {} {}; returned {} {}",
                amount,
                u.engine.token().symbol(),
                returned,
                asset
            );
        }

        Commands::Repeg { asset, target } => {
            let mut u = store::load(&state)?;
            u.engine.require_change_exchange_rate(&asset, target)?;
            store::save(&state, &u)?;
            println!("transition opened on {} toward {}", asset, pct(target));
        }

        Commands::CancelRepeg { asset } => {
            let mut u = store::load(&state)?;
            u.engine.cancel_change_exchange_rate(&asset)?;
            store::save(&state, &u)?;
            println!(
                "transition cancelled on {}; rate stays at {}",
                asset,
                pct(u.engine.exchange_rate(&asset))
            );
        }

        Commands::Stake { asset, amount } => {
            let mut u = store::load(&state)?;
            let backing = backing_mut(&mut u.backing, &asset)?;
            let rate = u.engine.stake(backing, &actor, amount)?;
            store::save(&state, &u)?;
            let pending = u.engine.pending_exchange_rate(&asset);
            if pending == 0 {
                println!("staked {} {}; transition complete at {}", amount, asset, pct(rate));
            } else {
                println!(
                    "staked {} {}; rate now {} (target {})",
                    amount,
                    asset,
                    pct(rate),
                    pct(pending)
                );
            }
        }

        Commands::Reward { account, amount } => {
            let mut u = store::load(&state)?;
            u.engine.reward_distribute(&account, amount)?;
            store::save(&state, &u)?;
            println!(
                "rewarded {} with {} {}; ratio now {}",
                account,
                amount,
                u.engine.token().symbol(),
                pct(u.engine.current_collateral_ratio())
            );
        }

        Commands::Deprecate { asset } => {
            let mut u = store::load(&state)?;
            let deprecated = u.engine.toggle_deprecated(&asset)?;
            store::save(&state, &u)?;
            println!(
                "vault for {} is now {}",
                asset,
                if deprecated { "deprecated" } else { "active" }
            );
        }

        Commands::Transfer { token, to, amount } => {
            let mut u = store::load(&state)?;
            let ledger = token_mut(&mut u, &token)?;
            ledger.transfer(&actor, &to, amount)?;
            store::save(&state, &u)?;
            println!("transferred {} {} from {} to {}", amount, token, actor, to);
        }

        Commands::Approve {
            token,
            spender,
            amount,
        } => {
            let mut u = store::load(&state)?;
            let spender = if spender == "system" {
                u.engine.system_account().to_string()
            } else {
                spender
            };
            let ledger = token_mut(&mut u, &token)?;
            ledger.increase_allowance(&actor, &spender, amount)?;
            store::save(&state, &u)?;
            println!("{} may now spend {} more {} of {}", spender, amount, token, actor);
        }

        Commands::Status { asset } => {
            let u = store::load(&state)?;
            print_status(&u, asset.as_deref());
        }
    }
    Ok(())
}

/// Looks up a backing-asset ledger by id.
fn backing_mut<'a>(
    backing: &'a mut std::collections::BTreeMap<String, TokenLedger>,
    asset: &str,
) -> Result<&'a mut TokenLedger> {
    backing
        .get_mut(asset)
        .with_context(|| format!("unknown backing asset {}", asset))
}

/// Resolves a token argument to the primary ledger or a backing ledger.
fn token_mut<'a>(u: &'a mut Universe, token: &str) -> Result<&'a mut TokenLedger> {
    if token == u.engine.token().asset_id() || token == u.engine.token().symbol() {
        Ok(u.engine.token_mut())
    } else {
        backing_mut(&mut u.backing, token)
    }
}

/// Formats a scaled ratio (100000 = 100%) as a percentage.
fn pct(ratio: u64) -> String {
    format!("{}.{:03}%", ratio / 1000, ratio % 1000)
}

fn print_status(u: &Universe, only: Option<&str>) {
    let engine = &u.engine;
    let token = engine.token();
    println!("INGOT ledger {} ({})", token.name(), token.symbol());
    println!("  total supply     : {}", token.total_supply());
    println!("  total collateral : {}", engine.total_collateral());
    println!("  collateral ratio : {}", pct(engine.current_collateral_ratio()));
    println!("  reward floor     : {}", pct(engine.reward_floor_ratio()));

    for asset in engine.accepted_assets() {
        if only.is_some_and(|a| a != asset) {
            continue;
        }
        if let Some(vault) = engine.vault(&asset) {
            println!("  vault {}", asset);
            println!("    exchange rate  : {}", pct(vault.exchange_rate));
            println!("    target ratio   : {}", pct(vault.target_ratio));
            println!("    deposited      : {}", vault.deposited);
            println!("    normalized     : {}", vault.normalized);
            println!("    deprecated     : {}", if vault.deprecated { "yes" } else { "no" });
            match vault.pending_target {
                Some(t) => println!("    pending target : {}", pct(t)),
                None => println!("    pending target : none"),
            }
        }
    }
}
