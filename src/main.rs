//! HungerLink Core: binary entry point.
//!
//! Loads the engine configuration, initializes logging and runs a short
//! walkthrough against the in-memory store, printing each payload as JSON.
//!
//! ## Options
//!
//! - `--config` / `HUNGERLINK_CONFIG`: TOML engine config (defaults if unset)
//! - `--tie-break`: override `matching.tie_break`
//! - `--lenient`: use the clamped increment instead of the conditional one
//!
//! `LOG_FORMAT=json` switches logs to JSON; `RUST_LOG` sets the filter.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hungerlink_core::config::{EngineConfig, TieBreak};
use hungerlink_core::engine::FulfillmentCoordinator;
use hungerlink_core::ledger::InMemoryStore;
use hungerlink_core::types::{DonationSubmission, Location, NewRequest, RequesterType};

#[derive(Parser)]
#[command(name = "hungerlink", about = "Reconcile food donations against recipient requests")]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, env = "HUNGERLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Auto-match tie-break, overriding the config file
    #[arg(long, value_enum)]
    tie_break: Option<TieBreakArg>,

    /// Apply donations with a clamped add instead of a conditional increment
    #[arg(long)]
    lenient: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum TieBreakArg {
    CreationOrder,
    TightestFit,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::CreationOrder => TieBreak::CreationOrder,
            TieBreakArg::TightestFit => TieBreak::TightestFit,
        }
    }
}

fn main() -> Result<()> {
    // LOG_FORMAT=json for log shipping, human-readable otherwise; both on
    // stderr so stdout carries only the payloads
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading engine config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(tie_break) = cli.tie_break {
        config.matching.tie_break = tie_break.into();
    }
    if cli.lenient {
        config.capacity.strict = false;
    }
    info!(
        auto_match = config.matching.auto_match,
        tie_break = ?config.matching.tie_break,
        strict = config.capacity.strict,
        "engine configured"
    );

    let store = Arc::new(InMemoryStore::with_capacity(config.store.initial_capacity));
    let coordinator = FulfillmentCoordinator::new(store, config);

    run_walkthrough(&coordinator)
}

fn emit<T: Serialize>(label: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing payload")?;
    println!("== {label}\n{json}");
    Ok(())
}

fn run_walkthrough(coordinator: &FulfillmentCoordinator<InMemoryStore>) -> Result<()> {
    const SHELTER: u64 = 100;
    const FAMILY: u64 = 101;
    const BAKERY: u64 = 200;
    const RESTAURANT: u64 = 201;

    let mut meals = NewRequest::new(SHELTER, "meals", "50 meals").at(1_000);
    meals.requester_type = RequesterType::Ngo;
    meals.requester_name = Some("Riverside Shelter".into());
    meals.location = Location::new("12 Riverside Rd");
    let meals = coordinator.create_request(meals)?;

    let rice = coordinator.create_request(NewRequest::new(FAMILY, "rice", "20 kg").at(2_000))?;
    emit("open requests", &coordinator.open_requests()?.iter().map(|r| r.view()).collect::<Vec<_>>())?;

    let partial = coordinator.submit_donation(
        DonationSubmission::new(RESTAURANT, "meals", "30 meals").for_request(meals.id).at(3_000),
    )?;
    emit("partial donation", &partial)?;

    match coordinator.submit_donation(
        DonationSubmission::new(BAKERY, "meals", "25 meals").for_request(meals.id).at(4_000),
    ) {
        Ok(unexpected) => emit("over-capacity donation accepted", &unexpected)?,
        Err(err) => println!("== over-capacity donation rejected\n{} ({})", err, err.code()),
    }

    let matched = coordinator.submit_donation(DonationSubmission::new(BAKERY, "Rice", "15 kg").at(5_000))?;
    emit("auto-matched donation", &matched)?;

    let unmatched = coordinator.submit_donation(DonationSubmission::new(BAKERY, "bread", "12 loaves").at(6_000))?;
    emit("unmatched donation", &unmatched)?;

    let claimed = coordinator.claim_donation(unmatched.donation.id, SHELTER, None)?;
    emit("claimed donation", &claimed)?;

    let finished = coordinator.submit_donation(
        DonationSubmission::new(RESTAURANT, "meals", "20 meals").for_request(meals.id).at(7_000),
    )?;
    emit("completing donation", &finished)?;

    let released = coordinator.release_donation(finished.donation.id)?;
    emit("released donation", &released)?;

    emit("rice request", &coordinator.request_view(rice.id)?)?;

    let receipt = coordinator.ledger_receipt(8_000)?;
    println!(
        "== ledger\n{} requests, {} donations, state root {}",
        receipt.requests,
        receipt.donations,
        receipt.state_root_hex()
    );
    Ok(())
}
