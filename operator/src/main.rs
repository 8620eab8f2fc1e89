// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # CampusTrust Operator
//!
//! Entry point for the `campustrust` binary. Parses CLI arguments,
//! initializes logging, resolves configuration once and hands each command
//! to the library's orchestrator.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

mod cli;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use campustrust_protocol::config::{
    parse_whole_units, resolve_application_id, NodeConfig, PoolConfig,
};
use campustrust_protocol::program::{
    build_clear_source, build_escrow_source, build_state_machine_source,
};
use campustrust_protocol::{Account, Address, AlgodClient, Orchestrator, OrchestratorSettings};

use cli::{AccountCommand, CampusTrustCli, Commands, GlobalArgs, PoolArgs, ProgramKind};
use logging::DEFAULT_FILTER;

type Operator = Orchestrator<AlgodClient>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CampusTrustCli::parse();
    logging::init_logging(DEFAULT_FILTER, cli.global.log_format);

    match cli.command {
        Commands::Account(AccountCommand::New) => {
            let account = Account::generate();
            print_json(&serde_json::json!({
                "address": account.address(),
                "mnemonic": account.mnemonic(),
            }))
        }
        Commands::Account(AccountCommand::Show(args)) => {
            let account = recover(&args.mnemonic)?;
            print_json(&serde_json::json!({ "address": account.address() }))
        }
        Commands::Program(args) => print_program(&cli.global, args.program),
        Commands::Escrow => {
            let operator = operator(&cli.global, None)?;
            let application_id = operator.resolve_application_id()?;
            let escrow = operator.escrow(application_id).await?;
            print_json(&serde_json::json!({
                "application_id": application_id,
                "escrow_address": escrow.address(),
            }))
        }
        Commands::Deploy(pool) => {
            let operator = operator(&cli.global, Some(resolve_pool(&pool)?))?;
            let creator = operator.pool_account()?;
            let deployment = operator
                .create_application(&creator)
                .await
                .context("deploying the lending application")?;
            tracing::info!(
                application_id = deployment.application_id,
                "set LENDING_APP_ID to use this application"
            );
            print_json(&deployment)
        }
        Commands::Fund(args) => {
            let operator = operator(&cli.global, Some(resolve_pool(&args.pool)?))?;
            let amount = parse_whole_units(&args.amount)?;
            print_json(&operator.fund_escrow(amount).await?)
        }
        Commands::OptIn(args) => {
            let operator = operator(&cli.global, None)?;
            let account = recover(&args.mnemonic)?;
            let application_id = operator.resolve_application_id()?;
            match operator.ensure_opted_in(&account, application_id).await? {
                Some(receipt) => print_json(&receipt),
                None => print_json(&serde_json::json!({ "already_opted_in": true })),
            }
        }
        Commands::Contribute(args) => {
            let operator = operator(&cli.global, None)?;
            let account = recover(&args.account.mnemonic)?;
            let amount = parse_whole_units(&args.amount)?;
            print_json(&operator.contribute(&account, amount).await?)
        }
        Commands::Borrow(args) => {
            let operator = operator(&cli.global, None)?;
            let account = recover(&args.amount.account.mnemonic)?;
            let amount = parse_whole_units(&args.amount.amount)?;
            let expected = args
                .address
                .as_deref()
                .map(str::parse::<Address>)
                .transpose()?;
            print_json(&operator.borrow(&account, amount, expected.as_ref()).await?)
        }
        Commands::Repay(args) => {
            let operator = operator(&cli.global, None)?;
            let account = recover(&args.account.mnemonic)?;
            let amount = parse_whole_units(&args.amount)?;
            print_json(&operator.repay(&account, amount).await?)
        }
        Commands::Reset(args) => {
            let operator = operator(&cli.global, None)?;
            let account = recover(&args.mnemonic)?;
            print_json(&operator.clear_state(&account).await?)
        }
        Commands::Status(args) => {
            let operator = operator(&cli.global, None)?;
            let address: Address = args.address.parse()?;
            print_json(&operator.account_status(&address).await?)
        }
    }
}

/// Resolve settings once and build an orchestrator over the HTTP adapter.
fn operator(global: &GlobalArgs, pool: Option<PoolConfig>) -> Result<Operator> {
    let node = NodeConfig::new(global.node_url.trim(), global.node_token.trim());
    tracing::debug!(?node, "using ledger node");

    let application_id = match global.app_id.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(
            resolve_application_id(Some(raw)).context("--app-id / LENDING_APP_ID")?,
        ),
        _ => None,
    };
    let settings = OrchestratorSettings {
        application_id,
        pool,
        max_confirmation_rounds: global.rounds,
        ..OrchestratorSettings::default()
    };
    Ok(Orchestrator::new(Arc::new(AlgodClient::new(&node)), settings))
}

fn resolve_pool(args: &PoolArgs) -> Result<PoolConfig> {
    PoolConfig::resolve(args.pool_address.as_deref(), args.pool_mnemonic.as_deref())
        .context("resolving the pool wallet")
}

fn recover(mnemonic: &str) -> Result<Account> {
    Account::from_mnemonic(mnemonic).context("recovering the account")
}

fn print_program(global: &GlobalArgs, program: ProgramKind) -> Result<()> {
    let source = match program {
        ProgramKind::Approval => build_state_machine_source(),
        ProgramKind::Clear => build_clear_source(),
        ProgramKind::Escrow => {
            let application_id = resolve_application_id(global.app_id.as_deref())
                .context("the escrow program needs --app-id / LENDING_APP_ID")?;
            build_escrow_source(application_id)
        }
    };
    print!("{}", source);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
