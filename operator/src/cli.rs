//! # CLI Interface
//!
//! Command-line structure for `campustrust` using `clap` derive. Every
//! setting that the library reads from the environment has a flag with the
//! same environment variable as fallback.

use clap::{Args, Parser, Subcommand, ValueEnum};

use campustrust_protocol::config::{
    DEFAULT_MAX_CONFIRMATION_ROUNDS, DEFAULT_NODE_URL, ENV_APPLICATION_ID, ENV_NODE_TOKEN,
    ENV_NODE_URL, ENV_POOL_ADDRESS, ENV_POOL_MNEMONIC,
};

use crate::logging::LogFormat;

/// Environment variable holding a user account's recovery phrase.
pub const ENV_ACCOUNT_MNEMONIC: &str = "ACCOUNT_MNEMONIC";

/// CampusTrust lending pool operator.
///
/// Generates accounts, deploys the lending application and drives
/// contribute / borrow / repay against a ledger node.
#[derive(Parser, Debug)]
#[command(
    name = "campustrust",
    about = "CampusTrust lending pool operator",
    version,
    propagate_version = true
)]
pub struct CampusTrustCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Ledger node REST endpoint.
    #[arg(long, global = true, env = ENV_NODE_URL, default_value = DEFAULT_NODE_URL)]
    pub node_url: String,

    /// Ledger node API token.
    #[arg(long, global = true, env = ENV_NODE_TOKEN, default_value = "", hide_env_values = true)]
    pub node_token: String,

    /// Lending application id.
    #[arg(long, global = true, env = ENV_APPLICATION_ID)]
    pub app_id: Option<String>,

    /// Rounds to wait for confirmation before giving up.
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CONFIRMATION_ROUNDS)]
    pub rounds: u64,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate or inspect accounts.
    #[command(subcommand)]
    Account(AccountCommand),
    /// Print the source of one of the on-chain programs.
    Program(ProgramArgs),
    /// Compile the escrow for the configured application and print its
    /// address.
    Escrow,
    /// Create the lending application with the pool wallet as creator.
    Deploy(PoolArgs),
    /// Move liquidity from the pool wallet into the escrow.
    Fund(FundArgs),
    /// Opt an account into the lending application.
    OptIn(AccountArgs),
    /// Pay into the pool escrow.
    Contribute(AmountArgs),
    /// Borrow from the pool escrow.
    Borrow(BorrowArgs),
    /// Pay back into the pool escrow.
    Repay(AmountArgs),
    /// Discard an account's local state (clear-state call).
    Reset(AccountArgs),
    /// Show balance and lending state of an address.
    Status(StatusArgs),
}

#[derive(Subcommand, Debug)]
pub enum AccountCommand {
    /// Generate a new account and print its address and recovery phrase.
    New,
    /// Recover an account and print its address.
    Show(AccountArgs),
}

#[derive(Args, Debug)]
pub struct AccountArgs {
    /// 25-word recovery phrase of the acting account.
    #[arg(long, env = ENV_ACCOUNT_MNEMONIC, hide_env_values = true)]
    pub mnemonic: String,
}

#[derive(Args, Debug)]
pub struct AmountArgs {
    #[command(flatten)]
    pub account: AccountArgs,

    /// Amount in whole units, e.g. `0.5`.
    pub amount: String,
}

#[derive(Args, Debug)]
pub struct BorrowArgs {
    #[command(flatten)]
    pub amount: AmountArgs,

    /// Refuse to send unless the phrase controls this address.
    #[arg(long)]
    pub address: Option<String>,
}

#[derive(Args, Debug)]
pub struct PoolArgs {
    /// Pool wallet address.
    #[arg(long, env = ENV_POOL_ADDRESS)]
    pub pool_address: Option<String>,

    /// Pool wallet recovery phrase.
    #[arg(long, env = ENV_POOL_MNEMONIC, hide_env_values = true)]
    pub pool_mnemonic: Option<String>,
}

#[derive(Args, Debug)]
pub struct FundArgs {
    #[command(flatten)]
    pub pool: PoolArgs,

    /// Amount in whole units.
    pub amount: String,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Address to inspect.
    pub address: String,
}

#[derive(Args, Debug)]
pub struct ProgramArgs {
    #[arg(value_enum)]
    pub program: ProgramKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProgramKind {
    /// The lending application's approval program.
    Approval,
    /// The clear-state program.
    Clear,
    /// The escrow guard for the configured application.
    Escrow,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        CampusTrustCli::command().debug_assert();
    }

    #[test]
    fn parses_borrow_with_global_flags() {
        let cli = CampusTrustCli::try_parse_from([
            "campustrust",
            "borrow",
            "--mnemonic",
            "abandon",
            "1.5",
            "--app-id",
            "42",
            "--rounds",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.global.app_id.as_deref(), Some("42"));
        assert_eq!(cli.global.rounds, 3);
        match cli.command {
            Commands::Borrow(args) => {
                assert_eq!(args.amount.amount, "1.5");
                assert!(args.address.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn program_kind_is_a_value_enum() {
        let cli = CampusTrustCli::try_parse_from(["campustrust", "program", "clear"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Program(ProgramArgs {
                program: ProgramKind::Clear
            })
        ));
    }
}
