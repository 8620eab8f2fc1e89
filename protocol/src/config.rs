//! # Protocol Configuration & Constants
//!
//! Every magic number in CampusTrust lives here, together with the two
//! resolvers that turn raw environment strings into validated configuration
//! (pool wallet, lending application id).
//!
//! The on-chain constants (borrow limit, state keys, schema sizes) are
//! compiled into the programs. Changing them here without redeploying the
//! application gives you a backend that disagrees with the chain, which is
//! the one thing this crate exists to prevent.

use std::fmt;

use crate::account::Address;
use crate::error::{LedgerError, Result};

// ---------------------------------------------------------------------------
// Lending application (compiled in, not runtime-configurable)
// ---------------------------------------------------------------------------

/// Per-borrower cap in minor units. 5 whole units.
pub const BORROW_LIMIT: u64 = 5_000_000;

/// Reputation score written into local state at opt-in.
pub const INITIAL_REPUTATION: u64 = 1;

/// First application argument of a borrow call.
pub const BORROW_METHOD: &str = "borrow";

/// Global state key: last observed escrow balance.
pub const KEY_TOTAL_POOL_BALANCE: &str = "total_pool_balance";

/// Local state key: reputation score.
pub const KEY_REPUTATION_SCORE: &str = "reputation_score";

/// Local state key: running borrowed total.
pub const KEY_BORROWED_AMOUNT: &str = "borrowed_amount";

/// Local state key: per-account cap.
pub const KEY_BORROW_LIMIT: &str = "borrow_limit";

/// Global schema: one uint (`total_pool_balance`).
pub const GLOBAL_NUM_UINTS: u64 = 1;

/// Local schema: three uints (reputation, borrowed, limit).
pub const LOCAL_NUM_UINTS: u64 = 3;

/// Program language version for all three programs.
pub const TEAL_VERSION: u8 = 6;

// ---------------------------------------------------------------------------
// Ledger parameters
// ---------------------------------------------------------------------------

/// Domain prefix hashed in front of a transaction's canonical bytes.
pub const TX_DOMAIN: &[u8] = b"TX";

/// Domain prefix for group id computation.
pub const GROUP_DOMAIN: &[u8] = b"TG";

/// Domain prefix for program (escrow) addresses.
pub const PROGRAM_DOMAIN: &[u8] = b"Program";

/// Network minimum fee per transaction, in minor units.
pub const MIN_TX_FEE: u64 = 1_000;

/// Bytes a signature adds on top of the unsigned encoding when estimating size.
pub const SIGNATURE_OVERHEAD_BYTES: u64 = 75;

/// How many rounds after the suggested first round a transaction stays valid.
pub const VALIDITY_WINDOW_ROUNDS: u64 = 1_000;

/// Minor units per whole unit of the native asset.
pub const MICROUNITS_PER_UNIT: u64 = 1_000_000;

/// Default confirmation budget for payments and borrow groups.
pub const DEFAULT_MAX_CONFIRMATION_ROUNDS: u64 = 6;

/// Confirmation budget for application creation.
pub const DEPLOY_CONFIRMATION_ROUNDS: u64 = 10;

/// Public testnet node used when nothing else is configured.
pub const DEFAULT_NODE_URL: &str = "https://testnet-api.algonode.cloud";

// ---------------------------------------------------------------------------
// Transaction notes
// ---------------------------------------------------------------------------

pub const NOTE_CONTRIBUTE: &str = "CampusTrust: contribute to pool";
pub const NOTE_BORROW: &str = "CampusTrust: borrow from pool via escrow";
pub const NOTE_REPAY: &str = "CampusTrust: repay loan";

// ---------------------------------------------------------------------------
// Environment variable names
// ---------------------------------------------------------------------------

pub const ENV_POOL_ADDRESS: &str = "POOL_ADDRESS";
pub const ENV_POOL_MNEMONIC: &str = "POOL_MNEMONIC";
pub const ENV_APPLICATION_ID: &str = "LENDING_APP_ID";
pub const ENV_NODE_URL: &str = "ALGOD_URL";
pub const ENV_NODE_TOKEN: &str = "ALGOD_TOKEN";

/// Process environment lookup used by the `from_env` constructors.
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

// ---------------------------------------------------------------------------
// Pool configuration
// ---------------------------------------------------------------------------

/// The pool admin wallet: a validated address plus its recovery phrase.
///
/// Resolved once at startup and treated as immutable afterwards. `Debug`
/// never prints the phrase.
#[derive(Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub address: Address,
    pub recovery_phrase: String,
}

impl PoolConfig {
    /// Validate raw pool settings. No network calls.
    ///
    /// Both values are trimmed first; empty counts as missing.
    pub fn resolve(address: Option<&str>, recovery_phrase: Option<&str>) -> Result<Self> {
        let address = address.map(str::trim).unwrap_or_default();
        let recovery_phrase = recovery_phrase.map(str::trim).unwrap_or_default();

        if address.is_empty() {
            return Err(LedgerError::MissingPoolAddress);
        }
        if recovery_phrase.is_empty() {
            return Err(LedgerError::MissingPoolPhrase);
        }
        let address: Address = address.parse().map_err(|_| LedgerError::InvalidPoolAddress)?;

        Ok(Self {
            address,
            recovery_phrase: recovery_phrase.to_string(),
        })
    }

    /// Read `POOL_ADDRESS` / `POOL_MNEMONIC` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_var)
    }

    /// Like [`PoolConfig::from_env`], with variables supplied by `var`.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let address = var(ENV_POOL_ADDRESS);
        let phrase = var(ENV_POOL_MNEMONIC);
        Self::resolve(address.as_deref(), phrase.as_deref())
    }

    /// `None` when neither pool variable is set. A half-configured or
    /// malformed wallet is an error, not an absent one.
    pub fn from_lookup_optional(var: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let is_blank = |name: &str| var(name).map_or(true, |v| v.trim().is_empty());
        if is_blank(ENV_POOL_ADDRESS) && is_blank(ENV_POOL_MNEMONIC) {
            return Ok(None);
        }
        Self::from_lookup(&var).map(Some)
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("address", &self.address)
            .field("recovery_phrase", &"<redacted>")
            .finish()
    }
}

/// Parse a configured lending application id.
///
/// Absent, blank, non-numeric and zero all mean "not configured": there is
/// no implicit creation fallback on the runtime path.
pub fn resolve_application_id(raw: Option<&str>) -> Result<u64> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(LedgerError::MissingApplicationId);
    }
    match raw.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => {
            tracing::warn!("{} is set but is not a positive integer", ENV_APPLICATION_ID);
            Err(LedgerError::MissingApplicationId)
        }
    }
}

// ---------------------------------------------------------------------------
// Node configuration
// ---------------------------------------------------------------------------

/// Where the ledger node lives and how to authenticate to it.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub url: String,
    pub token: String,
}

impl NodeConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }

    /// `ALGOD_URL` / `ALGOD_TOKEN`, falling back to the public testnet node.
    pub fn from_env() -> Self {
        Self::from_lookup(env_var)
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let url = var(ENV_NODE_URL)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_NODE_URL.to_string());
        let token = var(ENV_NODE_TOKEN).unwrap_or_default();
        Self::new(url, token.trim())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_NODE_URL, "")
    }
}

impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConfig")
            .field("url", &self.url)
            .field("token", &if self.token.is_empty() { "<none>" } else { "<set>" })
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Convert a decimal whole-unit string (`"0.05"`, `"3"`) into minor units.
///
/// Exact: at most six fractional digits are accepted, anything finer is an
/// error rather than a silent rounding.
pub fn parse_whole_units(input: &str) -> Result<u64> {
    let input = input.trim();
    let invalid = || LedgerError::InvalidAmount(input.to_string());

    let (whole, frac) = match input.split_once('.') {
        Some((w, f)) => (w, f),
        None => (input, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > 6 {
        return Err(invalid());
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let frac_units: u64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<6}", frac).parse().map_err(|_| invalid())?
    };

    whole
        .checked_mul(MICROUNITS_PER_UNIT)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;

    #[test]
    fn pool_config_trims_and_validates() {
        let account = Account::generate();
        let addr = format!("  {}  ", account.address());
        let phrase = format!("\t{}\n", account.mnemonic());

        let cfg = PoolConfig::resolve(Some(&addr), Some(&phrase)).unwrap();
        assert_eq!(cfg.address, account.address());
        assert_eq!(cfg.recovery_phrase, account.mnemonic());
    }

    #[test]
    fn pool_config_missing_address() {
        let err = PoolConfig::resolve(Some("   "), Some("words")).unwrap_err();
        assert!(matches!(err, LedgerError::MissingPoolAddress));

        let err = PoolConfig::resolve(None, Some("words")).unwrap_err();
        assert!(matches!(err, LedgerError::MissingPoolAddress));
    }

    #[test]
    fn pool_config_missing_phrase() {
        let account = Account::generate();
        let addr = account.address().to_string();
        let err = PoolConfig::resolve(Some(&addr), Some("")).unwrap_err();
        assert!(matches!(err, LedgerError::MissingPoolPhrase));
    }

    #[test]
    fn pool_config_invalid_address() {
        let err = PoolConfig::resolve(Some("not-an-address"), Some("words")).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPoolAddress));
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn pool_config_from_variables() {
        let account = Account::generate();
        let addr = account.address().to_string();
        let phrase = account.mnemonic();

        let cfg = PoolConfig::from_lookup(vars(&[
            (ENV_POOL_ADDRESS, addr.as_str()),
            (ENV_POOL_MNEMONIC, phrase.as_str()),
        ]))
        .unwrap();
        assert_eq!(cfg.address, account.address());

        let err = PoolConfig::from_lookup(vars(&[(ENV_POOL_MNEMONIC, phrase.as_str())])).unwrap_err();
        assert!(matches!(err, LedgerError::MissingPoolAddress));
    }

    #[test]
    fn optional_pool_config_is_absent_only_when_unset() {
        assert_eq!(PoolConfig::from_lookup_optional(vars(&[])).unwrap(), None);
        assert_eq!(
            PoolConfig::from_lookup_optional(vars(&[
                (ENV_POOL_ADDRESS, " "),
                (ENV_POOL_MNEMONIC, ""),
            ]))
            .unwrap(),
            None
        );

        let account = Account::generate();
        let addr = account.address().to_string();
        let phrase = account.mnemonic();

        let err = PoolConfig::from_lookup_optional(vars(&[
            (ENV_POOL_ADDRESS, "not-an-address"),
            (ENV_POOL_MNEMONIC, phrase.as_str()),
        ]))
        .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPoolAddress));

        let err = PoolConfig::from_lookup_optional(vars(&[
            (ENV_POOL_ADDRESS, addr.as_str()),
            (ENV_POOL_MNEMONIC, "   "),
        ]))
        .unwrap_err();
        assert!(matches!(err, LedgerError::MissingPoolPhrase));

        let err = PoolConfig::from_lookup_optional(vars(&[(ENV_POOL_MNEMONIC, phrase.as_str())]))
            .unwrap_err();
        assert!(matches!(err, LedgerError::MissingPoolAddress));
    }

    #[test]
    fn node_config_from_variables() {
        let node = NodeConfig::from_lookup(vars(&[(ENV_NODE_URL, "  ")]));
        assert_eq!(node, NodeConfig::default());

        let node = NodeConfig::from_lookup(vars(&[
            (ENV_NODE_URL, " http://127.0.0.1:4001 "),
            (ENV_NODE_TOKEN, "aaaa\n"),
        ]));
        assert_eq!(node.url, "http://127.0.0.1:4001");
        assert_eq!(node.token, "aaaa");
    }

    #[test]
    fn pool_config_debug_redacts_phrase() {
        let account = Account::generate();
        let cfg = PoolConfig::resolve(
            Some(&account.address().to_string()),
            Some(&account.mnemonic()),
        )
        .unwrap();
        let dbg = format!("{:?}", cfg);
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains(&account.mnemonic()));
    }

    #[test]
    fn application_id_resolution() {
        assert_eq!(resolve_application_id(Some(" 4242 ")).unwrap(), 4242);
        assert!(matches!(
            resolve_application_id(None),
            Err(LedgerError::MissingApplicationId)
        ));
        assert!(matches!(
            resolve_application_id(Some("")),
            Err(LedgerError::MissingApplicationId)
        ));
        assert!(matches!(
            resolve_application_id(Some("0")),
            Err(LedgerError::MissingApplicationId)
        ));
        assert!(matches!(
            resolve_application_id(Some("-7")),
            Err(LedgerError::MissingApplicationId)
        ));
        assert!(matches!(
            resolve_application_id(Some("12abc")),
            Err(LedgerError::MissingApplicationId)
        ));
    }

    #[test]
    fn whole_unit_parsing() {
        assert_eq!(parse_whole_units("1").unwrap(), 1_000_000);
        assert_eq!(parse_whole_units("0.05").unwrap(), 50_000);
        assert_eq!(parse_whole_units(".5").unwrap(), 500_000);
        assert_eq!(parse_whole_units("3.000001").unwrap(), 3_000_001);
        assert_eq!(parse_whole_units("5.").unwrap(), 5_000_000);
    }

    #[test]
    fn whole_unit_parsing_rejects_garbage() {
        assert!(parse_whole_units("").is_err());
        assert!(parse_whole_units(".").is_err());
        assert!(parse_whole_units("1.0000001").is_err());
        assert!(parse_whole_units("-1").is_err());
        assert!(parse_whole_units("1e6").is_err());
        assert!(parse_whole_units("99999999999999999999").is_err());
    }

    #[test]
    fn node_config_debug_hides_token() {
        let cfg = NodeConfig::new("http://localhost:4001", "a".repeat(64));
        let dbg = format!("{:?}", cfg);
        assert!(dbg.contains("<set>"));
        assert!(!dbg.contains("aaaa"));
    }

    #[test]
    fn protocol_constants_sanity() {
        assert_eq!(BORROW_LIMIT, 5 * MICROUNITS_PER_UNIT);
        assert!(MIN_TX_FEE > 0);
        assert_eq!(LOCAL_NUM_UINTS, 3);
        assert_eq!(GLOBAL_NUM_UINTS, 1);
    }
}
