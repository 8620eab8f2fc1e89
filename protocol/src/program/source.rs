//! Program source text.
//!
//! All three programs are pure functions of compiled-in constants (and, for
//! the escrow, an application id). The same input always yields the same
//! text, so the same bytecode and the same escrow address.

use crate::config::{
    BORROW_LIMIT, BORROW_METHOD, INITIAL_REPUTATION, KEY_BORROWED_AMOUNT, KEY_BORROW_LIMIT,
    KEY_REPUTATION_SCORE, KEY_TOTAL_POOL_BALANCE, TEAL_VERSION,
};

/// Approval program of the lending application.
///
/// Scratch slots: 0 requested amount, 1 caller's limit, 2 caller's
/// borrowed total, 3 escrow balance.
pub fn build_state_machine_source() -> String {
    format!(
        r#"#pragma version {TEAL_VERSION}

// Creation call: nothing to initialise beyond the schema.
txn ApplicationID
int 0
==
bnz handle_create

txn OnCompletion
int NoOp
==
bnz handle_noop

txn OnCompletion
int OptIn
==
bnz handle_optin

// CloseOut, UpdateApplication, DeleteApplication.
err

handle_create:
int 1
return

handle_optin:
txn Sender
byte "{KEY_REPUTATION_SCORE}"
int {INITIAL_REPUTATION}
app_local_put
txn Sender
byte "{KEY_BORROWED_AMOUNT}"
int 0
app_local_put
txn Sender
byte "{KEY_BORROW_LIMIT}"
int {BORROW_LIMIT}
app_local_put
int 1
return

handle_noop:
txna ApplicationArgs 0
byte "{BORROW_METHOD}"
==
bnz handle_borrow
err

handle_borrow:
txna ApplicationArgs 1
btoi
store 0
txn Sender
byte "{KEY_BORROW_LIMIT}"
app_local_get
store 1
txn Sender
byte "{KEY_BORROWED_AMOUNT}"
app_local_get
store 2

// borrowed_amount + requested <= borrow_limit
load 2
load 0
+
load 1
<=
bnz check_pool_balance
int 0
return

check_pool_balance:
// accounts[1] is the escrow.
int 1
balance
store 3
byte "{KEY_TOTAL_POOL_BALANCE}"
load 3
app_global_put

// requested <= escrow balance
load 0
load 3
<=
bnz update_borrowed_amount
int 0
return

update_borrowed_amount:
txn Sender
byte "{KEY_BORROWED_AMOUNT}"
load 2
load 0
+
app_local_put
int 1
return
"#
    )
}

/// Clear-state program. Always approves.
pub fn build_clear_source() -> String {
    format!("#pragma version {TEAL_VERSION}\nint 1\n")
}

/// Escrow guard bound to one lending application.
pub fn build_escrow_source(application_id: u64) -> String {
    format!(
        r#"#pragma version {TEAL_VERSION}

global GroupSize
int 2
==
bnz check_index
err

check_index:
txn GroupIndex
int 1
==
bnz check_app_call
err

check_app_call:
gtxn 0 TypeEnum
int appl
==
bnz check_app_id
err

check_app_id:
gtxn 0 ApplicationID
int {application_id}
==
bnz check_receiver
err

check_receiver:
// Funds go only to whoever called the application.
gtxn 0 Sender
txn Receiver
==
bnz check_payment
err

check_payment:
txn TypeEnum
int pay
==
bnz check_safety_fields
err

check_safety_fields:
txn RekeyTo
global ZeroAddress
==
txn CloseRemainderTo
global ZeroAddress
==
&&
bnz approve
err

approve:
int 1
"#
    )
}

/// Recover the application id from an escrow source.
///
/// Returns `Some(id)` only when `source` is byte-for-byte what
/// [`build_escrow_source`] produces for that id.
pub fn parse_escrow_application_id(source: &str) -> Option<u64> {
    let mut lines = source.lines();
    lines.find(|line| line.trim() == "gtxn 0 ApplicationID")?;
    let id: u64 = lines.next()?.trim().strip_prefix("int ")?.parse().ok()?;

    (build_escrow_source(id) == source).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_are_deterministic() {
        assert_eq!(build_state_machine_source(), build_state_machine_source());
        assert_eq!(build_escrow_source(77), build_escrow_source(77));
        assert_ne!(build_escrow_source(77), build_escrow_source(78));
    }

    #[test]
    fn state_machine_compiles_in_the_limit() {
        let src = build_state_machine_source();
        assert!(src.starts_with("#pragma version 6\n"));
        assert!(src.contains("int 5000000"));
        assert!(src.contains("byte \"borrow\""));
        assert!(src.contains("app_global_put"));
    }

    #[test]
    fn local_state_access_names_the_account() {
        // One `txn Sender` per local read or write; nothing else uses it.
        let src = build_state_machine_source();
        let senders = src.lines().filter(|l| *l == "txn Sender").count();
        let local_ops = src
            .lines()
            .filter(|l| *l == "app_local_get" || *l == "app_local_put")
            .count();
        assert_eq!(local_ops, 6);
        assert_eq!(senders, local_ops);
    }

    #[test]
    fn escrow_embeds_application_id() {
        let src = build_escrow_source(123456);
        assert!(src.contains("gtxn 0 ApplicationID\nint 123456\n"));
        assert!(src.contains("txn RekeyTo"));
        assert!(src.contains("txn CloseRemainderTo"));
    }

    #[test]
    fn parse_escrow_roundtrip() {
        assert_eq!(
            parse_escrow_application_id(&build_escrow_source(42)),
            Some(42)
        );
    }

    #[test]
    fn parse_escrow_rejects_other_programs() {
        assert_eq!(parse_escrow_application_id(&build_state_machine_source()), None);
        assert_eq!(parse_escrow_application_id(&build_clear_source()), None);
        let tampered = build_escrow_source(42).replace("int 2\n", "int 3\n");
        assert_eq!(parse_escrow_application_id(&tampered), None);
    }

    #[test]
    fn clear_program_approves() {
        assert_eq!(build_clear_source(), "#pragma version 6\nint 1\n");
    }
}
