//! End-to-end tests for the CampusTrust protocol layer.
//!
//! These tests compose the public pieces the way the orchestrator does,
//! without a ledger: accounts recovered from phrases, programs turned into
//! addresses, borrow groups built, grouped, signed with a key and a logic
//! signature, and encoded for submission.

use campustrust_protocol::account::mnemonic::MNEMONIC_WORDS;
use campustrust_protocol::config::{
    BORROW_METHOD, MIN_TX_FEE, NOTE_BORROW, SIGNATURE_OVERHEAD_BYTES, VALIDITY_WINDOW_ROUNDS,
};
use campustrust_protocol::program::{
    build_escrow_source, parse_escrow_application_id, CompiledProgram,
};
use campustrust_protocol::transaction::{
    assign_group_id, compute_group_id, encode_group, sign_group, Authorization, OnComplete,
    SignedTransaction, Signer, SuggestedParams, Transaction, TransactionBuilder,
};
use campustrust_protocol::{Account, Address, LedgerError};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const APP_ID: u64 = 5_150;

fn params() -> SuggestedParams {
    SuggestedParams {
        fee_per_byte: 0,
        min_fee: MIN_TX_FEE,
        last_round: 41_000,
        genesis_id: "testnet-v1.0".into(),
        genesis_hash: [9; 32],
    }
}

/// Stand-in for compiled escrow bytecode; only its hash matters here.
fn escrow() -> CompiledProgram {
    let source = build_escrow_source(APP_ID);
    let mut bytecode = vec![6];
    bytecode.extend_from_slice(source.as_bytes());
    CompiledProgram::from_bytecode(bytecode)
}

fn borrow_group(borrower: &Account, escrow: &CompiledProgram, amount: u64) -> Vec<Transaction> {
    vec![
        TransactionBuilder::app_call(borrower.address(), APP_ID, OnComplete::NoOp)
            .arg(BORROW_METHOD)
            .arg(amount.to_be_bytes().to_vec())
            .account(escrow.address())
            .build(&params()),
        TransactionBuilder::payment(escrow.address(), borrower.address(), amount)
            .note(NOTE_BORROW)
            .build(&params()),
    ]
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[test]
fn account_survives_phrase_roundtrip() {
    let original = Account::generate();
    let phrase = original.mnemonic();
    assert_eq!(phrase.split_whitespace().count(), MNEMONIC_WORDS);

    let recovered = Account::from_mnemonic(&phrase).unwrap();
    assert_eq!(recovered.address(), original.address());
    assert_eq!(recovered.secret_key(), original.secret_key());

    let text = original.address().to_string();
    assert_eq!(text.parse::<Address>().unwrap(), original.address());
}

#[test]
fn bad_phrase_never_leaks_into_the_error() {
    let mut words: Vec<String> = Account::generate()
        .mnemonic()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    words[7] = "quuxly".to_string();
    let err = Account::from_mnemonic(&words.join(" ")).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidRecoveryPhrase(_)));
    assert!(!err.to_string().contains("quuxly"));

    let err = Account::from_mnemonic(&words[..24].join(" ")).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidRecoveryPhrase(_)));
}

// ---------------------------------------------------------------------------
// Programs
// ---------------------------------------------------------------------------

#[test]
fn escrow_identity_follows_the_application_id() {
    let source = build_escrow_source(APP_ID);
    assert_eq!(parse_escrow_application_id(&source), Some(APP_ID));
    assert_eq!(build_escrow_source(APP_ID), source);
    assert_ne!(build_escrow_source(APP_ID + 1), source);

    assert_eq!(escrow().address(), escrow().address());
    assert_eq!(Signer::Program(&escrow()).address(), escrow().address());
}

// ---------------------------------------------------------------------------
// Borrow groups
// ---------------------------------------------------------------------------

#[test]
fn borrow_group_is_grouped_and_signed_in_one_pass() {
    let borrower = Account::generate();
    let escrow = escrow();
    let mut group = borrow_group(&borrower, &escrow, 3_000_000);
    let bare_ids: Vec<String> = group.iter().map(Transaction::id).collect();

    let gid = assign_group_id(&mut group).unwrap();
    assert_eq!(compute_group_id(&group).unwrap(), gid);
    // Stamping the group id changes every member's id.
    for (tx, bare) in group.iter().zip(&bare_ids) {
        assert_ne!(&tx.id(), bare);
    }

    let signed = sign_group(group, &[Signer::Account(&borrower), Signer::Program(&escrow)]).unwrap();
    assert!(signed.iter().all(SignedTransaction::verify_authorization));
    assert!(matches!(signed[0].authorization, Authorization::Signature(_)));
    assert_eq!(
        signed[1].authorization,
        Authorization::Logic(escrow.bytecode().to_vec())
    );

    let call = signed[0].transaction.as_application_call().unwrap();
    assert_eq!(call.args[0], BORROW_METHOD.as_bytes());
    assert_eq!(call.args[1], 3_000_000u64.to_be_bytes());
    assert_eq!(call.accounts, vec![escrow.address()]);

    let payment = signed[1].transaction.as_payment().unwrap();
    assert_eq!(payment.receiver, signed[0].transaction.sender);
    assert_eq!(payment.amount, 3_000_000);
}

#[test]
fn signers_must_line_up_with_senders() {
    let borrower = Account::generate();
    let escrow = escrow();
    let mut group = borrow_group(&borrower, &escrow, 1);
    assign_group_id(&mut group).unwrap();

    let err = sign_group(group, &[Signer::Program(&escrow), Signer::Account(&borrower)])
        .unwrap_err();
    assert!(matches!(err, LedgerError::Construction(_)));
}

#[test]
fn tampering_after_grouping_is_detectable() {
    let borrower = Account::generate();
    let thief = Account::generate();
    let escrow = escrow();
    let mut group = borrow_group(&borrower, &escrow, 1_000);
    let gid = assign_group_id(&mut group).unwrap();

    if let campustrust_protocol::transaction::TransactionKind::Payment(p) = &mut group[1].kind {
        p.receiver = thief.address();
    }
    assert_ne!(compute_group_id(&group).unwrap(), gid);
}

#[test]
fn submission_body_concatenates_members() {
    let borrower = Account::generate();
    let escrow = escrow();
    let mut group = borrow_group(&borrower, &escrow, 10);
    assign_group_id(&mut group).unwrap();
    let signed = sign_group(group, &[Signer::Account(&borrower), Signer::Program(&escrow)]).unwrap();

    let body = encode_group(&signed);
    let first = signed[0].to_msgpack();
    let second = signed[1].to_msgpack();
    assert_eq!(body.len(), first.len() + second.len());
    assert_eq!(&body[..first.len()], first.as_slice());
    assert_eq!(&body[first.len()..], second.as_slice());
}

// ---------------------------------------------------------------------------
// Fees and validity
// ---------------------------------------------------------------------------

#[test]
fn fee_and_validity_window_follow_params() {
    let alice = Account::generate();
    let tx = TransactionBuilder::payment(alice.address(), escrow().address(), 5).build(&params());
    assert_eq!(tx.fee, MIN_TX_FEE);
    assert_eq!(tx.first_valid, 41_000);
    assert_eq!(tx.last_valid, 41_000 + VALIDITY_WINDOW_ROUNDS);

    let congested = SuggestedParams {
        fee_per_byte: 25,
        ..params()
    };
    let tx = TransactionBuilder::payment(alice.address(), escrow().address(), 5).build(&congested);
    // The estimate is taken before the fee field is filled in.
    let mut unpriced = tx.clone();
    unpriced.fee = 0;
    let size = unpriced.canonical_bytes().len() as u64 + SIGNATURE_OVERHEAD_BYTES;
    assert_eq!(tx.fee, (25 * size).max(MIN_TX_FEE));
}
