//! Transaction construction via the builder pattern.
//!
//! The [`TransactionBuilder`] enforces a disciplined construction flow:
//! pick a kind, set the optional fields, call `.build(&params)`, and get
//! back an unsigned [`Transaction`] with its fee already computed.
//!
//! The builder does not sign; that happens in [`super::signing`]. This
//! separation keeps construction testable without key material.

use data_encoding::BASE32_NOPAD;

use super::encoding::{MapBuilder, Value};
use super::types::{
    ApplicationCall, OnComplete, Payment, StateSchema, SuggestedParams, TransactionKind,
};
use crate::account::Address;
use crate::config::{SIGNATURE_OVERHEAD_BYTES, TX_DOMAIN};
use crate::crypto::domain_hash;

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// An unsigned ledger transaction.
///
/// # Canonical Byte Format
///
/// [`Transaction::canonical_bytes`] is the MessagePack map described in
/// [`super::encoding`]. The id is `base32(SHA-512/256("TX" || bytes))` and
/// the secret-key signature covers the same `"TX" || bytes` preimage, so
/// the id is stable across signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub sender: Address,
    /// Minor units.
    pub fee: u64,
    pub first_valid: u64,
    pub last_valid: u64,
    pub genesis_id: String,
    pub genesis_hash: [u8; 32],
    pub note: Vec<u8>,
    /// Shared by every member of an atomic group. `None` when standalone.
    pub group: Option<[u8; 32]>,
    pub rekey_to: Option<Address>,
    pub kind: TransactionKind,
}

impl Transaction {
    /// The canonical map, before encoding.
    pub fn to_value(&self) -> Value {
        let mut map = MapBuilder::new()
            .uint("fee", self.fee)
            .uint("fv", self.first_valid)
            .uint("lv", self.last_valid)
            .str("gen", &self.genesis_id)
            .digest("gh", Some(&self.genesis_hash))
            .digest("grp", self.group.as_ref())
            .bin("note", &self.note)
            .address("snd", Some(&self.sender))
            .address("rekey", self.rekey_to.as_ref())
            .str("type", self.kind.tx_type().wire_tag());

        match &self.kind {
            TransactionKind::Payment(pay) => {
                map = map
                    .address("rcv", Some(&pay.receiver))
                    .uint("amt", pay.amount)
                    .address("close", pay.close_remainder_to.as_ref());
            }
            TransactionKind::ApplicationCall(call) => {
                map = map
                    .uint("apid", call.app_id)
                    .uint("apan", call.on_complete.as_u64())
                    .array(
                        "apaa",
                        call.args.iter().map(|a| Value::Bin(a.clone())).collect(),
                    )
                    .array(
                        "apat",
                        call.accounts
                            .iter()
                            .map(|a| Value::Bin(a.as_bytes().to_vec()))
                            .collect(),
                    )
                    .bin("apap", &call.approval_program)
                    .bin("apsu", &call.clear_program)
                    .map("apgs", schema_map(call.global_schema))
                    .map("apls", schema_map(call.local_schema));
            }
        }
        map.finish()
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.to_value().encode()
    }

    /// `"TX" || canonical bytes`: what a secret-key signature covers.
    pub fn bytes_to_sign(&self) -> Vec<u8> {
        let mut buf = TX_DOMAIN.to_vec();
        buf.extend_from_slice(&self.canonical_bytes());
        buf
    }

    pub fn raw_id(&self) -> [u8; 32] {
        domain_hash(TX_DOMAIN, &self.canonical_bytes())
    }

    /// 52-character base32 transaction id.
    pub fn id(&self) -> String {
        BASE32_NOPAD.encode(&self.raw_id())
    }

    /// Size estimate used for fee computation: encoded length plus what a
    /// signature adds.
    pub fn estimated_size(&self) -> u64 {
        self.canonical_bytes().len() as u64 + SIGNATURE_OVERHEAD_BYTES
    }

    pub fn as_payment(&self) -> Option<&Payment> {
        match &self.kind {
            TransactionKind::Payment(p) => Some(p),
            TransactionKind::ApplicationCall(_) => None,
        }
    }

    pub fn as_application_call(&self) -> Option<&ApplicationCall> {
        match &self.kind {
            TransactionKind::ApplicationCall(c) => Some(c),
            TransactionKind::Payment(_) => None,
        }
    }
}

fn schema_map(schema: Option<StateSchema>) -> MapBuilder {
    let schema = schema.unwrap_or_default();
    MapBuilder::new()
        .uint("nui", schema.num_uints)
        .uint("nbs", schema.num_byte_slices)
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned [`Transaction`] instances.
///
/// # Usage
///
/// ```rust
/// use campustrust_protocol::account::Account;
/// use campustrust_protocol::transaction::{SuggestedParams, TransactionBuilder};
///
/// let alice = Account::generate();
/// let bob = Account::generate();
/// let params = SuggestedParams {
///     fee_per_byte: 0,
///     min_fee: 1_000,
///     last_round: 100,
///     genesis_id: "testnet-v1.0".into(),
///     genesis_hash: [1; 32],
/// };
///
/// let tx = TransactionBuilder::payment(alice.address(), bob.address(), 50_000)
///     .note("lunch")
///     .build(&params);
/// assert_eq!(tx.fee, 1_000);
/// ```
///
/// The fee is `max(min_fee, fee_per_byte * estimated_size)` unless
/// [`flat_fee`](Self::flat_fee) overrides it.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    sender: Address,
    kind: TransactionKind,
    note: Vec<u8>,
    flat_fee: Option<u64>,
}

impl TransactionBuilder {
    /// Plain payment of `amount` minor units.
    pub fn payment(sender: Address, receiver: Address, amount: u64) -> Self {
        Self::new(
            sender,
            TransactionKind::Payment(Payment {
                receiver,
                amount,
                close_remainder_to: None,
            }),
        )
    }

    /// Call to an existing application.
    pub fn app_call(sender: Address, app_id: u64, on_complete: OnComplete) -> Self {
        Self::new(
            sender,
            TransactionKind::ApplicationCall(ApplicationCall {
                app_id,
                on_complete,
                args: Vec::new(),
                accounts: Vec::new(),
                approval_program: Vec::new(),
                clear_program: Vec::new(),
                global_schema: None,
                local_schema: None,
            }),
        )
    }

    /// Application creation call.
    pub fn app_create(
        sender: Address,
        approval_program: Vec<u8>,
        clear_program: Vec<u8>,
        global_schema: StateSchema,
        local_schema: StateSchema,
    ) -> Self {
        Self::new(
            sender,
            TransactionKind::ApplicationCall(ApplicationCall {
                app_id: 0,
                on_complete: OnComplete::NoOp,
                args: Vec::new(),
                accounts: Vec::new(),
                approval_program,
                clear_program,
                global_schema: Some(global_schema),
                local_schema: Some(local_schema),
            }),
        )
    }

    fn new(sender: Address, kind: TransactionKind) -> Self {
        Self {
            sender,
            kind,
            note: Vec::new(),
            flat_fee: None,
        }
    }

    pub fn note(mut self, note: impl AsRef<[u8]>) -> Self {
        self.note = note.as_ref().to_vec();
        self
    }

    /// Append an application argument. Ignored on payments.
    pub fn arg(mut self, arg: impl Into<Vec<u8>>) -> Self {
        if let TransactionKind::ApplicationCall(call) = &mut self.kind {
            call.args.push(arg.into());
        }
        self
    }

    /// Append an account the application may read. Ignored on payments.
    pub fn account(mut self, account: Address) -> Self {
        if let TransactionKind::ApplicationCall(call) = &mut self.kind {
            call.accounts.push(account);
        }
        self
    }

    /// Skip fee estimation and pay exactly `fee`.
    pub fn flat_fee(mut self, fee: u64) -> Self {
        self.flat_fee = Some(fee);
        self
    }

    /// Consume the builder and produce an unsigned [`Transaction`].
    pub fn build(self, params: &SuggestedParams) -> Transaction {
        let mut tx = Transaction {
            sender: self.sender,
            fee: 0,
            first_valid: params.first_valid(),
            last_valid: params.last_valid(),
            genesis_id: params.genesis_id.clone(),
            genesis_hash: params.genesis_hash,
            note: self.note,
            group: None,
            rekey_to: None,
            kind: self.kind,
        };

        tx.fee = match self.flat_fee {
            Some(fee) => fee,
            None => params
                .fee_per_byte
                .saturating_mul(tx.estimated_size())
                .max(params.min_fee),
        };
        tx
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SuggestedParams {
        SuggestedParams {
            fee_per_byte: 0,
            min_fee: 1_000,
            last_round: 1_000,
            genesis_id: "testnet-v1.0".into(),
            genesis_hash: [9; 32],
        }
    }

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 32])
    }

    fn sample_payment() -> Transaction {
        TransactionBuilder::payment(addr(1), addr(2), 3_000_000)
            .note("CampusTrust: repay loan")
            .build(&params())
    }

    #[test]
    fn builder_produces_deterministic_id() {
        let tx1 = sample_payment();
        let tx2 = sample_payment();
        assert_eq!(tx1.id(), tx2.id());
        assert_eq!(tx1.id().len(), 52);
    }

    #[test]
    fn different_amount_different_id() {
        let a = TransactionBuilder::payment(addr(1), addr(2), 1).build(&params());
        let b = TransactionBuilder::payment(addr(1), addr(2), 2).build(&params());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn fee_floors_at_min_fee() {
        assert_eq!(sample_payment().fee, 1_000);
    }

    #[test]
    fn fee_scales_with_size_under_congestion() {
        let mut p = params();
        p.fee_per_byte = 10;
        let tx = TransactionBuilder::payment(addr(1), addr(2), 1).build(&p);
        // Fee was computed with fee = 0 in the encoding, so re-derive that way.
        let mut unfee = tx.clone();
        unfee.fee = 0;
        assert_eq!(tx.fee, 10 * unfee.estimated_size());
        assert!(tx.fee > 1_000);
    }

    #[test]
    fn flat_fee_overrides_estimate() {
        let tx = TransactionBuilder::payment(addr(1), addr(2), 1)
            .flat_fee(2_000)
            .build(&params());
        assert_eq!(tx.fee, 2_000);
    }

    #[test]
    fn validity_window_from_params() {
        let tx = sample_payment();
        assert_eq!(tx.first_valid, 1_000);
        assert_eq!(tx.last_valid, 2_000);
    }

    #[test]
    fn payment_encoding_field_order() {
        let tx = TransactionBuilder::payment(addr(1), addr(2), 5).build(&params());
        let bytes = tx.canonical_bytes();
        // amt fee fv gen gh lv rcv snd type
        assert_eq!(bytes[0], 0x89);
        assert_eq!(&bytes[1..5], b"\xa3amt");
        let type_pos = bytes.windows(5).position(|w| w == b"\xa4type").unwrap();
        assert_eq!(&bytes[type_pos + 5..], b"\xa3pay");
    }

    #[test]
    fn app_call_args_and_accounts_are_encoded() {
        let tx = TransactionBuilder::app_call(addr(1), 42, OnComplete::NoOp)
            .arg("borrow")
            .arg(3_000_000u64.to_be_bytes().to_vec())
            .account(addr(7))
            .build(&params());
        let call = tx.as_application_call().unwrap();
        assert_eq!(call.args.len(), 2);
        assert_eq!(call.accounts, vec![addr(7)]);

        let bytes = tx.canonical_bytes();
        assert!(bytes.windows(4).any(|w| w == b"apaa"));
        assert!(bytes.windows(4).any(|w| w == b"apat"));
        // NoOp is zero and therefore omitted.
        assert!(!bytes.windows(4).any(|w| w == b"apan"));
    }

    #[test]
    fn opt_in_encodes_on_completion() {
        let tx = TransactionBuilder::app_call(addr(1), 42, OnComplete::OptIn).build(&params());
        let bytes = tx.canonical_bytes();
        let pos = bytes.windows(5).position(|w| w == b"\xa4apan").unwrap();
        assert_eq!(bytes[pos + 5], 0x01);
    }

    #[test]
    fn create_carries_programs_and_schemas() {
        let tx = TransactionBuilder::app_create(
            addr(1),
            vec![6, 1],
            vec![6, 2],
            StateSchema::uints(1),
            StateSchema::uints(3),
        )
        .build(&params());
        let call = tx.as_application_call().unwrap();
        assert!(call.is_create());
        let bytes = tx.canonical_bytes();
        for key in [&b"apap"[..], b"apsu", b"apgs", b"apls"] {
            assert!(bytes.windows(4).any(|w| w == key));
        }
        assert!(!bytes.windows(4).any(|w| w == b"apid"));
    }

    #[test]
    fn args_ignored_on_payment() {
        let tx = TransactionBuilder::payment(addr(1), addr(2), 5)
            .arg("borrow")
            .account(addr(3))
            .build(&params());
        assert!(tx.as_payment().is_some());
        assert!(tx.as_application_call().is_none());
    }

    #[test]
    fn group_field_changes_id() {
        let mut tx = sample_payment();
        let before = tx.id();
        tx.group = Some([4; 32]);
        assert_ne!(tx.id(), before);
    }

    #[test]
    fn bytes_to_sign_are_domain_prefixed() {
        let tx = sample_payment();
        let signable = tx.bytes_to_sign();
        assert_eq!(&signable[..2], b"TX");
        assert_eq!(&signable[2..], &tx.canonical_bytes()[..]);
    }
}
