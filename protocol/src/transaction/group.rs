//! Atomic groups.
//!
//! A group id is `SHA-512/256("TG" || {txlist: [id_0, id_1, ...]})` over
//! the raw ids of the members *without* their group field. Every member
//! then carries that id, which changes each member's own id; the ledger
//! commits all members or none.

use super::builder::Transaction;
use super::encoding::{MapBuilder, Value};
use crate::config::GROUP_DOMAIN;
use crate::crypto::domain_hash;
use crate::error::{LedgerError, Result};

/// Largest group the ledger accepts.
pub const MAX_GROUP_SIZE: usize = 16;

/// Group id for `txs`, ignoring any group field they already carry.
pub fn compute_group_id(txs: &[Transaction]) -> Result<[u8; 32]> {
    if txs.is_empty() || txs.len() > MAX_GROUP_SIZE {
        return Err(LedgerError::Construction(format!(
            "group size must be between 1 and {}, got {}",
            MAX_GROUP_SIZE,
            txs.len()
        )));
    }

    let ids = txs
        .iter()
        .map(|tx| {
            let mut bare = tx.clone();
            bare.group = None;
            Value::Bin(bare.raw_id().to_vec())
        })
        .collect();
    let txlist = MapBuilder::new().array("txlist", ids).finish();
    Ok(domain_hash(GROUP_DOMAIN, &txlist.encode()))
}

/// Compute the group id and stamp it on every member. Returns the id.
pub fn assign_group_id(txs: &mut [Transaction]) -> Result<[u8; 32]> {
    let gid = compute_group_id(txs)?;
    for tx in txs.iter_mut() {
        tx.group = Some(gid);
    }
    Ok(gid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Address;
    use crate::transaction::{SuggestedParams, TransactionBuilder};

    fn params() -> SuggestedParams {
        SuggestedParams {
            fee_per_byte: 0,
            min_fee: 1_000,
            last_round: 10,
            genesis_id: "sandnet-v1".into(),
            genesis_hash: [3; 32],
        }
    }

    fn pay(amount: u64) -> Transaction {
        TransactionBuilder::payment(
            Address::from_bytes([1; 32]),
            Address::from_bytes([2; 32]),
            amount,
        )
        .build(&params())
    }

    #[test]
    fn every_member_gets_the_same_id() {
        let mut txs = vec![pay(1), pay(2)];
        let gid = assign_group_id(&mut txs).unwrap();
        assert!(txs.iter().all(|tx| tx.group == Some(gid)));
    }

    #[test]
    fn order_matters() {
        let a = compute_group_id(&[pay(1), pay(2)]).unwrap();
        let b = compute_group_id(&[pay(2), pay(1)]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn reassigning_is_stable() {
        let mut txs = vec![pay(1), pay(2)];
        let first = assign_group_id(&mut txs).unwrap();
        let second = assign_group_id(&mut txs).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn size_bounds() {
        assert!(compute_group_id(&[]).is_err());
        let too_many: Vec<_> = (0..17).map(pay).collect();
        assert!(compute_group_id(&too_many).is_err());
    }

    #[test]
    fn txlist_preimage_layout() {
        let txs = [pay(1)];
        let mut preimage = b"TG".to_vec();
        preimage.push(0x81);
        preimage.extend_from_slice(b"\xa6txlist");
        preimage.push(0x91);
        preimage.extend_from_slice(&[0xc4, 32]);
        preimage.extend_from_slice(&txs[0].raw_id());
        assert_eq!(
            compute_group_id(&txs).unwrap(),
            crate::crypto::sha512_256(&preimage)
        );
    }
}
