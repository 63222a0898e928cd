// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DFX - POOL PAIR REGISTRY
//
// One constant-product pool per unordered token pair. Pools are keyed by the
// id of their share token; tokens are stored ordered (token_a < token_b).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::amount::Amount;
use crate::error::{InvariantViolation, LedgerError};
use crate::primitives::{DctId, TxId};
use crate::undo::{restore_slot, Journal, UndoEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolPair {
    /// Id of the pool share token
    pub id: DctId,
    pub token_a: DctId,
    pub token_b: DctId,
    /// Creator listed the pair as (token_b, token_a)
    pub reversed: bool,
    pub reserve_a: Amount,
    pub reserve_b: Amount,
    pub total_liquidity: Amount,
    /// COIN-scaled fraction in [0, 1)
    pub commission: Amount,
    pub owner_fee_address: String,
    /// Trading enabled
    pub status: bool,
    pub symbol: String,
    pub creation_tx: TxId,
    pub creation_height: u64,
}

impl PoolPair {
    pub fn is_funded(&self) -> bool {
        self.total_liquidity > 0
    }

    /// (token, reserve) in the order the creator listed the pair.
    pub fn as_created(&self) -> [(DctId, Amount); 2] {
        let a = (self.token_a, self.reserve_a);
        let b = (self.token_b, self.reserve_b);
        if self.reversed {
            [b, a]
        } else {
            [a, b]
        }
    }

    pub fn has_token(&self, token: DctId) -> bool {
        self.token_a == token || self.token_b == token
    }

    /// (reserve_in, reserve_out) for a swap paying `token_in`.
    pub fn reserves_for(&self, token_in: DctId) -> Option<(Amount, Amount)> {
        if token_in == self.token_a {
            Some((self.reserve_a, self.reserve_b))
        } else if token_in == self.token_b {
            Some((self.reserve_b, self.reserve_a))
        } else {
            None
        }
    }

    pub fn set_reserves_for(&mut self, token_in: DctId, reserve_in: Amount, reserve_out: Amount) {
        if token_in == self.token_a {
            self.reserve_a = reserve_in;
            self.reserve_b = reserve_out;
        } else {
            self.reserve_b = reserve_in;
            self.reserve_a = reserve_out;
        }
    }
}

/// Order a pair ascending; `true` when the caller supplied it reversed.
pub fn normalize_pair(a: DctId, b: DctId) -> (DctId, DctId, bool) {
    if a <= b {
        (a, b, false)
    } else {
        (b, a, true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolRegistry {
    pools: BTreeMap<DctId, PoolPair>,
    by_pair: BTreeMap<(DctId, DctId), DctId>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: DctId) -> Option<&PoolPair> {
        self.pools.get(&id)
    }

    /// Lookup by token pair in either order.
    pub fn get_by_pair(&self, a: DctId, b: DctId) -> Option<&PoolPair> {
        let (a, b, _) = normalize_pair(a, b);
        self.by_pair.get(&(a, b)).and_then(|id| self.pools.get(id))
    }

    /// First pool trading `token`, if any.
    pub fn using_token(&self, token: DctId) -> Option<&PoolPair> {
        self.pools.values().find(|p| p.has_token(token))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DctId, &PoolPair)> {
        self.pools.iter()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn insert(&mut self, pool: PoolPair, journal: &mut Journal) -> Result<(), LedgerError> {
        let pair = (pool.token_a, pool.token_b);
        if self.by_pair.contains_key(&pair) {
            return Err(LedgerError::DuplicatePair {
                token_a: pool.token_a,
                token_b: pool.token_b,
            });
        }
        if self.pools.contains_key(&pool.id) {
            return Err(LedgerError::InvalidToken(format!(
                "pool {} already exists",
                pool.id
            )));
        }

        let id = pool.id;
        let prior = self.by_pair.insert(pair, id);
        journal.record(UndoEntry::PairIndex { pair, prior });
        let prior = self.pools.insert(id, pool);
        journal.record(UndoEntry::Pool { id, prior });
        Ok(())
    }

    /// Replace the stored record of an existing pool.
    pub fn update(&mut self, pool: PoolPair, journal: &mut Journal) -> Result<(), LedgerError> {
        let id = pool.id;
        let slot = self
            .pools
            .get_mut(&id)
            .ok_or_else(|| LedgerError::NotFound("there is no such pool pair".to_string()))?;
        let prior = std::mem::replace(slot, pool);
        journal.record(UndoEntry::Pool {
            id,
            prior: Some(prior),
        });
        Ok(())
    }

    pub(crate) fn restore_pool(
        &mut self,
        id: DctId,
        prior: Option<PoolPair>,
    ) -> Result<(), InvariantViolation> {
        restore_slot(&mut self.pools, id, prior, "pool pair")
    }

    pub(crate) fn restore_pair(
        &mut self,
        pair: (DctId, DctId),
        prior: Option<DctId>,
    ) -> Result<(), InvariantViolation> {
        restore_slot(&mut self.by_pair, pair, prior, "pool pair index")
    }

    pub(crate) fn insert_raw(&mut self, pool: PoolPair) {
        self.pools.insert(pool.id, pool);
    }

    pub(crate) fn insert_pair_raw(&mut self, pair: (DctId, DctId), id: DctId) {
        self.by_pair.insert(pair, id);
    }

    pub(crate) fn pair_index(&self) -> impl Iterator<Item = (&(DctId, DctId), &DctId)> {
        self.by_pair.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::COIN;
    use crate::primitives::Hash256;

    fn pool(id: DctId, a: DctId, b: DctId) -> PoolPair {
        PoolPair {
            id,
            token_a: a,
            token_b: b,
            reversed: false,
            reserve_a: 0,
            reserve_b: 0,
            total_liquidity: 0,
            commission: COIN / 10,
            owner_fee_address: "dfxowner".to_string(),
            status: true,
            symbol: "GS".to_string(),
            creation_tx: Hash256::NULL,
            creation_height: 1,
        }
    }

    #[test]
    fn test_normalize_pair() {
        assert_eq!(normalize_pair(129, 128), (128, 129, true));
        assert_eq!(normalize_pair(128, 129), (128, 129, false));
    }

    #[test]
    fn test_unordered_lookup_and_duplicates() {
        let mut registry = PoolRegistry::new();
        let mut journal = Journal::new();
        registry.insert(pool(130, 128, 129), &mut journal).unwrap();

        assert_eq!(registry.get_by_pair(129, 128).unwrap().id, 130);
        assert_eq!(
            registry.insert(pool(131, 128, 129), &mut journal),
            Err(LedgerError::DuplicatePair {
                token_a: 128,
                token_b: 129
            })
        );
        assert_eq!(registry.using_token(129).unwrap().id, 130);
        assert!(registry.using_token(0).is_none());
    }

    #[test]
    fn test_reserves_orientation() {
        let mut p = pool(130, 128, 129);
        p.reserve_a = 100;
        p.reserve_b = 500;
        assert_eq!(p.reserves_for(129), Some((500, 100)));
        p.set_reserves_for(129, 509, 98);
        assert_eq!((p.reserve_a, p.reserve_b), (98, 509));
        assert_eq!(p.reserves_for(7), None);
    }

    #[test]
    fn test_creation_order_view() {
        let mut p = pool(130, 128, 129);
        p.reserve_a = 100;
        p.reserve_b = 500;
        assert_eq!(p.as_created(), [(128, 100), (129, 500)]);
        p.reversed = true;
        assert_eq!(p.as_created(), [(129, 500), (128, 100)]);
    }
}
