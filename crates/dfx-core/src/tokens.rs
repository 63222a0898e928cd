// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DFX - TOKEN REGISTRY
//
// Authoritative record of token definitions.
// - id 0 is the native coin, user tokens start at DCT_ID_START
// - lookups by id, symbol or creation txid resolve the same record
// - destruction is recorded in place and cleared only by undo
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::amount::{money_range, Amount};
use crate::error::{InvariantViolation, LedgerError};
use crate::ops::TokenRef;
use crate::primitives::{DctId, Hash256, OutPoint, TxId, DCT_ID_START, NATIVE_SYMBOL, NATIVE_TOKEN_ID};
use crate::undo::{restore_slot, Journal, UndoEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Max token symbol length
pub const MAX_SYMBOL_LEN: usize = 8;
/// Max pool pair symbol length ("SYMBOLA-SYMBOLB")
pub const MAX_PAIR_SYMBOL_LEN: usize = 2 * MAX_SYMBOL_LEN + 1;
/// Max token name length
pub const MAX_NAME_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: DctId,
    pub symbol: String,
    pub name: String,
    /// Owner of the creation collateral. None for the native coin and pool shares.
    pub collateral_address: Option<String>,
    pub creation_tx: TxId,
    pub creation_height: i64,
    /// `Hash256::NULL` while active
    pub destruction_tx: TxId,
    /// -1 while active
    pub destruction_height: i64,
    pub minted: Amount,
    /// Liquidity pool share token
    pub is_lps: bool,
}

impl Token {
    pub fn native() -> Self {
        Self {
            id: NATIVE_TOKEN_ID,
            symbol: NATIVE_SYMBOL.to_string(),
            name: "Default DFX token".to_string(),
            collateral_address: None,
            creation_tx: Hash256::NULL,
            creation_height: -1,
            destruction_tx: Hash256::NULL,
            destruction_height: -1,
            minted: 0,
            is_lps: false,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        !self.destruction_tx.is_null()
    }

    pub fn is_stable(&self) -> bool {
        self.id < DCT_ID_START
    }

    /// Supply can grow through minting: user tokens only.
    pub fn is_mintable(&self) -> bool {
        !self.is_stable() && !self.is_lps
    }

    /// Can back a pool pair.
    pub fn is_tradeable(&self) -> bool {
        !self.is_lps
    }

    /// Output 0 of the creation transaction.
    pub fn collateral_outpoint(&self) -> Option<OutPoint> {
        self.collateral_address
            .as_ref()
            .map(|_| OutPoint::new(self.creation_tx, 0))
    }

    pub fn already_destroyed(&self) -> LedgerError {
        LedgerError::AlreadyDestroyed {
            symbol: self.symbol.clone(),
            height: self.destruction_height,
            tx: self.destruction_tx.to_hex(),
        }
    }
}

/// Fields supplied by the creator; the registry fills in the rest.
#[derive(Debug, Clone)]
pub struct NewToken {
    pub symbol: String,
    pub name: String,
    pub collateral_address: Option<String>,
    pub is_lps: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRegistry {
    tokens: BTreeMap<DctId, Token>,
    by_symbol: BTreeMap<String, DctId>,
    by_creation_tx: BTreeMap<TxId, DctId>,
    next_id: DctId,
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenRegistry {
    pub fn new() -> Self {
        let native = Token::native();
        let mut by_symbol = BTreeMap::new();
        by_symbol.insert(native.symbol.clone(), native.id);
        let mut tokens = BTreeMap::new();
        tokens.insert(native.id, native);
        Self {
            tokens,
            by_symbol,
            by_creation_tx: BTreeMap::new(),
            next_id: DCT_ID_START,
        }
    }

    pub fn get(&self, id: DctId) -> Option<&Token> {
        self.tokens.get(&id)
    }

    pub fn get_by_symbol(&self, symbol: &str) -> Option<&Token> {
        self.by_symbol.get(symbol).and_then(|id| self.tokens.get(id))
    }

    pub fn get_by_creation_tx(&self, txid: &TxId) -> Option<&Token> {
        self.by_creation_tx
            .get(txid)
            .and_then(|id| self.tokens.get(id))
    }

    /// The token an operation names. Pool shares are named by the pool's
    /// creation tx.
    pub fn get_by_ref(&self, token: &TokenRef) -> Option<&Token> {
        if token.is_native() {
            self.get(NATIVE_TOKEN_ID)
        } else {
            self.get_by_creation_tx(&token.0)
        }
    }

    /// Resolve a numeric id, a 64-hex creation txid, or a symbol.
    pub fn resolve(&self, key: &str) -> Option<&Token> {
        if let Ok(id) = key.parse::<DctId>() {
            return self.get(id);
        }
        if key.len() == 64 {
            if let Ok(txid) = key.parse::<TxId>() {
                if let Some(token) = self.get_by_creation_tx(&txid) {
                    return Some(token);
                }
            }
        }
        self.get_by_symbol(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DctId, &Token)> {
        self.tokens.iter()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn next_id(&self) -> DctId {
        self.next_id
    }

    pub fn create(
        &mut self,
        token: NewToken,
        creation_tx: TxId,
        height: u64,
        journal: &mut Journal,
    ) -> Result<DctId, LedgerError> {
        if token.is_lps {
            validate_pair_symbol(&token.symbol)?;
        } else {
            validate_symbol(&token.symbol)?;
        }
        if token.name.chars().count() > MAX_NAME_LEN {
            return Err(LedgerError::InvalidToken(format!(
                "token name longer than {} characters",
                MAX_NAME_LEN
            )));
        }
        if self.get_by_symbol(&token.symbol).is_some_and(|t| !t.is_destroyed()) {
            return Err(LedgerError::DuplicateSymbol(token.symbol));
        }
        if self.by_creation_tx.contains_key(&creation_tx) {
            return Err(LedgerError::InvalidToken(format!(
                "token with creation tx {} already exists",
                creation_tx
            )));
        }

        let id = self.next_id;
        let next = id
            .checked_add(1)
            .ok_or_else(|| LedgerError::InvalidToken("token id space exhausted".to_string()))?;
        journal.record(UndoEntry::NextTokenId { prior: id });
        self.next_id = next;

        let record = Token {
            id,
            symbol: token.symbol,
            name: token.name,
            collateral_address: token.collateral_address,
            creation_tx,
            creation_height: height as i64,
            destruction_tx: Hash256::NULL,
            destruction_height: -1,
            minted: 0,
            is_lps: token.is_lps,
        };

        let prior = self.by_symbol.insert(record.symbol.clone(), id);
        journal.record(UndoEntry::TokenSymbol {
            symbol: record.symbol.clone(),
            prior,
        });
        let prior = self.by_creation_tx.insert(creation_tx, id);
        journal.record(UndoEntry::TokenCreationTx {
            txid: creation_tx,
            prior,
        });
        let prior = self.tokens.insert(id, record);
        journal.record(UndoEntry::Token { id, prior });

        log::debug!("token {} allocated by tx {}", id, creation_tx);
        Ok(id)
    }

    /// Mark a user token destroyed. Stable and pool-share tokens cannot be.
    pub fn destroy(
        &mut self,
        id: DctId,
        txid: TxId,
        height: u64,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        let token = self
            .tokens
            .get(&id)
            .ok_or_else(|| LedgerError::NotFound(format!("token {} does not exist", id)))?;
        if token.is_stable() {
            return Err(LedgerError::InvalidToken(format!(
                "cannot destroy stable token {}",
                token.symbol
            )));
        }
        if token.is_lps {
            return Err(LedgerError::InvalidToken(format!(
                "cannot destroy pool share token {}",
                token.symbol
            )));
        }
        if token.is_destroyed() {
            return Err(token.already_destroyed());
        }

        let prior = token.clone();
        let mut updated = prior.clone();
        updated.destruction_tx = txid;
        updated.destruction_height = height as i64;
        self.tokens.insert(id, updated);
        journal.record(UndoEntry::Token {
            id,
            prior: Some(prior),
        });
        Ok(())
    }

    pub fn add_minted(
        &mut self,
        id: DctId,
        amount: Amount,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        let token = self
            .tokens
            .get_mut(&id)
            .ok_or_else(|| LedgerError::NotFound(format!("token {} does not exist", id)))?;
        let minted = token
            .minted
            .checked_add(amount)
            .filter(|m| money_range(*m))
            .ok_or_else(|| LedgerError::AmountOutOfRange("Amount out of range".to_string()))?;
        let prior = token.clone();
        token.minted = minted;
        journal.record(UndoEntry::Token {
            id,
            prior: Some(prior),
        });
        Ok(())
    }

    pub(crate) fn restore_token(
        &mut self,
        id: DctId,
        prior: Option<Token>,
    ) -> Result<(), InvariantViolation> {
        restore_slot(&mut self.tokens, id, prior, "token")
    }

    pub(crate) fn restore_symbol(
        &mut self,
        symbol: String,
        prior: Option<DctId>,
    ) -> Result<(), InvariantViolation> {
        restore_slot(&mut self.by_symbol, symbol, prior, "token symbol")
    }

    pub(crate) fn restore_creation_tx(
        &mut self,
        txid: TxId,
        prior: Option<DctId>,
    ) -> Result<(), InvariantViolation> {
        restore_slot(&mut self.by_creation_tx, txid, prior, "token creation tx")
    }

    pub(crate) fn restore_next_id(&mut self, prior: DctId) -> Result<(), InvariantViolation> {
        if prior.checked_add(1) != Some(self.next_id) {
            return Err(InvariantViolation(format!(
                "token id sequence broken: next id {} while reverting {}",
                self.next_id, prior
            )));
        }
        self.next_id = prior;
        Ok(())
    }

    pub(crate) fn insert_raw(&mut self, token: Token) {
        self.tokens.insert(token.id, token);
    }

    pub(crate) fn insert_symbol_raw(&mut self, symbol: String, id: DctId) {
        self.by_symbol.insert(symbol, id);
    }

    pub(crate) fn insert_creation_tx_raw(&mut self, txid: TxId, id: DctId) {
        self.by_creation_tx.insert(txid, id);
    }

    pub(crate) fn set_next_id_raw(&mut self, id: DctId) {
        self.next_id = id;
    }

    pub(crate) fn symbol_index(&self) -> impl Iterator<Item = (&String, &DctId)> {
        self.by_symbol.iter()
    }

    pub(crate) fn creation_index(&self) -> impl Iterator<Item = (&TxId, &DctId)> {
        self.by_creation_tx.iter()
    }
}

/// 1-8 alphanumerics, starting with a letter.
pub fn validate_symbol(symbol: &str) -> Result<(), LedgerError> {
    let ok = !symbol.is_empty()
        && symbol.len() <= MAX_SYMBOL_LEN
        && symbol.starts_with(|c: char| c.is_ascii_alphabetic())
        && symbol.chars().all(|c| c.is_ascii_alphanumeric());
    if ok {
        Ok(())
    } else {
        Err(LedgerError::InvalidToken(format!(
            "token symbol '{}' must be 1-{} alphanumerics starting with a letter",
            symbol, MAX_SYMBOL_LEN
        )))
    }
}

/// Pool pair symbols may also contain '-'.
pub fn validate_pair_symbol(symbol: &str) -> Result<(), LedgerError> {
    let ok = !symbol.is_empty()
        && symbol.len() <= MAX_PAIR_SYMBOL_LEN
        && symbol.starts_with(|c: char| c.is_ascii_alphabetic())
        && symbol.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(LedgerError::InvalidToken(format!(
            "pool pair symbol '{}' is invalid",
            symbol
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gold() -> NewToken {
        NewToken {
            symbol: "GOLD".to_string(),
            name: "shiny gold".to_string(),
            collateral_address: Some("dfxowner".to_string()),
            is_lps: false,
        }
    }

    #[test]
    fn test_native_token_present() {
        let registry = TokenRegistry::new();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve("0").unwrap().symbol, "DFI");
        assert_eq!(registry.resolve("DFI").unwrap().id, 0);
        let native = registry.get(0).unwrap();
        assert!(!native.is_mintable());
        assert!(native.is_tradeable());
    }

    #[test]
    fn test_create_and_resolve() {
        let mut registry = TokenRegistry::new();
        let mut journal = Journal::new();
        let tx = Hash256([3u8; 32]);
        let id = registry.create(gold(), tx, 101, &mut journal).unwrap();
        assert_eq!(id, 128);

        let by_id = registry.resolve("128").unwrap();
        assert_eq!(registry.resolve("GOLD").unwrap(), by_id);
        assert_eq!(registry.resolve(&tx.to_hex()).unwrap(), by_id);
        assert_eq!(by_id.destruction_height, -1);
        assert!(by_id.destruction_tx.is_null());
        assert_eq!(by_id.collateral_outpoint(), Some(OutPoint::new(tx, 0)));
        assert_eq!(registry.get_by_ref(&TokenRef(tx)).unwrap(), by_id);
        assert_eq!(registry.get_by_ref(&TokenRef::NATIVE).unwrap().id, 0);
        assert!(registry.get_by_ref(&TokenRef(Hash256([9u8; 32]))).is_none());
        assert!(by_id.is_mintable() && by_id.is_tradeable());

        let mut share = gold();
        share.symbol = "GOLD-DFI".to_string();
        share.collateral_address = None;
        share.is_lps = true;
        let lps = registry.create(share, Hash256([7u8; 32]), 102, &mut journal).unwrap();
        let lps = registry.get(lps).unwrap();
        assert!(!lps.is_mintable() && !lps.is_tradeable());
    }

    #[test]
    fn test_duplicate_symbol() {
        let mut registry = TokenRegistry::new();
        let mut journal = Journal::new();
        registry
            .create(gold(), Hash256([1u8; 32]), 1, &mut journal)
            .unwrap();
        assert_eq!(
            registry.create(gold(), Hash256([2u8; 32]), 1, &mut journal),
            Err(LedgerError::DuplicateSymbol("GOLD".to_string()))
        );
        let mut dfi = gold();
        dfi.symbol = "DFI".to_string();
        assert!(matches!(
            registry.create(dfi, Hash256([4u8; 32]), 1, &mut journal),
            Err(LedgerError::DuplicateSymbol(_))
        ));
    }

    #[test]
    fn test_symbol_reusable_after_destroy() {
        let mut registry = TokenRegistry::new();
        let mut journal = Journal::new();
        let first = registry
            .create(gold(), Hash256([1u8; 32]), 1, &mut journal)
            .unwrap();
        registry
            .destroy(first, Hash256([5u8; 32]), 2, &mut journal)
            .unwrap();
        let second = registry
            .create(gold(), Hash256([2u8; 32]), 3, &mut journal)
            .unwrap();
        assert_eq!(registry.get_by_symbol("GOLD").unwrap().id, second);
    }

    #[test]
    fn test_destroy_rules() {
        let mut registry = TokenRegistry::new();
        let mut journal = Journal::new();
        let id = registry
            .create(gold(), Hash256([1u8; 32]), 1, &mut journal)
            .unwrap();

        assert!(matches!(
            registry.destroy(0, Hash256([5u8; 32]), 2, &mut journal),
            Err(LedgerError::InvalidToken(_))
        ));
        registry
            .destroy(id, Hash256([5u8; 32]), 2, &mut journal)
            .unwrap();
        let err = registry
            .destroy(id, Hash256([6u8; 32]), 3, &mut journal)
            .unwrap_err();
        assert!(err.to_string().contains("already destroyed"));
        assert_eq!(registry.get(id).unwrap().destruction_height, 2);
    }

    #[test]
    fn test_symbol_validation() {
        assert!(validate_symbol("GOLD").is_ok());
        assert!(validate_symbol("").is_err());
        assert!(validate_symbol("1GOLD").is_err());
        assert!(validate_symbol("TOOLONGSYM").is_err());
        assert!(validate_symbol("GO-LD").is_err());
        assert!(validate_pair_symbol("GOLD-SILVER").is_ok());
    }

    #[test]
    fn test_next_id_restore_checks_sequence() {
        let mut registry = TokenRegistry::new();
        assert!(registry.restore_next_id(200).is_err());
        assert!(registry.restore_next_id(127).is_ok());
        assert_eq!(registry.next_id(), 127);
    }
}
