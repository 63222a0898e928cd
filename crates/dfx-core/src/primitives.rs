// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DFX - CHAIN PRIMITIVES
//
// Hashes, outpoints, UTXO transactions and blocks.
// Ids are SHA3-256 over a fixed field-by-field encoding so every node derives
// the same txid / block hash from the same content.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::amount::Amount;
use crate::ops::CustomTx;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::str::FromStr;

pub type DctId = u32;

/// Native coin, always present.
pub const NATIVE_TOKEN_ID: DctId = 0;
pub const NATIVE_SYMBOL: &str = "DFI";
/// First id handed out to user-created tokens (ids below are reserved).
pub const DCT_ID_START: DctId = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Null sentinel ("000...0"), used for "not destroyed".
    pub const NULL: Hash256 = Hash256([0u8; 32]);

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn from_hasher(hasher: Sha3_256) -> Self {
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Hash256(out)
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Hash256 {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| format!("Invalid hash hex: {}", e))?;
        if bytes.len() != 32 {
            return Err(format!("Invalid hash length: {} bytes", bytes.len()));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Hash256(out))
    }
}

pub type TxId = Hash256;
pub type BlockHash = Hash256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: TxId,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: TxId, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub address: String,
    pub value: Amount,
}

impl TxOut {
    pub fn new(address: impl Into<String>, value: Amount) -> Self {
        Self {
            address: address.into(),
            value,
        }
    }
}

/// UTXO transaction, optionally carrying one ledger operation.
///
/// Authorization of the operation is "owns an input": the set of addresses
/// owning the spent coins is the set of addresses the transaction may act for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<OutPoint>,
    pub outputs: Vec<TxOut>,
    pub op: Option<CustomTx>,
    /// Set only on the block reward transaction (first in a block).
    pub coinbase_height: Option<u64>,
}

impl Transaction {
    pub fn coinbase(height: u64, address: &str, reward: Amount) -> Self {
        Self {
            inputs: Vec::new(),
            outputs: vec![TxOut::new(address, reward)],
            op: None,
            coinbase_height: Some(height),
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.coinbase_height.is_some()
    }

    pub fn total_out(&self) -> Option<Amount> {
        self.outputs
            .iter()
            .try_fold(0u128, |acc, o| acc.checked_add(o.value))
    }

    pub fn txid(&self) -> TxId {
        let mut hasher = Sha3_256::new();

        match self.coinbase_height {
            Some(height) => {
                hasher.update([1u8]);
                hasher.update(height.to_le_bytes());
            }
            None => hasher.update([0u8]),
        }

        hasher.update((self.inputs.len() as u64).to_le_bytes());
        for input in &self.inputs {
            hasher.update(input.txid.0);
            hasher.update(input.vout.to_le_bytes());
        }

        hasher.update((self.outputs.len() as u64).to_le_bytes());
        for output in &self.outputs {
            hash_str(&mut hasher, &output.address);
            hasher.update(output.value.to_le_bytes());
        }

        match &self.op {
            Some(op) => {
                hasher.update([1u8]);
                op.hash_into(&mut hasher);
            }
            None => hasher.update([0u8]),
        }

        Hash256::from_hasher(hasher)
    }
}

/// Length-prefixed so adjacent strings cannot alias.
pub(crate) fn hash_str(hasher: &mut Sha3_256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub prev_hash: BlockHash,
    pub time: u64,
    pub txs: Vec<Transaction>,
}

impl Block {
    /// Deterministic genesis shared by every node.
    pub fn genesis() -> Self {
        Self {
            height: 0,
            prev_hash: Hash256::NULL,
            time: 0,
            txs: Vec::new(),
        }
    }

    pub fn hash(&self) -> BlockHash {
        let mut hasher = Sha3_256::new();
        hasher.update(self.height.to_le_bytes());
        hasher.update(self.prev_hash.0);
        hasher.update(self.time.to_le_bytes());
        hasher.update((self.txs.len() as u64).to_le_bytes());
        for tx in &self.txs {
            hasher.update(tx.txid().0);
        }
        Hash256::from_hasher(hasher)
    }
}
