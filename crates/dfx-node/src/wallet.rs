//! Owned addresses and coin selection.
//!
//! There are no keys: a node "owns" an address when it is in its wallet, and
//! a transaction is authorized by an address when it spends one of that
//! address's coins.

use dfx_core::coins::Coin;
use dfx_core::{
    format_amount, Amount, ChainParams, CustomTx, LedgerError, LedgerState, OutPoint, Transaction,
    TxOut,
};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    node_id: String,
    next_index: u64,
    default_address: String,
    addresses: BTreeSet<String>,
}

/// "dfx" + first 20 bytes of SHA3-256(node id, index), hex encoded.
fn derive_address(node_id: &str, index: u64) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(b"dfx-wallet");
    hasher.update((node_id.len() as u64).to_le_bytes());
    hasher.update(node_id.as_bytes());
    hasher.update(index.to_le_bytes());
    format!("dfx{}", hex::encode(&hasher.finalize()[..20]))
}

impl Wallet {
    pub fn new(node_id: &str) -> Self {
        let default_address = derive_address(node_id, 0);
        Self {
            node_id: node_id.to_string(),
            next_index: 1,
            addresses: BTreeSet::from([default_address.clone()]),
            default_address,
        }
    }

    /// Receives block rewards and change of unauthorized transactions
    pub fn default_address(&self) -> &str {
        &self.default_address
    }

    pub fn get_new_address(&mut self) -> String {
        let address = derive_address(&self.node_id, self.next_index);
        self.next_index += 1;
        self.addresses.insert(address.clone());
        address
    }

    /// Returns false when the address was already owned.
    pub fn import_address(&mut self, address: &str) -> bool {
        self.addresses.insert(address.to_string())
    }

    pub fn is_mine(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &String> {
        self.addresses.iter()
    }

    /// Wallet rule is stricter than consensus: a coinbase is offered only
    /// once `tip - height >= maturity`.
    fn is_spendable(
        &self,
        view: &LedgerState,
        outpoint: &OutPoint,
        coin: &Coin,
        tip: u64,
        maturity: u64,
    ) -> bool {
        self.is_mine(&coin.out.address)
            && (!coin.is_coinbase || tip.saturating_sub(coin.height) >= maturity)
            && view.locks.check_spend(outpoint).is_ok()
    }

    /// Owned, mature, unlocked coins of `view` in outpoint order.
    pub fn spendable_coins(
        &self,
        view: &LedgerState,
        tip_height: u64,
        params: &ChainParams,
    ) -> Vec<(OutPoint, TxOut)> {
        view.coins
            .iter()
            .filter(|(op, coin)| {
                self.is_spendable(view, op, coin, tip_height, params.coinbase_maturity)
            })
            .map(|(op, coin)| (*op, coin.out.clone()))
            .collect()
    }

    pub fn balance(&self, view: &LedgerState, tip_height: u64, params: &ChainParams) -> Amount {
        self.spendable_coins(view, tip_height, params)
            .iter()
            .map(|(_, out)| out.value)
            .sum()
    }

    /// Fund `outputs` from the wallet. Each `auth` address contributes one
    /// input; more coins are added until the outputs are covered. Change goes
    /// to the first `auth` address, or the default address.
    pub fn build_transaction(
        &self,
        view: &LedgerState,
        tip_height: u64,
        params: &ChainParams,
        auth: &[String],
        mut outputs: Vec<TxOut>,
        op: Option<CustomTx>,
    ) -> Result<Transaction, LedgerError> {
        let needed = outputs
            .iter()
            .try_fold(0u128, |acc, o| acc.checked_add(o.value))
            .ok_or_else(|| LedgerError::AmountOutOfRange("Amount out of range".to_string()))?;
        let spendable = self.spendable_coins(view, tip_height, params);

        let mut chosen: BTreeSet<OutPoint> = BTreeSet::new();
        let mut inputs = Vec::new();
        let mut total_in: Amount = 0;

        let mut seen = BTreeSet::new();
        for address in auth.iter().filter(|a| seen.insert(a.as_str())) {
            let (outpoint, out) = spendable
                .iter()
                .find(|(op, out)| &out.address == address && !chosen.contains(op))
                .ok_or_else(|| {
                    LedgerError::AuthorizationFailed(format!(
                        "Can't find any UTXO's for owner {}. Are you an owner?",
                        address
                    ))
                })?;
            chosen.insert(*outpoint);
            inputs.push(*outpoint);
            total_in += out.value;
        }

        for (outpoint, out) in &spendable {
            if total_in >= needed && !inputs.is_empty() {
                break;
            }
            if chosen.insert(*outpoint) {
                inputs.push(*outpoint);
                total_in += out.value;
            }
        }

        if total_in < needed || inputs.is_empty() {
            return Err(LedgerError::InsufficientFunds(format!(
                "wallet can spend {}, transaction needs {}",
                format_amount(total_in),
                format_amount(needed)
            )));
        }

        let change = total_in - needed;
        if change > 0 {
            let to = auth
                .first()
                .cloned()
                .unwrap_or_else(|| self.default_address.clone());
            outputs.push(TxOut::new(to, change));
        }

        Ok(Transaction {
            inputs,
            outputs,
            op,
            coinbase_height: None,
        })
    }
}
