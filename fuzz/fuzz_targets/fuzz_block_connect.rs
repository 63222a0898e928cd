//! Fuzz target: connect/disconnect of blocks carrying random ledger ops
//!
//! Starts from a small chain with two funded tokens and a funded pool, then
//! connects one block of fuzzer-chosen operations. Whatever the outcome:
//! - connect never panics
//! - a rejected block leaves the state untouched
//! - an accepted block keeps supply balanced and disconnects to the exact
//!   prior state root
//!
//! Run: cargo +nightly fuzz run fuzz_block_connect

#![no_main]
use arbitrary::Arbitrary;
use dfx_core::{
    Block, ChainParams, CustomTx, Hash256, LedgerState, OutPoint, TokenRef, Transaction, TxOut,
    COIN,
};
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeMap;

const ADDRS: [&str; 3] = ["dfxalice", "dfxbob", "dfxcarol"];

#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Create { symbol: String, owner: u8 },
    Destroy { token: u8 },
    Mint { token: u8, amount: u64 },
    Transfer { from: u8, to: u8, token: u8, amount: u64 },
    CreatePool { a: u8, b: u8, commission: u64 },
    Add { from: u8, a: u64, b: u64 },
    Remove { from: u8, shares: u64 },
    Swap { from: u8, to: u8, forward: bool, amount: u64 },
}

#[derive(Arbitrary, Debug)]
struct FuzzTx {
    /// Index into the payer's coins
    coin: u8,
    payer: u8,
    op: Option<FuzzOp>,
    extra_output: Option<u64>,
}

fn addr(i: u8) -> String {
    ADDRS[i as usize % ADDRS.len()].to_string()
}

/// Every seeded token plus one that was never created.
struct Tokens(Vec<TokenRef>);

impl Tokens {
    fn of(state: &LedgerState) -> Self {
        let mut refs: Vec<TokenRef> = state.tokens.iter().map(|(_, t)| TokenRef::of(t)).collect();
        refs.push(TokenRef(Hash256([0xee; 32])));
        Tokens(refs)
    }

    fn get(&self, i: u8) -> TokenRef {
        self.0[i as usize % self.0.len()]
    }
}

fn token_ref(state: &LedgerState, id: u32) -> TokenRef {
    TokenRef::of(state.tokens.get(id).expect("seeded token"))
}

fn params() -> ChainParams {
    ChainParams {
        coinbase_maturity: 1,
        ..ChainParams::default()
    }
}

fn block(height: u64, txs: Vec<Transaction>) -> Block {
    let mut all = vec![Transaction::coinbase(height, ADDRS[0], 50 * COIN)];
    all.extend(txs);
    Block {
        height,
        prev_hash: Hash256::NULL,
        time: height,
        txs: all,
    }
}

/// Spend the first spendable coin of `payer`, returning change to it.
fn pay(state: &LedgerState, height: u64, payer: &str, collateral: bool, op: CustomTx) -> Transaction {
    let (input, value) = state
        .coins
        .iter()
        .find(|(op, c)| {
            c.out.address == payer
                && c.is_mature(height, 1)
                && state.locks.check_spend(op).is_ok()
        })
        .map(|(op, c)| (*op, c.out.value))
        .expect("seed chain funds every payer");
    let mut outputs = Vec::new();
    let mut change = value;
    if collateral {
        outputs.push(TxOut::new(payer, 10 * COIN));
        change -= 10 * COIN;
    }
    outputs.push(TxOut::new(payer, change));
    Transaction {
        inputs: vec![input],
        outputs,
        op: Some(op),
        coinbase_height: None,
    }
}

fn seed() -> LedgerState {
    let params = params();
    let mut state = LedgerState::new();
    let mut height = 0;
    let mut connect = |state: &mut LedgerState, txs: Vec<Transaction>| {
        height += 1;
        state
            .connect_block(&block(height, txs), &params)
            .expect("seed block connects");
    };
    for _ in 0..3 {
        connect(&mut state, vec![]);
    }
    for symbol in ["GOLD", "SILVER"] {
        let tx = pay(&state, 4, ADDRS[0], true, CustomTx::CreateToken {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            collateral_address: ADDRS[0].to_string(),
        });
        connect(&mut state, vec![tx]);
    }
    let (gold, silver) = (token_ref(&state, 128), token_ref(&state, 129));
    let tx = pay(&state, 6, ADDRS[0], false, CustomTx::MintTokens {
        amounts: BTreeMap::from([(gold, 1_000 * COIN), (silver, 1_000 * COIN)]),
    });
    connect(&mut state, vec![tx]);
    let tx = pay(&state, 7, ADDRS[0], false, CustomTx::CreatePoolPair {
        token_a: gold,
        token_b: silver,
        commission: COIN / 100,
        owner_fee_address: ADDRS[1].to_string(),
        status: true,
        pair_symbol: None,
    });
    connect(&mut state, vec![tx]);
    let tx = pay(&state, 8, ADDRS[0], false, CustomTx::AddPoolLiquidity {
        from: BTreeMap::from([(
            ADDRS[0].to_string(),
            BTreeMap::from([(gold, 100 * COIN), (silver, 400 * COIN)]),
        )]),
        share_address: ADDRS[0].to_string(),
    });
    connect(&mut state, vec![tx]);
    state
}

fn custom(op: FuzzOp, state: &LedgerState, tokens: &Tokens) -> (CustomTx, bool) {
    let token = |i: u8| tokens.get(i);
    let (gold, silver, pool) = (
        token_ref(state, 128),
        token_ref(state, 129),
        token_ref(state, 130),
    );
    match op {
        FuzzOp::Create { symbol, owner } => (
            CustomTx::CreateToken {
                symbol: symbol.chars().take(8).collect(),
                name: symbol,
                collateral_address: addr(owner),
            },
            true,
        ),
        FuzzOp::Destroy { token: t } => (CustomTx::DestroyToken { token: token(t) }, false),
        FuzzOp::Mint { token: t, amount } => (
            CustomTx::MintTokens {
                amounts: BTreeMap::from([(token(t), amount as u128)]),
            },
            false,
        ),
        FuzzOp::Transfer { from, to, token: t, amount } => (
            CustomTx::AccountToAccount {
                from: addr(from),
                to: BTreeMap::from([(addr(to), BTreeMap::from([(token(t), amount as u128)]))]),
            },
            false,
        ),
        FuzzOp::CreatePool { a, b, commission } => (
            CustomTx::CreatePoolPair {
                token_a: token(a),
                token_b: token(b),
                commission: commission as u128,
                owner_fee_address: ADDRS[1].to_string(),
                status: true,
                pair_symbol: None,
            },
            false,
        ),
        FuzzOp::Add { from, a, b } => (
            CustomTx::AddPoolLiquidity {
                from: BTreeMap::from([(
                    addr(from),
                    BTreeMap::from([(gold, a as u128), (silver, b as u128)]),
                )]),
                share_address: addr(from),
            },
            false,
        ),
        FuzzOp::Remove { from, shares } => (
            CustomTx::RemovePoolLiquidity {
                from: addr(from),
                pool,
                amount: shares as u128,
            },
            false,
        ),
        FuzzOp::Swap { from, to, forward, amount } => {
            let (token_from, token_to) = if forward { (gold, silver) } else { (silver, gold) };
            (
                CustomTx::PoolSwap {
                    from: addr(from),
                    token_from,
                    amount_from: amount as u128,
                    to: addr(to),
                    token_to,
                },
                false,
            )
        }
    }
}

fuzz_target!(|txs: Vec<FuzzTx>| {
    let params = params();
    let mut state = seed();
    let tokens = Tokens::of(&state);
    let height = 9;

    let coins: Vec<(OutPoint, String, u128)> = state
        .coins
        .iter()
        .map(|(op, c)| (*op, c.out.address.clone(), c.out.value))
        .collect();

    let mut block_txs = Vec::new();
    for ftx in txs.into_iter().take(8) {
        let payer = addr(ftx.payer);
        let owned: Vec<_> = coins.iter().filter(|(_, a, _)| *a == payer).collect();
        let (input, value) = match owned.get(ftx.coin as usize % owned.len().max(1)) {
            Some((op, _, v)) => (*op, *v),
            None => (OutPoint::new(Hash256::NULL, ftx.coin as u32), COIN),
        };
        let (op, collateral) = match ftx.op {
            Some(op) => {
                let (op, collateral) = custom(op, &state, &tokens);
                (Some(op), collateral)
            }
            None => (None, false),
        };
        let mut outputs = Vec::new();
        if collateral {
            outputs.push(TxOut::new(payer.as_str(), 10 * COIN));
        }
        if let Some(extra) = ftx.extra_output {
            outputs.push(TxOut::new(ADDRS[2], extra as u128));
        }
        let spent: u128 = outputs.iter().map(|o| o.value).sum();
        if spent < value {
            outputs.push(TxOut::new(payer.as_str(), value - spent));
        }
        block_txs.push(Transaction {
            inputs: vec![input],
            outputs,
            op,
            coinbase_height: None,
        });
    }

    let before = state.state_root();
    let b = block(height, block_txs);
    match state.connect_block(&b, &params) {
        Ok(undo) => {
            state.audit_supply().expect("supply balanced after connect");
            state.disconnect_block(&undo).expect("undo applies");
            assert_eq!(state.state_root(), before);
        }
        Err(e) => {
            assert!(!e.is_fatal(), "fatal on connect: {}", e);
            assert_eq!(state.state_root(), before);
        }
    }
});
