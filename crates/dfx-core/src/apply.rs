//! Custom operation handlers.
//!
//! Each handler validates fully before it mutates where it can; anything that
//! fails midway is rolled back by `LedgerState::apply_transaction`.

use crate::amount::{format_amount, Amount, COIN};
use crate::collateral::ApplyMode;
use crate::error::LedgerError;
use crate::liquidity::{quote_add, quote_remove, quote_swap};
use crate::ops::{CustomTx, TokenAmounts, TokenBalances, TokenRef};
use crate::pool::{normalize_pair, PoolPair};
use crate::primitives::{DctId, OutPoint};
use crate::state::{LedgerState, TxContext};
use crate::tokens::{NewToken, Token};
use crate::undo::Journal;
use std::collections::BTreeMap;

fn out_of_range() -> LedgerError {
    LedgerError::AmountOutOfRange("Amount out of range".to_string())
}

fn no_such_pool() -> LedgerError {
    LedgerError::NotFound("there is no such pool pair".to_string())
}

impl LedgerState {
    pub(crate) fn apply_op(
        &mut self,
        op: &CustomTx,
        ctx: &TxContext,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        match op {
            CustomTx::CreateToken {
                symbol,
                name,
                collateral_address,
            } => self.create_token(symbol, name, collateral_address, ctx, journal),
            CustomTx::DestroyToken { token } => self.destroy_token(token, ctx, journal),
            CustomTx::MintTokens { amounts } => self.mint_tokens(amounts, ctx, journal),
            CustomTx::AccountToAccount { from, to } => {
                self.account_to_account(from, to, ctx, journal)
            }
            CustomTx::CreatePoolPair {
                token_a,
                token_b,
                commission,
                owner_fee_address,
                status,
                pair_symbol,
            } => self.create_pool_pair(
                token_a,
                token_b,
                *commission,
                owner_fee_address,
                *status,
                pair_symbol.as_deref(),
                ctx,
                journal,
            ),
            CustomTx::AddPoolLiquidity {
                from,
                share_address,
            } => self.add_pool_liquidity(from, share_address, ctx, journal),
            CustomTx::RemovePoolLiquidity { from, pool, amount } => {
                self.remove_pool_liquidity(from, pool, *amount, ctx, journal)
            }
            CustomTx::PoolSwap {
                from,
                token_from,
                amount_from,
                to,
                token_to,
            } => self.pool_swap(from, token_from, *amount_from, to, token_to, ctx, journal),
        }
    }

    fn create_token(
        &mut self,
        symbol: &str,
        name: &str,
        collateral_address: &str,
        ctx: &TxContext,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        if collateral_address.is_empty() {
            return Err(LedgerError::InvalidToken(
                "collateral address must not be empty".to_string(),
            ));
        }
        let collateral = ctx.tx.outputs.first();
        let funded = collateral.is_some_and(|out| {
            out.address == collateral_address && out.value >= ctx.params.token_collateral
        });
        if !funded {
            return Err(LedgerError::InsufficientFunds(format!(
                "token creation must pay {} DFI collateral to {} in output 0",
                format_amount(ctx.params.token_collateral),
                collateral_address
            )));
        }

        let id = self.tokens.create(
            NewToken {
                symbol: symbol.to_string(),
                name: name.to_string(),
                collateral_address: Some(collateral_address.to_string()),
                is_lps: false,
            },
            ctx.txid,
            ctx.height,
            journal,
        )?;
        self.locks
            .lock(OutPoint::new(ctx.txid, 0), id, ctx.mode, journal)?;

        if ctx.mode == ApplyMode::Block {
            log::info!(
                "token {} ({}) created at height {} by tx {}",
                symbol,
                id,
                ctx.height,
                ctx.txid
            );
        }
        Ok(())
    }

    fn token_id(&self, token: &TokenRef) -> Result<DctId, LedgerError> {
        self.tokens
            .get_by_ref(token)
            .map(|t| t.id)
            .ok_or_else(|| LedgerError::NotFound(format!("token {} does not exist", token)))
    }

    fn resolve_amounts(&self, amounts: &TokenAmounts) -> Result<TokenBalances, LedgerError> {
        amounts
            .iter()
            .map(|(token, amount)| Ok((self.token_id(token)?, *amount)))
            .collect()
    }

    fn resolve_accounts(
        &self,
        accounts: &BTreeMap<String, TokenAmounts>,
    ) -> Result<BTreeMap<String, TokenBalances>, LedgerError> {
        accounts
            .iter()
            .map(|(address, amounts)| Ok((address.clone(), self.resolve_amounts(amounts)?)))
            .collect()
    }

    fn destroy_token(
        &mut self,
        token: &TokenRef,
        ctx: &TxContext,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        let id = self.token_id(token)?;
        let token = self
            .tokens
            .get(id)
            .ok_or_else(|| LedgerError::NotFound(format!("token {} does not exist", id)))?;
        if token.is_stable() || token.is_lps {
            return Err(LedgerError::InvalidToken(format!(
                "token {} cannot be destroyed",
                token.symbol
            )));
        }
        if token.is_destroyed() {
            return Err(token.already_destroyed());
        }
        let owner = token.collateral_address.clone().ok_or_else(|| {
            LedgerError::InvalidToken(format!("token {} has no owner", token.symbol))
        })?;
        if !ctx.auth.contains(&owner) {
            return Err(LedgerError::AuthorizationFailed(
                "tx must have at least one input from token's owner. Are you an owner?"
                    .to_string(),
            ));
        }
        if let Some(pool) = self.pools.using_token(id) {
            return Err(LedgerError::InvalidToken(format!(
                "token {} is traded by pool pair {}",
                token.symbol, pool.symbol
            )));
        }
        let collateral = token.collateral_outpoint();
        let symbol = token.symbol.clone();

        self.tokens.destroy(id, ctx.txid, ctx.height, journal)?;
        // The collateral stays locked until the destruction is confirmed.
        if ctx.mode == ApplyMode::Block {
            if let Some(outpoint) = collateral {
                self.locks.release(&outpoint, id, journal)?;
            }
            log::info!(
                "token {} ({}) destroyed at height {} by tx {}",
                symbol,
                id,
                ctx.height,
                ctx.txid
            );
        }
        Ok(())
    }

    fn mint_tokens(
        &mut self,
        amounts: &TokenAmounts,
        ctx: &TxContext,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        if amounts.is_empty() {
            return Err(out_of_range());
        }
        for (reference, amount) in amounts {
            let id = self.token_id(reference)?;
            let token = self.mintable(id)?;
            if *amount == 0 {
                return Err(out_of_range());
            }
            let owner = token.collateral_address.clone().ok_or_else(|| {
                LedgerError::InvalidToken(format!("token {} has no owner", token.symbol))
            })?;
            if !ctx.auth.contains(&owner) {
                return Err(LedgerError::AuthorizationFailed(format!(
                    "tx must have at least one input from token {} owner. Are you an owner?",
                    token.symbol
                )));
            }
            self.tokens.add_minted(id, *amount, journal)?;
            self.balances.credit(&owner, id, *amount, journal)?;
        }
        Ok(())
    }

    fn mintable(&self, id: DctId) -> Result<&Token, LedgerError> {
        let token = self
            .tokens
            .get(id)
            .ok_or_else(|| LedgerError::NotFound(format!("token {} does not exist", id)))?;
        if !token.is_mintable() {
            return Err(LedgerError::InvalidToken(format!(
                "token {} is not mintable",
                token.symbol
            )));
        }
        if token.is_destroyed() {
            return Err(token.already_destroyed());
        }
        Ok(token)
    }

    fn account_to_account(
        &mut self,
        from: &str,
        to: &BTreeMap<String, TokenAmounts>,
        ctx: &TxContext,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        ctx.require_auth(from)?;
        if to.is_empty() || to.values().any(|b| b.is_empty()) {
            return Err(out_of_range());
        }
        let to = self.resolve_accounts(to)?;
        if to.values().flat_map(|b| b.values()).any(|amount| *amount == 0) {
            return Err(out_of_range());
        }
        self.balances.transfer(from, &to, journal)
    }

    #[allow(clippy::too_many_arguments)]
    fn create_pool_pair(
        &mut self,
        token_a: &TokenRef,
        token_b: &TokenRef,
        commission: Amount,
        owner_fee_address: &str,
        status: bool,
        pair_symbol: Option<&str>,
        ctx: &TxContext,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        let (token_a, symbol_a) = self.tradable(token_a).map(|t| (t.id, t.symbol.clone()))?;
        let (token_b, symbol_b) = self.tradable(token_b).map(|t| (t.id, t.symbol.clone()))?;
        if token_a == token_b {
            return Err(LedgerError::InvalidToken(
                "pool pair tokens must differ".to_string(),
            ));
        }
        if commission >= COIN {
            return Err(LedgerError::AmountOutOfRange(
                "commission must be in [0, 1)".to_string(),
            ));
        }
        if owner_fee_address.is_empty() {
            return Err(LedgerError::InvalidToken(
                "owner fee address must not be empty".to_string(),
            ));
        }
        let (a, b, reversed) = normalize_pair(token_a, token_b);
        if self.pools.get_by_pair(a, b).is_some() {
            return Err(LedgerError::DuplicatePair {
                token_a: a,
                token_b: b,
            });
        }

        let symbol = match pair_symbol {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => format!("{}-{}", symbol_a, symbol_b),
        };
        let id = self.tokens.create(
            NewToken {
                symbol: symbol.clone(),
                name: format!("{}-{} liquidity token", symbol_a, symbol_b),
                collateral_address: None,
                is_lps: true,
            },
            ctx.txid,
            ctx.height,
            journal,
        )?;
        self.pools.insert(
            PoolPair {
                id,
                token_a: a,
                token_b: b,
                reversed,
                reserve_a: 0,
                reserve_b: 0,
                total_liquidity: 0,
                commission,
                owner_fee_address: owner_fee_address.to_string(),
                status,
                symbol: symbol.clone(),
                creation_tx: ctx.txid,
                creation_height: ctx.height,
            },
            journal,
        )?;

        if ctx.mode == ApplyMode::Block {
            log::info!("pool pair {} ({}) created at height {}", symbol, id, ctx.height);
        }
        Ok(())
    }

    fn tradable(&self, token: &TokenRef) -> Result<&Token, LedgerError> {
        let token = self
            .tokens
            .get_by_ref(token)
            .ok_or_else(|| LedgerError::InvalidToken(format!("token {} does not exist", token)))?;
        if token.is_destroyed() {
            return Err(LedgerError::InvalidToken(format!(
                "token {} is destroyed",
                token.symbol
            )));
        }
        if !token.is_tradeable() {
            return Err(LedgerError::InvalidToken(format!(
                "token {} is a pool share token",
                token.symbol
            )));
        }
        Ok(token)
    }

    fn add_pool_liquidity(
        &mut self,
        from: &BTreeMap<String, TokenAmounts>,
        share_address: &str,
        ctx: &TxContext,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        let from = &self.resolve_accounts(from)?;
        let mut offered: TokenBalances = BTreeMap::new();
        for balances in from.values() {
            for (id, amount) in balances {
                let sum = offered.entry(*id).or_insert(0);
                *sum = sum.checked_add(*amount).ok_or_else(out_of_range)?;
            }
        }
        if offered.len() != 2 {
            return Err(LedgerError::RequiresTwoTokens);
        }
        let ids: Vec<DctId> = offered.keys().copied().collect();
        let mut pool = self
            .pools
            .get_by_pair(ids[0], ids[1])
            .cloned()
            .ok_or_else(no_such_pool)?;
        if share_address.is_empty() {
            return Err(LedgerError::InvalidToken(
                "share address must not be empty".to_string(),
            ));
        }

        for (address, balances) in from {
            ctx.require_auth(address)?;
            for (id, amount) in balances {
                let have = self.balances.get(address, *id);
                if have < *amount {
                    return Err(LedgerError::AmountOutOfRange(format!(
                        "Amount {} is less than {}",
                        format_amount(have),
                        format_amount(*amount)
                    )));
                }
            }
        }

        let x = offered.get(&pool.token_a).copied().unwrap_or(0);
        let y = offered.get(&pool.token_b).copied().unwrap_or(0);
        let quote = quote_add(&pool, x, y)?;

        self.debit_providers(from, pool.token_a, quote.accept_a, journal)?;
        self.debit_providers(from, pool.token_b, quote.accept_b, journal)?;

        pool.reserve_a = pool.reserve_a.checked_add(quote.accept_a).ok_or_else(out_of_range)?;
        pool.reserve_b = pool.reserve_b.checked_add(quote.accept_b).ok_or_else(out_of_range)?;
        pool.total_liquidity = pool
            .total_liquidity
            .checked_add(quote.shares)
            .ok_or_else(out_of_range)?;
        let pool_id = pool.id;
        self.pools.update(pool, journal)?;
        self.balances
            .credit(share_address, pool_id, quote.shares, journal)
    }

    /// Take `accepted` of `token` from providers in address order.
    fn debit_providers(
        &mut self,
        from: &BTreeMap<String, TokenBalances>,
        token: DctId,
        accepted: Amount,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        let mut remaining = accepted;
        for (address, balances) in from {
            if remaining == 0 {
                break;
            }
            let offer = balances.get(&token).copied().unwrap_or(0);
            let take = offer.min(remaining);
            self.balances.debit(address, token, take, journal)?;
            remaining -= take;
        }
        Ok(())
    }

    fn remove_pool_liquidity(
        &mut self,
        from: &str,
        pool: &TokenRef,
        amount: Amount,
        ctx: &TxContext,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        let pool_id = self.tokens.get_by_ref(pool).map(|t| t.id).ok_or_else(no_such_pool)?;
        let mut pool = self.pools.get(pool_id).cloned().ok_or_else(no_such_pool)?;
        if amount == 0 {
            return Err(out_of_range());
        }
        ctx.require_auth(from)?;
        let shares = self.balances.get(from, pool_id);
        if shares == 0 {
            return Err(LedgerError::AuthorizationFailed(format!(
                "{} holds no {} shares. Are you an owner?",
                from, pool.symbol
            )));
        }
        self.balances.debit(from, pool_id, amount, journal)?;

        let (amount_a, amount_b) = quote_remove(&pool, amount)?;
        pool.reserve_a -= amount_a;
        pool.reserve_b -= amount_b;
        pool.total_liquidity -= amount;
        let (token_a, token_b) = (pool.token_a, pool.token_b);
        self.pools.update(pool, journal)?;

        self.balances.credit(from, token_a, amount_a, journal)?;
        self.balances.credit(from, token_b, amount_b, journal)
    }

    #[allow(clippy::too_many_arguments)]
    fn pool_swap(
        &mut self,
        from: &str,
        token_from: &TokenRef,
        amount_from: Amount,
        to: &str,
        token_to: &TokenRef,
        ctx: &TxContext,
        journal: &mut Journal,
    ) -> Result<(), LedgerError> {
        ctx.require_auth(from)?;
        if token_from == token_to {
            return Err(LedgerError::InvalidToken(
                "cannot swap a token for itself".to_string(),
            ));
        }
        let token_from = self.token_id(token_from)?;
        let token_to = self.token_id(token_to)?;
        let mut pool = self
            .pools
            .get_by_pair(token_from, token_to)
            .cloned()
            .ok_or_else(no_such_pool)?;
        if !pool.status {
            return Err(LedgerError::TradingDisabled(pool.symbol));
        }
        if amount_from == 0 {
            return Err(out_of_range());
        }
        if to.is_empty() {
            return Err(LedgerError::InvalidToken(
                "swap recipient must not be empty".to_string(),
            ));
        }
        let (reserve_in, reserve_out) = pool.reserves_for(token_from).ok_or_else(no_such_pool)?;
        let quote = quote_swap(reserve_in, reserve_out, amount_from, pool.commission)?;

        self.balances.debit(from, token_from, amount_from, journal)?;
        self.balances
            .credit(&pool.owner_fee_address, token_from, quote.fee, journal)?;
        let new_in = reserve_in
            .checked_add(quote.effective_in)
            .ok_or_else(out_of_range)?;
        pool.set_reserves_for(token_from, new_in, reserve_out - quote.amount_out);
        self.pools.update(pool, journal)?;
        self.balances.credit(to, token_to, quote.amount_out, journal)
    }
}
