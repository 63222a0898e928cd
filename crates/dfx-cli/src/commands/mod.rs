pub mod chain;
pub mod pool;
pub mod token;
pub mod wallet;

use crate::Commands;
use dfx_node::Node;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Route one subcommand to its handler.
pub fn handle(command: Commands, node: &Node) -> CmdResult {
    match command {
        Commands::Generate { blocks } => chain::generate(node, blocks),
        Commands::GetBlockCount => chain::block_count(node),
        Commands::GetBestBlockHash => chain::best_block_hash(node),
        Commands::InvalidateTip => chain::invalidate_tip(node),
        Commands::ExportChain { output } => chain::export_chain(node, &output),
        Commands::AcceptChain { input } => chain::accept_chain(node, &input),
        Commands::GetNewAddress => wallet::get_new_address(node),
        Commands::ImportAddress { address } => wallet::import_address(node, &address),
        Commands::GetBalance => wallet::get_balance(node),
        Commands::SendToAddress { address, amount } => {
            wallet::send_to_address(node, &address, &amount)
        }
        Commands::SendRawTransaction { tx } => wallet::send_raw_transaction(node, &tx),
        Commands::GetRawMempool => wallet::raw_mempool(node),
        Commands::GetMempoolInfo => wallet::mempool_info(node),
        Commands::CreateToken {
            symbol,
            name,
            collateral_address,
        } => token::create_token(node, &symbol, &name, &collateral_address),
        Commands::DestroyToken { token } => token::destroy_token(node, &token),
        Commands::MintTokens { amounts } => token::mint_tokens(node, &amounts),
        Commands::ListTokens { key, brief } => {
            print_json(&node.list_tokens(key.as_deref(), !brief)?)
        }
        Commands::GetToken { key } => print_json(&node.get_token(&key)?),
        Commands::GetAccount { address, page, ids } => {
            print_json(&node.get_account(&address, page.into(), ids)?)
        }
        Commands::AccountToAccount { from, to, auth } => {
            token::account_to_account(node, &auth, &from, &to)
        }
        Commands::CreatePoolPair { metadata } => pool::create_pool_pair(node, &metadata),
        Commands::AddPoolLiquidity {
            from,
            share_address,
        } => pool::add_pool_liquidity(node, &from, &share_address),
        Commands::RemovePoolLiquidity { from, amount } => {
            pool::remove_pool_liquidity(node, &from, &amount)
        }
        Commands::PoolSwap { metadata } => pool::pool_swap(node, &metadata),
        Commands::ListPoolPairs { page, verbose } => {
            print_json(&node.list_pool_pairs(page.into(), verbose)?)
        }
        Commands::GetPoolPair { key } => print_json(&node.get_pool_pair(&key)?),
    }
}

pub fn print_json(value: &serde_json::Value) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
