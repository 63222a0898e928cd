// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DFX CLI - Command line access to a local ledger node
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use clap::{Args, Parser, Subcommand};
use colored::*;
use dfx_node::rpc::Pagination;
use dfx_node::{Node, NodeConfig};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "dfx-cli")]
#[command(about = "DFX CLI - Tokens, pool pairs and swaps on a local node", long_about = None)]
#[command(version)]
struct Cli {
    /// Node data directory (default: ~/.dfx)
    #[arg(short, long, env = "DFX_DATA_DIR")]
    datadir: Option<PathBuf>,

    /// Node config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Id window for account and pool listings
#[derive(Args, Debug, Clone, Default)]
struct PageArgs {
    /// List ids after this one
    #[arg(long)]
    start: Option<u32>,
    /// Include `start` itself
    #[arg(long)]
    including_start: bool,
    /// Max entries
    #[arg(long)]
    limit: Option<usize>,
}

impl From<PageArgs> for Pagination {
    fn from(args: PageArgs) -> Self {
        Pagination {
            start: args.start,
            including_start: args.including_start,
            limit: args.limit,
        }
    }
}

#[derive(Subcommand)]
#[command(rename_all = "lower")]
enum Commands {
    /// Mine blocks paying the wallet's default address
    Generate {
        /// Number of blocks
        blocks: u64,
    },

    /// Height of the active chain
    GetBlockCount,

    /// Hash of the tip block
    GetBestBlockHash,

    /// Disconnect the tip block
    InvalidateTip,

    /// Write the active chain (JSON) to a file
    ExportChain {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Switch to the chain in a file if it is longer
    AcceptChain {
        /// Chain file written by exportchain
        input: PathBuf,
    },

    /// Derive a new wallet address
    GetNewAddress,

    /// Watch an address with the wallet
    ImportAddress {
        address: String,
    },

    /// Spendable native balance of the wallet
    GetBalance,

    /// Pay native coins to an address
    SendToAddress {
        address: String,
        /// Decimal amount, e.g. 1.5
        amount: String,
    },

    /// Submit a JSON-encoded transaction
    SendRawTransaction {
        tx: String,
    },

    /// Pending transaction ids in admission order
    GetRawMempool,

    /// Mempool size and counters
    GetMempoolInfo,

    /// Create a token locking collateral on an address
    CreateToken {
        symbol: String,
        name: String,
        collateral_address: String,
    },

    /// Destroy a token (id, symbol or creation tx)
    DestroyToken {
        token: String,
    },

    /// Mint to the tokens' collateral addresses, "amount@token[,...]"
    MintTokens {
        amounts: String,
    },

    /// All tokens, or the one an id, symbol or creation tx names
    ListTokens {
        key: Option<String>,
        /// Symbols and names only
        #[arg(long)]
        brief: bool,
    },

    /// One token by id, symbol or creation tx
    GetToken {
        key: String,
    },

    /// Token balances of an address
    GetAccount {
        address: String,
        #[command(flatten)]
        page: PageArgs,
        /// Key balances by token id
        #[arg(long)]
        ids: bool,
    },

    /// Transfer balances, `to` is {"address": "amount@token,..."}
    AccountToAccount {
        from: String,
        to: String,
        /// Extra address that must sign, repeatable
        #[arg(long = "auth")]
        auth: Vec<String>,
    },

    /// Create a pool pair from {"tokenA", "tokenB", "commission", ...}
    CreatePoolPair {
        metadata: String,
    },

    /// Add liquidity, `from` is {"address": ["amount@token", ...]}
    AddPoolLiquidity {
        from: String,
        share_address: String,
    },

    /// Redeem pool shares, "amount@POOLSYMBOL"
    RemovePoolLiquidity {
        from: String,
        amount: String,
    },

    /// Swap through a pool, {"from", "tokenFrom", "amountFrom", "to", "tokenTo"}
    PoolSwap {
        metadata: String,
    },

    /// All pool pairs
    ListPoolPairs {
        #[command(flatten)]
        page: PageArgs,
        /// Include reserves, commission and liquidity
        #[arg(long)]
        verbose: bool,
    },

    /// One pool pair by id or symbol
    GetPoolPair {
        key: String,
    },
}

fn load_config(cli: &Cli) -> Result<NodeConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::load_from_file(path)?,
        None => NodeConfig::load_from_env(),
    };
    if let Some(dir) = &cli.datadir {
        config.data_dir = Some(dir.clone());
    }
    if config.data_dir.is_none() {
        config.data_dir = Some(
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".dfx"),
        );
    }
    Ok(config)
}

fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // a second init (tests) is harmless
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    init_logging(&config.log.level);
    if let Some(dir) = &config.data_dir {
        std::fs::create_dir_all(dir)?;
    }
    let node = Node::new(config)?;
    commands::handle(cli.command, &node)
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}

// ─────────────────────────────────────────────────────────────────
// UNIT TESTS
// ─────────────────────────────────────────────────────────────────
