// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DFX - NODE CRATE
//
// Chain management, mempool, wallet, sled persistence and the command
// surface on top of dfx-core.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod chain;
pub mod config;
pub mod db;
pub mod error;
pub mod mempool;
pub mod node;
pub mod rpc;
pub mod wallet;

pub use config::NodeConfig;
pub use error::NodeError;
pub use mempool::MempoolStats;
pub use node::Node;
pub use rpc::{CreatePoolPairRequest, PoolSwapRequest};
