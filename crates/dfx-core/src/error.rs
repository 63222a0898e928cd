use crate::primitives::OutPoint;

/// Rejection of a single transaction or command. Recoverable: the ledger is
/// left exactly as it was before the failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    InsufficientFunds(String),
    DuplicateSymbol(String),
    DuplicatePair { token_a: u32, token_b: u32 },
    InvalidToken(String),
    AlreadyDestroyed {
        symbol: String,
        height: i64,
        tx: String,
    },
    NotFound(String),
    AuthorizationFailed(String),
    AmountOutOfRange(String),
    RequiresTwoTokens,
    AlreadyLocked(OutPoint),
    CollateralLockedInMempool(OutPoint),
    CollateralLocked(OutPoint),
    TradingDisabled(String),
    BadTransaction(String),
    /// Undo data no longer matches state. Fatal for the node.
    Invariant(InvariantViolation),
}

impl LedgerError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, LedgerError::Invariant(_))
    }
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LedgerError::InsufficientFunds(msg) => write!(f, "Insufficient funds: {}", msg),
            LedgerError::DuplicateSymbol(symbol) => {
                write!(f, "token '{}' already exists", symbol)
            }
            LedgerError::DuplicatePair { token_a, token_b } => write!(
                f,
                "pool pair for tokens {} and {} already exists",
                token_a, token_b
            ),
            LedgerError::InvalidToken(msg) => write!(f, "invalid token: {}", msg),
            LedgerError::AlreadyDestroyed { symbol, height, tx } => write!(
                f,
                "token {} already destroyed at height {} by tx {}",
                symbol, height, tx
            ),
            LedgerError::NotFound(msg) => write!(f, "{}", msg),
            LedgerError::AuthorizationFailed(msg) => write!(f, "{}", msg),
            LedgerError::AmountOutOfRange(msg) => write!(f, "{}", msg),
            LedgerError::RequiresTwoTokens => write!(f, "the pool pair requires two tokens"),
            LedgerError::AlreadyLocked(out) => {
                write!(f, "collateral {} is already locked", out)
            }
            LedgerError::CollateralLockedInMempool(out) => write!(
                f,
                "collateral-locked-in-mempool, tried to spend collateral of a token still in mempool ({})",
                out
            ),
            LedgerError::CollateralLocked(out) => write!(
                f,
                "collateral-locked, tried to spend collateral of an active token ({})",
                out
            ),
            LedgerError::TradingDisabled(symbol) => {
                write!(f, "pool pair {} is not trading", symbol)
            }
            LedgerError::BadTransaction(reason) => write!(f, "{}", reason),
            LedgerError::Invariant(v) => write!(f, "{}", v),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<InvariantViolation> for LedgerError {
    fn from(v: InvariantViolation) -> Self {
        LedgerError::Invariant(v)
    }
}

/// Ledger state and undo data disagree. Never recoverable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation(pub String);

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "invariant violation: {}", self.0)
    }
}

impl std::error::Error for InvariantViolation {}
