use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("no root key has been set")]
    MissingRootKey,

    #[error(
        "unique constraint violated by key (account {account}, chain {chain}, index {index})"
    )]
    UniqueConstraintViolation { account: u32, chain: u32, index: u32 },

    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("wallet chain not defined for asset {0}")]
    UndefinedChain(String),

    #[error("asset definitions with more than one color are not supported")]
    MultiColorNotSupported,

    #[error("unit must be a positive power of ten (got {0})")]
    InvalidUnit(u64),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("asset already exists: {0}")]
    AssetExists(String),

    #[error("unknown color id: {0}")]
    UnknownColor(u32),

    #[error("coin query returned {0} distinct colors; multi-color balances are not supported")]
    MultiColorBalanceUnsupported(usize),

    #[error("key derivation error: {0}")]
    Derivation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal mutex poisoned by a prior panic")]
    MutexPoisoned,
}

pub type Result<T> = std::result::Result<T, Error>;
