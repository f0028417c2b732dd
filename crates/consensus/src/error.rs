//! Consensus errors.
//!
//! Every failure that can change whether a block is accepted is an
//! [`AlienError`] and reaches the caller unchanged. Malformed governance
//! payloads are not errors at this layer: they fail with a
//! [`ParseError`](crate::command::ParseError) that the processor logs and
//! drops.

use alien_crypto::CryptoError;
use alien_storage::StorageError;
use alien_types::{Address, H256};

/// Errors returned by the Alien engine
#[derive(Debug, thiserror::Error)]
pub enum AlienError {
    // Structural
    /// Header or block is not known, or has no number
    #[error("unknown block")]
    UnknownBlock,

    /// Extra-data is shorter than the vanity prefix
    #[error("extra-data 32 byte vanity prefix missing")]
    MissingVanity,

    /// Extra-data has no room for the seal
    #[error("extra-data 65 byte signature suffix missing")]
    MissingSignature,

    /// Mix digest is not zero
    #[error("non-zero mix digest")]
    InvalidMixDigest,

    /// Uncle hash is not the empty-list hash
    #[error("non empty uncle hash")]
    InvalidUncleHash,

    /// Timestamp precedes the parent, or the loop start time is wrong
    #[error("invalid timestamp")]
    InvalidTimestamp,

    /// Timestamp lies ahead of the local clock
    #[error("block in the future: {time} > {now}")]
    FutureBlock {
        /// Header time
        time: u64,
        /// Local clock
        now: u64,
    },

    // Lineage
    /// Parent header is not available
    #[error("unknown ancestor")]
    UnknownAncestor,

    /// Header numbers in a batch are not consecutive
    #[error("non-contiguous header batch: {expected} expected, got {actual}")]
    NonContiguousBatch {
        /// Number that should have come next
        expected: u64,
        /// Number found
        actual: u64,
    },

    /// The first header of a batch does not extend the snapshot
    #[error("wrong ancestor: snapshot at {snapshot}, header {header}")]
    WrongAncestor {
        /// Snapshot number
        snapshot: u64,
        /// First header number
        header: u64,
    },

    // Authority
    /// Signer is not allowed to seal this block
    #[error("unauthorized signer {0}")]
    Unauthorized(Address),

    /// Signer queue differs from the expected one
    #[error("invalid signer queue")]
    InvalidSignerQueue,

    /// No candidate could be elected
    #[error("signer queue is empty")]
    EmptySignerQueue,

    /// The same coinbase sealed consecutive blocks faster than the period
    #[error("signer {0} sealed consecutive blocks within one period")]
    InvalidNeighborSigner(Address),

    /// Signer-missing list differs from the computed one
    #[error("signer missing list mismatch")]
    PunishedMissing,

    // Snapshot
    /// Tally does not equal the sum of active votes
    #[error("incorrect tally count")]
    IncorrectTally,

    /// The sealer has eligible voters but their stakes sum to zero
    #[error("all stake of eligible voters is missing")]
    AllStakeMissing,

    /// Signer queue requested away from a loop boundary
    #[error("create signer queue not allowed at snapshot {0}")]
    QueueNotAllowed(u64),

    // Cross-chain
    /// Side-chain operation on a main-chain engine
    #[error("not a side chain")]
    NotSideChain,

    /// Side chain configured without a main-chain client
    #[error("main chain client missing")]
    MainChainClientMissing,

    /// Main-chain call exceeded its deadline
    #[error("main chain call timed out")]
    MainChainTimeout,

    /// Main-chain call failed
    #[error("main chain unavailable: {0}")]
    MainChainUnavailable(String),

    /// Main-chain snapshot carries no period
    #[error("main chain period missing")]
    MCPeriodMissing,

    /// A gas charging is not announced by the main chain
    #[error("gas charging {0} not found on main chain")]
    MCGasChargingInvalid(H256),

    // Config
    /// Genesis snapshot needed but no genesis balances configured
    #[error("genesis configuration missing on light node")]
    GenesisLightConfigMissing,

    // Codec and plumbing
    /// Header extra payload cannot be decoded
    #[error("malformed header extra: {0}")]
    MalformedExtra(String),

    /// Extra-data shorter than the seal
    #[error("extra-data too short for a seal")]
    ExtraTooShort,

    /// Zero-period chain with nothing to seal
    #[error("waiting for transactions")]
    WaitTransactions,

    /// No local signer authorized
    #[error("no signer authorized")]
    SignerMissing,

    /// Signature failure
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Key/value store failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Checkpoint (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration value failed to parse
    #[error("config error: {0}")]
    Config(#[from] alien_config::ConfigError),
}

impl From<rlp::DecoderError> for AlienError {
    fn from(e: rlp::DecoderError) -> Self {
        AlienError::MalformedExtra(e.to_string())
    }
}

/// Result type for the engine
pub type Result<T> = std::result::Result<T, AlienError>;
