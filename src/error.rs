//! Error types for virtualgroup

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of errors, used by hosts to map failures onto
/// their own response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Authorization,
    StateConflict,
    Settlement,
    Storage,
    Config,
    Internal,
}

/// Main error type for virtualgroup
#[derive(Error, Debug)]
pub enum Error {
    // Not-found errors
    #[error("Storage provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Global virtual group not found: {0}")]
    GvgNotFound(u32),

    #[error("Global virtual group family not found: {0}")]
    FamilyNotFound(u32),

    #[error("No swap-out record for {scope} held by SP {sp_id}")]
    SwapOutNotFound { scope: String, sp_id: u32 },

    #[error("No swap-in reservation for {scope} held by SP {sp_id}")]
    SwapInNotFound { scope: String, sp_id: u32 },

    // Validation errors
    #[error("Secondary SP {0} appears more than once in the group")]
    DuplicateSecondarySp(u32),

    #[error("Family {family_id} already has a group with the same secondary SPs in the same order")]
    DuplicateGvg { family_id: u32 },

    #[error("Invalid coin denomination: got {got}, expected {expected}")]
    InvalidDenom { expected: String, got: String },

    #[error("Invalid secondary SP count: expected {expected}, got {got}")]
    InvalidSecondarySpCount { expected: usize, got: usize },

    #[error("Family {family_id} already holds the maximum of {limit} groups")]
    LimitExceeded { family_id: u32, limit: u32 },

    #[error("SP {0} cannot swap with itself")]
    SelfSwap(u32),

    #[error("Withdraw amount {requested} exceeds available {available}")]
    WithdrawAmountTooLarge { requested: u128, available: u128 },

    #[error("Global virtual group {id} still stores {stored_size} bytes")]
    GvgNotEmpty { id: u32, stored_size: u64 },

    #[error("Invalid swap request: {0}")]
    InvalidSwap(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    // Authorization errors
    #[error("Invalid authority: expected {expected}, got {got}")]
    InvalidAuthority { expected: String, got: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Successor approval signature does not verify for SP {0}")]
    InvalidApproval(u32),

    // State conflicts
    #[error("SP {sp_id} is not in service, status: {status}")]
    ProviderNotInService { sp_id: u32, status: String },

    #[error("SP {sp_id} cannot exit: {reason}")]
    ExitFailed { sp_id: u32, reason: String },

    #[error("SP {sp_id} has {count} groups breaking the redundancy requirement")]
    RedundancyBroken { sp_id: u32, count: u32 },

    #[error("{exiting} SPs are exiting, only {limit} may exit concurrently")]
    ExitConcurrencyExceeded { exiting: u32, limit: u32 },

    #[error("SP {0} is not exitable yet")]
    NotExitable(u32),

    #[error("Swap-out already pending for {scope} (SP {sp_id})")]
    SwapOutExists { scope: String, sp_id: u32 },

    #[error("{scope} is reserved for swap-in by SP {sp_id} until {expiration}")]
    SwapInReserved {
        scope: String,
        sp_id: u32,
        expiration: i64,
    },

    #[error("Swap-in reservation expired at {expiration}, now {now}")]
    SwapInExpired { expiration: i64, now: i64 },

    // Ledger errors
    #[error("Insufficient funds in {account}: need {needed}, have {available}")]
    InsufficientFunds {
        account: String,
        needed: u128,
        available: u128,
    },

    #[error("Bank error: {0}")]
    Bank(String),

    #[error("Settlement failed")]
    SettleFailed,

    // Storage errors
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ProviderNotFound(_)
            | Error::GvgNotFound(_)
            | Error::FamilyNotFound(_)
            | Error::SwapOutNotFound { .. }
            | Error::SwapInNotFound { .. } => ErrorKind::NotFound,

            Error::DuplicateSecondarySp(_)
            | Error::DuplicateGvg { .. }
            | Error::InvalidDenom { .. }
            | Error::InvalidSecondarySpCount { .. }
            | Error::LimitExceeded { .. }
            | Error::SelfSwap(_)
            | Error::WithdrawAmountTooLarge { .. }
            | Error::GvgNotEmpty { .. }
            | Error::InvalidSwap(_)
            | Error::InvalidParams(_)
            | Error::InsufficientFunds { .. } => ErrorKind::Validation,

            Error::InvalidAuthority { .. } | Error::Unauthorized(_) | Error::InvalidApproval(_) => {
                ErrorKind::Authorization
            }

            Error::ProviderNotInService { .. }
            | Error::ExitFailed { .. }
            | Error::RedundancyBroken { .. }
            | Error::ExitConcurrencyExceeded { .. }
            | Error::NotExitable(_)
            | Error::SwapOutExists { .. }
            | Error::SwapInReserved { .. }
            | Error::SwapInExpired { .. } => ErrorKind::StateConflict,

            Error::SettleFailed => ErrorKind::Settlement,

            Error::Database(_)
            | Error::Serialization(_)
            | Error::Deserialization(_)
            | Error::Io(_) => ErrorKind::Storage,

            Error::Config(_) | Error::InvalidConfig(_) => ErrorKind::Config,

            Error::Bank(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
