//! # Economy Error Types
//!
//! All errors that can occur in the economy core.
//!
//! The core never panics on bad input. Operations that can be refused return
//! one of these variants and leave state untouched.

use thiserror::Error;

/// Errors that can occur in the economy core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EconomyError {
    /// A numeric string could not be parsed into an `Amount`.
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),

    /// Resource id is not defined in the ledger.
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// Purchasable id is not defined in the catalog.
    #[error("unknown purchasable: {0}")]
    UnknownPurchasable(String),

    /// Not enough of the cost resource to complete a purchase.
    #[error("insufficient {resource}: need {required}, have {available}")]
    InsufficientFunds {
        /// The resource that was short.
        resource: String,
        /// The amount required (decimal string).
        required: String,
        /// The amount available (decimal string).
        available: String,
    },

    /// A "Buy Max" request could not afford even a single unit.
    #[error("nothing affordable for {purchasable}")]
    NothingAffordable {
        /// The purchasable that was requested.
        purchasable: String,
    },

    /// Purchase quantity was zero, negative or not a whole number.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Tick delta was negative or not a finite number.
    #[error("invalid tick delta: {0}")]
    InvalidDelta(String),

    /// Effect source registration was malformed (empty owner or key).
    #[error("invalid effect source: {0}")]
    InvalidEffectSource(String),

    /// Effect kind name is not one of the known kinds.
    #[error("unknown effect kind: {0}")]
    UnknownEffectKind(String),

    /// An effect provider could not produce a value.
    #[error("effect provider failed: {0}")]
    ProviderFailed(String),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("io error: {0}")]
    Io(String),
}

/// Result type for economy operations.
pub type EconomyResult<T> = Result<T, EconomyError>;

impl From<std::io::Error> for EconomyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<toml::de::Error> for EconomyError {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
