//! API for tecdsa users
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;
pub type BytesVec = Vec<u8>;

/// Every fallible operation in this crate reports one of these kinds.
/// Domain violations are surfaced to the caller, never silently repaired.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// An argument lies outside its required algebraic set.
    #[error("domain violation: {0}")]
    DomainViolation(&'static str),

    /// A proof or share references key material that does not match the
    /// currently held public key.
    #[error("key mismatch: {0}")]
    KeyMismatch(&'static str),

    /// Share recombination was attempted with fewer than `need` inputs.
    #[error("insufficient shares: got {got}, need {need}")]
    InsufficientShares { got: usize, need: usize },

    /// Two recombination inputs carry the same share id.
    #[error("duplicate share id {0}")]
    DuplicateShare(usize),

    /// A zero-knowledge proof failed to verify.
    #[error("proof verification failure")]
    ProofFailure,

    /// A length field would exceed the encoding's index domain.
    #[error("encoding overflow")]
    EncodingOverflow,

    /// A length-prefixed slice extends past the buffer, or a field fails to parse.
    #[error("corrupt encoding: {0}")]
    CorruptEncoding(&'static str),

    /// A signing party must yield no signature because an earlier check failed.
    #[error("protocol abort: {0}")]
    ProtocolAbort(&'static str),
}

/// Faults attributable to a peer while running the signing protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fault {
    MissingMessage,
    CorruptedMessage,
    ProtocolFault,
}

/// Expose tecdsa's (de)serialization functions
/// that use the appropriate bincode config options.
pub use super::wire_bytes::{deserialize, serialize};
