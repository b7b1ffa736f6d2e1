//! Error types shared across the bthost workspace.

use thiserror::Error;

/// Primary error type for host-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Resolver error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Controller reply error: {0}")]
    Reply(#[from] ReplyError),
}

/// Errors while resolving a (local controller, peer) pair to handles.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No controller context for local address {0}")]
    NoSuchController(crate::Address),

    #[error("Failed to create device record for {0}")]
    DeviceCreateFailed(crate::Address),
}

/// Errors from the credential codec.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// Allocation of the output text failed. Encoding is otherwise total
    /// for well-formed fixed-size inputs.
    #[error("Allocation failure while encoding credential record")]
    EncodeAllocationFailure,

    #[error("Record has {got} fields, expected {expected}")]
    FieldCount { expected: usize, got: usize },

    #[error("Invalid hex field: {0}")]
    InvalidHex(String),

    #[error("Hex field is {got} characters, expected {expected}")]
    HexLength { expected: usize, got: usize },

    #[error("Invalid numeric field: {0}")]
    InvalidNumber(String),
}

/// Errors from the credential/name persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Persist failed: {0}")]
    PersistFailed(String),
}

/// Errors from the controller reply path.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReplyError {
    /// The reply primitive returned a negative status. Never retried.
    #[error("Controller reply failed with status {0}")]
    Status(i32),

    #[error("Controller link closed")]
    LinkClosed,
}

/// Errors parsing a textual device address.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseAddressError {
    #[error("Invalid hex value: {0}")]
    InvalidHex(String),

    #[error("Invalid address length: {0}")]
    InvalidLength(usize),
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
