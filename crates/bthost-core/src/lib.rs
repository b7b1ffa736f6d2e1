//! # bthost-core
//!
//! Shared foundation types for the bthost Bluetooth host core:
//! - Device addresses and address types
//! - Remote-name sanitization
//! - The error hierarchy used across the workspace

pub mod address;
pub mod error;
pub mod name;

pub use address::{Address, AddressType};
pub use error::{CodecError, Error, ReplyError, ResolveError, Result, StoreError};
pub use name::{sanitize_remote_name, MAX_NAME_LENGTH};
