//! # bthost-keystore
//!
//! Long-term credential persistence for the bthost core:
//! - A fixed-layout binary-to-text codec for classic link keys and LE
//!   long-term keys (the canonical persisted record format)
//! - The `KeyStore` and `DeviceCache` store contracts, addressed by
//!   composite key (controller address, peer address, peer address type)
//! - An in-memory store used by tests and the demo daemon

pub mod codec;
pub mod store;

pub use codec::{
    decode_link_key, decode_long_term_key, encode_link_key, encode_long_term_key, LinkKey,
    LongTermKey,
};
pub use store::{DeviceCache, KeyStore, MemoryStore};
