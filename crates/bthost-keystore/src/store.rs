//! Persistence contracts for credentials and cached device attributes.
//!
//! The actual storage mechanism lives outside the host core; these traits
//! capture only its semantic contract: records addressed by composite key,
//! a write to an existing key fully overwriting the prior record. The
//! in-memory implementation backs tests and the demo daemon.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use bthost_core::{Address, AddressType};
use bthost_core::error::StoreError;
use tracing::debug;

use crate::codec::{encode_link_key, encode_long_term_key, LinkKey, LongTermKey};

/// Long-term credential store, one logical file per controller.
pub trait KeyStore {
    /// Persist a classic link key for (local, peer, peer type).
    fn store_link_key(
        &mut self,
        local: Address,
        peer: Address,
        peer_type: AddressType,
        key: &LinkKey,
    ) -> Result<(), StoreError>;

    /// Persist an LE long-term key for (local, peer, peer type).
    fn store_long_term_key(
        &mut self,
        local: Address,
        peer: Address,
        peer_type: AddressType,
        key: &LongTermKey,
    ) -> Result<(), StoreError>;
}

/// Per-controller cache of remote device attributes.
pub trait DeviceCache {
    /// Persist the sanitized remote name for (local, peer).
    fn store_name(&mut self, local: Address, peer: Address, name: &str) -> Result<(), StoreError>;

    /// Persist the remote device class for (local, peer).
    fn store_class(&mut self, local: Address, peer: Address, class: u32)
        -> Result<(), StoreError>;

    /// Persist the last-used timestamp for (local, peer, peer type).
    fn store_last_seen(
        &mut self,
        local: Address,
        peer: Address,
        peer_type: AddressType,
        when: SystemTime,
    ) -> Result<(), StoreError>;
}

type CredentialKey = (Address, Address, AddressType);

/// In-memory store holding records in their canonical textual encoding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    link_keys: HashMap<CredentialKey, String>,
    long_term_keys: HashMap<CredentialKey, String>,
    names: HashMap<(Address, Address), String>,
    classes: HashMap<(Address, Address), u32>,
    last_seen: HashMap<CredentialKey, u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoded classic record for (local, peer, peer type), if any.
    pub fn link_key(
        &self,
        local: Address,
        peer: Address,
        peer_type: AddressType,
    ) -> Option<&str> {
        self.link_keys.get(&(local, peer, peer_type)).map(String::as_str)
    }

    /// Encoded LE record for (local, peer, peer type), if any.
    pub fn long_term_key(
        &self,
        local: Address,
        peer: Address,
        peer_type: AddressType,
    ) -> Option<&str> {
        self.long_term_keys
            .get(&(local, peer, peer_type))
            .map(String::as_str)
    }

    /// Cached name for (local, peer), if any.
    pub fn name(&self, local: Address, peer: Address) -> Option<&str> {
        self.names.get(&(local, peer)).map(String::as_str)
    }

    /// Cached device class for (local, peer), if any.
    pub fn class(&self, local: Address, peer: Address) -> Option<u32> {
        self.classes.get(&(local, peer)).copied()
    }

    /// Last-used timestamp (seconds since epoch) for (local, peer, peer type).
    pub fn last_seen(
        &self,
        local: Address,
        peer: Address,
        peer_type: AddressType,
    ) -> Option<u64> {
        self.last_seen.get(&(local, peer, peer_type)).copied()
    }
}

impl KeyStore for MemoryStore {
    fn store_link_key(
        &mut self,
        local: Address,
        peer: Address,
        peer_type: AddressType,
        key: &LinkKey,
    ) -> Result<(), StoreError> {
        let record = encode_link_key(key)?;
        debug!(%local, %peer, key_type = key.key_type, "storing link key");
        self.link_keys.insert((local, peer, peer_type), record);
        Ok(())
    }

    fn store_long_term_key(
        &mut self,
        local: Address,
        peer: Address,
        peer_type: AddressType,
        key: &LongTermKey,
    ) -> Result<(), StoreError> {
        let record = encode_long_term_key(key)?;
        debug!(%local, %peer, authenticated = key.authenticated, "storing long-term key");
        self.long_term_keys.insert((local, peer, peer_type), record);
        Ok(())
    }
}

impl DeviceCache for MemoryStore {
    fn store_name(&mut self, local: Address, peer: Address, name: &str) -> Result<(), StoreError> {
        self.names.insert((local, peer), name.to_string());
        Ok(())
    }

    fn store_class(
        &mut self,
        local: Address,
        peer: Address,
        class: u32,
    ) -> Result<(), StoreError> {
        self.classes.insert((local, peer), class);
        Ok(())
    }

    fn store_last_seen(
        &mut self,
        local: Address,
        peer: Address,
        peer_type: AddressType,
        when: SystemTime,
    ) -> Result<(), StoreError> {
        let secs = when
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StoreError::PersistFailed(format!("time before epoch: {e}")))?
            .as_secs();
        self.last_seen.insert((local, peer, peer_type), secs);
        Ok(())
    }
}

// A single-threaded host hands the store to the dispatcher as a trait
// object; sharing through Rc lets the owner keep a read handle.
impl KeyStore for std::rc::Rc<std::cell::RefCell<MemoryStore>> {
    fn store_link_key(
        &mut self,
        local: Address,
        peer: Address,
        peer_type: AddressType,
        key: &LinkKey,
    ) -> Result<(), StoreError> {
        self.borrow_mut().store_link_key(local, peer, peer_type, key)
    }

    fn store_long_term_key(
        &mut self,
        local: Address,
        peer: Address,
        peer_type: AddressType,
        key: &LongTermKey,
    ) -> Result<(), StoreError> {
        self.borrow_mut()
            .store_long_term_key(local, peer, peer_type, key)
    }
}

impl DeviceCache for std::rc::Rc<std::cell::RefCell<MemoryStore>> {
    fn store_name(&mut self, local: Address, peer: Address, name: &str) -> Result<(), StoreError> {
        self.borrow_mut().store_name(local, peer, name)
    }

    fn store_class(
        &mut self,
        local: Address,
        peer: Address,
        class: u32,
    ) -> Result<(), StoreError> {
        self.borrow_mut().store_class(local, peer, class)
    }

    fn store_last_seen(
        &mut self,
        local: Address,
        peer: Address,
        peer_type: AddressType,
        when: SystemTime,
    ) -> Result<(), StoreError> {
        self.borrow_mut().store_last_seen(local, peer, peer_type, when)
    }
}
