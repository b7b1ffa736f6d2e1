//! Adapter and remote-device registry.
//!
//! The registry owns all long-lived device records. Host handlers mutate
//! records only through the primitives here, and only from inside a handler
//! invocation, so no locking is involved. Devices are referenced by
//! [`DeviceKey`] (adapter address + peer address) plus a generation number
//! that distinguishes a record from any later record re-created at the same
//! address.

use std::collections::HashMap;

use bthost_core::{Address, AddressType};
use tracing::debug;

use crate::pairing::Method;

/// Stable reference to a device record: owning adapter plus peer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceKey {
    pub adapter: Address,
    pub peer: Address,
}

/// A PIN configured on an adapter, consulted before asking the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPin {
    pub pin: String,
    /// The PIN must be shown to the user rather than replied silently.
    pub display: bool,
}

/// One paired/known/discovered remote device.
#[derive(Debug)]
pub struct Device {
    address_type: AddressType,
    name: Option<String>,
    bonded: bool,
    paired: bool,
    temporary: bool,
    blocked: bool,
    connections: u32,
    /// Set while a locally initiated bonding request is outstanding.
    bonding_requested: bool,
    /// Verification method of the in-progress pairing session, if any.
    bonding: Option<Method>,
    /// Status of the last simple-pairing completion event.
    ssp_status: Option<u8>,
    generation: u64,
}

impl Device {
    fn new(generation: u64) -> Self {
        Self {
            address_type: AddressType::BrEdr,
            name: None,
            bonded: false,
            paired: false,
            // New records are untrusted until a credential is persisted
            temporary: true,
            blocked: false,
            connections: 0,
            bonding_requested: false,
            bonding: None,
            ssp_status: None,
            generation,
        }
    }

    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    pub fn set_address_type(&mut self, address_type: AddressType) {
        self.address_type = address_type;
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    pub fn is_bonded(&self) -> bool {
        self.bonded
    }

    pub fn set_bonded(&mut self, bonded: bool) {
        self.bonded = bonded;
    }

    /// Paired denotes an already-established pairing re-confirmed by the
    /// controller; distinct from bonded.
    pub fn is_paired(&self) -> bool {
        self.paired
    }

    pub fn set_paired(&mut self, paired: bool) {
        self.paired = paired;
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn set_temporary(&mut self, temporary: bool) {
        self.temporary = temporary;
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    pub fn is_connected(&self) -> bool {
        self.connections > 0
    }

    pub fn add_connection(&mut self) {
        self.connections += 1;
    }

    pub fn remove_connection(&mut self) {
        self.connections = self.connections.saturating_sub(1);
    }

    pub fn is_bonding_requested(&self) -> bool {
        self.bonding_requested
    }

    /// Mark a locally initiated bonding request as outstanding (or clear it).
    pub fn set_bonding_requested(&mut self, requested: bool) {
        self.bonding_requested = requested;
    }

    pub fn bonding_method(&self) -> Option<Method> {
        self.bonding
    }

    pub fn set_bonding_method(&mut self, method: Option<Method>) {
        self.bonding = method;
    }

    pub fn ssp_status(&self) -> Option<u8> {
        self.ssp_status
    }

    pub fn set_ssp_status(&mut self, status: u8) {
        self.ssp_status = Some(status);
    }

    /// Generation number distinguishing this record from any re-created
    /// record at the same address.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// One local controller context and its known devices.
#[derive(Debug)]
pub struct Adapter {
    fixed_pin: Option<FixedPin>,
    devices: HashMap<Address, Device>,
}

impl Adapter {
    fn new() -> Self {
        Self {
            fixed_pin: None,
            devices: HashMap::new(),
        }
    }

    /// The configured PIN for classic pairing, if any.
    pub fn fixed_pin(&self) -> Option<&FixedPin> {
        self.fixed_pin.as_ref()
    }

    pub fn set_fixed_pin(&mut self, pin: Option<FixedPin>) {
        self.fixed_pin = pin;
    }

    pub fn device(&self, peer: Address) -> Option<&Device> {
        self.devices.get(&peer)
    }
}

/// All adapters known to this host.
#[derive(Debug, Default)]
pub struct Registry {
    adapters: HashMap<Address, Adapter>,
    next_generation: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a local controller context.
    pub fn add_adapter(&mut self, address: Address) -> &mut Adapter {
        self.adapters.entry(address).or_insert_with(Adapter::new)
    }

    pub fn adapter(&self, local: Address) -> Option<&Adapter> {
        self.adapters.get(&local)
    }

    pub fn adapter_mut(&mut self, local: Address) -> Option<&mut Adapter> {
        self.adapters.get_mut(&local)
    }

    pub fn device(&self, key: DeviceKey) -> Option<&Device> {
        self.adapters.get(&key.adapter)?.devices.get(&key.peer)
    }

    pub fn device_mut(&mut self, key: DeviceKey) -> Option<&mut Device> {
        self.adapters
            .get_mut(&key.adapter)?
            .devices
            .get_mut(&key.peer)
    }

    /// Return the existing device for `key`, creating a record if absent.
    ///
    /// Returns `None` when the adapter itself is unknown.
    pub fn get_or_create_device(&mut self, key: DeviceKey) -> Option<&mut Device> {
        let generation = self.next_generation;
        let adapter = self.adapters.get_mut(&key.adapter)?;
        let created = !adapter.devices.contains_key(&key.peer);
        let device = adapter
            .devices
            .entry(key.peer)
            .or_insert_with(|| Device::new(generation));
        if created {
            self.next_generation += 1;
            debug!(peer = %key.peer, "created device record");
        }
        Some(device)
    }

    /// Drop the device record. Any pairing session it owned becomes orphaned
    /// and its eventual agent reply is discarded.
    pub fn remove_device(&mut self, key: DeviceKey) -> bool {
        let Some(adapter) = self.adapters.get_mut(&key.adapter) else {
            return false;
        };
        let removed = adapter.devices.remove(&key.peer).is_some();
        if removed {
            debug!(peer = %key.peer, "removed device record");
        }
        removed
    }
}
