//! Outbound controller interfaces: the reply path and the discovery sink.

use bthost_core::error::ReplyError;
use bthost_core::{Address, AddressType};

/// Reply primitives toward the controller.
///
/// Each may fail with a negative status; the host logs the failure and never
/// retries.
pub trait ControllerLink {
    /// Reply to a PIN request. `None` (zero-length PIN) signals rejection.
    fn pincode_reply(
        &mut self,
        local: Address,
        peer: Address,
        pin: Option<&str>,
    ) -> Result<(), ReplyError>;

    /// Reply to a numeric-confirmation request.
    fn confirm_reply(
        &mut self,
        local: Address,
        peer: Address,
        peer_type: AddressType,
        confirm: bool,
    ) -> Result<(), ReplyError>;

    /// Reply to a passkey request. [`crate::INVALID_PASSKEY`] rejects.
    fn passkey_reply(
        &mut self,
        local: Address,
        peer: Address,
        peer_type: AddressType,
        passkey: u32,
    ) -> Result<(), ReplyError>;

    /// Ask the controller to tear down the link to `peer`.
    fn request_disconnect(&mut self, local: Address, peer: Address) -> Result<(), ReplyError>;
}

/// One discovery report from an inquiry or LE scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub peer: Address,
    pub address_type: AddressType,
    pub rssi: i8,
    /// The controller wants the host to confirm the device name.
    pub confirm_name: bool,
    /// Report came from a legacy (pre-EIR) inquiry.
    pub legacy: bool,
    /// Raw EIR/advertising data.
    pub eir: Vec<u8>,
}

/// Consumer of discovery reports; device records are not created here.
pub trait DiscoverySink {
    fn device_found(&mut self, local: Address, report: &DiscoveryReport);
}
