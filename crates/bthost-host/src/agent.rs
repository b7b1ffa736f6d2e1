//! Interactive agent interface.
//!
//! The agent is the external component that obtains a user decision (PIN,
//! confirmation, passkey). Requests are fire-and-forget: the coordinator
//! hands over a [`SessionToken`] and returns immediately; the agent's
//! eventual decision re-enters the host as an independently scheduled
//! callback carrying the same token. The token, not the device record, is
//! what survives across the round trip: before any mutation the host checks
//! that the device still exists with the same generation, so a reply for a
//! destroyed (or re-created) device is discarded as a no-op.

use crate::registry::DeviceKey;

/// Liveness token handed to the agent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken {
    pub device: DeviceKey,
    pub generation: u64,
}

/// A user-interaction request issued to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentRequest {
    /// Ask the user to enter a classic PIN code.
    PinCode { secure: bool },
    /// Show a configured PIN the user must confirm on the remote side.
    DisplayPinCode { pin: String, secure: bool },
    /// Ask the user to confirm a 6-digit numeric comparison value.
    ConfirmPasskey { passkey: u32 },
    /// Ask the user to enter the passkey shown on the remote device.
    Passkey,
    /// Show the passkey the user must type on the remote device.
    /// `entered` counts keystrokes the remote has reported so far.
    DisplayPasskey { passkey: u32, entered: u8 },
}

/// The agent's asynchronous decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentResponse {
    /// User supplied a PIN code.
    PinCode(String),
    /// User confirmed the numeric comparison value.
    Confirmed,
    /// User entered a passkey.
    Passkey(u32),
    /// The display-only request was acknowledged.
    Displayed,
    /// User cancelled, or the agent failed.
    Canceled,
}

/// External interactive agent.
#[cfg_attr(test, mockall::automock)]
pub trait PairingAgent {
    /// Whether an interactive agent is currently attached. Confirmation
    /// requests auto-reject when none is.
    fn bound(&self) -> bool;

    /// Deliver a request. Must not block; the decision comes back later
    /// through the host with the same token.
    fn request(&mut self, token: SessionToken, request: AgentRequest);

    /// Tell the agent an outstanding request is no longer relevant.
    fn cancel(&mut self, token: SessionToken);
}
