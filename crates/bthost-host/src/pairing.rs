//! Pairing method selection and session bookkeeping.
//!
//! Exactly one verification method is driven per bonding attempt. Method
//! choice is a pure function of the triggering event, the adapter's cached
//! PIN and the device's bonding state; the session itself is a token plus
//! the chosen method, held by the host until the agent's decision (or the
//! device's destruction) retires it.

use crate::agent::SessionToken;
use crate::registry::FixedPin;

/// Reply value rejecting a passkey request.
pub const INVALID_PASSKEY: u32 = 0xffff_ffff;

/// Secure (simple-pairing era) PIN requests require exactly 16 characters.
/// The constraint counts characters, not bytes.
const SECURE_PIN_LEN: usize = 16;

/// The four user-verification methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// User types a classic PIN code.
    PinEntry,
    /// User confirms a numeric comparison value.
    Confirmation,
    /// Passkey is shown locally and typed on the remote device.
    PasskeyDisplay,
    /// User types the passkey shown on the remote device.
    PasskeyEntry,
}

/// One in-progress pairing session, 1:1 with a device record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: SessionToken,
    pub method: Method,
    /// PIN shown to the user when the session is a display-only
    /// confirmation; replied to the controller once the agent acknowledges.
    pub display_pin: Option<String>,
}

/// How to answer a classic PIN request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinPath {
    /// A usable cached PIN exists: reply to the controller directly,
    /// skipping the agent round trip.
    ReplyNow { pin: String },
    /// A usable cached PIN exists but is marked for display while the
    /// device is actively bonding: route through the agent as a
    /// display-only confirmation.
    DisplayToAgent { pin: String },
    /// No usable cached PIN: ask the agent for one.
    AskAgent,
}

/// Select the path for a PIN request.
///
/// A cached PIN is usable when it is non-empty and, for secure requests,
/// exactly [`SECURE_PIN_LEN`] characters long.
pub fn select_pin_path(cached: Option<&FixedPin>, secure: bool, bonding: bool) -> PinPath {
    match cached {
        Some(fixed)
            if !fixed.pin.is_empty()
                && (!secure || fixed.pin.chars().count() == SECURE_PIN_LEN) =>
        {
            if fixed.display && bonding {
                PinPath::DisplayToAgent {
                    pin: fixed.pin.clone(),
                }
            } else {
                PinPath::ReplyNow {
                    pin: fixed.pin.clone(),
                }
            }
        }
        _ => PinPath::AskAgent,
    }
}
