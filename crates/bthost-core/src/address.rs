//! Bluetooth device addresses and address types.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseAddressError;

/// 48-bit Bluetooth device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 6]);

impl Address {
    /// Create from raw bytes, most significant byte first.
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes, most significant byte first.
    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    /// Parse an address from string.
    ///
    /// Supports formats:
    /// - Colon-separated: "AA:BB:CC:DD:EE:FF"
    /// - Hyphen-separated: "AA-BB-CC-DD-EE-FF"
    /// - Bare hex: "AABBCCDDEEFF"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let bytes: Vec<u8> = if s.contains(':') || s.contains('-') {
            let sep = if s.contains(':') { ':' } else { '-' };
            s.split(sep)
                .map(|part| {
                    u8::from_str_radix(part, 16)
                        .map_err(|_| ParseAddressError::InvalidHex(part.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            if s.len() != 12 {
                return Err(ParseAddressError::InvalidLength(s.len()));
            }
            (0..6)
                .map(|i| {
                    let start = i * 2;
                    u8::from_str_radix(&s[start..start + 2], 16)
                        .map_err(|_| ParseAddressError::InvalidHex(s[start..start + 2].to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        if bytes.len() != 6 {
            return Err(ParseAddressError::InvalidLength(bytes.len()));
        }

        let mut arr = [0u8; 6];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

/// Address type as reported by the controller.
///
/// Classic (BR/EDR) links carry no type distinction; low-energy links
/// distinguish public from random addresses, and the LE credential store
/// keys records by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressType {
    /// Classic BR/EDR address.
    #[default]
    BrEdr,
    /// LE public address.
    LePublic,
    /// LE random (static or private) address.
    LeRandom,
}
