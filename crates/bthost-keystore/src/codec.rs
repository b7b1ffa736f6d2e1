//! Canonical textual encoding for persisted credential records.
//!
//! Both variants are single-line, space-separated records with fixed field
//! order. Key material is lower-case hex, two characters per byte, bytes
//! left-to-right from the input buffer (no endianness transform); scalar
//! fields are decimal.
//!
//! ```text
//! classic: <key: 32 hex> <key_type: u8> <pin_length: u8>
//! le:      <key: 32 hex> <authenticated: u8> <master: u8> <enc_size: u8> <ediv: u16> <rand: 16 hex>
//! ```
//!
//! The caller knows which variant it wrote; the two are distinguishable by
//! field count. Encoding a well-formed record never fails except under
//! allocation exhaustion; decoding a record produced here reproduces the
//! original bytes exactly.

use bthost_core::error::CodecError;

/// Classic (BR/EDR) link key record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkKey {
    /// 16-byte link key.
    pub key: [u8; 16],
    /// Controller-reported key type (combination, unauthenticated, ...).
    pub key_type: u8,
    /// Length of the PIN used during pairing, 0 if none.
    pub pin_length: u8,
}

/// Low-energy long-term key record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongTermKey {
    /// 16-byte long-term key.
    pub key: [u8; 16],
    /// Nonzero if the key was authenticated (MITM-protected pairing).
    pub authenticated: u8,
    /// Nonzero if the local side was master when the key was exchanged.
    pub master: u8,
    /// Negotiated encryption key size in bytes.
    pub enc_size: u8,
    /// Encrypted diversifier identifying the key.
    pub ediv: u16,
    /// 8-byte random value paired with the EDIV.
    pub rand: [u8; 8],
}

/// Number of space-separated fields in a classic record.
const LINK_KEY_FIELDS: usize = 3;
/// Number of space-separated fields in an LE record.
const LTK_FIELDS: usize = 6;

/// Encode a classic link key record.
pub fn encode_link_key(key: &LinkKey) -> Result<String, CodecError> {
    // "<32 hex> <u8> <u8>" worst case
    let mut out = String::new();
    out.try_reserve(32 + 1 + 3 + 1 + 3)
        .map_err(|_| CodecError::EncodeAllocationFailure)?;

    push_hex(&mut out, &key.key);
    out.push(' ');
    out.push_str(&key.key_type.to_string());
    out.push(' ');
    out.push_str(&key.pin_length.to_string());

    Ok(out)
}

/// Decode a classic link key record.
pub fn decode_link_key(text: &str) -> Result<LinkKey, CodecError> {
    let fields: Vec<&str> = text.split(' ').collect();
    if fields.len() != LINK_KEY_FIELDS {
        return Err(CodecError::FieldCount {
            expected: LINK_KEY_FIELDS,
            got: fields.len(),
        });
    }

    Ok(LinkKey {
        key: parse_hex(fields[0])?,
        key_type: parse_num(fields[1])?,
        pin_length: parse_num(fields[2])?,
    })
}

/// Encode an LE long-term key record.
pub fn encode_long_term_key(key: &LongTermKey) -> Result<String, CodecError> {
    let mut out = String::new();
    out.try_reserve(32 + 16 + 4 * 4 + 6)
        .map_err(|_| CodecError::EncodeAllocationFailure)?;

    push_hex(&mut out, &key.key);
    for field in [
        key.authenticated as u16,
        key.master as u16,
        key.enc_size as u16,
        key.ediv,
    ] {
        out.push(' ');
        out.push_str(&field.to_string());
    }
    out.push(' ');
    push_hex(&mut out, &key.rand);

    Ok(out)
}

/// Decode an LE long-term key record.
pub fn decode_long_term_key(text: &str) -> Result<LongTermKey, CodecError> {
    let fields: Vec<&str> = text.split(' ').collect();
    if fields.len() != LTK_FIELDS {
        return Err(CodecError::FieldCount {
            expected: LTK_FIELDS,
            got: fields.len(),
        });
    }

    Ok(LongTermKey {
        key: parse_hex(fields[0])?,
        authenticated: parse_num(fields[1])?,
        master: parse_num(fields[2])?,
        enc_size: parse_num(fields[3])?,
        ediv: parse_num(fields[4])?,
        rand: parse_hex(fields[5])?,
    })
}

/// Append `bytes` as lower-case hex, two characters per byte.
fn push_hex(out: &mut String, bytes: &[u8]) {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    for &b in bytes {
        out.push(DIGITS[(b >> 4) as usize] as char);
        out.push(DIGITS[(b & 0x0f) as usize] as char);
    }
}

/// Parse a fixed-width lower/upper hex field into an N-byte buffer.
///
/// Works on raw bytes, so a field of the right byte length containing
/// multibyte characters decodes to `InvalidHex` rather than tripping a
/// char-boundary slice.
fn parse_hex<const N: usize>(field: &str) -> Result<[u8; N], CodecError> {
    let raw = field.as_bytes();
    if raw.len() != N * 2 {
        return Err(CodecError::HexLength {
            expected: N * 2,
            got: raw.len(),
        });
    }

    let mut buf = [0u8; N];
    for (byte, pair) in buf.iter_mut().zip(raw.chunks_exact(2)) {
        match (hex_nibble(pair[0]), hex_nibble(pair[1])) {
            (Some(hi), Some(lo)) => *byte = hi << 4 | lo,
            _ => {
                return Err(CodecError::InvalidHex(
                    String::from_utf8_lossy(pair).into_owned(),
                ))
            }
        }
    }
    Ok(buf)
}

fn hex_nibble(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Parse a decimal scalar field.
fn parse_num<T: std::str::FromStr>(field: &str) -> Result<T, CodecError> {
    field
        .parse()
        .map_err(|_| CodecError::InvalidNumber(field.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_link_key() -> LinkKey {
        LinkKey {
            key: [
                0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c,
                0x0d, 0x0e, 0x0f,
            ],
            key_type: 4,
            pin_length: 6,
        }
    }

    fn sample_ltk() -> LongTermKey {
        LongTermKey {
            key: [
                0xde, 0xad, 0xbe, 0xef, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88,
                0x99, 0xaa, 0xbb,
            ],
            authenticated: 1,
            master: 0,
            enc_size: 16,
            ediv: 0x1234,
            rand: [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08],
        }
    }

    mod link_key {
        use super::*;

        #[test]
        fn encode_matches_canonical_layout() {
            let text = encode_link_key(&sample_link_key()).unwrap();
            assert_eq!(text, "000102030405060708090a0b0c0d0e0f 4 6");
        }

        #[test]
        fn hex_is_lower_case() {
            let key = LinkKey {
                key: [0xff; 16],
                key_type: 0,
                pin_length: 0,
            };
            let text = encode_link_key(&key).unwrap();
            assert!(text.starts_with("ffffffffffffffffffffffffffffffff"));
        }

        #[test]
        fn roundtrip() {
            let original = sample_link_key();
            let text = encode_link_key(&original).unwrap();
            assert_eq!(decode_link_key(&text).unwrap(), original);
        }

        #[test]
        fn decode_rejects_wrong_field_count() {
            let err = decode_link_key("00ff 4").unwrap_err();
            assert!(matches!(err, CodecError::FieldCount { expected: 3, got: 2 }));
        }

        #[test]
        fn decode_rejects_short_key() {
            let err = decode_link_key("00ff 4 6").unwrap_err();
            assert!(matches!(err, CodecError::HexLength { expected: 32, .. }));
        }

        #[test]
        fn decode_rejects_bad_hex() {
            let err =
                decode_link_key("zz0102030405060708090a0b0c0d0e0f 4 6").unwrap_err();
            assert!(matches!(err, CodecError::InvalidHex(_)));
        }

        #[test]
        fn decode_rejects_multibyte_key_of_matching_byte_length() {
            // Ten three-byte characters plus "ab" is 32 bytes, the same as a
            // well-formed key field; it must decode to an error, not panic.
            let err = decode_link_key("€€€€€€€€€€ab 4 6").unwrap_err();
            assert!(matches!(err, CodecError::InvalidHex(_)));
        }

        #[test]
        fn decode_rejects_out_of_range_scalar() {
            let err =
                decode_link_key("000102030405060708090a0b0c0d0e0f 300 6").unwrap_err();
            assert!(matches!(err, CodecError::InvalidNumber(_)));
        }
    }

    mod long_term_key {
        use super::*;

        #[test]
        fn encode_matches_canonical_layout() {
            let text = encode_long_term_key(&sample_ltk()).unwrap();
            assert_eq!(
                text,
                "deadbeef00112233445566778899aabb 1 0 16 4660 0102030405060708"
            );
        }

        #[test]
        fn roundtrip() {
            let original = sample_ltk();
            let text = encode_long_term_key(&original).unwrap();
            assert_eq!(decode_long_term_key(&text).unwrap(), original);
        }

        #[test]
        fn roundtrip_extreme_values() {
            let original = LongTermKey {
                key: [0xff; 16],
                authenticated: 255,
                master: 1,
                enc_size: 255,
                ediv: u16::MAX,
                rand: [0xff; 8],
            };
            let text = encode_long_term_key(&original).unwrap();
            assert_eq!(decode_long_term_key(&text).unwrap(), original);
        }

        #[test]
        fn byte_order_preserved_left_to_right() {
            let mut ltk = sample_ltk();
            ltk.key = [
                0x0a, 0x0b, 0x0c, 0x0d, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
            ];
            let text = encode_long_term_key(&ltk).unwrap();
            assert!(text.starts_with("0a0b0c0d"));
        }

        #[test]
        fn decode_rejects_wrong_field_count() {
            let err = decode_long_term_key("00 1 0 16 4660").unwrap_err();
            assert!(matches!(err, CodecError::FieldCount { expected: 6, got: 5 }));
        }

        #[test]
        fn decode_rejects_short_rand() {
            let err = decode_long_term_key(
                "deadbeef00112233445566778899aabb 1 0 16 4660 010203",
            )
            .unwrap_err();
            assert!(matches!(err, CodecError::HexLength { expected: 16, .. }));
        }

        #[test]
        fn variants_distinguishable_by_field_count() {
            let classic = encode_link_key(&sample_link_key()).unwrap();
            let le = encode_long_term_key(&sample_ltk()).unwrap();
            assert!(decode_long_term_key(&classic).is_err());
            assert_eq!(le.split(' ').count(), 6);
            assert_eq!(classic.split(' ').count(), 3);
        }
    }
}
