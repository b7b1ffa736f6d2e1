//! Remote device name sanitization.
//!
//! Remote names arrive as raw controller bytes and are not trusted to be
//! valid UTF-8. Invalid input is treated as an ASCII-oriented byte buffer:
//! truncated, scrubbed of non-printable bytes, and trimmed.

/// Maximum remote name length in bytes (management protocol limit).
pub const MAX_NAME_LENGTH: usize = 248;

/// Normalize a remote-supplied device name into a safe display string.
///
/// Valid UTF-8 passes through unmodified. Anything else is truncated at the
/// first NUL and to [`MAX_NAME_LENGTH`] bytes, every byte outside the
/// printable ASCII range (0x20..=0x7E) is replaced with a space, and
/// leading/trailing whitespace is stripped.
pub fn sanitize_remote_name(raw: &[u8]) -> String {
    if let Ok(name) = std::str::from_utf8(raw) {
        return name.to_string();
    }

    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let truncated = &raw[..end.min(MAX_NAME_LENGTH)];

    let scrubbed: String = truncated
        .iter()
        .map(|&b| {
            if (0x20..=0x7e).contains(&b) {
                b as char
            } else {
                ' '
            }
        })
        .collect();

    scrubbed.trim().to_string()
}
