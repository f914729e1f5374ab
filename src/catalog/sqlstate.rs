use thiserror::Error;

/// Length of a textual SQLSTATE code.
pub const SQLSTATE_LEN: usize = 5;

/// Errors that can occur when parsing a textual SQLSTATE.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SqlStateError {
    #[error("sqlstate must be {SQLSTATE_LEN} characters, got {len}: {code:?}")]
    Length { code: String, len: usize },

    #[error("sqlstate {code:?} contains invalid character {ch:?} (expected 0-9 or A-Z)")]
    InvalidChar { code: String, ch: char },
}

const fn six_bit(ch: u8) -> i32 {
    ((ch.wrapping_sub(b'0')) & 0x3F) as i32
}

/// Packs five SQLSTATE characters into the integer form used as event code.
///
/// Each character takes six bits, first character in the low bits.
pub const fn pack(code: &[u8; SQLSTATE_LEN]) -> i32 {
    six_bit(code[0])
        + (six_bit(code[1]) << 6)
        + (six_bit(code[2]) << 12)
        + (six_bit(code[3]) << 18)
        + (six_bit(code[4]) << 24)
}

/// Unpacks an integer code back into its five-character form.
pub fn unpack(packed: i32) -> String {
    let mut out = String::with_capacity(SQLSTATE_LEN);
    let mut v = packed;
    for _ in 0..SQLSTATE_LEN {
        out.push(char::from(((v & 0x3F) as u8).wrapping_add(b'0')));
        v >>= 6;
    }
    out
}

/// Parses and packs a textual SQLSTATE such as `"42P01"`.
pub fn parse(code: &str) -> Result<i32, SqlStateError> {
    let trimmed = code.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() != SQLSTATE_LEN {
        return Err(SqlStateError::Length {
            code: trimmed.to_string(),
            len: trimmed.chars().count(),
        });
    }
    if let Some(ch) = trimmed
        .chars()
        .find(|c| !(c.is_ascii_digit() || c.is_ascii_uppercase()))
    {
        return Err(SqlStateError::InvalidChar {
            code: trimmed.to_string(),
            ch,
        });
    }

    let mut fixed = [0u8; SQLSTATE_LEN];
    fixed.copy_from_slice(bytes);
    Ok(pack(&fixed))
}
