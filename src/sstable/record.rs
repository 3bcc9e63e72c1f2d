//! Record encoding for the SSTable data region.
//!
//! ```text
//! ┌──────┬─────────────┬──────┬───────────────┬──────┬─────────────┬─────
//! │ 0x00 │ key bytes   │ 0x01 │ value bytes   │ 0x00 │ key bytes   │ ...
//! └──────┴─────────────┴──────┴───────────────┴──────┴─────────────┴─────
//! ```
//!
//! A record has no length fields: the next record's `KEY_DELIM` ends the
//! value, and the last value runs up to the start of the filter blob. That
//! is what lets a reader land on an arbitrary byte offset and realign by
//! scanning forward for the next `KEY_DELIM`.
//!
//! Key and value bytes are escaped so the delimiters never occur inside them:
//!
//! | raw  | stored      |
//! |------|-------------|
//! | 0x00 | 0x02 0x10   |
//! | 0x01 | 0x02 0x11   |
//! | 0x02 | 0x02 0x12   |
//!
//! Any other byte is stored as is, so text keys and values are written
//! verbatim.

use crate::types::{Key, Value};

/// Marks the start of a record (and the end of the previous value).
pub const KEY_DELIM: u8 = 0x00;
/// Separates a record's key from its value.
pub const VALUE_DELIM: u8 = 0x01;
/// Introduces a two-byte escape sequence.
pub const ESCAPE: u8 = 0x02;

const ESCAPE_SHIFT: u8 = 0x10;

/// Append one encoded record to `out`.
pub fn encode_record(key: &[u8], value: &[u8], out: &mut Vec<u8>) {
    out.push(KEY_DELIM);
    escape_into(key, out);
    out.push(VALUE_DELIM);
    escape_into(value, out);
}

/// Decode a record body: everything between a `KEY_DELIM` and the next one
/// (or the end of the data region), delimiter excluded.
///
/// Returns `None` if the body has no `VALUE_DELIM` or a broken escape.
pub fn decode_body(body: &[u8]) -> Option<(Key, Value)> {
    let split = body.iter().position(|b| *b == VALUE_DELIM)?;
    let key = unescape(&body[..split])?;
    let value = unescape(&body[split + 1..])?;
    Some((key, value))
}

fn escape_into(bytes: &[u8], out: &mut Vec<u8>) {
    out.reserve(bytes.len());
    for &b in bytes {
        if b <= ESCAPE {
            out.push(ESCAPE);
            out.push(b + ESCAPE_SHIFT);
        } else {
            out.push(b);
        }
    }
}

fn unescape(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter();
    while let Some(&b) = iter.next() {
        match b {
            ESCAPE => {
                let escaped = iter.next()?.checked_sub(ESCAPE_SHIFT)?;
                if escaped > ESCAPE {
                    return None;
                }
                out.push(escaped);
            }
            KEY_DELIM | VALUE_DELIM => return None,
            _ => out.push(b),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_stored_verbatim() {
        let mut out = Vec::new();
        encode_record(b"apple", b"red", &mut out);
        assert_eq!(out, b"\x00apple\x01red");
    }

    #[test]
    fn delimiter_bytes_are_escaped() {
        let mut out = Vec::new();
        encode_record(&[0x00, b'k'], &[0x01, 0x02], &mut out);
        assert_eq!(out, vec![0x00, 0x02, 0x10, b'k', 0x01, 0x02, 0x11, 0x02, 0x12]);
        assert!(!out[1..].contains(&KEY_DELIM));
    }

    #[test]
    fn decode_body_reverses_encoding() {
        let mut out = Vec::new();
        encode_record(&[0x00, 0x01, 0x02, 0xFF], b"", &mut out);
        let (key, value) = decode_body(&out[1..]).unwrap();
        assert_eq!(key, vec![0x00, 0x01, 0x02, 0xFF]);
        assert!(value.is_empty());
    }

    #[test]
    fn body_without_value_delim_is_rejected() {
        assert_eq!(decode_body(b"dangling"), None);
    }

    #[test]
    fn broken_escape_is_rejected() {
        assert_eq!(decode_body(&[b'k', 0x02, 0x01, b'v']), None);
        assert_eq!(decode_body(&[b'k', 0x01, b'v', 0x02]), None);
        assert_eq!(decode_body(&[b'k', 0x01, 0x02, 0x42]), None);
    }
}
