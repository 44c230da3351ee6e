// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Reversible file obfuscation.
//!
//! A fresh 32-entry table of random byte shifts is generated for every
//! write; each payload byte is shifted (wrapping) by the table entry at
//! `position % 32` and the table itself is embedded in the output:
//!
//! ```text
//! OBFS|<32 dash-joined shift values>|<shifted payload bytes>
//! ```
//!
//! This only deters casual inspection and editing of files on disk. It is
//! not cryptography and makes no attempt to be.

use rand::Rng;

use crate::error::SandbankError;

const MASK_LEN: usize = 32;
const SENTINEL: &[u8] = b"OBFS|";

/// Whether file contents look obfuscated. Plain document files are JSON
/// objects, so a leading `O` byte can only be ours.
pub fn looks_obfuscated(contents: &[u8]) -> bool {
    contents.first() == Some(&b'O')
}

/// Obfuscate file text. The output is deliberately bytes, not text: shifted
/// payload bytes are generally not valid UTF-8.
pub fn obfuscate(text: &str) -> Vec<u8> {
    let mask = generate_shift_mask();

    let header: String = mask
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join("-");

    let payload = text.as_bytes();
    let mut out = Vec::with_capacity(SENTINEL.len() + header.len() + 1 + payload.len());
    out.extend_from_slice(SENTINEL);
    out.extend_from_slice(header.as_bytes());
    out.push(b'|');

    for (position, byte) in payload.iter().enumerate() {
        out.push(byte.wrapping_add(mask[position % MASK_LEN]));
    }

    out
}

/// Reverse [`obfuscate`], recovering the original text.
pub fn unobfuscate(contents: &[u8]) -> Result<String, SandbankError> {
    let rest = contents.strip_prefix(SENTINEL).ok_or_else(|| {
        SandbankError::Obfuscation("missing OBFS sentinel".to_string())
    })?;

    let divider = rest
        .iter()
        .position(|&byte| byte == b'|')
        .ok_or_else(|| SandbankError::Obfuscation("missing shift table divider".to_string()))?;

    let header = std::str::from_utf8(&rest[..divider])
        .map_err(|_| SandbankError::Obfuscation("shift table is not ASCII".to_string()))?;

    let mut mask = [0u8; MASK_LEN];
    let mut entries = 0;
    for (slot, part) in header.split('-').enumerate() {
        if slot >= MASK_LEN {
            return Err(SandbankError::Obfuscation("shift table too long".to_string()));
        }
        mask[slot] = part.parse::<u8>().map_err(|_| {
            SandbankError::Obfuscation(format!("bad shift table entry \"{part}\""))
        })?;
        entries += 1;
    }
    if entries != MASK_LEN {
        return Err(SandbankError::Obfuscation(format!(
            "expected {MASK_LEN} shift table entries, found {entries}"
        )));
    }

    let payload = &rest[divider + 1..];
    let bytes: Vec<u8> = payload
        .iter()
        .enumerate()
        .map(|(position, byte)| byte.wrapping_sub(mask[position % MASK_LEN]))
        .collect();

    String::from_utf8(bytes)
        .map_err(|_| SandbankError::Obfuscation("payload is not valid UTF-8".to_string()))
}

fn generate_shift_mask() -> [u8; MASK_LEN] {
    let mut rng = rand::thread_rng();
    let mut mask = [0u8; MASK_LEN];
    for entry in &mut mask {
        *entry = rng.gen();
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_ascii() {
        let text = r#"{"uid": "abc", "health": 100}"#;
        let obfuscated = obfuscate(text);

        assert!(looks_obfuscated(&obfuscated));
        assert_eq!(unobfuscate(&obfuscated).unwrap(), text);
    }

    #[test]
    fn test_round_trip_unicode() {
        let text = "名前: ハンナ 🎮 héllo\nzweite Zeile";
        assert_eq!(unobfuscate(&obfuscate(text)).unwrap(), text);
    }

    #[test]
    fn test_round_trip_empty() {
        assert_eq!(unobfuscate(&obfuscate("")).unwrap(), "");
    }

    #[test]
    fn test_round_trip_embedded_sentinel() {
        // Text that itself contains the sentinel pattern must survive.
        let text = r#"{"note": "OBFS|1-2-3|not a real header"}"#;
        assert_eq!(unobfuscate(&obfuscate(text)).unwrap(), text);
    }

    #[test]
    fn test_output_differs_per_write() {
        // The mask is random per write, so two obfuscations of the same
        // text should (overwhelmingly) differ while decoding identically.
        let text = "same input";
        let first = obfuscate(text);
        let second = obfuscate(text);

        assert_eq!(unobfuscate(&first).unwrap(), text);
        assert_eq!(unobfuscate(&second).unwrap(), text);
        assert_ne!(first, second);
    }

    #[test]
    fn test_plain_json_is_not_detected() {
        assert!(!looks_obfuscated(br#"{"uid": "abc"}"#));
        assert!(!looks_obfuscated(b""));
    }

    #[test]
    fn test_malformed_inputs_error() {
        assert!(unobfuscate(b"plainly not obfuscated").is_err());
        assert!(unobfuscate(b"OBFS|1-2-3|too few entries").is_err());
        assert!(unobfuscate(b"OBFS|no divider at all").is_err());
        assert!(unobfuscate(b"OBFS|999-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1-1|x").is_err());
    }
}
