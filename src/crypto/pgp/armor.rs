//! ASCII armor detection.
//!
//! Armor is recognised from the data itself, never from a caller flag.

use std::io::{self, BufRead};

const ARMOR_HEADER: &[u8] = b"-----BEGIN PGP ";

/// Check whether a byte prefix starts with an OpenPGP armor header line.
///
/// Leading whitespace is ignored.
pub fn looks_armored(prefix: &[u8]) -> bool {
    let start = prefix
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(prefix.len());
    prefix[start..].starts_with(ARMOR_HEADER)
}

/// Peek at a buffered stream without consuming it and report whether it is armored.
///
/// Fails with `UnexpectedEof` on an empty stream.
pub fn sniff_armor<R: BufRead>(reader: &mut R) -> io::Result<bool> {
    let prefix = reader.fill_buf()?;
    if prefix.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "empty OpenPGP stream",
        ));
    }
    Ok(looks_armored(prefix))
}
