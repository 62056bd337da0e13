//! Content-hash tokens for cache-busting asset names.
//!
//! A token is the first 8 bytes of the SHA-256 digest of a file's exact
//! content, written as 10 base62 characters (least significant digit first).
//! Ten characters carry about 60 bits, which is plenty to avoid collisions
//! between the assets of one site while keeping file names short.
//!
//! The token is inserted before the extension, joined with a dot:
//! `styles/site.css` → `styles/site.<token>.css`.

use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;

/// Number of characters in a hash token.
pub const TOKEN_LEN: usize = 10;

const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Hash token of an in-memory byte string.
pub fn hash_token(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    base62(u64::from_be_bytes(prefix))
}

/// Hash token of a file's content.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_token(&bytes))
}

fn base62(mut n: u64) -> String {
    let mut token = String::with_capacity(TOKEN_LEN);
    for _ in 0..TOKEN_LEN {
        token.push(ALPHABET[(n % 62) as usize] as char);
        n /= 62;
    }
    token
}

/// Insert a hash token before the extension of a slash-separated path.
///
/// Paths without an extension get the token appended.
pub fn hashed_name(rel_path: &str, token: &str) -> String {
    let name_start = rel_path.rfind('/').map_or(0, |i| i + 1);
    match rel_path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = name_start + dot;
            format!("{}.{}{}", &rel_path[..dot], token, &rel_path[dot..])
        }
        _ => format!("{rel_path}.{token}"),
    }
}
