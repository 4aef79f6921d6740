//! Cryptographic utilities

use std::fs::File;
use std::io::Read;
use std::path::Path;

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::constants::SHA256_BUFSIZE;
use crate::error::{AppResult, IoContext};

/// Generate a cryptographically secure random token
pub fn generate_secure_token(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();

    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Hash a string using SHA-256
pub fn hash_string(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// SHA-256 of a file as lowercase hex, streamed through a fixed buffer
pub fn sha256_file(path: &Path) -> AppResult<String> {
    let mut file = File::open(path).io_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; SHA256_BUFSIZE];

    loop {
        let n = file
            .read(&mut buf)
            .io_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
