//! Random identifiers: storage ids and share references.

use rand::{rngs::OsRng, Rng, RngCore};

use crate::keys::FileKey;

const BASE62: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Hex string of `byte_length` random bytes (`2 * byte_length` characters).
pub fn generate_id(byte_length: usize) -> String {
    let mut bytes = vec![0u8; byte_length];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Fresh random per-file content key.
pub fn generate_file_key() -> FileKey {
    FileKey::generate()
}

/// Base62 share reference of exactly `length` characters.
pub fn generate_share_reference(length: usize) -> String {
    (0..length)
        .map(|_| BASE62[OsRng.gen_range(0..BASE62.len())] as char)
        .collect()
}
