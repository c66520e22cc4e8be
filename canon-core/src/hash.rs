//! Content hasher.
//!
//! A SHA-256 digest over the raw bytes is the only identity signal for a
//! managed file: equal digests mean equal content, nothing else is compared.

use sha2::{Digest, Sha256};

use crate::types::ContentHash;

/// Hash `content` into a 64-character lowercase hex [`ContentHash`].
pub fn content_hash(content: impl AsRef<[u8]>) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content.as_ref());
    ContentHash(hex::encode(hasher.finalize()))
}
