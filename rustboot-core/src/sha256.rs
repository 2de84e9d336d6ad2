//! Streaming SHA-256 (FIPS 180-4), over the image bytes.
//!
//! Implemented as a thin facade over `sha2`'s `Sha256`, which already
//! carries the eight working words, 64-byte partial-block buffer, fill
//! count and length counter the data model calls for; we just expose the
//! `init`/`update`/`finalize` shape the rest of the core expects.

use sha2::{Digest, Sha256};

#[derive(Clone)]
pub struct Hasher(Sha256);

impl Hasher {
    /// Start a new hash context.
    pub fn init() -> Self {
        Hasher(Sha256::new())
    }

    /// Feed more bytes into the running hash. May be called any number of
    /// times with any split of the input; `update(a); update(b)` is
    /// equivalent to a single `update(a ++ b)`.
    pub fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    /// Consume the context and emit the 32-byte digest.
    pub fn finalize(self) -> [u8; 32] {
        self.0.finalize().into()
    }

    /// Emit the digest over the bytes streamed so far without disturbing
    /// the running state, so a caller that isn't ready to commit to
    /// finishing the hash yet (e.g. `DONE` hasn't verified its signature)
    /// can retry without re-streaming the image.
    pub fn finalize_peek(&self) -> [u8; 32] {
        self.0.clone().finalize().into()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::init()
    }
}
