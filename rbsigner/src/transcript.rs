//! Builds the wire-format byte stream a host would replay verbatim over
//! the loader's CDC-ACM port: `ERASE APP`, one or more `WRITE <addr> <len>
//! <crc32>` blocks carrying the image in chunks, and a final `DONE
//! <128-hex-sig>` once the whole image has been hashed and signed.
//!
//! Reuses `rustboot_core`'s own CRC-32 and SHA-256 so the transcript's
//! checksums and digest are produced by the exact same code the loader
//! runs them back through — there is no second implementation to drift
//! out of sync with the device.

use ed25519_dalek::{Keypair, Signer};

use rustboot_core::crc32::crc32;
use rustboot_core::sha256::Hasher;

/// Default per-`WRITE` block size. Arbitrary but modest: large enough to
/// keep the transcript's command overhead small, small enough that a
/// single dropped byte mid-block only costs one retransmit.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Build the full transcript for `image`, to be programmed starting at
/// `base_addr`, signed with `keypair`.
pub fn build_transcript(image: &[u8], base_addr: u32, block_size: usize, keypair: &Keypair) -> Vec<u8> {
    let block_size = block_size.max(1);
    let mut out = Vec::with_capacity(image.len() + image.len() / block_size * 32 + 256);
    out.extend_from_slice(b"ERASE APP\n");

    let mut hasher = Hasher::init();
    let mut addr = base_addr;
    for chunk in image.chunks(block_size) {
        hasher.update(chunk);
        let crc = crc32(chunk);
        out.extend_from_slice(format!("WRITE 0x{:08X} {} 0x{:08X}\n", addr, chunk.len(), crc).as_bytes());
        out.extend_from_slice(chunk);
        addr += chunk.len() as u32;
    }

    let digest = hasher.finalize();
    let signature = keypair.sign(&digest);
    let hex: String = signature.to_bytes().iter().map(|b| format!("{:02x}", b)).collect();
    out.extend_from_slice(format!("DONE {}\n", hex).as_bytes());
    out
}
