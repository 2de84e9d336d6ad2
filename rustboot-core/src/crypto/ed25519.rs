//! Ed25519 signature verification (RFC 8032), orchestrating the field,
//! curve and scalar layers. The only external dependency is `sha2`'s
//! `Sha512`, used exactly as the hash called for by the signature scheme.

use sha2::{Digest, Sha512};

use super::edwards::ExtendedPoint;
use super::scalar::{sc_check, sc_reduce};

/// Verify a 64-byte signature `(R_bytes || s_bytes)` over `message` against
/// a 32-byte compressed public key. Returns `true` iff the signature is
/// valid for this exact message and key.
///
/// Variable-time in the scalar multiplications (acceptable: everything
/// here is public data); the final comparison is constant-time.
pub fn verify(public_key: &[u8; 32], signature: &[u8; 64], message: &[u8]) -> bool {
    let mut r_bytes = [0u8; 32];
    r_bytes.copy_from_slice(&signature[0..32]);
    let mut s_bytes = [0u8; 32];
    s_bytes.copy_from_slice(&signature[32..64]);

    if sc_check(&s_bytes) {
        return false;
    }

    let a_point = match ExtendedPoint::decompress(public_key) {
        Some(p) => p,
        None => return false,
    };

    let basepoint = ExtendedPoint::basepoint();

    let mut hasher = Sha512::new();
    hasher.update(&r_bytes);
    hasher.update(public_key);
    hasher.update(message);
    let hash: [u8; 64] = hasher.finalize().into();
    let k = sc_reduce(&hash);

    let k_times_a = a_point.scalar_mul(&k).negate();
    let s_times_b = basepoint.scalar_mul(&s_bytes);
    let r_prime = s_times_b.add(&k_times_a);

    let r_prime_bytes = r_prime.compress();
    constant_time_eq(&r_prime_bytes, &r_bytes)
}

fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    let mut diff = 0u8;
    for i in 0..32 {
        diff |= a[i] ^ b[i];
    }
    diff == 0
}
