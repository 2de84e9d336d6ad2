//! From-scratch Ed25519 verification (C3): field arithmetic, twisted
//! Edwards curve operations, scalar reduction, and the verifier that
//! ties them together.

mod ed25519;
mod edwards;
mod field;
mod scalar;

pub use ed25519::verify;
