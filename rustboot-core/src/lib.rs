//! `rustboot-core`: the portable, `no_std` core of a secure resident
//! firmware loader — the line-and-binary protocol state machine, the
//! flash programming engine, and a from-scratch Ed25519 verification
//! pipeline. Board crates supply a [`rustboot_hal::FlashHal`] impl and
//! drive [`protocol::Protocol`] one byte at a time from their USB
//! CDC-ACM transport; everything else is worked out here.
//!
//! `#[cfg_attr(not(test), no_std)]` rather than a bare `#![no_std]` so
//! that `cargo test` runs the full unit-test surface on the host while
//! the embedded build (via a board crate) stays strictly `no_std`.
#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod crc32;
pub mod crypto;
pub mod error;
pub mod flash;
pub mod protocol;
pub mod sha256;

pub use error::{LoaderError, Result};
