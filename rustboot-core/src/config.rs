//! Board geometry and the compiled-in trust anchor.
//!
//! Values here are fixed by the SAM D21 target: a 64-byte NVMCTRL page, a
//! 256-byte row (4 pages), 256 KiB of flash, with the bootloader occupying
//! the first `0x4000` bytes (16 KiB), per the makefile/linker-size reading
//! that the 16 KB loader size implies.

/// Program granule, in bytes.
pub const PAGE: usize = 64;
/// Erase granule, in bytes; always a whole number of pages.
pub const ROW: usize = 4 * PAGE;
/// Inclusive upper bound of legal flash addresses.
pub const FLASH_SIZE: u32 = 256 * 1024;
/// First byte of the application region. Row-aligned.
pub const APP_START: u32 = 0x4000;

/// Bootloader version reported by `HELLO`.
pub const VERSION_MAJOR: u32 = 1;
pub const VERSION_MINOR: u32 = 0;

/// Magic written at `APP_START - 4` once a complete, authenticated image
/// has been installed.
pub const VALID_MAGIC: u32 = 0x55AA_13F0;

/// Compiled-in Ed25519 public key used to verify every incoming image.
///
/// This is a placeholder key for the reference build; a production image
/// replaces this array (or patches it post-link) with the real signing
/// key's compressed point.
pub const PUBLIC_KEY: [u8; 32] = [
    0x3d, 0x40, 0x17, 0xc3, 0xe8, 0x43, 0x89, 0x5a, 0x92, 0xb7, 0x0a, 0xa7, 0x4d, 0x1b, 0x7e, 0xbc,
    0x9c, 0x98, 0x2c, 0xcf, 0x2e, 0xc4, 0x96, 0x8c, 0xc0, 0xcd, 0x55, 0xf1, 0x2a, 0xf4, 0x66, 0x0c,
];

const _: () = assert!(APP_START as usize % ROW == 0);
