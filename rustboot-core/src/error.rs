//! Error type shared by every layer of the loader core.

use core::fmt;

/// Everything that can go wrong inside the loader core. Flat and `Copy`
/// so it can be threaded through `no_std` code without an allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderError {
    /// A `WRITE`/`DONE` line was missing fields or had an unparseable token.
    BadFormat,
    /// `WRITE` addressed bytes outside `[app_start, FLASH_SIZE)`.
    BadParam,
    /// A write block's declared CRC-32 didn't match the bytes received.
    BadCrc,
    /// Ed25519 verification of the image signature failed.
    BadSignature,
    /// The command line didn't match any known command.
    Unknown,
}

/// The result type used throughout the loader core.
pub type Result<T> = core::result::Result<T, LoaderError>;

impl LoaderError {
    /// The wire reply this error maps onto, LF-terminated, per the
    /// external protocol's reply table.
    pub fn reply(self) -> &'static str {
        match self {
            LoaderError::BadFormat => "ERR FORMAT\n",
            LoaderError::BadParam => "ERR PARAM\n",
            LoaderError::BadCrc => "ERR CRC\n",
            LoaderError::BadSignature => "ERR SIGNATURE\n",
            LoaderError::Unknown => "ERR UNKNOWN\n",
        }
    }
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoaderError::BadFormat => write!(f, "malformed command"),
            LoaderError::BadParam => write!(f, "write range outside application window"),
            LoaderError::BadCrc => write!(f, "block CRC mismatch"),
            LoaderError::BadSignature => write!(f, "Ed25519 verification failed"),
            LoaderError::Unknown => write!(f, "unrecognized command"),
        }
    }
}
