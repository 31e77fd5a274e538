//! Error types for store loading and deck encoding.
//!
//! Per-slot recognition failures (blank cutout, no hash candidates) are not
//! errors; they simply produce no prediction. Errors here are the fail-fast
//! cases: codec contract violations and unusable reference stores.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Errors produced by the deck codec and the reference stores
#[derive(Debug)]
pub enum Error {
    /// A deck submitted for encoding had more than 20 entries
    TooManyCards(usize),
    /// A catalog identifier has no numeric id in the id table
    UnknownCard(String),
    /// A decoded numeric id has no catalog identifier in the id table
    UnknownCardId(i32),
    /// A numeric id fell outside the encodable range [1, 32767]
    IdOutOfRange(i32),
    /// A deck code was not valid base64url
    InvalidDeckCode(base64::DecodeError),
    /// A decoded deck payload had an odd byte length
    OddPayload(usize),
    /// A persisted store had an unexpected format version
    StoreVersion {
        /// Version byte found in the file
        found: u8,
        /// Version this build writes and reads
        expected: u8,
    },
    /// A persisted store was truncated or structurally invalid
    StoreCorrupt(String),
    /// Underlying I/O failure while reading or writing a store
    Io(io::Error),
    /// A reference image failed to decode
    Image(image::ImageError),
    /// A JSON table (id map, rarity map, config) failed to parse
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TooManyCards(n) => {
                write!(f, "deck cannot contain more than 20 cards, got {}", n)
            }
            Error::UnknownCard(id) => write!(f, "no numeric id for card {}", id),
            Error::UnknownCardId(id) => write!(f, "no card for numeric id {}", id),
            Error::IdOutOfRange(id) => {
                write!(f, "card id must be between 1 and 32767, got {}", id)
            }
            Error::InvalidDeckCode(e) => write!(f, "invalid deck code: {}", e),
            Error::OddPayload(len) => {
                write!(f, "deck payload must have even length, got {} bytes", len)
            }
            Error::StoreVersion { found, expected } => write!(
                f,
                "store format version {} does not match {}; rebuild the store",
                found, expected
            ),
            Error::StoreCorrupt(what) => write!(f, "corrupt store: {}", what),
            Error::Io(e) => write!(f, "i/o error: {}", e),
            Error::Image(e) => write!(f, "image error: {}", e),
            Error::Json(e) => write!(f, "json error: {}", e),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::InvalidDeckCode(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Image(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::InvalidDeckCode(e)
    }
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
