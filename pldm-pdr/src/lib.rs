#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
pub mod entity;
pub mod proto;
#[cfg(feature = "alloc")]
pub mod record;
#[cfg(feature = "alloc")]
pub mod repo;
#[cfg(feature = "alloc")]
pub mod responder;
pub mod state_sets;

pub const PLDM_TYPE_PLATFORM: u8 = 2;

/// Re-export of `deku` for consumers of the wire types
pub use deku;
/// Re-export of `heapless::Vec`
pub use heapless::Vec;

use deku::DekuError;

/// PDR repository and codec error type
#[derive(Debug, PartialEq)]
pub enum PdrError {
    /// Malformed or out-of-range field data
    InvalidData,
    /// Data shorter or longer than the format requires
    InvalidLength,
    /// Other wire format encode or decode failure
    Format(DekuError),
}

impl core::fmt::Display for PdrError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Format(e) => write!(fmt, "PDR format error: {e}"),
            _ => write!(fmt, "PDR error: {self:?}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PdrError {}

impl From<DekuError> for PdrError {
    fn from(err: DekuError) -> Self {
        match err {
            DekuError::Incomplete(_) => Self::InvalidLength,
            DekuError::Parse(_) => Self::InvalidData,
            DekuError::Assertion(_) => Self::InvalidData,
            DekuError::InvalidParam(_) => Self::InvalidData,
            e => Self::Format(e),
        }
    }
}

/// PDR operation return type
pub type Result<T> = core::result::Result<T, PdrError>;
