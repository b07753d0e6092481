// SPDX-License-Identifier: MIT OR Apache-2.0
/*
 * PLDM base message definitions.
 *
 * Copyright (c) 2023 Code Construct
 */

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Platform Level Data Model (PLDM) base protocol support
//!
//! This crate implements some base communication primitives for PLDM,
//! used to construct higher-level PLDM messaging applications. It is
//! transport-agnostic; messages are serialised to and parsed from caller
//! provided byte buffers.

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use num_derive::FromPrimitive;

pub mod util;

pub use util::VecOrSlice;
use util::{NoneNoSpace, SliceWriter};

/// Maximum size of a PLDM message, defining our buffer sizes.
///
/// The `pldm-base` crate currently has a maximum message size.
pub const PLDM_MAX_MSGSIZE: usize = 1024;

/// Generic PLDM error type
#[derive(Debug)]
pub enum PldmError {
    /// PLDM protocol error
    Protocol(&'static str),
    /// The remote endpoint rejected the command with a completion code
    CCode(u8),
    /// Provided buffer is too small
    NoSpace,
    /// Message encode or decode failure
    Format(deku::DekuError),
}

impl core::fmt::Display for PldmError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::Protocol(s) => write!(fmt, "PLDM protocol error: {s}"),
            Self::CCode(cc) => {
                write!(fmt, "PLDM command failed, cc {cc:#04x}")
            }
            Self::Format(e) => write!(fmt, "PLDM format error: {e}"),
            _ => write!(fmt, "PLDM error: {self:?}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PldmError {}

impl From<deku::DekuError> for PldmError {
    fn from(e: deku::DekuError) -> Self {
        Self::Format(e)
    }
}

/// Constructs a [`PldmError::Protocol`] from a static description.
///
/// Optional further format arguments are logged at debug level rather
/// than carried in the error, keeping the error type allocation-free.
#[macro_export]
macro_rules! proto_error {
    ($msg:expr) => {
        $crate::PldmError::Protocol($msg)
    };
    ($msg:expr, $($arg:tt)+) => {
        {
            ::log::debug!(concat!($msg, ": {}"), format_args!($($arg)+));
            $crate::PldmError::Protocol($msg)
        }
    };
}

/// PLDM protocol return type
pub type Result<T> = core::result::Result<T, PldmError>;

/// Alias for [`Result`], useful where other `Result` types are in scope
pub type PldmResult<T> = Result<T>;

/// PLDM base completion codes
#[repr(u8)]
#[allow(non_camel_case_types)]
#[allow(missing_docs)]
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive)]
pub enum CCode {
    SUCCESS = 0,
    ERROR = 1,
    ERROR_INVALID_DATA = 2,
    ERROR_INVALID_LENGTH = 3,
    ERROR_NOT_READY = 4,
    ERROR_UNSUPPORTED_PLDM_CMD = 5,
    ERROR_INVALID_PLDM_TYPE = 32,
}

/// Converts a PLDM completion code into a `Result`
///
/// A non-success code becomes [`PldmError::CCode`]. Note that command
/// specific completion codes need handling at the caller, this helper
/// reports them all as errors.
pub fn ccode_result(cc: u8) -> Result<()> {
    if cc == CCode::SUCCESS as u8 {
        Ok(())
    } else {
        Err(PldmError::CCode(cc))
    }
}

/// Base PLDM request type
#[derive(Debug)]
pub struct PldmRequest<'a> {
    /// PLDM Instance ID
    pub iid: u8,
    /// PLDM type
    pub typ: u8,
    /// PLDM command code
    pub cmd: u8,
    /// PLDM command data payload
    pub data: VecOrSlice<'a, u8>,
}

impl<'a> PldmRequest<'a> {
    /// Create a new PLDM request for a given PLDM message type and command
    /// number, borrowing the payload.
    pub fn new_borrowed(typ: u8, cmd: u8, data: &'a [u8]) -> Self {
        Self {
            iid: 0,
            typ,
            cmd,
            data: data.into(),
        }
    }

    /// Create a new PLDM request with an owned payload.
    #[cfg(feature = "alloc")]
    pub fn new_owned(typ: u8, cmd: u8, data: Vec<u8>) -> PldmRequest<'static> {
        PldmRequest {
            iid: 0,
            typ,
            cmd,
            data: data.into(),
        }
    }

    /// Parse a PLDM message buffer as a request.
    ///
    /// `data` starts at the PLDM message header, with any transport
    /// framing already removed.
    pub fn from_buf_borrowed(data: &'a [u8]) -> Result<Self> {
        if data.len() < 3 {
            return Err(proto_error!(
                "Short PLDM request",
                "{} bytes",
                data.len()
            ));
        }

        let iid = data[0] & 0x1f;
        let typ = data[1] & 0x3f;
        let cmd = data[2];

        Ok(Self {
            iid,
            typ,
            cmd,
            data: (&data[3..]).into(),
        })
    }

    /// Set the data payload for this request
    #[cfg(feature = "alloc")]
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data.into();
    }

    /// Convert this request to a response, borrowing the response payload.
    ///
    /// Uses the instance, type and command from the original request, and
    /// a success completion code.
    pub fn response_borrowed<'b>(&self, data: &'b [u8]) -> PldmResponse<'b> {
        PldmResponse {
            iid: self.iid,
            typ: self.typ,
            cmd: self.cmd,
            cc: 0,
            data: data.into(),
        }
    }
}

/// Base PLDM response type
#[derive(Debug)]
pub struct PldmResponse<'a> {
    /// PLDM Instance ID
    pub iid: u8,
    /// PLDM type
    pub typ: u8,
    /// PLDM command code (defined by the original request)
    pub cmd: u8,
    /// PLDM completion code
    pub cc: u8,
    /// PLDM response data payload. Does not include the cc field.
    pub data: VecOrSlice<'a, u8>,
}

impl<'a> PldmResponse<'a> {
    /// Parse a PLDM message buffer as the response to a given request.
    ///
    /// Checks the instance ID, type and command against the request, as a
    /// transport would after a transfer completes.
    pub fn from_buf_borrowed(
        req: &PldmRequest,
        data: &'a [u8],
    ) -> Result<Self> {
        if data.len() < 4 {
            return Err(proto_error!(
                "Short PLDM response",
                "{} bytes",
                data.len()
            ));
        }

        let iid = data[0] & 0x1f;
        let typ = data[1] & 0x3f;
        let cmd = data[2];
        let cc = data[3];

        if iid != req.iid {
            return Err(proto_error!(
                "Incorrect instance ID in reply",
                "expected {:#04x} got {:#04x}",
                req.iid,
                iid
            ));
        }

        if typ != req.typ {
            return Err(proto_error!(
                "Incorrect PLDM type in reply",
                "expected {:#04x} got {:#04x}",
                req.typ,
                typ
            ));
        }

        if cmd != req.cmd {
            return Err(proto_error!(
                "Incorrect PLDM command in reply",
                "expected {:#04x} got {:#04x}",
                req.cmd,
                cmd
            ));
        }

        Ok(Self {
            iid,
            typ,
            cmd,
            cc,
            data: (&data[4..]).into(),
        })
    }
}

/// Serialise a request into `buf`, prepending the PLDM message header.
///
/// Returns the written portion of `buf`.
pub fn pldm_req_buf<'f>(
    req: &PldmRequest,
    buf: &'f mut [u8],
) -> Result<&'f [u8]> {
    let mut w = SliceWriter::new(buf);
    w.push_le8(1 << 7 | (req.iid & 0x1f)).space()?;
    w.push_le8(req.typ & 0x3f).space()?;
    w.push_le8(req.cmd).space()?;
    w.push(&req.data).space()?;
    Ok(w.done())
}

/// Serialise a response into `buf`, prepending the PLDM message header
/// and completion code.
///
/// Returns the written portion of `buf`.
pub fn pldm_resp_buf<'f>(
    resp: &PldmResponse,
    buf: &'f mut [u8],
) -> Result<&'f [u8]> {
    let mut w = SliceWriter::new(buf);
    w.push_le8(resp.iid).space()?;
    w.push_le8(resp.typ).space()?;
    w.push_le8(resp.cmd).space()?;
    w.push_le8(resp.cc).space()?;
    w.push(&resp.data).space()?;
    Ok(w.done())
}
