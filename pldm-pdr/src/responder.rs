//! PLDM platform responder support
//!
//! Serves Platform Monitoring and Control requests against a caller
//! owned PDR repository. The responder is transport agnostic: the
//! caller parses incoming buffers into [`PldmRequest`]s, hands them to
//! [`Responder::handle`], and delivers the returned response itself.

#[allow(unused)]
use log::{debug, error, info, trace, warn};

use alloc::vec::Vec;

use deku::{DekuContainerWrite, DekuError};
use num_traits::FromPrimitive;

use pldm_base::{
    proto_error, CCode, PldmRequest, PldmResponse, PldmResult,
};

use crate::proto::*;
use crate::repo::Repo;
use crate::{PdrError, PLDM_TYPE_PLATFORM};

/// Responder object for PLDM Platform Monitoring and Control (type 2)
/// commands.
///
/// Repository reads are served as single part transfers; requesters
/// supply a `request_count` large enough for the whole record.
pub struct Responder {
    buf: Vec<u8>,
}

struct PldmCommandError(u8);

impl From<CCode> for PldmCommandError {
    fn from(value: CCode) -> Self {
        Self(value as u8)
    }
}

impl From<u8> for PldmCommandError {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<DekuError> for PldmCommandError {
    fn from(err: DekuError) -> Self {
        let cc = match err {
            DekuError::Incomplete(_) => CCode::ERROR_INVALID_LENGTH,
            DekuError::Parse(_) => CCode::ERROR_INVALID_DATA,
            _ => CCode::ERROR,
        };
        Self(cc as u8)
    }
}

impl From<PdrError> for PldmCommandError {
    fn from(err: PdrError) -> Self {
        let cc = match err {
            PdrError::InvalidLength => CCode::ERROR_INVALID_LENGTH,
            PdrError::InvalidData => CCode::ERROR_INVALID_DATA,
            _ => CCode::ERROR,
        };
        Self(cc as u8)
    }
}

type PldmCommandResult<T> = core::result::Result<T, PldmCommandError>;

impl Responder {
    /// Create a new responder.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Handle an incoming PLDM platform request.
    ///
    /// Returns the response for the caller to deliver. Command failures
    /// are reported through the response completion code; `Err` is only
    /// returned for requests of the wrong PLDM type, which belong to a
    /// different responder.
    pub fn handle(
        &mut self,
        repo: &Repo,
        req: &PldmRequest,
    ) -> PldmResult<PldmResponse<'_>> {
        if req.typ != PLDM_TYPE_PLATFORM {
            return Err(proto_error!("Unexpected pldm platform request"));
        }

        let res = match Cmd::from_u8(req.cmd) {
            Some(Cmd::GetPDRRepositoryInfo) => {
                self.cmd_get_pdr_repository_info(repo, req)
            }
            Some(Cmd::GetPDR) => self.cmd_get_pdr(repo, req),
            Some(Cmd::PlatformEventMessage) => {
                self.cmd_platform_event_message(req)
            }
            _ => Err(CCode::ERROR_UNSUPPORTED_PLDM_CMD.into()),
        };

        Ok(res.unwrap_or_else(|e| {
            let mut r = req.response_borrowed(&[]);
            r.cc = e.0;
            r
        }))
    }

    fn cmd_get_pdr_repository_info(
        &mut self,
        repo: &Repo,
        req: &PldmRequest,
    ) -> PldmCommandResult<PldmResponse<'_>> {
        if !req.data.is_empty() {
            Err(CCode::ERROR_INVALID_LENGTH)?;
        }

        // No update timestamps are maintained, all-zeroes marks them
        // unknown.
        let resp = GetPDRRepositoryInfoResp {
            repository_state: PdrRepositoryState::Available,
            update_time: [0; 13],
            oem_update_time: [0; 13],
            record_count: repo.record_count(),
            repository_size: repo.repo_size() as u32,
            largest_record_size: repo.largest_record_size() as u32,
            data_transfer_handle_timeout: 0,
        };

        self.buf = resp.to_bytes()?;
        Ok(req.response_borrowed(&self.buf))
    }

    fn cmd_get_pdr(
        &mut self,
        repo: &Repo,
        req: &PldmRequest,
    ) -> PldmCommandResult<PldmResponse<'_>> {
        let greq: GetPDRReq = decode_payload(&req.data)?;

        // Single part transfers only
        if greq.data_transfer_handle != 0 {
            Err(plat_codes::INVALID_DATA_TRANSFER_HANDLE)?;
        }
        if greq.transfer_op_flag != TransferOperationFlag::FirstPart {
            Err(plat_codes::INVALID_TRANSFER_OPERATION_FLAG)?;
        }
        if greq.record_change_number != 0 {
            Err(plat_codes::INVALID_RECORD_CHANGE_NUMBER)?;
        }

        let rec = repo
            .find_record(greq.record_handle)
            .ok_or(plat_codes::INVALID_RECORD_HANDLE)?;

        let data = repo.record(rec).data();
        let count = (greq.request_count as usize).min(data.len());
        let record_data = heapless::Vec::from_slice(&data[..count])
            .map_err(|_| CCode::ERROR)?;

        let resp = GetPDRResp {
            next_record_handle: repo.next_record_handle(rec),
            next_data_transfer_handle: 0,
            transfer_flag: TransferFlag::StartAndEnd,
            record_data: record_data.into(),
        };

        self.buf = resp.to_bytes()?;
        Ok(req.response_borrowed(&self.buf))
    }

    fn cmd_platform_event_message(
        &mut self,
        req: &PldmRequest,
    ) -> PldmCommandResult<PldmResponse<'_>> {
        let (ereq, event_data) =
            PlatformEventMessageReq::from_payload(&req.data)?;

        match ereq.event_class {
            event_class::SENSOR_EVENT => {
                let ev: SensorEventData = decode_payload(event_data)?;
                info!("Sensor event from tid {}: {:?}", ereq.tid, ev);
            }
            event_class::PDR_REPOSITORY_CHG_EVENT => {
                let ev: PdrRepositoryChgEventData =
                    decode_payload(event_data)?;
                if ev.event_data_format == ChgEventDataFormat::PdrTypes {
                    Err(CCode::ERROR_INVALID_DATA)?;
                }
                info!(
                    "PDR repository change event from tid {}: {:?}",
                    ereq.tid, ev
                );
            }
            _ => {
                debug!(
                    "Unhandled platform event class {:#04x} from tid {}",
                    ereq.event_class, ereq.tid
                );
                Err(CCode::ERROR_INVALID_DATA)?;
            }
        }

        let resp = PlatformEventMessageResp {
            platform_event_status: PlatformEventStatus::NoLogging,
        };

        self.buf = resp.to_bytes()?;
        Ok(req.response_borrowed(&self.buf))
    }
}

impl Default for Responder {
    fn default() -> Self {
        Self::new()
    }
}
