use core::{marker::PhantomData, num::ParseIntError, str::FromStr};

#[allow(unused)]
use log::{debug, error, info, trace, warn};

use core::fmt::Debug;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use deku::{
    ctx::Limit, deku_derive, writer::Writer, DekuContainerRead, DekuEnumExt,
    DekuError, DekuRead, DekuReader, DekuWrite, DekuWriter,
};

use crate::{PdrError, Result};

/// PLDM Platform Commands
#[allow(missing_docs)]
#[derive(FromPrimitive, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Cmd {
    PlatformEventMessage = 0x0A,
    GetSensorReading = 0x11,
    GetStateSensorReadings = 0x21,
    SetNumericEffecterValue = 0x31,
    GetNumericEffecterValue = 0x32,
    SetStateEffecterStates = 0x39,
    GetPDRRepositoryInfo = 0x50,
    GetPDR = 0x51,
}

/// Command specific completion codes for the platform subtype
#[allow(missing_docs)]
pub mod plat_codes {
    pub const INVALID_SENSOR_ID: u8 = 0x80;
    pub const INVALID_EFFECTER_ID: u8 = 0x80;
    pub const INVALID_STATE_VALUE: u8 = 0x81;
    pub const SET_EFFECTER_UNSUPPORTED_SENSORSTATE: u8 = 0x82;
    pub const INVALID_DATA_TRANSFER_HANDLE: u8 = 0x80;
    pub const INVALID_TRANSFER_OPERATION_FLAG: u8 = 0x81;
    pub const INVALID_RECORD_HANDLE: u8 = 0x82;
    pub const INVALID_RECORD_CHANGE_NUMBER: u8 = 0x83;
    pub const TRANSFER_TIMEOUT: u8 = 0x84;
}

/// Platform event classes
#[allow(missing_docs)]
pub mod event_class {
    pub const SENSOR_EVENT: u8 = 0x00;
    pub const EFFECTER_EVENT: u8 = 0x01;
    pub const REDFISH_TASK_EXECUTED_EVENT: u8 = 0x02;
    pub const REDFISH_MESSAGE_EVENT: u8 = 0x03;
    pub const PDR_REPOSITORY_CHG_EVENT: u8 = 0x04;
    pub const MESSAGE_POLL_EVENT: u8 = 0x05;
    pub const HEARTBEAT_TIMER_ELAPSED_EVENT: u8 = 0x06;
    pub const OEM_EVENT_MIN: u8 = 0xf0;
    pub const OEM_EVENT_MAX: u8 = 0xfe;
}

/// Standard event classes plus the OEM reserved band
pub fn valid_event_class(class: u8) -> bool {
    class <= event_class::HEARTBEAT_TIMER_ELAPSED_EVENT
        || (event_class::OEM_EVENT_MIN..=event_class::OEM_EVENT_MAX).contains(&class)
}

/// Decode a whole payload as one message.
///
/// Every payload byte must be consumed by the message.
pub fn decode_payload<'a, T: DekuContainerRead<'a>>(payload: &'a [u8]) -> Result<T> {
    let ((rest, _), v) = T::from_bytes((payload, 0))?;
    if !rest.is_empty() {
        return Err(PdrError::InvalidLength);
    }
    Ok(v)
}

// repr(u8) doesn't mix with data-carrying variants for Deku
#[derive(Debug, Eq, PartialEq, Hash, Clone, DekuWrite, DekuRead)]
#[deku(endian = "little", ctx = "data_size: u8", id = "data_size")]
pub enum SensorData {
    #[deku(id = 0)]
    U8(u8),
    #[deku(id = 1)]
    I8(i8),
    #[deku(id = 2)]
    U16(u16),
    #[deku(id = 3)]
    I16(i16),
    #[deku(id = 4)]
    U32(u32),
    #[deku(id = 5)]
    I32(i32),
}

#[derive(Debug, Eq, PartialEq, Hash, Clone, DekuWrite, DekuRead)]
#[deku(endian = "little", ctx = "data_size: u8", id = "data_size")]
pub enum EffecterData {
    #[deku(id = 0)]
    U8(u8),
    #[deku(id = 1)]
    I8(i8),
    #[deku(id = 2)]
    U16(u16),
    #[deku(id = 3)]
    I16(i16),
    #[deku(id = 4)]
    U32(u32),
    #[deku(id = 5)]
    I32(i32),
}

#[allow(missing_docs)]
#[derive(
    FromPrimitive, Debug, PartialEq, Eq, Copy, Clone, DekuRead, DekuWrite,
)]
#[deku(id_type = "u8")]
#[repr(u8)]
pub enum SensorOperationalState {
    Enabled = 0,
    Disabled,
    Unavailable,
    StatusUnknown,
    Failed,
    Initializing,
    ShuttingDown,
    InTest,
}

#[allow(missing_docs)]
#[derive(
    FromPrimitive, Debug, PartialEq, Eq, Copy, Clone, DekuRead, DekuWrite,
)]
#[deku(id_type = "u8")]
#[repr(u8)]
pub enum EffecterOperationalState {
    EnabledUpdatePending = 0,
    EnabledNoUpdatePending,
    Disabled,
    Unavailable,
    StatusUnknown,
    Failed,
    Initializing,
    ShuttingDown,
    InTest,
}

#[allow(missing_docs)]
#[derive(
    FromPrimitive, Debug, PartialEq, Eq, Copy, Clone, DekuRead, DekuWrite,
)]
#[deku(id_type = "u8")]
#[repr(u8)]
pub enum SensorEventMessageEnable {
    NoEventGeneration = 0,
    EventsDisabled,
    EventsEnabled,
    OpEventsOnlyEnabled,
    StateEventsOnlyEnabled,
}

#[allow(missing_docs)]
#[derive(
    FromPrimitive, Debug, PartialEq, Eq, Copy, Clone, DekuRead, DekuWrite,
)]
#[deku(id_type = "u8")]
#[repr(u8)]
pub enum SensorState {
    Unknown = 0,
    Normal,
    Warning,
    Critical,
    Fatal,
    LowerWarning,
    LowerCritical,
    LowerFatal,
    UpperWarning,
    UpperCritical,
    UpperFatal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VecWrap<T, const N: usize>(pub heapless::Vec<T, N>);

impl<T, const N: usize> From<heapless::Vec<T, N>> for VecWrap<T, N> {
    fn from(value: heapless::Vec<T, N>) -> Self {
        Self(value)
    }
}

impl<T, const N: usize> core::ops::Deref for VecWrap<T, N> {
    type Target = heapless::Vec<T, N>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T, const N: usize> core::ops::DerefMut for VecWrap<T, N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<'a, T, Predicate, Ctx, const N: usize>
    DekuReader<'a, (Limit<T, Predicate>, Ctx)> for VecWrap<T, N>
where
    Predicate: FnMut(&T) -> bool,
    Ctx: Copy,
    T: DekuReader<'a, Ctx>,
{
    fn from_reader_with_ctx<
        R: deku::no_std_io::Read + deku::no_std_io::Seek,
    >(
        reader: &mut deku::reader::Reader<R>,
        (limit, ctx): (Limit<T, Predicate>, Ctx),
    ) -> core::result::Result<Self, DekuError> {
        let Limit::Count(count) = limit else {
            return Err(DekuError::Assertion(
                "Only count implemented for heapless::Vec".into(),
            ));
        };

        let mut v = heapless::Vec::new();
        for _ in 0..count {
            v.push(T::from_reader_with_ctx(reader, ctx)?).map_err(|_| {
                DekuError::InvalidParam("Too many elements".into())
            })?
        }

        Ok(VecWrap(v))
    }
}

impl<T, Ctx, const N: usize> DekuWriter<Ctx> for VecWrap<T, N>
where
    T: DekuWriter<Ctx>,
    Ctx: Copy,
{
    fn to_writer<W: deku::no_std_io::Write + deku::no_std_io::Seek>(
        &self,
        writer: &mut Writer<W>,
        ctx: Ctx,
    ) -> core::result::Result<(), DekuError> {
        self.0.to_writer(writer, ctx)
    }
}

#[derive(Debug, DekuRead, DekuWrite, PartialEq, Eq, Clone, Copy)]
#[deku(endian = "little")]
pub struct SensorId(pub u16);

impl FromStr for SensorId {
    type Err = ParseIntError;
    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        Ok(Self(if let Some(s) = s.strip_prefix("0x") {
            u16::from_str_radix(s, 16)
        } else {
            s.parse()
        }?))
    }
}

#[derive(Debug, DekuRead, DekuWrite, PartialEq, Eq, Clone, Copy)]
#[deku(endian = "little")]
pub struct EffecterId(pub u16);

impl FromStr for EffecterId {
    type Err = ParseIntError;
    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        Ok(Self(if let Some(s) = s.strip_prefix("0x") {
            u16::from_str_radix(s, 16)
        } else {
            s.parse()
        }?))
    }
}

#[allow(missing_docs)]
#[derive(
    FromPrimitive, Debug, PartialEq, Eq, Copy, Clone, DekuRead, DekuWrite,
)]
#[deku(id_type = "u8")]
#[repr(u8)]
pub enum TransferOperationFlag {
    GetNextPart = 0,
    FirstPart = 1,
}

#[allow(missing_docs)]
#[derive(
    FromPrimitive, Debug, PartialEq, Eq, Copy, Clone, DekuRead, DekuWrite,
)]
#[deku(id_type = "u8")]
#[repr(u8)]
pub enum TransferFlag {
    Start = 1,
    Middle = 2,
    End = 4,
    StartAndEnd = 5,
}

#[allow(missing_docs)]
#[derive(
    FromPrimitive, Debug, PartialEq, Eq, Copy, Clone, DekuRead, DekuWrite,
)]
#[deku(id_type = "u8")]
#[repr(u8)]
pub enum PdrRepositoryState {
    Available = 0,
    UpdateInProgress = 1,
    Failed = 2,
}

/// Largest record data transfer carried in one GetPDR response
pub const PDR_RECORD_DATA_MAX: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
pub struct GetPDRReq {
    #[deku(endian = "little")]
    pub record_handle: u32,
    #[deku(endian = "little")]
    pub data_transfer_handle: u32,
    pub transfer_op_flag: TransferOperationFlag,
    #[deku(endian = "little")]
    pub request_count: u16,
    #[deku(endian = "little")]
    pub record_change_number: u16,
}

#[deku_derive(DekuRead, DekuWrite)]
#[derive(Debug, Clone, PartialEq)]
pub struct GetPDRResp {
    #[deku(endian = "little")]
    pub next_record_handle: u32,
    #[deku(endian = "little")]
    pub next_data_transfer_handle: u32,
    pub transfer_flag: TransferFlag,
    #[deku(temp, temp_value = "self.record_data.len() as u16", endian = "little")]
    response_count: u16,
    #[deku(count = "response_count")]
    pub record_data: VecWrap<u8, PDR_RECORD_DATA_MAX>,
}

impl GetPDRResp {
    /// Decode a response payload.
    ///
    /// An `End` transfer carries a trailing CRC-8 over the whole record,
    /// returned alongside. Other transfer flags must not carry one.
    pub fn from_payload(payload: &[u8]) -> Result<(Self, Option<u8>)> {
        let ((rest, _), resp) = Self::from_bytes((payload, 0))?;
        let crc = match (resp.transfer_flag, rest) {
            (TransferFlag::End, [crc]) => Some(*crc),
            (TransferFlag::End, _) => return Err(PdrError::InvalidLength),
            (_, []) => None,
            _ => return Err(PdrError::InvalidLength),
        };
        Ok((resp, crc))
    }
}

/// CRC-8 over multipart record data, polynomial 0x07
pub fn crc8(data: &[u8]) -> u8 {
    crc::Crc::<u8>::new(&crc::CRC_8_SMBUS).checksum(data)
}

#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
pub struct GetPDRRepositoryInfoResp {
    pub repository_state: PdrRepositoryState,
    pub update_time: [u8; 13],
    pub oem_update_time: [u8; 13],
    #[deku(endian = "little")]
    pub record_count: u32,
    #[deku(endian = "little")]
    pub repository_size: u32,
    #[deku(endian = "little")]
    pub largest_record_size: u32,
    pub data_transfer_handle_timeout: u8,
}

#[allow(missing_docs)]
#[derive(
    FromPrimitive, Debug, PartialEq, Eq, Copy, Clone, DekuRead, DekuWrite,
)]
#[deku(id_type = "u8")]
#[repr(u8)]
pub enum SetRequest {
    NoChange = 0,
    RequestSet = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, DekuRead, DekuWrite)]
pub struct SetStateField {
    pub set_request: SetRequest,
    pub effecter_state: u8,
}

#[deku_derive(DekuRead, DekuWrite)]
#[derive(Debug, Clone, PartialEq)]
pub struct SetStateEffecterStatesReq {
    pub effecter: EffecterId,
    #[deku(temp, temp_value = "self.fields.len() as u8")]
    comp_effecter_count: u8,
    #[deku(count = "comp_effecter_count")]
    pub fields: VecWrap<SetStateField, 8>,
}

impl SetStateEffecterStatesReq {
    /// Decode a request payload, requiring 1 to 8 composite fields
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let req: Self = decode_payload(payload)?;
        if req.fields.is_empty() {
            return Err(PdrError::InvalidData);
        }
        Ok(req)
    }
}

#[deku_derive(DekuRead, DekuWrite)]
#[derive(Debug, Clone, PartialEq)]
pub struct GetStateSensorReadingsReq {
    pub sensor: SensorId,
    pub rearm: u8,
    #[deku(temp, temp_value = "0")]
    rsvd: u8,
}

#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq)]
pub struct StateField {
    pub op_state: SensorOperationalState,
    pub present_state: u8,
    pub previous_state: u8,
    pub event_state: u8,
}

impl StateField {
    pub fn debug_state_set(&self, state_set: u16) -> StateFieldDebug<'_> {
        StateFieldDebug {
            inner: self,
            state_set,
        }
    }
}

pub struct StateDebug<T: FromPrimitive + Debug> {
    state: u8,
    state_set: PhantomData<T>,
}

impl<T: FromPrimitive + Debug> StateDebug<T> {
    fn new(state: u8) -> Self {
        Self {
            state,
            state_set: PhantomData,
        }
    }
}

impl<T: FromPrimitive + Debug> Debug for StateDebug<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(v) = T::from_u8(self.state) {
            write!(f, "{} {:?}", self.state, &v)
        } else {
            write!(f, "{} (unrecognised state)", self.state)
        }
    }
}

/// Print debug formatting with a given StateSet value `T`.
///
/// Will print u8 version for unknown state set.
pub struct StateFieldDebug<'a> {
    inner: &'a StateField,
    state_set: u16,
}

impl StateFieldDebug<'_> {
    pub fn debug_from_u8<T: FromPrimitive + Debug>(
        &self,
        f: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        f.debug_struct("StateField")
            .field("op_state", &self.inner.op_state)
            .field(
                "present_state",
                &StateDebug::<T>::new(self.inner.present_state),
            )
            .field(
                "previous_state",
                &StateDebug::<T>::new(self.inner.previous_state),
            )
            .field(
                "event_state",
                &StateDebug::<T>::new(self.inner.event_state),
            )
            .finish()
    }
}

impl Debug for StateFieldDebug<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use crate::state_sets::*;
        match self.state_set {
            HealthState::ID => self.debug_from_u8::<HealthState>(f),
            OperationFaultStatus::ID => {
                self.debug_from_u8::<OperationFaultStatus>(f)
            }
            OperationalRunningStatus::ID => {
                self.debug_from_u8::<OperationalRunningStatus>(f)
            }
            Presence::ID => self.debug_from_u8::<Presence>(f),
            DeviceInitialization::ID => {
                self.debug_from_u8::<DeviceInitialization>(f)
            }
            _ => {
                debug!("Unrecognised state set {:#04x}", self.state_set);
                write!(f, "{:?}", self.inner)
            }
        }
    }
}

#[deku_derive(DekuRead, DekuWrite)]
#[derive(Debug, Clone, PartialEq)]
pub struct GetStateSensorReadingsResp {
    #[deku(temp, temp_value = "self.fields.len() as u8")]
    comp_sensor_count: u8,
    #[deku(count = "comp_sensor_count")]
    pub fields: VecWrap<StateField, 8>,
}

impl GetStateSensorReadingsResp {
    /// Decode a response payload, requiring 1 to 8 composite fields
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let resp: Self = decode_payload(payload)?;
        if resp.fields.is_empty() {
            return Err(PdrError::InvalidData);
        }
        Ok(resp)
    }
}

#[deku_derive(DekuRead, DekuWrite)]
#[derive(Debug, Clone, PartialEq)]
pub struct SetNumericEffecterValueReq {
    pub effecter: EffecterId,
    #[deku(temp, temp_value = "effecter_value.deku_id().unwrap()")]
    effecter_data_size: u8,
    #[deku(ctx = "*effecter_data_size")]
    pub effecter_value: EffecterData,
}

#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
pub struct GetNumericEffecterValueReq {
    pub effecter: EffecterId,
}

#[deku_derive(DekuRead, DekuWrite)]
#[derive(Debug, Clone, PartialEq)]
pub struct GetNumericEffecterValueResp {
    #[deku(temp, temp_value = "pending_value.deku_id().unwrap()")]
    effecter_data_size: u8,
    pub effecter_oper_state: EffecterOperationalState,
    /// Value from the most recent Set, while a triggering update is pending
    #[deku(ctx = "*effecter_data_size")]
    pub pending_value: EffecterData,
    #[deku(ctx = "*effecter_data_size")]
    pub present_value: EffecterData,
}

#[derive(Debug, DekuRead, DekuWrite, PartialEq, Eq, Clone)]
pub struct GetSensorReadingReq {
    pub sensor: SensorId,
    pub rearm: bool,
}

#[deku_derive(DekuRead, DekuWrite)]
#[derive(Debug, Clone, PartialEq)]
pub struct GetSensorReadingResp {
    #[deku(temp, temp_value = "reading.deku_id().unwrap()")]
    data_size: u8,
    pub op_state: SensorOperationalState,
    pub event_enable: SensorEventMessageEnable,
    pub present_state: SensorState,
    pub previous_state: SensorState,
    pub event_state: SensorState,
    #[deku(ctx = "*data_size")]
    pub reading: SensorData,
}

/// Format version for PlatformEventMessage requests
pub const PLATFORM_EVENT_MESSAGE_FORMAT_VERSION: u8 = 1;

/// Fixed prefix of a PlatformEventMessage request, followed on the wire
/// by the class specific event data.
#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
pub struct PlatformEventMessageReq {
    pub format_version: u8,
    pub tid: u8,
    pub event_class: u8,
}

impl PlatformEventMessageReq {
    pub fn new(tid: u8, event_class: u8) -> Self {
        Self {
            format_version: PLATFORM_EVENT_MESSAGE_FORMAT_VERSION,
            tid,
            event_class,
        }
    }

    /// Decode a request payload, returning the event data that follows.
    ///
    /// At least one byte of event data must be present, and the event
    /// class must be a defined one or in the OEM band.
    pub fn from_payload(payload: &[u8]) -> Result<(Self, &[u8])> {
        if payload.len() <= 3 {
            return Err(PdrError::InvalidLength);
        }
        let ((rest, _), req) = Self::from_bytes((payload, 0))?;
        if !valid_event_class(req.event_class) {
            return Err(PdrError::InvalidData);
        }
        Ok((req, rest))
    }
}

#[allow(missing_docs)]
#[derive(
    FromPrimitive, Debug, PartialEq, Eq, Copy, Clone, DekuRead, DekuWrite,
)]
#[deku(id_type = "u8")]
#[repr(u8)]
pub enum PlatformEventStatus {
    NoLogging = 0,
    LoggingDisabled,
    LogFull,
    AcceptedForLogging,
    Logged,
    LoggingRejected,
}

#[derive(Debug, Clone, PartialEq, Eq, DekuRead, DekuWrite)]
pub struct PlatformEventMessageResp {
    pub platform_event_status: PlatformEventStatus,
}

/// Event data for a sensor event, carried in a PlatformEventMessage
#[derive(Debug, Clone, PartialEq, DekuRead, DekuWrite)]
pub struct SensorEventData {
    pub sensor_id: SensorId,
    pub event: SensorEvent,
}

#[derive(Debug, Clone, PartialEq, DekuRead, DekuWrite)]
#[deku(id_type = "u8")]
pub enum SensorEvent {
    #[deku(id = 0)]
    SensorOp {
        present_op_state: SensorOperationalState,
        previous_op_state: SensorOperationalState,
    },
    #[deku(id = 1)]
    StateSensorState {
        sensor_offset: u8,
        event_state: u8,
        previous_event_state: u8,
    },
    #[deku(id = 2)]
    NumericSensorState(NumericSensorState),
}

#[deku_derive(DekuRead, DekuWrite)]
#[derive(Debug, Clone, PartialEq)]
pub struct NumericSensorState {
    pub event_state: u8,
    pub previous_event_state: u8,
    #[deku(temp, temp_value = "reading.deku_id().unwrap()")]
    sensor_data_size: u8,
    #[deku(ctx = "*sensor_data_size")]
    pub reading: SensorData,
}

#[allow(missing_docs)]
#[derive(
    FromPrimitive, Debug, PartialEq, Eq, Copy, Clone, DekuRead, DekuWrite,
)]
#[deku(id_type = "u8")]
#[repr(u8)]
pub enum ChgEventDataFormat {
    RefreshEntireRepository = 0,
    PdrTypes = 1,
    PdrHandles = 2,
}

#[allow(missing_docs)]
#[derive(
    FromPrimitive, Debug, PartialEq, Eq, Copy, Clone, DekuRead, DekuWrite,
)]
#[deku(id_type = "u8")]
#[repr(u8)]
pub enum ChgEventOperation {
    RefreshAllRecords = 0,
    RecordsDeleted = 1,
    RecordsAdded = 2,
    RecordsModified = 3,
}

/// Event data for a PDR repository change event
#[cfg(feature = "alloc")]
#[deku_derive(DekuRead, DekuWrite)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdrRepositoryChgEventData {
    pub event_data_format: ChgEventDataFormat,
    #[deku(temp, temp_value = "self.change_records.len() as u8")]
    number_of_change_records: u8,
    #[deku(count = "number_of_change_records")]
    pub change_records: alloc::vec::Vec<ChangeRecord>,
}

#[cfg(feature = "alloc")]
impl PdrRepositoryChgEventData {
    /// Encoded size in bytes, for sizing an event buffer up front
    pub fn encoded_len(&self) -> usize {
        2 + self
            .change_records
            .iter()
            .map(|r| 2 + 4 * r.change_entries.len())
            .sum::<usize>()
    }
}

/// One operation within a PDR repository change event.
///
/// Entries are record handles or PDR types, per the event's data format.
#[cfg(feature = "alloc")]
#[deku_derive(DekuRead, DekuWrite)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub event_data_operation: ChgEventOperation,
    #[deku(temp, temp_value = "self.change_entries.len() as u8")]
    number_of_change_entries: u8,
    #[deku(count = "number_of_change_entries", endian = "little")]
    pub change_entries: alloc::vec::Vec<u32>,
}
