//! PLDM State Set definitions.
//!
//! From DSP0249. Only the sets used by composite state sensors and
//! effecters here, not the full registry.

use num_derive::FromPrimitive;

#[allow(missing_docs)]
#[derive(FromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum HealthState {
    Unknown = 0,
    Normal,
    NonCritical,
    Critical,
    Fatal,
    UpperNonCritical,
    LowerNonCritical,
    UpperCritical,
    LowerCritical,
    UpperFatal,
    LowerFatal,
}

impl HealthState {
    pub const ID: u16 = 1;
}

#[allow(missing_docs)]
#[derive(FromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum OperationFaultStatus {
    Unknown = 0,
    Normal,
    Error,
    NonRecoverableError,
}

impl OperationFaultStatus {
    pub const ID: u16 = 10;
}

#[allow(missing_docs)]
#[derive(FromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum OperationalRunningStatus {
    Unknown = 0,
    Starting,
    Stopping,
    Stopped,
    InService,
    Aborted,
    Dormant,
}

impl OperationalRunningStatus {
    pub const ID: u16 = 11;
}

#[allow(missing_docs)]
#[derive(FromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum Presence {
    Unknown = 0,
    Present,
    NotPresent,
}

impl Presence {
    pub const ID: u16 = 13;
}

#[allow(missing_docs)]
#[derive(FromPrimitive, Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum DeviceInitialization {
    Unknown = 0,
    Normal,
    InitializationInProgress,
    InitializationHung,
    InitializationFailed,
}

impl DeviceInitialization {
    pub const ID: u16 = 20;
}

/// Display name for a state set, for the sets defined above.
pub fn set_name(id: u16) -> Option<&'static str> {
    match id {
        HealthState::ID => Some("Health State"),
        OperationFaultStatus::ID => Some("Operation Fault Status"),
        OperationalRunningStatus::ID => Some("Operational Running Status"),
        Presence::ID => Some("Presence"),
        DeviceInitialization::ID => Some("Device Initialization"),
        _ => None,
    }
}
