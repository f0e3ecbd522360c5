//! Service Discovery Protocol (SDP) record support
//!
//! This module provides the pieces needed to advertise a service over SDP:
//! self-describing data elements, attribute records, and the device-wide
//! record registry with collision-free handle allocation.

/// Service record handle type
pub type ServiceRecordHandle = u32;

/// Attribute ID type
pub type AttributeId = u16;

/// Service UUID type (128-bit)
pub type ServiceUuid = u128;

pub mod element;
pub mod record;
pub mod registry;

// Re-export commonly used types
pub use element::{DataElement, DataElementType};
pub use record::{ServiceAttribute, ServiceClassId, ServiceRecord, ServiceRecordBuilder};
pub use registry::ServiceRecordRegistry;

/// Universal attribute IDs module
pub mod universal_attributes {
    /// Service Record Handle
    pub const SERVICE_RECORD_HANDLE: u16 = 0x0000;
    /// Service Class ID List
    pub const SERVICE_CLASS_ID_LIST: u16 = 0x0001;
    /// Protocol Descriptor List
    pub const PROTOCOL_DESCRIPTOR_LIST: u16 = 0x0004;
    /// Browse Group List
    pub const BROWSE_GROUP_LIST: u16 = 0x0005;
    /// Bluetooth Profile Descriptor List
    pub const BLUETOOTH_PROFILE_DESCRIPTOR_LIST: u16 = 0x0009;
    /// Service Name (primary language base offset)
    pub const SERVICE_NAME: u16 = 0x0100;
}

/// Protocol identifier UUIDs used in protocol descriptor lists
pub mod protocol_uuids {
    /// L2CAP protocol
    pub const L2CAP: u16 = 0x0100;
    /// RFCOMM protocol
    pub const RFCOMM: u16 = 0x0003;
    /// OBEX protocol
    pub const OBEX: u16 = 0x0008;
}

/// UUID of the public browse root group, member of every browsable record
pub const PUBLIC_BROWSE_ROOT: u16 = 0x1002;

/// SDP Error Types
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum SdpError {
    /// Buffer too small for the encoded element or record
    BufferTooSmall,
    /// Too many attributes for one record
    TooManyAttributes,
    /// Too many service records registered
    TooManyRecords,
    /// No free service record handle in the requested range
    HandleExhausted,
    /// Handle or start value outside the non-reserved range
    InvalidHandle,
}
